//! Bit-field register model
//!
//! A [`Register`] describes where a register lives and how its bits are split
//! into named fields. It never changes after it has been defined; the nRF24
//! register table in [`ll`] is made of `static` descriptors generated at
//! compile time.
//!
//! Register contents are held in a [`Value`]. A `Value` on its own is plain
//! data: changing a field only changes the local copy. Binding it to a
//! [`WriteBack`] sink (usually the driver) turns it into a [`Bound`] value,
//! which writes the whole register back to the hardware every time a field is
//! changed.
//!
//! **NOTE**: Field setters accept any `u64`. If the value doesn't fit into the
//! field, the extra bits are silently dropped.
//!
//! [`ll`]: ../ll/index.html

use core::{
    fmt,
    ops::{BitAnd, BitOr, BitXor, Deref},
};

/// Largest register the model supports, in bytes
pub const MAX_REGISTER_LEN: usize = 5;

/// Register widths the nRF24 family uses, in bits
pub const SUPPORTED_BITS: [u8; 3] = [1, 8, 40];

/// One entry of a register layout, as passed to [`Register::define`]
///
/// Entries are listed most-significant first. An entry without a name is
/// padding: it takes up space, but has no accessor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FieldSpec {
    pub(crate) name: Option<&'static str>,
    pub(crate) width: u8,
}

impl FieldSpec {
    /// A named field
    pub const fn named(name: &'static str, width: u8) -> Self {
        FieldSpec {
            name: Some(name),
            width,
        }
    }

    /// Anonymous padding
    pub const fn padding(width: u8) -> Self {
        FieldSpec { name: None, width }
    }

    /// The name of the field, `None` for padding
    pub fn name(&self) -> Option<&'static str> {
        self.name
    }

    /// The width of the field in bits
    pub fn width(&self) -> u8 {
        self.width
    }
}

/// Resolved location of a named field within its register
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Field {
    register: u8,
    name: &'static str,
    offset: u8,
    width: u8,
}

impl Field {
    /// Address of the register this field belongs to
    pub fn register(&self) -> u8 {
        self.register
    }

    /// Name of the field
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Position of the field's least significant bit
    pub fn offset(&self) -> u8 {
        self.offset
    }

    /// Width of the field in bits
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Mask of the field's bits, not shifted
    pub fn width_mask(&self) -> u64 {
        mask(self.width)
    }

    /// Mask of the field's bits, shifted into place
    pub fn mask(&self) -> u64 {
        mask(self.width) << self.offset
    }
}

/// Reasons why [`Register::define`] can refuse a layout
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DefineError {
    /// The address doesn't fit into the 5 address bits of the command byte
    AddressOutOfRange(u8),

    /// A field was declared with a width of zero
    EmptyField,

    /// The same field name was used twice
    DuplicateField,

    /// The fields don't add up to a supported register width
    UnsupportedWidth(u16),
}

/// A field name that doesn't exist in the register it was looked up in
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UnknownField {
    /// Name of the register
    pub register: &'static str,
}

/// Immutable register descriptor
#[derive(Debug, Eq, PartialEq)]
pub struct Register {
    name: &'static str,
    address: u8,
    bits: u8,
    fields: &'static [FieldSpec],
}

impl Register {
    /// Define a register
    ///
    /// `fields` lists the layout from the most significant bit downwards.
    /// Anonymous entries are padding. The widths must add up to one of
    /// [`SUPPORTED_BITS`].
    pub const fn define(
        name: &'static str,
        address: u8,
        fields: &'static [FieldSpec],
    ) -> Result<Register, DefineError> {
        if address > 0x1f {
            return Err(DefineError::AddressOutOfRange(address));
        }

        let mut bits: u16 = 0;
        let mut i = 0;
        while i < fields.len() {
            if fields[i].width == 0 {
                return Err(DefineError::EmptyField);
            }
            if let Some(a) = fields[i].name {
                let mut j = i + 1;
                while j < fields.len() {
                    if let Some(b) = fields[j].name {
                        if str_eq(a, b) {
                            return Err(DefineError::DuplicateField);
                        }
                    }
                    j += 1;
                }
            }
            bits += fields[i].width as u16;
            i += 1;
        }

        let mut supported = false;
        let mut i = 0;
        while i < SUPPORTED_BITS.len() {
            if bits == SUPPORTED_BITS[i] as u16 {
                supported = true;
            }
            i += 1;
        }
        if !supported {
            return Err(DefineError::UnsupportedWidth(bits));
        }

        Ok(Register {
            name,
            address,
            bits: bits as u8,
            fields,
        })
    }

    /// Name of the register
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 5-bit register address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Width of the register in bits
    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// Number of bytes the register occupies on the wire
    pub fn byte_len(&self) -> usize {
        (self.bits as usize + 7) / 8
    }

    /// The layout as it was defined, padding included
    pub fn layout(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Look up a named field
    pub const fn find(&self, name: &str) -> Option<Field> {
        let mut offset = self.bits;
        let mut i = 0;
        while i < self.fields.len() {
            let spec = &self.fields[i];
            offset -= spec.width;
            if let Some(field_name) = spec.name {
                if str_eq(field_name, name) {
                    return Some(Field {
                        register: self.address,
                        name: field_name,
                        offset,
                        width: spec.width,
                    });
                }
            }
            i += 1;
        }
        None
    }

    /// Look up a named field in a constant context
    ///
    /// Used to build the field constants of the register table, where an
    /// unknown name fails compilation.
    ///
    /// # Panics
    ///
    /// Panics, if the register has no field called `name` and this is
    /// evaluated at runtime.
    pub const fn field_const(&self, name: &str) -> Field {
        match self.find(name) {
            Some(field) => field,
            None => panic!("register has no field of that name"),
        }
    }

    /// Look up a named field
    pub fn field(&self, name: &str) -> Option<Field> {
        self.find(name)
    }

    /// Iterate over the named fields, most significant first
    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        let mut offset = self.bits;
        let address = self.address;
        self.fields.iter().filter_map(move |spec| {
            offset -= spec.width;
            spec.name.map(|name| Field {
                register: address,
                name,
                offset,
                width: spec.width,
            })
        })
    }

    /// Mask covering every bit of the register
    pub fn mask(&self) -> u64 {
        mask(self.bits)
    }

    /// A detached value with all bits cleared
    pub fn value(&'static self) -> Value {
        Value {
            register: self,
            raw: 0,
        }
    }

    /// A detached value holding `raw`
    pub fn with_raw(&'static self, raw: u64) -> Value {
        Value {
            register: self,
            raw: raw & self.mask(),
        }
    }

    /// A detached value holding `initial`, with `overrides` applied on top
    pub fn instantiate(&'static self, initial: u64, overrides: &[(Field, u64)]) -> Value {
        let mut value = self.with_raw(initial);
        for &(field, field_value) in overrides {
            value.set(field, field_value);
        }
        value
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@0x{:02x}", self.name, self.address)
    }
}

/// Contents of a register
///
/// This is the detached flavour: changing it never touches the hardware. Use
/// [`Value::bind`] to get a [`Bound`] value that does.
#[derive(Clone, Copy)]
pub struct Value {
    register: &'static Register,
    raw: u64,
}

impl Value {
    /// Decode a value from most-significant-first bytes
    ///
    /// Missing leading bytes count as zero; extra leading bytes are ignored.
    pub fn from_be_bytes(register: &'static Register, bytes: &[u8]) -> Self {
        let mut raw = 0u64;
        for &b in bytes {
            raw = (raw << 8) | b as u64;
        }
        register.with_raw(raw)
    }

    /// Encode the value as most-significant-first bytes
    ///
    /// Fills the first [`Register::byte_len`] bytes of `buffer` and returns
    /// them.
    ///
    /// # Panics
    ///
    /// Panics, if `buffer` is shorter than the register.
    pub fn to_be_bytes<'b>(&self, buffer: &'b mut [u8]) -> &'b mut [u8] {
        let len = self.register.byte_len();
        let bytes = &mut buffer[..len];
        for (i, b) in bytes.iter_mut().enumerate() {
            let shift = 8 * (len - 1 - i);
            *b = (self.raw >> shift) as u8;
        }
        bytes
    }

    /// The register this value belongs to
    pub fn register(&self) -> &'static Register {
        self.register
    }

    /// The raw register contents
    pub fn raw(&self) -> u64 {
        self.raw
    }

    /// Replace the raw register contents
    pub fn set_raw(&mut self, raw: u64) -> &mut Self {
        self.raw = raw & self.register.mask();
        self
    }

    /// Read a field
    pub fn get(&self, field: Field) -> u64 {
        debug_assert_eq!(field.register, self.register.address);
        (self.raw >> field.offset) & field.width_mask()
    }

    /// Write a field
    pub fn set(&mut self, field: Field, value: u64) -> &mut Self {
        debug_assert_eq!(field.register, self.register.address);
        self.raw = (self.raw & !field.mask()) | ((value & field.width_mask()) << field.offset);
        self
    }

    /// Builder-style [`Value::set`]
    pub fn with(mut self, field: Field, value: u64) -> Self {
        self.set(field, value);
        self
    }

    /// Read a field by name
    pub fn get_field(&self, name: &str) -> Option<u64> {
        self.register.field(name).map(|field| self.get(field))
    }

    /// Write a field by name
    pub fn set_field(&mut self, name: &str, value: u64) -> Result<&mut Self, UnknownField> {
        let field = self.lookup(name)?;
        Ok(self.set(field, value))
    }

    /// `true` if any bit is set
    pub fn is_nonzero(&self) -> bool {
        self.raw != 0
    }

    /// Attach the value to a write-back sink
    pub fn bind<S: WriteBack>(self, sink: &mut S) -> Bound<'_, S> {
        Bound { sink, value: self }
    }

    fn lookup(&self, name: &str) -> Result<Field, UnknownField> {
        self.register.field(name).ok_or(UnknownField {
            register: self.register.name,
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Value {}

impl PartialEq<u64> for Value {
    fn eq(&self, other: &u64) -> bool {
        self.raw == *other
    }
}

impl From<Value> for u64 {
    fn from(value: Value) -> Self {
        value.raw
    }
}

impl BitOr<u64> for Value {
    type Output = Value;

    fn bitor(self, rhs: u64) -> Value {
        self.register.with_raw(self.raw | rhs)
    }
}

impl BitAnd<u64> for Value {
    type Output = Value;

    fn bitand(self, rhs: u64) -> Value {
        self.register.with_raw(self.raw & rhs)
    }
}

impl BitXor<u64> for Value {
    type Output = Value;

    fn bitxor(self, rhs: u64) -> Value {
        self.register.with_raw(self.raw ^ rhs)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = f.debug_struct(self.register.name);
        for field in self.register.fields() {
            s.field(field.name, &self.get(field));
        }
        s.finish()
    }
}

/// Something that can store a register value in hardware
///
/// Implemented by the drivers. A [`Bound`] value calls this after every
/// change.
pub trait WriteBack {
    /// Error that can occur while writing
    type Error;

    /// Write the complete register value
    fn write_back(&mut self, value: &Value) -> Result<(), Self::Error>;
}

/// A register value that writes itself back on every change
///
/// Reading goes through [`Deref`] to the cached [`Value`]; the hardware is
/// not read again. Writing a field updates the cache and then writes the full
/// register through the sink before returning. If that write fails, the cache
/// goes back to what it held before the change.
pub struct Bound<'s, S: WriteBack> {
    sink: &'s mut S,
    value: Value,
}

impl<'s, S: WriteBack> Bound<'s, S> {
    /// Write a field and store the register
    pub fn set(&mut self, field: Field, value: u64) -> Result<&mut Self, S::Error> {
        let previous = self.value.raw();
        self.value.set(field, value);
        self.store(previous)
    }

    /// Write a field by name and store the register
    pub fn set_field(&mut self, name: &str, value: u64) -> Result<&mut Self, S::Error>
    where
        S::Error: From<UnknownField>,
    {
        let field = self.value.lookup(name)?;
        self.set(field, value)
    }

    /// Replace the whole register and store it
    pub fn assign(&mut self, raw: u64) -> Result<&mut Self, S::Error> {
        let previous = self.value.raw();
        self.value.set_raw(raw);
        self.store(previous)
    }

    /// Update several fields locally, then store the register once
    pub fn modify<F>(&mut self, f: F) -> Result<&mut Self, S::Error>
    where
        F: FnOnce(&mut Value),
    {
        let previous = self.value.raw();
        f(&mut self.value);
        self.store(previous)
    }

    /// Drop the write-back link
    pub fn detach(self) -> Value {
        self.value
    }
    fn store(&mut self, previous: u64) -> Result<&mut Self, S::Error> {
        if let Err(error) = self.sink.write_back(&self.value) {
            self.value.set_raw(previous);
            return Err(error);
        }
        Ok(self)
    }
}

impl<'s, S: WriteBack> Deref for Bound<'s, S> {
    type Target = Value;

    fn deref(&self) -> &Value {
        &self.value
    }
}

impl<'s, S: WriteBack> fmt::Debug for Bound<'s, S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.value, f)
    }
}

const fn mask(width: u8) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1 << width) - 1
    }
}

const fn str_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const CTRL_FIELDS: &[FieldSpec] = &[
        FieldSpec::padding(1),
        FieldSpec::named("mask_rx", 1),
        FieldSpec::named("mask_tx", 1),
        FieldSpec::named("mask_retry", 1),
        FieldSpec::named("crc_enable", 1),
        FieldSpec::named("crc_mode", 1),
        FieldSpec::named("power_up", 1),
        FieldSpec::named("receive_mode", 1),
    ];

    static CTRL: Register = match Register::define("CTRL", 0x00, CTRL_FIELDS) {
        Ok(register) => register,
        Err(_) => panic!("bad test register"),
    };

    const WIDE_FIELDS: &[FieldSpec] = &[
        FieldSpec::named("high", 12),
        FieldSpec::padding(4),
        FieldSpec::named("low", 24),
    ];

    static WIDE: Register = match Register::define("WIDE", 0x10, WIDE_FIELDS) {
        Ok(register) => register,
        Err(_) => panic!("bad test register"),
    };

    #[derive(Default)]
    struct Recorder {
        writes: u32,
        last: u64,
        broken: bool,
    }

    impl WriteBack for Recorder {
        type Error = UnknownField;

        fn write_back(&mut self, value: &Value) -> Result<(), UnknownField> {
            if self.broken {
                return Err(UnknownField {
                    register: value.register().name(),
                });
            }
            self.writes += 1;
            self.last = value.raw();
            Ok(())
        }
    }

    #[test]
    fn define_rejects_bad_layouts() {
        const SEVEN: &[FieldSpec] = &[FieldSpec::named("a", 7)];
        const EMPTY: &[FieldSpec] = &[FieldSpec::named("a", 0), FieldSpec::named("b", 8)];
        const TWICE: &[FieldSpec] = &[FieldSpec::named("a", 4), FieldSpec::named("a", 4)];
        const BYTE: &[FieldSpec] = &[FieldSpec::named("a", 8)];

        assert_eq!(
            Register::define("R", 0x00, SEVEN),
            Err(DefineError::UnsupportedWidth(7))
        );
        assert_eq!(
            Register::define("R", 0x00, EMPTY),
            Err(DefineError::EmptyField)
        );
        assert_eq!(
            Register::define("R", 0x00, TWICE),
            Err(DefineError::DuplicateField)
        );
        assert_eq!(
            Register::define("R", 0x20, BYTE),
            Err(DefineError::AddressOutOfRange(0x20))
        );
        assert!(Register::define("R", 0x1f, BYTE).is_ok());
    }

    #[test]
    fn fields_are_laid_out_msb_first() {
        let power_up = CTRL.field("power_up").unwrap();
        assert_eq!(power_up.offset(), 1);
        assert_eq!(power_up.width(), 1);

        let mask_rx = CTRL.field("mask_rx").unwrap();
        assert_eq!(mask_rx.offset(), 6);

        let high = WIDE.field("high").unwrap();
        assert_eq!((high.offset(), high.width()), (28, 12));
        let low = WIDE.field("low").unwrap();
        assert_eq!((low.offset(), low.width()), (0, 24));

        assert!(CTRL.field("nope").is_none());
        assert_eq!(CTRL.fields().count(), 7);
        assert_eq!(WIDE.byte_len(), 5);
    }

    #[test]
    fn instantiate_applies_overrides() {
        let power_up = CTRL.field_const("power_up");
        let receive_mode = CTRL.field_const("receive_mode");

        let value = CTRL.instantiate(0, &[(power_up, 1), (receive_mode, 1)]);
        assert_eq!(value, 0x03);

        let mut buffer = [0; MAX_REGISTER_LEN];
        assert_eq!(value.to_be_bytes(&mut buffer), &[0x03]);
    }

    #[test]
    fn oversized_values_are_truncated() {
        let power_up = CTRL.field_const("power_up");
        let mut value = CTRL.value();
        value.set(power_up, 0b10);
        assert_eq!(value.raw(), 0);
        value.set(power_up, 0b11);
        assert_eq!(value.raw(), 0b10);

        assert_eq!(CTRL.with_raw(0x1ff).raw(), 0xff);
    }

    #[test]
    fn set_field_by_name() {
        let mut value = CTRL.value();
        value.set_field("crc_enable", 1).unwrap();
        assert_eq!(value.get_field("crc_enable"), Some(1));
        assert_eq!(value.raw(), 0x08);
        assert_eq!(
            value.set_field("bogus", 1).map(|_| ()),
            Err(UnknownField { register: "CTRL" })
        );
    }

    #[test]
    fn detached_values_never_write_back() {
        let mut recorder = Recorder::default();
        let power_up = CTRL.field_const("power_up");

        let mut value = CTRL.value().bind(&mut recorder).detach();
        value.set(power_up, 1);

        assert_eq!(value, 0x02);
        assert_eq!(recorder.writes, 0);
    }

    #[test]
    fn bound_values_write_back_full_value_once_per_change() {
        let mut recorder = Recorder::default();
        let power_up = CTRL.field_const("power_up");
        let crc_enable = CTRL.field_const("crc_enable");

        {
            let mut bound = CTRL.with_raw(0x08).bind(&mut recorder);
            bound.set(power_up, 1).unwrap();
            assert_eq!(bound.get(power_up), 1);
        }
        assert_eq!(recorder.writes, 1);
        assert_eq!(recorder.last, 0x0a);

        let value = {
            let mut bound = CTRL.value().bind(&mut recorder);
            bound
                .modify(|v| {
                    v.set(power_up, 1).set(crc_enable, 1);
                })
                .unwrap();
            bound.set_field("receive_mode", 1).unwrap();
            bound.detach()
        };
        assert_eq!(recorder.writes, 3);
        assert_eq!(recorder.last, 0x0b);
        assert_eq!(value, 0x0b);
    }

    #[test]
    fn failed_write_back_keeps_the_previous_value() {
        let mut recorder = Recorder {
            broken: true,
            ..Default::default()
        };
        let power_up = CTRL.field_const("power_up");

        let mut bound = CTRL.with_raw(0x08).bind(&mut recorder);
        assert!(bound.set(power_up, 1).is_err());
        assert_eq!(bound.raw(), 0x08);
        assert!(bound.assign(0xff).is_err());
        assert_eq!(bound.raw(), 0x08);
        assert!(bound
            .modify(|v| {
                v.set(power_up, 1);
            })
            .is_err());
        assert_eq!(bound.detach(), 0x08);
        assert_eq!(recorder.writes, 0);
    }

    #[test]
    #[should_panic]
    fn field_const_panics_at_runtime_on_unknown_names() {
        let name = String::from("missing");
        CTRL.field_const(&name);
    }

    #[test]
    fn bitwise_ops_stay_within_register() {
        let value = CTRL.with_raw(0x0f);
        assert_eq!(value | 0xf00, 0x0f);
        assert_eq!(value & 0x03, 0x03);
        assert_eq!(value ^ 0xff, 0xf0);
        assert!(value.is_nonzero());
        assert!(!CTRL.value().is_nonzero());
    }

    proptest! {
        #[test]
        fn get_matches_shift_and_mask(raw in 0u64..(1 << 40)) {
            let value = WIDE.with_raw(raw);
            for field in WIDE.fields() {
                prop_assert_eq!(
                    value.get(field),
                    (raw >> field.offset()) & field.width_mask()
                );
            }
        }

        #[test]
        fn setting_the_current_value_changes_nothing(raw in 0u64..(1 << 40)) {
            let mut value = WIDE.with_raw(raw);
            for field in WIDE.fields() {
                let current = value.get(field);
                value.set(field, current);
                prop_assert_eq!(value.raw(), raw);
            }
        }

        #[test]
        fn bytes_round_trip(raw in 0u64..(1 << 40)) {
            let value = WIDE.with_raw(raw);
            let mut buffer = [0; MAX_REGISTER_LEN];
            let bytes = value.to_be_bytes(&mut buffer);
            prop_assert_eq!(Value::from_be_bytes(&WIDE, bytes).raw(), raw);
        }
    }
}
