//! Field-element codec: decodes raw felt sequences into native scalars.
//!
//! All functions are pure and total over well-formed input; malformed input
//! (a felt too wide for its slot, a non-ASCII byte in a short-string slot)
//! yields a [`CodecError`], never a silently cleaned value.
//!
//! Decoding is schema-driven: a [`FieldLayout`] tells the codec exactly which
//! positional slots hold which field, including which pair of slots form the
//! low/high halves of a 256-bit value. The codec itself never assumes fixed
//! offsets, so contract schema upgrades only touch layouts, not this module.

use chrono::{DateTime, Utc};
use primitive_types::U256;
use starknet::core::types::Felt;
use thiserror::Error;

use super::event::RawEvent;

/// Largest supported fixed-point scale; 10^77 overflows a u256.
const MAX_DECIMALS: u32 = 76;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("felt {0:#x} does not fit in 128 bits")]
    U128Overflow(Felt),

    #[error("short string slot contains non-ASCII byte {byte:#04x}")]
    NonAsciiShortString { byte: u8 },

    #[error("timestamp {0} is out of range")]
    TimestampOutOfRange(u128),

    #[error("fixed-point scale of {0} decimals is unsupported")]
    DecimalsOutOfRange(u32),

    #[error("payload too short: layout needs {expected} slots, got {got}")]
    TruncatedPayload { expected: usize, got: usize },

    #[error("decoded payload is missing field `{name}`")]
    MissingField { name: &'static str },
}

/// Felt as a u128, failing on values that do not fit.
pub fn felt_to_u128(felt: &Felt) -> Result<u128, CodecError> {
    (*felt)
        .try_into()
        .map_err(|_| CodecError::U128Overflow(*felt))
}

/// Widen a (low, high) pair of 128-bit halves into a u256.
pub fn decode_uint256(low: &Felt, high: &Felt) -> Result<U256, CodecError> {
    let low = felt_to_u128(low)?;
    let high = felt_to_u128(high)?;
    Ok((U256::from(high) << 128) | U256::from(low))
}

/// Render a u256 as a fixed-point decimal string with exactly `decimals`
/// fractional digits. Integer division and modulo only; floating point would
/// lose precision on amounts up to 2^256.
pub fn format_scaled(value: U256, decimals: u32) -> Result<String, CodecError> {
    if decimals == 0 {
        return Ok(value.to_string());
    }
    if decimals > MAX_DECIMALS {
        return Err(CodecError::DecimalsOutOfRange(decimals));
    }
    let scale = U256::from(10u8).pow(U256::from(decimals));
    let (int, frac) = value.div_mod(scale);
    Ok(format!(
        "{int}.{frac:0>width$}",
        frac = frac.to_string(),
        width = decimals as usize
    ))
}

/// The single widening+scaling path for every numeric amount: (low, high)
/// halves in, fixed-point decimal string out.
pub fn decode_scaled_amount(low: &Felt, high: &Felt, decimals: u32) -> Result<String, CodecError> {
    format_scaled(decode_uint256(low, high)?, decimals)
}

/// Unpack a big-endian byte-packed ASCII short string, stopping at the first
/// null byte. Any non-ASCII byte is a decode failure, not something to clean.
pub fn decode_short_string(felt: &Felt) -> Result<String, CodecError> {
    let bytes = felt.to_bytes_be();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());

    let mut out = String::with_capacity(bytes.len() - start);
    for &byte in &bytes[start..] {
        if byte == 0 {
            break;
        }
        if !byte.is_ascii() {
            return Err(CodecError::NonAsciiShortString { byte });
        }
        out.push(byte as char);
    }
    Ok(out)
}

/// Canonical address/hash rendering: fixed-width, lower-case, `0x`-prefixed.
pub fn canonical_hex(felt: &Felt) -> String {
    felt.to_fixed_hex_string()
}

/// UNIX seconds in a felt slot to a UTC instant.
pub fn decode_timestamp(felt: &Felt) -> Result<DateTime<Utc>, CodecError> {
    let secs = felt_to_u128(felt)?;
    let secs_i64 = i64::try_from(secs).map_err(|_| CodecError::TimestampOutOfRange(secs))?;
    DateTime::<Utc>::from_timestamp(secs_i64, 0).ok_or(CodecError::TimestampOutOfRange(secs))
}

/// Wire representation of one logical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Address or hash rendered as canonical hex. One slot.
    Address,
    /// u256 low/high pair scaled to a fixed-point decimal string. Two slots.
    Amount,
    /// u256 low/high pair kept as a raw integer. Two slots.
    Uint256,
    /// Packed ASCII short string. One slot.
    ShortString,
    /// UNIX seconds. One slot.
    Timestamp,
    /// Uninterpreted felt. One slot.
    Raw,
}

impl FieldKind {
    pub const fn slots(self) -> usize {
        match self {
            Self::Amount | Self::Uint256 => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
}

pub const fn field(name: &'static str, kind: FieldKind) -> FieldDef {
    FieldDef { name, kind }
}

/// Ordered field layout over an event's key and data arrays. `keys` starts
/// after the selector slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    pub keys: &'static [FieldDef],
    pub data: &'static [FieldDef],
}

impl FieldLayout {
    pub fn key_slots(&self) -> usize {
        Self::slots(self.keys)
    }

    pub fn data_slots(&self) -> usize {
        Self::slots(self.data)
    }

    fn slots(defs: &[FieldDef]) -> usize {
        defs.iter().map(|d| d.kind.slots()).sum()
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Address(String),
    Amount(String),
    Uint256(U256),
    ShortString(String),
    Timestamp(DateTime<Utc>),
    Raw(Felt),
}

/// Named field values produced by applying a layout to an event, in layout
/// order.
#[derive(Debug, Clone, Default)]
pub struct DecodedFields {
    fields: Vec<(&'static str, FieldValue)>,
}

impl DecodedFields {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    pub fn require_address(&self, name: &'static str) -> Result<String, CodecError> {
        match self.get(name) {
            Some(FieldValue::Address(s)) => Ok(s.clone()),
            _ => Err(CodecError::MissingField { name }),
        }
    }

    pub fn require_amount(&self, name: &'static str) -> Result<String, CodecError> {
        match self.get(name) {
            Some(FieldValue::Amount(s)) => Ok(s.clone()),
            _ => Err(CodecError::MissingField { name }),
        }
    }

    pub fn require_uint256(&self, name: &'static str) -> Result<U256, CodecError> {
        match self.get(name) {
            Some(FieldValue::Uint256(v)) => Ok(*v),
            _ => Err(CodecError::MissingField { name }),
        }
    }

    pub fn require_short_string(&self, name: &'static str) -> Result<String, CodecError> {
        match self.get(name) {
            Some(FieldValue::ShortString(s)) => Ok(s.clone()),
            _ => Err(CodecError::MissingField { name }),
        }
    }

    pub fn require_timestamp(&self, name: &'static str) -> Result<DateTime<Utc>, CodecError> {
        match self.get(name) {
            Some(FieldValue::Timestamp(t)) => Ok(*t),
            _ => Err(CodecError::MissingField { name }),
        }
    }

    fn push(&mut self, name: &'static str, value: FieldValue) {
        self.fields.push((name, value));
    }
}

/// Apply a layout to an event's key and data arrays.
pub fn decode_fields(
    layout: &FieldLayout,
    event: &RawEvent,
    decimals: u32,
) -> Result<DecodedFields, CodecError> {
    let mut out = DecodedFields::default();

    // keys[0] is the selector, not part of the layout.
    let indexed = event.keys.get(1..).unwrap_or(&[]);
    decode_defs(layout.keys, indexed, decimals, &mut out)?;
    decode_defs(layout.data, &event.data, decimals, &mut out)?;

    Ok(out)
}

fn decode_defs(
    defs: &[FieldDef],
    slots: &[Felt],
    decimals: u32,
    out: &mut DecodedFields,
) -> Result<(), CodecError> {
    let expected: usize = defs.iter().map(|d| d.kind.slots()).sum();
    if slots.len() < expected {
        return Err(CodecError::TruncatedPayload {
            expected,
            got: slots.len(),
        });
    }

    let mut i = 0;
    for def in defs {
        let value = match def.kind {
            FieldKind::Address => FieldValue::Address(canonical_hex(&slots[i])),
            FieldKind::Amount => {
                FieldValue::Amount(decode_scaled_amount(&slots[i], &slots[i + 1], decimals)?)
            }
            FieldKind::Uint256 => FieldValue::Uint256(decode_uint256(&slots[i], &slots[i + 1])?),
            FieldKind::ShortString => FieldValue::ShortString(decode_short_string(&slots[i])?),
            FieldKind::Timestamp => FieldValue::Timestamp(decode_timestamp(&slots[i])?),
            FieldKind::Raw => FieldValue::Raw(slots[i]),
        };
        out.push(def.name, value);
        i += def.kind.slots();
    }
    Ok(())
}
