//! The value type exchanged with the external expression evaluator.
//!
//! Routing only ever sees already-evaluated literals: bounds, in-list
//! members, and row payload cells. The middleware does not know the
//! backend's SQL dialect or column types, so a `Datum` also defines the
//! canonical byte encoding used for shard-key hashing:
//!
//! - integral and temporal values collapse to one 8-byte signed long
//!   (an `Int32(7)` literal and an `Int64(7)` literal must land on the
//!   same shard — the parser, not the column, chose the width),
//! - text hashes as raw UTF-8,
//! - everything else falls back to a type-tagged byte serialization.

use serde::{Deserialize, Serialize};
use std::fmt;

const MILLIS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Datum {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    /// Exact numeric, carried in its textual form.
    Decimal(String),
    Text(String),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    /// Days since the Unix epoch.
    Date(i32),
    Bytes(Vec<u8>),
}

impl Datum {
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Datum::Null => "null",
            Datum::Bool(_) => "bool",
            Datum::Int32(_) => "int32",
            Datum::Int64(_) => "int64",
            Datum::Float64(_) => "float64",
            Datum::Decimal(_) => "decimal",
            Datum::Text(_) => "text",
            Datum::Timestamp(_) => "timestamp",
            Datum::Date(_) => "date",
            Datum::Bytes(_) => "bytes",
        }
    }

    /// True when `self` and `other` are the same variant (range bounds must
    /// agree on type before enumeration is attempted).
    pub fn same_type(&self, other: &Datum) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Append the canonical hash encoding of this value to `buf`.
    pub fn encode_for_hash(&self, buf: &mut Vec<u8>) {
        match self {
            // Unreachable through routing (null keys are resolved to the
            // default node before hashing); kept total for tuple encoding.
            Datum::Null => buf.push(0x00),
            Datum::Bool(b) => buf.extend_from_slice(&(*b as i64).to_be_bytes()),
            Datum::Int32(v) => buf.extend_from_slice(&(*v as i64).to_be_bytes()),
            Datum::Int64(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Datum::Timestamp(ms) => buf.extend_from_slice(&ms.to_be_bytes()),
            Datum::Date(days) => {
                buf.extend_from_slice(&(*days as i64 * MILLIS_PER_DAY).to_be_bytes())
            }
            Datum::Text(s) => buf.extend_from_slice(s.as_bytes()),
            Datum::Float64(v) => {
                buf.push(0xF4);
                buf.extend_from_slice(&v.to_be_bytes());
            }
            Datum::Decimal(s) => {
                buf.push(0xF5);
                buf.extend_from_slice(s.as_bytes());
            }
            Datum::Bytes(b) => {
                buf.push(0xF6);
                buf.extend_from_slice(b);
            }
        }
    }

    /// Ordinal value for discrete range enumeration, when this type has one.
    pub fn as_enumerable(&self) -> Option<i64> {
        match self {
            Datum::Bool(b) => Some(*b as i64),
            Datum::Int32(v) => Some(*v as i64),
            Datum::Int64(v) => Some(*v),
            Datum::Date(days) => Some(*days as i64),
            _ => None,
        }
    }

    /// Rebuild a value of the same variant as `template` from an ordinal
    /// produced by [`as_enumerable`](Self::as_enumerable).
    pub fn from_enumerable(template: &Datum, ordinal: i64) -> Datum {
        match template {
            Datum::Bool(_) => Datum::Bool(ordinal != 0),
            Datum::Int32(_) => Datum::Int32(ordinal as i32),
            Datum::Date(_) => Datum::Date(ordinal as i32),
            _ => Datum::Int64(ordinal),
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => write!(f, "NULL"),
            Datum::Bool(b) => write!(f, "{b}"),
            Datum::Int32(v) => write!(f, "{v}"),
            Datum::Int64(v) => write!(f, "{v}"),
            Datum::Float64(v) => write!(f, "{v}"),
            Datum::Decimal(s) => write!(f, "{s}"),
            Datum::Text(s) => write!(f, "'{s}'"),
            Datum::Timestamp(ms) => write!(f, "ts:{ms}"),
            Datum::Date(days) => write!(f, "date:{days}"),
            Datum::Bytes(b) => write!(f, "bytes[{}]", b.len()),
        }
    }
}
