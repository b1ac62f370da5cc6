// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The tagged value payload carried by PUT/GET/NOTIFY/VALUES bodies.

use crate::{
    codec::vle,
    error::{Error, Result},
};

/// The wire encoding discriminator. `Protobuf` is reserved and MUST NOT
/// appear on the wire in this version; `Invalid` is a sentinel that is
/// never serialized.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Raw = 0x00,
    String = 0x01,
    Json = 0x02,
    Sql = 0x03,
    Protobuf = 0x04,
    Invalid = 0xFF,
}

impl TryFrom<u8> for Encoding {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self> {
        Ok(match byte {
            0x00 => Self::Raw,
            0x01 => Self::String,
            0x02 => Self::Json,
            0x03 => Self::Sql,
            0x04 => Self::Protobuf,
            other => return Err(Error::InvalidEncoding(format!("0x{other:02x}"))),
        })
    }
}

/// A tagged value. `Raw` carries a free-form `representation` tag; the
/// other variants do not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Raw { payload: String, representation: String },
    String(String),
    Json(String),
    Sql { row_values: Vec<String>, column_names: Vec<String> },
}

impl Value {
    /// Convenience constructor matching the upstream default: `RAW` with
    /// an empty representation.
    pub fn raw(payload: impl Into<String>) -> Self {
        Self::Raw {
            payload: payload.into(),
            representation: String::new(),
        }
    }

    pub fn string(payload: impl Into<String>) -> Self {
        Self::String(payload.into())
    }

    pub fn json(payload: impl Into<String>) -> Self {
        Self::Json(payload.into())
    }

    pub fn sql(row_values: Vec<String>, column_names: Vec<String>) -> Self {
        Self::Sql { row_values, column_names }
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            Value::Raw { .. } => Encoding::Raw,
            Value::String(_) => Encoding::String,
            Value::Json(_) => Encoding::Json,
            Value::Sql { .. } => Encoding::Sql,
        }
    }

    /// Serializes this value per §6's "Encoded value layout".
    pub fn as_bytes(&self) -> Vec<u8> {
        let mut out = vec![self.encoding() as u8];
        match self {
            Value::Raw { payload, representation } => {
                push_string(&mut out, representation);
                push_string(&mut out, payload);
            },
            Value::String(s) | Value::Json(s) => {
                push_string(&mut out, s);
            },
            Value::Sql { row_values, column_names } => {
                push_string_list(&mut out, row_values);
                push_string_list(&mut out, column_names);
            },
        }
        out
    }

    /// Deserializes a value starting at `buf[0]`. Returns the value and
    /// the number of bytes consumed.
    pub fn from_bytes(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.is_empty() {
            return Err(Error::malformed("empty value"));
        }
        let encoding = Encoding::try_from(buf[0])?;
        let mut pos = 1;
        let value = match encoding {
            Encoding::Raw => {
                let (representation, consumed) = read_string(buf, pos)?;
                pos += consumed;
                let (payload, consumed) = read_string(buf, pos)?;
                pos += consumed;
                Value::Raw { payload, representation }
            },
            Encoding::String => {
                let (s, consumed) = read_string(buf, pos)?;
                pos += consumed;
                Value::String(s)
            },
            Encoding::Json => {
                let (s, consumed) = read_string(buf, pos)?;
                pos += consumed;
                Value::Json(s)
            },
            Encoding::Sql => {
                let (row_values, consumed) = read_string_list(buf, pos)?;
                pos += consumed;
                let (column_names, consumed) = read_string_list(buf, pos)?;
                pos += consumed;
                Value::Sql { row_values, column_names }
            },
            Encoding::Protobuf => {
                return Err(Error::InvalidEncoding("PROTOBUF is unsupported".into()));
            },
            Encoding::Invalid => {
                return Err(Error::InvalidEncoding("INVALID".into()));
            },
        };
        Ok((value, pos))
    }
}

fn push_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&vle::encode(s.len() as u64));
    out.extend_from_slice(s.as_bytes());
}

fn push_string_list(out: &mut Vec<u8>, items: &[String]) {
    out.extend_from_slice(&vle::encode(items.len() as u64));
    for item in items {
        push_string(out, item);
    }
}

fn read_string(buf: &[u8], pos: usize) -> Result<(String, usize)> {
    let (len, len_consumed) = vle::decode(&buf[pos..])?;
    let len = len as usize;
    let start = pos + len_consumed;
    let end = start.checked_add(len).ok_or_else(|| Error::malformed("string length overflow"))?;
    let bytes = buf
        .get(start..end)
        .ok_or_else(|| Error::malformed("truncated string"))?;
    let s = String::from_utf8(bytes.to_vec())
        .map_err(|e| Error::malformed(format!("invalid utf-8: {e}")))?;
    Ok((s, len_consumed + len))
}

fn read_string_list(buf: &[u8], pos: usize) -> Result<(Vec<String>, usize)> {
    let (count, mut consumed) = vle::decode(&buf[pos..])?;
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (s, n) = read_string(buf, pos + consumed)?;
        consumed += n;
        items.push(s);
    }
    Ok((items, consumed))
}
