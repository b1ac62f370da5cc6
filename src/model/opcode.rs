// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The message-code byte that opens every wire message.

use thiserror::Error;

/// All message codes defined by the wire protocol.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    #[default]
    Login = 0x01,
    Logout = 0x02,
    Workspace = 0x03,

    Put = 0xA0,
    Update = 0xA1,
    Get = 0xA2,
    Delete = 0xA3,

    Sub = 0xB0,
    Unsub = 0xB1,
    Notify = 0xB2,
    Eval = 0xB3,

    Ok = 0xD0,
    Values = 0xD1,

    Error = 0xE0,
}

/// Returned when a byte does not match any defined [`Code`].
#[derive(Debug, Error)]
#[error("unknown message code: 0x{0:02x}")]
pub struct UnknownCode(pub u8);

impl TryFrom<u8> for Code {
    type Error = UnknownCode;

    fn try_from(byte: u8) -> Result<Self, <Self as TryFrom<u8>>::Error> {
        Ok(match byte {
            0x01 => Self::Login,
            0x02 => Self::Logout,
            0x03 => Self::Workspace,
            0xA0 => Self::Put,
            0xA1 => Self::Update,
            0xA2 => Self::Get,
            0xA3 => Self::Delete,
            0xB0 => Self::Sub,
            0xB1 => Self::Unsub,
            0xB2 => Self::Notify,
            0xB3 => Self::Eval,
            0xD0 => Self::Ok,
            0xD1 => Self::Values,
            0xE0 => Self::Error,
            other => return Err(UnknownCode(other)),
        })
    }
}

impl From<Code> for u8 {
    fn from(code: Code) -> u8 {
        code as u8
    }
}

/// Bit 0 of the flags byte: properties section present.
pub const FLAG_P: u8 = 0x01;
