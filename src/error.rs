// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The error taxonomy for the Yaks client.
//!
//! Fallible public entry points return [`Result<T>`] = `Result<T, Error>`.
//! Internal glue (config loading, raw I/O) is free to use `anyhow::Result`
//! and convert into a typed [`Error`] at the public-API boundary.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Kinds of failure a caller of this crate can observe.
#[derive(Debug, Error)]
pub enum Error {
    /// A [`crate::model::path::Path`] string failed the path grammar.
    #[error("{0} is not a valid Path")]
    InvalidPath(String),

    /// A [`crate::model::selector::Selector`] string failed the selector
    /// grammar.
    #[error("{0} is not a valid Selector")]
    InvalidSelector(String),

    /// A `Value` carried an encoding that cannot be serialized (e.g.
    /// `INVALID`, or `PROTOBUF` which is reserved and unsupported).
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// The wire bytes could not be decoded into a well-formed message.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A message of an unexpected code arrived where a specific response
    /// was expected.
    #[error("unexpected message code 0x{0:02x}")]
    UnexpectedMessage(u8),

    /// LOGIN was rejected, or no response arrived before the login
    /// deadline.
    #[error("authentication failed")]
    AuthFailed,

    /// The underlying byte stream failed or was reset.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The session was closed (by `logout()` or a fatal decode error)
    /// while a request was still outstanding.
    #[error("session closed")]
    Closed,

    /// A request's deadline elapsed before a response arrived.
    #[error("request timed out")]
    Timeout,

    /// The server answered with an ERROR message; `errno` is returned
    /// verbatim.
    #[error("server error: {0}")]
    ServerError(u64),

    /// An operation the upstream protocol declares but does not define
    /// semantics for.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// Wraps lower-level I/O failures.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_path(s: impl Into<String>) -> Self {
        Self::InvalidPath(s.into())
    }

    pub fn invalid_selector(s: impl Into<String>) -> Self {
        Self::InvalidSelector(s.into())
    }

    pub fn malformed(s: impl Into<String>) -> Self {
        Self::Malformed(s.into())
    }
}
