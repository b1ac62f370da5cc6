// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Length-prefixed reader/writer for [`Message`] over any async byte
//! stream. Plain, cancellation-agnostic I/O; [`crate::session::connection`]
//! layers timeouts and cancellation on top, the way the connection layer
//! this crate is grounded on separates raw framing from its timeout/cancel
//! discipline.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    error::{Error, Result},
    model::message::Message,
};

/// Maximum number of VLE continuation bytes read for a length prefix
/// before giving up; mirrors the VLE codec's own 64-bit budget.
const MAX_VLE_BYTES: usize = 10;

async fn read_vle<R: AsyncRead + Unpin>(r: &mut R) -> Result<u64> {
    let mut value: u64 = 0;
    for i in 0..MAX_VLE_BYTES {
        let byte = r
            .read_u8()
            .await
            .map_err(|e| Error::ConnectionLost(e.to_string()))?;
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(Error::malformed("VLE length prefix overflows 64 bits"))
}

fn write_vle(out: &mut Vec<u8>, mut n: u64) {
    loop {
        let byte = (n & 0x7f) as u8;
        n >>= 7;
        if n != 0 {
            out.push(byte | 0x80);
        } else {
            out.push(byte);
            break;
        }
    }
}

/// Reads one length-prefixed message from `r`. Fails with
/// [`Error::ConnectionLost`] on a short read (including a clean EOF) and
/// with [`Error::Malformed`] if the decoded bytes are not a well-formed
/// message.
pub async fn read_message<R: AsyncRead + Unpin>(r: &mut R) -> Result<Message> {
    let len = read_vle(r).await? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)
        .await
        .map_err(|e| Error::ConnectionLost(e.to_string()))?;
    Message::decode(&buf)
}

/// Writes one length-prefixed message to `w`, flushing on completion.
pub async fn write_message<W: AsyncWrite + Unpin>(
    w: &mut W,
    message: &Message,
) -> Result<()> {
    let body = message.encode();
    let mut framed = Vec::with_capacity(body.len() + 4);
    write_vle(&mut framed, body.len() as u64);
    framed.extend_from_slice(&body);
    w.write_all(&framed)
        .await
        .map_err(|e| Error::ConnectionLost(e.to_string()))?;
    w.flush().await.map_err(|e| Error::ConnectionLost(e.to_string()))?;
    Ok(())
}
