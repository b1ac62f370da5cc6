// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Races `fut` against `cancel` and a timeout, the way every I/O call on
/// the connection's read/write halves is guarded.
pub(super) async fn io_with_timeout<F, T>(
    label: &'static str,
    fut: F,
    io_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Closed),
        res = timeout(io_timeout, fut) => {
            match res {
                Ok(inner) => inner,
                Err(_) => Err(Error::Timeout),
            }
        }
    }
    .map_err(|e| match e {
        Error::Timeout => Error::Timeout,
        other => {
            tracing::debug!("{label} failed: {other}");
            other
        },
    })
}
