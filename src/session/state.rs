// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The small state machines a [`crate::session::Session`] drives: the
//! session's own connection lifecycle, and the lifecycle of each
//! subscription/eval registration it tracks.

/// `Disconnected -> Connecting -> Authenticated -> Closing -> Disconnected`.
/// Any I/O error on the receiver moves the session straight back to
/// `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticated,
    Closing,
}

/// `Pending -> Active -> Cancelling -> Removed`. Notifications are only
/// delivered while `Active`; a notification that arrives while
/// `Cancelling` is dropped silently because the UNSUB ack is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Pending,
    Active,
    Cancelling,
}

impl SubscriptionState {
    pub fn accepts_notifications(self) -> bool {
        matches!(self, SubscriptionState::Active)
    }
}

/// `Pending -> Active -> Removing -> Removed`. An EVAL request that
/// arrives while `Removing` is answered with ERROR `NOT_FOUND` rather than
/// being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalState {
    Pending,
    Active,
    Removing,
}

impl EvalState {
    pub fn accepts_invocations(self) -> bool {
        matches!(self, EvalState::Active)
    }
}
