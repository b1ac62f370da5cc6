// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `Entry` (the result of `get`) and `Change` (a notification record).

use crate::model::{path::Path, value::Value};

/// One path/value pair returned by `Workspace::get`, optionally timestamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: Path,
    pub value: Value,
    pub timestamp: Option<u64>,
}

impl Entry {
    pub fn new(path: Path, value: Value, timestamp: Option<u64>) -> Self {
        Self { path, value, timestamp }
    }
}

/// Sorts entries ascending by timestamp (`None` sorts before any `Some`).
/// Ties keep their relative order, since [`slice::sort_by_key`] is stable.
pub fn sort_by_timestamp_ascending(entries: &mut [Entry]) {
    entries.sort_by_key(|e| e.timestamp);
}

/// The kind of change a [`Change`] notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Put,
    Update,
    Remove,
}

/// A single notified change, delivered to subscription listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub path: Path,
    pub kind: ChangeKind,
    pub timestamp: Option<u64>,
    pub value: Value,
}

impl Change {
    pub fn new(
        path: Path,
        kind: ChangeKind,
        timestamp: Option<u64>,
        value: Value,
    ) -> Self {
        Self { path, kind, timestamp, value }
    }
}
