// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use dashmap::DashMap;
use rand::RngExt;

/// Draws a random 32-bit correlation id and redraws on collision against
/// `taken` (the session's pending-request registry). `0` is reserved for
/// server-initiated NOTIFY messages and is never returned.
pub fn generate_corr_id<V>(taken: &DashMap<u64, V>) -> u64 {
    loop {
        let candidate: u32 = rand::rng().random();
        let candidate = u64::from(candidate);
        if candidate != 0 && !taken.contains_key(&candidate) {
            return candidate;
        }
    }
}
