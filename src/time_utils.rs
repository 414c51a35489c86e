// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.
//!
//! Token expiry timestamps are timezone-naive local wall clock so they
//! compare directly against the scheduler's clock.

use chrono::NaiveDateTime;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Format a naive local timestamp as ISO 8601 (no offset).
pub fn format_naive_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse an ISO 8601 timestamp without offset, with or without
/// fractional seconds.
pub fn parse_naive_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok()
}
