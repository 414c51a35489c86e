// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Adaptive poll interval computation.
//!
//! Two regimes per 24 h cycle. During the day the base interval applies.
//! During the configured night window, a parked-at-home car gets the long
//! cooldown interval to cut API load and vehicle wake-ups; a car that is
//! away polls at the base rate regardless of the hour. When a full
//! cooldown would overshoot the end of the night window, the next poll is
//! instead scheduled a few minutes past the window end so the morning
//! doesn't start with a multi-hour gap.

use chrono::{NaiveTime, Timelike};
use std::time::Duration;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Minutes past the night window end at which the transition poll lands.
const TRANSITION_BUFFER_MINUTES: i64 = 3;

/// Scheduler parameters, fixed at startup from configuration.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub base_interval: Duration,
    pub cooldown_interval: Duration,
    /// Night window start (wall clock, wraps midnight).
    pub night_start: NaiveTime,
    /// Night window end (wall clock).
    pub night_end: NaiveTime,
}

impl SchedulerConfig {
    /// Build from the hour-granularity configuration values; window
    /// boundaries land at half past the configured hours.
    pub fn from_hours(
        base_interval_secs: u64,
        cooldown_interval_secs: u64,
        night_start_hour: u32,
        night_end_hour: u32,
    ) -> Self {
        Self {
            base_interval: Duration::from_secs(base_interval_secs),
            cooldown_interval: Duration::from_secs(cooldown_interval_secs),
            night_start: NaiveTime::from_hms_opt(night_start_hour % 24, 30, 0)
                .expect("hour already reduced mod 24"),
            night_end: NaiveTime::from_hms_opt(night_end_hour % 24, 30, 0)
                .expect("hour already reduced mod 24"),
        }
    }
}

/// Compute the delay until the next poll.
///
/// Pure: the same `(now, at_home, config)` always yields the same delay.
/// `at_home` is the last known presence flag and may be stale; that is
/// deliberate (no fresh fix is available while the car sleeps).
pub fn next_poll_interval(now: NaiveTime, at_home: bool, config: &SchedulerConfig) -> Duration {
    let now_min = minute_of_day(now);
    let start_min = minute_of_day(config.night_start);
    let end_min = minute_of_day(config.night_end);

    // Window wraps midnight: 22:30..24:00 plus 00:00..06:30.
    let in_night = now_min >= start_min || now_min <= end_min;

    if !in_night {
        return config.base_interval;
    }

    if !at_home {
        // No cooldown benefit while the car is away from home.
        return config.base_interval;
    }

    let minutes_until_day = (end_min - now_min).rem_euclid(MINUTES_PER_DAY);
    let cooldown_minutes = config.cooldown_interval.as_secs() as i64 / 60;

    if minutes_until_day < cooldown_minutes {
        // A full cooldown would sleep past sunrise; land the next poll
        // shortly after the window ends instead.
        let transition_minutes = minutes_until_day + TRANSITION_BUFFER_MINUTES;
        let transition = Duration::from_secs(transition_minutes as u64 * 60);
        return transition.max(config.base_interval);
    }

    config.cooldown_interval
}

fn minute_of_day(t: NaiveTime) -> i64 {
    i64::from(t.hour()) * 60 + i64::from(t.minute())
}
