// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Charging session tracking and derived notification events.
//!
//! A small state machine over the boolean charging flag sampled every
//! poll: one "stopped" event per session that actually stops, at most one
//! "target reached" event per session no matter how many polls happen
//! while charging.

/// Event derived from a charging-state sample.
#[derive(Debug, Clone, PartialEq)]
pub enum ChargeEvent {
    /// Charging began this sample; resets the per-session latch.
    Started,
    /// Charging ended; carries the state of charge at stop time.
    Stopped { soc_percent: Option<f64> },
    /// SoC crossed the configured target while charging.
    TargetReached {
        soc_percent: f64,
        target_percent: u8,
    },
}

/// Tracks one vehicle's charging session across polls.
#[derive(Debug, Default)]
pub struct ChargeSessionTracker {
    was_charging: bool,
    notification_sent_for_session: bool,
}

impl ChargeSessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one poll's sample, returning the events it produced.
    pub fn observe(
        &mut self,
        is_charging: bool,
        soc_percent: Option<f64>,
        target_percent: Option<u8>,
    ) -> Vec<ChargeEvent> {
        let mut events = Vec::new();

        if !self.was_charging && is_charging {
            self.notification_sent_for_session = false;
            events.push(ChargeEvent::Started);
        }

        if self.was_charging && !is_charging {
            events.push(ChargeEvent::Stopped { soc_percent });
        }

        if is_charging && !self.notification_sent_for_session {
            if let (Some(soc), Some(target)) = (soc_percent, target_percent) {
                if soc >= f64::from(target) {
                    events.push(ChargeEvent::TargetReached {
                        soc_percent: soc,
                        target_percent: target,
                    });
                    self.notification_sent_for_session = true;
                }
            }
        }

        self.was_charging = is_charging;
        events
    }
}
