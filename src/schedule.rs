use chrono::{Datelike as _, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Weekly "a page change was already seen" flag for a gated source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleFlag {
    pub week_number: u32,
    pub found: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Skip,
}

/// Decides whether a gated source is checked on a given day.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleGate {
    reduced_day: Weekday,
}

impl ScheduleGate {
    pub fn new(reduced_day: Weekday) -> Self {
        Self { reduced_day }
    }

    pub fn reduced_day(&self) -> Weekday {
        self.reduced_day
    }

    /// Rolls the flag into the current ISO week, then decides.
    ///
    /// The rollover is applied to `flag` even when the decision is `Proceed`,
    /// so the caller must persist it.
    pub fn evaluate(&self, flag: &mut ScheduleFlag, today: NaiveDate) -> GateDecision {
        let week = iso_week(today);
        if flag.week_number != week {
            tracing::debug!(
                stored_week = flag.week_number,
                current_week = week,
                "schedule flag rolled over"
            );
            *flag = ScheduleFlag {
                week_number: week,
                found: false,
            };
        }

        if today.weekday() == self.reduced_day && flag.found {
            GateDecision::Skip
        } else {
            GateDecision::Proceed
        }
    }

    /// Applies a freshly observed page marker to the flag.
    ///
    /// Returns whether the marker changed against a previously observed one.
    /// The first ever observation (`previous == ""`) never raises the flag.
    pub fn observe_marker(
        &self,
        flag: &mut ScheduleFlag,
        previous: &str,
        current: &str,
        today: NaiveDate,
    ) -> bool {
        if previous.is_empty() || previous == current {
            return false;
        }
        *flag = ScheduleFlag {
            week_number: iso_week(today),
            found: true,
        };
        true
    }
}

pub fn iso_week(date: NaiveDate) -> u32 {
    date.iso_week().week()
}

pub fn parse_weekday(raw: &str) -> anyhow::Result<Weekday> {
    raw.trim()
        .parse::<Weekday>()
        .map_err(|_| anyhow::anyhow!("unsupported weekday: {raw:?} (expected e.g. mon, fri)"))
}
