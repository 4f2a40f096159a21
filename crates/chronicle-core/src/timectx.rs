//! Time-context description for narration prompts.
//!
//! The oracle writes better prose when it knows roughly *when* things
//! are happening. This module derives time-of-day and season from the
//! logical clock value (unix milliseconds), phrases the gap since the
//! last buffered event in human terms, and folds in the mood carried
//! over from the previous narration.
//!
//! Time-of-day and season are always computed from the clock value,
//! never stored -- the clock is the source of truth.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Coarse phase of the day, derived from the clock's UTC hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeOfDay {
    /// Early transition from night to day (05:00-08:00).
    Dawn,
    /// 08:00-12:00.
    Morning,
    /// 12:00-17:00.
    Afternoon,
    /// 17:00-20:00.
    Dusk,
    /// 20:00-05:00.
    Night,
}

impl TimeOfDay {
    /// Lowercase label used in prompt text.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dawn => "dawn",
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Dusk => "dusk",
            Self::Night => "night",
        }
    }
}

/// Season, derived from the clock's UTC month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Season {
    /// March-May.
    Spring,
    /// June-August.
    Summer,
    /// September-November.
    Autumn,
    /// December-February.
    Winter,
}

impl Season {
    /// Lowercase label used in prompt text.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Autumn => "autumn",
            Self::Winter => "winter",
        }
    }
}

/// Assembled temporal context for one narration invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeContext {
    /// Phase of day at the clock value.
    pub time_of_day: TimeOfDay,
    /// Season at the clock value.
    pub season: Season,
    /// Human phrasing of the gap since the last buffered event.
    pub since_last: String,
    /// Mood carried from the previous narration, oldest first.
    pub mood: Vec<String>,
}

impl TimeContext {
    /// Build the context for a clock value.
    ///
    /// `last_event_ms` is the newest buffered event timestamp, when the
    /// agent has any history.
    pub fn at(now_ms: i64, last_event_ms: Option<i64>, mood: Vec<String>) -> Self {
        Self {
            time_of_day: time_of_day(now_ms),
            season: season(now_ms),
            since_last: describe_elapsed(last_event_ms.map(|t| now_ms.saturating_sub(t))),
            mood,
        }
    }

    /// Render the context as a single prompt line.
    pub fn describe(&self) -> String {
        let mood = if self.mood.is_empty() {
            "neutral".to_owned()
        } else {
            self.mood.join(", ")
        };
        format!(
            "It is {} on a {} day; {}. The prevailing mood is {}.",
            self.time_of_day.as_str(),
            self.season.as_str(),
            self.since_last,
            mood
        )
    }
}

/// Derive the phase of day from a unix-ms clock value.
pub fn time_of_day(now_ms: i64) -> TimeOfDay {
    match utc(now_ms).hour() {
        5..=7 => TimeOfDay::Dawn,
        8..=11 => TimeOfDay::Morning,
        12..=16 => TimeOfDay::Afternoon,
        17..=19 => TimeOfDay::Dusk,
        _ => TimeOfDay::Night,
    }
}

/// Derive the season from a unix-ms clock value.
pub fn season(now_ms: i64) -> Season {
    match utc(now_ms).month() {
        3..=5 => Season::Spring,
        6..=8 => Season::Summer,
        9..=11 => Season::Autumn,
        _ => Season::Winter,
    }
}

/// Phrase an elapsed duration in human terms.
fn describe_elapsed(elapsed_ms: Option<i64>) -> String {
    let Some(ms) = elapsed_ms else {
        return "nothing has been recorded here yet".to_owned();
    };
    let ms = ms.max(0);
    if ms < 1_000 {
        "the last event was moments ago".to_owned()
    } else if ms < 60_000 {
        format!("the last event was {} seconds ago", ms.saturating_div(1_000))
    } else if ms < 3_600_000 {
        format!("the last event was {} minutes ago", ms.saturating_div(60_000))
    } else {
        format!("the last event was {} hours ago", ms.saturating_div(3_600_000))
    }
}

/// Convert unix milliseconds to a UTC datetime, clamping out-of-range
/// values to the epoch.
fn utc(now_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(now_ms).unwrap_or_else(|| DateTime::UNIX_EPOCH)
}
