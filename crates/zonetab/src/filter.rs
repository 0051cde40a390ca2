//! History retention policy.
//!
//! One [`HistoryMode`] applies to every zone in a compilation run. Whatever
//! the mode, a zone with at least one transition always keeps at least one:
//! when the filter would drop everything, the chronologically last
//! transition is retained instead.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ZonetabError;
use crate::source::RawTransition;

/// Length of the `Current` retention window: 365 days.
pub const CURRENT_WINDOW_SECONDS: i64 = 365 * 24 * 60 * 60;

/// Which historical transitions survive compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    /// Keep every transition.
    All,
    /// Keep transitions starting at or after the Unix epoch.
    #[default]
    Default,
    /// Keep transitions starting within the 365 days before `now`.
    Current,
}

impl HistoryMode {
    /// Whether a single transition start passes the filter.
    pub fn keeps(self, start: i64, now: i64) -> bool {
        match self {
            HistoryMode::All => true,
            HistoryMode::Default => start >= 0,
            HistoryMode::Current => start > now.saturating_sub(CURRENT_WINDOW_SECONDS),
        }
    }

    /// Filter a chronologically sorted transition list.
    ///
    /// Returns borrowed transitions in their original order. Empty input
    /// yields empty output; any other input yields at least one element.
    pub fn retain<'a>(self, transitions: &'a [RawTransition], now: i64) -> Vec<&'a RawTransition> {
        let kept: Vec<&RawTransition> = transitions
            .iter()
            .filter(|t| self.keeps(t.start, now))
            .collect();
        if kept.is_empty() {
            return transitions.last().into_iter().collect();
        }
        kept
    }
}

impl fmt::Display for HistoryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HistoryMode::All => "all",
            HistoryMode::Default => "default",
            HistoryMode::Current => "current",
        })
    }
}

impl FromStr for HistoryMode {
    type Err = ZonetabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(HistoryMode::All),
            "default" => Ok(HistoryMode::Default),
            "current" => Ok(HistoryMode::Current),
            _ => Err(ZonetabError::InvalidOption(format!(
                "history mode '{s}' (expected all, default or current)"
            ))),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
