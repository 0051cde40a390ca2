//! Canonical rule records and the per-zone rule table.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Result, ZonetabError};
use crate::intern::SymbolTable;
use crate::source::RawTransition;

/// Tick unit for encoded rule start times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeScale {
    #[default]
    Seconds,
    Millis,
    Micros,
    Nanos,
}

impl TimeScale {
    pub fn ticks_per_second(self) -> i64 {
        match self {
            TimeScale::Seconds => 1,
            TimeScale::Millis => 1_000,
            TimeScale::Micros => 1_000_000,
            TimeScale::Nanos => 1_000_000_000,
        }
    }

    /// Scale Unix seconds to ticks. `None` on `i64` overflow.
    pub fn to_ticks(self, seconds: i64) -> Option<i64> {
        seconds.checked_mul(self.ticks_per_second())
    }

    /// Inverse of [`TimeScale::to_ticks`]; exact for any value it produced.
    pub fn to_seconds(self, ticks: i64) -> i64 {
        ticks / self.ticks_per_second()
    }
}

impl fmt::Display for TimeScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimeScale::Seconds => "seconds",
            TimeScale::Millis => "millis",
            TimeScale::Micros => "micros",
            TimeScale::Nanos => "nanos",
        })
    }
}

impl FromStr for TimeScale {
    type Err = ZonetabError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "seconds" | "s" => Ok(TimeScale::Seconds),
            "millis" | "ms" => Ok(TimeScale::Millis),
            "micros" | "us" => Ok(TimeScale::Micros),
            "nanos" | "ns" => Ok(TimeScale::Nanos),
            _ => Err(ZonetabError::InvalidOption(format!(
                "time scale '{s}' (expected seconds, millis, micros or nanos)"
            ))),
        }
    }
}

/// A compiled civil-time rule, in effect from `start_time` until the next
/// rule of the same zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rule {
    /// Start instant in the database's [`TimeScale`] ticks.
    pub start_time: i64,
    /// Abbreviation ordinal; never a sentinel.
    pub abbreviation: u16,
    pub gmt_offset: i32,
    pub is_dst: bool,
}

/// Location of one zone's rules within the flat rule array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZoneRules {
    pub zone: u16,
    pub offset: usize,
    pub len: usize,
}

impl ZoneRules {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Accumulates every zone's rules into one flat array plus an index.
///
/// Zones must be added in ascending ordinal order.
#[derive(Debug)]
pub struct RuleTableBuilder<'a> {
    abbreviations: &'a SymbolTable,
    scale: TimeScale,
    rules: Vec<Rule>,
    index: Vec<ZoneRules>,
}

impl<'a> RuleTableBuilder<'a> {
    pub fn new(abbreviations: &'a SymbolTable, scale: TimeScale) -> Self {
        Self {
            abbreviations,
            scale,
            rules: Vec::new(),
            index: Vec::new(),
        }
    }

    /// Convert a zone's retained transitions and append them.
    pub fn add_zone(
        &mut self,
        zone: u16,
        zone_name: &str,
        retained: &[&RawTransition],
    ) -> Result<()> {
        let offset = self.rules.len();
        for transition in retained {
            let rule = self.rule(zone_name, transition)?;
            self.rules.push(rule);
        }
        self.index.push(ZoneRules {
            zone,
            offset,
            len: retained.len(),
        });
        Ok(())
    }

    pub fn finish(self) -> (Vec<Rule>, Vec<ZoneRules>) {
        (self.rules, self.index)
    }

    fn rule(&self, zone_name: &str, transition: &RawTransition) -> Result<Rule> {
        let abbreviation = self
            .abbreviations
            .ordinal(&transition.abbreviation)
            .ok_or_else(|| ZonetabError::UnresolvedAbbreviation {
                zone: zone_name.to_string(),
                abbreviation: transition.abbreviation.clone(),
            })?;
        let start_time =
            self.scale
                .to_ticks(transition.start)
                .ok_or_else(|| ZonetabError::StartTimeOverflow {
                    zone: zone_name.to_string(),
                    start: transition.start,
                })?;
        Ok(Rule {
            start_time,
            abbreviation,
            gmt_offset: transition.gmt_offset,
            is_dst: transition.is_dst,
        })
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
