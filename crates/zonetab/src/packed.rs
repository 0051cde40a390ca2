//! Eight-byte packed rule layout for embedded targets.
//!
//! ```text
//! u32  time_start   low 32 bits of |start seconds|
//! u16  gmt_offset   |gmt offset seconds|
//! u16  data
//!      15..6  abbreviation ordinal   (10 bits)
//!      5      is_dst
//!      4      gmt offset sign        (set when offset < 1)
//!      3      start sign             (set when start < 1)
//!      2..0   bits 32..34 of |start|
//! ```
//!
//! |start| must stay below 2^35 seconds (roughly ±1089 years around the
//! epoch). Ordinal 0 is the Invalid sentinel, so a valid packed rule never
//! has a zero data word.

use serde::Serialize;

use crate::error::{Result, ZonetabError};
use crate::rules::{Rule, TimeScale};

const START_LIMIT: u64 = 1 << 35;
const ABBREVIATION_LIMIT: u16 = 1 << 10;

const DST_BIT: u16 = 0x20;
const OFFSET_SIGN_BIT: u16 = 0x10;
const START_SIGN_BIT: u16 = 0x08;
const START_HIGH_MASK: u16 = 0x07;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PackedRule {
    time_start: u32,
    gmt_offset: u16,
    data: u16,
}

impl PackedRule {
    /// Pack a rule whose start time is expressed in `scale` ticks.
    pub fn pack(rule: &Rule, scale: TimeScale, zone: &str) -> Result<Self> {
        let overflow = |field: &'static str, value: i64| ZonetabError::PackOverflow {
            zone: zone.to_string(),
            field,
            value,
        };

        let start = scale.to_seconds(rule.start_time);
        let abs_start = start.unsigned_abs();
        if abs_start >= START_LIMIT {
            return Err(overflow("start", start));
        }
        let abs_offset = u16::try_from(rule.gmt_offset.unsigned_abs())
            .map_err(|_| overflow("gmt_offset", i64::from(rule.gmt_offset)))?;
        if rule.abbreviation >= ABBREVIATION_LIMIT {
            return Err(overflow("abbreviation", i64::from(rule.abbreviation)));
        }

        let mut data = rule.abbreviation << 6;
        if rule.is_dst {
            data |= DST_BIT;
        }
        if rule.gmt_offset < 1 {
            data |= OFFSET_SIGN_BIT;
        }
        if start < 1 {
            data |= START_SIGN_BIT;
        }
        data |= (abs_start >> 32) as u16 & START_HIGH_MASK;

        Ok(Self {
            time_start: abs_start as u32,
            gmt_offset: abs_offset,
            data,
        })
    }

    /// Restore the rule, with its start time in seconds.
    pub fn unpack(&self) -> Rule {
        Rule {
            start_time: self.start_seconds(),
            abbreviation: self.abbreviation(),
            gmt_offset: self.gmt_offset(),
            is_dst: self.is_dst(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.data != 0
    }

    pub fn start_seconds(&self) -> i64 {
        let magnitude =
            (i64::from(self.data & START_HIGH_MASK) << 32) + i64::from(self.time_start);
        if self.data & START_SIGN_BIT != 0 {
            -magnitude
        } else {
            magnitude
        }
    }

    pub fn abbreviation(&self) -> u16 {
        self.data >> 6
    }

    pub fn gmt_offset(&self) -> i32 {
        if self.data & OFFSET_SIGN_BIT != 0 {
            -i32::from(self.gmt_offset)
        } else {
            i32::from(self.gmt_offset)
        }
    }

    pub fn is_dst(&self) -> bool {
        self.data & DST_BIT != 0
    }

    /// Little-endian byte form: time_start, gmt_offset, data.
    pub fn to_le_bytes(&self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&self.time_start.to_le_bytes());
        out[4..6].copy_from_slice(&self.gmt_offset.to_le_bytes());
        out[6..].copy_from_slice(&self.data.to_le_bytes());
        out
    }

    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self {
            time_start: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            gmt_offset: u16::from_le_bytes([bytes[4], bytes[5]]),
            data: u16::from_le_bytes([bytes[6], bytes[7]]),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(start_time: i64, abbreviation: u16, gmt_offset: i32, is_dst: bool) -> Rule {
        Rule {
            start_time,
            abbreviation,
            gmt_offset,
            is_dst,
        }
    }

    fn pack(r: &Rule) -> Result<PackedRule> {
        PackedRule::pack(r, TimeScale::Seconds, "Test/Zone")
    }

    #[test]
    fn test_extremes_of_source_range() {
        // Earliest and latest starts, widest offsets seen in the timezonedb tables.
        for r in [
            rule(-4_260_212_373, 316, -57_360, false),
            rule(16_720_524_000, 1, 54_822, true),
        ] {
            assert_eq!(pack(&r).unwrap().unpack(), r);
        }
    }

    #[test]
    fn test_zero_start_and_zero_offset() {
        let r = rule(0, 5, 0, false);
        let packed = pack(&r).unwrap();
        assert_eq!(packed.unpack(), r);
        assert!(packed.is_valid());
    }

    #[test]
    fn test_bit_layout() {
        let packed = pack(&rule(-1, 3, 3600, true)).unwrap();
        assert_eq!(packed.data, (3 << 6) | DST_BIT | START_SIGN_BIT);
        assert_eq!(packed.time_start, 1);
        assert_eq!(packed.gmt_offset, 3600);
    }

    #[test]
    fn test_scaled_start_packs_in_seconds() {
        let r = rule(-1_767_214_412_000, 2, -10_800, false);
        let packed = PackedRule::pack(&r, TimeScale::Millis, "America/Sao_Paulo").unwrap();
        assert_eq!(packed.start_seconds(), -1_767_214_412);
    }

    #[test]
    fn test_overflow_fields() {
        let start = pack(&rule(1 << 35, 1, 0, false)).unwrap_err();
        assert!(matches!(start, ZonetabError::PackOverflow { field: "start", .. }));

        let offset = pack(&rule(0, 1, 70_000, false)).unwrap_err();
        assert!(matches!(offset, ZonetabError::PackOverflow { field: "gmt_offset", .. }));

        let abbreviation = pack(&rule(0, 1024, 0, false)).unwrap_err();
        assert!(abbreviation.to_string().contains("Test/Zone"));
    }

    #[test]
    fn test_default_is_invalid() {
        assert!(!PackedRule::default().is_valid());
    }

    #[test]
    fn test_le_bytes() {
        let packed = pack(&rule(16_720_524_000, 316, -57_360, true)).unwrap();
        let bytes = packed.to_le_bytes();
        assert_eq!(PackedRule::from_le_bytes(bytes), packed);
        assert_eq!(&bytes[4..6], &57_360u16.to_le_bytes());
    }
}
