//! Grouping of transition rows by owning zone.
//!
//! The aggregator is fed the zone table first, then every transition row.
//! Each row is checked against the zone table, its abbreviation interned,
//! and appended to its zone in source order. [`ZoneAggregator::finish`]
//! stable-sorts every zone chronologically and orders zones by canonical
//! name.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, ZonetabError};
use crate::intern::{AbbreviationInterner, SymbolTable};
use crate::source::{RawTransition, ZoneRecord};

/// A zone with its full, chronologically sorted transition history.
///
/// Only [`ZoneAggregator::finish`] builds these, so the history is never
/// empty and always sorted by start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneTransitions {
    id: i64,
    name: String,
    transitions: Vec<RawTransition>,
}

impl ZoneTransitions {
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Canonical zone name, e.g. `Europe/London`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transitions(&self) -> &[RawTransition] {
        &self.transitions
    }
}

/// Output of aggregation: interned abbreviations plus zones ordered by name.
///
/// The contents are read-only outside this module, so the ordering and
/// non-empty guarantees hold when the value reaches
/// [`compile_aggregated`](crate::compile::compile_aggregated).
///
/// ```compile_fail
/// let mut aggregated = zonetab::aggregate(Vec::new(), Vec::new()).unwrap();
/// aggregated.zones.reverse();
/// ```
#[derive(Debug, Clone)]
pub struct Aggregated {
    abbreviations: SymbolTable,
    zones: Vec<ZoneTransitions>,
}

impl Aggregated {
    pub fn abbreviations(&self) -> &SymbolTable {
        &self.abbreviations
    }

    /// Zones in canonical name order.
    pub fn zones(&self) -> &[ZoneTransitions] {
        &self.zones
    }

    pub(crate) fn into_parts(self) -> (SymbolTable, Vec<ZoneTransitions>) {
        (self.abbreviations, self.zones)
    }
}

/// Incremental builder for [`Aggregated`].
///
/// Register every zone with [`add_zone`](Self::add_zone) before feeding
/// transitions through [`add_transition`](Self::add_transition).
#[derive(Debug, Default)]
pub struct ZoneAggregator {
    zones: BTreeMap<i64, ZoneTransitions>,
    names: BTreeSet<String>,
    interner: AbbreviationInterner,
    rows: usize,
}

impl ZoneAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a zone. Ids and canonical names must both be unique.
    pub fn add_zone(&mut self, zone: ZoneRecord) -> Result<()> {
        if self.zones.contains_key(&zone.id) || self.names.contains(&zone.name) {
            return Err(ZonetabError::DuplicateZone {
                zone_id: zone.id,
                name: zone.name,
            });
        }
        self.names.insert(zone.name.clone());
        self.zones.insert(
            zone.id,
            ZoneTransitions {
                id: zone.id,
                name: zone.name,
                transitions: Vec::new(),
            },
        );
        Ok(())
    }

    /// Append a transition to its zone.
    ///
    /// Rows referencing an unregistered zone id are rejected; the error
    /// names the 1-based row number and the offending row.
    pub fn add_transition(&mut self, transition: RawTransition) -> Result<()> {
        self.rows += 1;
        let Some(zone) = self.zones.get_mut(&transition.zone_id) else {
            return Err(ZonetabError::UnknownZone {
                row: self.rows,
                zone_id: transition.zone_id,
                abbreviation: transition.abbreviation,
                start: transition.start,
            });
        };
        self.interner.intern(&transition.abbreviation);
        zone.transitions.push(transition);
        Ok(())
    }

    /// Finish aggregation.
    ///
    /// Zones with no transitions at all are dropped with a warning: they
    /// could never carry a rule.
    pub fn finish(self) -> Result<Aggregated> {
        let abbreviations = self.interner.finish()?;

        let mut zones: Vec<ZoneTransitions> = Vec::with_capacity(self.zones.len());
        for (_, mut zone) in self.zones {
            if zone.transitions.is_empty() {
                warn!(zone = %zone.name, id = zone.id, "zone has no transitions; skipping");
                continue;
            }
            // Stable: equal start instants keep source order.
            zone.transitions.sort_by_key(|t| t.start);
            zones.push(zone);
        }
        zones.sort_by(|a, b| a.name.cmp(&b.name));

        debug!(
            zones = zones.len(),
            rows = self.rows,
            abbreviations = abbreviations.len(),
            "aggregated transitions"
        );

        Ok(Aggregated {
            abbreviations,
            zones,
        })
    }
}

/// Aggregate complete zone and transition tables.
pub fn aggregate<Z, T>(zones: Z, transitions: T) -> Result<Aggregated>
where
    Z: IntoIterator<Item = ZoneRecord>,
    T: IntoIterator<Item = RawTransition>,
{
    let mut aggregator = ZoneAggregator::new();
    for zone in zones {
        aggregator.add_zone(zone)?;
    }
    for transition in transitions {
        aggregator.add_transition(transition)?;
    }
    aggregator.finish()
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn starts(zone: &ZoneTransitions) -> Vec<i64> {
        zone.transitions.iter().map(|t| t.start).collect()
    }

    #[test]
    fn test_groups_by_zone_and_orders_by_name() {
        let result = aggregate(
            vec![
                ZoneRecord::new(2, "Europe/Paris"),
                ZoneRecord::new(1, "America/New_York"),
            ],
            vec![
                RawTransition::new(2, "CET", 0, 3600, false),
                RawTransition::new(1, "EST", 0, -18000, false),
                RawTransition::new(2, "CEST", 100, 7200, true),
            ],
        )
        .unwrap();

        let names: Vec<&str> = result.zones.iter().map(|z| z.name.as_str()).collect();
        assert_eq!(names, vec!["America/New_York", "Europe/Paris"]);
        assert_eq!(starts(&result.zones[1]), vec![0, 100]);
        assert_eq!(result.abbreviations.len(), 3);
    }

    #[test]
    fn test_sorts_unsorted_feed_stably() {
        let result = aggregate(
            vec![ZoneRecord::new(1, "Test/Zone")],
            vec![
                RawTransition::new(1, "C", 300, 0, false),
                RawTransition::new(1, "A", 100, 0, false),
                RawTransition::new(1, "B1", 200, 0, false),
                RawTransition::new(1, "B2", 200, 0, true),
            ],
        )
        .unwrap();

        let zone = &result.zones[0];
        assert_eq!(starts(zone), vec![100, 200, 200, 300]);
        assert_eq!(zone.transitions[1].abbreviation, "B1");
        assert_eq!(zone.transitions[2].abbreviation, "B2");
    }

    #[test]
    fn test_unknown_zone_rejected_with_row() {
        let err = aggregate(
            vec![ZoneRecord::new(1, "Test/Zone")],
            vec![
                RawTransition::new(1, "UTC", 0, 0, false),
                RawTransition::new(7, "XST", -42, 0, false),
            ],
        )
        .unwrap_err();

        match &err {
            ZonetabError::UnknownZone {
                row,
                zone_id,
                abbreviation,
                start,
            } => {
                assert_eq!(*row, 2);
                assert_eq!(*zone_id, 7);
                assert_eq!(abbreviation, "XST");
                assert_eq!(*start, -42);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("zone id 7"));
    }

    #[test]
    fn test_duplicate_zone_id_rejected() {
        let err = aggregate(
            vec![ZoneRecord::new(1, "A/B"), ZoneRecord::new(1, "C/D")],
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ZonetabError::DuplicateZone { zone_id: 1, .. }));
    }

    #[test]
    fn test_duplicate_zone_name_rejected() {
        let err = aggregate(
            vec![ZoneRecord::new(1, "A/B"), ZoneRecord::new(2, "A/B")],
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ZonetabError::DuplicateZone { zone_id: 2, .. }));
    }

    #[test]
    fn test_zone_without_transitions_skipped() {
        let result = aggregate(
            vec![ZoneRecord::new(1, "Empty/Zone"), ZoneRecord::new(2, "Full/Zone")],
            vec![RawTransition::new(2, "UTC", 0, 0, false)],
        )
        .unwrap();
        assert_eq!(result.zones().len(), 1);
        assert_eq!(result.zones()[0].name(), "Full/Zone");
        assert!(!result.zones()[0].transitions().is_empty());
    }
}
