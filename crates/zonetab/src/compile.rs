//! The compilation pipeline and its output.
//!
//! ```text
//! zone rows ─┐
//!            ├─ ZoneAggregator ─ HistoryMode::retain ─ RuleTableBuilder ─ CompiledDatabase
//! transitions┘   (+ interning)
//! ```
//!
//! Everything runs once, in memory, on a single thread. Any error aborts
//! the run before a database exists, so no partial artifact can be
//! produced.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::aggregate::{aggregate, Aggregated};
use crate::error::Result;
use crate::filter::HistoryMode;
use crate::intern::{Symbol, SymbolKind, SymbolTable};
use crate::rules::{Rule, RuleTableBuilder, TimeScale, ZoneRules};
use crate::source::{RawTransition, ZoneRecord};

/// Options for [`compile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompileOptions {
    pub mode: HistoryMode,
    pub scale: TimeScale,
    /// The "now" anchor for [`HistoryMode::Current`], in Unix seconds.
    pub now: i64,
}

impl CompileOptions {
    /// Default mode and scale, anchored at `now`.
    pub fn new(now: i64) -> Self {
        Self {
            mode: HistoryMode::default(),
            scale: TimeScale::default(),
            now,
        }
    }

    pub fn with_mode(mut self, mode: HistoryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_scale(mut self, scale: TimeScale) -> Self {
        self.scale = scale;
        self
    }
}

/// A zone's view into a [`CompiledDatabase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompiledZone<'a> {
    pub ordinal: u16,
    pub identifier: &'a str,
    pub name: &'a str,
    pub rules: &'a [Rule],
}

/// Counts reported after a compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub mode: HistoryMode,
    pub scale: TimeScale,
    pub zones: usize,
    pub abbreviations: usize,
    pub rules: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} zones, {} abbreviations, {} rules (mode: {}, scale: {})",
            self.zones, self.abbreviations, self.rules, self.mode, self.scale
        )
    }
}

/// The compiled, immutable lookup tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledDatabase {
    mode: HistoryMode,
    scale: TimeScale,
    abbreviations: SymbolTable,
    zones: SymbolTable,
    rules: Vec<Rule>,
    index: Vec<ZoneRules>,
}

impl CompiledDatabase {
    pub fn mode(&self) -> HistoryMode {
        self.mode
    }

    pub fn scale(&self) -> TimeScale {
        self.scale
    }

    pub fn abbreviations(&self) -> &SymbolTable {
        &self.abbreviations
    }

    pub fn zones(&self) -> &SymbolTable {
        &self.zones
    }

    /// Every zone's rules, concatenated in zone ordinal order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// One entry per real zone, in ordinal order.
    pub fn index(&self) -> &[ZoneRules] {
        &self.index
    }

    /// Rules of the zone with the given ordinal. `None` for sentinels.
    pub fn rules_for(&self, zone: u16) -> Option<&[Rule]> {
        let entry = self.index.get(usize::from(zone).checked_sub(1)?)?;
        Some(&self.rules[entry.range()])
    }

    pub fn zone_by_name(&self, name: &str) -> Option<CompiledZone<'_>> {
        let ordinal = self.zones.ordinal(name)?;
        self.zone(ordinal)
    }

    pub fn zone(&self, ordinal: u16) -> Option<CompiledZone<'_>> {
        let rules = self.rules_for(ordinal)?;
        let symbol = self.zones.get(ordinal)?;
        Some(compiled_zone(symbol, rules))
    }

    /// All real zones in ordinal order.
    pub fn compiled_zones(&self) -> impl Iterator<Item = CompiledZone<'_>> + '_ {
        self.zones
            .real()
            .iter()
            .zip(&self.index)
            .map(|(symbol, entry)| compiled_zone(symbol, &self.rules[entry.range()]))
    }

    /// Display string of an abbreviation ordinal.
    pub fn abbreviation_name(&self, ordinal: u16) -> Option<&str> {
        self.abbreviations.display(ordinal)
    }

    pub fn summary(&self) -> Summary {
        Summary {
            mode: self.mode,
            scale: self.scale,
            zones: self.zones.len(),
            abbreviations: self.abbreviations.len(),
            rules: self.rules.len(),
        }
    }
}

fn compiled_zone<'a>(symbol: &'a Symbol, rules: &'a [Rule]) -> CompiledZone<'a> {
    CompiledZone {
        ordinal: symbol.ordinal,
        identifier: &symbol.identifier,
        name: &symbol.display,
        rules,
    }
}

/// Compile complete zone and transition tables.
///
/// # Errors
///
/// Returns [`crate::ZonetabError::UnknownZone`] or
/// [`crate::ZonetabError::DuplicateZone`] for inconsistent source tables,
/// and [`crate::ZonetabError::IdentifierCollision`] or
/// [`crate::ZonetabError::StartTimeOverflow`] when the tables cannot be
/// represented.
///
/// # Examples
///
/// ```
/// use zonetab::{compile, CompileOptions, HistoryMode, RawTransition, ZoneRecord};
///
/// let db = compile(
///     vec![ZoneRecord::new(1, "Asia/Karachi")],
///     vec![
///         RawTransition::new(1, "LMT", -1988166492, 16092, false),
///         RawTransition::new(1, "+05", 0, 18000, false),
///     ],
///     CompileOptions::new(0).with_mode(HistoryMode::Default),
/// )
/// .unwrap();
///
/// let zone = db.zone_by_name("Asia/Karachi").unwrap();
/// assert_eq!(zone.identifier, "Asia_Karachi");
/// assert_eq!(zone.rules.len(), 1);
/// assert_eq!(db.abbreviation_name(zone.rules[0].abbreviation), Some("+05"));
/// ```
pub fn compile<Z, T>(
    zones: Z,
    transitions: T,
    options: CompileOptions,
) -> Result<CompiledDatabase>
where
    Z: IntoIterator<Item = ZoneRecord>,
    T: IntoIterator<Item = RawTransition>,
{
    compile_aggregated(aggregate(zones, transitions)?, options)
}

/// Filter and encode an already aggregated database.
///
/// [`Aggregated`] keeps its zones in canonical name order, which is also
/// the zone enumeration order, so the n-th zone takes ordinal n.
pub fn compile_aggregated(
    aggregated: Aggregated,
    options: CompileOptions,
) -> Result<CompiledDatabase> {
    let (abbreviations, zones) = aggregated.into_parts();

    let names: BTreeSet<String> = zones.iter().map(|z| z.name().to_owned()).collect();
    let zone_table = SymbolTable::from_displays(SymbolKind::Zone, names)?;

    let mut builder = RuleTableBuilder::new(&abbreviations, options.scale);
    for (symbol, zone) in zone_table.real().iter().zip(&zones) {
        debug_assert_eq!(symbol.display, zone.name());
        let retained = options.mode.retain(zone.transitions(), options.now);
        debug!(
            zone = %zone.name(),
            total = zone.transitions().len(),
            retained = retained.len(),
            "filtered zone history"
        );
        builder.add_zone(symbol.ordinal, zone.name(), &retained)?;
    }
    let (rules, index) = builder.finish();

    let db = CompiledDatabase {
        mode: options.mode,
        scale: options.scale,
        abbreviations,
        zones: zone_table,
        rules,
        index,
    };
    info!(summary = %db.summary(), "compiled timezone database");
    Ok(db)
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::{INVALID, MAX};
    use crate::ZonetabError;

    fn sample_zones() -> Vec<ZoneRecord> {
        vec![
            ZoneRecord::new(10, "Europe/London"),
            ZoneRecord::new(20, "Asia/Karachi"),
            ZoneRecord::new(30, "America/Sao_Paulo"),
        ]
    }

    fn sample_transitions() -> Vec<RawTransition> {
        vec![
            RawTransition::new(10, "LMT", -3852662325, -75, false),
            RawTransition::new(10, "GMT", -3852662325 + 1, 0, false),
            RawTransition::new(10, "BST", 1_711_846_800, 3600, true),
            RawTransition::new(10, "GMT", 1_729_990_800, 0, false),
            RawTransition::new(20, "LMT", -1988166492, 16092, false),
            RawTransition::new(20, "+0530", -1988166492 + 1, 19800, false),
            RawTransition::new(20, "PKT", 1_009_821_600, 18000, false),
            RawTransition::new(30, "-03", -1767214412, -10800, false),
        ]
    }

    fn sample(mode: HistoryMode) -> CompiledDatabase {
        compile(
            sample_zones(),
            sample_transitions(),
            CompileOptions::new(1_740_000_000).with_mode(mode),
        )
        .unwrap()
    }

    // ── enumeration ─────────────────────────────────────────────────────

    #[test]
    fn test_zones_sorted_by_name_with_sentinels() {
        let db = sample(HistoryMode::All);
        let zones = db.zones();
        assert_eq!(zones.display(0), Some(INVALID));
        assert_eq!(zones.display(1), Some("America/Sao_Paulo"));
        assert_eq!(zones.display(2), Some("Asia/Karachi"));
        assert_eq!(zones.display(3), Some("Europe/London"));
        assert_eq!(zones.display(4), Some(MAX));
        assert_eq!(zones.max_ordinal(), 4);
    }

    #[test]
    fn test_index_matches_zone_ordinals() {
        let db = sample(HistoryMode::All);
        let ordinals: Vec<u16> = db.index().iter().map(|e| e.zone).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
        let total: usize = db.index().iter().map(|e| e.len).sum();
        assert_eq!(total, db.rules().len());
    }

    #[test]
    fn test_abbreviations_include_filtered_transitions() {
        let db = sample(HistoryMode::Current);
        assert!(db.abbreviations().ordinal("LMT").is_some());
    }

    // ── modes ───────────────────────────────────────────────────────────

    #[test]
    fn test_mode_all() {
        let db = sample(HistoryMode::All);
        assert_eq!(db.zone_by_name("Europe/London").unwrap().rules.len(), 4);
        assert_eq!(db.summary().rules, 8);
    }

    #[test]
    fn test_mode_default() {
        let db = sample(HistoryMode::Default);
        let london = db.zone_by_name("Europe/London").unwrap();
        assert_eq!(london.rules.len(), 2);
        let karachi = db.zone_by_name("Asia/Karachi").unwrap();
        assert_eq!(karachi.rules.len(), 1);
        assert_eq!(db.abbreviation_name(karachi.rules[0].abbreviation), Some("PKT"));
        // Only pre-epoch history: fallback to the last transition.
        let sao_paulo = db.zone_by_name("America/Sao_Paulo").unwrap();
        assert_eq!(sao_paulo.rules.len(), 1);
        assert_eq!(sao_paulo.rules[0].start_time, -1767214412);
    }

    #[test]
    fn test_mode_current() {
        let db = sample(HistoryMode::Current);
        let london = db.zone_by_name("Europe/London").unwrap();
        let starts: Vec<i64> = london.rules.iter().map(|r| r.start_time).collect();
        assert_eq!(starts, vec![1_711_846_800, 1_729_990_800]);
        let karachi = db.zone_by_name("Asia/Karachi").unwrap();
        assert_eq!(karachi.rules[0].start_time, 1_009_821_600);
    }

    #[test]
    fn test_every_zone_has_rules() {
        for mode in [HistoryMode::All, HistoryMode::Default, HistoryMode::Current] {
            let db = sample(mode);
            assert!(db.compiled_zones().all(|z| !z.rules.is_empty()), "{mode}");
        }
    }

    // ── encoding ────────────────────────────────────────────────────────

    #[test]
    fn test_scale_applied() {
        let db = compile(
            sample_zones(),
            sample_transitions(),
            CompileOptions::new(0)
                .with_mode(HistoryMode::All)
                .with_scale(TimeScale::Millis),
        )
        .unwrap();
        let sp = db.zone_by_name("America/Sao_Paulo").unwrap();
        assert_eq!(sp.rules[0].start_time, -1_767_214_412_000);
        assert_eq!(db.scale().to_seconds(sp.rules[0].start_time), -1767214412);
    }

    #[test]
    fn test_offsets_and_dst_copied() {
        let db = sample(HistoryMode::All);
        let london = db.zone_by_name("Europe/London").unwrap();
        assert_eq!(london.rules[0].gmt_offset, -75);
        assert!(london.rules[2].is_dst);
        assert_eq!(london.rules[2].gmt_offset, 3600);
    }

    // ── lookups ─────────────────────────────────────────────────────────

    #[test]
    fn test_sentinel_ordinals_have_no_rules() {
        let db = sample(HistoryMode::All);
        assert!(db.rules_for(0).is_none());
        assert!(db.rules_for(db.zones().max_ordinal()).is_none());
        assert!(db.zone_by_name("Invalid").is_none());
    }

    #[test]
    fn test_compiled_zones_in_order() {
        let db = sample(HistoryMode::All);
        let zones: Vec<(u16, &str)> = db
            .compiled_zones()
            .map(|z| (z.ordinal, z.identifier))
            .collect();
        assert_eq!(
            zones,
            vec![
                (1, "America_Sao_Paulo"),
                (2, "Asia_Karachi"),
                (3, "Europe_London"),
            ]
        );
    }

    // ── determinism and errors ──────────────────────────────────────────

    #[test]
    fn test_row_order_does_not_matter() {
        let mut zones = sample_zones();
        let mut transitions = sample_transitions();
        zones.reverse();
        transitions.reverse();
        let reordered = compile(zones, transitions, CompileOptions::new(1_740_000_000)).unwrap();
        assert_eq!(reordered, sample(HistoryMode::Default));
    }

    #[test]
    fn test_unknown_zone_aborts() {
        let mut transitions = sample_transitions();
        transitions.push(RawTransition::new(99, "XST", 0, 0, false));
        let err = compile(sample_zones(), transitions, CompileOptions::new(0)).unwrap_err();
        assert!(matches!(err, ZonetabError::UnknownZone { zone_id: 99, row: 9, .. }));
    }

    #[test]
    fn test_aggregated_rules_stay_with_their_zone() {
        let aggregated = aggregate(
            vec![ZoneRecord::new(1, "B/B"), ZoneRecord::new(2, "A/A"), ZoneRecord::new(3, "C/C")],
            vec![
                RawTransition::new(1, "BST", 0, 200, false),
                RawTransition::new(2, "AST", 0, 100, false),
            ],
        )
        .unwrap();
        let names: Vec<&str> = aggregated.zones().iter().map(|z| z.name()).collect();
        assert_eq!(names, vec!["A/A", "B/B"]);

        let db = compile_aggregated(aggregated, CompileOptions::new(0)).unwrap();
        assert_eq!(db.zones().len(), 2);
        assert_eq!(db.zone_by_name("A/A").unwrap().rules[0].gmt_offset, 100);
        assert_eq!(db.zone_by_name("B/B").unwrap().rules[0].gmt_offset, 200);
        assert!(db.zone_by_name("C/C").is_none());
        assert!(db.compiled_zones().all(|z| !z.rules.is_empty()));
    }

    #[test]
    fn test_empty_tables() {
        let db = compile(Vec::new(), Vec::new(), CompileOptions::new(0)).unwrap();
        assert_eq!(db.zones().entries().len(), 2);
        assert_eq!(db.abbreviations().entries().len(), 2);
        assert!(db.rules().is_empty());
    }

    #[test]
    fn test_summary_display() {
        let text = sample(HistoryMode::Default).summary().to_string();
        assert_eq!(
            text,
            "3 zones, 6 abbreviations, 4 rules (mode: default, scale: seconds)"
        );
    }
}
