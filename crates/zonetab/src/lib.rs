//! # zonetab
//!
//! Compile a raw timezone-transition database into compact, deterministic
//! lookup tables that a host application can embed with no runtime
//! parsing cost.
//!
//! Input is the timezonedb.com pair of tables (zones and transitions).
//! Output is an abbreviation enumeration, a zone enumeration, per-zone rule
//! sequences sorted by start time, and a zone → rules index. Identical
//! input always produces identical output.
//!
//! ## Modules
//!
//! - [`source`] — CSV row source for the zone and transition tables
//! - [`intern`] — Sentinel-bracketed symbol tables and the abbreviation interner
//! - [`aggregate`] — Group transitions by zone, chronologically sorted
//! - [`filter`] — History retention modes (all / default / current) with fallback
//! - [`rules`] — Rule records, time scales, and the rule table builder
//! - [`compile`] — The pipeline and the resulting [`CompiledDatabase`]
//! - [`packed`] — Eight-byte packed rule layout
//! - [`emit`] — Rust, JSON and binary artifact emitters
//! - [`error`] — Error types

pub mod aggregate;
pub mod compile;
pub mod emit;
pub mod error;
pub mod filter;
pub mod intern;
pub mod packed;
pub mod rules;
pub mod source;

pub use aggregate::{aggregate, Aggregated, ZoneAggregator, ZoneTransitions};
pub use compile::{
    compile, compile_aggregated, CompileOptions, CompiledDatabase, CompiledZone, Summary,
};
pub use emit::{emit_binary, emit_json, emit_rust, render, write_artifact, ArtifactFormat};
pub use error::{Result, ZonetabError};
pub use filter::{HistoryMode, CURRENT_WINDOW_SECONDS};
pub use intern::{AbbreviationInterner, Symbol, SymbolKind, SymbolTable, INVALID, MAX};
pub use packed::PackedRule;
pub use rules::{Rule, RuleTableBuilder, TimeScale, ZoneRules};
pub use source::{
    load_transitions, load_zones, read_transitions, read_zones, RawTransition, ZoneRecord,
};
