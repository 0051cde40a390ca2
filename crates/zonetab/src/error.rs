//! Error types for zonetab compilation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZonetabError {
    #[error(
        "Unknown zone: transition #{row} (abbreviation '{abbreviation}', start {start}) references zone id {zone_id}, which is not in the zone table"
    )]
    UnknownZone {
        row: usize,
        zone_id: i64,
        abbreviation: String,
        start: i64,
    },

    #[error("Duplicate zone: id {zone_id} ('{name}') is listed more than once")]
    DuplicateZone { zone_id: i64, name: String },

    #[error("Unresolved abbreviation: '{abbreviation}' in zone '{zone}' was never interned")]
    UnresolvedAbbreviation { zone: String, abbreviation: String },

    #[error("Identifier collision: {kind} '{first}' and '{second}' both map to '{identifier}'")]
    IdentifierCollision {
        kind: &'static str,
        identifier: String,
        first: String,
        second: String,
    },

    #[error("Too many symbols: {count} {kind} entries exceed the u16 ordinal range")]
    TooManySymbols { kind: &'static str, count: usize },

    #[error("Too many rules: {count} rules exceed the u32 count range of the binary layout")]
    TooManyRules { count: usize },

    #[error("Start time overflow: zone '{zone}' start {start} does not fit the configured time scale")]
    StartTimeOverflow { zone: String, start: i64 },

    #[error("Pack overflow: zone '{zone}' {field} {value} does not fit the packed rule layout")]
    PackOverflow {
        zone: String,
        field: &'static str,
        value: i64,
    },

    #[error("Malformed row: {table} line {line}: {reason}")]
    MalformedRow {
        table: &'static str,
        line: usize,
        reason: String,
    },

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ZonetabError>;
