//! Row source for the timezonedb.com CSV tables.
//!
//! Two tables feed the compiler:
//!
//! - `zone.csv` — `zone_id,country_code,zone_name`
//! - `timezone.csv` — `zone_id,abbreviation,time_start,gmt_offset,dst`
//!
//! Fields may be wrapped in double quotes. Blank lines are skipped. The
//! readers do no validation beyond field syntax; cross-table integrity is
//! checked by [`crate::aggregate`].

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Serialize;

use crate::error::{Result, ZonetabError};

const ZONE_TABLE: &str = "zone table";
const TRANSITION_TABLE: &str = "transition table";

/// A zone row: source id plus canonical IANA name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneRecord {
    pub id: i64,
    pub name: String,
}

/// A single transition row, exactly as read from the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawTransition {
    pub zone_id: i64,
    pub abbreviation: String,
    /// Unix seconds; negative before the epoch.
    pub start: i64,
    pub gmt_offset: i32,
    pub is_dst: bool,
}

impl ZoneRecord {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl RawTransition {
    pub fn new(
        zone_id: i64,
        abbreviation: impl Into<String>,
        start: i64,
        gmt_offset: i32,
        is_dst: bool,
    ) -> Self {
        Self {
            zone_id,
            abbreviation: abbreviation.into(),
            start,
            gmt_offset,
            is_dst,
        }
    }
}

/// Read zone rows from a `zone.csv` stream.
pub fn read_zones<R: BufRead>(reader: R) -> Result<Vec<ZoneRecord>> {
    let mut zones = Vec::new();
    for_each_row(reader, ZONE_TABLE, |line, fields| {
        if fields.len() < 3 {
            return Err(malformed(
                ZONE_TABLE,
                line,
                format!("expected at least 3 fields, found {}", fields.len()),
            ));
        }
        let id = parse_int(ZONE_TABLE, line, "zone_id", &fields[0])?;
        let name = fields[2].trim();
        if name.is_empty() {
            return Err(malformed(ZONE_TABLE, line, "empty zone name".to_string()));
        }
        zones.push(ZoneRecord::new(id, name));
        Ok(())
    })?;
    Ok(zones)
}

/// Read transition rows from a `timezone.csv` stream.
pub fn read_transitions<R: BufRead>(reader: R) -> Result<Vec<RawTransition>> {
    let mut transitions = Vec::new();
    for_each_row(reader, TRANSITION_TABLE, |line, fields| {
        if fields.len() < 5 {
            return Err(malformed(
                TRANSITION_TABLE,
                line,
                format!("expected 5 fields, found {}", fields.len()),
            ));
        }
        let zone_id = parse_int(TRANSITION_TABLE, line, "zone_id", &fields[0])?;
        let abbreviation = fields[1].trim();
        if abbreviation.is_empty() {
            return Err(malformed(
                TRANSITION_TABLE,
                line,
                "empty abbreviation".to_string(),
            ));
        }
        let start = parse_int(TRANSITION_TABLE, line, "time_start", &fields[2])?;
        let gmt_offset = parse_int(TRANSITION_TABLE, line, "gmt_offset", &fields[3])?;
        let gmt_offset = i32::try_from(gmt_offset).map_err(|_| {
            malformed(
                TRANSITION_TABLE,
                line,
                format!("gmt_offset {gmt_offset} out of range"),
            )
        })?;
        let is_dst = parse_flag(line, &fields[4])?;
        transitions.push(RawTransition::new(
            zone_id,
            abbreviation,
            start,
            gmt_offset,
            is_dst,
        ));
        Ok(())
    })?;
    Ok(transitions)
}

/// Open and read a `zone.csv` file.
pub fn load_zones(path: impl AsRef<Path>) -> Result<Vec<ZoneRecord>> {
    read_zones(BufReader::new(File::open(path)?))
}

/// Open and read a `timezone.csv` file.
pub fn load_transitions(path: impl AsRef<Path>) -> Result<Vec<RawTransition>> {
    read_transitions(BufReader::new(File::open(path)?))
}

// ── Internal helpers ────────────────────────────────────────────────────────

fn for_each_row<R, F>(reader: R, table: &'static str, mut handle: F) -> Result<()>
where
    R: BufRead,
    F: FnMut(usize, Vec<String>) -> Result<()>,
{
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_fields(line).map_err(|reason| malformed(table, line_no, reason))?;
        handle(line_no, fields)?;
    }
    Ok(())
}

/// Split one CSV line. Quoted fields may contain commas and `""` escapes.
fn split_fields(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(current);
    Ok(fields)
}

fn parse_int(table: &'static str, line: usize, field: &str, value: &str) -> Result<i64> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|e| malformed(table, line, format!("{field} '{value}': {e}")))
}

fn parse_flag(line: usize, value: &str) -> Result<bool> {
    match value.trim() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(malformed(
            TRANSITION_TABLE,
            line,
            format!("dst flag '{other}' is not 0/1"),
        )),
    }
}

fn malformed(table: &'static str, line: usize, reason: String) -> ZonetabError {
    ZonetabError::MalformedRow {
        table,
        line,
        reason,
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
