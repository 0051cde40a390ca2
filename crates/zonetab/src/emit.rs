//! Artifact emitters.
//!
//! - [`ArtifactFormat::Rust`] — a Rust module with `Abbreviation` and
//!   `TimeZone` enums, display-name arrays, a flat `RULES` array and a
//!   `ZONE_RULES` index, ready for `include!`.
//! - [`ArtifactFormat::Json`] — the serialized [`CompiledDatabase`].
//! - [`ArtifactFormat::Binary`] — a little-endian blob with
//!   [`PackedRule`]s, ready for `include_bytes!`.
//!
//! [`write_artifact`] replaces the target atomically, so an aborted run
//! never leaves a partial file behind.

use std::fmt::{self, Write as _};
use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::compile::CompiledDatabase;
use crate::error::{Result, ZonetabError};
use crate::intern::SymbolTable;
use crate::packed::PackedRule;

/// Magic bytes opening a binary artifact.
pub const BINARY_MAGIC: &[u8; 4] = b"ZTAB";
/// Binary layout version.
pub const BINARY_VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtifactFormat {
    #[default]
    Rust,
    Json,
    Binary,
}

impl ArtifactFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactFormat::Rust => "rs",
            ArtifactFormat::Json => "json",
            ArtifactFormat::Binary => "bin",
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArtifactFormat::Rust => "rust",
            ArtifactFormat::Json => "json",
            ArtifactFormat::Binary => "binary",
        })
    }
}

impl FromStr for ArtifactFormat {
    type Err = ZonetabError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rust" | "rs" => Ok(ArtifactFormat::Rust),
            "json" => Ok(ArtifactFormat::Json),
            "binary" | "bin" => Ok(ArtifactFormat::Binary),
            _ => Err(ZonetabError::InvalidOption(format!(
                "artifact format '{s}' (expected rust, json or binary)"
            ))),
        }
    }
}

/// Render a database in the given format.
pub fn render(db: &CompiledDatabase, format: ArtifactFormat) -> Result<Vec<u8>> {
    match format {
        ArtifactFormat::Rust => Ok(emit_rust(db).into_bytes()),
        ArtifactFormat::Json => Ok(emit_json(db)?.into_bytes()),
        ArtifactFormat::Binary => emit_binary(db),
    }
}

/// Write `bytes` to `path`, replacing any existing file in one rename.
pub fn write_artifact(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = temporary_path(path);
    let written = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, path));
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    debug!(path = %path.display(), bytes = bytes.len(), "wrote artifact");
    Ok(())
}

fn temporary_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

// ── Rust ────────────────────────────────────────────────────────────────────

/// Render the Rust module form.
pub fn emit_rust(db: &CompiledDatabase) -> String {
    let mut out = String::new();
    // fmt::Write into a String cannot fail.
    let _ = write_rust(&mut out, db);
    out
}

fn write_rust(out: &mut String, db: &CompiledDatabase) -> fmt::Result {
    writeln!(
        out,
        "// @generated by zonetab {} (mode: {}, scale: {}). Do not edit.",
        env!("CARGO_PKG_VERSION"),
        db.mode(),
        db.scale()
    )?;
    writeln!(out)?;
    writeln!(
        out,
        "pub const TICKS_PER_SECOND: i64 = {};",
        db.scale().ticks_per_second()
    )?;
    writeln!(out)?;

    write_enum(out, "Abbreviation", db.abbreviations())?;
    write_names(out, "ABBREVIATION_NAMES", db.abbreviations())?;
    write_enum(out, "TimeZone", db.zones())?;
    write_names(out, "TIME_ZONE_NAMES", db.zones())?;

    out.push_str(
        "#[derive(Debug, Clone, Copy, PartialEq, Eq)]\n\
         pub struct Rule {\n    \
             pub start_time: i64,\n    \
             pub abbreviation: Abbreviation,\n    \
             pub gmt_offset: i32,\n    \
             pub is_dst: bool,\n\
         }\n\n",
    );

    let abbreviations = db.abbreviations();
    writeln!(out, "pub static RULES: [Rule; {}] = [", db.rules().len())?;
    for zone in db.compiled_zones() {
        writeln!(out, "    // {}", zone.name)?;
        for rule in zone.rules {
            let abbreviation = abbreviations
                .get(rule.abbreviation)
                .map_or("Invalid", |s| s.identifier.as_str());
            writeln!(
                out,
                "    Rule {{ start_time: {}, abbreviation: Abbreviation::{}, gmt_offset: {}, is_dst: {} }},",
                rule.start_time, abbreviation, rule.gmt_offset, rule.is_dst
            )?;
        }
    }
    writeln!(out, "];")?;
    writeln!(out)?;

    writeln!(
        out,
        "pub static ZONE_RULES: [(TimeZone, usize, usize); {}] = [",
        db.index().len()
    )?;
    for zone in db.compiled_zones() {
        let entry = &db.index()[usize::from(zone.ordinal) - 1];
        writeln!(
            out,
            "    (TimeZone::{}, {}, {}),",
            zone.identifier, entry.offset, entry.len
        )?;
    }
    writeln!(out, "];")?;
    writeln!(out)?;

    out.push_str(
        "/// Rules of `zone`, oldest first. Empty for `Invalid` and `_MAX`.\n\
         pub fn rules(zone: TimeZone) -> &'static [Rule] {\n    \
             match (zone as usize).checked_sub(1).and_then(|i| ZONE_RULES.get(i)) {\n        \
                 Some(&(_, offset, len)) => &RULES[offset..offset + len],\n        \
                 None => &[],\n    \
             }\n\
         }\n",
    );
    Ok(())
}

fn write_enum(out: &mut String, name: &str, table: &SymbolTable) -> fmt::Result {
    writeln!(out, "#[allow(non_camel_case_types)]")?;
    writeln!(out, "#[repr(u16)]")?;
    writeln!(
        out,
        "#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]"
    )?;
    writeln!(out, "pub enum {name} {{")?;
    for symbol in table.entries() {
        writeln!(out, "    {} = {},", symbol.identifier, symbol.ordinal)?;
    }
    writeln!(out, "}}")?;
    writeln!(out)
}

/// Display names indexed by ordinal; `_MAX` has no entry.
fn write_names(out: &mut String, name: &str, table: &SymbolTable) -> fmt::Result {
    let names = &table.entries()[..usize::from(table.max_ordinal())];
    writeln!(out, "pub static {name}: [&str; {}] = [", names.len())?;
    for symbol in names {
        writeln!(out, "    {:?},", symbol.display)?;
    }
    writeln!(out, "];")?;
    writeln!(out)
}

// ── JSON ────────────────────────────────────────────────────────────────────

/// Render the JSON form.
pub fn emit_json(db: &CompiledDatabase) -> Result<String> {
    let mut json = serde_json::to_string_pretty(db)?;
    json.push('\n');
    Ok(json)
}

// ── Binary ──────────────────────────────────────────────────────────────────

fn binary_rule_count(count: usize) -> Result<u32> {
    u32::try_from(count).map_err(|_| ZonetabError::TooManyRules { count })
}

/// Render the binary form.
///
/// ```text
/// "ZTAB"  u16 version  u16 abbreviation names  u16 zone names  u32 rules
/// abbreviation names  (u8 length + UTF-8), ordinals 0.._MAX
/// zone names          (u8 length + UTF-8), ordinals 0.._MAX
/// index               (u32 offset, u32 length) per real zone
/// rules               8-byte packed rules, start times in seconds
/// ```
pub fn emit_binary(db: &CompiledDatabase) -> Result<Vec<u8>> {
    let rule_count = binary_rule_count(db.rules().len())?;

    let mut out = Vec::with_capacity(16 + db.rules().len() * 8);
    out.extend_from_slice(BINARY_MAGIC);
    out.extend_from_slice(&BINARY_VERSION.to_le_bytes());
    out.extend_from_slice(&db.abbreviations().max_ordinal().to_le_bytes());
    out.extend_from_slice(&db.zones().max_ordinal().to_le_bytes());
    out.extend_from_slice(&rule_count.to_le_bytes());

    write_binary_names(&mut out, db.abbreviations())?;
    write_binary_names(&mut out, db.zones())?;

    for entry in db.index() {
        // Both bounded by rule_count.
        out.extend_from_slice(&(entry.offset as u32).to_le_bytes());
        out.extend_from_slice(&(entry.len as u32).to_le_bytes());
    }

    for zone in db.compiled_zones() {
        for rule in zone.rules {
            let packed = PackedRule::pack(rule, db.scale(), zone.name)?;
            out.extend_from_slice(&packed.to_le_bytes());
        }
    }
    Ok(out)
}

fn write_binary_names(out: &mut Vec<u8>, table: &SymbolTable) -> Result<()> {
    for symbol in &table.entries()[..usize::from(table.max_ordinal())] {
        let bytes = symbol.display.as_bytes();
        let len = u8::try_from(bytes.len()).map_err(|_| ZonetabError::PackOverflow {
            zone: symbol.display.clone(),
            field: "name length",
            value: bytes.len() as i64,
        })?;
        out.push(len);
        out.extend_from_slice(bytes);
    }
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────────────
