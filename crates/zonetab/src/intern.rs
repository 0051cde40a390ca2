//! Dense symbol tables with reserved sentinels.
//!
//! Both the abbreviation table and the zone enumeration follow the same
//! discipline: ordinal 0 is always [`INVALID`], the last ordinal is always
//! [`MAX`], and real entries occupy the ordinals in between.
//!
//! Real entries are ordered by a byte-wise sort of their display strings,
//! so the assignment depends only on the *set* of inputs and never on the
//! order rows arrive in.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::error::{Result, ZonetabError};

/// Sentinel at ordinal 0.
pub const INVALID: &str = "Invalid";
/// Sentinel at the last ordinal; doubles as the entry count bound.
pub const MAX: &str = "_MAX";

/// Which enumeration a table describes. Controls identifier normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Abbreviation,
    Zone,
}

impl SymbolKind {
    /// Lowercase name used in error messages and logs.
    pub fn label(self) -> &'static str {
        match self {
            SymbolKind::Abbreviation => "abbreviation",
            SymbolKind::Zone => "zone",
        }
    }

    /// Identifier-safe form of a display string.
    ///
    /// Abbreviations map `+` to `p` and `-` to `m` (`+05` becomes `p05`).
    /// Zone names map `/` and `-` to `_` and `+` to `p`
    /// (`America/Port-au-Prince` becomes `America_Port_au_Prince`).
    /// Anything else outside `[A-Za-z0-9_]` becomes `_`, and a leading digit
    /// gets a `_` prefix.
    pub fn identifier(self, display: &str) -> String {
        let mut ident = String::with_capacity(display.len() + 1);
        for ch in display.chars() {
            let mapped = match (self, ch) {
                (_, '+') => 'p',
                (SymbolKind::Abbreviation, '-') => 'm',
                (_, c) if c.is_ascii_alphanumeric() || c == '_' => c,
                _ => '_',
            };
            ident.push(mapped);
        }
        if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
            ident.insert(0, '_');
        }
        ident
    }
}

/// One enumeration member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub ordinal: u16,
    /// Enumeration member name in the emitted artifact.
    pub identifier: String,
    /// Original string, unmodified.
    pub display: String,
}

/// An ordered, sentinel-bracketed symbol enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolTable {
    kind: SymbolKind,
    entries: Vec<Symbol>,
    #[serde(skip)]
    by_display: BTreeMap<String, u16>,
}

impl SymbolTable {
    /// Build a table from a set of display strings.
    ///
    /// Fails when two displays share an identifier, when a display collides
    /// with a sentinel name, or when the table would overflow `u16`.
    pub fn from_displays(kind: SymbolKind, displays: BTreeSet<String>) -> Result<Self> {
        // +2 for the sentinels
        let count = displays.len() + 2;
        if count > usize::from(u16::MAX) + 1 {
            return Err(ZonetabError::TooManySymbols {
                kind: kind.label(),
                count,
            });
        }

        let mut entries = Vec::with_capacity(count);
        let mut by_display = BTreeMap::new();
        let mut by_identifier: BTreeMap<String, String> = BTreeMap::new();

        let mut push = |display: &str, identifier: String| -> Result<()> {
            if let Some(first) = by_identifier.get(&identifier) {
                return Err(ZonetabError::IdentifierCollision {
                    kind: kind.label(),
                    identifier,
                    first: first.clone(),
                    second: display.to_string(),
                });
            }
            let ordinal = entries.len() as u16;
            by_identifier.insert(identifier.clone(), display.to_string());
            entries.push(Symbol {
                ordinal,
                identifier,
                display: display.to_string(),
            });
            Ok(())
        };

        push(INVALID, INVALID.to_string())?;
        for display in &displays {
            push(display, kind.identifier(display))?;
        }
        push(MAX, MAX.to_string())?;

        // Sentinels are not resolvable by display.
        for entry in &entries[1..entries.len() - 1] {
            by_display.insert(entry.display.clone(), entry.ordinal);
        }

        debug!(kind = kind.label(), symbols = displays.len(), "built symbol table");

        Ok(Self {
            kind,
            entries,
            by_display,
        })
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    /// Ordinal of a real entry; `None` for unknown strings and sentinels.
    pub fn ordinal(&self, display: &str) -> Option<u16> {
        self.by_display.get(display).copied()
    }

    pub fn get(&self, ordinal: u16) -> Option<&Symbol> {
        self.entries.get(usize::from(ordinal))
    }

    pub fn display(&self, ordinal: u16) -> Option<&str> {
        self.get(ordinal).map(|s| s.display.as_str())
    }

    /// Ordinal of the `_MAX` sentinel, equal to the number of non-`_MAX` entries.
    pub fn max_ordinal(&self) -> u16 {
        (self.entries.len() - 1) as u16
    }

    /// All entries, sentinels included.
    pub fn entries(&self) -> &[Symbol] {
        &self.entries
    }

    /// Real entries only.
    pub fn real(&self) -> &[Symbol] {
        &self.entries[1..self.entries.len() - 1]
    }

    /// Number of real entries.
    pub fn len(&self) -> usize {
        self.entries.len() - 2
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Collects abbreviation strings while the transition table is scanned.
#[derive(Debug, Default)]
pub struct AbbreviationInterner {
    seen: BTreeSet<String>,
}

impl AbbreviationInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, abbreviation: &str) {
        if !self.seen.contains(abbreviation) {
            self.seen.insert(abbreviation.to_string());
        }
    }

    pub fn finish(self) -> Result<SymbolTable> {
        SymbolTable::from_displays(SymbolKind::Abbreviation, self.seen)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
