//! Customer reference tables and the fuzzy name resolver.
//!
//! Each customer group keeps a CSV mapping known bank-narration fragments to
//! the canonical company name used in the ledger:
//!   COMPANY NAME,SPECIAL NAME BANK IN
//!   ABC Trading Sdn Bhd,ABC TRADING SDN BHD
//!   ABC Trading Sdn Bhd,ABC TRADING S/B

use bankpost_core::{ConfigurationError, SourceType, Transaction};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::LedgerError;
use crate::similarity::{normalize, token_set_ratio, tokens};

pub const DEFAULT_THRESHOLD: f64 = 0.95;

/// Misses scoring this close below the threshold are logged for review.
pub const REVIEW_BAND: f64 = 0.05;

const NAME_HEADERS: &[&str] = &["company name", "standard_name"];
const PATTERN_HEADERS: &[&str] = &["special name bank in", "raw_pattern"];

#[derive(Debug, Clone)]
pub struct CustomerEntry {
    pub standard_name: String,
    pub raw_pattern: String,
    tokens: BTreeSet<String>,
    specificity: usize,
}

impl CustomerEntry {
    pub fn new(standard_name: &str, raw_pattern: &str) -> Self {
        Self {
            standard_name: standard_name.trim().to_string(),
            raw_pattern: raw_pattern.trim().to_string(),
            tokens: tokens(raw_pattern),
            specificity: normalize(raw_pattern).chars().count(),
        }
    }
}

/// Pattern-keyed lookup table for one customer group. Read-only once loaded.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    entries: BTreeMap<String, CustomerEntry>,
}

impl ReferenceTable {
    /// Build from `(standard_name, raw_pattern)` pairs. Blank patterns are
    /// dropped; a repeated pattern keeps its first name.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut table = Self::default();
        for (name, pattern) in pairs {
            table.insert(name, pattern);
        }
        table
    }

    fn insert(&mut self, name: &str, pattern: &str) {
        let key = normalize(pattern);
        if key.is_empty() || name.trim().is_empty() {
            return;
        }
        match self.entries.get(&key) {
            Some(existing) if existing.standard_name != name.trim() => {
                tracing::warn!(
                    pattern = pattern.trim(),
                    kept = %existing.standard_name,
                    ignored = name.trim(),
                    "pattern mapped to two customers; keeping the first"
                );
            }
            Some(_) => {}
            None => {
                self.entries.insert(key, CustomerEntry::new(name, pattern));
            }
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| LedgerError::Reference {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_reader(file, path)
    }

    /// Table for the source's customer group, `customers_<group>.csv` under
    /// `dir`. A missing file yields an empty table, leaving every name
    /// unresolved.
    pub fn load_for(dir: &Path, source: SourceType) -> Result<Self, LedgerError> {
        let path = table_path(dir, source);
        if !path.exists() {
            tracing::warn!(path = %path.display(), source = %source, "no customer table; names stay unresolved");
            return Ok(Self::default());
        }
        let table = Self::load(&path)?;
        tracing::debug!(path = %path.display(), entries = table.len(), "loaded customer table");
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R, path: &Path) -> Result<Self, LedgerError> {
        let csv_err = |source: csv::Error| LedgerError::ReferenceCsv {
            path: path.to_path_buf(),
            source,
        };
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers().map_err(csv_err)?.clone();
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.contains(&h.trim_start_matches('\u{feff}').trim().to_lowercase().as_str()))
        };
        let (Some(name_col), Some(pattern_col)) = (find(NAME_HEADERS), find(PATTERN_HEADERS)) else {
            return Err(LedgerError::Reference {
                path: path.to_path_buf(),
                message: "expected columns 'COMPANY NAME' and 'SPECIAL NAME BANK IN'".to_string(),
            });
        };

        let mut table = Self::default();
        for record in rdr.records() {
            let record = record.map_err(csv_err)?;
            let name = record.get(name_col).unwrap_or_default();
            let pattern = record.get(pattern_col).unwrap_or_default();
            table.insert(name, pattern);
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CustomerEntry> {
        self.entries.values()
    }

    fn exact(&self, raw_text: &str) -> Option<&CustomerEntry> {
        self.entries.get(&normalize(raw_text))
    }
}

pub fn table_path(dir: &Path, source: SourceType) -> PathBuf {
    dir.join(format!("customers_{}.csv", source.customer_group()))
}

/// Result of matching one narration against a table.
///
/// `matched_pattern` and `confidence` describe the best candidate even when it
/// fell short of the threshold; `standard_name` is only set on acceptance.
#[derive(Debug, Clone, PartialEq)]
pub struct NameMatch {
    pub standard_name: Option<String>,
    pub confidence: f64,
    pub matched_pattern: Option<String>,
}

impl NameMatch {
    fn none() -> Self {
        Self {
            standard_name: None,
            confidence: 0.0,
            matched_pattern: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub resolved: usize,
    pub unresolved: usize,
    pub near_misses: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct NameResolver {
    threshold: f64,
}

impl Default for NameResolver {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl NameResolver {
    pub fn new(threshold: f64) -> Result<Self, ConfigurationError> {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigurationError::Threshold(threshold));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Best table entry for `raw_text`.
    ///
    /// A pattern equal to the text after normalization wins outright. Otherwise
    /// the highest token-set score wins; equal scores go to the longer
    /// normalized pattern, then to the pattern that sorts first.
    pub fn resolve_name(&self, raw_text: &str, table: &ReferenceTable) -> NameMatch {
        if let Some(entry) = table.exact(raw_text) {
            return NameMatch {
                standard_name: Some(entry.standard_name.clone()),
                confidence: 1.0,
                matched_pattern: Some(entry.raw_pattern.clone()),
            };
        }

        let raw = tokens(raw_text);
        let mut best: Option<(f64, &CustomerEntry)> = None;
        for entry in table.entries() {
            let score = token_set_ratio(&raw, &entry.tokens);
            let better = match best {
                None => true,
                Some((top, current)) => {
                    score > top || (score == top && entry.specificity > current.specificity)
                }
            };
            if better {
                best = Some((score, entry));
            }
        }

        let Some((confidence, entry)) = best else {
            return NameMatch::none();
        };
        NameMatch {
            standard_name: (confidence >= self.threshold).then(|| entry.standard_name.clone()),
            confidence,
            matched_pattern: Some(entry.raw_pattern.clone()),
        }
    }

    fn is_near_miss(&self, m: &NameMatch) -> bool {
        m.standard_name.is_none() && m.confidence >= self.threshold - REVIEW_BAND
    }

    /// Fill `standardized_counterparty_name` on every unresolved transaction
    /// that clears the threshold. Rows that miss are left untouched.
    pub fn resolve_batch(&self, transactions: &mut [Transaction], table: &ReferenceTable) -> ResolveStats {
        let mut stats = ResolveStats::default();
        for txn in transactions.iter_mut() {
            if txn.is_resolved() {
                stats.resolved += 1;
                continue;
            }
            let m = self.resolve_name(&txn.raw_counterparty_text, table);
            match m.standard_name {
                Some(name) => {
                    tracing::debug!(
                        row = txn.source_row_index,
                        raw = %txn.raw_counterparty_text,
                        name = %name,
                        confidence = m.confidence,
                        "name resolved"
                    );
                    txn.standardized_counterparty_name = Some(name);
                    stats.resolved += 1;
                }
                None => {
                    if self.is_near_miss(&m) {
                        stats.near_misses += 1;
                        tracing::warn!(
                            row = txn.source_row_index,
                            raw = %txn.raw_counterparty_text,
                            candidate = m.matched_pattern.as_deref().unwrap_or_default(),
                            confidence = m.confidence,
                            "near miss, review customer table"
                        );
                    }
                    stats.unresolved += 1;
                }
            }
        }
        stats
    }
}
