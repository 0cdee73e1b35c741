use bankpost_core::Transaction;
use std::collections::HashMap;
use std::sync::Arc;

/// Header name → column position, keyed by the normalized header.
///
/// Repeated headers get pandas-style suffixes (`Transaction Description`,
/// `Transaction Description.1`) because the Maybank exports repeat the
/// narration header.
#[derive(Debug, Default)]
pub struct Columns {
    positions: HashMap<String, usize>,
    names: Vec<String>,
}

impl Columns {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut positions = HashMap::new();
        let mut names = Vec::new();
        for (pos, raw) in headers.into_iter().enumerate() {
            let base = raw.as_ref().trim_start_matches('\u{feff}').trim().to_string();
            let mut name = base.clone();
            let mut dup = 0;
            while positions.contains_key(&normalize(&name)) {
                dup += 1;
                name = format!("{base}.{dup}");
            }
            positions.insert(normalize(&name), pos);
            names.push(name);
        }
        Self { positions, names }
    }

    pub fn position(&self, header: &str) -> Option<usize> {
        self.positions.get(&normalize(header)).copied()
    }

    pub fn contains(&self, header: &str) -> bool {
        self.position(header).is_some()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

fn normalize(header: &str) -> String {
    header.trim().to_lowercase()
}

/// One raw export row, looked up by header name.
#[derive(Debug, Clone)]
pub struct RawRow {
    columns: Arc<Columns>,
    cells: Vec<String>,
}

impl RawRow {
    pub fn new(columns: Arc<Columns>, cells: Vec<String>) -> Self {
        Self { columns, cells }
    }

    /// Build a row from `(header, value)` pairs.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let columns = Arc::new(Columns::new(pairs.iter().map(|(h, _)| *h)));
        let cells = pairs.iter().map(|(_, v)| v.to_string()).collect();
        Self { columns, cells }
    }

    /// Trimmed cell value; `None` when the column is absent or the cell blank.
    pub fn get(&self, header: &str) -> Option<&str> {
        let pos = self.columns.position(header)?;
        self.cells
            .get(pos)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty() && !is_null_marker(c))
    }

    pub fn has_column(&self, header: &str) -> bool {
        self.columns.contains(header)
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    /// True when every cell is blank.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

/// Spreadsheet round-trips leave these behind in empty cells.
fn is_null_marker(cell: &str) -> bool {
    matches!(cell, "nan" | "NaN" | "None" | "null")
}

/// Why a structurally valid row produced no transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Section header, spacer or balance line.
    NoTransaction,
    /// The standardized-name column is already filled (submitted earlier).
    AlreadyNamed,
}

/// Result of parsing one row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Parsed(Transaction),
    Skip(SkipReason),
}
