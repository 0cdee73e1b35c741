//! Reading a downloaded bank export into indexed raw rows.

use anyhow::{Context, Result};
use bankpost_core::RowIndex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::types::{Columns, RawRow};

/// Column the spreadsheet uses to mark rows that already have a customer.
pub const NAME_COLUMN: &str = "CUSTOMER_NAME";

/// A parsed CSV export: header plus data rows in file order.
#[derive(Debug)]
pub struct Export {
    pub path: PathBuf,
    columns: Arc<Columns>,
    rows: Vec<RawRow>,
}

impl Export {
    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows with their 1-based data-row index.
    pub fn rows(&self) -> impl Iterator<Item = (RowIndex, &RawRow)> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| (i as RowIndex + 1, row))
    }

    /// Rows still waiting for a customer: above `cursor`, not blank, and with an
    /// empty name column. The upstream filter is only a hint, so this re-checks.
    pub fn pending_rows(&self, cursor: RowIndex) -> impl Iterator<Item = (RowIndex, &RawRow)> {
        self.rows()
            .filter(move |(idx, _)| *idx > cursor)
            .filter(|(_, row)| !row.is_blank() && row.get(NAME_COLUMN).is_none())
    }
}

/// Read a bank export CSV. A UTF-8 BOM on the header is tolerated and rows may
/// be ragged; short rows read as blank cells.
pub fn read_export(path: impl AsRef<Path>) -> Result<Export> {
    let path = path.as_ref();
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let headers = rdr
        .headers()
        .with_context(|| format!("reading header of {}", path.display()))?
        .clone();
    let columns = Arc::new(Columns::new(headers.iter()));

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("{}: data row {}", path.display(), i + 1))?;
        let cells = record.iter().map(str::to_string).collect();
        rows.push(RawRow::new(Arc::clone(&columns), cells));
    }

    tracing::debug!(path = %path.display(), rows = rows.len(), "read export");

    Ok(Export {
        path: path.to_path_buf(),
        columns,
        rows,
    })
}
