use std::collections::HashMap;
use std::io::Read;
use thiserror::Error;

use crate::distance::{Distance, LONG_COLUMNS, SHORT_COLUMNS};
use crate::value::{parse_time, TimeConvention};

#[derive(Error, Debug)]
pub enum TableError {
    #[error("{0} table has no header row")]
    MissingHeader(TableKind),
    #[error("failed to parse {kind} table: {source}")]
    Csv {
        kind: TableKind,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    /// 30 m to 250 m controls.
    Short,
    /// 150 m to 600 m endurance controls.
    Long,
}

impl TableKind {
    pub fn columns(&self) -> &'static [(Distance, &'static str)] {
        match self {
            TableKind::Short => SHORT_COLUMNS,
            TableKind::Long => LONG_COLUMNS,
        }
    }

    pub fn other(&self) -> TableKind {
        match self {
            TableKind::Short => TableKind::Long,
            TableKind::Long => TableKind::Short,
        }
    }
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableKind::Short => f.write_str("short-distance"),
            TableKind::Long => f.write_str("long-distance"),
        }
    }
}

/// One athlete's recorded splits, keyed by column header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: HashMap<String, String>,
}

impl Row {
    pub fn new<I, K, V>(cells: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            cells: cells
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Raw cell text. Empty cells read the same as missing ones.
    pub fn raw(&self, column: &str) -> Option<&str> {
        self.cells
            .get(column)
            .map(|s| s.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    /// Cell value in seconds, or `None` when blank or unreadable.
    pub fn seconds(&self, column: &str, convention: TimeConvention) -> Option<f64> {
        parse_time(self.raw(column), convention)
    }
}

/// A reference table. Rows keep their file order; nothing changes them after load.
#[derive(Debug, Clone)]
pub struct ReferenceTable {
    kind: TableKind,
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl ReferenceTable {
    pub fn new(kind: TableKind, headers: Vec<String>, rows: Vec<Row>) -> Self {
        let table = Self {
            kind,
            headers,
            rows,
        };
        table.warn_missing_columns();
        table
    }

    /// Parse CSV text: a header line followed by one line per row.
    pub fn from_csv<R: Read>(kind: TableKind, reader: R) -> Result<Self, TableError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()
            .map_err(|source| TableError::Csv { kind, source })?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(TableError::MissingHeader(kind));
        }

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record.map_err(|source| TableError::Csv { kind, source })?;
            if record.iter().all(|cell| cell.is_empty()) {
                continue;
            }
            // Short records leave their trailing columns empty.
            let row = Row::new(
                headers
                    .iter()
                    .enumerate()
                    .map(|(i, header)| (header.clone(), record.get(i).unwrap_or("").to_string())),
            );
            rows.push(row);
        }

        log::debug!(
            "[TABLE] Parsed {} table: {} columns, {} rows",
            kind,
            headers.len(),
            rows.len()
        );

        Ok(Self::new(kind, headers, rows))
    }

    pub fn from_csv_str(kind: TableKind, text: &str) -> Result<Self, TableError> {
        Self::from_csv(kind, text.as_bytes())
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn warn_missing_columns(&self) {
        for (_, column) in self.kind.columns() {
            if !self.headers().iter().any(|h| h == column) {
                log::warn!(
                    "[TABLE] {} table is missing column {:?}",
                    self.kind,
                    column
                );
            }
        }
    }
}

/// Both reference tables, loaded once and then only read.
#[derive(Debug, Clone)]
pub struct TableStore {
    short: ReferenceTable,
    long: ReferenceTable,
}

impl TableStore {
    pub fn new(short: ReferenceTable, long: ReferenceTable) -> Self {
        Self { short, long }
    }

    #[cfg(test)]
    pub fn from_csv_strs(short_csv: &str, long_csv: &str) -> Result<Self, TableError> {
        Ok(Self::new(
            ReferenceTable::from_csv_str(TableKind::Short, short_csv)?,
            ReferenceTable::from_csv_str(TableKind::Long, long_csv)?,
        ))
    }

    pub fn table(&self, kind: TableKind) -> &ReferenceTable {
        match kind {
            TableKind::Short => &self.short,
            TableKind::Long => &self.long,
        }
    }
}
