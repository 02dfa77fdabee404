use quiverdb_graph::Value;

use crate::error::{Error, Result};

/// The ordered rows produced by a query, with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    columns: Vec<String>,
    records: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, records: Vec<Vec<Value>>) -> Self {
        Self { columns, records }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Vec<Value>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Record<'_>> {
        self.records.iter().map(|values| Record {
            columns: &self.columns,
            values,
        })
    }

    pub fn get(&self, index: usize) -> Option<Record<'_>> {
        self.records.get(index).map(|values| Record {
            columns: &self.columns,
            values,
        })
    }

    /// The single record of a one-row result.
    pub fn single(&self) -> Result<Record<'_>> {
        match self.records.len() {
            1 => Ok(self.get(0).expect("one record")),
            n => Err(Error::Other(format!("expected a single record, got {n}"))),
        }
    }

    /// First column of the single record; the usual way to read an
    /// aggregate result.
    pub fn value(&self) -> Result<Value> {
        let record = self.single()?;
        record
            .values
            .first()
            .cloned()
            .ok_or_else(|| Error::Other("result has no columns".to_string()))
    }

    /// Column-aligned text rendering for debugging.
    pub fn to_table(&self) -> String {
        if self.records.is_empty() {
            return "(no records)".to_string();
        }

        let mut widths: Vec<usize> = self.columns.iter().map(String::len).collect();
        let rendered: Vec<Vec<String>> = self
            .records
            .iter()
            .map(|record| {
                record
                    .iter()
                    .enumerate()
                    .map(|(i, value)| {
                        let text = value.to_string();
                        if i < widths.len() {
                            widths[i] = widths[i].max(text.len());
                        }
                        text
                    })
                    .collect()
            })
            .collect();

        let mut lines = Vec::new();
        let header: Vec<String> = self
            .columns
            .iter()
            .zip(widths.iter().copied())
            .map(|(c, w)| format!("{c:<w$}"))
            .collect();
        let header = header.join(" | ");
        lines.push(header.clone());
        lines.push("-".repeat(header.len()));
        for record in rendered {
            let row: Vec<String> = record
                .iter()
                .zip(widths.iter().copied())
                .map(|(v, w)| format!("{v:<w$}"))
                .collect();
            lines.push(row.join(" | "));
        }
        lines.join("\n")
    }
}

/// One result row with access by column name or position.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Record<'a> {
    pub fn columns(&self) -> &'a [String] {
        self.columns
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn value_at(&self, index: usize) -> Option<&'a Value> {
        self.values.get(index)
    }
}
