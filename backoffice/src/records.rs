//! Sheet rows as flat key/value records.
//!
//! Every header is exposed twice: with its exact spelling and as a trimmed,
//! lower-cased alias, so callers can address `"File ID "` as `"file id"`.
//! The header to column mapping is computed once per sheet by `HeaderIndex`.

use google::SheetData;
use indexmap::IndexMap;
use serde::Serialize;

/// Canonical form used for lax field lookup.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// One row of a sheet. Values are always strings; absent cells are "".
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record(IndexMap<String, String>);

impl Record {
    pub fn new() -> Self {
        Record(IndexMap::new())
    }

    /// Exact key lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Looks the key up as spelled, then by its normalized form.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.get(key).or_else(|| self.get(&normalize_key(key)))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Sets `key` and overwrites every existing key with the same normalized
    /// form, so all spellings of a field keep reading the same value.
    pub fn set_field(&mut self, key: &str, value: &str) {
        let normalized = normalize_key(key);
        for (existing, current) in self.0.iter_mut() {
            if normalize_key(existing) == normalized {
                *current = value.to_string();
            }
        }
        self.set(key, value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Resolved header layout of one sheet.
///
/// Exact header names win over aliases. Among duplicates of either kind the
/// leftmost column wins. Blank headers are ignored.
#[derive(Clone, Debug, Default)]
pub struct HeaderIndex {
    headers: Vec<String>,
    // key -> column, exact names first, then aliases not shadowed by one.
    keys: IndexMap<String, usize>,
}

impl HeaderIndex {
    pub fn new(headers: &[String]) -> Self {
        let mut keys = IndexMap::new();

        for (column, header) in headers.iter().enumerate() {
            if header.trim().is_empty() {
                continue;
            }
            keys.entry(header.clone()).or_insert(column);
        }
        for (column, header) in headers.iter().enumerate() {
            let alias = normalize_key(header);
            if alias.is_empty() {
                continue;
            }
            keys.entry(alias).or_insert(column);
        }

        HeaderIndex {
            headers: headers.to_vec(),
            keys,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Column holding `key`, looked up as spelled, then normalized.
    pub fn column(&self, key: &str) -> Option<usize> {
        self.keys
            .get(key)
            .or_else(|| self.keys.get(&normalize_key(key)))
            .copied()
    }

    /// Builds the record for one row. Cells past the end of the row read as "".
    pub fn record(&self, row: &[String]) -> Record {
        Record(
            self.keys
                .iter()
                .map(|(key, &column)| {
                    let value = row.get(column).cloned().unwrap_or_default();
                    (key.clone(), value)
                })
                .collect(),
        )
    }
}

/// Maps every row of a sheet to a record.
pub fn sheet_records(sheet: &SheetData) -> Vec<Record> {
    let index = HeaderIndex::new(&sheet.headers);
    sheet.rows.iter().map(|row| index.record(row)).collect()
}
