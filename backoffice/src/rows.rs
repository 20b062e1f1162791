//! Row writes issued from the admin UI.
//!
//! Rows are addressed by the value of their `id` column. Payload keys are
//! matched to headers the same way records are read, exact spelling first,
//! then by normalized alias.

use crate::errors::ApiError;
use crate::metrics_defs::ROW_WRITES;
use crate::records::HeaderIndex;
use google::{SheetData, SheetSource, SheetWriter};
use serde::Serialize;
use serde_json::{Map, Value};
use shared::counter;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const ID_FIELD: &str = "id";

#[derive(Debug, PartialEq, Serialize)]
pub struct SavedRow {
    pub id: String,
    pub created: bool,
}

fn cell_value(key: &str, value: &Value) -> Result<String, ApiError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Array(_) | Value::Object(_) => Err(ApiError::BadRequest(format!(
            "field {key} must be a string, number or boolean"
        ))),
    }
}

fn generate_id(existing: &[&str]) -> String {
    let mut candidate = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    while existing.contains(&candidate.to_string().as_str()) {
        candidate += 1;
    }
    candidate.to_string()
}

/// Sheet layout needed to address rows by id.
struct RowTable {
    index: HeaderIndex,
    id_column: usize,
    data: SheetData,
}

impl RowTable {
    fn new(title: &str, data: SheetData) -> Result<Self, ApiError> {
        let index = HeaderIndex::new(&data.headers);
        let id_column = index
            .column(ID_FIELD)
            .ok_or_else(|| ApiError::BadRequest(format!("sheet {title} has no id column")))?;
        Ok(RowTable {
            index,
            id_column,
            data,
        })
    }

    fn width(&self) -> usize {
        self.index.headers().len()
    }

    fn ids(&self) -> Vec<&str> {
        self.data
            .rows
            .iter()
            .filter_map(|row| row.get(self.id_column))
            .map(|id| id.trim())
            .collect()
    }

    /// Position of the row below the header whose id matches.
    fn position(&self, id: &str) -> Option<usize> {
        self.data.rows.iter().position(|row| {
            row.get(self.id_column)
                .is_some_and(|value| value.trim() == id)
        })
    }

    /// Payload cells keyed by column. Keys matching no header are dropped.
    fn cells(&self, payload: &Map<String, Value>) -> Result<Vec<(usize, String)>, ApiError> {
        let mut cells = Vec::with_capacity(payload.len());
        for (key, value) in payload {
            let Some(column) = self.index.column(key) else {
                tracing::debug!(field = %key, "Ignoring field with no matching column");
                continue;
            };
            cells.push((column, cell_value(key, value)?));
        }
        Ok(cells)
    }
}

/// Creates or rewrites the row whose id matches the payload's.
///
/// An existing row keeps the values of columns the payload leaves out. A
/// payload without an id always appends, with a freshly generated id.
pub async fn save_row(
    source: Arc<dyn SheetSource>,
    writer: Arc<dyn SheetWriter>,
    title: &str,
    payload: &Map<String, Value>,
) -> Result<SavedRow, ApiError> {
    let table = RowTable::new(title, source.load_sheet(title).await?)?;
    let cells = table.cells(payload)?;

    let id = cells
        .iter()
        .find(|(column, _)| *column == table.id_column)
        .map(|(_, value)| value.trim().to_string())
        .filter(|id| !id.is_empty());

    let existing = id.as_deref().and_then(|id| table.position(id));

    let mut values = match existing {
        Some(position) => table.data.rows[position].clone(),
        None => Vec::new(),
    };
    values.resize(table.width(), String::new());
    for (column, value) in cells {
        values[column] = value;
    }

    let id = match id {
        Some(id) => id,
        None => generate_id(&table.ids()),
    };
    values[table.id_column] = id.clone();

    match existing {
        Some(position) => {
            // Row 1 holds the headers.
            writer.update_row(title, position + 2, values).await?;
            counter!(ROW_WRITES, "operation" => "update").increment(1);
            tracing::info!(sheet = %title, id = %id, "Updated row");
            Ok(SavedRow { id, created: false })
        }
        None => {
            writer.append_row(title, values).await?;
            counter!(ROW_WRITES, "operation" => "create").increment(1);
            tracing::info!(sheet = %title, id = %id, "Created row");
            Ok(SavedRow { id, created: true })
        }
    }
}

/// Removes the row with the given id.
pub async fn delete_row(
    source: Arc<dyn SheetSource>,
    writer: Arc<dyn SheetWriter>,
    title: &str,
    id: &str,
) -> Result<(), ApiError> {
    let sheet_id = source
        .sheets()
        .await?
        .into_iter()
        .find(|sheet| sheet.title == title)
        .map(|sheet| sheet.sheet_id)
        .ok_or_else(|| ApiError::NotFound(format!("sheet {title} not found")))?;

    let table = RowTable::new(title, source.load_sheet(title).await?)?;
    let position = table
        .position(id.trim())
        .ok_or_else(|| ApiError::NotFound(format!("row {id} not found in {title}")))?;

    writer.delete_row(sheet_id, position + 1).await?;
    counter!(ROW_WRITES, "operation" => "delete").increment(1);
    tracing::info!(sheet = %title, id = %id, "Deleted row");
    Ok(())
}
