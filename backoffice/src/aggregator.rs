//! Concurrent loading of the requested sheets.

use crate::metrics_defs::{SHEET_LOAD_FAILED, SHEET_ROWS};
use crate::records::{Record, sheet_records};
use google::{GoogleError, SheetSource};
use indexmap::{IndexMap, IndexSet};
use shared::settle::{partition, settle_all};
use shared::{counter, histogram};
use std::sync::Arc;

/// Records keyed by sheet title, in request order.
pub type SheetSet = IndexMap<String, Vec<Record>>;

/// Loads every requested sheet concurrently.
///
/// Listing the spreadsheet's sheets is the only step whose failure is
/// returned. A title that does not exist or fails to load maps to an empty
/// list, so the result always holds one entry per distinct requested title.
pub async fn aggregate(
    source: Arc<dyn SheetSource>,
    titles: &[String],
) -> Result<SheetSet, GoogleError> {
    let available: IndexSet<String> = source
        .sheets()
        .await?
        .into_iter()
        .map(|sheet| sheet.title)
        .collect();
    let available = Arc::new(available);

    let requested: IndexSet<String> = titles.iter().cloned().collect();

    let settled = settle_all(requested.iter().cloned(), |title| {
        let source = source.clone();
        let available = available.clone();
        async move {
            if !available.contains(&title) {
                return Err(GoogleError::NotFound(format!("sheet {title}")));
            }
            let sheet = source.load_sheet(&title).await?;
            Ok(sheet_records(&sheet))
        }
    })
    .await;

    let (loaded, failed) = partition(settled);

    for (title, error) in failed {
        tracing::warn!(sheet = %title, error = %error, "Failed to load sheet, using empty result");
        counter!(SHEET_LOAD_FAILED).increment(1);
    }

    let mut loaded: IndexMap<String, Vec<Record>> = loaded.into_iter().collect();

    Ok(requested
        .into_iter()
        .map(|title| {
            let records = loaded.swap_remove(&title).unwrap_or_default();
            histogram!(SHEET_ROWS).record(records.len() as f64);
            (title, records)
        })
        .collect())
}
