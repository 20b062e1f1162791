//! The admin and website data requests: aggregate, resolve, hydrate.

use crate::aggregator::{SheetSet, aggregate};
use crate::hydrate::{has_image_sheets, hydrate, image_file_ids};
use crate::links::LinkResolver;
use google::{FileCatalog, GoogleError, SheetSource};
use std::sync::Arc;

/// Loads `titles` and attaches image URLs to the image-bearing sheets.
pub async fn load_site_data(
    sheets: Arc<dyn SheetSource>,
    files: Arc<dyn FileCatalog>,
    titles: &[String],
) -> Result<SheetSet, GoogleError> {
    let mut data = aggregate(sheets, titles).await?;

    if has_image_sheets(&data) {
        let wanted = image_file_ids(&data);
        let links = LinkResolver::new(files).resolve(&wanted).await;
        hydrate(&mut data, &links);
    }

    Ok(data)
}
