//! Attaches resolved Drive links to the records of image-bearing sheets.

use crate::aggregator::SheetSet;
use crate::links::LinkMap;
use crate::records::Record;
use indexmap::IndexSet;

/// Column holding the Drive file id of a record's image.
pub const FILE_ID_FIELD: &str = "fileId";
/// Computed field carrying the resolved image URL.
pub const IMAGE_URL_FIELD: &str = "imageUrl";
/// Extra field the client logo records carry.
pub const LOGO_URL_FIELD: &str = "logoUrl";

type Hydrator = fn(&mut Record, &str);

/// A sheet whose records reference Drive images, and how a resolved URL is
/// written onto each of them.
pub struct ImageSheet {
    pub title: &'static str,
    hydrate: Hydrator,
}

fn set_image_url(record: &mut Record, url: &str) {
    record.set_field(IMAGE_URL_FIELD, url);
}

fn set_logo_urls(record: &mut Record, url: &str) {
    record.set_field(IMAGE_URL_FIELD, url);
    record.set_field(LOGO_URL_FIELD, url);
}

pub const IMAGE_SHEETS: &[ImageSheet] = &[
    ImageSheet {
        title: "Portfolio",
        hydrate: set_image_url,
    },
    ImageSheet {
        title: "Services",
        hydrate: set_image_url,
    },
    ImageSheet {
        title: "Testimonials",
        hydrate: set_image_url,
    },
    ImageSheet {
        title: "Clients",
        hydrate: set_logo_urls,
    },
];

fn record_file_id(record: &Record) -> Option<&str> {
    record
        .field(FILE_ID_FIELD)
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

fn image_sheets_in(data: &SheetSet) -> impl Iterator<Item = (&ImageSheet, &Vec<Record>)> {
    IMAGE_SHEETS
        .iter()
        .filter_map(|sheet| data.get(sheet.title).map(|records| (sheet, records)))
}

/// Whether any image-bearing sheet was loaded.
pub fn has_image_sheets(data: &SheetSet) -> bool {
    image_sheets_in(data).next().is_some()
}

/// Distinct trimmed file ids referenced by the image sheets.
pub fn image_file_ids(data: &SheetSet) -> IndexSet<String> {
    image_sheets_in(data)
        .flat_map(|(_, records)| records.iter().filter_map(record_file_id))
        .map(String::from)
        .collect()
}

/// Writes the resolved URL onto every image record whose file id is in
/// `links`. Other records are left as they are.
pub fn hydrate(data: &mut SheetSet, links: &LinkMap) {
    for sheet in IMAGE_SHEETS {
        let Some(records) = data.get_mut(sheet.title) else {
            continue;
        };

        for record in records.iter_mut() {
            let url = record_file_id(record).and_then(|id| links.get(id));
            if let Some(url) = url.map(String::from) {
                (sheet.hydrate)(record, &url);
            }
        }
    }
}
