//! Metrics definitions for the back office.

use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "backoffice.request.duration",
    metric_type: MetricType::Histogram,
    description: "Time to answer a data request in seconds, tagged by endpoint",
};

pub const SHEET_LOAD_FAILED: MetricDef = MetricDef {
    name: "sheets.load.failed",
    metric_type: MetricType::Counter,
    description: "Sheets that could not be loaded and were returned empty",
};

pub const SHEET_ROWS: MetricDef = MetricDef {
    name: "sheets.load.rows",
    metric_type: MetricType::Histogram,
    description: "Number of records returned per requested sheet",
};

pub const SWEEP_PAGES: MetricDef = MetricDef {
    name: "drive.sweep.pages",
    metric_type: MetricType::Histogram,
    description: "Drive listing pages read by one sweep",
};

pub const SWEEP_FAILED: MetricDef = MetricDef {
    name: "drive.sweep.failed",
    metric_type: MetricType::Counter,
    description: "Sweeps cut short by a listing error",
};

pub const RESCUE_LOOKUPS: MetricDef = MetricDef {
    name: "drive.rescue.lookups",
    metric_type: MetricType::Counter,
    description: "Individual file lookups issued by the rescue pass",
};

pub const RESCUE_FAILED: MetricDef = MetricDef {
    name: "drive.rescue.failed",
    metric_type: MetricType::Counter,
    description: "Rescue lookups that failed",
};

pub const RESCUE_SKIPPED: MetricDef = MetricDef {
    name: "drive.rescue.skipped",
    metric_type: MetricType::Counter,
    description: "Rescue passes skipped because too many ids were missing",
};

pub const LINKS_RESOLVED: MetricDef = MetricDef {
    name: "drive.links.resolved",
    metric_type: MetricType::Histogram,
    description: "Size of the link map built for one request",
};

pub const ROW_WRITES: MetricDef = MetricDef {
    name: "sheets.rows.written",
    metric_type: MetricType::Counter,
    description: "Rows created, updated or deleted, tagged by operation",
};

pub const IMAGE_UPLOADS: MetricDef = MetricDef {
    name: "drive.images.uploaded",
    metric_type: MetricType::Counter,
    description: "Images uploaded to Drive",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    SHEET_LOAD_FAILED,
    SHEET_ROWS,
    SWEEP_PAGES,
    SWEEP_FAILED,
    RESCUE_LOOKUPS,
    RESCUE_FAILED,
    RESCUE_SKIPPED,
    LINKS_RESOLVED,
    ROW_WRITES,
    IMAGE_UPLOADS,
];
