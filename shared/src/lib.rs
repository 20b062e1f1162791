pub mod metrics_defs;
pub mod settle;
