pub mod drain;
pub mod gaps;
pub mod models;
pub mod timeline;
pub mod units;
