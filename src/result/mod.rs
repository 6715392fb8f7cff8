//! Result materialization: bounded result sets, columnar frames and exports.

mod csv_export;
mod frame;
mod resultset;

pub use csv_export::{CsvEncoding, CsvOptions, CsvResultDescriptor};
pub use frame::Frame;
pub use resultset::ResultSet;
