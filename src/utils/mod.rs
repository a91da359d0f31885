//! Ingestion, reporting and evaluation around the filter
//!
//! Measurement log parsing, output rows, RMSE and NIS consistency.

mod evaluation;
mod records;
mod report;

pub use evaluation::*;
pub use records::*;
pub use report::*;
