//! CSV format registry.
//!
//! - **dialects** – per-vendor column tables, in registration order
//! - **parser** – header scoring, row mapping, folder extraction
//! - **writer** – export in any registered dialect

pub mod dialects;
pub mod parser;
pub mod writer;

pub use dialects::{DialectSpec, Field, DIALECTS};
pub use parser::{detect_dialect, parse_csv};
pub use writer::write_csv;
