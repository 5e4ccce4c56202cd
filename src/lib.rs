pub mod config;
pub mod converter;
pub mod docx;
pub mod model;
pub mod node_list;
pub mod numbering;
pub mod styles;
pub mod translators;
pub mod units;
pub mod validators;

pub use converter::{Converter, ExportOptions, ExportReport};
pub use docx::metadata::DocumentMetadata;
pub use model::{Mark, ModelDocument, ModelNode};
