//! Linked styles from `word/styles.xml` and their resolution onto runs.

pub mod cache;
pub mod resolver;
pub mod sheet;

pub use cache::ParagraphContextCache;
pub use resolver::{decorate_document, is_toc_style, resolve_run_style, ResolvedRunStyle, DISPLAY_STYLE};
pub use sheet::{LinkedStyle, StyleDefinition, StyleMap, StyleProperties, StyleSheet};
