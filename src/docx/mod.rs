pub mod content_types;
pub mod metadata;
pub mod package;
pub mod parts;
pub mod relationships;
pub mod xml;
