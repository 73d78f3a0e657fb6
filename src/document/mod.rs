//! Document model and the branch-to-document mapping

pub mod mapper;
pub mod value;

pub use mapper::{AttributeMode, MappingConfig, StructureMapper, TrimPolicy};
pub use value::{Document, Value};
