//! Branch collection
//!
//! Cuts the event stream into repeating branches:
//!
//! ```text
//! XmlEventReader --events--> BranchCollector --BranchNode--> StructureMapper
//! ```
//!
//! Memory held at any moment is the open element path plus the one branch
//! under construction.

pub mod collector;
pub mod node;
pub mod path;

pub use collector::BranchCollector;
pub use node::BranchNode;
pub use path::RepeatPath;
