// Resource Allocation Graph Module
// Typed nodes, allocation/request edges, graph descriptions

pub mod description;
pub mod rag;
pub mod types;

pub use description::*;
pub use rag::*;
pub use types::*;
