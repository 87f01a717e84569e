//! Data models for TraceScope

mod call;
mod raw;
mod tree;

pub use call::*;
pub use raw::*;
pub use tree::*;
