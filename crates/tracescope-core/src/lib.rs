//! # TraceScope
//!
//! Trace reconstruction and visual layout for AI agent runs.
//!
//! TraceScope takes the flat rows an agent framework records (agent calls,
//! LLM calls, tool calls, errors, user interactions), rebuilds the call
//! hierarchy, and lays it out as an execution graph and as a timeline.
//!
//! ## Architecture
//!
//! - **Normalize**: raw rows to uniform [`models::Call`] values
//! - **Hierarchy**: calls to an ordered forest of [`models::CallTree`]
//! - **Layout**: forest to graph node positions and timeline segments
//! - **Aggregate / Search**: subtree rollups and label lookup
//! - **Source / Session**: fetching rows and tracking the selected trace
//!
//! ## Quick Start
//!
//! ```bash
//! # List traces in a snapshot
//! tracescope --config tracescope.toml traces
//!
//! # Show the timeline of one trace
//! tracescope timeline 42 --zoom 200
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_precision_loss)]

pub mod aggregate;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod layout;
pub mod models;
pub mod normalize;
pub mod search;
pub mod session;
pub mod source;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::aggregate::{compute_aggregates, summarize, AggregateStats, TraceSummary};
    pub use crate::config::{Config, Direction, GraphLayoutConfig, TimelineConfig};
    pub use crate::error::{Error, Result};
    pub use crate::hierarchy::{build_call_forest, build_forest};
    pub use crate::layout::{layout_as_graph, layout_as_timeline, GraphLayout, TimelineLayout};
    pub use crate::models::*;
    pub use crate::normalize::normalize;
    pub use crate::search::{search, search_forest};
    pub use crate::session::{ApplyOutcome, LoadState, Session, TraceView};
    pub use crate::source::TraceSource;
}
