//! Trace selection and load state
//!
//! A [`Session`] remembers which trace is selected and what is known about
//! it. Loads are split into [`Session::begin`] and [`Session::apply`] so a
//! result that arrives after the selection has moved on is discarded rather
//! than shown under the wrong trace.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregate::{compute_aggregates, summarize, AggregateStats, TraceSummary};
use crate::config::Config;
use crate::error::Result;
use crate::hierarchy::build_call_forest;
use crate::layout::{layout_as_graph, layout_as_timeline, GraphLayout, TimelineLayout};
use crate::models::{CallTree, RawRows};
use crate::source::TraceSource;

/// Everything derived from one trace's rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceView {
    /// Trace the view was built for
    pub trace_id: String,
    /// Call forest
    pub forest: Vec<CallTree>,
    /// Per-subtree stats keyed by call id
    pub aggregates: BTreeMap<String, AggregateStats>,
    /// Trace-wide rollup
    pub summary: TraceSummary,
    /// Execution graph layout
    pub graph: GraphLayout,
    /// Timeline layout
    pub timeline: TimelineLayout,
}

impl TraceView {
    /// Build the forest and every derived view from raw rows
    pub fn build(trace_id: impl Into<String>, rows: &RawRows, config: &Config) -> Self {
        let forest = build_call_forest(rows);
        Self {
            trace_id: trace_id.into(),
            aggregates: compute_aggregates(&forest),
            summary: summarize(&forest),
            graph: layout_as_graph(&forest, &config.graph),
            timeline: layout_as_timeline(&forest, &config.timeline),
            forest,
        }
    }
}

/// What the session knows about the selected trace
#[derive(Debug, Clone, Default)]
pub enum LoadState {
    /// Nothing selected
    #[default]
    Idle,
    /// Rows requested, nothing back yet
    Loading {
        /// Selected trace
        trace_id: String,
    },
    /// The trace exists but has no calls
    Empty {
        /// Selected trace
        trace_id: String,
    },
    /// Views are ready
    Ready(Arc<TraceView>),
    /// The source failed
    Failed {
        /// Selected trace
        trace_id: String,
        /// Error message
        error: String,
        /// Whether retrying could help
        retryable: bool,
    },
}

impl LoadState {
    /// Trace this state belongs to
    pub fn trace_id(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Loading { trace_id }
            | Self::Empty { trace_id }
            | Self::Failed { trace_id, .. } => Some(trace_id.as_str()),
            Self::Ready(view) => Some(view.trace_id.as_str()),
        }
    }

    /// Whether a load is in flight
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }
}

/// Handed out by [`Session::begin`], redeemed by [`Session::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct LoadTicket {
    trace_id: String,
}

impl LoadTicket {
    /// Trace the load was started for
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }
}

/// Whether a load result was kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The result is now the session state
    Applied,
    /// The selection changed while loading; the result was dropped
    Discarded,
}

#[derive(Debug, Default)]
struct SessionState {
    selected: Option<String>,
    load: LoadState,
}

/// Selected trace plus its load state, shareable across tasks
#[derive(Debug, Clone)]
pub struct Session {
    config: Arc<Config>,
    state: Arc<RwLock<SessionState>>,
}

impl Session {
    /// Create an idle session
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(RwLock::new(SessionState::default())),
        }
    }

    /// Configuration views are built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Currently selected trace
    pub fn selected(&self) -> Option<String> {
        self.state.read().selected.clone()
    }

    /// Current load state
    pub fn state(&self) -> LoadState {
        self.state.read().load.clone()
    }

    /// Ready view, if any
    pub fn view(&self) -> Option<Arc<TraceView>> {
        match &self.state.read().load {
            LoadState::Ready(view) => Some(Arc::clone(view)),
            _ => None,
        }
    }

    /// Select `trace_id` and mark it loading
    pub fn begin(&self, trace_id: &str) -> LoadTicket {
        let mut state = self.state.write();
        state.selected = Some(trace_id.to_string());
        state.load = LoadState::Loading {
            trace_id: trace_id.to_string(),
        };
        debug!(trace_id, "Load started");

        LoadTicket {
            trace_id: trace_id.to_string(),
        }
    }

    /// Drop the selection
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.selected = None;
        state.load = LoadState::Idle;
    }

    fn is_current(&self, ticket: &LoadTicket) -> bool {
        self.state.read().selected.as_deref() == Some(ticket.trace_id.as_str())
    }

    /// Apply a fetch result if its trace is still the selected one
    pub fn apply(&self, ticket: LoadTicket, result: Result<RawRows>) -> ApplyOutcome {
        if !self.is_current(&ticket) {
            debug!(trace_id = %ticket.trace_id, "Selection changed, discarding result");
            return ApplyOutcome::Discarded;
        }

        // Views are built outside the lock; the selection is checked again below.
        let load = match result {
            Ok(rows) if rows.len() == usize::from(rows.trace.is_some()) => LoadState::Empty {
                trace_id: ticket.trace_id.clone(),
            },
            Ok(rows) => {
                let view = TraceView::build(ticket.trace_id.clone(), &rows, &self.config);
                info!(
                    trace_id = %ticket.trace_id,
                    calls = view.summary.totals.call_count,
                    "Trace loaded"
                );
                LoadState::Ready(Arc::new(view))
            }
            Err(e) => {
                warn!(trace_id = %ticket.trace_id, error = %e, "Trace load failed");
                LoadState::Failed {
                    trace_id: ticket.trace_id.clone(),
                    error: e.to_string(),
                    retryable: e.is_retryable(),
                }
            }
        };

        let mut state = self.state.write();
        if state.selected.as_deref() != Some(ticket.trace_id.as_str()) {
            debug!(trace_id = %ticket.trace_id, "Selection changed, discarding result");
            return ApplyOutcome::Discarded;
        }
        state.load = load;
        ApplyOutcome::Applied
    }

    /// Select `trace_id`, fetch it from `source` and apply the result
    pub async fn load(&self, source: &dyn TraceSource, trace_id: &str) -> ApplyOutcome {
        let ticket = self.begin(trace_id);
        let result = source.fetch_trace(trace_id).await;
        self.apply(ticket, result)
    }
}
