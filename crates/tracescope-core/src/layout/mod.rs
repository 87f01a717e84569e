//! Layouts derived from the call forest
//!
//! Both layouts are pure functions of the forest and their parameters; the
//! graph and timeline views share the same forest but never each other's
//! output.

mod graph;
mod timeline;

pub use graph::{layout_as_graph, Bounds, Edge, GraphLayout, LayoutNode};
pub use timeline::{
    layout_as_timeline, select_event, TimelineLayout, TimelineScale, TimelineSegment,
    TimelineSelection,
};
