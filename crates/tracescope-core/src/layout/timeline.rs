//! Timeline projection of a call forest
//!
//! Every call with a start time becomes a segment on the lane of its kind.
//! Offsets and widths are percentages of the whole trace span
//! `[min_start, max_end]`, not of any branch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TimelineConfig;
use crate::models::{find_in_forest, seconds_between, walk, Call, CallKind, CallTree};

/// A call placed on the timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSegment {
    /// Call id
    pub id: String,
    /// Call kind
    pub kind: CallKind,
    /// Call name
    pub name: String,
    /// Lane index into [`TimelineLayout::rows`]
    pub row: usize,
    /// Start as a percentage of the trace span
    pub start_offset_pct: f64,
    /// Width as a percentage of the trace span, never below the minimum
    pub width_pct: f64,
    /// Start in seconds from the trace start
    pub start_seconds: f64,
    /// End in seconds from the trace start (never before the start)
    pub end_seconds: f64,
    /// Measured duration in seconds
    pub duration: Option<f64>,
}

impl TimelineSegment {
    /// Whether the segment is active at `seconds` from the trace start
    pub fn covers(&self, seconds: f64) -> bool {
        self.start_seconds <= seconds && seconds <= self.end_seconds
    }
}

/// Result of projecting a forest onto the timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineLayout {
    /// Lane labels, in lane order; only populated lanes are listed
    pub rows: Vec<String>,
    /// Lane kinds, parallel to `rows`
    pub lanes: Vec<CallKind>,
    /// Segments in hierarchy order
    pub segments: Vec<TimelineSegment>,
    /// Gridline positions in seconds from the trace start
    pub ticks: Vec<f64>,
    /// Earliest start across all calls
    pub min_start: Option<DateTime<Utc>>,
    /// Latest end across all calls
    pub max_end: Option<DateTime<Utc>>,
    /// `max_end - min_start` in seconds (0 when unknown)
    pub total_duration: f64,
    /// Zoom the layout was computed for, in percent
    pub zoom_percent: f64,
    /// Calls without a start time, which cannot be placed
    pub unplaced: Vec<String>,
}

impl TimelineLayout {
    /// Look up a segment by call id
    pub fn segment(&self, id: &str) -> Option<&TimelineSegment> {
        self.segments.iter().find(|s| s.id == id)
    }

    /// All segments active at `seconds` from the trace start
    pub fn segments_at(&self, seconds: f64) -> Vec<&TimelineSegment> {
        self.segments.iter().filter(|s| s.covers(seconds)).collect()
    }

    /// Pixel mapping for a container of the given width
    pub fn scale(&self, container_width: f64) -> TimelineScale {
        TimelineScale {
            total_seconds: self.total_duration,
            content_width: container_width * self.zoom_percent / 100.0,
        }
    }
}

/// Maps trace-relative seconds to pixels and back
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelineScale {
    /// Trace span in seconds
    pub total_seconds: f64,
    /// Zoomed content width in pixels
    pub content_width: f64,
}

impl TimelineScale {
    /// Pixel offset of a moment
    pub fn x_for(&self, seconds: f64) -> f64 {
        if self.total_seconds <= 0.0 {
            return 0.0;
        }
        seconds / self.total_seconds * self.content_width
    }

    /// Moment at a pixel offset
    pub fn seconds_at(&self, x: f64) -> f64 {
        if self.content_width <= 0.0 {
            return 0.0;
        }
        x / self.content_width * self.total_seconds
    }

    /// Pixel width of a percentage of the span
    pub fn width_for_pct(&self, pct: f64) -> f64 {
        pct / 100.0 * self.content_width
    }
}

/// A selected event and what else was running when it started
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineSelection<'a> {
    /// The full call
    pub call: &'a Call,
    /// Its segment
    pub segment: &'a TimelineSegment,
    /// Other segments active at the event's start
    pub concurrent: Vec<&'a TimelineSegment>,
}

/// Start and clamped end of a call, as absolute times
fn extent(call: &Call) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = call.start_time?;
    let end = call.effective_end().unwrap_or(start);
    Some((start, end.max(start)))
}

/// Project a forest onto the timeline
pub fn layout_as_timeline(forest: &[CallTree], config: &TimelineConfig) -> TimelineLayout {
    let mut placed: Vec<(&Call, DateTime<Utc>, DateTime<Utc>)> = Vec::new();
    let mut unplaced = Vec::new();

    for node in walk(forest) {
        match extent(&node.call) {
            Some((start, end)) => placed.push((&node.call, start, end)),
            None => unplaced.push(node.call.id.clone()),
        }
    }

    let min_start = placed.iter().map(|(_, start, _)| *start).min();
    let max_end = placed.iter().map(|(_, _, end)| *end).max();
    let total = match (min_start, max_end) {
        (Some(min), Some(max)) => seconds_between(min, max),
        _ => 0.0,
    };

    let mut lanes: Vec<CallKind> = placed.iter().map(|(call, _, _)| call.kind()).collect();
    lanes.sort();
    lanes.dedup();

    let window = config.window.as_ref();
    let mut segments = Vec::with_capacity(placed.len());
    for (call, start, end) in &placed {
        if let Some(window) = window {
            if *end < window.start || *start > window.end {
                continue;
            }
        }
        let (Some(origin), Some(row)) = (min_start, lanes.iter().position(|k| *k == call.kind()))
        else {
            continue;
        };

        let start_seconds = seconds_between(origin, *start);
        let end_seconds = seconds_between(origin, *end);
        let (start_offset_pct, width_pct) = if total > 0.0 {
            let width = (end_seconds - start_seconds) / total * 100.0;
            (start_seconds / total * 100.0, width.max(config.min_width_pct))
        } else {
            (0.0, config.min_width_pct)
        };

        segments.push(TimelineSegment {
            id: call.id.clone(),
            kind: call.kind(),
            name: call.name.clone(),
            row,
            start_offset_pct,
            width_pct,
            start_seconds,
            end_seconds,
            duration: call.duration,
        });
    }

    let ticks = if placed.is_empty() {
        Vec::new()
    } else if total <= 0.0 {
        vec![0.0]
    } else {
        let count = config.tick_count.max(1);
        (0..=count)
            .map(|i| total * i as f64 / count as f64)
            .collect()
    };

    debug!(
        segments = segments.len(),
        unplaced = unplaced.len(),
        total_seconds = total,
        "Projected timeline"
    );

    TimelineLayout {
        rows: lanes.iter().map(|k| k.label().to_string()).collect(),
        lanes,
        segments,
        ticks,
        min_start,
        max_end,
        total_duration: total.max(0.0),
        zoom_percent: config.zoom_percent,
        unplaced,
    }
}

/// Select an event by id, returning its call and the concurrently active segments
pub fn select_event<'a>(
    forest: &'a [CallTree],
    timeline: &'a TimelineLayout,
    id: &str,
) -> Option<TimelineSelection<'a>> {
    let segment = timeline.segment(id)?;
    let call = &find_in_forest(forest, id)?.call;
    let concurrent = timeline
        .segments_at(segment.start_seconds)
        .into_iter()
        .filter(|other| other.id != segment.id)
        .collect();

    Some(TimelineSelection {
        call,
        segment,
        concurrent,
    })
}
