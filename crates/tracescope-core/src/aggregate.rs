//! Rollup statistics over the call forest
//!
//! A subtree's duration is its wall-clock span (`latest_end - earliest_start`
//! over every call in it), not the sum of its children's durations. Children
//! of an agent often overlap or leave gaps, and the two numbers differ
//! materially.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{seconds_between, walk, Call, CallKind, CallTree};

/// Per-subtree rollup
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregateStats {
    /// LLM calls in the subtree, the root included
    pub llm_count: usize,
    /// Tool calls in the subtree
    pub tool_count: usize,
    /// Agent calls in the subtree
    pub agent_count: usize,
    /// Errors in the subtree
    pub error_count: usize,
    /// User interactions in the subtree
    pub interaction_count: usize,
    /// All calls in the subtree
    pub call_count: usize,
    /// Wall-clock span in seconds, `None` without timestamps
    pub total_duration: Option<f64>,
    /// Earliest start in the subtree
    pub earliest_start: Option<DateTime<Utc>>,
    /// Latest end in the subtree
    pub latest_end: Option<DateTime<Utc>>,
    /// Total cost in USD
    pub total_cost: f64,
    /// Total tokens
    pub total_tokens: u64,
}

impl AggregateStats {
    fn of_call(call: &Call) -> Self {
        let mut stats = Self {
            call_count: 1,
            earliest_start: call.start_time,
            latest_end: call.effective_end(),
            total_cost: call.cost(),
            total_tokens: call.total_tokens(),
            ..Self::default()
        };
        match call.kind() {
            CallKind::Llm => stats.llm_count = 1,
            CallKind::Tool => stats.tool_count = 1,
            CallKind::Agent => stats.agent_count = 1,
            CallKind::Error => stats.error_count = 1,
            CallKind::Interaction => stats.interaction_count = 1,
            CallKind::Trace => {}
        }
        stats
    }

    fn absorb(&mut self, other: &AggregateStats) {
        self.llm_count = self.llm_count.saturating_add(other.llm_count);
        self.tool_count = self.tool_count.saturating_add(other.tool_count);
        self.agent_count = self.agent_count.saturating_add(other.agent_count);
        self.error_count = self.error_count.saturating_add(other.error_count);
        self.interaction_count = self.interaction_count.saturating_add(other.interaction_count);
        self.call_count = self.call_count.saturating_add(other.call_count);
        self.total_cost += other.total_cost;
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
        self.earliest_start = min_opt(self.earliest_start, other.earliest_start);
        self.latest_end = max_opt(self.latest_end, other.latest_end);
    }

    fn finish(&mut self) {
        self.total_duration = match (self.earliest_start, self.latest_end) {
            (Some(start), Some(end)) => Some(seconds_between(start, end).max(0.0)),
            _ => None,
        };
    }

    /// Whether anything in the subtree failed
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }
}

fn min_opt(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_opt(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Compute stats for every subtree, keyed by the subtree root's call id
pub fn compute_aggregates(forest: &[CallTree]) -> BTreeMap<String, AggregateStats> {
    let mut out = BTreeMap::new();
    for tree in forest {
        accumulate(tree, &mut out);
    }
    out
}

fn accumulate(tree: &CallTree, out: &mut BTreeMap<String, AggregateStats>) -> AggregateStats {
    let mut stats = AggregateStats::of_call(&tree.call);
    for child in &tree.children {
        let child_stats = accumulate(child, out);
        stats.absorb(&child_stats);
    }
    stats.finish();
    out.insert(tree.call.id.clone(), stats.clone());
    stats
}

/// Trace-wide rollup across the whole forest
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TraceSummary {
    /// Totals over every root
    #[serde(flatten)]
    pub totals: AggregateStats,
    /// Mean duration of measured LLM calls, in seconds
    pub avg_llm_duration: Option<f64>,
    /// Mean duration of measured tool calls, in seconds
    pub avg_tool_duration: Option<f64>,
    /// Distinct model names, sorted
    pub models: Vec<String>,
}

/// Summarize a whole forest
pub fn summarize(forest: &[CallTree]) -> TraceSummary {
    let mut totals = AggregateStats::default();
    for node in walk(forest) {
        totals.absorb(&AggregateStats::of_call(&node.call));
    }
    totals.finish();

    let mut models: Vec<String> = walk(forest)
        .filter_map(|node| node.call.model().map(str::to_string))
        .collect();
    models.sort();
    models.dedup();

    TraceSummary {
        totals,
        avg_llm_duration: mean_duration(forest, CallKind::Llm),
        avg_tool_duration: mean_duration(forest, CallKind::Tool),
        models,
    }
}

/// Mean of the measured, non-negative durations of one kind
fn mean_duration(forest: &[CallTree], kind: CallKind) -> Option<f64> {
    let (sum, count) = walk(forest)
        .filter(|node| node.call.kind() == kind)
        .filter_map(|node| node.call.duration)
        .filter(|d| d.is_finite() && *d >= 0.0)
        .fold((0.0, 0_usize), |(sum, count), d| (sum + d, count + 1));

    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CallDetail, CostBreakdown, LlmDetail, TokenUsage};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn node(
        id: &str,
        detail: CallDetail,
        span: Option<(i64, i64)>,
        children: Vec<CallTree>,
    ) -> CallTree {
        CallTree {
            call: Call {
                id: id.to_string(),
                source_id: id.to_string(),
                name: id.to_string(),
                start_time: span.map(|(s, _)| at(s)),
                end_time: span.map(|(_, e)| at(e)),
                duration: span.map(|(s, e)| (e - s) as f64),
                parent_id: None,
                child_ids: vec![],
                detail,
            },
            children,
        }
    }

    fn llm(id: &str, span: (i64, i64), tokens: u64, cost: f64) -> CallTree {
        node(
            id,
            CallDetail::Llm(LlmDetail {
                model: Some("gpt-4o".to_string()),
                token_usage: TokenUsage {
                    total: tokens,
                    ..TokenUsage::default()
                },
                cost: CostBreakdown {
                    total: cost,
                    ..CostBreakdown::default()
                },
                ..LlmDetail::default()
            }),
            Some(span),
            vec![],
        )
    }

    #[test]
    fn test_overlapping_children_use_wall_clock_span() {
        // Two 10s children overlapping by 50%: span is 15s, not 20s.
        let forest = vec![node(
            "agent-1",
            CallDetail::Agent,
            None,
            vec![llm("llm-1", (0, 10), 100, 0.25), llm("llm-2", (5, 15), 50, 0.5)],
        )];
        let stats = compute_aggregates(&forest);

        let agent = &stats["agent-1"];
        assert_eq!(agent.total_duration, Some(15.0));
        assert_eq!(agent.llm_count, 2);
        assert_eq!(agent.agent_count, 1);
        assert_eq!(agent.total_tokens, 150);
        assert_eq!(agent.total_cost, 0.75);
        assert_eq!(agent.error_count, 0);
        assert_eq!(stats["llm-2"].total_duration, Some(10.0));
    }

    #[test]
    fn test_children_beyond_agent_window_extend_span() {
        let forest = vec![node(
            "agent-1",
            CallDetail::Agent,
            Some((0, 4)),
            vec![llm("llm-1", (2, 9), 0, 0.0)],
        )];
        assert_eq!(compute_aggregates(&forest)["agent-1"].total_duration, Some(9.0));
    }

    #[test]
    fn test_disjoint_adjacent_children_sum() {
        let forest = vec![node(
            "agent-1",
            CallDetail::Agent,
            Some((0, 10)),
            vec![
                llm("llm-1", (0, 4), 0, 0.0),
                node("tool-1", CallDetail::Tool(Default::default()), Some((4, 10)), vec![]),
            ],
        )];
        let stats = compute_aggregates(&forest);
        let children_sum =
            stats["llm-1"].total_duration.unwrap() + stats["tool-1"].total_duration.unwrap();
        assert_eq!(stats["agent-1"].total_duration, Some(children_sum));
    }

    #[test]
    fn test_errors_counted_and_unmeasured_subtree() {
        let forest = vec![node(
            "agent-1",
            CallDetail::Agent,
            None,
            vec![node("error-1", CallDetail::Error(Default::default()), None, vec![])],
        )];
        let stats = compute_aggregates(&forest);
        assert!(stats["agent-1"].has_errors());
        assert_eq!(stats["agent-1"].total_duration, None);
    }

    #[test]
    fn test_summary_across_roots() {
        let forest = vec![
            llm("llm-1", (0, 2), 10, 0.1),
            node("tool-1", CallDetail::Tool(Default::default()), Some((3, 7)), vec![]),
            llm("llm-2", (8, 12), 20, 0.2),
        ];
        let summary = summarize(&forest);

        assert_eq!(summary.totals.call_count, 3);
        assert_eq!(summary.totals.total_tokens, 30);
        assert_eq!(summary.totals.total_duration, Some(12.0));
        assert_eq!(summary.avg_llm_duration, Some(3.0));
        assert_eq!(summary.avg_tool_duration, Some(4.0));
        assert_eq!(summary.models, vec!["gpt-4o"]);
    }

    #[test]
    fn test_open_call_uses_reported_duration() {
        let mut open = llm("llm-1", (0, 0), 0, 0.0);
        open.call.end_time = None;
        open.call.duration = Some(5.0);
        let stats = compute_aggregates(&[open]);
        assert_eq!(stats["llm-1"].total_duration, Some(5.0));
    }

    #[test]
    fn test_token_totals_saturate() {
        let forest = vec![node(
            "agent-1",
            CallDetail::Agent,
            None,
            vec![llm("llm-1", (0, 1), u64::MAX, 0.0), llm("llm-2", (1, 2), u64::MAX, 0.0)],
        )];
        assert_eq!(compute_aggregates(&forest)["agent-1"].total_tokens, u64::MAX);
        assert_eq!(summarize(&forest).totals.total_tokens, u64::MAX);
    }

    #[test]
    fn test_empty_forest() {
        assert!(compute_aggregates(&[]).is_empty());
        let summary = summarize(&[]);
        assert_eq!(summary.totals.call_count, 0);
        assert_eq!(summary.avg_llm_duration, None);
    }
}
