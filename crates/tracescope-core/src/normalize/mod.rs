//! Record normalizer - raw table rows to uniform calls
//!
//! Each table has its own field names and JSON-encoded sub-fields. The
//! normalizer resolves all of them into [`Call`] values with consistent
//! timestamps, durations and a kind-specific payload. It never fails: a
//! malformed field degrades to its default and the rest of the batch is
//! unaffected.

pub(crate) mod fields;

use serde_json::Value;
use tracing::debug;

use crate::models::{
    AgentCallRow, Call, CallDetail, CallKind, ErrorDetail, ErrorRow, InteractionDetail,
    InteractionRow, LlmCallRow, LlmDetail, Quantity, RawRows, ToolCallRow, ToolDetail, TraceRow,
};

pub use fields::timestamp as parse_timestamp;

/// Normalize all rows of one trace.
///
/// Output order is trace, agents, LLM calls, tool calls, errors, then
/// interactions, each in input order.
pub fn normalize(rows: &RawRows) -> Vec<Call> {
    let mut calls = Vec::with_capacity(rows.len());

    if let Some(trace) = &rows.trace {
        calls.push(normalize_trace(trace));
    }
    calls.extend(
        rows.agent_calls
            .iter()
            .enumerate()
            .map(|(i, row)| normalize_agent(i, row)),
    );
    calls.extend(
        rows.llm_calls
            .iter()
            .enumerate()
            .map(|(i, row)| normalize_llm(i, row)),
    );
    calls.extend(
        rows.tool_calls
            .iter()
            .enumerate()
            .map(|(i, row)| normalize_tool(i, row)),
    );
    calls.extend(
        rows.errors
            .iter()
            .enumerate()
            .map(|(i, row)| normalize_error(i, row)),
    );
    calls.extend(
        rows.user_interactions
            .iter()
            .enumerate()
            .map(|(i, row)| normalize_interaction(i, row)),
    );

    debug!(rows = rows.len(), calls = calls.len(), "Normalized trace rows");
    calls
}

/// Source id for a row; rows without one get a positional id
fn source_id(kind: CallKind, index: usize, value: &Value) -> String {
    fields::raw_id(value).unwrap_or_else(|| {
        debug!(kind = %kind, index, "Row without id, using position");
        format!("#{index}")
    })
}

fn reference(kind: CallKind, value: &Value) -> Option<String> {
    fields::raw_id(value).map(|id| kind.qualify(&id))
}

/// Most specific declared owner of an error or interaction
fn owner(tool_call_id: &Value, llm_call_id: &Value, agent_id: &Value) -> Option<String> {
    reference(CallKind::Tool, tool_call_id)
        .or_else(|| reference(CallKind::Llm, llm_call_id))
        .or_else(|| reference(CallKind::Agent, agent_id))
}

fn normalize_trace(row: &TraceRow) -> Call {
    let source_id = source_id(CallKind::Trace, 0, &row.id);
    let start_time = fields::timestamp(&row.start_time);
    let end_time = fields::timestamp(&row.end_time);

    Call {
        id: CallKind::Trace.qualify(&source_id),
        name: row
            .name
            .clone()
            .unwrap_or_else(|| format!("Trace {source_id}")),
        source_id,
        start_time,
        end_time,
        duration: fields::duration(start_time, end_time, &Quantity::from_json(&row.duration)),
        parent_id: None,
        child_ids: Vec::new(),
        detail: CallDetail::Trace,
    }
}

fn normalize_agent(index: usize, row: &AgentCallRow) -> Call {
    let source_id = source_id(CallKind::Agent, index, &row.id);
    let start_time = fields::timestamp(&row.start_time);
    let end_time = fields::timestamp(&row.end_time);

    let child_ids = fields::id_list(&row.llm_call_ids, "llm_call_ids")
        .into_iter()
        .map(|id| CallKind::Llm.qualify(&id))
        .chain(
            fields::id_list(&row.tool_call_ids, "tool_call_ids")
                .into_iter()
                .map(|id| CallKind::Tool.qualify(&id)),
        )
        .collect();

    Call {
        id: CallKind::Agent.qualify(&source_id),
        name: row
            .name
            .clone()
            .unwrap_or_else(|| format!("Agent {source_id}")),
        source_id,
        start_time,
        end_time,
        duration: fields::duration(start_time, end_time, &Quantity::Missing),
        parent_id: reference(CallKind::Agent, &row.parent_agent_id),
        child_ids,
        detail: CallDetail::Agent,
    }
}

fn normalize_llm(index: usize, row: &LlmCallRow) -> Call {
    let source_id = source_id(CallKind::Llm, index, &row.id);
    let start_time = fields::timestamp(&row.start_time);
    let end_time = fields::timestamp(&row.end_time);
    let reported_duration = Quantity::from_json(&row.duration);

    Call {
        id: CallKind::Llm.qualify(&source_id),
        name: row
            .name
            .clone()
            .or_else(|| row.model.clone())
            .unwrap_or_else(|| "LLM call".to_string()),
        source_id,
        start_time,
        end_time,
        duration: fields::duration(start_time, end_time, &reported_duration),
        parent_id: reference(CallKind::Agent, &row.agent_id),
        child_ids: Vec::new(),
        detail: CallDetail::Llm(LlmDetail {
            model: row.model.clone(),
            input_prompt: fields::text(&row.input_prompt),
            output: fields::text(&row.output),
            token_usage: fields::token_usage(&row.token_usage),
            cost: fields::cost(&row.cost),
            memory_used: Quantity::from_json(&row.memory_used),
            reported_duration,
        }),
    }
}

fn normalize_tool(index: usize, row: &ToolCallRow) -> Call {
    let source_id = source_id(CallKind::Tool, index, &row.id);
    let start_time = fields::timestamp(&row.start_time);
    let end_time = fields::timestamp(&row.end_time);
    let reported_duration = Quantity::from_json(&row.duration);

    Call {
        id: CallKind::Tool.qualify(&source_id),
        name: row.name.clone().unwrap_or_else(|| "tool".to_string()),
        source_id,
        start_time,
        end_time,
        duration: fields::duration(start_time, end_time, &reported_duration),
        parent_id: reference(CallKind::Agent, &row.agent_id),
        child_ids: Vec::new(),
        detail: CallDetail::Tool(ToolDetail {
            input_parameters: Value::Object(fields::json_object(
                &row.input_parameters,
                "input_parameters",
            )),
            output: fields::text(&row.output),
            network_calls: fields::network_calls(&row.network_calls),
            memory_used: Quantity::from_json(&row.memory_used),
            reported_duration,
        }),
    }
}

fn normalize_error(index: usize, row: &ErrorRow) -> Call {
    let source_id = source_id(CallKind::Error, index, &row.id);
    let at = fields::timestamp(&row.timestamp);
    let error_type = row
        .error_type
        .clone()
        .unwrap_or_else(|| "Error".to_string());

    Call {
        id: CallKind::Error.qualify(&source_id),
        name: error_type.clone(),
        source_id,
        start_time: at,
        end_time: at,
        duration: at.map(|_| 0.0),
        parent_id: owner(&row.tool_call_id, &row.llm_call_id, &row.agent_id),
        child_ids: Vec::new(),
        detail: CallDetail::Error(ErrorDetail {
            error_type,
            error_message: row.error_message.clone(),
        }),
    }
}

fn normalize_interaction(index: usize, row: &InteractionRow) -> Call {
    let source_id = source_id(CallKind::Interaction, index, &row.id);
    let at = fields::timestamp(&row.timestamp);
    let interaction_type = row
        .interaction_type
        .clone()
        .unwrap_or_else(|| "interaction".to_string());

    Call {
        id: CallKind::Interaction.qualify(&source_id),
        name: interaction_type.clone(),
        source_id,
        start_time: at,
        end_time: at,
        duration: at.map(|_| 0.0),
        parent_id: owner(&row.tool_call_id, &row.llm_call_id, &row.agent_id),
        child_ids: Vec::new(),
        detail: CallDetail::Interaction(InteractionDetail {
            interaction_type,
            content: fields::text(&row.content),
        }),
    }
}
