//! Raw row shapes as delivered by a data source
//!
//! Rows are deliberately loose: ids may be numbers or strings, timestamps may
//! be text or epoch seconds, and JSON sub-fields may arrive either as JSON text
//! (relational snapshot) or already decoded (REST API). Anything that needs
//! interpretation is kept as a [`serde_json::Value`] and resolved by the
//! normalizer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The trace row itself
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceRow {
    /// Trace identifier
    pub id: Value,
    /// Display name (project or run name)
    pub name: Option<String>,
    /// When the trace started
    pub start_time: Value,
    /// When the trace ended
    pub end_time: Value,
    /// Reported total duration in seconds
    #[serde(alias = "total_duration")]
    pub duration: Value,
}

/// One row of the `agent_call` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentCallRow {
    /// Row identifier
    pub id: Value,
    /// Agent name
    pub name: Option<String>,
    /// When the agent started
    pub start_time: Value,
    /// When the agent finished
    pub end_time: Value,
    /// JSON array of LLM call ids invoked by this agent
    pub llm_call_ids: Value,
    /// JSON array of tool call ids invoked by this agent
    pub tool_call_ids: Value,
    /// Enclosing agent, for nested agents
    pub parent_agent_id: Value,
}

/// One row of the `llm_call` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmCallRow {
    /// Row identifier
    pub id: Value,
    /// Call name
    pub name: Option<String>,
    /// Model name (e.g. "gpt-4o")
    pub model: Option<String>,
    /// When the call started
    pub start_time: Value,
    /// When the call finished
    pub end_time: Value,
    /// Reported duration in seconds
    pub duration: Value,
    /// JSON object of token counts
    pub token_usage: Value,
    /// JSON object of cost components
    pub cost: Value,
    /// Prompt text
    pub input_prompt: Value,
    /// Completion text
    pub output: Value,
    /// Memory used by the call
    pub memory_used: Value,
    /// Agent that made the call, when recorded on the call side
    pub agent_id: Value,
}

/// One row of the `tool_call` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolCallRow {
    /// Row identifier
    pub id: Value,
    /// Tool name
    pub name: Option<String>,
    /// When the tool started
    pub start_time: Value,
    /// When the tool finished
    pub end_time: Value,
    /// Reported duration in seconds
    pub duration: Value,
    /// JSON object of input parameters
    pub input_parameters: Value,
    /// Tool output
    pub output: Value,
    /// JSON array of network calls made by the tool
    pub network_calls: Value,
    /// Memory used by the tool
    pub memory_used: Value,
    /// Agent that made the call, when recorded on the call side
    pub agent_id: Value,
}

/// One row of the `errors` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorRow {
    /// Row identifier
    pub id: Value,
    /// Error class
    pub error_type: Option<String>,
    /// Error message
    pub error_message: Option<String>,
    /// When the error occurred
    pub timestamp: Value,
    /// Owning agent
    pub agent_id: Value,
    /// Owning tool call
    pub tool_call_id: Value,
    /// Owning LLM call
    pub llm_call_id: Value,
}

/// One row of the `user_interactions` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionRow {
    /// Row identifier
    pub id: Value,
    /// Interaction type (input, output, feedback, ...)
    pub interaction_type: Option<String>,
    /// Interaction content
    pub content: Value,
    /// When the interaction happened
    pub timestamp: Value,
    /// Owning agent
    pub agent_id: Value,
    /// Owning tool call
    pub tool_call_id: Value,
    /// Owning LLM call
    pub llm_call_id: Value,
}

/// All raw rows of a single trace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRows {
    /// The trace row, when the source has one
    pub trace: Option<TraceRow>,
    /// Agent calls
    #[serde(alias = "agent_call")]
    pub agent_calls: Vec<AgentCallRow>,
    /// LLM calls
    #[serde(alias = "llm_call")]
    pub llm_calls: Vec<LlmCallRow>,
    /// Tool calls
    #[serde(alias = "tool_call")]
    pub tool_calls: Vec<ToolCallRow>,
    /// Errors
    pub errors: Vec<ErrorRow>,
    /// User interactions
    #[serde(alias = "interactions")]
    pub user_interactions: Vec<InteractionRow>,
}

impl RawRows {
    /// Total number of rows, including the trace row
    pub fn len(&self) -> usize {
        usize::from(self.trace.is_some())
            + self.agent_calls.len()
            + self.llm_calls.len()
            + self.tool_calls.len()
            + self.errors.len()
            + self.user_interactions.len()
    }

    /// Whether the trace has no rows at all
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A trace as listed by a data source, before its rows are fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceListing {
    /// Trace identifier
    pub id: String,
    /// Display name, if any
    pub name: Option<String>,
    /// When the trace started
    pub start_time: Option<DateTime<Utc>>,
    /// When the trace ended
    pub end_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_accept_table_names_and_missing_fields() {
        let rows: RawRows = serde_json::from_value(serde_json::json!({
            "agent_call": [{"id": 1, "name": "planner"}],
            "llm_call": [{"id": "L1"}],
            "errors": []
        }))
        .unwrap();

        assert_eq!(rows.agent_calls.len(), 1);
        assert_eq!(rows.agent_calls[0].llm_call_ids, Value::Null);
        assert_eq!(rows.llm_calls.len(), 1);
        assert_eq!(rows.len(), 2);
        assert!(!rows.is_empty());
    }

    #[test]
    fn test_empty_rows() {
        assert!(RawRows::default().is_empty());
    }
}
