//! Normalized call model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of call
///
/// The declaration order is the timeline lane order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    /// The trace itself
    Trace,
    /// Agent invocation
    Agent,
    /// LLM request
    Llm,
    /// Tool execution
    Tool,
    /// User interaction
    Interaction,
    /// Recorded error
    Error,
}

impl CallKind {
    /// All kinds in lane order
    pub const ALL: [CallKind; 6] = [
        Self::Trace,
        Self::Agent,
        Self::Llm,
        Self::Tool,
        Self::Interaction,
        Self::Error,
    ];

    /// Prefix used to qualify raw table ids
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Agent => "agent",
            Self::Llm => "llm",
            Self::Tool => "tool",
            Self::Interaction => "interaction",
            Self::Error => "error",
        }
    }

    /// Human-readable lane label
    pub fn label(self) -> &'static str {
        match self {
            Self::Trace => "Trace",
            Self::Agent => "Agent",
            Self::Llm => "LLM",
            Self::Tool => "Tool",
            Self::Interaction => "Interaction",
            Self::Error => "Error",
        }
    }

    /// Qualify a raw table id so it is unique across tables
    pub fn qualify(self, raw_id: &str) -> String {
        format!("{}-{}", self.prefix(), raw_id)
    }
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A numeric field coerced from loosely typed input
///
/// Sums treat anything that is not a number as zero, while display keeps
/// invalid and missing values apart from a genuine zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Quantity {
    /// A usable number
    Value(f64),
    /// Present but not numeric; keeps the original text
    Invalid(String),
    /// Absent
    #[default]
    Missing,
}

impl Quantity {
    /// Coerce a JSON value
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Missing,
            Value::Number(n) => n
                .as_f64()
                .map_or_else(|| Self::Invalid(n.to_string()), Self::Value),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Self::Missing;
                }
                match trimmed.parse::<f64>() {
                    Ok(v) if v.is_finite() => Self::Value(v),
                    _ => Self::Invalid(s.clone()),
                }
            }
            other => Self::Invalid(other.to_string()),
        }
    }

    /// The number, if there is one
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            _ => None,
        }
    }

    /// Value to use when summing
    pub fn sum_value(&self) -> f64 {
        self.value().unwrap_or(0.0)
    }

    /// Value to use when displaying
    pub fn display(&self) -> String {
        match self {
            Self::Value(v) => format!("{v}"),
            Self::Invalid(_) | Self::Missing => "N/A".to_string(),
        }
    }
}

/// Token usage of an LLM call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub input: u64,
    /// Completion tokens
    pub completion: u64,
    /// Reasoning tokens
    pub reasoning: u64,
    /// Total tokens (reported, or the sum of the parts)
    pub total: u64,
}

/// Cost of an LLM call in USD
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Prompt cost
    pub input: f64,
    /// Completion cost
    pub output: f64,
    /// Reasoning cost
    pub reasoning: f64,
    /// Total cost (reported, or the sum of the parts)
    pub total: f64,
}

/// A network request made during a tool call
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkCall {
    /// Requested URL
    pub url: Option<String>,
    /// HTTP method
    pub method: Option<String>,
    /// Response status code
    pub status_code: Option<u16>,
    /// Response time in seconds
    pub response_time: Quantity,
    /// Request body size
    pub bytes_sent: Quantity,
    /// Response body size
    pub bytes_received: Quantity,
    /// Transport error, if any
    pub error: Option<String>,
}

/// LLM-specific payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LlmDetail {
    /// Model name
    pub model: Option<String>,
    /// Prompt text
    pub input_prompt: Option<String>,
    /// Completion text
    pub output: Option<String>,
    /// Token counts
    pub token_usage: TokenUsage,
    /// Cost components
    pub cost: CostBreakdown,
    /// Memory used
    pub memory_used: Quantity,
    /// Duration as reported by the row
    pub reported_duration: Quantity,
}

/// Tool-specific payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolDetail {
    /// Input parameters
    pub input_parameters: Value,
    /// Tool output
    pub output: Option<String>,
    /// Network requests made by the tool
    pub network_calls: Vec<NetworkCall>,
    /// Memory used
    pub memory_used: Quantity,
    /// Duration as reported by the row
    pub reported_duration: Quantity,
}

/// Error-specific payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Error class
    pub error_type: String,
    /// Error message
    pub error_message: Option<String>,
}

/// Interaction-specific payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InteractionDetail {
    /// Interaction type
    pub interaction_type: String,
    /// Interaction content
    pub content: Option<String>,
}

/// Kind-specific payload; the variant determines the call's kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CallDetail {
    /// Trace
    Trace,
    /// Agent
    Agent,
    /// LLM call
    Llm(LlmDetail),
    /// Tool call
    Tool(ToolDetail),
    /// User interaction
    Interaction(InteractionDetail),
    /// Error
    Error(ErrorDetail),
}

/// A normalized record of one agent, LLM, tool, error or interaction event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    /// Identifier, unique within the trace
    pub id: String,

    /// Identifier as it appeared in the source table
    pub source_id: String,

    /// Display name
    pub name: String,

    /// When the call started
    pub start_time: Option<DateTime<Utc>>,

    /// When the call ended (absent for incomplete records)
    pub end_time: Option<DateTime<Utc>>,

    /// Duration in seconds, `None` when unmeasured
    pub duration: Option<f64>,

    /// Declared parent, used when no child list claims this call
    pub parent_id: Option<String>,

    /// Ordered child ids (agents only)
    pub child_ids: Vec<String>,

    /// Kind-specific payload
    #[serde(flatten)]
    pub detail: CallDetail,
}

impl Call {
    /// Kind of this call
    pub fn kind(&self) -> CallKind {
        match self.detail {
            CallDetail::Trace => CallKind::Trace,
            CallDetail::Agent => CallKind::Agent,
            CallDetail::Llm(_) => CallKind::Llm,
            CallDetail::Tool(_) => CallKind::Tool,
            CallDetail::Interaction(_) => CallKind::Interaction,
            CallDetail::Error(_) => CallKind::Error,
        }
    }

    /// Display label; LLM calls mention their model when it differs from the name
    pub fn label(&self) -> String {
        match &self.detail {
            CallDetail::Llm(LlmDetail {
                model: Some(model), ..
            }) if model != &self.name => format!("{} ({})", self.name, model),
            _ => self.name.clone(),
        }
    }

    /// End time: the recorded end, else `start + duration`, else the start.
    ///
    /// A duration too large to add to the start is ignored.
    pub fn effective_end(&self) -> Option<DateTime<Utc>> {
        self.end_time
            .or_else(|| {
                let start = self.start_time?;
                let secs = self.duration.filter(|d| d.is_finite() && *d >= 0.0)?;
                let delta = chrono::Duration::try_milliseconds((secs * 1_000.0) as i64)?;
                start.checked_add_signed(delta)
            })
            .or(self.start_time)
    }

    /// Total tokens used (LLM calls only)
    pub fn total_tokens(&self) -> u64 {
        match &self.detail {
            CallDetail::Llm(llm) => llm.token_usage.total,
            _ => 0,
        }
    }

    /// Total cost in USD (LLM calls only)
    pub fn cost(&self) -> f64 {
        match &self.detail {
            CallDetail::Llm(llm) => llm.cost.total,
            _ => 0.0,
        }
    }

    /// Model name for LLM calls
    pub fn model(&self) -> Option<&str> {
        match &self.detail {
            CallDetail::Llm(llm) => llm.model.as_deref(),
            _ => None,
        }
    }
}

/// Seconds from `start` to `end` (negative when `end` precedes `start`)
pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let delta = end - start;
    delta.num_microseconds().map_or_else(
        || delta.num_milliseconds() as f64 / 1_000.0,
        |us| us as f64 / 1_000_000.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!(12.5), Quantity::Value(12.5))]
    #[case(json!("3.25"), Quantity::Value(3.25))]
    #[case(json!(" 7 "), Quantity::Value(7.0))]
    #[case(json!("fast"), Quantity::Invalid("fast".to_string()))]
    #[case(json!(""), Quantity::Missing)]
    #[case(json!(null), Quantity::Missing)]
    #[case(json!(true), Quantity::Invalid("true".to_string()))]
    fn test_quantity_coercion(#[case] input: Value, #[case] expected: Quantity) {
        assert_eq!(Quantity::from_json(&input), expected);
    }

    #[test]
    fn test_invalid_quantity_sums_as_zero_but_displays_placeholder() {
        let q = Quantity::from_json(&json!("n/a-ish"));
        assert_eq!(q.sum_value(), 0.0);
        assert_eq!(q.display(), "N/A");

        let zero = Quantity::from_json(&json!(0));
        assert_eq!(zero.sum_value(), 0.0);
        assert_eq!(zero.display(), "0");
    }

    #[test]
    fn test_llm_label_includes_model() {
        let call = Call {
            id: "llm-1".to_string(),
            source_id: "1".to_string(),
            name: "summarize".to_string(),
            start_time: None,
            end_time: None,
            duration: None,
            parent_id: None,
            child_ids: vec![],
            detail: CallDetail::Llm(LlmDetail {
                model: Some("gpt-4o".to_string()),
                ..LlmDetail::default()
            }),
        };
        assert_eq!(call.kind(), CallKind::Llm);
        assert_eq!(call.label(), "summarize (gpt-4o)");

        let value = serde_json::to_value(&call).unwrap();
        assert_eq!(value["kind"], "llm");
    }

    #[test]
    fn test_effective_end_uses_reported_duration() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let mut call = Call {
            id: "llm-1".to_string(),
            source_id: "1".to_string(),
            name: "llm".to_string(),
            start_time: Some(start),
            end_time: None,
            duration: Some(5.0),
            parent_id: None,
            child_ids: vec![],
            detail: CallDetail::Llm(LlmDetail::default()),
        };
        assert_eq!(call.effective_end(), Some(start + chrono::Duration::seconds(5)));

        call.duration = Some(1e13);
        assert_eq!(call.effective_end(), Some(start));

        call.duration = Some(f64::NAN);
        assert_eq!(call.effective_end(), Some(start));

        call.start_time = None;
        assert_eq!(call.effective_end(), None);
    }

    #[test]
    fn test_seconds_between() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 2).unwrap();
        assert_eq!(seconds_between(a, b), 2.0);
        assert_eq!(seconds_between(b, a), -2.0);
    }

    #[test]
    fn test_kind_qualifies_ids() {
        assert_eq!(CallKind::Tool.qualify("7"), "tool-7");
        assert!(CallKind::Trace < CallKind::Error);
    }
}
