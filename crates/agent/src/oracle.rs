//! Decision oracle boundary.
//!
//! The oracle is the external component that, given an agent's instructions,
//! its capabilities, and the conversation so far, picks exactly one next
//! step. The turn loop re-invokes it within a bounded number of rounds, so
//! an implementation must tolerate repeated calls for one user message.
//! Anything can sit behind the trait: an LLM client, a classifier, or the
//! deterministic rules engine shipped here for offline use.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::session::HistoryItem;
use crate::tools::ToolDescriptor;

/// What the oracle sees of a handoff edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandoffDescriptor {
    pub target: String,
    pub description: String,
}

/// Everything the oracle is given for one decision.
pub struct OracleRequest<'a> {
    /// Name of the agent being run; oracles must not use it for anything
    /// beyond logging and rule lookup.
    pub agent: &'a str,
    /// Instructions already rendered against the current trip context.
    pub instructions: String,
    pub tools: Vec<ToolDescriptor>,
    pub handoffs: Vec<HandoffDescriptor>,
    pub history: &'a [HistoryItem],
}

/// Exactly one of reply, tool call, or handoff.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OracleDecision {
    Reply(String),
    ToolCall { tool: String, arguments: Value },
    Handoff { target: String },
}

#[async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn decide(&self, request: OracleRequest<'_>) -> anyhow::Result<OracleDecision>;
}

/// Deterministic keyword rules engine behind the oracle interface.
///
/// Routes from triage by topic keywords, invokes each specialist's tool with
/// arguments parsed from the user text, replies with tool output, and hands
/// off-topic-for-the-specialist requests back to triage. Used by the CLI
/// chat demo and by tests; not a substitute for a real language model.
#[derive(Clone, Copy, Debug, Default)]
pub struct RuleOracle;

impl RuleOracle {
    fn latest_user_text<'a>(history: &'a [HistoryItem]) -> &'a str {
        history
            .iter()
            .rev()
            .find_map(|item| match item {
                HistoryItem::User { text } => Some(text.as_str()),
                _ => None,
            })
            .unwrap_or("")
    }

    /// Tool output produced since the latest user message, if any.
    fn pending_tool_output(history: &[HistoryItem]) -> Option<&str> {
        for item in history.iter().rev() {
            match item {
                HistoryItem::ToolResult { output, .. } => return Some(output),
                HistoryItem::User { .. } => return None,
                _ => {}
            }
        }
        None
    }

    fn offers_handoff(request: &OracleRequest<'_>, target: &str) -> bool {
        request.handoffs.iter().any(|handoff| handoff.target == target)
    }

    fn route_from_triage(request: &OracleRequest<'_>, text: &str) -> OracleDecision {
        let routes: &[(&str, &[&str])] = &[
            ("seat_booking", &["seat", "sit "]),
            ("cancellation", &["cancel", "refund"]),
            ("flight_status", &["status", "delayed", "on time", "late", "gate"]),
            ("faq", &["bag", "luggage", "wifi", "wi-fi", "plane", "how", "what", "which", "?"]),
        ];
        for (target, keywords) in routes {
            if keywords.iter().any(|keyword| text.contains(keyword))
                && Self::offers_handoff(request, target)
            {
                return OracleDecision::Handoff { target: target.to_string() };
            }
        }
        OracleDecision::Reply(
            "Hi, I'm the airline support desk. I can help with seat changes, flight status, \
             cancellations, and general questions."
                .to_string(),
        )
    }

    /// A token like `12A` or `23C`: digits followed by one cabin letter.
    fn find_seat_token(text: &str) -> Option<String> {
        text.split_whitespace()
            .map(|word| word.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
            .find(|word| {
                word.len() >= 2
                    && word.len() <= 3
                    && word[..word.len() - 1].chars().all(|c| c.is_ascii_digit())
                    && word.chars().last().is_some_and(|c| c.is_ascii_alphabetic())
            })
            .map(|word| word.to_uppercase())
    }

    /// A token like `FLT-456`: letters, a dash, then digits.
    fn find_flight_token(text: &str) -> Option<String> {
        text.split_whitespace()
            .map(|word| word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-'))
            .find(|word| {
                word.split_once('-').is_some_and(|(prefix, digits)| {
                    !prefix.is_empty()
                        && prefix.chars().all(|c| c.is_ascii_alphabetic())
                        && !digits.is_empty()
                        && digits.chars().all(|c| c.is_ascii_digit())
                })
            })
            .map(|word| word.to_uppercase())
    }

    /// A token like `ABC123`: letters then digits, no separator.
    fn find_confirmation_token(text: &str) -> Option<String> {
        text.split_whitespace()
            .map(|word| word.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
            .find(|word| {
                let letters = word.chars().take_while(|c| c.is_ascii_alphabetic()).count();
                letters >= 2
                    && letters < word.len()
                    && word.chars().skip(letters).all(|c| c.is_ascii_digit())
            })
            .map(|word| word.to_uppercase())
    }

    fn decide_for_seat_booking(request: &OracleRequest<'_>, text: &str) -> OracleDecision {
        if text.contains("map") {
            return OracleDecision::ToolCall {
                tool: "display_seat_map".to_string(),
                arguments: json!({}),
            };
        }
        if let Some(seat) = Self::find_seat_token(text) {
            let confirmation = Self::find_confirmation_token(text)
                .unwrap_or_else(|| skydesk_core::DemoReservations::CONFIRMATION_NUMBER.to_string());
            return OracleDecision::ToolCall {
                tool: "update_seat".to_string(),
                arguments: json!({ "confirmation_number": confirmation, "new_seat": seat }),
            };
        }
        if Self::offers_handoff(request, "triage") && !text.contains("seat") {
            return OracleDecision::Handoff { target: "triage".to_string() };
        }
        OracleDecision::Reply(
            "Which seat would you like? I can also show you the seat map.".to_string(),
        )
    }

    fn decide_for_flight_status(request: &OracleRequest<'_>, text: &str) -> OracleDecision {
        if let Some(flight) = Self::find_flight_token(text) {
            return OracleDecision::ToolCall {
                tool: "flight_status".to_string(),
                arguments: json!({ "flight_number": flight }),
            };
        }
        if Self::offers_handoff(request, "triage") && !text.contains("status") {
            return OracleDecision::Handoff { target: "triage".to_string() };
        }
        OracleDecision::Reply("Which flight number should I check?".to_string())
    }

    fn decide_for_cancellation(request: &OracleRequest<'_>, text: &str) -> OracleDecision {
        let confirmed =
            text.contains("yes") || text.contains("confirm") || text.contains("cancel");
        if confirmed {
            return OracleDecision::ToolCall {
                tool: "cancel_flight".to_string(),
                arguments: json!({}),
            };
        }
        if Self::offers_handoff(request, "triage") {
            return OracleDecision::Handoff { target: "triage".to_string() };
        }
        OracleDecision::Reply("Should I go ahead and cancel your flight?".to_string())
    }

    fn decide_for_faq(text: &str) -> OracleDecision {
        let tool = if text.contains("fee") || text.contains("allowance") {
            "baggage_info"
        } else {
            "faq_lookup"
        };
        let key = if tool == "baggage_info" { "query" } else { "question" };
        OracleDecision::ToolCall { tool: tool.to_string(), arguments: json!({ key: text }) }
    }
}

#[async_trait]
impl DecisionOracle for RuleOracle {
    async fn decide(&self, request: OracleRequest<'_>) -> anyhow::Result<OracleDecision> {
        // A tool already ran for this message: surface its output verbatim.
        if let Some(output) = Self::pending_tool_output(request.history) {
            return Ok(OracleDecision::Reply(output.to_string()));
        }

        let text = Self::latest_user_text(request.history).to_lowercase();
        Ok(match request.agent {
            "seat_booking" => Self::decide_for_seat_booking(&request, &text),
            "flight_status" => Self::decide_for_flight_status(&request, &text),
            "cancellation" => Self::decide_for_cancellation(&request, &text),
            "faq" => Self::decide_for_faq(&text),
            _ => Self::route_from_triage(&request, &text),
        })
    }
}
