use thiserror::Error;

/// Failure taxonomy for a single conversation turn.
///
/// Guardrail trips are not errors: they are a normal (refused) turn outcome.
/// Everything here aborts the turn; the session stays on its current agent
/// and keeps any context mutations already applied by completed tool calls.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    /// A tool precondition failed: a required fact is absent from the
    /// trip context at call time.
    #[error("tool `{tool}` requires `{fact}` but it is not on file")]
    MissingFact { tool: String, fact: &'static str },
    /// The oracle requested a tool the active agent was never granted.
    /// A configuration/contract violation, never a user-caused condition.
    #[error("agent `{agent}` has no tool named `{tool}`")]
    UnknownTool { agent: String, tool: String },
    /// The oracle requested a handoff with no declared edge.
    #[error("agent `{agent}` has no handoff edge to `{target}`")]
    UnknownHandoff { agent: String, target: String },
    /// The oracle supplied arguments that do not match the tool's schema.
    #[error("tool `{tool}` called with missing or invalid argument `{argument}`")]
    InvalidArguments { tool: String, argument: &'static str },
    #[error("oracle call exceeded {timeout_secs}s")]
    OracleTimeout { timeout_secs: u64 },
    #[error("tool `{tool}` exceeded {timeout_secs}s")]
    ToolTimeout { tool: String, timeout_secs: u64 },
    /// The decide loop hit the round cap without producing a reply.
    #[error("turn exceeded {rounds} tool/handoff rounds without a reply")]
    RunawayToolLoop { rounds: u32 },
    #[error("oracle failure: {message}")]
    Oracle { message: String },
}

/// Stable classification carried on `TurnOutcome::Failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnErrorKind {
    MissingFact,
    ContractViolation,
    Timeout,
    RunawayToolLoop,
    OracleFailure,
}

impl TurnError {
    pub fn kind(&self) -> TurnErrorKind {
        match self {
            Self::MissingFact { .. } => TurnErrorKind::MissingFact,
            Self::UnknownTool { .. }
            | Self::UnknownHandoff { .. }
            | Self::InvalidArguments { .. } => TurnErrorKind::ContractViolation,
            Self::OracleTimeout { .. } | Self::ToolTimeout { .. } => TurnErrorKind::Timeout,
            Self::RunawayToolLoop { .. } => TurnErrorKind::RunawayToolLoop,
            Self::Oracle { .. } => TurnErrorKind::OracleFailure,
        }
    }

    /// Text safe to surface to the end user. Precondition failures name the
    /// missing fact so the caller can supply it; internal failures never
    /// leak implementation detail.
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingFact { fact, .. } => {
                let fact = fact.replace('_', " ");
                format!("I don't have your {fact} on file yet. Could you share it so I can help?")
            }
            Self::OracleTimeout { .. } | Self::ToolTimeout { .. } => {
                "That took longer than expected. Please try again.".to_string()
            }
            Self::UnknownTool { .. }
            | Self::UnknownHandoff { .. }
            | Self::InvalidArguments { .. }
            | Self::RunawayToolLoop { .. }
            | Self::Oracle { .. } => {
                "Something went wrong on our side. Please try again.".to_string()
            }
        }
    }

    /// True for errors that indicate a broken oracle contract or broken
    /// configuration rather than anything the user did.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::UnknownTool { .. } | Self::UnknownHandoff { .. } | Self::InvalidArguments { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{TurnError, TurnErrorKind};

    #[test]
    fn missing_fact_names_the_fact_conversationally() {
        let error =
            TurnError::MissingFact { tool: "update_seat".to_string(), fact: "flight_number" };
        assert_eq!(error.kind(), TurnErrorKind::MissingFact);
        assert!(error.user_message().contains("flight number"));
    }

    #[test]
    fn contract_violations_surface_a_generic_message() {
        let error = TurnError::UnknownTool {
            agent: "triage".to_string(),
            tool: "update_seat".to_string(),
        };
        assert_eq!(error.kind(), TurnErrorKind::ContractViolation);
        assert!(error.is_contract_violation());
        assert!(!error.user_message().contains("update_seat"));
    }

    #[test]
    fn timeouts_share_a_retryable_kind() {
        let oracle = TurnError::OracleTimeout { timeout_secs: 30 };
        let tool = TurnError::ToolTimeout { tool: "faq_lookup".to_string(), timeout_secs: 10 };
        assert_eq!(oracle.kind(), TurnErrorKind::Timeout);
        assert_eq!(tool.kind(), TurnErrorKind::Timeout);
    }

    #[test]
    fn runaway_loop_is_distinct_from_timeouts() {
        let error = TurnError::RunawayToolLoop { rounds: 8 };
        assert_eq!(error.kind(), TurnErrorKind::RunawayToolLoop);
        assert!(!error.user_message().contains("rounds"));
    }
}
