//! The turn loop: one inbound message processed to completion.
//!
//! Guardrails gate every message before routing. After that, the runtime
//! drives the oracle in a bounded decide loop: tool calls execute
//! synchronously against the session context, handoffs move the
//! active-agent pointer, and the same user message continues under the new
//! agent until a reply is produced or the round cap trips. Oracle and tool
//! calls are the only suspension points and each runs under a timeout.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use skydesk_core::{AppConfig, ReservationBackend, TurnError, TurnErrorKind};

use crate::graph::AgentGraph;
use crate::guardrails::{self, PipelineResult};
use crate::oracle::{DecisionOracle, HandoffDescriptor, OracleDecision, OracleRequest};
use crate::session::{HistoryItem, Session, SessionStore};
use crate::tools::ToolRegistry;

/// Bounds on a single turn.
#[derive(Clone, Copy, Debug)]
pub struct TurnLimits {
    /// Cap on tool-call and handoff rounds for one user message.
    pub max_rounds: u32,
    pub oracle_timeout: Duration,
    pub tool_timeout: Duration,
}

impl Default for TurnLimits {
    fn default() -> Self {
        Self {
            max_rounds: 8,
            oracle_timeout: Duration::from_secs(30),
            tool_timeout: Duration::from_secs(10),
        }
    }
}

impl TurnLimits {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_rounds: config.runtime.max_rounds,
            oracle_timeout: Duration::from_secs(config.oracle.timeout_secs),
            tool_timeout: Duration::from_secs(config.runtime.tool_timeout_secs),
        }
    }
}

/// The visible result of one turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    Replied { agent: String, text: String },
    Refused { guardrail: String, rationale: String },
    Failed { kind: TurnErrorKind, message: String },
}

/// Orchestrates sessions, guardrails, tools, and the oracle.
pub struct SupportRuntime {
    graph: Arc<AgentGraph>,
    tools: Arc<ToolRegistry>,
    oracle: Arc<dyn DecisionOracle>,
    sessions: SessionStore,
    limits: TurnLimits,
}

impl SupportRuntime {
    pub fn new(
        graph: Arc<AgentGraph>,
        tools: Arc<ToolRegistry>,
        oracle: Arc<dyn DecisionOracle>,
        reservations: Arc<dyn ReservationBackend>,
        limits: TurnLimits,
    ) -> Self {
        let sessions = SessionStore::new(graph.root(), reservations);
        Self { graph, tools, oracle, sessions, limits }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Conversation entry point: run one turn for one session.
    ///
    /// Turns are serialized per session (the session lock is held end to
    /// end); distinct sessions proceed in parallel.
    pub async fn handle_message(&self, session_id: &str, raw_input: &str) -> TurnOutcome {
        let session = self.sessions.get_or_create(session_id).await;
        let mut session = session.lock().await;
        let turn_id = Uuid::new_v4();

        match self.run_turn(&mut session, raw_input, turn_id).await {
            Ok(outcome) => outcome,
            Err(turn_error) => {
                if turn_error.is_contract_violation() {
                    error!(
                        session_id = %session.id,
                        turn_id = %turn_id,
                        agent = %session.active_agent,
                        error = %turn_error,
                        "oracle contract violation"
                    );
                } else {
                    warn!(
                        session_id = %session.id,
                        turn_id = %turn_id,
                        agent = %session.active_agent,
                        error = %turn_error,
                        "turn aborted"
                    );
                }
                TurnOutcome::Failed {
                    kind: turn_error.kind(),
                    message: turn_error.user_message(),
                }
            }
        }
    }

    async fn run_turn(
        &self,
        session: &mut Session,
        raw_input: &str,
        turn_id: Uuid,
    ) -> Result<TurnOutcome, TurnError> {
        let mut agent = self.graph.get(&session.active_agent).ok_or_else(|| TurnError::Oracle {
            message: format!("active agent `{}` is not in the graph", session.active_agent),
        })?;

        // Guardrails share the oracle timeout budget; shipped classifiers
        // are instant but an LLM-backed one is oracle-like I/O.
        let gate = timeout(
            self.limits.oracle_timeout,
            guardrails::evaluate_all(&agent.guardrails, raw_input),
        )
        .await
        .map_err(|_| TurnError::OracleTimeout {
            timeout_secs: self.limits.oracle_timeout.as_secs(),
        })?
        .map_err(|source| TurnError::Oracle { message: source.to_string() })?;

        match gate {
            PipelineResult::Blocked { guardrail, rationale } => {
                info!(
                    session_id = %session.id,
                    turn_id = %turn_id,
                    agent = %agent.name,
                    guardrail = %guardrail,
                    "turn refused by guardrail"
                );
                return Ok(TurnOutcome::Refused { guardrail: guardrail.to_string(), rationale });
            }
            PipelineResult::Pass => {}
        }

        session.history.push(HistoryItem::User { text: raw_input.to_string() });

        let mut rounds = 0u32;
        loop {
            let request = OracleRequest {
                agent: &agent.name,
                instructions: agent.instructions(&session.context),
                tools: self.tools.descriptors(&agent.tools),
                handoffs: agent
                    .handoffs
                    .iter()
                    .map(|edge| HandoffDescriptor {
                        target: edge.target.clone(),
                        description: edge.description.clone(),
                    })
                    .collect(),
                history: &session.history,
            };

            let decision = timeout(self.limits.oracle_timeout, self.oracle.decide(request))
                .await
                .map_err(|_| TurnError::OracleTimeout {
                    timeout_secs: self.limits.oracle_timeout.as_secs(),
                })?
                .map_err(|source| TurnError::Oracle { message: source.to_string() })?;

            match decision {
                OracleDecision::Reply(text) => {
                    session.history.push(HistoryItem::Assistant {
                        agent: agent.name.clone(),
                        text: text.clone(),
                    });
                    debug!(
                        session_id = %session.id,
                        turn_id = %turn_id,
                        agent = %agent.name,
                        rounds = rounds,
                        "turn replied"
                    );
                    return Ok(TurnOutcome::Replied { agent: agent.name.clone(), text });
                }
                OracleDecision::ToolCall { tool, arguments } => {
                    if !agent.grants_tool(&tool) {
                        return Err(TurnError::UnknownTool {
                            agent: agent.name.clone(),
                            tool,
                        });
                    }
                    rounds += 1;
                    if rounds > self.limits.max_rounds {
                        return Err(TurnError::RunawayToolLoop { rounds });
                    }

                    // Graph construction guarantees granted tools resolve.
                    let handler = self.tools.get(&tool).ok_or_else(|| TurnError::UnknownTool {
                        agent: agent.name.clone(),
                        tool: tool.clone(),
                    })?;

                    session
                        .history
                        .push(HistoryItem::ToolCall { tool: tool.clone(), arguments: arguments.clone() });

                    let output =
                        timeout(self.limits.tool_timeout, handler.invoke(&mut session.context, arguments))
                            .await
                            .map_err(|_| TurnError::ToolTimeout {
                                tool: tool.clone(),
                                timeout_secs: self.limits.tool_timeout.as_secs(),
                            })??;

                    debug!(
                        session_id = %session.id,
                        turn_id = %turn_id,
                        agent = %agent.name,
                        tool = %tool,
                        "tool executed"
                    );
                    session.history.push(HistoryItem::ToolResult { tool, output });
                }
                OracleDecision::Handoff { target } => {
                    let edge = agent.edge_to(&target).ok_or_else(|| TurnError::UnknownHandoff {
                        agent: agent.name.clone(),
                        target: target.clone(),
                    })?;
                    rounds += 1;
                    if rounds > self.limits.max_rounds {
                        return Err(TurnError::RunawayToolLoop { rounds });
                    }

                    edge.apply_transfer(&mut session.context);
                    session.history.push(HistoryItem::Handoff {
                        from: agent.name.clone(),
                        to: target.clone(),
                    });
                    info!(
                        session_id = %session.id,
                        turn_id = %turn_id,
                        from = %agent.name,
                        to = %target,
                        "handoff"
                    );

                    session.active_agent = target.clone();
                    agent = self.graph.get(&target).ok_or_else(|| TurnError::UnknownHandoff {
                        agent: session.active_agent.clone(),
                        target,
                    })?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;

    use skydesk_core::{DemoReservations, TurnErrorKind};

    use super::{SupportRuntime, TurnLimits, TurnOutcome};
    use crate::airline::AirlineDesk;
    use crate::oracle::{DecisionOracle, OracleDecision, OracleRequest};

    /// Replays a fixed script of decisions, one per invocation.
    pub(crate) struct ScriptedOracle {
        script: Mutex<Vec<OracleDecision>>,
    }

    impl ScriptedOracle {
        pub(crate) fn new(decisions: Vec<OracleDecision>) -> Self {
            Self { script: Mutex::new(decisions) }
        }
    }

    #[async_trait]
    impl DecisionOracle for ScriptedOracle {
        async fn decide(&self, _request: OracleRequest<'_>) -> anyhow::Result<OracleDecision> {
            let mut script = self.script.lock().await;
            if script.is_empty() {
                anyhow::bail!("scripted oracle ran out of decisions");
            }
            Ok(script.remove(0))
        }
    }

    /// Always asks for the same tool; used to exercise the round cap.
    struct LoopingOracle;

    #[async_trait]
    impl DecisionOracle for LoopingOracle {
        async fn decide(&self, _request: OracleRequest<'_>) -> anyhow::Result<OracleDecision> {
            Ok(OracleDecision::ToolCall {
                tool: "faq_lookup".to_string(),
                arguments: json!({ "question": "is there wifi?" }),
            })
        }
    }

    /// Never resolves; used to exercise the oracle timeout.
    struct StalledOracle;

    #[async_trait]
    impl DecisionOracle for StalledOracle {
        async fn decide(&self, _request: OracleRequest<'_>) -> anyhow::Result<OracleDecision> {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    fn runtime_with(oracle: Arc<dyn DecisionOracle>, limits: TurnLimits) -> SupportRuntime {
        let desk = AirlineDesk::build(Arc::new(DemoReservations)).expect("desk builds");
        SupportRuntime::new(desk.graph, desk.tools, oracle, Arc::new(DemoReservations), limits)
    }

    #[tokio::test]
    async fn scripted_reply_is_returned() {
        let oracle = Arc::new(ScriptedOracle::new(vec![OracleDecision::Reply(
            "Happy to help with your flight.".to_string(),
        )]));
        let runtime = runtime_with(oracle, TurnLimits::default());

        let outcome = runtime.handle_message("s1", "hello, question about my flight").await;
        assert_eq!(
            outcome,
            TurnOutcome::Replied {
                agent: "triage".to_string(),
                text: "Happy to help with your flight.".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn unknown_tool_is_a_contract_violation() {
        // Triage has no tools at all, so any tool call breaks the contract.
        let oracle = Arc::new(ScriptedOracle::new(vec![OracleDecision::ToolCall {
            tool: "update_seat".to_string(),
            arguments: json!({}),
        }]));
        let runtime = runtime_with(oracle, TurnLimits::default());

        let outcome = runtime.handle_message("s1", "seat please").await;
        match outcome {
            TurnOutcome::Failed { kind, message } => {
                assert_eq!(kind, TurnErrorKind::ContractViolation);
                assert!(!message.contains("update_seat"), "internal detail leaked: {message}");
            }
            other => panic!("expected a failed turn, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_handoff_is_a_contract_violation() {
        let oracle = Arc::new(ScriptedOracle::new(vec![OracleDecision::Handoff {
            target: "faq".to_string(),
        }]));
        let runtime = runtime_with(oracle, TurnLimits::default());

        // Specialists only declare an edge back to triage, so a direct
        // seat_booking -> faq handoff breaks the contract.
        let session = runtime.sessions().get_or_create("s1").await;
        session.lock().await.active_agent = "seat_booking".to_string();

        let outcome = runtime.handle_message("s1", "change my seat").await;
        match outcome {
            TurnOutcome::Failed { kind, .. } => assert_eq!(kind, TurnErrorKind::ContractViolation),
            other => panic!("expected a failed turn, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn runaway_tool_loop_hits_the_round_cap() {
        let limits = TurnLimits { max_rounds: 2, ..TurnLimits::default() };
        let runtime = runtime_with(Arc::new(LoopingOracle), limits);

        // Move the session to the faq agent first so faq_lookup is granted.
        let session = runtime.sessions().get_or_create("s1").await;
        session.lock().await.active_agent = "faq".to_string();

        let outcome = runtime.handle_message("s1", "is there wifi on the plane?").await;
        match outcome {
            TurnOutcome::Failed { kind, .. } => assert_eq!(kind, TurnErrorKind::RunawayToolLoop),
            other => panic!("expected a runaway-loop failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stalled_oracle_times_out() {
        let limits = TurnLimits {
            oracle_timeout: Duration::from_millis(50),
            ..TurnLimits::default()
        };
        let runtime = runtime_with(Arc::new(StalledOracle), limits);

        let outcome = runtime.handle_message("s1", "where is my flight?").await;
        match outcome {
            TurnOutcome::Failed { kind, .. } => assert_eq!(kind, TurnErrorKind::Timeout),
            other => panic!("expected a timeout failure, got {other:?}"),
        }
    }
}
