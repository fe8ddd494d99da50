//! Agent core - multi-agent routing, guardrails, and handoffs
//!
//! This crate is the conversational core of skydesk:
//! - A fixed graph of agent personas with validated tool grants and
//!   handoff edges (`graph`, `airline`)
//! - An input guardrail pipeline that gates every inbound message
//!   (`guardrails`)
//! - A bounded turn loop driving an external decision oracle
//!   (`runtime`, `oracle`)
//! - Per-session single-writer conversation state (`session`)
//!
//! # Architecture
//!
//! The runtime follows a constrained loop per user message:
//! 1. **Guardrails** - every guardrail of the active agent classifies the
//!    raw input; any trip refuses the turn before anything else runs
//! 2. **Decide** - the oracle sees instructions, capabilities, and history,
//!    and picks exactly one of reply / tool call / handoff
//! 3. **Act** - tool calls mutate the trip context in place; handoffs move
//!    the active-agent pointer and continue the same message
//! 4. Loop back to 2 until a reply, an error, or the round cap
//!
//! # Safety Principle
//!
//! The oracle only ever picks from capabilities the active agent declares.
//! Capability names are validated when the graph is built, so an unknown
//! tool or handoff at runtime is always an oracle contract violation, never
//! a configuration typo.

pub mod airline;
pub mod graph;
pub mod guardrails;
pub mod oracle;
pub mod runtime;
pub mod session;
pub mod tools;

pub use airline::AirlineDesk;
pub use graph::{AgentDefinition, AgentGraph, GraphError, HandoffEdge};
pub use guardrails::{Guardrail, GuardrailVerdict, PipelineResult};
pub use oracle::{DecisionOracle, OracleDecision, OracleRequest, RuleOracle};
pub use runtime::{SupportRuntime, TurnLimits, TurnOutcome};
pub use session::{HistoryItem, Session, SessionStore};
pub use tools::{Tool, ToolDescriptor, ToolRegistry};
