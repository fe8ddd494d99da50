//! Static agent graph: personas, tool grants, and handoff edges.
//!
//! The graph is built once at startup and never changes; only each session's
//! active-agent pointer moves across it. Construction validates every
//! capability reference, so a runtime miss can only mean the oracle stepped
//! outside its declared capability set.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use skydesk_core::TripContext;

use crate::guardrails::Guardrail;
use crate::tools::ToolRegistry;

pub type InstructionTemplate = Arc<dyn Fn(&TripContext) -> String + Send + Sync>;
pub type TransferHook = Arc<dyn Fn(&mut TripContext) + Send + Sync>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate agent name `{agent}`")]
    DuplicateAgent { agent: String },
    #[error("duplicate tool name `{tool}`")]
    DuplicateTool { tool: String },
    #[error("root agent `{root}` is not in the graph")]
    UnknownRoot { root: String },
    #[error("agent `{agent}` grants unknown tool `{tool}`")]
    UnknownToolReference { agent: String, tool: String },
    #[error("agent `{agent}` declares a handoff to unknown agent `{target}`")]
    UnknownHandoffTarget { agent: String, target: String },
    #[error("agent `{agent}` has no handoff path back to the root")]
    RootUnreachable { agent: String },
}

/// A directed transfer edge to another agent, optionally carrying a hook
/// that backfills context defaults when the transfer happens.
#[derive(Clone)]
pub struct HandoffEdge {
    pub target: String,
    pub description: String,
    on_transfer: Option<TransferHook>,
}

impl HandoffEdge {
    pub fn to(target: impl Into<String>, description: impl Into<String>) -> Self {
        Self { target: target.into(), description: description.into(), on_transfer: None }
    }

    pub fn with_hook(mut self, hook: TransferHook) -> Self {
        self.on_transfer = Some(hook);
        self
    }

    /// Run the on-transfer hook, if any, against the session context.
    pub fn apply_transfer(&self, context: &mut TripContext) {
        if let Some(hook) = &self.on_transfer {
            hook(context);
        }
    }
}

/// A named persona: instructions, tool grants, guardrails, handoff edges.
#[derive(Clone)]
pub struct AgentDefinition {
    pub name: String,
    /// Shown to other agents' oracles when this agent is a handoff target.
    pub handoff_description: String,
    instructions: InstructionTemplate,
    pub tools: Vec<String>,
    pub guardrails: Vec<Arc<dyn Guardrail>>,
    pub handoffs: Vec<HandoffEdge>,
}

impl AgentDefinition {
    pub fn new(
        name: impl Into<String>,
        handoff_description: impl Into<String>,
        instructions: InstructionTemplate,
    ) -> Self {
        Self {
            name: name.into(),
            handoff_description: handoff_description.into(),
            instructions,
            tools: Vec::new(),
            guardrails: Vec::new(),
            handoffs: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools = tools.iter().map(|tool| tool.to_string()).collect();
        self
    }

    pub fn with_guardrails(mut self, guardrails: Vec<Arc<dyn Guardrail>>) -> Self {
        self.guardrails = guardrails;
        self
    }

    pub fn with_handoffs(mut self, handoffs: Vec<HandoffEdge>) -> Self {
        self.handoffs = handoffs;
        self
    }

    /// Render the instruction template against the current trip context.
    pub fn instructions(&self, context: &TripContext) -> String {
        (self.instructions)(context)
    }

    pub fn grants_tool(&self, tool: &str) -> bool {
        self.tools.iter().any(|granted| granted == tool)
    }

    pub fn edge_to(&self, target: &str) -> Option<&HandoffEdge> {
        self.handoffs.iter().find(|edge| edge.target == target)
    }
}

/// Immutable, validated routing topology with a distinguished root agent.
pub struct AgentGraph {
    agents: HashMap<String, AgentDefinition>,
    root: String,
}

// Instruction templates and transfer hooks are closures, so only the
// topology is printable.
impl fmt::Debug for AgentGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut agents: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        agents.sort_unstable();
        f.debug_struct("AgentGraph").field("root", &self.root).field("agents", &agents).finish()
    }
}

impl AgentGraph {
    pub fn new(
        root: impl Into<String>,
        definitions: Vec<AgentDefinition>,
        tools: &ToolRegistry,
    ) -> Result<Self, GraphError> {
        let root = root.into();
        let mut agents = HashMap::with_capacity(definitions.len());

        for definition in definitions {
            if agents.contains_key(&definition.name) {
                return Err(GraphError::DuplicateAgent { agent: definition.name });
            }
            agents.insert(definition.name.clone(), definition);
        }

        if !agents.contains_key(&root) {
            return Err(GraphError::UnknownRoot { root });
        }

        for agent in agents.values() {
            for tool in &agent.tools {
                if !tools.contains(tool) {
                    return Err(GraphError::UnknownToolReference {
                        agent: agent.name.clone(),
                        tool: tool.clone(),
                    });
                }
            }
            for edge in &agent.handoffs {
                if !agents.contains_key(&edge.target) {
                    return Err(GraphError::UnknownHandoffTarget {
                        agent: agent.name.clone(),
                        target: edge.target.clone(),
                    });
                }
            }
        }

        let graph = Self { agents, root };
        for name in graph.agents.keys() {
            if name != &graph.root && !graph.reaches_root(name) {
                return Err(GraphError::RootUnreachable { agent: name.clone() });
            }
        }

        Ok(graph)
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn get(&self, name: &str) -> Option<&AgentDefinition> {
        self.agents.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Breadth-first search along handoff edges back to the root.
    fn reaches_root(&self, from: &str) -> bool {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([from.to_string()]);
        while let Some(current) = queue.pop_front() {
            if current == self.root {
                return true;
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(agent) = self.agents.get(&current) {
                for edge in &agent.handoffs {
                    queue.push_back(edge.target.clone());
                }
            }
        }
        false
    }
}
