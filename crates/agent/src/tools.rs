//! Tool contract and name-keyed registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use skydesk_core::{TripContext, TurnError};

use crate::graph::GraphError;

/// A named capability an agent may invoke.
///
/// Tools are stateless across invocations except through the trip context;
/// only tools that declare `mutates_context` are allowed to write to it.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the named, typed parameters.
    fn parameters(&self) -> Value;
    fn mutates_context(&self) -> bool {
        false
    }
    async fn invoke(&self, context: &mut TripContext, arguments: Value)
        -> Result<String, TurnError>;
}

/// What the oracle sees of a tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T>(&mut self, tool: T) -> Result<(), GraphError>
    where
        T: Tool + 'static,
    {
        let name = tool.name();
        if self.tools.contains_key(name) {
            return Err(GraphError::DuplicateTool { tool: name.to_string() });
        }
        self.tools.insert(name, Arc::new(tool));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Descriptors for a subset of tool names, in the given order. Names are
    /// assumed valid; graph construction rejects dangling references.
    pub fn descriptors(&self, names: &[String]) -> Vec<ToolDescriptor> {
        names
            .iter()
            .filter_map(|name| self.tools.get(name.as_str()))
            .map(|tool| ToolDescriptor {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Pull a required string argument out of oracle-supplied arguments.
pub(crate) fn required_str(
    arguments: &Value,
    key: &'static str,
    tool: &'static str,
) -> Result<String, TurnError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
        .ok_or(TurnError::InvalidArguments { tool: tool.to_string(), argument: key })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use skydesk_core::{TripContext, TurnError};

    use super::{required_str, Tool, ToolRegistry};
    use crate::graph::GraphError;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Echoes its input."
        }

        fn parameters(&self) -> Value {
            json!({ "type": "object", "properties": { "text": { "type": "string" } } })
        }

        async fn invoke(
            &self,
            _context: &mut TripContext,
            arguments: Value,
        ) -> Result<String, TurnError> {
            required_str(&arguments, "text", "echo")
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).expect("first registration");
        let error = registry.register(EchoTool).unwrap_err();
        assert!(matches!(error, GraphError::DuplicateTool { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn descriptors_preserve_grant_order() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();
        let descriptors = registry.descriptors(&["echo".to_string()]);
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, "echo");
    }

    #[tokio::test]
    async fn missing_argument_is_an_invalid_arguments_error() {
        let mut context = TripContext::new();
        let error = EchoTool.invoke(&mut context, json!({})).await.unwrap_err();
        assert!(matches!(error, TurnError::InvalidArguments { argument: "text", .. }));
    }
}
