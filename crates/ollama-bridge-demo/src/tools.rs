//! Tool trait for locally executed agent tools

use serde_json::{json, Map, Value};

/// A tool the model may call. Execution is local and synchronous; failures are
/// reported back to the model as text rather than aborting the agent.
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the tool arguments
    fn parameters(&self) -> Value;

    fn call(&self, arguments: &Value) -> Result<String, String>;

    /// Tool definition in Ollama's `tools` format.
    fn spec(&self) -> Map<String, Value> {
        let mut spec = Map::new();
        spec.insert("type".to_string(), json!("function"));
        spec.insert(
            "function".to_string(),
            json!({
                "name": self.name(),
                "description": self.description(),
                "parameters": self.parameters(),
            }),
        );
        spec
    }
}
