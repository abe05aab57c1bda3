use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tracing::{debug, warn};

use crate::tool::{DynTool, ToolDescriptor, ToolError};

/// The tools available to one orchestration cycle.
///
/// Lookup is by name; enumeration follows registration order so the catalog
/// advertised to the model is stable between loads of the same directory.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<DynTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Creates a new empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, returning the tool it replaced if the name was taken.
    ///
    /// A replacement keeps the catalog position of the tool it replaces.
    pub fn register(&mut self, tool: DynTool) -> Option<DynTool> {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&slot) => {
                warn!(tool = %name, "Duplicate tool name, later definition wins");
                Some(std::mem::replace(&mut self.tools[slot], tool))
            }
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
                None
            }
        }
    }

    /// Gets a tool by name.
    pub fn lookup(&self, name: &str) -> Option<&DynTool> {
        self.index.get(name).map(|&slot| &self.tools[slot])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// The descriptors to advertise to the model, in load order.
    pub fn catalog(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|tool| tool.descriptor().clone())
            .collect()
    }

    /// Tool names in load order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    /// Returns the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Binds `raw_args` to the tool's parameters and runs it.
    pub async fn execute(&self, name: &str, raw_args: Value) -> Result<Value, ToolError> {
        let tool = self
            .lookup(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let args = tool
            .descriptor()
            .parameters
            .bind(raw_args)
            .map_err(|reason| ToolError::ArgumentMismatch {
                tool: name.to_string(),
                reason,
            })?;

        debug!(tool = %name, "Executing tool");
        tool.execute(args).await.map_err(|e| match e {
            ToolError::ExecutionFailed { .. } => e,
            other => ToolError::execution(name, other.to_string()),
        })
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl<'a> IntoIterator for &'a ToolRegistry {
    type Item = &'a DynTool;
    type IntoIter = std::slice::Iter<'a, DynTool>;

    fn into_iter(self) -> Self::IntoIter {
        self.tools.iter()
    }
}
