use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use thiserror::Error;

use crate::tools::{ParameterSchema, ToolArgs, ToolError, ToolOutput, ToolSchema};

/// A named capability the model can call.
///
/// `D` is the dependency bundle of a run. It is borrowed for the duration of
/// a single invocation and never owned by the tool.
#[async_trait]
pub trait Tool<D>: Send + Sync
where
    D: Send + Sync,
{
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> ParameterSchema;
    async fn invoke(&self, deps: &D, args: ToolArgs) -> Result<ToolOutput, ToolError>;

    fn to_schema(&self) -> ToolSchema {
        ToolSchema::function(
            self.name(),
            self.description(),
            self.parameters().to_json_schema(),
        )
    }
}

pub type SharedTool<D> = Arc<dyn Tool<D>>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool with name '{0}' already registered")]
    DuplicateTool(String),

    #[error("invalid tool: {0}")]
    InvalidTool(String),
}

pub struct ToolRegistry<D>
where
    D: Send + Sync,
{
    tools: DashMap<String, SharedTool<D>>,
}

impl<D> Default for ToolRegistry<D>
where
    D: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<D> ToolRegistry<D>
where
    D: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            tools: DashMap::new(),
        }
    }

    pub fn register<T>(&self, tool: T) -> Result<(), RegistryError>
    where
        T: Tool<D> + 'static,
    {
        self.register_shared(Arc::new(tool))
    }

    pub fn register_shared(&self, tool: SharedTool<D>) -> Result<(), RegistryError> {
        let name = tool.name().trim();

        if name.is_empty() {
            return Err(RegistryError::InvalidTool(
                "tool name cannot be empty".to_string(),
            ));
        }

        match self.tools.entry(name.to_string()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateTool(name.to_string())),
            Entry::Vacant(entry) => {
                entry.insert(tool);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<SharedTool<D>> {
        self.tools
            .get(normalize_tool_name(name))
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(normalize_tool_name(name))
    }

    pub fn list_tools(&self) -> Vec<ToolSchema> {
        let mut tools: Vec<ToolSchema> = self
            .tools
            .iter()
            .map(|entry| entry.value().to_schema())
            .collect();
        tools.sort_by(|left, right| left.function.name.cmp(&right.function.name));
        tools
    }

    pub fn list_tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Strips provider namespaces such as `functions::get_lat_lon`.
pub fn normalize_tool_name(name: &str) -> &str {
    name.split("::").last().unwrap_or(name)
}
