use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared tool: name, description, JSON-Schema input, optional
/// output schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    #[serde(rename = "outputSchema", skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

/// Declared resource: URI pattern plus mime type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDefinition {
    #[serde(rename = "uriPattern")]
    pub uri_pattern: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A named argument accepted by a prompt template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Declared prompt: name, accepted arguments, and a closed-grammar template
/// substituted by `crate::template`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<PromptArgument>,
    pub template: String,
}

/// The full capability manifest an adapter declares at registration.
/// Invariant: tool/resource/prompt names are each unique
/// within one adapter — enforced by `validate` rather than at construction,
/// since manifests typically arrive pre-built from the adapter.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CapabilityManifest {
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub resources: Vec<ResourceDefinition>,
    #[serde(default)]
    pub prompts: Vec<PromptDefinition>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("duplicate tool name '{0}' within manifest")]
    DuplicateTool(String),
    #[error("duplicate resource uri pattern '{0}' within manifest")]
    DuplicateResource(String),
    #[error("duplicate prompt name '{0}' within manifest")]
    DuplicatePrompt(String),
}

impl CapabilityManifest {
    pub fn validate(&self) -> Result<(), ManifestError> {
        let mut seen = std::collections::HashSet::new();
        for tool in &self.tools {
            if !seen.insert(&tool.name) {
                return Err(ManifestError::DuplicateTool(tool.name.clone()));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for resource in &self.resources {
            if !seen.insert(&resource.uri_pattern) {
                return Err(ManifestError::DuplicateResource(resource.uri_pattern.clone()));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for prompt in &self.prompts {
            if !seen.insert(&prompt.name) {
                return Err(ManifestError::DuplicatePrompt(prompt.name.clone()));
            }
        }
        Ok(())
    }

    pub fn find_tool(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn find_prompt(&self, name: &str) -> Option<&PromptDefinition> {
        self.prompts.iter().find(|p| p.name == name)
    }
}
