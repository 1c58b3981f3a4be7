//! Prompt definition and output types.

use serde::{Deserialize, Serialize};

use crate::defaults::{DEFAULT_SEPARATOR, NO_CONTEXT_MARKER};

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// Schema version, `x.y`
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// Optional system message sent alongside the rendered template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Handlebars template; must reference `{{question}}` and `{{context}}`
    pub template: String,

    /// Placed between retrieved passages
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Substituted for the context when nothing was retrieved
    #[serde(rename = "noContextMarker", default = "default_no_context_marker")]
    pub no_context_marker: String,
}

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

fn default_no_context_marker() -> String {
    NO_CONTEXT_MARKER.to_string()
}

/// A rendered prompt ready for the language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    pub system: Option<String>,

    /// The rendered template
    pub user: String,

    pub metadata: BuiltPromptMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Number of passages placed in the context
    #[serde(rename = "contextPassages")]
    pub context_passages: usize,

    /// True when the no-context marker was used
    #[serde(rename = "contextMissing")]
    pub context_missing: bool,
}
