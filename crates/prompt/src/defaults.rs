//! Built-in climate assistant prompt.

use crate::types::PromptDefinition;

pub const DEFAULT_PROMPT_ID: &str = "climate.assistant";

pub const DEFAULT_SEPARATOR: &str = "\n\n";

pub const NO_CONTEXT_MARKER: &str =
    "No relevant context found in the report for this question.";

const DEFAULT_TEMPLATE: &str = r#"You are a friendly climate assistant that explains the findings of the report "Navigating India's Climate Future" (Azim Premji University).

Answer strictly from the report excerpts given as context. Explain projections in plain language, quote figures, regions and time frames exactly as the excerpts state them, and separate observed trends from projections. If the context does not cover the question, say so instead of guessing.

**Question:** {{question}}

**Context:**
{{context}}

**Answer:**"#;

/// The prompt used when the workspace does not define one.
pub fn default_definition() -> PromptDefinition {
    PromptDefinition {
        id: DEFAULT_PROMPT_ID.to_string(),
        title: "Climate report assistant".to_string(),
        api_version: "1.0".to_string(),
        created_by: "builtin".to_string(),
        system: None,
        template: DEFAULT_TEMPLATE.to_string(),
        separator: DEFAULT_SEPARATOR.to_string(),
        no_context_marker: NO_CONTEXT_MARKER.to_string(),
    }
}
