//! Validated prompt templates.
//!
//! A `PromptTemplate` can only be obtained through validation, so any
//! template problem surfaces when the pipeline is configured and rendering
//! at query time cannot hit a malformed template.

use std::fmt;
use std::sync::Arc;

use handlebars::template::{HelperTemplate, Parameter, Template, TemplateElement};
use handlebars::Handlebars;
use insight_core::{AppError, AppResult};
use serde_json::json;

use crate::defaults::{DEFAULT_SEPARATOR, NO_CONTEXT_MARKER};
use crate::types::PromptDefinition;

const TEMPLATE_NAME: &str = "prompt";

/// Placeholders every template must reference.
pub const REQUIRED_PLACEHOLDERS: [&str; 2] = ["question", "context"];

/// A compiled template together with its context formatting rules.
#[derive(Clone)]
pub struct PromptTemplate {
    id: String,
    source: String,
    system: Option<String>,
    separator: String,
    no_context_marker: String,
    registry: Arc<Handlebars<'static>>,
}

impl PromptTemplate {
    /// Compile and validate a bare template string with default formatting.
    pub fn new(id: impl Into<String>, template: &str) -> AppResult<Self> {
        Self::compile(
            id.into(),
            template,
            None,
            DEFAULT_SEPARATOR.to_string(),
            NO_CONTEXT_MARKER.to_string(),
        )
    }

    pub fn from_definition(definition: &PromptDefinition) -> AppResult<Self> {
        if definition.no_context_marker.trim().is_empty() {
            return Err(AppError::Template(format!(
                "Prompt '{}' has an empty noContextMarker",
                definition.id
            )));
        }

        Self::compile(
            definition.id.clone(),
            &definition.template,
            definition.system.clone(),
            definition.separator.clone(),
            definition.no_context_marker.clone(),
        )
    }

    fn compile(
        id: String,
        source: &str,
        system: Option<String>,
        separator: String,
        no_context_marker: String,
    ) -> AppResult<Self> {
        let parsed = Template::compile(source)
            .map_err(|e| AppError::Template(format!("Template '{}' does not compile: {}", id, e)))?;
        let found = template_names(&parsed);
        let missing: Vec<&str> = REQUIRED_PLACEHOLDERS
            .iter()
            .copied()
            .filter(|name| !found.iter().any(|f| f == name))
            .collect();
        if !missing.is_empty() {
            return Err(AppError::Template(format!(
                "Template '{}' is missing placeholder(s): {}",
                id,
                missing
                    .iter()
                    .map(|m| format!("{{{{{}}}}}", m))
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        // Unknown variables fail the trial render below instead of rendering empty.
        registry.set_strict_mode(true);
        registry
            .register_template_string(TEMPLATE_NAME, source)
            .map_err(|e| AppError::Template(format!("Template '{}' does not compile: {}", id, e)))?;

        let template = Self {
            id,
            source: source.to_string(),
            system,
            separator,
            no_context_marker,
            registry: Arc::new(registry),
        };
        template.render("", "")?;

        tracing::debug!(prompt_id = %template.id, "Prompt template validated");
        Ok(template)
    }

    /// Render with already formatted values.
    pub(crate) fn render(&self, question: &str, context: &str) -> AppResult<String> {
        self.registry
            .render(
                TEMPLATE_NAME,
                &json!({ "question": question, "context": context }),
            )
            .map_err(|e| AppError::Template(format!("Failed to render '{}': {}", self.id, e)))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn no_context_marker(&self) -> &str {
        &self.no_context_marker
    }
}

impl fmt::Debug for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptTemplate")
            .field("id", &self.id)
            .field("separator", &self.separator)
            .field("no_context_marker", &self.no_context_marker)
            .finish_non_exhaustive()
    }
}

/// Variable names a template reads, in first-use order.
///
/// Walks the compiled template, so names used only as block helper arguments
/// (`{{#if question}}`) count and comments never do. Helper names do not.
pub fn placeholders(source: &str) -> AppResult<Vec<String>> {
    let template = Template::compile(source)
        .map_err(|e| AppError::Template(format!("Template does not compile: {}", e)))?;

    Ok(template_names(&template))
}

fn template_names(template: &Template) -> Vec<String> {
    let mut names = Vec::new();
    collect_names(template, &mut names);
    names
}

fn collect_names(template: &Template, names: &mut Vec<String>) {
    for element in &template.elements {
        match element {
            TemplateElement::Expression(helper) | TemplateElement::HtmlExpression(helper) => {
                if helper.params.is_empty() && helper.hash.is_empty() {
                    push_name(&helper.name, names);
                }
                collect_arguments(helper, names);
            }
            TemplateElement::HelperBlock(helper) => {
                collect_arguments(helper, names);
                for nested in [&helper.template, &helper.inverse].into_iter().flatten() {
                    collect_names(nested, names);
                }
            }
            _ => {}
        }
    }
}

fn collect_arguments(helper: &HelperTemplate, names: &mut Vec<String>) {
    for param in helper.params.iter().chain(helper.hash.values()) {
        push_name(param, names);
    }
}

fn push_name(param: &Parameter, names: &mut Vec<String>) {
    if let Some(name) = param.as_name() {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
}
