//! Prompt assembly: question + retrieved passages -> rendered prompt.

use insight_core::AppResult;

use crate::template::PromptTemplate;
use crate::types::{BuiltPrompt, BuiltPromptMetadata};

/// Fill `template` with the question and the passages, in the given order.
///
/// Passages are joined with the template's separator. With no passages the
/// template's no-context marker is used as the context, so the model is told
/// explicitly that nothing relevant was retrieved.
///
/// # Example
/// ```
/// use insight_prompt::{assemble, PromptTemplate};
///
/// let template = PromptTemplate::new("doc", "Q: {{question}}\n{{context}}").unwrap();
/// let built = assemble("Will it rain more?", &["Rainfall increases 10%"], &template).unwrap();
/// assert!(built.user.contains("Rainfall increases 10%"));
/// ```
pub fn assemble<S: AsRef<str>>(
    question: &str,
    passages: &[S],
    template: &PromptTemplate,
) -> AppResult<BuiltPrompt> {
    let context_missing = passages.is_empty();
    let context = if context_missing {
        template.no_context_marker().to_string()
    } else {
        passages
            .iter()
            .map(|p| p.as_ref())
            .collect::<Vec<_>>()
            .join(template.separator())
    };

    let user = template.render(question, &context)?;

    tracing::debug!(
        prompt_id = template.id(),
        passages = passages.len(),
        prompt_chars = user.len(),
        "Assembled prompt"
    );

    Ok(BuiltPrompt {
        system: template.system().map(str::to_string),
        user,
        metadata: BuiltPromptMetadata {
            source_prompt_id: template.id().to_string(),
            context_passages: passages.len(),
            context_missing,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::NO_CONTEXT_MARKER;
    use crate::types::PromptDefinition;

    fn template() -> PromptTemplate {
        PromptTemplate::new("test", "Question: {{question}}\nContext:\n{{context}}").unwrap()
    }

    #[test]
    fn test_passages_joined_in_order() {
        let built = assemble(
            "How much will the sea rise?",
            &["Sea level rises 30cm", "Rainfall increases 10%"],
            &template(),
        )
        .unwrap();

        assert_eq!(
            built.user,
            "Question: How much will the sea rise?\nContext:\nSea level rises 30cm\n\nRainfall increases 10%"
        );
        assert_eq!(built.metadata.context_passages, 2);
        assert!(!built.metadata.context_missing);
    }

    #[test]
    fn test_empty_retrieval_uses_marker() {
        let passages: [&str; 0] = [];
        let built = assemble("What about droughts?", &passages, &template()).unwrap();

        assert!(built.user.contains(NO_CONTEXT_MARKER));
        assert!(!built.user.ends_with("Context:\n"));
        assert!(built.metadata.context_missing);
        assert_eq!(built.metadata.context_passages, 0);
    }

    #[test]
    fn test_custom_separator_and_system() {
        let def = PromptDefinition {
            id: "custom".to_string(),
            title: "Custom".to_string(),
            api_version: "1.0".to_string(),
            created_by: String::new(),
            system: Some("Cite page numbers.".to_string()),
            template: "{{context}}\n=> {{question}}".to_string(),
            separator: "\n---\n".to_string(),
            no_context_marker: "[none]".to_string(),
        };
        let template = PromptTemplate::from_definition(&def).unwrap();

        let built = assemble("q", &["a".to_string(), "b".to_string()], &template).unwrap();
        assert_eq!(built.user, "a\n---\nb\n=> q");
        assert_eq!(built.system.as_deref(), Some("Cite page numbers."));
        assert_eq!(built.metadata.source_prompt_id, "custom");

        let empty: Vec<String> = Vec::new();
        let built = assemble("q", &empty, &template).unwrap();
        assert_eq!(built.user, "[none]\n=> q");
    }

    #[test]
    fn test_question_is_not_interpreted() {
        let built = assemble("{{context}}?", &["x"], &template()).unwrap();
        assert!(built.user.starts_with("Question: {{context}}?"));
    }
}
