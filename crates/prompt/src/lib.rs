//! Prompt assembly for grounded question answering.
//!
//! - YAML prompt definitions under `.insight/prompts/`
//! - A built-in climate assistant prompt
//! - `PromptTemplate`, validated once when it is created
//! - `assemble`, which fills a template with a question and retrieved passages

pub mod builder;
pub mod defaults;
pub mod loader;
pub mod template;
pub mod types;

pub use builder::assemble;
pub use defaults::{default_definition, DEFAULT_PROMPT_ID, NO_CONTEXT_MARKER};
pub use loader::{list_prompts, load_prompt, resolve_template};
pub use template::PromptTemplate;
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
