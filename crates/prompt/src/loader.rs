//! Loading prompt definitions from `.insight/prompts/`.

use std::path::{Path, PathBuf};

use insight_core::{AppError, AppResult};

use crate::defaults::{default_definition, DEFAULT_PROMPT_ID};
use crate::template::PromptTemplate;
use crate::types::PromptDefinition;

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(".insight").join("prompts")
}

/// Load a prompt definition by id from `.insight/prompts/<id>.yml`.
///
/// # Example
/// ```no_run
/// use insight_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "climate.brief")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Err(AppError::Template(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Template(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Template(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_definition(&definition)?;

    if definition.id != prompt_id {
        tracing::warn!(
            file_id = prompt_id,
            declared_id = %definition.id,
            "Prompt id does not match its file name"
        );
    }

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// List prompt ids available in the workspace, sorted.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let dir = prompts_dir(workspace_path);

    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut prompt_ids: Vec<String> = walkdir::WalkDir::new(&dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("yml"))
        .filter_map(|e| {
            e.path()
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
        })
        .collect();

    prompt_ids.sort();
    Ok(prompt_ids)
}

/// Resolve the template a pipeline should use.
///
/// An explicit id must exist. Without one, a workspace override of the
/// built-in id is used if present, otherwise the built-in definition.
pub fn resolve_template(workspace_path: &Path, prompt_id: Option<&str>) -> AppResult<PromptTemplate> {
    let definition = match prompt_id {
        Some(id) => load_prompt(workspace_path, id)?,
        None => {
            let override_file = prompts_dir(workspace_path).join(format!("{}.yml", DEFAULT_PROMPT_ID));
            if override_file.exists() {
                load_prompt(workspace_path, DEFAULT_PROMPT_ID)?
            } else {
                default_definition()
            }
        }
    };

    PromptTemplate::from_definition(&definition)
}

fn validate_definition(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Template("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Template("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Template(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Template(format!(
            "Invalid apiVersion format: '{}'. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}
