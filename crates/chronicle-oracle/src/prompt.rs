//! Prompt template loading and rendering via `minijinja`.
//!
//! Templates are loaded from the filesystem (default: `templates/`
//! directory) so the narrative voice can be tuned without recompiling.
//! The engine hands over a [`NarrationContext`]; rendering produces the
//! system/user message pair the oracle backends send.

use minijinja::Environment;
use serde::Serialize;

use crate::error::OracleError;

/// Structured context for one narration invocation.
///
/// This is the full input to the prompt templates; everything the
/// pipeline gathered (semantic context, clustered history, time and
/// mood) arrives pre-formatted as plain strings.
#[derive(Debug, Clone, Serialize)]
pub struct NarrationContext {
    /// The scope being narrated.
    pub scope_id: String,
    /// The scope kind label (`"player"`, `"location"`, ...).
    pub scope_kind: String,
    /// World-level textual context from the semantic provider.
    pub world_context: String,
    /// Per-focus-entity textual context, in focus order.
    pub entity_contexts: Vec<EntityContext>,
    /// Clustered event history, oldest cluster first.
    pub clusters: Vec<ClusterLine>,
    /// The time-of-day/season/elapsed/mood description line.
    pub time_line: String,
}

/// One focus entity's rendered context.
#[derive(Debug, Clone, Serialize)]
pub struct EntityContext {
    /// The entity id.
    pub entity_id: String,
    /// Provider text for the entity.
    pub text: String,
}

/// One history cluster as rendered into the prompt.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterLine {
    /// Relative-time label.
    pub label: String,
    /// Semicolon-joined member event ids.
    pub description: String,
}

/// The complete rendered prompt ready to send to an oracle backend.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    /// System message establishing the narrator's voice and contract.
    pub system: String,
    /// User message containing scene, history, and directive.
    pub user: String,
}

/// Manages prompt template loading and rendering.
///
/// Wraps a `minijinja` [`Environment`] with the narration templates
/// pre-loaded. Templates can be edited on disk and are picked up on the
/// next call to [`PromptEngine::new`].
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    /// Create a new prompt engine loading templates from the given
    /// directory.
    ///
    /// The directory must contain: `system.j2`, `scene.j2`,
    /// `history.j2`, `directive.j2`.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Template`] if a template is missing or
    /// fails to compile.
    pub fn new(templates_dir: &str) -> Result<Self, OracleError> {
        let mut env = Environment::new();

        for name in ["system", "scene", "history", "directive"] {
            let body = load_template(templates_dir, &format!("{name}.j2"))?;
            env.add_template_owned(name.to_owned(), body).map_err(|e| {
                OracleError::Template(format!("failed to add {name} template: {e}"))
            })?;
        }

        Ok(Self { env })
    }

    /// Render the full prompt for a narration invocation.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Template`] if any template fails to
    /// render.
    pub fn render(&self, context: &NarrationContext) -> Result<RenderedPrompt, OracleError> {
        let system = self.render_one("system", context)?;
        let scene = self.render_one("scene", context)?;
        let history = self.render_one("history", context)?;
        let directive = self.render_one("directive", context)?;

        let user = format!("{scene}\n\n{history}\n\n{directive}");

        Ok(RenderedPrompt { system, user })
    }

    /// Render a single named template against the context.
    fn render_one(&self, name: &str, context: &NarrationContext) -> Result<String, OracleError> {
        self.env
            .get_template(name)
            .map_err(|e| OracleError::Template(format!("missing {name} template: {e}")))?
            .render(context)
            .map_err(|e| OracleError::Template(format!("{name} render failed: {e}")))
    }
}

impl std::fmt::Debug for PromptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptEngine").finish()
    }
}

/// Read a template file from disk.
fn load_template(dir: &str, filename: &str) -> Result<String, OracleError> {
    let path = format!("{dir}/{filename}");
    std::fs::read_to_string(&path)
        .map_err(|e| OracleError::Template(format!("failed to read {path}: {e}")))
}
