//! Immutable run configuration.
//!
//! [`PipelineConfig`] is deserialised once at process start (see the `cli`
//! crate), validated, and handed to every component constructor. Nothing in
//! the pipeline reads configuration from the environment during a run.
//!
//! Every field has a default so a minimal file such as `{}` is valid.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ModelName};

/// Completion-service parameters for one agent role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleParams {
    pub model: ModelName,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl RoleParams {
    fn with(model: &'static str, temperature: f32, max_tokens: u32) -> Self {
        Self {
            model: ModelName::from_static(model),
            temperature,
            max_tokens,
        }
    }

    fn validate(&self, role: &str) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::invalid(
                format!("agents.{role}.temperature"),
                format!("{} is outside 0.0..=1.0", self.temperature),
            ));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::invalid(
                format!("agents.{role}.max_tokens"),
                "must be greater than zero",
            ));
        }
        if self.model.as_str().trim().is_empty() {
            return Err(ConfigError::invalid(
                format!("agents.{role}.model"),
                "must not be blank",
            ));
        }
        Ok(())
    }
}

/// Per-role completion parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentsConfig {
    pub implementer: RoleParams,
    pub reviewer: RoleParams,
    pub planner: RoleParams,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            implementer: RoleParams::with("claude-sonnet-4-20250514", 0.3, 16_000),
            reviewer: RoleParams::with("claude-sonnet-4-20250514", 0.2, 4_096),
            planner: RoleParams::with("claude-sonnet-4-20250514", 0.7, 4_096),
        }
    }
}

/// Orchestrator policy knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkflowConfig {
    /// Maximum number of Implement → Review cycles per session.
    pub cycles: u32,
    /// Whether an item needs reviewer approval to become Completed.
    pub require_review_approval: bool,
    /// Whether the Implementer commits the artifact after each change.
    pub auto_commit: bool,
    /// Whether one Planner pass runs after the cycles.
    pub run_planner: bool,
    /// Pause between cycles, bounding request rate against external services.
    pub cycle_delay_ms: u64,
    /// Default number of items `devloop implement` processes.
    pub implementer_batch: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            cycles: 3,
            require_review_approval: true,
            auto_commit: true,
            run_planner: true,
            cycle_delay_ms: 2_000,
            implementer_batch: 1,
        }
    }
}

/// Planner input bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlannerConfig {
    /// Maximum number of artifact characters sent with the insights request.
    pub excerpt_chars: usize,
    /// How many recently completed items are loaded for statistics.
    pub completed_window: usize,
    /// How many of those are listed in the prompt.
    pub recent_completed: usize,
    /// How many recent review reports are listed in the prompt.
    pub recent_reports: usize,
    /// `responsible` value for items the Planner creates.
    pub default_responsible: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            excerpt_chars: 5_000,
            completed_window: 20,
            recent_completed: 5,
            recent_reports: 3,
            default_responsible: "Implementer Agent".to_string(),
        }
    }
}

/// One structural presence check run by the Reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticCheckSpec {
    pub name: String,
    /// Substring that must appear in the artifact.
    pub marker: String,
}

impl StaticCheckSpec {
    fn new(name: &str, marker: &str) -> Self {
        Self {
            name: name.to_string(),
            marker: marker.to_string(),
        }
    }
}

/// Reviewer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReviewConfig {
    pub static_checks: Vec<StaticCheckSpec>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            static_checks: vec![
                StaticCheckSpec::new("has_doctype", "<!DOCTYPE html>"),
                StaticCheckSpec::new("has_supabase_import", "@supabase/supabase-js"),
                StaticCheckSpec::new("has_supabase_init", "createClient"),
                StaticCheckSpec::new("has_auth_flow", "handleLogin"),
                StaticCheckSpec::new("has_realtime_sync", ".channel("),
                StaticCheckSpec::new("closes_html", "</html>"),
                StaticCheckSpec::new("has_css", "<style>"),
                StaticCheckSpec::new("has_javascript", "<script>"),
            ],
        }
    }
}

/// How the backlog table spells its labels and columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreVocabulary {
    /// `Pending`/`InProgress`/`Completed`, `High`/`Medium`/`Low`, a
    /// `responsible` column and a `progress` column.
    #[default]
    Standard,
    /// `Pendiente`/`En curso`/`Completado`, `Alta`/`Media`/`Baja`, a
    /// `responsable` column and no `progress` column.
    Legacy,
}

/// Backlog store settings (connection secrets come from the environment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub table: String,
    /// Vocabulary used for writes. Reads accept either.
    pub vocabulary: StoreVocabulary,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table: "roadmap_actions".to_string(),
            vocabulary: StoreVocabulary::Standard,
        }
    }
}

/// The complete configuration for one process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Path of the shared artifact, relative to the project root.
    pub artifact: String,
    /// Directory for report files, relative to the project root.
    pub reports_dir: String,
    pub agents: AgentsConfig,
    pub workflow: WorkflowConfig,
    pub planner: PlannerConfig,
    pub review: ReviewConfig,
    pub store: StoreConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            artifact: "index.html".to_string(),
            reports_dir: ".devloop/reports".to_string(),
            agents: AgentsConfig::default(),
            workflow: WorkflowConfig::default(),
            planner: PlannerConfig::default(),
            review: ReviewConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parses a JSON document and validates it.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.artifact.trim().is_empty() {
            return Err(ConfigError::invalid("artifact", "must not be blank"));
        }
        if self.reports_dir.trim().is_empty() {
            return Err(ConfigError::invalid("reports_dir", "must not be blank"));
        }
        if self.store.table.trim().is_empty() {
            return Err(ConfigError::invalid("store.table", "must not be blank"));
        }
        self.agents.implementer.validate("implementer")?;
        self.agents.reviewer.validate("reviewer")?;
        self.agents.planner.validate("planner")?;
        if self.workflow.implementer_batch == 0 {
            return Err(ConfigError::invalid(
                "workflow.implementer_batch",
                "must be greater than zero",
            ));
        }
        for (n, check) in self.review.static_checks.iter().enumerate() {
            if check.marker.is_empty() || check.name.trim().is_empty() {
                return Err(ConfigError::invalid(
                    format!("review.static_checks[{n}]"),
                    "name and marker must not be empty",
                ));
            }
        }
        Ok(())
    }
}
