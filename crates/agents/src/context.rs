use std::sync::Arc;

use pipeline::{ArtifactStore, BacklogStore, PipelineConfig, ReportStore, VersionControl};

use crate::LlmGateway;

/// Everything an agent is constructed from.
///
/// Built once by the composition root. The configuration is immutable for
/// the lifetime of every agent holding it.
#[derive(Clone)]
pub struct AgentContext {
    pub store: Arc<dyn BacklogStore>,
    pub artifact: Arc<dyn ArtifactStore>,
    pub vcs: Arc<dyn VersionControl>,
    pub reports: Arc<dyn ReportStore>,
    pub gateway: Arc<LlmGateway>,
    pub config: Arc<PipelineConfig>,
}
