//! Builders to construct a worker and its reporter chain from configuration.

use std::sync::Arc;

use crate::config::{BaseReporterConfig, NodeMetadataConfig, ReporterConfig, WorkerConfig};
use crate::core::{
    DiscardReporter, LogReporter, NodeMetadata, NodeMetadataReporter, Reporter, TaskBody, Worker,
    WorkerError,
};

fn node_metadata(cfg: &NodeMetadataConfig) -> NodeMetadata {
    let env = NodeMetadata::from_env();
    NodeMetadata {
        node_name: cfg.node_name.clone().unwrap_or(env.node_name),
        pod_name: cfg.pod_name.clone().unwrap_or(env.pod_name),
    }
}

/// Wrap `base` with the decorators selected in `cfg`.
///
/// Use this when the base reporter comes from outside the crate (for example
/// a transport-specific orchestrator client).
#[must_use]
pub fn decorate_reporter(cfg: &ReporterConfig, base: Arc<dyn Reporter>) -> Arc<dyn Reporter> {
    match &cfg.node_metadata {
        Some(meta_cfg) => {
            let metadata = node_metadata(meta_cfg);
            tracing::debug!(
                node = %metadata.node_name,
                pod = %metadata.pod_name,
                "node metadata reporter enabled"
            );
            Arc::new(NodeMetadataReporter::new(base, metadata))
        }
        None => base,
    }
}

/// Build the reporter chain described by `cfg`.
#[must_use]
pub fn build_reporter(cfg: &ReporterConfig) -> Arc<dyn Reporter> {
    let base: Arc<dyn Reporter> = match cfg.base {
        BaseReporterConfig::Log => Arc::new(LogReporter),
        BaseReporterConfig::Discard => Arc::new(DiscardReporter),
    };
    decorate_reporter(cfg, base)
}

/// Build a worker with the reporter chain from its configuration.
///
/// # Errors
///
/// Returns `WorkerError::InvalidConfig` if the configuration is invalid.
pub fn build_worker<P, B>(config: WorkerConfig, body: B) -> Result<Worker<P, B>, WorkerError>
where
    P: Send + 'static,
    B: TaskBody<P>,
{
    let reporter = build_reporter(&config.reporter);
    Worker::new(config, body, reporter)
}
