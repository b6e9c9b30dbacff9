//! Worker configuration structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{ResourceProfile, CPU, MEM_GB};

const DEFAULT_MAX_CONCURRENT_TASKS: usize = 5;
const DEFAULT_TASK_TIMEOUT_SECS: f64 = 300.0;
const DEFAULT_TASK_QUEUE_ENDPOINT: &str = "http://task-queue:8000";

fn default_worker_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("worker_{}", &hex[..8])
}

const fn default_max_concurrent_tasks() -> usize {
    DEFAULT_MAX_CONCURRENT_TASKS
}

const fn default_task_timeout_secs() -> f64 {
    DEFAULT_TASK_TIMEOUT_SECS
}

fn default_resource_limits() -> ResourceProfile {
    ResourceProfile::from([(CPU, 2.0), (MEM_GB, 8.0)])
}

fn default_task_queue_endpoint() -> String {
    DEFAULT_TASK_QUEUE_ENDPOINT.to_string()
}

/// Base reporter selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseReporterConfig {
    /// Write results to the log.
    #[default]
    Log,
    /// Drop results.
    Discard,
}

/// Node/pod naming for the metadata decorator. Unset names are read from
/// `K8S_NODE_NAME` / `K8S_POD_NAME`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadataConfig {
    /// Node name override.
    #[serde(default)]
    pub node_name: Option<String>,
    /// Pod name override.
    #[serde(default)]
    pub pod_name: Option<String>,
}

/// Reporter chain: a base reporter, optionally wrapped by the node-metadata
/// decorator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReporterConfig {
    /// Base reporter.
    #[serde(default)]
    pub base: BaseReporterConfig,
    /// Attach node/pod location to every result when set.
    #[serde(default)]
    pub node_metadata: Option<NodeMetadataConfig>,
}

/// Worker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Identifier used in logs and in a worker directory.
    #[serde(default = "default_worker_id")]
    pub worker_id: String,
    /// Maximum simultaneously running tasks.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
    /// Per-task timeout in seconds, measured from body launch.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: f64,
    /// Resource limits; every entry must be positive.
    #[serde(default = "default_resource_limits")]
    pub resource_limits: ResourceProfile,
    /// Endpoint of the task queue, used by the transport layer only.
    #[serde(default = "default_task_queue_endpoint")]
    pub task_queue_endpoint: String,
    /// Reporter selection.
    #[serde(default)]
    pub reporter: ReporterConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: default_worker_id(),
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            task_timeout_secs: DEFAULT_TASK_TIMEOUT_SECS,
            resource_limits: default_resource_limits(),
            task_queue_endpoint: default_task_queue_endpoint(),
            reporter: ReporterConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Configuration with the stock defaults: 5 concurrent tasks, 300s
    /// timeout, limits `{cpu: 2.0, mem_gb: 8}`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker identifier.
    #[must_use]
    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    /// Set the concurrency bound.
    #[must_use]
    pub const fn with_max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max;
        self
    }

    /// Set the per-task timeout.
    #[must_use]
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout_secs = timeout.as_secs_f64();
        self
    }

    /// Set the resource limits.
    #[must_use]
    pub fn with_resource_limits(mut self, limits: ResourceProfile) -> Self {
        self.resource_limits = limits;
        self
    }

    /// Set the task queue endpoint.
    #[must_use]
    pub fn with_task_queue_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.task_queue_endpoint = endpoint.into();
        self
    }

    /// Set the reporter chain.
    #[must_use]
    pub fn with_reporter(mut self, reporter: ReporterConfig) -> Self {
        self.reporter = reporter;
        self
    }

    /// Per-task timeout as a [`Duration`]. Saturates for values that
    /// [`Self::validate`] rejects.
    #[must_use]
    pub fn task_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.task_timeout_secs).unwrap_or(Duration::MAX)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_tasks == 0 {
            return Err("max_concurrent_tasks must be greater than 0".into());
        }
        if self.max_concurrent_tasks > tokio::sync::Semaphore::MAX_PERMITS {
            return Err(format!(
                "max_concurrent_tasks must be at most {}",
                tokio::sync::Semaphore::MAX_PERMITS
            ));
        }
        match Duration::try_from_secs_f64(self.task_timeout_secs) {
            Ok(timeout) if !timeout.is_zero() => {}
            _ => {
                return Err(format!(
                    "task_timeout_secs must be a positive, representable number of seconds, got {}",
                    self.task_timeout_secs
                ));
            }
        }
        self.resource_limits.validate_limits()?;
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `WORKER_*` environment variables, loading a
    /// `.env` file first when present. Unset variables keep their defaults.
    ///
    /// | variable | field |
    /// |---|---|
    /// | `WORKER_ID` | `worker_id` |
    /// | `WORKER_MAX_CONCURRENT_TASKS` | `max_concurrent_tasks` |
    /// | `WORKER_TASK_TIMEOUT_SECS` | `task_timeout_secs` |
    /// | `WORKER_RESOURCE_LIMITS` | `resource_limits` (JSON object) |
    /// | `WORKER_TASK_QUEUE_ENDPOINT` | `task_queue_endpoint` |
    /// | `WORKER_REPORTER` | `reporter.base` (`log` or `discard`) |
    /// | `WORKER_NODE_METADATA` | enables the node-metadata decorator |
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse, or the
    /// validation failure.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an injectable variable source.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(id) = lookup("WORKER_ID") {
            cfg.worker_id = id;
        }
        if let Some(raw) = lookup("WORKER_MAX_CONCURRENT_TASKS") {
            cfg.max_concurrent_tasks = raw
                .trim()
                .parse()
                .map_err(|e| format!("WORKER_MAX_CONCURRENT_TASKS: {e}"))?;
        }
        if let Some(raw) = lookup("WORKER_TASK_TIMEOUT_SECS") {
            cfg.task_timeout_secs = raw
                .trim()
                .parse()
                .map_err(|e| format!("WORKER_TASK_TIMEOUT_SECS: {e}"))?;
        }
        if let Some(raw) = lookup("WORKER_RESOURCE_LIMITS") {
            cfg.resource_limits =
                serde_json::from_str(&raw).map_err(|e| format!("WORKER_RESOURCE_LIMITS: {e}"))?;
        }
        if let Some(endpoint) = lookup("WORKER_TASK_QUEUE_ENDPOINT") {
            cfg.task_queue_endpoint = endpoint;
        }
        if let Some(raw) = lookup("WORKER_REPORTER") {
            cfg.reporter.base = match raw.trim() {
                "log" => BaseReporterConfig::Log,
                "discard" => BaseReporterConfig::Discard,
                other => return Err(format!("WORKER_REPORTER: unknown reporter `{other}`")),
            };
        }
        if let Some(raw) = lookup("WORKER_NODE_METADATA") {
            if matches!(raw.trim(), "1" | "true" | "yes") {
                cfg.reporter.node_metadata = Some(NodeMetadataConfig::default());
            }
        }
        cfg.validate()?;
        Ok(cfg)
    }
}
