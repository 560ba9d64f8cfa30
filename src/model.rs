//! Snapshots of orchestrator entities. Every value here comes from a gateway call
//! and lives only for the current invocation.

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub arn: String,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub arn: String,
    pub name: String,
    pub cluster_arn: String,
    /// Reference of the service's current task definition.
    pub task_definition: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub arn: String,
    pub cluster_arn: String,
    pub last_status: String,
    pub task_definition_arn: String,
    pub containers: Vec<Container>,
}

impl Task {
    /// Final '/'-separated segment of the task reference.
    pub fn id(&self) -> &str {
        self.arn.rsplit('/').next().unwrap_or(&self.arn)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub name: String,
    /// Opaque runtime identifier used for session targeting; distinct from `name`.
    pub runtime_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinition {
    pub arn: String,
    pub family: String,
    pub revision: i32,
    pub container_definitions: Vec<ContainerDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDefinition {
    pub name: String,
    pub log_configuration: Option<LogConfiguration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfiguration {
    pub driver: String,
    pub options: Option<BTreeMap<String, String>>,
}

/// Single-use credentials for the session broker. Serialized verbatim as its first argument.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecSession {
    #[serde(rename = "SessionId")]
    pub session_id: Option<String>,
    #[serde(rename = "StreamUrl")]
    pub stream_url: Option<String>,
    #[serde(rename = "TokenValue")]
    pub token_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    pub message: String,
    pub log_stream_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStart {
    pub request_id: Option<String>,
    pub session_id: Option<String>,
}

/// Last path segment of any reference (ARN or short name).
pub fn short_name(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}
