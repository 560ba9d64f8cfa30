//! Canned fixtures standing in for the orchestrator in `--features demo` builds.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::IecsError;
use crate::gateway::live_tail::{pump, TailEvent, TailStream};
use crate::gateway::{until_cancelled, ExecuteCommand, Gateway, LiveTailHandler};
use crate::model::{
    short_name, Cluster, Container, ContainerDefinition, ExecSession, LogConfiguration, LogEvent,
    Service, SessionStart, Task, TaskDefinition,
};

const ACCOUNT: &str = "arn:aws:ecs:us-east-1:123456789012";
const TASK_DEFINITION: &str = "arn:aws:ecs:us-east-1:123456789012:task-definition/task-def-1:1";
const DEMO_MESSAGES: usize = 5;
const DEMO_INTERVAL: Duration = Duration::from_millis(100);

pub struct DemoGateway {
    region: Option<String>,
}

impl DemoGateway {
    pub fn new(region: Option<String>) -> Self {
        DemoGateway { region }
    }
}

fn cluster_names() -> [&'static str; 2] {
    ["cluster-1", "cluster-2"]
}

fn cluster_arn(name: &str) -> String {
    format!("{ACCOUNT}:cluster/{name}")
}

/// Accept either a short name or an ARN of a known cluster.
fn known_cluster(reference: &str) -> Result<&'static str, IecsError> {
    let name = short_name(reference);
    cluster_names()
        .into_iter()
        .find(|c| *c == name)
        .ok_or_else(|| IecsError::not_found(format!("cluster {reference} not found")))
}

fn known_suffix(reference: &str, candidates: &[&str], what: &str) -> Result<String, IecsError> {
    let name = short_name(reference);
    candidates
        .iter()
        .find(|c| **c == name)
        .map(|c| c.to_string())
        .ok_or_else(|| IecsError::not_found(format!("{what} {reference} not found")))
}

fn awslogs(group: &str, prefix: &str) -> LogConfiguration {
    let mut options = BTreeMap::new();
    options.insert("awslogs-group".to_string(), group.to_string());
    options.insert("awslogs-region".to_string(), "us-east-1".to_string());
    options.insert("awslogs-stream-prefix".to_string(), prefix.to_string());
    LogConfiguration {
        driver: "awslogs".to_string(),
        options: Some(options),
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl Gateway for DemoGateway {
    async fn list_clusters(&self, _cancel: &CancellationToken) -> Result<Vec<String>, IecsError> {
        Ok(cluster_names().iter().map(|n| cluster_arn(n)).collect())
    }

    async fn describe_cluster(
        &self,
        cluster: &str,
        _cancel: &CancellationToken,
    ) -> Result<Cluster, IecsError> {
        let name = known_cluster(cluster)?;
        Ok(Cluster {
            arn: cluster_arn(name),
            name: name.to_string(),
            status: "ACTIVE".to_string(),
        })
    }

    async fn list_services(
        &self,
        cluster: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<String>, IecsError> {
        let c = known_cluster(cluster)?;
        Ok(["service-1", "service-2"]
            .iter()
            .map(|s| format!("{ACCOUNT}:service/{c}/{s}"))
            .collect())
    }

    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
        _cancel: &CancellationToken,
    ) -> Result<Service, IecsError> {
        let c = known_cluster(cluster)?;
        let s = known_suffix(service, &["service-1", "service-2"], "service")?;
        Ok(Service {
            arn: format!("{ACCOUNT}:service/{c}/{s}"),
            name: s,
            cluster_arn: cluster_arn(c),
            task_definition: TASK_DEFINITION.to_string(),
        })
    }

    async fn list_tasks(
        &self,
        cluster: &str,
        service: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<String>, IecsError> {
        let c = known_cluster(cluster)?;
        known_suffix(service, &["service-1", "service-2"], "service")?;
        Ok(["task-1", "task-2"]
            .iter()
            .map(|t| format!("{ACCOUNT}:task/{c}/{t}"))
            .collect())
    }

    async fn describe_task(
        &self,
        cluster: &str,
        task: &str,
        _cancel: &CancellationToken,
    ) -> Result<Task, IecsError> {
        let c = known_cluster(cluster)?;
        let t = known_suffix(task, &["task-1", "task-2"], "task")?;
        Ok(Task {
            arn: format!("{ACCOUNT}:task/{c}/{t}"),
            cluster_arn: cluster_arn(c),
            last_status: "RUNNING".to_string(),
            task_definition_arn: TASK_DEFINITION.to_string(),
            containers: (1..=2)
                .map(|i| Container {
                    name: format!("container-{i}"),
                    runtime_id: Some(format!("runtime-id-{i}")),
                })
                .collect(),
        })
    }

    async fn describe_task_definition(
        &self,
        task_definition: &str,
        _cancel: &CancellationToken,
    ) -> Result<TaskDefinition, IecsError> {
        if task_definition != TASK_DEFINITION && short_name(task_definition) != "task-def-1:1" {
            return Err(IecsError::not_found(format!(
                "task definition {task_definition} not found"
            )));
        }
        Ok(TaskDefinition {
            arn: TASK_DEFINITION.to_string(),
            family: "task-def-1".to_string(),
            revision: 1,
            container_definitions: (1..=2)
                .map(|i| ContainerDefinition {
                    name: format!("container-{i}"),
                    log_configuration: Some(awslogs(
                        &format!("log-group-{i}"),
                        &format!("prefix-{i}"),
                    )),
                })
                .collect(),
        })
    }

    async fn execute_command(
        &self,
        request: &ExecuteCommand,
        cancel: &CancellationToken,
    ) -> Result<ExecSession, IecsError> {
        until_cancelled(cancel, async {
            known_cluster(&request.cluster)?;
            Ok(ExecSession::default())
        })
        .await
    }

    async fn start_live_tail(
        &self,
        log_group: &str,
        stream_names: &[String],
        handler: &mut (dyn LiveTailHandler + Send),
        cancel: &CancellationToken,
    ) -> Result<(), IecsError> {
        if !log_group.starts_with("log-group-") {
            return Err(IecsError::not_found(format!(
                "no log groups found with prefix: {log_group}"
            )));
        }
        let mut stream = DemoStream {
            sent: 0,
            stream_name: stream_names.first().cloned(),
            closed: false,
        };
        pump(&mut stream, handler, cancel).await
    }

    fn region(&self) -> Option<String> {
        Some(self.region.clone().unwrap_or_else(|| "us-east-1".to_string()))
    }
}

/// One start event, then five messages 100 ms apart, then silence until cancelled.
struct DemoStream {
    sent: usize,
    stream_name: Option<String>,
    closed: bool,
}

#[async_trait]
impl TailStream for DemoStream {
    async fn next_event(&mut self) -> Result<Option<TailEvent>, IecsError> {
        if self.closed {
            return Ok(None);
        }
        if self.sent == 0 {
            self.sent = 1;
            return Ok(Some(TailEvent::SessionStart(SessionStart {
                request_id: Some("demo-request".to_string()),
                session_id: Some("demo-session".to_string()),
            })));
        }
        if self.sent > DEMO_MESSAGES {
            std::future::pending::<()>().await;
        }
        if self.sent > 1 {
            tokio::time::sleep(DEMO_INTERVAL).await;
        }
        let i = self.sent - 1;
        self.sent += 1;
        Ok(Some(TailEvent::SessionUpdate(vec![LogEvent {
            timestamp_ms: now_ms(),
            message: format!("log message {i}"),
            log_stream_name: self.stream_name.clone(),
        }])))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
