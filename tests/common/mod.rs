#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use iecs::gateway::{ExecuteCommand, Gateway, LiveTailHandler};
use iecs::model::{
    Cluster, Container, ContainerDefinition, ExecSession, LogConfiguration, LogEvent, Service,
    SessionStart, Task, TaskDefinition,
};
use iecs::{IecsError, Picker};
use tokio_util::sync::CancellationToken;

pub const ARN: &str = "arn:aws:ecs:us-east-1:123456789012";

pub fn cluster(name: &str) -> Cluster {
    Cluster {
        arn: format!("{ARN}:cluster/{name}"),
        name: name.to_string(),
        status: "ACTIVE".to_string(),
    }
}

pub fn service(cluster: &Cluster, name: &str, task_definition: &str) -> Service {
    Service {
        arn: format!("{ARN}:service/{}/{name}", cluster.name),
        name: name.to_string(),
        cluster_arn: cluster.arn.clone(),
        task_definition: task_definition.to_string(),
    }
}

/// `containers` pairs a container name with its runtime id.
pub fn task(cluster: &Cluster, id: &str, containers: &[(&str, &str)]) -> Task {
    Task {
        arn: format!("{ARN}:task/{}/{id}", cluster.name),
        cluster_arn: cluster.arn.clone(),
        last_status: "RUNNING".to_string(),
        task_definition_arn: String::new(),
        containers: containers
            .iter()
            .map(|(name, rt)| Container {
                name: name.to_string(),
                runtime_id: Some(rt.to_string()),
            })
            .collect(),
    }
}

pub fn task_definition(arn: &str, defs: Vec<ContainerDefinition>) -> TaskDefinition {
    TaskDefinition {
        arn: arn.to_string(),
        family: "my-service".to_string(),
        revision: 1,
        container_definitions: defs,
    }
}

pub fn awslogs_definition(name: &str, options: Option<&[(&str, &str)]>) -> ContainerDefinition {
    ContainerDefinition {
        name: name.to_string(),
        log_configuration: Some(LogConfiguration {
            driver: "awslogs".to_string(),
            options: options.map(|o| {
                o.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<BTreeMap<_, _>>()
            }),
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListClusters,
    DescribeCluster(String),
    ListServices(String),
    DescribeService(String, String),
    ListTasks(String, String),
    DescribeTask(String, String),
    DescribeTaskDefinition(String),
    ExecuteCommand(ExecuteCommand),
    StartLiveTail { log_group: String, streams: Vec<String> },
}

/// In-memory gateway that records every call it receives.
#[derive(Default)]
pub struct MockGateway {
    pub clusters: Vec<Cluster>,
    pub services: Vec<Service>,
    pub tasks: Vec<Task>,
    /// Service name to the task references listed for it.
    pub service_tasks: BTreeMap<String, Vec<String>>,
    pub task_definitions: Vec<TaskDefinition>,
    pub list_clusters_error: Option<String>,
    pub execute_error: Option<String>,
    /// Returned by every DescribeCluster, whatever was asked for.
    pub describe_cluster_override: Option<Cluster>,
    pub region: Option<String>,
    pub session: ExecSession,
    pub tail_events: Vec<LogEvent>,
    /// ListServices never answers; it returns only once the operation is cancelled.
    pub hang_list_services: bool,
    pub calls: Mutex<Vec<Call>>,
}

impl MockGateway {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, pred: impl Fn(&Call) -> bool) -> bool {
        self.calls().iter().any(pred)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn list_clusters(&self, _cancel: &CancellationToken) -> Result<Vec<String>, IecsError> {
        self.record(Call::ListClusters);
        if let Some(msg) = &self.list_clusters_error {
            return Err(IecsError::remote(msg.clone()));
        }
        Ok(self.clusters.iter().map(|c| c.arn.clone()).collect())
    }

    async fn describe_cluster(
        &self,
        cluster: &str,
        _cancel: &CancellationToken,
    ) -> Result<Cluster, IecsError> {
        self.record(Call::DescribeCluster(cluster.to_string()));
        if let Some(c) = &self.describe_cluster_override {
            return Ok(c.clone());
        }
        self.clusters
            .iter()
            .find(|c| c.arn == cluster || c.name == cluster)
            .cloned()
            .ok_or_else(|| IecsError::not_found(format!("cluster {cluster} not found")))
    }

    async fn list_services(
        &self,
        cluster: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, IecsError> {
        self.record(Call::ListServices(cluster.to_string()));
        if self.hang_list_services {
            cancel.cancelled().await;
            return Err(IecsError::Cancelled);
        }
        Ok(self
            .services
            .iter()
            .filter(|s| s.cluster_arn == cluster)
            .map(|s| s.arn.clone())
            .collect())
    }

    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
        _cancel: &CancellationToken,
    ) -> Result<Service, IecsError> {
        self.record(Call::DescribeService(cluster.to_string(), service.to_string()));
        self.services
            .iter()
            .find(|s| s.cluster_arn == cluster && (s.arn == service || s.name == service))
            .cloned()
            .ok_or_else(|| IecsError::not_found(format!("service {service} not found")))
    }

    async fn list_tasks(
        &self,
        cluster: &str,
        service: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<String>, IecsError> {
        self.record(Call::ListTasks(cluster.to_string(), service.to_string()));
        Ok(self.service_tasks.get(service).cloned().unwrap_or_default())
    }

    async fn describe_task(
        &self,
        cluster: &str,
        task: &str,
        _cancel: &CancellationToken,
    ) -> Result<Task, IecsError> {
        self.record(Call::DescribeTask(cluster.to_string(), task.to_string()));
        self.tasks
            .iter()
            .find(|t| t.arn == task || t.id() == task)
            .cloned()
            .ok_or_else(|| IecsError::not_found(format!("task {task} not found")))
    }

    async fn describe_task_definition(
        &self,
        task_definition: &str,
        _cancel: &CancellationToken,
    ) -> Result<TaskDefinition, IecsError> {
        self.record(Call::DescribeTaskDefinition(task_definition.to_string()));
        self.task_definitions
            .iter()
            .find(|td| td.arn == task_definition)
            .cloned()
            .ok_or_else(|| {
                IecsError::not_found(format!("task definition {task_definition} not found"))
            })
    }

    async fn execute_command(
        &self,
        request: &ExecuteCommand,
        _cancel: &CancellationToken,
    ) -> Result<ExecSession, IecsError> {
        self.record(Call::ExecuteCommand(request.clone()));
        if let Some(msg) = &self.execute_error {
            return Err(IecsError::remote(msg.clone()));
        }
        Ok(self.session.clone())
    }

    async fn start_live_tail(
        &self,
        log_group: &str,
        stream_names: &[String],
        handler: &mut (dyn LiveTailHandler + Send),
        _cancel: &CancellationToken,
    ) -> Result<(), IecsError> {
        self.record(Call::StartLiveTail {
            log_group: log_group.to_string(),
            streams: stream_names.to_vec(),
        });
        handler.on_start(&SessionStart {
            request_id: Some("req-1".to_string()),
            session_id: Some("tail-1".to_string()),
        })?;
        for event in &self.tail_events {
            handler.on_batch(event)?;
        }
        // Behaves as if the operator cancelled after the last event.
        Ok(())
    }

    fn region(&self) -> Option<String> {
        self.region.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    One(usize),
    Many(Vec<usize>),
}

/// Answers prompts from a queue and remembers what it was asked.
#[derive(Default)]
pub struct ScriptedPicker {
    answers: Mutex<VecDeque<Answer>>,
    prompts: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedPicker {
    pub fn new(answers: Vec<Answer>) -> Self {
        ScriptedPicker {
            answers: Mutex::new(answers.into()),
            prompts: Mutex::default(),
        }
    }

    pub fn prompts(&self) -> Vec<(String, Vec<String>)> {
        self.prompts.lock().unwrap().clone()
    }

    fn next(&self, title: &str, options: &[String]) -> Option<Answer> {
        self.prompts
            .lock()
            .unwrap()
            .push((title.to_string(), options.to_vec()));
        self.answers.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl Picker for ScriptedPicker {
    async fn prompt_one(
        &self,
        title: &str,
        options: &[String],
        _cancel: &CancellationToken,
    ) -> Result<usize, IecsError> {
        match self.next(title, options) {
            Some(Answer::One(i)) => Ok(i),
            Some(other) => panic!("prompt_one({title}) got scripted {other:?}"),
            None => Err(IecsError::Cancelled),
        }
    }

    async fn prompt_many(
        &self,
        title: &str,
        options: &[String],
        _cancel: &CancellationToken,
    ) -> Result<Vec<usize>, IecsError> {
        match self.next(title, options) {
            Some(Answer::Many(v)) => Ok(v),
            Some(other) => panic!("prompt_many({title}) got scripted {other:?}"),
            None => Err(IecsError::Cancelled),
        }
    }
}

/// Cloneable in-memory writer for asserting on output after it was moved into a consumer.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Write an executable `/bin/sh` script into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// The built binary with a private config location and no IECS_* overrides from the
/// caller's environment.
pub fn iecs_cmd(home: &Path) -> std::process::Command {
    let mut cmd = std::process::Command::new(env!("CARGO_BIN_EXE_iecs"));
    for key in [
        "IECS_THEME",
        "IECS_COLOR",
        "IECS_FORM",
        "IECS_SESSION_MANAGER_PLUGIN",
        "IECS_API_TIMEOUT",
        "IECS_LOG",
        "RUST_LOG",
    ] {
        cmd.env_remove(key);
    }
    cmd.env("IECS_CONFIG", home.join("config.yml"))
        .env("NO_COLOR", "1")
        .stdin(std::process::Stdio::null());
    cmd
}
