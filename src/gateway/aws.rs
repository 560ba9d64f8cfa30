use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::operation::start_live_tail::StartLiveTailOutput;
use aws_sdk_cloudwatchlogs::types::StartLiveTailResponseStream;
use aws_sdk_cloudwatchlogs::Client as LogsClient;
use aws_sdk_ecs::error::DisplayErrorContext;
use aws_sdk_ecs::Client as EcsClient;
use tokio_util::sync::CancellationToken;

use crate::errors::IecsError;
use crate::gateway::live_tail::{pump, TailEvent, TailStream};
use crate::gateway::{ExecuteCommand, Gateway, LiveTailHandler};
use crate::model::{
    Cluster, Container, ContainerDefinition, ExecSession, LogConfiguration, LogEvent, Service,
    SessionStart, Task, TaskDefinition,
};

pub struct AwsGateway {
    ecs: EcsClient,
    logs: LogsClient,
    region: Option<String>,
    timeout: Duration,
}

impl AwsGateway {
    /// Load the ambient AWS configuration, optionally pinning region and profile.
    pub async fn connect(
        region: Option<String>,
        profile: Option<String>,
        timeout: Duration,
    ) -> Result<Self, IecsError> {
        let mut loader = aws_config::from_env();
        if let Some(r) = region {
            loader = loader.region(aws_config::Region::new(r));
        }
        if let Some(p) = profile {
            loader = loader.profile_name(p);
        }
        let config = loader.load().await;
        let region = config.region().map(|r| r.to_string());
        tracing::debug!(region = ?region, "aws configuration loaded");
        Ok(AwsGateway {
            ecs: EcsClient::new(&config),
            logs: LogsClient::new(&config),
            region,
            timeout,
        })
    }

    /// Await one SDK call, bounded by the API timeout and the cancellation token.
    async fn call<T, E, F>(
        &self,
        op: &str,
        fut: F,
        cancel: &CancellationToken,
    ) -> Result<T, IecsError>
    where
        F: Future<Output = Result<T, E>> + Send,
        E: std::error::Error + 'static,
    {
        tracing::debug!(op, "orchestrator call");
        let bounded = tokio::time::timeout(self.timeout, fut);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(IecsError::Cancelled),
            r = bounded => match r {
                Ok(Ok(v)) => Ok(v),
                Ok(Err(e)) => Err(IecsError::remote(format!("{op}: {}", DisplayErrorContext(&e)))),
                Err(_) => Err(IecsError::remote(format!(
                    "{op}: no response after {}",
                    humantime::format_duration(self.timeout)
                ))),
            },
        }
    }

    /// ARN of the first log group whose name starts with `prefix`, preferring an exact match.
    async fn log_group_arn(
        &self,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<String, IecsError> {
        let out = self
            .call(
                "DescribeLogGroups",
                self.logs
                    .describe_log_groups()
                    .log_group_name_prefix(prefix)
                    .send(),
                cancel,
            )
            .await?;
        let groups = out.log_groups();
        let group = groups
            .iter()
            .find(|g| g.log_group_name() == Some(prefix))
            .or_else(|| groups.first())
            .ok_or_else(|| {
                IecsError::not_found(format!("no log groups found with prefix: {prefix}"))
            })?;
        group
            .log_group_arn()
            .map(str::to_string)
            .or_else(|| group.arn().map(|a| a.trim_end_matches(":*").to_string()))
            .ok_or_else(|| IecsError::not_found(format!("log group {prefix} has no ARN")))
    }
}

fn owned(v: Option<&str>) -> String {
    v.unwrap_or_default().to_string()
}

#[async_trait]
impl Gateway for AwsGateway {
    async fn list_clusters(&self, cancel: &CancellationToken) -> Result<Vec<String>, IecsError> {
        let mut arns = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let resp = self
                .call(
                    "ListClusters",
                    self.ecs.list_clusters().set_next_token(next_token.take()).send(),
                    cancel,
                )
                .await?;
            arns.extend(resp.cluster_arns().iter().cloned());
            match resp.next_token() {
                Some(t) => next_token = Some(t.to_string()),
                None => break,
            }
        }
        if arns.is_empty() {
            return Err(IecsError::not_found("no clusters found"));
        }
        Ok(arns)
    }

    async fn describe_cluster(
        &self,
        cluster: &str,
        cancel: &CancellationToken,
    ) -> Result<Cluster, IecsError> {
        let resp = self
            .call(
                "DescribeClusters",
                self.ecs.describe_clusters().clusters(cluster).send(),
                cancel,
            )
            .await?;
        let c = resp
            .clusters()
            .first()
            .ok_or_else(|| IecsError::not_found(format!("cluster {cluster} not found")))?;
        Ok(Cluster {
            arn: owned(c.cluster_arn()),
            name: owned(c.cluster_name()),
            status: owned(c.status()),
        })
    }

    async fn list_services(
        &self,
        cluster: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, IecsError> {
        let mut arns = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let resp = self
                .call(
                    "ListServices",
                    self.ecs
                        .list_services()
                        .cluster(cluster)
                        .set_next_token(next_token.take())
                        .send(),
                    cancel,
                )
                .await?;
            arns.extend(resp.service_arns().iter().cloned());
            match resp.next_token() {
                Some(t) => next_token = Some(t.to_string()),
                None => break,
            }
        }
        if arns.is_empty() {
            return Err(IecsError::not_found(format!(
                "no services found in cluster {cluster}"
            )));
        }
        Ok(arns)
    }

    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
        cancel: &CancellationToken,
    ) -> Result<Service, IecsError> {
        let resp = self
            .call(
                "DescribeServices",
                self.ecs
                    .describe_services()
                    .cluster(cluster)
                    .services(service)
                    .send(),
                cancel,
            )
            .await?;
        let s = resp.services().first().ok_or_else(|| {
            IecsError::not_found(format!("service {service} not found in cluster {cluster}"))
        })?;
        Ok(Service {
            arn: owned(s.service_arn()),
            name: owned(s.service_name()),
            cluster_arn: owned(s.cluster_arn()),
            task_definition: owned(s.task_definition()),
        })
    }

    async fn list_tasks(
        &self,
        cluster: &str,
        service: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, IecsError> {
        let mut arns = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let resp = self
                .call(
                    "ListTasks",
                    self.ecs
                        .list_tasks()
                        .cluster(cluster)
                        .service_name(service)
                        .set_next_token(next_token.take())
                        .send(),
                    cancel,
                )
                .await?;
            arns.extend(resp.task_arns().iter().cloned());
            match resp.next_token() {
                Some(t) => next_token = Some(t.to_string()),
                None => break,
            }
        }
        if arns.is_empty() {
            return Err(IecsError::not_found(format!(
                "no tasks found for service {service} in cluster {cluster}"
            )));
        }
        Ok(arns)
    }

    async fn describe_task(
        &self,
        cluster: &str,
        task: &str,
        cancel: &CancellationToken,
    ) -> Result<Task, IecsError> {
        let resp = self
            .call(
                "DescribeTasks",
                self.ecs.describe_tasks().cluster(cluster).tasks(task).send(),
                cancel,
            )
            .await?;
        let t = resp.tasks().first().ok_or_else(|| {
            IecsError::not_found(format!("task {task} not found in cluster {cluster}"))
        })?;
        Ok(Task {
            arn: owned(t.task_arn()),
            cluster_arn: owned(t.cluster_arn()),
            last_status: owned(t.last_status()),
            task_definition_arn: owned(t.task_definition_arn()),
            containers: t
                .containers()
                .iter()
                .map(|c| Container {
                    name: owned(c.name()),
                    runtime_id: c.runtime_id().map(str::to_string),
                })
                .collect(),
        })
    }

    async fn describe_task_definition(
        &self,
        task_definition: &str,
        cancel: &CancellationToken,
    ) -> Result<TaskDefinition, IecsError> {
        let resp = self
            .call(
                "DescribeTaskDefinition",
                self.ecs
                    .describe_task_definition()
                    .task_definition(task_definition)
                    .send(),
                cancel,
            )
            .await?;
        let td = resp.task_definition().ok_or_else(|| {
            IecsError::not_found(format!("task definition {task_definition} not found"))
        })?;
        Ok(TaskDefinition {
            arn: owned(td.task_definition_arn()),
            family: owned(td.family()),
            revision: td.revision(),
            container_definitions: td
                .container_definitions()
                .iter()
                .map(|cd| ContainerDefinition {
                    name: owned(cd.name()),
                    log_configuration: cd.log_configuration().map(|lc| LogConfiguration {
                        driver: lc.log_driver().as_str().to_string(),
                        options: lc
                            .options()
                            .map(|o| o.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
                    }),
                })
                .collect(),
        })
    }

    async fn execute_command(
        &self,
        request: &ExecuteCommand,
        cancel: &CancellationToken,
    ) -> Result<ExecSession, IecsError> {
        let resp = self
            .call(
                "ExecuteCommand",
                self.ecs
                    .execute_command()
                    .cluster(&request.cluster)
                    .task(&request.task)
                    .container(&request.container)
                    .command(&request.command)
                    .interactive(request.interactive)
                    .send(),
                cancel,
            )
            .await?;
        let session = resp
            .session()
            .ok_or_else(|| IecsError::remote("ExecuteCommand: response carried no session"))?;
        Ok(ExecSession {
            session_id: session.session_id().map(str::to_string),
            stream_url: session.stream_url().map(str::to_string),
            token_value: session.token_value().map(str::to_string),
        })
    }

    async fn start_live_tail(
        &self,
        log_group: &str,
        stream_names: &[String],
        handler: &mut (dyn LiveTailHandler + Send),
        cancel: &CancellationToken,
    ) -> Result<(), IecsError> {
        let arn = self.log_group_arn(log_group, cancel).await?;
        tracing::debug!(log_group_arn = %arn, streams = ?stream_names, "starting live tail");
        let output = self
            .call(
                "StartLiveTail",
                self.logs
                    .start_live_tail()
                    .log_group_identifiers(arn)
                    .set_log_stream_name_prefixes(Some(stream_names.to_vec()))
                    .send(),
                cancel,
            )
            .await?;
        let mut stream = AwsTailStream {
            output: Some(output),
        };
        pump(&mut stream, handler, cancel).await
    }

    fn region(&self) -> Option<String> {
        self.region.clone()
    }
}

struct AwsTailStream {
    output: Option<StartLiveTailOutput>,
}

#[async_trait]
impl TailStream for AwsTailStream {
    async fn next_event(&mut self) -> Result<Option<TailEvent>, IecsError> {
        let Some(output) = self.output.as_mut() else {
            return Ok(None);
        };
        let received = output
            .response_stream
            .recv()
            .await
            .map_err(|e| IecsError::remote(format!("live tail: {}", DisplayErrorContext(&e))))?;
        let Some(event) = received else {
            return Ok(None);
        };
        Ok(Some(match event {
            StartLiveTailResponseStream::SessionStart(s) => TailEvent::SessionStart(SessionStart {
                request_id: s.request_id().map(str::to_string),
                session_id: s.session_id().map(str::to_string),
            }),
            StartLiveTailResponseStream::SessionUpdate(u) => TailEvent::SessionUpdate(
                u.session_results()
                    .iter()
                    .map(|e| LogEvent {
                        timestamp_ms: e.timestamp().unwrap_or_default(),
                        message: owned(e.message()),
                        log_stream_name: e.log_stream_name().map(str::to_string),
                    })
                    .collect(),
            ),
            other => TailEvent::Unknown(format!("{other:?}")),
        }))
    }

    fn close(&mut self) {
        // Dropping the receiver tears down the event stream.
        self.output.take();
    }
}
