//! Single cascading form variant of the pipeline (`--form cascade`).
//!
//! Clusters are listed up front so a failing first call surfaces as is. Every later field is
//! filled lazily from the gateway as earlier answers change. Once the form is submitted a
//! describe pass re-reads every answer; that pass is where a stale pick becomes `NotFound`.

use async_trait::async_trait;
use regex_lite::Regex;
use tokio_util::sync::CancellationToken;

use super::{
    apply_filter, find_container, find_container_definition, labels, require_some, ExecTarget,
    LogTarget, Pinned, Selector,
};
use crate::errors::IecsError;
use crate::form::{Answers, Field, Form, FormOption, OptionSource, Options};
use crate::gateway::Gateway;
use crate::model::short_name;

const CLUSTER: &str = "cluster";
const SERVICE: &str = "service";
const TASK: &str = "task";
const CONTAINER: &str = "container";

fn as_options(refs: Vec<String>) -> Vec<FormOption> {
    labels(&refs)
        .into_iter()
        .zip(refs)
        .map(|(label, value)| FormOption::new(label, value))
        .collect()
}

fn answer<'x>(answers: &'x Answers, key: &str) -> Result<&'x str, IecsError> {
    answers
        .get(key)
        .ok_or_else(|| IecsError::not_found(format!("no {key} selected")))
}

struct Services<'g> {
    gateway: &'g dyn Gateway,
    filter: Option<Regex>,
}

#[async_trait]
impl<'g> OptionSource for Services<'g> {
    async fn options(
        &self,
        answers: &Answers,
        cancel: &CancellationToken,
    ) -> Result<Vec<FormOption>, IecsError> {
        let cluster = answer(answers, CLUSTER)?;
        let refs = self.gateway.list_services(cluster, cancel).await?;
        Ok(as_options(apply_filter(refs, self.filter.as_ref(), SERVICE)?))
    }
}

struct Tasks<'g> {
    gateway: &'g dyn Gateway,
}

#[async_trait]
impl<'g> OptionSource for Tasks<'g> {
    async fn options(
        &self,
        answers: &Answers,
        cancel: &CancellationToken,
    ) -> Result<Vec<FormOption>, IecsError> {
        let cluster = answer(answers, CLUSTER)?;
        let service = short_name(answer(answers, SERVICE)?);
        let refs = self.gateway.list_tasks(cluster, service, cancel).await?;
        Ok(as_options(refs))
    }
}

struct Containers<'g> {
    gateway: &'g dyn Gateway,
    /// Used instead of the task answer when the task was pinned.
    task: Option<String>,
}

#[async_trait]
impl<'g> OptionSource for Containers<'g> {
    async fn options(
        &self,
        answers: &Answers,
        cancel: &CancellationToken,
    ) -> Result<Vec<FormOption>, IecsError> {
        let cluster = answer(answers, CLUSTER)?;
        let chosen = match &self.task {
            Some(t) => t.as_str(),
            None => answer(answers, TASK)?,
        };
        let task = self.gateway.describe_task(cluster, chosen, cancel).await?;
        Ok(task
            .containers
            .iter()
            .map(|c| FormOption::new(c.name.clone(), c.name.clone()))
            .collect())
    }
}

struct ContainerDefinitions<'g> {
    gateway: &'g dyn Gateway,
}

#[async_trait]
impl<'g> OptionSource for ContainerDefinitions<'g> {
    async fn options(
        &self,
        answers: &Answers,
        cancel: &CancellationToken,
    ) -> Result<Vec<FormOption>, IecsError> {
        let cluster = answer(answers, CLUSTER)?;
        let service = self
            .gateway
            .describe_service(cluster, answer(answers, SERVICE)?, cancel)
            .await?;
        let td = self
            .gateway
            .describe_task_definition(&service.task_definition, cancel)
            .await?;
        Ok(td
            .container_definitions
            .iter()
            .map(|c| FormOption::new(c.name.clone(), c.name.clone()))
            .collect())
    }
}

impl<'a> Selector<'a> {
    async fn cluster_field(&self) -> Result<Field<'a>, IecsError> {
        let refs = self.gateway.list_clusters(self.cancel).await?;
        let refs = require_some(refs, "no clusters found".to_string())?;
        let refs = apply_filter(refs, self.filters.cluster.as_ref(), CLUSTER)?;
        Ok(Field::select(CLUSTER, "cluster", Options::Static(as_options(refs))))
    }

    fn service_field(&self) -> Field<'a> {
        Field::select(
            SERVICE,
            "service",
            Options::Deferred {
                depends_on: Some(CLUSTER),
                source: Box::new(Services {
                    gateway: self.gateway,
                    filter: self.filters.service.clone(),
                }),
            },
        )
    }

    fn tasks_field(&self, multi: bool) -> Field<'a> {
        let options = Options::Deferred {
            depends_on: Some(SERVICE),
            source: Box::new(Tasks {
                gateway: self.gateway,
            }),
        };
        if multi {
            Field::multi_select(TASK, "tasks", options)
        } else {
            Field::select(TASK, "task", options)
        }
    }

    pub(super) async fn exec_target_cascade(
        &mut self,
        pinned: &Pinned,
    ) -> Result<ExecTarget, IecsError> {
        let mut fields = vec![self.cluster_field().await?, self.service_field()];
        if pinned.task.is_none() {
            fields.push(self.tasks_field(false));
        }
        if pinned.container.is_none() {
            fields.push(Field::select(
                CONTAINER,
                "container",
                Options::Deferred {
                    depends_on: Some(if pinned.task.is_some() { CLUSTER } else { TASK }),
                    source: Box::new(Containers {
                        gateway: self.gateway,
                        task: pinned.task.clone(),
                    }),
                },
            ));
        }
        let answers = Form::new(fields).run(self.picker, self.cancel).await?;

        let cluster = self.describe_cluster(answer(&answers, CLUSTER)?).await?;
        self.confirm("cluster", &cluster.arn)?;
        let service = self
            .describe_service(&cluster, answer(&answers, SERVICE)?)
            .await?;
        self.confirm("service", &service.arn)?;
        let chosen = match &pinned.task {
            Some(t) => t.as_str(),
            None => answer(&answers, TASK)?,
        };
        let task = self.resolve_task(&cluster, chosen).await?;
        let name = match &pinned.container {
            Some(n) => n.as_str(),
            None => answer(&answers, CONTAINER)?,
        };
        let container = find_container(&task, name)?;
        self.confirm("container", &container.name)?;
        Ok(ExecTarget {
            cluster,
            service,
            task,
            container,
        })
    }

    pub(super) async fn log_target_cascade(
        &mut self,
        pinned: &Pinned,
    ) -> Result<LogTarget, IecsError> {
        let mut fields = vec![self.cluster_field().await?, self.service_field()];
        if pinned.task.is_none() {
            fields.push(self.tasks_field(true));
        }
        if pinned.container.is_none() {
            fields.push(Field::select(
                CONTAINER,
                "container",
                Options::Deferred {
                    depends_on: Some(SERVICE),
                    source: Box::new(ContainerDefinitions {
                        gateway: self.gateway,
                    }),
                },
            ));
        }
        let answers = Form::new(fields).run(self.picker, self.cancel).await?;

        let cluster = self.describe_cluster(answer(&answers, CLUSTER)?).await?;
        self.confirm("cluster", &cluster.arn)?;
        let service = self
            .describe_service(&cluster, answer(&answers, SERVICE)?)
            .await?;
        self.confirm("service", &service.arn)?;
        let chosen: Vec<&str> = match &pinned.task {
            Some(t) => vec![t.as_str()],
            None => answers.get_all(TASK).iter().map(String::as_str).collect(),
        };
        let mut tasks = Vec::with_capacity(chosen.len());
        for task in chosen {
            tasks.push(self.resolve_task(&cluster, task).await?);
        }
        let task_definition = self
            .gateway
            .describe_task_definition(&service.task_definition, self.cancel)
            .await?;
        let name = match &pinned.container {
            Some(n) => n.as_str(),
            None => answer(&answers, CONTAINER)?,
        };
        let container_definition = find_container_definition(&task_definition, name)?;
        self.confirm("container", &container_definition.name)?;
        Ok(LogTarget {
            cluster,
            service,
            tasks,
            task_definition,
            container_definition,
        })
    }
}
