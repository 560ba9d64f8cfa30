//! Cluster → service → task → container resolution.
//!
//! Each stage lists candidates scoped to the previous pick, narrows them with the
//! operator's filters, picks (no prompt for a single candidate), describes the pick and
//! confirms it on the output stream. Stages run strictly one after another.

use std::io::Write;

use regex_lite::Regex;
use tokio_util::sync::CancellationToken;

use crate::config::FormStyle;
use crate::errors::IecsError;
use crate::gateway::Gateway;
use crate::model::{
    short_name, Cluster, Container, ContainerDefinition, Service, Task, TaskDefinition,
};
use crate::picker::{pick_many, pick_one, Picker};

pub mod cascade;

/// Regex filters applied to listed references before picking.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub cluster: Option<Regex>,
    pub service: Option<Regex>,
}

impl Filters {
    pub fn new(cluster: Option<&str>, service: Option<&str>) -> Result<Self, IecsError> {
        let compile = |flag: &str, pattern: Option<&str>| -> Result<Option<Regex>, IecsError> {
            pattern
                .map(|p| {
                    Regex::new(p).map_err(|e| {
                        IecsError::invalid(format!("invalid --{flag} pattern \"{p}\": {e}"))
                    })
                })
                .transpose()
        };
        Ok(Filters {
            cluster: compile("cluster", cluster)?,
            service: compile("service", service)?,
        })
    }
}

/// Keep references whose short name matches `filter`; everything when there is no filter.
pub(crate) fn apply_filter(
    refs: Vec<String>,
    filter: Option<&Regex>,
    what: &str,
) -> Result<Vec<String>, IecsError> {
    let Some(re) = filter else {
        return Ok(refs);
    };
    let kept: Vec<String> = refs
        .into_iter()
        .filter(|r| re.is_match(short_name(r)))
        .collect();
    if kept.is_empty() {
        return Err(IecsError::not_found(format!(
            "no {what} matches --{what} \"{}\"",
            re.as_str()
        )));
    }
    Ok(kept)
}

/// Exact picks from `--task`/`--container`. A pinned stage is described directly and
/// never listed or prompted for.
#[derive(Debug, Clone, Default)]
pub struct Pinned {
    /// Task id or ARN.
    pub task: Option<String>,
    pub container: Option<String>,
}

/// A described entity is the one that was picked if either its ARN or its name is the
/// chosen reference.
pub(crate) fn same_ref(chosen: &str, arn: &str, name: &str) -> bool {
    chosen == arn || chosen == name
}

pub(crate) fn require_some(refs: Vec<String>, scope: String) -> Result<Vec<String>, IecsError> {
    if refs.is_empty() {
        return Err(IecsError::not_found(scope));
    }
    Ok(refs)
}

pub(crate) fn labels(refs: &[String]) -> Vec<String> {
    refs.iter().map(|r| short_name(r).to_string()).collect()
}

#[derive(Debug, Clone)]
pub struct ExecTarget {
    pub cluster: Cluster,
    pub service: Service,
    pub task: Task,
    pub container: Container,
}

#[derive(Debug, Clone)]
pub struct LogTarget {
    pub cluster: Cluster,
    pub service: Service,
    pub tasks: Vec<Task>,
    pub task_definition: TaskDefinition,
    pub container_definition: ContainerDefinition,
}

pub struct Selector<'a> {
    gateway: &'a dyn Gateway,
    picker: &'a dyn Picker,
    cancel: &'a CancellationToken,
    filters: Filters,
    out: Box<dyn Write + Send + 'a>,
    title_code: Option<String>,
}

impl<'a> Selector<'a> {
    pub fn new(
        gateway: &'a dyn Gateway,
        picker: &'a dyn Picker,
        cancel: &'a CancellationToken,
        out: Box<dyn Write + Send + 'a>,
    ) -> Self {
        Selector {
            gateway,
            picker,
            cancel,
            filters: Filters::default(),
            out,
            title_code: None,
        }
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    /// Paint "Selected X:" titles with this ANSI sequence.
    pub fn with_title_code(mut self, code: Option<String>) -> Self {
        self.title_code = code;
        self
    }

    pub(crate) fn confirm(&mut self, what: &str, value: &str) -> Result<(), IecsError> {
        let title = format!("Selected {what}:");
        match &self.title_code {
            Some(code) => writeln!(self.out, "{code}{title}\x1b[0m {value}")?,
            None => writeln!(self.out, "{title} {value}")?,
        }
        Ok(())
    }

    /// Write one plain line to the operator's output stream.
    pub fn note(&mut self, line: &str) -> Result<(), IecsError> {
        writeln!(self.out, "{line}")?;
        Ok(())
    }

    pub async fn select_cluster(&mut self) -> Result<Cluster, IecsError> {
        let refs = self.gateway.list_clusters(self.cancel).await?;
        let refs = require_some(refs, "no clusters found".to_string())?;
        let refs = apply_filter(refs, self.filters.cluster.as_ref(), "cluster")?;
        let idx = pick_one(self.picker, "cluster", &labels(&refs), self.cancel).await?;
        let cluster = self.describe_cluster(&refs[idx]).await?;
        self.confirm("cluster", &cluster.arn)?;
        Ok(cluster)
    }

    pub(crate) async fn describe_cluster(&self, chosen: &str) -> Result<Cluster, IecsError> {
        let cluster = self.gateway.describe_cluster(chosen, self.cancel).await?;
        if !same_ref(chosen, &cluster.arn, &cluster.name) {
            return Err(IecsError::not_found(format!("cluster {chosen} not found")));
        }
        tracing::info!(cluster = %cluster.arn, status = %cluster.status, "cluster resolved");
        Ok(cluster)
    }

    pub async fn select_service(&mut self, cluster: &Cluster) -> Result<Service, IecsError> {
        let refs = self.gateway.list_services(&cluster.arn, self.cancel).await?;
        let refs = require_some(refs, format!("no services found in cluster {}", cluster.arn))?;
        let refs = apply_filter(refs, self.filters.service.as_ref(), "service")?;
        let idx = pick_one(self.picker, "service", &labels(&refs), self.cancel).await?;
        let service = self.describe_service(cluster, &refs[idx]).await?;
        self.confirm("service", &service.arn)?;
        Ok(service)
    }

    pub(crate) async fn describe_service(
        &self,
        cluster: &Cluster,
        chosen: &str,
    ) -> Result<Service, IecsError> {
        let service = self
            .gateway
            .describe_service(&cluster.arn, chosen, self.cancel)
            .await?;
        if !same_ref(chosen, &service.arn, &service.name) {
            return Err(IecsError::not_found(format!(
                "service {chosen} not found in cluster {}",
                cluster.arn
            )));
        }
        tracing::info!(service = %service.arn, "service resolved");
        Ok(service)
    }

    pub async fn select_task(
        &mut self,
        cluster: &Cluster,
        service: &Service,
        pinned: Option<&str>,
    ) -> Result<Task, IecsError> {
        if let Some(chosen) = pinned {
            return self.resolve_task(cluster, chosen).await;
        }
        let refs = self
            .gateway
            .list_tasks(&cluster.arn, &service.name, self.cancel)
            .await?;
        let refs = require_some(
            refs,
            format!("no tasks found for service {} in cluster {}", service.name, cluster.arn),
        )?;
        let idx = pick_one(self.picker, "task", &labels(&refs), self.cancel).await?;
        let task = self.describe_task(cluster, &refs[idx]).await?;
        self.confirm("task", &task.arn)?;
        Ok(task)
    }

    /// Like [`Self::select_task`] but the operator may keep several tasks.
    pub async fn select_tasks(
        &mut self,
        cluster: &Cluster,
        service: &Service,
        pinned: Option<&str>,
    ) -> Result<Vec<Task>, IecsError> {
        if let Some(chosen) = pinned {
            return Ok(vec![self.resolve_task(cluster, chosen).await?]);
        }
        let refs = self
            .gateway
            .list_tasks(&cluster.arn, &service.name, self.cancel)
            .await?;
        let refs = require_some(
            refs,
            format!("no tasks found for service {} in cluster {}", service.name, cluster.arn),
        )?;
        let picked = pick_many(self.picker, "tasks", &labels(&refs), self.cancel).await?;
        let mut tasks = Vec::with_capacity(picked.len());
        for idx in picked {
            let task = self.describe_task(cluster, &refs[idx]).await?;
            self.confirm("task", &task.arn)?;
            tasks.push(task);
        }
        Ok(tasks)
    }

    pub(crate) async fn resolve_task(
        &mut self,
        cluster: &Cluster,
        chosen: &str,
    ) -> Result<Task, IecsError> {
        let task = self.describe_task(cluster, chosen).await?;
        self.confirm("task", &task.arn)?;
        Ok(task)
    }

    pub(crate) async fn describe_task(
        &self,
        cluster: &Cluster,
        chosen: &str,
    ) -> Result<Task, IecsError> {
        let task = self
            .gateway
            .describe_task(&cluster.arn, chosen, self.cancel)
            .await?;
        if !same_ref(chosen, &task.arn, task.id()) {
            return Err(IecsError::not_found(format!(
                "task {chosen} not found in cluster {}",
                cluster.arn
            )));
        }
        tracing::info!(task = %task.arn, status = %task.last_status, "task resolved");
        Ok(task)
    }

    /// Pick a container of `task`, or look `name` up exactly when given.
    pub async fn select_container(
        &mut self,
        task: &Task,
        name: Option<&str>,
    ) -> Result<Container, IecsError> {
        let chosen = match name {
            Some(n) => n.to_string(),
            None => {
                let names: Vec<String> = task.containers.iter().map(|c| c.name.clone()).collect();
                if names.is_empty() {
                    return Err(IecsError::not_found(format!(
                        "no containers found in task {}",
                        task.arn
                    )));
                }
                let idx = pick_one(self.picker, "container", &names, self.cancel).await?;
                names[idx].clone()
            }
        };
        let container = find_container(task, &chosen)?;
        self.confirm("container", &container.name)?;
        Ok(container)
    }

    /// Pick a container definition of the service's task definition, or look `name` up
    /// exactly when given.
    pub async fn select_container_definition(
        &mut self,
        service: &Service,
        name: Option<&str>,
    ) -> Result<(TaskDefinition, ContainerDefinition), IecsError> {
        let td = self
            .gateway
            .describe_task_definition(&service.task_definition, self.cancel)
            .await?;
        let chosen = match name {
            Some(n) => n.to_string(),
            None => {
                let names: Vec<String> = td
                    .container_definitions
                    .iter()
                    .map(|c| c.name.clone())
                    .collect();
                if names.is_empty() {
                    return Err(IecsError::not_found(format!(
                        "no container definitions found in task definition {}",
                        td.arn
                    )));
                }
                let idx = pick_one(self.picker, "container", &names, self.cancel).await?;
                names[idx].clone()
            }
        };
        let def = find_container_definition(&td, &chosen)?;
        self.confirm("container", &def.name)?;
        Ok((td, def))
    }

    /// Resolve everything `exec` needs.
    pub async fn exec_target(
        &mut self,
        form: FormStyle,
        pinned: &Pinned,
    ) -> Result<ExecTarget, IecsError> {
        if form == FormStyle::Cascade {
            return self.exec_target_cascade(pinned).await;
        }
        let cluster = self.select_cluster().await?;
        let service = self.select_service(&cluster).await?;
        let task = self
            .select_task(&cluster, &service, pinned.task.as_deref())
            .await?;
        let container = self
            .select_container(&task, pinned.container.as_deref())
            .await?;
        Ok(ExecTarget {
            cluster,
            service,
            task,
            container,
        })
    }

    /// Resolve everything `logs` needs.
    pub async fn log_target(
        &mut self,
        form: FormStyle,
        pinned: &Pinned,
    ) -> Result<LogTarget, IecsError> {
        if form == FormStyle::Cascade {
            return self.log_target_cascade(pinned).await;
        }
        let cluster = self.select_cluster().await?;
        let service = self.select_service(&cluster).await?;
        let tasks = self
            .select_tasks(&cluster, &service, pinned.task.as_deref())
            .await?;
        let (task_definition, container_definition) = self
            .select_container_definition(&service, pinned.container.as_deref())
            .await?;
        Ok(LogTarget {
            cluster,
            service,
            tasks,
            task_definition,
            container_definition,
        })
    }
}

pub fn find_container(task: &Task, name: &str) -> Result<Container, IecsError> {
    task.containers
        .iter()
        .find(|c| c.name == name)
        .cloned()
        .ok_or_else(|| {
            IecsError::not_found(format!("container {name} not found in task {}", task.arn))
        })
}

pub fn find_container_definition(
    td: &TaskDefinition,
    name: &str,
) -> Result<ContainerDefinition, IecsError> {
    td.container_definitions
        .iter()
        .find(|c| c.name == name)
        .cloned()
        .ok_or_else(|| {
            IecsError::not_found(format!(
                "container {name} not found in task definition {}",
                td.arn
            ))
        })
}
