//! Narrow, typed surface over the orchestrator and log service.
//!
//! Every operation takes the invocation's cancellation token. Listings never come back
//! empty and describes never come back without an entity: both cases are `NotFound`.

use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::errors::IecsError;
use crate::model::{
    Cluster, ExecSession, LogEvent, Service, SessionStart, Task, TaskDefinition,
};

#[cfg(not(feature = "demo"))]
pub mod aws;
#[cfg(any(feature = "demo", test))]
pub mod demo;
pub mod live_tail;

pub use live_tail::{pump, TailEvent, TailStream};

/// Arguments of a remote-exec request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteCommand {
    pub cluster: String,
    pub task: String,
    pub container: String,
    pub command: String,
    pub interactive: bool,
}

/// Receives live-tail events in arrival order, one call at a time.
pub trait LiveTailHandler {
    fn on_start(&mut self, start: &SessionStart) -> Result<(), IecsError>;
    fn on_batch(&mut self, event: &LogEvent) -> Result<(), IecsError>;
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn list_clusters(&self, cancel: &CancellationToken) -> Result<Vec<String>, IecsError>;

    async fn describe_cluster(
        &self,
        cluster: &str,
        cancel: &CancellationToken,
    ) -> Result<Cluster, IecsError>;

    async fn list_services(
        &self,
        cluster: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, IecsError>;

    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
        cancel: &CancellationToken,
    ) -> Result<Service, IecsError>;

    async fn list_tasks(
        &self,
        cluster: &str,
        service: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, IecsError>;

    async fn describe_task(
        &self,
        cluster: &str,
        task: &str,
        cancel: &CancellationToken,
    ) -> Result<Task, IecsError>;

    async fn describe_task_definition(
        &self,
        task_definition: &str,
        cancel: &CancellationToken,
    ) -> Result<TaskDefinition, IecsError>;

    async fn execute_command(
        &self,
        request: &ExecuteCommand,
        cancel: &CancellationToken,
    ) -> Result<ExecSession, IecsError>;

    /// Runs until cancelled (success), the stream ends (`StreamClosed`) or fails.
    /// The stream is closed before this returns, whatever the outcome.
    async fn start_live_tail(
        &self,
        log_group: &str,
        stream_names: &[String],
        handler: &mut (dyn LiveTailHandler + Send),
        cancel: &CancellationToken,
    ) -> Result<(), IecsError>;

    /// Region requests are sent to; the session broker needs it too.
    fn region(&self) -> Option<String>;
}

/// Race `fut` against cancellation. Cancellation wins ties.
pub async fn until_cancelled<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, IecsError>
where
    F: Future<Output = Result<T, IecsError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(IecsError::Cancelled),
        r = fut => r,
    }
}

/// Build the gateway this binary was compiled with.
#[cfg(not(feature = "demo"))]
pub async fn connect(settings: &Settings) -> Result<Box<dyn Gateway>, IecsError> {
    let gw = aws::AwsGateway::connect(
        settings.region.clone(),
        settings.profile.clone(),
        settings.api_timeout,
    )
    .await?;
    Ok(Box::new(gw))
}

#[cfg(feature = "demo")]
pub async fn connect(settings: &Settings) -> Result<Box<dyn Gateway>, IecsError> {
    tracing::info!("using demo fixtures; no orchestrator calls are made");
    Ok(Box::new(demo::DemoGateway::new(settings.region.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn until_cancelled_prefers_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let r: Result<(), _> = until_cancelled(&cancel, async { Ok(()) }).await;
        assert!(matches!(r, Err(IecsError::Cancelled)));
    }

    #[tokio::test]
    async fn until_cancelled_passes_result_through() {
        let cancel = CancellationToken::new();
        let r = until_cancelled(&cancel, async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Err::<(), _>(IecsError::remote("remote timeout"))
        })
        .await;
        assert_eq!(r.unwrap_err().to_string(), "remote timeout");
    }
}
