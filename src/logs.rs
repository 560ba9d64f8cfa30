//! Live tail of a container's log streams.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::{DateTime, Local};
use tokio_util::sync::CancellationToken;

use crate::banner::{write_tail_banner, BannerInfo};
use crate::errors::IecsError;
use crate::gateway::{Gateway, LiveTailHandler};
use crate::model::{ContainerDefinition, LogEvent, SessionStart, Task};
use crate::selector::LogTarget;

pub const AWSLOGS_DRIVER: &str = "awslogs";

const GROUP_KEYS: [&str; 2] = ["awslogs-group", "log-group"];
const PREFIX_KEYS: [&str; 2] = ["awslogs-stream-prefix", "stream-prefix"];

/// Where a container definition sends its logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSource {
    pub group: String,
    pub stream_prefix: String,
}

fn option<'o>(
    options: &'o BTreeMap<String, String>,
    keys: &[&str],
) -> Option<&'o str> {
    keys.iter()
        .filter_map(|k| options.get(*k))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

pub fn log_source(def: &ContainerDefinition) -> Result<LogSource, IecsError> {
    let config = def.log_configuration.as_ref().ok_or_else(|| {
        IecsError::not_found(format!("no log configuration found for container {}", def.name))
    })?;
    let options = config
        .options
        .as_ref()
        .filter(|o| !o.is_empty())
        .ok_or_else(|| {
            IecsError::not_found(format!("no log options found for container {}", def.name))
        })?;
    if config.driver != AWSLOGS_DRIVER {
        return Err(IecsError::invalid(format!(
            "unsupported log driver \"{}\"",
            config.driver
        )));
    }
    let missing = |key: &str| {
        IecsError::not_found(format!(
            "no log options found for container {}: missing {key}",
            def.name
        ))
    };
    let group = option(options, &GROUP_KEYS).ok_or_else(|| missing(GROUP_KEYS[0]))?;
    let stream_prefix = option(options, &PREFIX_KEYS).ok_or_else(|| missing(PREFIX_KEYS[0]))?;
    Ok(LogSource {
        group: group.to_string(),
        stream_prefix: stream_prefix.to_string(),
    })
}

/// `<prefix>/<container>/<task-id>` for every task.
pub fn stream_names(source: &LogSource, container: &str, tasks: &[Task]) -> Vec<String> {
    tasks
        .iter()
        .map(|t| format!("{}/{}/{}", source.stream_prefix, container, t.id()))
        .collect()
}

/// Milliseconds since the epoch as a local-time RFC 3339 timestamp.
pub fn format_timestamp(ms: i64) -> String {
    match DateTime::from_timestamp_millis(ms) {
        Some(utc) => utc
            .with_timezone(&Local)
            .format("%Y-%m-%dT%H:%M:%S%.3f%:z")
            .to_string(),
        None => ms.to_string(),
    }
}

/// Prints `<timestamp>\t<message>` lines to `out` and the session banner to `banner`.
pub struct TailPrinter<W: Write, B: Write> {
    out: W,
    banner: B,
    log_group: String,
    streams: Vec<String>,
    use_color: bool,
}

impl<W: Write, B: Write> TailPrinter<W, B> {
    pub fn new(out: W, banner: B, log_group: String, streams: Vec<String>) -> Self {
        TailPrinter {
            out,
            banner,
            log_group,
            streams,
            use_color: false,
        }
    }

    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }
}

impl<W: Write, B: Write> LiveTailHandler for TailPrinter<W, B> {
    fn on_start(&mut self, start: &SessionStart) -> Result<(), IecsError> {
        let info = BannerInfo {
            log_group: &self.log_group,
            streams: &self.streams,
            start,
        };
        write_tail_banner(&mut self.banner, &info, self.use_color)?;
        self.banner.flush()?;
        Ok(())
    }

    fn on_batch(&mut self, event: &LogEvent) -> Result<(), IecsError> {
        writeln!(
            self.out,
            "{}\t{}",
            format_timestamp(event.timestamp_ms),
            event.message
        )?;
        self.out.flush()?;
        Ok(())
    }
}

/// Tail the target's container logs until cancellation (success) or a stream failure.
pub async fn run_logs<W, B>(
    gateway: &dyn Gateway,
    target: &LogTarget,
    out: W,
    banner: B,
    use_color: bool,
    cancel: &CancellationToken,
) -> Result<(), IecsError>
where
    W: Write + Send,
    B: Write + Send,
{
    let def = &target.container_definition;
    let source = log_source(def)?;
    let streams = stream_names(&source, &def.name, &target.tasks);
    tracing::info!(log_group = %source.group, streams = ?streams, "starting live tail");
    let mut printer =
        TailPrinter::new(out, banner, source.group.clone(), streams.clone()).with_color(use_color);
    gateway
        .start_live_tail(&source.group, &streams, &mut printer, cancel)
        .await
}
