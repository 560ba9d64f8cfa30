use std::ops::{Deref, DerefMut};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::color::{color_enabled_stderr, log_info_stderr};
use crate::errors::IecsError;
use crate::gateway::LiveTailHandler;
use crate::model::{LogEvent, SessionStart};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailEvent {
    SessionStart(SessionStart),
    /// One server batch, in server order.
    SessionUpdate(Vec<LogEvent>),
    /// Anything else the server pushed; carries a type name for the error message.
    Unknown(String),
}

/// Client side of a server-push live-tail stream.
#[async_trait]
pub trait TailStream: Send {
    /// `Ok(None)` once the server ended the stream without an error.
    async fn next_event(&mut self) -> Result<Option<TailEvent>, IecsError>;

    /// Release the stream. Must be safe to call more than once.
    fn close(&mut self);
}

struct CloseOnDrop<'a, S: TailStream + ?Sized>(&'a mut S);

impl<S: TailStream + ?Sized> Deref for CloseOnDrop<'_, S> {
    type Target = S;
    fn deref(&self) -> &S {
        self.0
    }
}

impl<S: TailStream + ?Sized> DerefMut for CloseOnDrop<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.0
    }
}

impl<S: TailStream + ?Sized> Drop for CloseOnDrop<'_, S> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Dispatch events from `stream` to `handler` until cancellation or a terminal event.
///
/// Cancellation is the one recovered outcome: the stream is closed, a notice is printed and
/// `Ok(())` returned. A cleanly ended stream is `StreamClosed`; an unrecognised event is
/// `UnknownEvent`; stream errors and handler errors propagate as they are.
pub async fn pump<S>(
    stream: &mut S,
    handler: &mut (dyn LiveTailHandler + Send),
    cancel: &CancellationToken,
) -> Result<(), IecsError>
where
    S: TailStream + ?Sized,
{
    let mut stream = CloseOnDrop(stream);
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            ev = stream.next_event() => Some(ev?),
        };
        let Some(next) = next else {
            drop(stream);
            log_info_stderr(color_enabled_stderr(), "live tail cancelled, stream closed");
            return Ok(());
        };
        match next {
            Some(TailEvent::SessionStart(start)) => {
                tracing::debug!(session_id = ?start.session_id, "live tail session started");
                handler.on_start(&start)?;
            }
            Some(TailEvent::SessionUpdate(events)) => {
                for event in &events {
                    handler.on_batch(event)?;
                }
            }
            Some(TailEvent::Unknown(kind)) => return Err(IecsError::UnknownEvent(kind)),
            None => return Err(IecsError::StreamClosed),
        }
    }
}
