//! Command flows shared by the binary and the integration tests.
//!
//! The binary does the pre-flight work (settings, theme, session broker lookup), connects
//! the gateway and then hands an [`Invocation`] to one of these flows.

use std::io::Write;

use tokio_util::sync::CancellationToken;

use crate::config::FormStyle;
use crate::errors::IecsError;
use crate::exec::{run_exec, CommandHint, SessionBroker};
use crate::gateway::Gateway;
use crate::logs::run_logs;
use crate::picker::Picker;
use crate::selector::{Filters, Pinned, Selector};

/// Everything a command needs for one run.
pub struct Invocation<'a> {
    pub gateway: &'a dyn Gateway,
    pub picker: &'a dyn Picker,
    pub cancel: &'a CancellationToken,
    /// Receives "Selected X:" confirmations and hints.
    pub out: Box<dyn Write + Send + 'a>,
    pub title_code: Option<String>,
    pub form: FormStyle,
}

impl<'a> Invocation<'a> {
    fn into_selector(
        self,
        filters: Filters,
    ) -> (Selector<'a>, &'a dyn Gateway, &'a CancellationToken, FormStyle) {
        let selector = Selector::new(self.gateway, self.picker, self.cancel, self.out)
            .with_filters(filters)
            .with_title_code(self.title_code);
        (selector, self.gateway, self.cancel, self.form)
    }
}

#[derive(Debug, Clone)]
pub struct ExecArgs {
    pub command: String,
    pub interactive: bool,
    pub pinned: Pinned,
    pub filters: Filters,
}

#[derive(Debug, Clone, Default)]
pub struct LogsArgs {
    pub pinned: Pinned,
    pub filters: Filters,
}

/// Select a container and open a remote shell in it. Returns the broker's exit code.
pub async fn exec_command(
    inv: Invocation<'_>,
    broker: &SessionBroker,
    args: &ExecArgs,
) -> Result<i32, IecsError> {
    let (mut selector, gateway, cancel, form) = inv.into_selector(args.filters.clone());
    let target = selector.exec_target(form, &args.pinned).await?;
    let hint = CommandHint::new(&target, &args.command, args.interactive);
    selector.note(&hint.to_string())?;
    drop(selector);
    run_exec(gateway, broker, &target, &args.command, args.interactive, cancel).await
}

/// Select a container definition and tasks, then tail their logs to `out`.
pub async fn logs_command<W, B>(
    inv: Invocation<'_>,
    args: &LogsArgs,
    out: W,
    banner: B,
    use_color: bool,
) -> Result<(), IecsError>
where
    W: Write + Send,
    B: Write + Send,
{
    let (mut selector, gateway, cancel, form) = inv.into_selector(args.filters.clone());
    let target = selector.log_target(form, &args.pinned).await?;
    drop(selector);
    run_logs(gateway, &target, out, banner, use_color, cancel).await
}
