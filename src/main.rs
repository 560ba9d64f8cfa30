use std::io;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use iecs::commands::{exec_command, logs_command, ExecArgs, Invocation, LogsArgs};
use iecs::doctor::write_doctor_report;
use iecs::{
    color_enabled_stderr, color_enabled_stdout, exit_code_for_error, log_error_stderr,
    set_color_mode, telemetry_init, Filters, IecsError, SessionBroker, Settings, TerminalPicker,
};
use tokio_util::sync::CancellationToken;

mod cli;

use cli::{Cli, Command, Narrow};

// A prompt thread blocked on the terminal must not keep the process alive.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

fn filters(narrow: &Narrow) -> Result<Filters, IecsError> {
    Filters::new(narrow.cluster.as_deref(), narrow.service.as_deref())
}

/// Cancel `token` on the first Ctrl-C.
fn watch_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            r = tokio::signal::ctrl_c() => {
                if r.is_ok() {
                    tracing::debug!("interrupt received; cancelling");
                    token.cancel();
                }
            }
            _ = token.cancelled() => {}
        }
    });
}

async fn run(cli: Cli, settings: Settings) -> Result<u8, IecsError> {
    let use_out = color_enabled_stdout();
    let use_err = color_enabled_stderr();

    match cli.command {
        Command::Doctor => {
            let mut stderr = io::stderr();
            let healthy = write_doctor_report(&mut stderr, &settings, use_err, cli.verbose)?;
            Ok(if healthy { 0 } else { 1 })
        }
        Command::Exec {
            command,
            interactive,
            pin,
            narrow,
        } => {
            let args = ExecArgs {
                command,
                interactive,
                pinned: pin.into_pinned(),
                filters: filters(&narrow)?,
            };
            // Refuse before any orchestrator call when the broker is missing.
            let broker = SessionBroker::discover(settings.session_manager_plugin.as_deref())?;
            tracing::debug!(broker = %broker.path().display(), "session broker found");

            let gateway = iecs::gateway::connect(&settings).await?;
            let picker = TerminalPicker::new(settings.theme);
            let cancel = CancellationToken::new();
            watch_interrupt(cancel.clone());

            let inv = Invocation {
                gateway: gateway.as_ref(),
                picker: &picker,
                cancel: &cancel,
                out: Box::new(io::stdout()),
                title_code: use_out.then(|| settings.theme.title_code()),
                form: settings.form,
            };
            let code = exec_command(inv, &broker, &args).await?;
            cancel.cancel();
            Ok((code & 0xff) as u8)
        }
        Command::Logs { pin, narrow } => {
            let args = LogsArgs {
                pinned: pin.into_pinned(),
                filters: filters(&narrow)?,
            };
            let gateway = iecs::gateway::connect(&settings).await?;
            let picker = TerminalPicker::new(settings.theme);
            let cancel = CancellationToken::new();
            watch_interrupt(cancel.clone());

            // stdout carries only log lines; everything else goes to stderr.
            let inv = Invocation {
                gateway: gateway.as_ref(),
                picker: &picker,
                cancel: &cancel,
                out: Box::new(io::stderr()),
                title_code: use_err.then(|| settings.theme.title_code()),
                form: settings.form,
            };
            logs_command(inv, &args, io::stdout(), io::stderr(), use_err).await?;
            cancel.cancel();
            Ok(0)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.overrides()) {
        Ok(s) => s,
        Err(e) => {
            log_error_stderr(color_enabled_stderr(), &format!("iecs: {e}"));
            return ExitCode::from(exit_code_for_error(&e));
        }
    };
    set_color_mode(settings.color);
    let use_err = color_enabled_stderr();
    telemetry_init(cli.verbose, use_err);
    tracing::debug!(
        theme = settings.theme.as_str(),
        form = settings.form.as_str(),
        region = ?settings.region,
        profile = ?settings.profile,
        "settings resolved"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log_error_stderr(use_err, &format!("iecs: failed to start async runtime: {e}"));
            return ExitCode::from(1);
        }
    };
    let result = runtime.block_on(run(cli, settings));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            if !e.is_cancelled() {
                log_error_stderr(use_err, &format!("iecs: {e}"));
            } else {
                log_error_stderr(use_err, "iecs: cancelled");
            }
            ExitCode::from(exit_code_for_error(&e))
        }
    }
}
