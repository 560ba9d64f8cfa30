use std::env;
use std::io::{self, Write};

use crate::color::paint;
use crate::config::Settings;
use crate::exec::{SessionBroker, SESSION_BROKER};
use crate::util::process::probe_version;

fn ambient(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| env::var(k).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// Print a local environment report. Never talks to the orchestrator.
/// Returns whether everything `exec` and `logs` need was found.
pub fn write_doctor_report(
    w: &mut dyn Write,
    settings: &Settings,
    use_color: bool,
    verbose: bool,
) -> io::Result<bool> {
    let val = |s: &str| paint(use_color, "\x1b[34;1m", s);
    let bad = |s: &str| paint(use_color, "\x1b[31;1m", s);

    writeln!(w, "iecs doctor")?;
    writeln!(w)?;
    writeln!(w, "  version:  v{}", env!("CARGO_PKG_VERSION"))?;
    writeln!(
        w,
        "  host:     {} / {}",
        env::consts::OS,
        env::consts::ARCH
    )?;
    writeln!(w, "  gateway:  {}", val(env!("IECS_BUILD_GATEWAY")))?;
    if verbose {
        writeln!(w, "  build:    {} ({})", env!("IECS_BUILD_DATE"), env!("IECS_BUILD_PROFILE"))?;
        writeln!(w, "  target:   {}", env!("IECS_BUILD_TARGET"))?;
        writeln!(w, "  rustc:    {}", env!("IECS_BUILD_RUSTC"))?;
    }
    writeln!(w)?;

    let config = settings
        .config_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string());
    writeln!(w, "  config file:   {}", val(&config))?;
    writeln!(w, "  theme:         {}", val(settings.theme.as_str()))?;
    writeln!(w, "  color:         {}", val(&format!("{:?}", settings.color).to_lowercase()))?;
    writeln!(w, "  form:          {}", val(settings.form.as_str()))?;
    writeln!(
        w,
        "  api timeout:   {}",
        val(&humantime::format_duration(settings.api_timeout).to_string())
    )?;

    let region = settings
        .region
        .clone()
        .or_else(|| ambient(&["AWS_REGION", "AWS_DEFAULT_REGION"]));
    let profile = settings.profile.clone().or_else(|| ambient(&["AWS_PROFILE"]));
    writeln!(
        w,
        "  region:        {}",
        val(region.as_deref().unwrap_or("(from AWS config)"))
    )?;
    writeln!(
        w,
        "  profile:       {}",
        val(profile.as_deref().unwrap_or("(default)"))
    )?;
    writeln!(w)?;

    let healthy = match SessionBroker::discover(settings.session_manager_plugin.as_deref()) {
        Ok(broker) => {
            writeln!(w, "  {SESSION_BROKER}: {}", val(&broker.path().display().to_string()))?;
            match probe_version(broker.path()) {
                Ok(v) => writeln!(w, "  {SESSION_BROKER} --version: {}", val(&v))?,
                Err(e) => writeln!(
                    w,
                    "  {SESSION_BROKER} --version: {}",
                    bad(&format!("failed ({e})"))
                )?,
            }
            true
        }
        Err(e) => {
            writeln!(w, "  {SESSION_BROKER}: {}", bad(&format!("not found ({e})")))?;
            if verbose {
                writeln!(
                    w,
                    "    tip: `iecs exec` needs it; set IECS_SESSION_MANAGER_PLUGIN to use a binary outside PATH."
                )?;
            }
            false
        }
    };
    writeln!(w)?;
    Ok(healthy)
}
