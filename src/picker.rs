//! Operator choice prompts.
//!
//! Callers go through [`pick_one`] / [`pick_many`], which own the single-candidate fast
//! path: a list of exactly one never reaches the [`Picker`].

use async_trait::async_trait;
use dialoguer::{MultiSelect, Select};
use tokio_util::sync::CancellationToken;

use crate::errors::IecsError;
use crate::theme::ThemeName;

#[async_trait]
pub trait Picker: Send + Sync {
    /// Index of exactly one of `options` (two or more), or `Cancelled`.
    async fn prompt_one(
        &self,
        title: &str,
        options: &[String],
        cancel: &CancellationToken,
    ) -> Result<usize, IecsError>;

    /// Indices of one or more of `options` (two or more), or `Cancelled`.
    async fn prompt_many(
        &self,
        title: &str,
        options: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<usize>, IecsError>;
}

pub async fn pick_one(
    picker: &dyn Picker,
    title: &str,
    options: &[String],
    cancel: &CancellationToken,
) -> Result<usize, IecsError> {
    match options.len() {
        0 => Err(IecsError::not_found(format!("nothing to choose for {title}"))),
        1 => Ok(0),
        _ => picker.prompt_one(title, options, cancel).await,
    }
}

pub async fn pick_many(
    picker: &dyn Picker,
    title: &str,
    options: &[String],
    cancel: &CancellationToken,
) -> Result<Vec<usize>, IecsError> {
    match options.len() {
        0 => Err(IecsError::not_found(format!("nothing to choose for {title}"))),
        1 => Ok(vec![0]),
        _ => {
            let picked = picker.prompt_many(title, options, cancel).await?;
            // An empty submission is treated as backing out.
            if picked.is_empty() {
                return Err(IecsError::Cancelled);
            }
            Ok(picked)
        }
    }
}

/// dialoguer prompts on stderr, run on a blocking thread so cancellation can win the race.
pub struct TerminalPicker {
    theme: ThemeName,
}

impl TerminalPicker {
    pub fn new(theme: ThemeName) -> Self {
        TerminalPicker { theme }
    }

    fn ensure_terminal(title: &str) -> Result<(), IecsError> {
        if atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stderr) {
            return Ok(());
        }
        Err(IecsError::invalid(format!(
            "cannot prompt for {title}: not a terminal (narrow the choice with --cluster/--service)"
        )))
    }
}

fn map_prompt<T>(r: Result<Option<T>, dialoguer::Error>) -> Result<T, IecsError> {
    match r {
        Ok(Some(v)) => Ok(v),
        Ok(None) => Err(IecsError::Cancelled),
        Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::Interrupted => {
            Err(IecsError::Cancelled)
        }
        Err(dialoguer::Error::IO(e)) => Err(IecsError::Io(e)),
    }
}

async fn run_blocking<T, F>(cancel: &CancellationToken, f: F) -> Result<T, IecsError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<Option<T>, dialoguer::Error> + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(f);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(IecsError::Cancelled),
        joined = handle => match joined {
            Ok(r) => map_prompt(r),
            Err(e) => Err(IecsError::Io(std::io::Error::other(e))),
        },
    }
}

#[async_trait]
impl Picker for TerminalPicker {
    async fn prompt_one(
        &self,
        title: &str,
        options: &[String],
        cancel: &CancellationToken,
    ) -> Result<usize, IecsError> {
        Self::ensure_terminal(title)?;
        let theme = self.theme;
        let prompt = format!("Select {title}");
        let items = options.to_vec();
        run_blocking(cancel, move || {
            let t = theme.dialoguer_theme();
            Select::with_theme(t.as_ref())
                .with_prompt(prompt)
                .items(&items)
                .default(0)
                .interact_opt()
        })
        .await
    }

    async fn prompt_many(
        &self,
        title: &str,
        options: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<usize>, IecsError> {
        Self::ensure_terminal(title)?;
        let theme = self.theme;
        let prompt = format!("Select {title} (space to toggle)");
        let items = options.to_vec();
        run_blocking(cancel, move || {
            let t = theme.dialoguer_theme();
            MultiSelect::with_theme(t.as_ref())
                .with_prompt(prompt)
                .items(&items)
                .interact_opt()
        })
        .await
    }
}
