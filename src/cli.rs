use clap::{Args, Parser, Subcommand};

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct Narrow {
    /// Only offer clusters whose name matches this regex
    #[arg(long)]
    pub(crate) cluster: Option<String>,

    /// Only offer services whose name matches this regex
    #[arg(long)]
    pub(crate) service: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct Pin {
    /// Task id or ARN; skips the task prompt (exact match)
    #[arg(long)]
    pub(crate) task: Option<String>,

    /// Container name; skips the container prompt (exact match)
    #[arg(long)]
    pub(crate) container: Option<String>,
}

impl Pin {
    pub(crate) fn into_pinned(self) -> iecs::Pinned {
        iecs::Pinned {
            task: self.task,
            container: self.container,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Command {
    /// Open a remote shell in a running container
    #[command(alias = "ssh")]
    Exec {
        /// Command to run in the container
        #[arg(long, short = 'c', default_value = "/bin/bash")]
        command: String,

        /// Request an interactive session
        #[arg(
            long,
            short = 'i',
            default_value_t = true,
            action = clap::ArgAction::Set,
            value_name = "BOOL"
        )]
        interactive: bool,

        #[command(flatten)]
        pin: Pin,

        #[command(flatten)]
        narrow: Narrow,
    },

    /// Live-tail the logs of a service's container
    #[command(alias = "tail")]
    Logs {
        #[command(flatten)]
        pin: Pin,

        #[command(flatten)]
        narrow: Narrow,
    },

    /// Check the local environment (never contacts AWS)
    Doctor,
}

#[derive(Parser, Debug)]
#[command(
    name = "iecs",
    version,
    about = "Interactively pick an ECS container, then open a shell in it or tail its logs.",
    after_long_help = "Examples:\n  \
        iecs exec\n  \
        iecs exec --cluster '^prod' --service api --container app --command 'ls -la'\n  \
        iecs exec --cluster '^prod$' --service '^api$' --task 0123abcd --container app\n  \
        iecs logs --theme dracula\n  \
        iecs --form cascade tail --container app\n\n",
    after_help = "\n"
)]
pub(crate) struct Cli {
    /// Prompt theme: base, base16, catppuccin, charm, dracula [env: IECS_THEME]
    #[arg(long, global = true)]
    pub(crate) theme: Option<String>,

    /// Colorize output [env: IECS_COLOR]
    #[arg(long, value_enum, global = true)]
    pub(crate) color: Option<iecs::ColorMode>,

    /// Ask one question per step or use a single cascading form [env: IECS_FORM]
    #[arg(long, value_enum, global = true)]
    pub(crate) form: Option<iecs::FormStyle>,

    /// AWS region (defaults to the ambient AWS configuration)
    #[arg(long, global = true)]
    pub(crate) region: Option<String>,

    /// AWS profile (defaults to the ambient AWS configuration)
    #[arg(long, global = true)]
    pub(crate) profile: Option<String>,

    /// Verbose diagnostics on stderr
    #[arg(long, short = 'v', global = true)]
    pub(crate) verbose: bool,

    #[command(subcommand)]
    pub(crate) command: Command,
}

impl Cli {
    pub(crate) fn overrides(&self) -> iecs::Overrides {
        iecs::Overrides {
            theme: self.theme.clone(),
            color: self.color,
            form: self.form,
            region: self.region.clone(),
            profile: self.profile.clone(),
        }
    }
}
