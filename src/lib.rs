#![allow(clippy::module_name_repetitions)]
//! iecs: pick an ECS cluster, service, task and container interactively, then open a remote
//! shell in it (`exec`) or live-tail its CloudWatch logs (`logs`).

pub mod banner;
pub mod color;
pub mod commands;
pub mod config;
pub mod doctor;
pub mod errors;
pub mod exec;
pub mod form;
pub mod gateway;
pub mod logs;
pub mod model;
pub mod picker;
pub mod selector;
pub mod telemetry;
pub mod theme;
pub mod util;

pub use color::{
    color_enabled_stderr, color_enabled_stdout, log_error_stderr, log_info_stderr,
    log_warn_stderr, paint, set_color_mode, ColorMode,
};
pub use config::{FormStyle, Overrides, Settings};
pub use errors::{exit_code_for_error, IecsError, PreFlight};
pub use exec::{CommandHint, SessionBroker};
pub use gateway::{Gateway, LiveTailHandler};
pub use picker::{Picker, TerminalPicker};
pub use selector::{ExecTarget, Filters, LogTarget, Pinned, Selector};
pub use telemetry::telemetry_init;
pub use theme::ThemeName;
