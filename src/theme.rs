//! Prompt themes shared by every form rendered in one invocation.

use std::fmt;

use dialoguer::console::{style, Style};
use dialoguer::theme::{ColorfulTheme, SimpleTheme, Theme};

use crate::errors::IecsError;

pub const DEFAULT_THEME: &str = "charm";

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ThemeName {
    Base,
    Base16,
    Catppuccin,
    Charm,
    Dracula,
}

// Sorted by name; the order is part of the "unsupported theme" message.
const ALL: [ThemeName; 5] = [
    ThemeName::Base,
    ThemeName::Base16,
    ThemeName::Catppuccin,
    ThemeName::Charm,
    ThemeName::Dracula,
];

/// 256-color palette indices: (title, accent, cursor).
struct Palette(u8, u8, u8);

impl ThemeName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeName::Base => "base",
            ThemeName::Base16 => "base16",
            ThemeName::Catppuccin => "catppuccin",
            ThemeName::Charm => "charm",
            ThemeName::Dracula => "dracula",
        }
    }

    pub fn all() -> &'static [ThemeName] {
        &ALL
    }

    /// Resolve a theme by name. Runs before any orchestrator call.
    pub fn from_name(name: &str) -> Result<Self, IecsError> {
        ALL.iter()
            .copied()
            .find(|t| t.as_str() == name)
            .ok_or_else(|| {
                let names: Vec<&str> = ALL.iter().map(|t| t.as_str()).collect();
                IecsError::invalid(format!(
                    "unsupported theme \"{}\" expecting one of: {}",
                    name,
                    names.join(" ")
                ))
            })
    }

    fn palette(&self) -> Option<Palette> {
        match self {
            ThemeName::Base => None,
            ThemeName::Base16 => Some(Palette(6, 3, 2)),
            ThemeName::Catppuccin => Some(Palette(183, 117, 218)),
            ThemeName::Charm => Some(Palette(212, 99, 212)),
            ThemeName::Dracula => Some(Palette(141, 84, 212)),
        }
    }

    /// ANSI sequence for the bold title of "Selected X:" lines.
    pub fn title_code(&self) -> String {
        match self.palette() {
            Some(Palette(title, _, _)) => format!("\x1b[1;38;5;{title}m"),
            None => "\x1b[1m".to_string(),
        }
    }

    pub fn dialoguer_theme(&self) -> Box<dyn Theme> {
        let Some(Palette(title, accent, cursor)) = self.palette() else {
            return Box::new(SimpleTheme);
        };
        Box::new(ColorfulTheme {
            prompt_style: Style::new().for_stderr().bold().color256(title),
            values_style: Style::new().for_stderr().color256(accent),
            active_item_style: Style::new().for_stderr().color256(cursor),
            active_item_prefix: style("❯".to_string()).for_stderr().color256(cursor),
            success_prefix: style("✔".to_string()).for_stderr().color256(accent),
            ..ColorfulTheme::default()
        })
    }
}

impl fmt::Display for ThemeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
