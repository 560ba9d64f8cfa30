use std::io::{self, Write};

use crate::color::paint;
use crate::model::SessionStart;

const RULE: &str = "──────────────────────────────────────────────────────────────────────";

pub struct BannerInfo<'a> {
    pub log_group: &'a str,
    pub streams: &'a [String],
    pub start: &'a SessionStart,
}

/// Session banner printed once the live tail is connected.
pub fn write_tail_banner(
    w: &mut dyn Write,
    info: &BannerInfo<'_>,
    use_color: bool,
) -> io::Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let value = |s: &str| paint(use_color, "\x1b[34;1m", s);

    writeln!(w)?;
    writeln!(w, "{RULE}")?;
    writeln!(w, " 📡  iecs v{version}  -  live tail")?;
    writeln!(w, "{RULE}")?;
    writeln!(w, "  log group: {}", value(info.log_group))?;
    match info.streams {
        [] => writeln!(w, "  streams:   {}", value("(all)"))?,
        [one] => writeln!(w, "  stream:    {}", value(one))?,
        many => {
            writeln!(w, "  streams:")?;
            for s in many {
                writeln!(w, "    - {}", value(s))?;
            }
        }
    }
    if let Some(id) = info.start.session_id.as_deref() {
        writeln!(w, "  session:   {}", value(id))?;
    }
    writeln!(w, "  Press Ctrl-C to stop.")?;
    writeln!(w, "{RULE}")?;
    writeln!(w)?;
    Ok(())
}
