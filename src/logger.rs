use chrono::Local;
use colored::*;
use env_logger::{Builder, Env};
use log::{Level, LevelFilter};
use std::io::Write;

/// Initialises the global logger on stderr, leaving stdout to command output.
///
/// `RUST_LOG` is honoured unless `-v`/`-q` were given on the command line.
pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    if let Some(level) = level_override(verbose, quiet) {
        builder.filter_level(level);
    }
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} {} {}",
            Local::now().format("%H:%M:%S").to_string().dimmed(),
            level_tag(record.level()),
            record.args()
        )
    });
    // A logger may already be installed (tests, embedding); keep it.
    let _ = builder.try_init();
}

fn level_override(verbose: u8, quiet: bool) -> Option<LevelFilter> {
    match (quiet, verbose) {
        (true, _) => Some(LevelFilter::Error),
        (false, 0) => None,
        (false, 1) => Some(LevelFilter::Debug),
        (false, _) => Some(LevelFilter::Trace),
    }
}

fn level_tag(level: Level) -> ColoredString {
    match level {
        Level::Error => "ERROR".red().bold(),
        Level::Warn => "WARN ".yellow().bold(),
        Level::Info => "INFO ".green(),
        Level::Debug => "DEBUG".blue(),
        Level::Trace => "TRACE".dimmed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_override() {
        assert_eq!(level_override(0, false), None);
        assert_eq!(level_override(1, false), Some(LevelFilter::Debug));
        assert_eq!(level_override(3, false), Some(LevelFilter::Trace));
        assert_eq!(level_override(2, true), Some(LevelFilter::Error));
    }

    #[test]
    fn test_level_tags_name_the_level() {
        for level in [Level::Error, Level::Warn, Level::Info, Level::Debug, Level::Trace] {
            assert!(level_tag(level).to_string().contains(level.as_str()));
        }
    }
}
