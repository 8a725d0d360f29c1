//! Terminal logging for builds and the dev server.
use colored::{ColoredString, Colorize};
use env_logger::{Builder, Env};
use log::info;
use std::io::Write;
use std::time::Duration;

pub struct FormatElapsedTimeOptions<'a> {
    pub sec_yellow_threshold: u64,
    pub sec_red_threshold: u64,
    pub millis_yellow_threshold: Option<u128>,
    pub millis_red_threshold: Option<u128>,
    pub additional_fn: Option<&'a (dyn Fn(ColoredString) -> ColoredString + Sync)>,
}

impl Default for FormatElapsedTimeOptions<'_> {
    fn default() -> Self {
        Self {
            sec_yellow_threshold: 1,
            sec_red_threshold: 2,
            millis_yellow_threshold: Some(100),
            millis_red_threshold: Some(500),
            additional_fn: None,
        }
    }
}

impl FormatElapsedTimeOptions<'_> {
    /// Thresholds for whole build sections, which are expected to take longer than a single page.
    pub fn section() -> Self {
        Self {
            sec_red_threshold: 5,
            sec_yellow_threshold: 1,
            millis_red_threshold: None,
            millis_yellow_threshold: None,
            ..Default::default()
        }
    }
}

/// Installs the global logger. `RUST_LOG` overrides the default `info` level.
///
/// Records logged with the `SKIP_FORMAT` target are printed verbatim, and passing `--quiet`
/// on the command line silences everything.
pub fn init_logging() {
    let logging_env = Env::default().filter_or("RUST_LOG", "info");
    let _ = Builder::from_env(logging_env)
        .format(|buf, record| {
            if std::env::args().any(|arg| arg == "--quiet") {
                return Ok(());
            }

            if record.target() == "SKIP_FORMAT" {
                return writeln!(buf, "{}", record.args());
            }

            let target = record.target().to_ascii_lowercase();
            let target = match record.level() {
                log::Level::Error => target.bold().bright_red(),
                log::Level::Warn => target.bold().yellow(),
                _ => target.bold().bright_yellow(),
            };

            writeln!(
                buf,
                "{} {} {}",
                chrono::Local::now().format("%H:%M:%S").to_string().dimmed(),
                target,
                record.args()
            )
        })
        .try_init();
}

pub fn format_elapsed_time(elapsed: Duration, options: &FormatElapsedTimeOptions) -> ColoredString {
    let result = match elapsed.as_secs() {
        secs if secs > 60 => format!("{}m{}s", secs / 60, secs % 60).red(),
        secs if secs > options.sec_red_threshold => format!("{}s", secs).red(),
        secs if secs > options.sec_yellow_threshold => format!("{}s", secs).yellow(),
        secs if secs > 0 => format!("{}s", secs).normal(),
        _ => match elapsed.as_millis() {
            millis
                if options
                    .millis_red_threshold
                    .is_some_and(|threshold| millis > threshold) =>
            {
                format!("{}ms", millis).red()
            }
            millis
                if options
                    .millis_yellow_threshold
                    .is_some_and(|threshold| millis > threshold) =>
            {
                format!("{}ms", millis).yellow()
            }
            millis if millis > 0 => format!("{}ms", millis).normal(),
            _ => format!("{}μs", elapsed.as_micros()).normal(),
        },
    };

    if let Some(additional_fn) = &options.additional_fn {
        additional_fn(result)
    } else {
        result
    }
}

pub fn print_title(title: &str) {
    info!(target: "SKIP_FORMAT", "{}", "");
    info!(target: "SKIP_FORMAT", "{}", format!(" {} ", title).on_green().bold());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed_time_units() {
        colored::control::set_override(false);
        let options = FormatElapsedTimeOptions::default();

        assert_eq!(
            format_elapsed_time(Duration::from_micros(250), &options).to_string(),
            "250μs"
        );
        assert_eq!(
            format_elapsed_time(Duration::from_millis(42), &options).to_string(),
            "42ms"
        );
        assert_eq!(
            format_elapsed_time(Duration::from_secs(3), &options).to_string(),
            "3s"
        );
        assert_eq!(
            format_elapsed_time(Duration::from_secs(125), &options).to_string(),
            "2m5s"
        );
    }

    #[test]
    fn test_format_elapsed_time_additional_fn() {
        colored::control::set_override(false);
        let wrap = |msg: ColoredString| format!("(+{})", msg).normal();
        let options = FormatElapsedTimeOptions {
            additional_fn: Some(&wrap),
            ..Default::default()
        };

        assert_eq!(
            format_elapsed_time(Duration::from_millis(7), &options).to_string(),
            "(+7ms)"
        );
    }
}
