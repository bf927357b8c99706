//! Tracing subscriber setup for the ksail binary.
//!
//! Configured through environment variables:
//!
//! - `KSAIL_LOG_LEVEL`: default filter when `RUST_LOG` is unset (`warn`)
//! - `KSAIL_LOG_FORMAT`: `pretty`, `compact` (default) or `json`
//! - `KSAIL_LOG_OUTPUT`: `console` (default), `file` or `both`
//! - `KSAIL_LOG_FILE`: log file path for file output (`/tmp/ksail.log`)
//!
//! Console logs are written to stderr; stdout belongs to command output.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt::MakeWriter, prelude::*, registry, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    pub file: PathBuf,
}

impl LogSettings {
    /// Read settings from the process environment. `debug` raises the default level.
    pub fn from_env(debug: bool) -> Self {
        Self::from_lookup(debug, |key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup(debug: bool, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let level = match lookup("KSAIL_LOG_LEVEL") {
            Some(level) if !level.trim().is_empty() => level,
            _ if debug => "debug".to_string(),
            _ => "warn".to_string(),
        };

        let format = match lookup("KSAIL_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            Some("pretty") => LogFormat::Pretty,
            _ => LogFormat::Compact,
        };

        let output = match lookup("KSAIL_LOG_OUTPUT").as_deref() {
            Some("file") => LogOutput::File,
            Some("both") => LogOutput::Both,
            _ => LogOutput::Console,
        };

        let file = lookup("KSAIL_LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/tmp/ksail.log"));

        Self {
            level,
            format,
            output,
            file,
        }
    }
}

// Writes every line to both sinks; used for `KSAIL_LOG_OUTPUT=both`.
struct Tee<A, B> {
    a: A,
    b: B,
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let first = self.a.write_all(buf);
        let second = self.b.write_all(buf);
        first.and(second).map(|_| buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.a.flush()?;
        self.b.flush()
    }
}

#[derive(Clone)]
struct MakeTee<A, B> {
    make_a: A,
    make_b: B,
}

impl<'a, A, B> MakeWriter<'a> for MakeTee<A, B>
where
    A: MakeWriter<'a>,
    B: MakeWriter<'a>,
{
    type Writer = Tee<A::Writer, B::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        Tee {
            a: self.make_a.make_writer(),
            b: self.make_b.make_writer(),
        }
    }
}

macro_rules! install {
    ($subscriber:expr, $writer:expr, $format:expr) => {{
        let layer = tracing_subscriber::fmt::layer().with_writer($writer);
        match $format {
            LogFormat::Json => $subscriber.with(layer.json()).try_init(),
            LogFormat::Pretty => $subscriber.with(layer.pretty()).try_init(),
            LogFormat::Compact => $subscriber.with(layer.compact()).try_init(),
        }
    }};
}

/// Install the global subscriber. The returned guard must live until exit so
/// buffered file output is flushed.
pub fn init_subscriber(settings: &LogSettings) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.level))
        .add_directive("reqwest=warn".parse().expect("static directive"))
        .add_directive("hyper=warn".parse().expect("static directive"));

    let subscriber = registry().with(env_filter);

    let log_dir = settings
        .file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("/tmp"));
    let log_name = settings
        .file
        .file_name()
        .unwrap_or_else(|| "ksail.log".as_ref());

    // A second init (tests, embedding) is not an error worth surfacing.
    match settings.output {
        LogOutput::Console => {
            let _ = install!(subscriber, io::stderr, settings.format);
            None
        }
        LogOutput::File => {
            let appender = tracing_appender::rolling::never(log_dir, log_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = install!(subscriber, writer, settings.format);
            Some(guard)
        }
        LogOutput::Both => {
            let appender = tracing_appender::rolling::never(log_dir, log_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let tee = MakeTee {
                make_a: io::stderr,
                make_b: writer,
            };
            let _ = install!(subscriber, tee, settings.format);
            Some(guard)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_quiet_console_output() {
        let settings = LogSettings::from_lookup(false, lookup(&[]));
        assert_eq!(settings.level, "warn");
        assert_eq!(settings.format, LogFormat::Compact);
        assert_eq!(settings.output, LogOutput::Console);
        assert_eq!(settings.file, PathBuf::from("/tmp/ksail.log"));
    }

    #[test]
    fn debug_flag_raises_default_level() {
        let settings = LogSettings::from_lookup(true, lookup(&[]));
        assert_eq!(settings.level, "debug");
    }

    #[test]
    fn explicit_level_wins_over_debug_flag() {
        let settings = LogSettings::from_lookup(true, lookup(&[("KSAIL_LOG_LEVEL", "trace")]));
        assert_eq!(settings.level, "trace");
    }

    #[test]
    fn reads_format_output_and_file() {
        let settings = LogSettings::from_lookup(
            false,
            lookup(&[
                ("KSAIL_LOG_FORMAT", "json"),
                ("KSAIL_LOG_OUTPUT", "both"),
                ("KSAIL_LOG_FILE", "/var/log/ksail/run.log"),
            ]),
        );
        assert_eq!(settings.format, LogFormat::Json);
        assert_eq!(settings.output, LogOutput::Both);
        assert_eq!(settings.file, PathBuf::from("/var/log/ksail/run.log"));
    }

    #[test]
    fn tee_writes_to_both_sinks() {
        let mut tee = Tee {
            a: Vec::new(),
            b: Vec::new(),
        };
        tee.write_all(b"line\n").unwrap();
        tee.flush().unwrap();
        assert_eq!(tee.a, b"line\n");
        assert_eq!(tee.b, b"line\n");
    }
}
