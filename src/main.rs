use std::{
    fmt::{self, Display},
    io::{self, Write},
    path::PathBuf,
};

use netlog_ranges::{cache_entry::CacheEntry, netlog::NetLog};

const USAGE: &str = "usage: netlog-ranges <net-log.json> [--key KEY] [--json]";

#[derive(Debug, PartialEq, Eq)]
enum UsageError {
    MissingLogPath,
    MissingValue(&'static str),
    UnknownArgument(String),
}

impl Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageError::MissingLogPath => write!(f, "missing net-log path"),
            UsageError::MissingValue(flag) => write!(f, "{flag} expects a value"),
            UsageError::UnknownArgument(arg) => write!(f, "unknown argument {arg:?}"),
        }
    }
}

impl std::error::Error for UsageError {}

#[derive(Debug, PartialEq, Eq)]
struct Settings {
    log_path: PathBuf,
    /// Only report this cache key.
    key: Option<String>,
    json: bool,
}

impl Settings {
    fn from_args(args: impl IntoIterator<Item = String>) -> Result<Self, UsageError> {
        let mut log_path = None;
        let mut key = None;
        let mut json = false;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--key" => key = Some(args.next().ok_or(UsageError::MissingValue("--key"))?),
                "--json" => json = true,
                flag if flag.starts_with("--") => return Err(UsageError::UnknownArgument(arg)),
                _ if log_path.is_none() => log_path = Some(PathBuf::from(arg)),
                _ => return Err(UsageError::UnknownArgument(arg)),
            }
        }

        Ok(Settings {
            log_path: log_path.ok_or(UsageError::MissingLogPath)?,
            key,
            json,
        })
    }
}

/// Writes the summaries, logging any failure before handing it back.
fn run(settings: &Settings, out: &mut impl Write) -> Result<(), Box<dyn std::error::Error>> {
    summarize(settings, out).inspect_err(|e| log::error!("{e}"))
}

fn summarize(
    settings: &Settings,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let entries = NetLog::load(&settings.log_path)?.entries()?;

    let selected: Vec<&CacheEntry> = entries
        .values()
        .filter(|entry| settings.key.as_ref().is_none_or(|key| &entry.key == key))
        .collect();

    if let Some(key) = &settings.key
        && selected.is_empty()
    {
        log::warn!("No events for cache key {key:?}");
    }

    if settings.json {
        serde_json::to_writer_pretty(&mut *out, &selected)?;
        writeln!(out)?;
    } else {
        for entry in selected {
            writeln!(out, "{entry}")?;
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let settings = match Settings::from_args(std::env::args().skip(1)) {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("{e}");
            eprintln!("{USAGE}");
            return Err(e.into());
        }
    };

    log::info!("Summarizing {}", settings.log_path.display());
    run(&settings, &mut io::stdout().lock())
}
