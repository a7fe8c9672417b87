use crate::config::LoggingSettings;
use crate::error::{other_error, BotResult};
use chrono::{DateTime, Local, NaiveDate};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Name of the active log file inside the log directory
pub const LOG_FILE_NAME: &str = "vocard.log";

const DEFAULT_DIRECTIVES: &str = "info,serenity=warn,poise=warn";
const ARCHIVE_PREFIX: &str = "vocard.";
const ARCHIVE_SUFFIX: &str = ".log";

/// Build filter directives from the per-target level map.
///
/// Targets from the map are appended to the defaults, so they win over them.
pub fn filter_directives(levels: &BTreeMap<String, String>) -> String {
    let mut directives = DEFAULT_DIRECTIVES.to_string();
    for (target, level) in levels {
        directives.push(',');
        directives.push_str(target);
        directives.push('=');
        directives.push_str(&level.to_lowercase());
    }
    directives
}

/// Initialize logging to stdout and, when enabled, to `<path>/vocard.log`.
///
/// `RUST_LOG` overrides the configured levels.
pub fn init_logging(settings: &LoggingSettings) -> BotResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directives(&settings.level)))
        .map_err(|e| other_error(&format!("Invalid logging level: {}", e)))?;

    let file_layer = if settings.file.enable {
        let file = DailyLogFile::open(&settings.file.path, settings.max_history)?;
        Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| other_error(&format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

type Clock = Box<dyn Fn() -> NaiveDate + Send>;

/// `vocard.log` writer that rotates when the local date changes.
///
/// On the first write of a new day the active file is renamed to the archive
/// of the day it was opened on, old archives are pruned down to
/// `max_history`, and a fresh `vocard.log` is started.
pub struct DailyLogFile {
    dir: PathBuf,
    max_history: usize,
    date: NaiveDate,
    file: Option<File>,
    today: Clock,
}

impl DailyLogFile {
    pub fn open(dir: impl Into<PathBuf>, max_history: usize) -> BotResult<Self> {
        Self::with_clock(dir, max_history, Box::new(|| Local::now().date_naive()))
    }

    pub fn with_clock(dir: impl Into<PathBuf>, max_history: usize, today: Clock) -> BotResult<Self> {
        let dir = dir.into();
        let date = today();
        let path = prepare_log_dir(&dir, date, max_history)?;
        let file = open_append(&path)?;
        Ok(Self {
            dir,
            max_history,
            date,
            file: Some(file),
            today,
        })
    }

    fn rotate(&mut self, today: NaiveDate) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        let current = self.dir.join(LOG_FILE_NAME);
        if current.exists() {
            fs::rename(&current, self.dir.join(archive_name(self.date)))?;
        }
        self.date = today;
        prune_archives(&self.dir, self.max_history)
            .map_err(|e| io::Error::other(e.to_string()))?;
        Ok(())
    }

    fn active(&mut self) -> io::Result<&mut File> {
        let file = match self.file.take() {
            Some(file) => file,
            None => open_append(&self.dir.join(LOG_FILE_NAME))?,
        };
        Ok(self.file.insert(file))
    }
}

impl Write for DailyLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let today = (self.today)();
        if today > self.date {
            self.rotate(today)?;
        }
        self.active()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Make sure the log directory exists and rotate the previous day's log.
///
/// A log file last written before `today` is renamed to
/// `vocard.YYYY-MM-DD.log`, then only the `max_history` newest archives are
/// kept. Returns the path of the active log file.
pub fn prepare_log_dir(dir: &Path, today: NaiveDate, max_history: usize) -> BotResult<PathBuf> {
    fs::create_dir_all(dir)?;

    let current = dir.join(LOG_FILE_NAME);
    if let Some(written) = last_written(&current)? {
        if written < today {
            fs::rename(&current, dir.join(archive_name(written)))?;
        }
    }

    prune_archives(dir, max_history)?;
    Ok(current)
}

/// File name of the archive holding the log of `date`
pub fn archive_name(date: NaiveDate) -> String {
    format!(
        "{}{}{}",
        ARCHIVE_PREFIX,
        date.format("%Y-%m-%d"),
        ARCHIVE_SUFFIX
    )
}

fn archive_date(file_name: &str) -> Option<NaiveDate> {
    let date = file_name
        .strip_prefix(ARCHIVE_PREFIX)?
        .strip_suffix(ARCHIVE_SUFFIX)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn last_written(path: &Path) -> BotResult<Option<NaiveDate>> {
    match fs::metadata(path) {
        Ok(metadata) => {
            let modified: DateTime<Local> = metadata.modified()?.into();
            Ok(Some(modified.date_naive()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Delete all but the `keep` newest archives, returning how many were removed
pub fn prune_archives(dir: &Path, keep: usize) -> BotResult<usize> {
    let mut archives = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(date) = entry.file_name().to_str().and_then(archive_date) {
            archives.push((date, entry.path()));
        }
    }

    // Newest first
    archives.sort_by(|a, b| b.0.cmp(&a.0));

    let mut removed = 0;
    for (_, path) in archives.into_iter().skip(keep) {
        fs::remove_file(path)?;
        removed += 1;
    }
    Ok(removed)
}
