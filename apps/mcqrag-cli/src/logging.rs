use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use mcqrag_core::config::{expand_path, LoggingSettings};

/// Human-readable events on stderr, plus JSON lines in `logging.file` when set.
///
/// `RUST_LOG` wins over `logging.filter`.
pub fn init(settings: &LoggingSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&settings.filter))?;
    let stderr = fmt::layer().with_writer(std::io::stderr).with_target(false);
    let file = match &settings.file {
        Some(path) => Some(fmt::layer().json().with_writer(Mutex::new(open_log_file(&expand_path(path))?))),
        None => None,
    };
    tracing_subscriber::registry().with(filter).with(stderr).with(file).try_init()?;
    Ok(())
}

fn open_log_file(path: &Path) -> anyhow::Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}
