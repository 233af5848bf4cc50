//! Helpers shared across CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use nxlsync::format::{format_rate, format_size};
use nxlsync::settings::SettingsResult;
use nxlsync::{
    LogSink, ManifestSource, ReqwestClient, Settings, SettingsProvider, SettingsStore,
    SyncProgress, SyncReport, UpdateOutcome, Updater,
};

use crate::error::CliError;

/// Open the settings file given on the command line, or the default one.
pub fn open_settings(path: Option<&Path>) -> Result<SettingsStore, CliError> {
    let store = match path {
        Some(path) => SettingsStore::open(path)?,
        None => SettingsStore::open_default()?,
    };
    Ok(store)
}

/// Settings provider whose install directory can be overridden per run
/// without touching the settings file.
pub struct RunSettings {
    store: Arc<SettingsStore>,
    install_dir: Option<PathBuf>,
}

impl RunSettings {
    pub fn new(store: Arc<SettingsStore>, install_dir: Option<PathBuf>) -> Self {
        Self { store, install_dir }
    }
}

impl SettingsProvider for RunSettings {
    fn install_dir(&self) -> Option<PathBuf> {
        self.install_dir
            .clone()
            .or_else(|| self.store.install_dir())
    }

    fn last_manifest_id(&self) -> Option<String> {
        self.store.last_manifest_id()
    }

    fn set_last_manifest_id(&self, id: &str) -> SettingsResult<()> {
        self.store.set_last_manifest_id(id)
    }
}

/// Fail early when no install directory is known.
pub fn require_install_dir(provider: &dyn SettingsProvider) -> Result<PathBuf, CliError> {
    provider.install_dir().ok_or_else(|| {
        CliError::Config(
            "No install directory configured. Pass --install-dir or run \
             'nxlsync config set paths.install_directory <DIR>'"
                .to_string(),
        )
    })
}

/// The HTTP client shared by the manifest source and the chunk fetcher.
pub fn http_client(settings: &Settings) -> Result<Arc<ReqwestClient>, CliError> {
    let client = ReqwestClient::with_timeout(Duration::from_secs(settings.timeout_secs))?;
    Ok(Arc::new(client))
}

/// Cancel the returned token on Ctrl+C.
pub fn cancel_on_ctrlc() -> Result<CancellationToken, CliError> {
    let token = CancellationToken::new();
    let handler_token = token.clone();

    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received interrupt, finishing current chunks...");
        handler_token.cancel();
    })
    .map_err(|e| CliError::Signal(e.to_string()))?;

    Ok(token)
}

/// Byte progress bar for one sync run.
pub fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");
    bar.set_style(style);
    bar
}

/// Per-chunk progress lines, too chatty for the default level.
const CHUNK_DETAIL_PREFIXES: &[&str] = &[
    "Downloading ",
    "Downloaded: ",
    "Fetched chunk ",
    "Wrote 0x",
    "Hash check passed",
];

fn is_chunk_detail(line: &str) -> bool {
    CHUNK_DETAIL_PREFIXES
        .iter()
        .any(|prefix| line.starts_with(prefix))
}

/// Log sink that keeps the progress bar intact.
///
/// Per-chunk lines go to `debug`, per-file and run summaries to `info`,
/// problems to `warn`.
pub struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl LogSink for BarSink {
    fn log(&self, line: &str) {
        if is_chunk_detail(line) {
            self.bar.suspend(|| tracing::debug!("{}", line));
        } else {
            self.bar.suspend(|| tracing::info!("{}", line));
        }
    }

    fn warn(&self, line: &str) {
        self.bar.suspend(|| tracing::warn!("{}", line));
    }
}

/// Updater wired to `bar` and `cancellation`.
pub fn build_updater(
    source: Arc<dyn ManifestSource>,
    provider: Arc<dyn SettingsProvider>,
    client: Arc<ReqwestClient>,
    settings: &Settings,
    bar: &ProgressBar,
    cancellation: CancellationToken,
) -> Updater {
    let progress_bar = bar.clone();
    Updater::new(
        source,
        provider,
        client,
        Arc::new(BarSink::new(bar.clone())),
        settings.to_sync_config(PathBuf::new()),
    )
    .with_cancellation(cancellation)
    .with_progress(move |progress: SyncProgress| {
        progress_bar.set_length(progress.bytes_total);
        progress_bar.set_position(progress.bytes_done);
        progress_bar.set_message(format!(
            "{}/{} files",
            progress.files_completed + progress.files_failed,
            progress.files_total
        ));
    })
}

/// Print the outcome of an update cycle and turn an incomplete run into an
/// error.
pub fn report_outcome(outcome: &UpdateOutcome) -> Result<(), CliError> {
    match outcome {
        UpdateOutcome::UpToDate { id } => {
            println!("{} Manifest {} is already synced", style("✓").green(), id);
            Ok(())
        }
        UpdateOutcome::Synced { id, report } => {
            print_report(id, report);
            if report.cancelled {
                Err(CliError::Interrupted)
            } else if !report.failures.is_empty() {
                Err(CliError::Incomplete {
                    failed: report.failures.len(),
                })
            } else {
                Ok(())
            }
        }
    }
}

fn data_line(report: &SyncReport) -> String {
    format!(
        "{} of {} at {}",
        format_size(report.bytes_synced),
        format_size(report.bytes_expected),
        format_rate(report.bytes_synced, report.elapsed)
    )
}

fn print_report(id: &str, report: &SyncReport) {
    let headline = if report.is_success() {
        style("✓").green().to_string()
    } else {
        style("✗").red().to_string()
    };
    println!("{} Manifest {}", headline, id);
    println!(
        "  Files:       {} up to date, {} failed, {} cancelled",
        report.files_completed,
        report.failures.len(),
        report.files_cancelled
    );
    println!(
        "  Chunks:      {} fetched, {} reused",
        report.chunks_fetched(),
        report.chunks_reused()
    );
    println!("  Data:        {}", data_line(report));
    if report.directories_created > 0 {
        println!("  Directories: {} created", report.directories_created);
    }
    if report.files_resized() > 0 {
        println!("  Resized:     {} file(s)", report.files_resized());
    }

    for warning in &report.warnings {
        println!("  {} {}", style("warning:").yellow(), warning);
    }
    for (key, error) in &report.skipped {
        println!("  {} {} ({})", style("skipped:").yellow(), key, error);
    }
    for failure in &report.failures {
        println!("  {} {}: {}", style("failed:").red(), failure.path, failure.error);
    }
}
