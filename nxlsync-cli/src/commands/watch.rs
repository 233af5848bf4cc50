//! `nxlsync watch`: poll for new manifests until interrupted.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use nxlsync::{HttpManifestSource, ManifestSource, SettingsProvider};

use super::common::{
    build_updater, cancel_on_ctrlc, http_client, open_settings, progress_bar, report_outcome,
    require_install_dir, RunSettings,
};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Minutes between update checks
    #[arg(long, value_name = "MINUTES", default_value_t = 10)]
    pub interval_mins: u64,

    /// Install directory (overrides settings)
    #[arg(long, value_name = "DIR")]
    pub install_dir: Option<PathBuf>,
}

pub fn run(args: WatchArgs, config: Option<&Path>) -> Result<(), CliError> {
    let store = Arc::new(open_settings(config)?);
    let settings = store.settings();
    let provider: Arc<dyn SettingsProvider> =
        Arc::new(RunSettings::new(store, args.install_dir.clone()));
    let install_dir = require_install_dir(provider.as_ref())?;

    let client = http_client(&settings)?;
    let source: Arc<dyn ManifestSource> = Arc::new(HttpManifestSource::new(
        client.clone(),
        settings.manifest_pointer_url.clone(),
        settings.manifest_base_url.clone(),
    ));

    let interval = Duration::from_secs(args.interval_mins.max(1) * 60);
    let cancellation = cancel_on_ctrlc()?;

    println!(
        "Watching for new manifests every {} minute(s), syncing into {}",
        args.interval_mins.max(1),
        install_dir.display()
    );
    println!("Press Ctrl+C to stop");

    loop {
        let bar = progress_bar();
        let updater = build_updater(
            Arc::clone(&source),
            Arc::clone(&provider),
            client.clone(),
            &settings,
            &bar,
            cancellation.clone(),
        );

        let result = updater.check(false);
        bar.finish_and_clear();

        match result {
            Ok(outcome) => match report_outcome(&outcome) {
                Err(CliError::Interrupted) => break,
                Err(e) => warn!("{}", e),
                Ok(()) => {}
            },
            Err(e) => eprintln!("{} {}", style("Update check failed:").red(), e),
        }

        if wait_or_cancelled(&cancellation, interval) {
            break;
        }
    }

    info!("Watch stopped");
    Ok(())
}

/// Sleep for `interval`; returns true as soon as `cancellation` fires.
fn wait_or_cancelled(cancellation: &CancellationToken, interval: Duration) -> bool {
    let deadline = Instant::now() + interval;
    loop {
        if cancellation.is_cancelled() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        thread::sleep((deadline - now).min(Duration::from_millis(250)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_returns_when_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let started = Instant::now();
        assert!(wait_or_cancelled(&token, Duration::from_secs(3600)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_elapses() {
        let token = CancellationToken::new();
        assert!(!wait_or_cancelled(&token, Duration::from_millis(20)));
    }
}
