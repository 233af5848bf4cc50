//! `nxlsync sync`: one sync run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use nxlsync::{FileManifestSource, HttpManifestSource, ManifestSource, SettingsProvider};

use super::common::{
    build_updater, cancel_on_ctrlc, http_client, open_settings, progress_bar, report_outcome,
    require_install_dir, RunSettings,
};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Compressed manifest on disk instead of the server's latest
    #[arg(long, value_name = "FILE", conflicts_with = "manifest_id")]
    pub manifest_file: Option<PathBuf>,

    /// Sync the manifest with this id instead of the latest
    #[arg(long, value_name = "ID")]
    pub manifest_id: Option<String>,

    /// Install directory for this run (overrides settings)
    #[arg(long, value_name = "DIR")]
    pub install_dir: Option<PathBuf>,

    /// Sync even if the manifest was already synced
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: SyncArgs, config: Option<&Path>) -> Result<(), CliError> {
    let store = Arc::new(open_settings(config)?);
    let settings = store.settings();
    let provider: Arc<dyn SettingsProvider> =
        Arc::new(RunSettings::new(store, args.install_dir.clone()));
    let install_dir = require_install_dir(provider.as_ref())?;

    let client = http_client(&settings)?;
    let source: Arc<dyn ManifestSource> = match &args.manifest_file {
        Some(path) => Arc::new(FileManifestSource::new(path)),
        None => Arc::new(HttpManifestSource::new(
            client.clone(),
            settings.manifest_pointer_url.clone(),
            settings.manifest_base_url.clone(),
        )),
    };

    println!("Syncing into {}", install_dir.display());

    let cancellation = cancel_on_ctrlc()?;
    let bar = progress_bar();
    let updater = build_updater(source, provider, client, &settings, &bar, cancellation);

    let outcome = match &args.manifest_id {
        Some(id) => updater.sync_id(id),
        None => updater.check(args.force),
    };
    bar.finish_and_clear();

    report_outcome(&outcome?)
}
