//! One cycle of the update check.
//!
//! Ask the manifest source for the newest id; when it differs from the last
//! id recorded by the settings provider, fetch and decode that manifest, run
//! it through the [`DownloadOrchestrator`] and record the id. The id is only
//! recorded after a run without failures, so an interrupted or partially
//! failed sync is retried by the next cycle.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::SyncConfig;
use crate::http::HttpClient;
use crate::manifest::{self, ManifestFormatError, ManifestSource, SourceError};
use crate::settings::{SettingsError, SettingsProvider};
use crate::sink::LogSink;
use crate::sync::{DownloadOrchestrator, SyncError, SyncProgress, SyncReport};

/// Errors that end an update cycle.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("manifest {id} is invalid: {source}")]
    Manifest {
        id: String,
        #[source]
        source: ManifestFormatError,
    },

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("no install directory configured")]
    NoInstallDir,
}

/// What an update cycle did.
#[derive(Debug)]
pub enum UpdateOutcome {
    /// The newest manifest was already synchronized.
    UpToDate { id: String },
    /// A manifest was synchronized; `report.is_success()` tells whether its
    /// id was recorded.
    Synced { id: String, report: SyncReport },
}

impl UpdateOutcome {
    pub fn id(&self) -> &str {
        match self {
            Self::UpToDate { id } | Self::Synced { id, .. } => id,
        }
    }
}

type ProgressFn = dyn Fn(SyncProgress) + Send + Sync;

/// Checks for and applies new manifests.
pub struct Updater {
    source: Arc<dyn ManifestSource>,
    settings: Arc<dyn SettingsProvider>,
    client: Arc<dyn HttpClient>,
    sink: Arc<dyn LogSink>,
    config: SyncConfig,
    cancellation: CancellationToken,
    progress: Option<Arc<ProgressFn>>,
}

impl Updater {
    /// `config` supplies server and retry settings; its install directory is
    /// replaced by the one from `settings` on every cycle.
    pub fn new(
        source: Arc<dyn ManifestSource>,
        settings: Arc<dyn SettingsProvider>,
        client: Arc<dyn HttpClient>,
        sink: Arc<dyn LogSink>,
        config: SyncConfig,
    ) -> Self {
        Self {
            source,
            settings,
            client,
            sink,
            config,
            cancellation: CancellationToken::new(),
            progress: None,
        }
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Report progress of every sync this updater runs.
    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(SyncProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Sync the newest manifest unless it was already synced.
    ///
    /// With `force`, the newest manifest is synced even when its id matches.
    pub fn check(&self, force: bool) -> Result<UpdateOutcome, UpdateError> {
        let id = self.source.latest_id()?;
        let last = self.settings.last_manifest_id();

        if !force && last.as_deref() == Some(id.as_str()) {
            self.sink.log(&format!("Manifest {} already synced", id));
            return Ok(UpdateOutcome::UpToDate { id });
        }

        match last {
            Some(last) => self
                .sink
                .log(&format!("New manifest {} (last synced {})", id, last)),
            None => self.sink.log(&format!("New manifest {}", id)),
        }
        self.sync_id(&id)
    }

    /// Fetch and sync the manifest with `id` unconditionally.
    pub fn sync_id(&self, id: &str) -> Result<UpdateOutcome, UpdateError> {
        let install_dir = self.settings.install_dir().ok_or(UpdateError::NoInstallDir)?;

        let bytes = self.source.fetch(id)?;
        let manifest = manifest::decode(&bytes).map_err(|source| UpdateError::Manifest {
            id: id.to_string(),
            source,
        })?;

        let built = manifest
            .built_at()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        self.sink.log(&format!(
            "Manifest {} for product {} version {} built {} ({} entries)",
            id,
            manifest.product,
            manifest.version,
            built,
            manifest.files.len()
        ));

        let config = SyncConfig {
            install_dir,
            ..self.config.clone()
        };
        let mut orchestrator =
            DownloadOrchestrator::new(config, Arc::clone(&self.client), Arc::clone(&self.sink))
                .with_cancellation(self.cancellation.clone());
        if let Some(progress) = &self.progress {
            let progress = Arc::clone(progress);
            orchestrator = orchestrator.with_progress_callback(Box::new(move |p| progress(p)));
        }

        let report = orchestrator.run(&manifest)?;
        if report.is_success() {
            self.settings.set_last_manifest_id(id)?;
            info!(id = %id, "Recorded synced manifest");
        } else {
            self.sink.warn(&format!(
                "Manifest {} not fully synced ({} failed, {} cancelled); will retry",
                id,
                report.failures.len(),
                report.files_cancelled
            ));
        }

        Ok(UpdateOutcome::Synced {
            id: id.to_string(),
            report,
        })
    }
}
