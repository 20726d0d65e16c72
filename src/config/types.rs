//! Configuration types.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::process::WorkerProgram;
use crate::session::ControllerConfig;

/// Environment variable that overrides the target folder.
pub const TARGET_DIR_ENV: &str = "SCRAPER_TARGET_DIR";
/// Older name for [`TARGET_DIR_ENV`], still honoured.
pub const LEGACY_TARGET_DIR_ENV: &str = "TAR_DIR";

fn default_scraper() -> WorkerProgram {
    WorkerProgram::new("python3").arg("Scrapper_main.py")
}

fn default_transcriber() -> Option<WorkerProgram> {
    Some(WorkerProgram::new("python3").arg("updated_video_transcription.py"))
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_terminate_timeout_secs() -> u64 {
    5
}

/// Application configuration loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Scraper worker.
    #[serde(default = "default_scraper")]
    pub scraper: WorkerProgram,
    /// Transcription worker, chained after successful scrapes on request.
    #[serde(default = "default_transcriber")]
    pub transcriber: Option<WorkerProgram>,
    /// Repository update worker.
    #[serde(default)]
    pub updater: Option<WorkerProgram>,
    /// Default folder downloads are written to.
    #[serde(default)]
    pub target_folder: Option<PathBuf>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_terminate_timeout_secs")]
    pub terminate_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scraper: default_scraper(),
            transcriber: default_transcriber(),
            updater: None,
            target_folder: None,
            poll_interval_ms: default_poll_interval_ms(),
            terminate_timeout_secs: default_terminate_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Resolve the target folder: `SCRAPER_TARGET_DIR`, then `TAR_DIR`, then
    /// config, then the current directory.
    #[must_use]
    pub fn resolve_target_folder(&self) -> PathBuf {
        self.resolve_target_folder_with(|name| std::env::var_os(name))
    }

    fn resolve_target_folder_with<F>(&self, var: F) -> PathBuf
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let from_env = [TARGET_DIR_ENV, LEGACY_TARGET_DIR_ENV]
            .into_iter()
            .find_map(|name| var(name).filter(|v| !v.is_empty()));
        if let Some(dir) = from_env {
            return PathBuf::from(dir);
        }
        self.target_folder
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Build a controller configuration. The poll interval is capped at
    /// 200 ms.
    #[must_use]
    pub fn controller_config(&self) -> ControllerConfig {
        let mut config = ControllerConfig::new(self.scraper.clone());
        config.transcriber.clone_from(&self.transcriber);
        config.updater.clone_from(&self.updater);
        config.poll_interval = Duration::from_millis(self.poll_interval_ms.clamp(1, 200));
        config.terminate_timeout = Duration::from_secs(self.terminate_timeout_secs.max(1));
        config
    }
}
