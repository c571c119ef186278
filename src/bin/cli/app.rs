use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use nous_srs::config::{SessionConfig, StudyConfig};
use nous_srs::flashcards::{FileStore, StudyService};

const OWNER_FILE: &str = "owner";

/// Shared application state for CLI commands
pub struct App {
    pub data_dir: PathBuf,
    pub store: Arc<FileStore>,
    pub service: StudyService,
    pub owner_id: Uuid,
}

impl App {
    pub fn new(data_dir: Option<&Path>, config_path: Option<&Path>, owner: Option<Uuid>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir.to_path_buf(),
            None => StudyConfig::default_data_dir().context("Failed to get data directory")?,
        };

        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_dir.join(StudyConfig::FILE_NAME));
        let config = StudyConfig::load(&config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

        let store = Arc::new(FileStore::new(data_dir.clone()));
        store.init().context("Failed to initialize card storage")?;

        let owner_id = match owner {
            Some(id) => id,
            None => Self::stored_owner(&data_dir)?,
        };

        let service = StudyService::new(store.clone(), config);

        Ok(Self {
            data_dir,
            store,
            service,
            owner_id,
        })
    }

    /// Owner ID kept in the data directory, created on first use
    fn stored_owner(data_dir: &Path) -> Result<Uuid> {
        let path = data_dir.join(OWNER_FILE);
        if path.exists() {
            let content = fs::read_to_string(&path).context("Failed to read owner file")?;
            return content
                .trim()
                .parse()
                .with_context(|| format!("Invalid owner ID in {}", path.display()));
        }

        let owner = Uuid::new_v4();
        fs::write(&path, owner.to_string()).context("Failed to write owner file")?;
        log::info!("Created owner {} in {}", owner, data_dir.display());
        Ok(owner)
    }

    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    pub fn config(&self) -> &StudyConfig {
        self.service.config()
    }

    /// Configured session limits with command-line overrides
    pub fn session_limits(
        &self,
        new_limit: Option<usize>,
        review_limit: Option<usize>,
        exam_limit: Option<usize>,
    ) -> SessionConfig {
        let defaults = &self.config().session;
        SessionConfig {
            new_limit: new_limit.unwrap_or(defaults.new_limit),
            review_limit: review_limit.unwrap_or(defaults.review_limit),
            exam_limit: exam_limit.unwrap_or(defaults.exam_limit),
        }
    }

    /// Parse JSON from a file, or from stdin when `source` is "-"
    pub fn read_json<T: DeserializeOwned>(source: &str) -> Result<T> {
        let content = if source == "-" {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        } else {
            fs::read_to_string(source).with_context(|| format!("Failed to read {}", source))?
        };
        serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", source))
    }
}
