//! Profile storage with optional file persistence.
//!
//! # Responsibilities
//! - Hold the single served profile in memory
//! - Persist writes to a JSON file when configured
//! - Evaluate `If-Match` preconditions atomically with the write
//!
//! # Design Decisions
//! - Writes hold the lock across persistence; the file is replaced
//!   (temp file + rename) before memory changes
//! - A deleted profile is persisted as `null` so it stays deleted after a
//!   restart instead of being re-seeded

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::ProfileConfig;
use crate::profile::document::{entity_tag, ProfileDocument};

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Stored profile {path:?} is unreadable: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("No profile stored")]
    NotFound,

    #[error("Precondition failed")]
    PreconditionFailed,
}

/// A profile together with its serialized form and entity tag.
#[derive(Debug)]
pub struct StoredProfile {
    pub document: ProfileDocument,
    pub body: Vec<u8>,
    pub etag: String,
}

impl StoredProfile {
    pub fn new(document: ProfileDocument) -> Result<Self, serde_json::Error> {
        let body = document.to_json()?;
        let etag = entity_tag(&body);
        Ok(Self { document, body, etag })
    }
}

/// Result of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Replaced,
}

/// Parsed `If-Match` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IfMatch {
    /// `*`: any current representation.
    Any,
    /// Strong entity tags, quotes included.
    Tags(Vec<String>),
}

impl IfMatch {
    pub fn parse(header: &str) -> Self {
        if header.trim() == "*" {
            return IfMatch::Any;
        }
        IfMatch::Tags(
            header
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Strong comparison; weak tags never match.
    pub fn matches(&self, current: Option<&str>) -> bool {
        match (self, current) {
            (_, None) => false,
            (IfMatch::Any, Some(_)) => true,
            (IfMatch::Tags(tags), Some(etag)) => tags
                .iter()
                .any(|tag| !tag.starts_with("W/") && tag == etag),
        }
    }
}

/// Holds the served profile.
pub struct ProfileStore {
    current: RwLock<Option<Arc<StoredProfile>>>,
    path: Option<PathBuf>,
}

impl ProfileStore {
    /// Memory-only store starting with `document`.
    pub fn in_memory(document: Option<ProfileDocument>) -> Result<Self, StoreError> {
        let current = document.map(StoredProfile::new).transpose()?.map(Arc::new);
        Ok(Self {
            current: RwLock::new(current),
            path: None,
        })
    }

    /// Open the store described by `config`, loading or seeding the profile.
    pub async fn open(config: &ProfileConfig) -> Result<Self, StoreError> {
        let mut store = Self::in_memory(None)?;
        let mut loaded = false;

        if let Some(path) = &config.storage_path {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            if let Some(document) = read_profile_file(path).await? {
                loaded = true;
                *store.current.get_mut() = document.map(StoredProfile::new).transpose()?.map(Arc::new);
                tracing::info!(path = ?path, "Loaded stored profile");
            }
            store.path = Some(path.clone());
        }

        if !loaded && config.seed_default {
            store.put(ProfileDocument::default_profile(), None).await?;
            tracing::info!("Seeded default profile");
        }

        Ok(store)
    }

    /// Current profile, if any.
    pub async fn get(&self) -> Option<Arc<StoredProfile>> {
        self.current.read().await.clone()
    }

    /// Create or replace the profile.
    pub async fn put(
        &self,
        document: ProfileDocument,
        if_match: Option<&IfMatch>,
    ) -> Result<(WriteOutcome, Arc<StoredProfile>), StoreError> {
        let mut current = self.current.write().await;
        check_precondition(if_match, current.as_deref())?;

        let stored = Arc::new(StoredProfile::new(document)?);
        self.persist(Some(&stored.document)).await?;

        let outcome = if current.is_some() {
            WriteOutcome::Replaced
        } else {
            WriteOutcome::Created
        };
        *current = Some(Arc::clone(&stored));

        tracing::debug!(etag = %stored.etag, outcome = ?outcome, "Profile written");
        Ok((outcome, stored))
    }

    /// Remove the profile.
    pub async fn delete(&self, if_match: Option<&IfMatch>) -> Result<(), StoreError> {
        let mut current = self.current.write().await;
        check_precondition(if_match, current.as_deref())?;
        if current.is_none() {
            return Err(StoreError::NotFound);
        }

        self.persist(None).await?;
        *current = None;

        tracing::debug!("Profile deleted");
        Ok(())
    }

    async fn persist(&self, document: Option<&ProfileDocument>) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(&document)?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

fn check_precondition(
    if_match: Option<&IfMatch>,
    current: Option<&StoredProfile>,
) -> Result<(), StoreError> {
    match if_match {
        Some(condition) if !condition.matches(current.map(|p| p.etag.as_str())) => {
            Err(StoreError::PreconditionFailed)
        }
        _ => Ok(()),
    }
}

/// `Ok(None)` when the file does not exist; `Ok(Some(None))` for a deleted profile.
async fn read_profile_file(path: &Path) -> Result<Option<Option<ProfileDocument>>, StoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}
