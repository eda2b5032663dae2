//! Collection manifest: the named snapshots the crawler reads and writes.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::slugify;

/// Root manifest structure listing every known collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub collections: Vec<Collection>,
}

impl Manifest {
    /// Load the manifest from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load the manifest or return an empty one if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Manifest load failed from {:?}: {}. No collections defined.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate names, paths and seed lists.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for collection in &self.collections {
            if collection.name.trim().is_empty() {
                return Err(AppError::validation("Collection with empty name"));
            }
            if !names.insert(collection.name.as_str()) {
                return Err(AppError::validation(format!(
                    "Duplicate collection name '{}'",
                    collection.name
                )));
            }
            if collection.path.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "Collection '{}' has no path",
                    collection.name
                )));
            }
            if collection.kind == CollectionKind::Accounts && collection.seed_list.is_none() {
                return Err(AppError::validation(format!(
                    "Accounts collection '{}' has no seed_list",
                    collection.name
                )));
            }
        }
        Ok(())
    }

    pub fn of_kind(&self, kind: CollectionKind) -> impl Iterator<Item = &Collection> {
        self.collections.iter().filter(move |c| c.kind == kind)
    }

    pub fn find(&self, name: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// The collection registered for `kind`/`name`, or one at the
    /// conventional path when the manifest does not list it.
    pub fn resolve(&self, kind: CollectionKind, name: &str) -> Collection {
        self.collections
            .iter()
            .find(|c| c.kind == kind && c.name == name)
            .cloned()
            .unwrap_or_else(|| Collection::conventional(kind, name))
    }
}

/// What a collection holds and how it is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    /// Videos listed under a hashtag; seeds the related crawl
    Hashtag,
    /// Videos returned by a search query
    Search,
    /// Videos of the accounts in a seed list
    Accounts,
}

/// A named snapshot on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,

    pub kind: CollectionKind,

    /// Snapshot key relative to the storage directory
    pub path: String,

    /// Backup snapshot key
    #[serde(default)]
    pub backup: Option<String>,

    /// CSV of account handles (accounts collections only)
    #[serde(default)]
    pub seed_list: Option<String>,
}

impl Collection {
    /// Collection stored at the conventional path for its kind and name.
    pub fn conventional(kind: CollectionKind, name: &str) -> Self {
        let slug = slugify(name);
        let path = match kind {
            CollectionKind::Hashtag => format!("hashtag_{slug}.jsonl.zst"),
            CollectionKind::Search => format!("search_{slug}.jsonl.zst"),
            CollectionKind::Accounts => format!("{}_videos.jsonl.zst", slug.to_lowercase()),
        };
        Self {
            name: name.to_string(),
            kind,
            path,
            backup: None,
            seed_list: None,
        }
    }

    /// Backup snapshot key: the configured one, else `backup_<path>`.
    pub fn backup_key(&self) -> String {
        self.backup
            .clone()
            .unwrap_or_else(|| format!("backup_{}", self.path))
    }
}
