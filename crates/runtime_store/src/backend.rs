//! Key-value storage behind the store runtime.

use crate::error::StoreError;
use bus::CategoryState;
use core_types::{Category, DocumentUrl, HighlightDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Storage keyed by document URL. Each write replaces the whole list.
pub trait KeyValueBackend: Send {
    fn load(&mut self, url: &str) -> Result<Vec<HighlightDescriptor>, StoreError>;
    fn save(&mut self, url: &str, descriptors: &[HighlightDescriptor]) -> Result<(), StoreError>;
    fn remember_category(&mut self, category: &str) -> Result<(), StoreError>;
    fn categories(&mut self) -> Result<CategoryState, StoreError>;
}

/// Whole store contents, also the on-disk JSON shape.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreFile {
    #[serde(default)]
    pub recent_category: Option<Category>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(flatten)]
    pub documents: BTreeMap<DocumentUrl, Vec<HighlightDescriptor>>,
}

impl StoreFile {
    fn load(&self, url: &str) -> Vec<HighlightDescriptor> {
        self.documents.get(url).cloned().unwrap_or_default()
    }

    fn save(&mut self, url: &str, descriptors: &[HighlightDescriptor]) {
        if descriptors.is_empty() {
            self.documents.remove(url);
        } else {
            self.documents.insert(url.to_string(), descriptors.to_vec());
        }
    }

    /// Returns `false` when nothing changed.
    fn remember_category(&mut self, category: &str) -> bool {
        let category = category.trim();
        if category.is_empty() {
            return false;
        }
        let known = self.categories.iter().any(|c| c == category);
        if !known {
            self.categories.push(category.to_string());
        }
        let was_recent = self.recent_category.as_deref() == Some(category);
        self.recent_category = Some(category.to_string());
        !known || !was_recent
    }

    fn category_state(&self) -> CategoryState {
        CategoryState {
            recent: self.recent_category.clone(),
            categories: self.categories.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    contents: StoreFile,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: StoreFile) -> Self {
        Self { contents }
    }
}

impl KeyValueBackend for MemoryBackend {
    fn load(&mut self, url: &str) -> Result<Vec<HighlightDescriptor>, StoreError> {
        Ok(self.contents.load(url))
    }

    fn save(&mut self, url: &str, descriptors: &[HighlightDescriptor]) -> Result<(), StoreError> {
        self.contents.save(url, descriptors);
        Ok(())
    }

    fn remember_category(&mut self, category: &str) -> Result<(), StoreError> {
        self.contents.remember_category(category);
        Ok(())
    }

    fn categories(&mut self) -> Result<CategoryState, StoreError> {
        Ok(self.contents.category_state())
    }
}

/// A single JSON file, read once and rewritten on every change.
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
    contents: Option<StoreFile>,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            contents: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn contents(&mut self) -> Result<&mut StoreFile, StoreError> {
        if self.contents.is_none() {
            let loaded = match fs::read_to_string(&self.path) {
                Ok(raw) if raw.trim().is_empty() => StoreFile::default(),
                Ok(raw) => serde_json::from_str(&raw)?,
                Err(err) if err.kind() == io::ErrorKind::NotFound => StoreFile::default(),
                Err(err) => return Err(err.into()),
            };
            log::debug!(
                target: "store.file",
                "loaded {} document(s) from {}",
                loaded.documents.len(),
                self.path.display()
            );
            self.contents = Some(loaded);
        }
        Ok(self.contents.get_or_insert_with(StoreFile::default))
    }

    /// Write to a sibling temp file then rename over the target.
    fn persist(&self) -> Result<(), StoreError> {
        let Some(contents) = &self.contents else {
            return Ok(());
        };
        let raw = serde_json::to_string_pretty(contents)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueBackend for JsonFileBackend {
    fn load(&mut self, url: &str) -> Result<Vec<HighlightDescriptor>, StoreError> {
        Ok(self.contents()?.load(url))
    }

    fn save(&mut self, url: &str, descriptors: &[HighlightDescriptor]) -> Result<(), StoreError> {
        self.contents()?.save(url, descriptors);
        self.persist()
    }

    fn remember_category(&mut self, category: &str) -> Result<(), StoreError> {
        if self.contents()?.remember_category(category) {
            self.persist()?;
        }
        Ok(())
    }

    fn categories(&mut self) -> Result<CategoryState, StoreError> {
        Ok(self.contents()?.category_state())
    }
}
