//! Photo repository backing the candidate resolver.
//!
//! The service does not own photo storage. It reads a YAML catalog that lists
//! albums, tags and photos (with their memberships), and can swap that
//! catalog in place when the file changes on disk.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use display_model::{AlbumId, PhotoDescriptor, PhotoId, PhotoSource, TagId};
use serde::Deserialize;
use tracing::info;

/// Read-only query surface of the photo store.
///
/// Implementations may return photos in any order; the resolver imposes a
/// stable one.
#[async_trait]
pub trait PhotoRepository: Send + Sync {
    async fn query_photos(&self, source: &PhotoSource) -> Result<Vec<PhotoDescriptor>>;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Catalog {
    pub albums: Vec<CatalogGroup>,
    pub tags: Vec<CatalogGroup>,
    pub photos: Vec<CatalogPhoto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CatalogGroup {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CatalogPhoto {
    pub id: PhotoId,
    pub path: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub albums: Vec<AlbumId>,
    #[serde(default)]
    pub tags: Vec<TagId>,
}

impl CatalogPhoto {
    fn matches(&self, source: &PhotoSource) -> bool {
        match source {
            PhotoSource::All => true,
            PhotoSource::Album(id) => self.albums.contains(id),
            PhotoSource::Tag(id) => self.tags.contains(id),
        }
    }

    fn descriptor(&self) -> PhotoDescriptor {
        PhotoDescriptor {
            id: self.id,
            path: self.path.clone(),
            width: self.width,
            height: self.height,
            captured_at: self.captured_at,
            title: self.title.clone(),
        }
    }
}

impl Catalog {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let catalog: Catalog = serde_yaml::from_str(yaml)?;
        catalog.validated()
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog at {}", path.display()))?;
        Self::from_yaml_str(&s)
            .with_context(|| format!("failed to parse catalog at {}", path.display()))
    }

    fn validated(self) -> Result<Self> {
        let mut seen = HashSet::new();
        for photo in &self.photos {
            if !seen.insert(photo.id) {
                bail!("duplicate photo id {} in catalog", photo.id);
            }
        }
        let mut names: HashMap<u64, &str> = HashMap::new();
        for album in &self.albums {
            if names.insert(album.id, &album.name).is_some() {
                bail!("duplicate album id {} in catalog", album.id);
            }
        }
        names.clear();
        for tag in &self.tags {
            if names.insert(tag.id, &tag.name).is_some() {
                bail!("duplicate tag id {} in catalog", tag.id);
            }
        }
        Ok(self)
    }
}

/// In-memory [`PhotoRepository`] over a [`Catalog`], optionally tied to a file.
pub struct CatalogLibrary {
    catalog: RwLock<Arc<Catalog>>,
    path: Option<PathBuf>,
}

impl CatalogLibrary {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: RwLock::new(Arc::new(catalog)),
            path: None,
        }
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let catalog = Catalog::from_yaml_file(&path)?;
        info!(
            path = %path.display(),
            photos = catalog.photos.len(),
            albums = catalog.albums.len(),
            tags = catalog.tags.len(),
            "loaded photo catalog"
        );
        Ok(Self {
            catalog: RwLock::new(Arc::new(catalog)),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Re-reads the backing file. On failure the current catalog stays in place.
    pub fn reload(&self) -> Result<usize> {
        let Some(path) = &self.path else {
            bail!("catalog library has no backing file");
        };
        let catalog = Catalog::from_yaml_file(path)?;
        let count = catalog.photos.len();
        self.replace(catalog);
        Ok(count)
    }

    pub fn replace(&self, catalog: Catalog) {
        let mut guard = self.catalog.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(catalog);
    }

    pub fn len(&self) -> usize {
        self.snapshot().photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog.read().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait]
impl PhotoRepository for CatalogLibrary {
    async fn query_photos(&self, source: &PhotoSource) -> Result<Vec<PhotoDescriptor>> {
        let catalog = self.snapshot();
        Ok(catalog
            .photos
            .iter()
            .filter(|photo| photo.matches(source))
            .map(CatalogPhoto::descriptor)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
albums:
  - { id: 1, name: Summer }
tags:
  - { id: 10, name: favorites }
photos:
  - id: 1
    path: summer/beach.jpg
    width: 4000
    height: 3000
    captured-at: 2023-07-01T10:00:00Z
    albums: [1]
    tags: [10]
  - id: 2
    path: summer/hike.jpg
    albums: [1]
  - id: 3
    path: misc/cat.jpg
    tags: [10]
"#;

    #[tokio::test]
    async fn filters_by_album_and_tag() {
        let library = CatalogLibrary::new(Catalog::from_yaml_str(CATALOG).unwrap());
        let ids = |photos: Vec<PhotoDescriptor>| photos.iter().map(|p| p.id).collect::<Vec<_>>();

        let all = library.query_photos(&PhotoSource::All).await.unwrap();
        assert_eq!(ids(all), vec![1, 2, 3]);
        let album = library.query_photos(&PhotoSource::Album(1)).await.unwrap();
        assert_eq!(ids(album), vec![1, 2]);
        let tag = library.query_photos(&PhotoSource::Tag(10)).await.unwrap();
        assert_eq!(ids(tag), vec![1, 3]);
        let missing = library.query_photos(&PhotoSource::Album(99)).await.unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn duplicate_photo_ids_are_rejected() {
        let yaml = r#"
photos:
  - { id: 1, path: a.jpg }
  - { id: 1, path: b.jpg }
"#;
        let err = Catalog::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate photo id 1"));
    }

    #[test]
    fn reload_without_file_fails_and_keeps_catalog() {
        let library = CatalogLibrary::new(Catalog::from_yaml_str(CATALOG).unwrap());
        assert!(library.reload().is_err());
        assert_eq!(library.len(), 3);
    }
}
