use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use display_model::{PhotoDescriptor, PhotoSource};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{DisplayError, Result};
use crate::library::PhotoRepository;

/// Turns a photo source into the ordered candidate set a slideshow walks.
///
/// Ordering is by capture time (undated photos last), then by id, so a fixed
/// candidate set always yields the same sequential order.
#[derive(Clone)]
pub struct CandidateResolver {
    repository: Arc<dyn PhotoRepository>,
}

impl CandidateResolver {
    pub fn new(repository: Arc<dyn PhotoRepository>) -> Self {
        Self { repository }
    }

    pub async fn resolve(
        &self,
        source: &PhotoSource,
        cancel: &CancellationToken,
    ) -> Result<Vec<PhotoDescriptor>> {
        let photos = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DisplayError::Cancelled),
            res = self.repository.query_photos(source) => res.map_err(DisplayError::Library)?,
        };
        let candidates = stable_order(photos);
        debug!(%source, candidates = candidates.len(), "resolved candidates");
        Ok(candidates)
    }

    pub async fn count(&self, source: &PhotoSource, cancel: &CancellationToken) -> Result<usize> {
        Ok(self.resolve(source, cancel).await?.len())
    }
}

fn stable_order(mut photos: Vec<PhotoDescriptor>) -> Vec<PhotoDescriptor> {
    let mut seen = HashSet::with_capacity(photos.len());
    photos.retain(|photo| seen.insert(photo.id));
    photos.sort_by(|a, b| {
        let by_time = match (a.captured_at, b.captured_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_time.then(a.id.cmp(&b.id))
    });
    photos
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result as AnyResult;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    struct Fixed(Vec<PhotoDescriptor>);

    #[async_trait]
    impl PhotoRepository for Fixed {
        async fn query_photos(&self, _source: &PhotoSource) -> AnyResult<Vec<PhotoDescriptor>> {
            Ok(self.0.clone())
        }
    }

    struct Stalled;

    #[async_trait]
    impl PhotoRepository for Stalled {
        async fn query_photos(&self, _source: &PhotoSource) -> AnyResult<Vec<PhotoDescriptor>> {
            std::future::pending().await
        }
    }

    fn photo(id: u64, day: Option<u32>) -> PhotoDescriptor {
        PhotoDescriptor {
            id,
            path: format!("{id}.jpg"),
            width: 0,
            height: 0,
            captured_at: day.map(|d| Utc.with_ymd_and_hms(2024, 1, d, 12, 0, 0).unwrap()),
            title: None,
        }
    }

    #[tokio::test]
    async fn orders_by_capture_time_then_id_and_dedups() {
        let resolver = CandidateResolver::new(Arc::new(Fixed(vec![
            photo(5, None),
            photo(3, Some(2)),
            photo(9, Some(1)),
            photo(1, None),
            photo(4, Some(2)),
            photo(3, Some(2)),
        ])));
        let ids: Vec<u64> = resolver
            .resolve(&PhotoSource::All, &CancellationToken::new())
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![9, 3, 4, 1, 5]);
    }

    #[tokio::test]
    async fn cancelled_query_reports_cancellation() {
        let resolver = CandidateResolver::new(Arc::new(Stalled));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = resolver.resolve(&PhotoSource::All, &cancel).await.unwrap_err();
        assert!(matches!(err, DisplayError::Cancelled));
    }
}
