use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::graph::{GraphError, GraphService};
use crate::model::Thumbnail;
use crate::publish::Pacer;

/// Graph needs a few seconds after an upload before thumbnails exist.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(9);
pub const DEFAULT_POLL_ATTEMPTS: u32 = 20;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("video {video_id} still has no thumbnails after {attempts} checks")]
    NotReady { video_id: String, attempts: u32 },
}

/// Graph-generated thumbnails for `video_id` followed by locally uploaded images.
pub async fn list_thumbnails(
    graph: &dyn GraphService,
    local_images: &[Thumbnail],
    video_id: &str,
    access_token: &str,
) -> Result<Vec<Thumbnail>, GraphError> {
    let mut thumbs = graph.thumbnails(video_id, access_token).await?;
    thumbs.extend(local_images.iter().cloned());
    Ok(thumbs)
}

/// The thumbnail Facebook marks as preferred, else the first one.
pub fn preferred(thumbs: &[Thumbnail]) -> Option<&Thumbnail> {
    thumbs
        .iter()
        .find(|t| t.is_preferred)
        .or_else(|| thumbs.first())
}

/// Poll until a freshly created ad video has been processed, which is when
/// Facebook starts returning thumbnails for it. Each check is preceded by a
/// wait of `interval`.
#[instrument(skip(graph, pacer, access_token))]
pub async fn wait_until_ready(
    graph: &dyn GraphService,
    pacer: &dyn Pacer,
    video_id: &str,
    access_token: &str,
    interval: Duration,
    max_attempts: u32,
) -> Result<Vec<Thumbnail>, ThumbnailError> {
    for attempt in 1..=max_attempts {
        pacer.pause(interval).await;
        let thumbs = graph.thumbnails(video_id, access_token).await?;
        if !thumbs.is_empty() {
            info!(attempt, count = thumbs.len(), "video processed");
            return Ok(thumbs);
        }
        debug!(attempt, "video still processing");
    }
    Err(ThumbnailError::NotReady {
        video_id: video_id.to_string(),
        attempts: max_attempts,
    })
}
