//! Multi-page publish run.
//!
//! Pages are processed one at a time in the order given. For each selected
//! page an ad creative is created with the account token, resolved to its
//! story id and then published with the page's own token. A failure is
//! recorded on that page and the run moves on. A fixed pacing wait separates
//! consecutive pages; there is no adaptive backoff on rate-limit errors.
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::creative::{default_creative_name, get_adcreative_data, CreativeInput};
use crate::graph::{publish_body, GraphError, GraphService};
use crate::model::{CreativeValues, Page, PublishMode, PublishStatus, StatusTransitionError};

pub const DEFAULT_PACING: Duration = Duration::from_secs(5);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("please select at least one page")]
    NoPagesSelected,
}

/// Failure of one page's sequence; stored on the page, never returned.
#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Transition(#[from] StatusTransitionError),
}

/// Waits between pages.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Receives every page status change as it happens.
pub trait PublishObserver: Send + Sync {
    fn on_status(&self, page: &Page);

    /// Called before waiting `delay` ahead of `next`.
    fn on_pacing(&self, _next: &Page, _delay: Duration) {}
}

/// Logs progress through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl PublishObserver for LogObserver {
    fn on_status(&self, page: &Page) {
        match page.status {
            PublishStatus::Failed => warn!(
                page_id = %page.id,
                page = %page.name,
                error = page.error_message.as_deref().unwrap_or_default(),
                "page failed"
            ),
            PublishStatus::Completed => info!(
                page_id = %page.id,
                page = %page.name,
                url = page.published_url.as_deref().unwrap_or_default(),
                "page published"
            ),
            status => info!(page_id = %page.id, page = %page.name, %status, "page progress"),
        }
    }

    fn on_pacing(&self, next: &Page, delay: Duration) {
        info!(next = %next.name, delay_ms = delay.as_millis() as u64, "pacing before next page");
    }
}

/// Inputs shared by every page in one run.
#[derive(Debug, Clone)]
pub struct PublishRequest<'a> {
    pub ad_account_id: &'a str,
    pub account_access_token: &'a str,
    pub video_id: &'a str,
    pub thumbnail_uri: &'a str,
    pub pe_image_uri: &'a str,
    pub values: &'a CreativeValues,
    /// Overrides the millisecond-timestamp creative name.
    pub creative_name: Option<&'a str>,
    pub pacing: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub completed: usize,
    pub failed: usize,
}

pub fn published_url(story_id: &str) -> String {
    format!("https://www.facebook.com/{}", story_id)
}

/// Publish to every selected page in `pages`, mutating each in place.
///
/// Returns `NoPagesSelected` without any network call when nothing is
/// selected. Per-page failures never surface here.
#[instrument(skip_all, fields(ad_account = request.ad_account_id))]
pub async fn publish(
    graph: &dyn GraphService,
    pacer: &dyn Pacer,
    observer: &dyn PublishObserver,
    request: &PublishRequest<'_>,
    pages: &mut [Page],
) -> Result<PublishSummary, PublishError> {
    let selected: Vec<usize> = pages
        .iter()
        .enumerate()
        .filter(|(_, page)| page.selected)
        .map(|(idx, _)| idx)
        .collect();
    if selected.is_empty() {
        return Err(PublishError::NoPagesSelected);
    }

    for &idx in &selected {
        pages[idx].reset_for_run();
    }

    let mut summary = PublishSummary::default();
    for (n, &idx) in selected.iter().enumerate() {
        if n > 0 {
            let next = &pages[idx];
            observer.on_pacing(next, request.pacing);
            pacer.pause(request.pacing).await;
        }

        let page = &mut pages[idx];
        let outcome = match publish_page(graph, observer, request, page).await {
            Ok(story_id) => page.complete(published_url(&story_id)).map_err(PageError::from),
            Err(err) => Err(err),
        };
        match outcome {
            Ok(()) => summary.completed += 1,
            Err(err) => {
                page.fail(err.to_string());
                summary.failed += 1;
            }
        }
        observer.on_status(page);
    }

    info!(completed = summary.completed, failed = summary.failed, "publishing completed");
    Ok(summary)
}

async fn publish_page(
    graph: &dyn GraphService,
    observer: &dyn PublishObserver,
    request: &PublishRequest<'_>,
    page: &mut Page,
) -> Result<String, PageError> {
    page.transition(PublishStatus::CreatingCreative)?;
    observer.on_status(page);

    let name = request
        .creative_name
        .map(str::to_string)
        .unwrap_or_else(|| default_creative_name(Utc::now()));
    let payload = get_adcreative_data(&CreativeInput {
        name: &name,
        page_id: &page.id,
        video_id: request.video_id,
        thumbnail_uri: request.thumbnail_uri,
        pe_image_uri: request.pe_image_uri,
        access_token: request.account_access_token,
        values: request.values,
    });
    let creative_id = graph.create_creative(request.ad_account_id, &payload).await?;

    page.transition(PublishStatus::ResolvingPost)?;
    observer.on_status(page);
    let story_id = graph
        .creative_story_id(&creative_id, request.account_access_token)
        .await?;

    page.transition(PublishStatus::Publishing)?;
    observer.on_status(page);
    let scheduled = match request.values.mode {
        PublishMode::Now => None,
        PublishMode::Scheduled(at) => Some(at.timestamp()),
    };
    graph
        .publish_story(&story_id, &publish_body(&page.access_token, scheduled))
        .await?;

    Ok(story_id)
}
