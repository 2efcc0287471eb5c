//! Turns a user-supplied video URL into a `VideoSource`.
//!
//! Non-Facebook URLs are taken as direct file links. Facebook permalinks are
//! matched against an ordered rule list to pull out the raw object id, which
//! is then resolved through the Graph API: first to its owner-qualified id,
//! then to the video source, descending one level into the first child
//! attachment for carousel ("PE") posts.
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::graph::{GraphError, GraphService};
use crate::model::VideoSource;

static FACEBOOK_DOMAIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"facebook\.com").unwrap());
static STORY_FBID: Lazy<Regex> = Lazy::new(|| Regex::new(r"story_fbid=([^=]+)&").unwrap());
static NESTED_VIDEO: Lazy<Regex> = Lazy::new(|| Regex::new(r"videos/([^/]+)/").unwrap());

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("unsupported video url: {0}")]
    UnsupportedUrl(String),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("graph object {id} has no `{field}`")]
    MissingField { id: String, field: &'static str },
    #[error("carousel attachment link has no video id: {0}")]
    MalformedAttachment(String),
    #[error("unexpected graph object shape: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One permalink shape: `matches` claims the URL, `extract` pulls the id.
/// A claimed URL whose id cannot be extracted is unsupported; later rules
/// are not consulted.
#[derive(Clone, Copy)]
pub struct UrlRule {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub extract: fn(&str) -> Option<String>,
}

pub const URL_RULES: [UrlRule; 4] = [
    UrlRule {
        name: "story",
        matches: is_story_url,
        extract: extract_story_fbid,
    },
    UrlRule {
        name: "videos",
        matches: is_videos_url,
        extract: extract_videos_id,
    },
    UrlRule {
        name: "posts",
        matches: is_posts_url,
        extract: extract_posts_id,
    },
    UrlRule {
        name: "watch",
        matches: is_watch_url,
        extract: extract_watch_id,
    },
];

fn is_story_url(url: &str) -> bool {
    url.contains("permalink.php") || url.contains("story.php")
}

fn is_videos_url(url: &str) -> bool {
    url.contains("/videos/")
}

fn is_posts_url(url: &str) -> bool {
    url.contains("/posts/")
}

fn is_watch_url(url: &str) -> bool {
    url.contains("watch/?v=")
}

fn extract_videos_id(url: &str) -> Option<String> {
    segment_after(url, "videos/", '/')
}

fn extract_posts_id(url: &str) -> Option<String> {
    segment_after(url, "posts/", '/')
}

fn extract_watch_id(url: &str) -> Option<String> {
    segment_after(url, "v=", '&')
}

pub fn is_facebook_url(url: &str) -> bool {
    FACEBOOK_DOMAIN.is_match(url)
}

fn extract_story_fbid(url: &str) -> Option<String> {
    STORY_FBID
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Text following the first `marker`, cut at `delimiter` when one follows.
fn segment_after(url: &str, marker: &str, delimiter: char) -> Option<String> {
    let rest = url.split(marker).nth(1)?;
    let id = rest.split(delimiter).next().unwrap_or(rest);
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Raw object id of a Facebook permalink, or `None` for an unsupported shape.
pub fn extract_raw_id(url: &str) -> Option<String> {
    let rule = URL_RULES.iter().find(|rule| (rule.matches)(url))?;
    debug!(rule = rule.name, "matched facebook url shape");
    (rule.extract)(url)
}

#[derive(Deserialize)]
struct Owned {
    id: String,
    from: Option<Owner>,
}

#[derive(Deserialize)]
struct Owner {
    id: String,
}

#[derive(Deserialize)]
struct PostObject {
    id: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    child_attachments: Option<Vec<ChildAttachment>>,
}

#[derive(Deserialize)]
struct ChildAttachment {
    #[serde(default)]
    link: Option<String>,
}

#[derive(Deserialize)]
struct VideoObject {
    id: String,
    #[serde(default)]
    source: Option<String>,
}

/// Resolve `url` to a video source. `Ok(None)` means the URL shape or the
/// resolved object is not supported; Graph API failures are errors.
#[instrument(skip_all)]
pub async fn resolve(
    graph: &dyn GraphService,
    url: &str,
    access_token: &str,
) -> Result<Option<VideoSource>, ResolutionError> {
    if !is_facebook_url(url) {
        return Ok(Some(VideoSource::direct(url)));
    }

    let Some(raw_id) = extract_raw_id(url) else {
        info!(url, "unsupported facebook url");
        return Ok(None);
    };
    resolve_object(graph, &raw_id, access_token).await
}

/// Like [`resolve`] but an unsupported URL is an error.
pub async fn resolve_required(
    graph: &dyn GraphService,
    url: &str,
    access_token: &str,
) -> Result<VideoSource, ResolutionError> {
    resolve(graph, url, access_token)
        .await?
        .ok_or_else(|| ResolutionError::UnsupportedUrl(url.to_string()))
}

#[instrument(skip(graph, access_token))]
async fn resolve_object(
    graph: &dyn GraphService,
    raw_id: &str,
    access_token: &str,
) -> Result<Option<VideoSource>, ResolutionError> {
    let owned: Owned =
        serde_json::from_value(graph.get_object(raw_id, "id,from", access_token).await?)?;
    let owner = owned.from.ok_or_else(|| ResolutionError::MissingField {
        id: owned.id.clone(),
        field: "from",
    })?;

    let qualified = format!("{}_{}", owner.id, owned.id);
    let post: PostObject = serde_json::from_value(
        graph
            .get_object(&qualified, "id,message,child_attachments,source", access_token)
            .await?,
    )?;

    if let Some(source) = post.source.filter(|s| !s.is_empty()) {
        info!(id = %post.id, "resolved video source");
        return Ok(Some(VideoSource {
            id: Some(post.id),
            source_url: source,
            caption: post.message.unwrap_or_default(),
            created_at: Utc::now(),
        }));
    }

    let Some(attachments) = post.child_attachments else {
        info!(id = %post.id, "graph object has neither source nor attachments");
        return Ok(None);
    };

    let link = attachments
        .into_iter()
        .next()
        .and_then(|a| a.link)
        .unwrap_or_default();
    let nested_id = NESTED_VIDEO
        .captures(&link)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ResolutionError::MalformedAttachment(link.clone()))?;

    let video: VideoObject =
        serde_json::from_value(graph.get_object(&nested_id, "id,source", access_token).await?)?;
    let source = video
        .source
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ResolutionError::MissingField {
            id: video.id.clone(),
            field: "source",
        })?;

    info!(id = %video.id, "resolved carousel video source");
    Ok(Some(VideoSource {
        id: Some(video.id),
        source_url: source,
        caption: String::new(),
        created_at: Utc::now(),
    }))
}
