use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fb_carousel::graph::{GraphError, GraphService};
use fb_carousel::model::{CreativeValues, Page, PublishMode, PublishStatus, Thumbnail};
use fb_carousel::publish::{publish, Pacer, PublishError, PublishObserver, PublishRequest};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    CreateCreative { ad_account: String, page_id: String, token: String },
    StoryId { creative_id: String, token: String },
    Publish { story_id: String, body: Value },
    Pause(Duration),
}

type Log = Arc<Mutex<Vec<Event>>>;

#[derive(Clone, Default)]
struct RecordingGraph {
    log: Log,
    fail_creative_for: HashSet<String>,
    fail_publish_for: HashSet<String>,
    reject_publish_for: HashSet<String>,
}

impl RecordingGraph {
    fn new(log: Log) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }
}

#[async_trait]
impl GraphService for RecordingGraph {
    async fn get_object(&self, _id: &str, _fields: &str, _token: &str) -> Result<Value, GraphError> {
        Err(GraphError::MissingField("get_object"))
    }

    async fn create_creative(&self, ad_account_id: &str, payload: &Value) -> Result<String, GraphError> {
        let page_id = payload["object_story_spec"]["page_id"].as_str().unwrap().to_string();
        self.log.lock().unwrap().push(Event::CreateCreative {
            ad_account: ad_account_id.to_string(),
            page_id: page_id.clone(),
            token: payload["access_token"].as_str().unwrap().to_string(),
        });
        if self.fail_creative_for.contains(&page_id) {
            return Err(GraphError::Api {
                status: 400,
                message: format!("creative rejected for {}", page_id),
            });
        }
        Ok(format!("creative-{}", page_id))
    }

    async fn creative_story_id(&self, creative_id: &str, access_token: &str) -> Result<String, GraphError> {
        self.log.lock().unwrap().push(Event::StoryId {
            creative_id: creative_id.to_string(),
            token: access_token.to_string(),
        });
        let page_id = creative_id.trim_start_matches("creative-");
        Ok(format!("{}_post", page_id))
    }

    async fn publish_story(&self, story_id: &str, body: &Value) -> Result<(), GraphError> {
        self.log.lock().unwrap().push(Event::Publish {
            story_id: story_id.to_string(),
            body: body.clone(),
        });
        let page_id = story_id.trim_end_matches("_post");
        if self.fail_publish_for.contains(page_id) {
            return Err(GraphError::RateLimited("too many calls".into()));
        }
        if self.reject_publish_for.contains(page_id) {
            return Err(GraphError::PublishRejected);
        }
        Ok(())
    }

    async fn thumbnails(&self, _video_id: &str, _token: &str) -> Result<Vec<Thumbnail>, GraphError> {
        Ok(Vec::new())
    }
}

struct RecordingPacer {
    log: Log,
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, duration: Duration) {
        self.log.lock().unwrap().push(Event::Pause(duration));
    }
}

#[derive(Default)]
struct RecordingObserver {
    seen: Mutex<Vec<(String, PublishStatus)>>,
}

impl RecordingObserver {
    fn statuses_for(&self, page_id: &str) -> Vec<PublishStatus> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == page_id)
            .map(|(_, status)| *status)
            .collect()
    }
}

impl PublishObserver for RecordingObserver {
    fn on_status(&self, page: &Page) {
        self.seen.lock().unwrap().push((page.id.clone(), page.status));
    }
}

fn pages(ids: &[&str]) -> Vec<Page> {
    ids.iter()
        .map(|id| {
            let mut page = Page::new(*id, format!("Page {}", id), format!("page-token-{}", id));
            page.selected = true;
            page
        })
        .collect()
}

fn request<'a>(values: &'a CreativeValues) -> PublishRequest<'a> {
    PublishRequest {
        ad_account_id: "act_42",
        account_access_token: "account-token",
        video_id: "vid-1",
        thumbnail_uri: "https://cdn/thumb.jpg",
        pe_image_uri: "https://cdn/right.jpg",
        values,
        creative_name: Some("creative-name"),
        pacing: Duration::from_secs(5),
    }
}

fn pauses(log: &Log) -> usize {
    log.lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, Event::Pause(_)))
        .count()
}

#[tokio::test]
async fn failure_on_middle_page_does_not_stop_the_run() {
    let log = Log::default();
    let mut graph = RecordingGraph::new(log.clone());
    graph.fail_creative_for.insert("2".into());
    let pacer = RecordingPacer { log: log.clone() };
    let observer = RecordingObserver::default();
    let values = CreativeValues::default();
    let mut pages = pages(&["1", "2", "3"]);

    let summary = publish(&graph, &pacer, &observer, &request(&values), &mut pages)
        .await
        .unwrap();

    let statuses: Vec<PublishStatus> = pages.iter().map(|p| p.status).collect();
    assert_eq!(
        statuses,
        vec![PublishStatus::Completed, PublishStatus::Failed, PublishStatus::Completed]
    );
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(pauses(&log), 2);

    assert_eq!(pages[0].published_url.as_deref(), Some("https://www.facebook.com/1_post"));
    assert!(pages[1].published_url.is_none());
    assert!(pages[1]
        .error_message
        .as_deref()
        .unwrap()
        .contains("creative rejected for 2"));

    assert_eq!(
        observer.statuses_for("1"),
        vec![
            PublishStatus::CreatingCreative,
            PublishStatus::ResolvingPost,
            PublishStatus::Publishing,
            PublishStatus::Completed,
        ]
    );
    assert_eq!(
        observer.statuses_for("2"),
        vec![PublishStatus::CreatingCreative, PublishStatus::Failed]
    );
}

#[tokio::test]
async fn pages_run_strictly_in_order_with_pacing_between() {
    let log = Log::default();
    let graph = RecordingGraph::new(log.clone());
    let pacer = RecordingPacer { log: log.clone() };
    let values = CreativeValues::default();
    let mut pages = pages(&["a", "b"]);

    publish(&graph, &pacer, &RecordingObserver::default(), &request(&values), &mut pages)
        .await
        .unwrap();

    let events = log.lock().unwrap().clone();
    assert_eq!(events.len(), 7);
    assert_eq!(
        events[0],
        Event::CreateCreative {
            ad_account: "act_42".into(),
            page_id: "a".into(),
            token: "account-token".into(),
        }
    );
    assert_eq!(
        events[1],
        Event::StoryId {
            creative_id: "creative-a".into(),
            token: "account-token".into(),
        }
    );
    match &events[2] {
        Event::Publish { story_id, body } => {
            assert_eq!(story_id, "a_post");
            assert_eq!(body["access_token"], "page-token-a");
            assert_eq!(body["is_published"], true);
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(events[3], Event::Pause(Duration::from_secs(5)));
    assert!(matches!(&events[4], Event::CreateCreative { page_id, .. } if page_id == "b"));
    assert!(matches!(&events[6], Event::Publish { story_id, .. } if story_id == "b_post"));
}

#[tokio::test]
async fn single_page_has_no_pacing_delay() {
    let log = Log::default();
    let graph = RecordingGraph::new(log.clone());
    let pacer = RecordingPacer { log: log.clone() };
    let values = CreativeValues::default();
    let mut pages = pages(&["solo"]);

    publish(&graph, &pacer, &RecordingObserver::default(), &request(&values), &mut pages)
        .await
        .unwrap();

    assert_eq!(pages[0].status, PublishStatus::Completed);
    assert_eq!(pauses(&log), 0);
}

#[tokio::test]
async fn nothing_selected_is_rejected_before_any_call() {
    let log = Log::default();
    let graph = RecordingGraph::new(log.clone());
    let pacer = RecordingPacer { log: log.clone() };
    let values = CreativeValues::default();
    let mut pages = pages(&["1", "2"]);
    for page in pages.iter_mut() {
        page.selected = false;
    }

    let err = publish(&graph, &pacer, &RecordingObserver::default(), &request(&values), &mut pages)
        .await
        .unwrap_err();

    assert_eq!(err, PublishError::NoPagesSelected);
    assert!(log.lock().unwrap().is_empty());
    assert!(pages.iter().all(|p| p.status == PublishStatus::Idle));
}

#[tokio::test]
async fn unselected_pages_are_skipped_and_untouched() {
    let log = Log::default();
    let graph = RecordingGraph::new(log.clone());
    let pacer = RecordingPacer { log: log.clone() };
    let values = CreativeValues::default();
    let mut pages = pages(&["1", "2", "3"]);
    pages[1].selected = false;

    let summary = publish(&graph, &pacer, &RecordingObserver::default(), &request(&values), &mut pages)
        .await
        .unwrap();

    assert_eq!(summary.completed, 2);
    assert_eq!(pages[1].status, PublishStatus::Idle);
    assert_eq!(pauses(&log), 1);
    let creative_pages: Vec<String> = log
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            Event::CreateCreative { page_id, .. } => Some(page_id.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(creative_pages, vec!["1", "3"]);
}

#[tokio::test]
async fn publish_failure_is_recorded_after_resolving_post() {
    let log = Log::default();
    let mut graph = RecordingGraph::new(log.clone());
    graph.fail_publish_for.insert("1".into());
    graph.reject_publish_for.insert("2".into());
    let pacer = RecordingPacer { log: log.clone() };
    let observer = RecordingObserver::default();
    let values = CreativeValues::default();
    let mut pages = pages(&["1", "2", "3"]);

    let summary = publish(&graph, &pacer, &observer, &request(&values), &mut pages)
        .await
        .unwrap();

    assert_eq!(summary.failed, 2);
    assert_eq!(pages[0].status, PublishStatus::Failed);
    assert_eq!(
        pages[0].error_message.as_deref(),
        Some("rate limited by Graph API: too many calls")
    );
    assert_eq!(pages[1].status, PublishStatus::Failed);
    assert_eq!(pages[2].status, PublishStatus::Completed);
    assert_eq!(
        observer.statuses_for("1"),
        vec![
            PublishStatus::CreatingCreative,
            PublishStatus::ResolvingPost,
            PublishStatus::Publishing,
            PublishStatus::Failed,
        ]
    );
    // no backoff: pacing stays fixed after a rate-limit error
    let waits: Vec<Event> = log
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, Event::Pause(_)))
        .cloned()
        .collect();
    assert_eq!(waits, vec![Event::Pause(Duration::from_secs(5)); 2]);
}

#[tokio::test]
async fn scheduled_mode_sends_unix_seconds() {
    let log = Log::default();
    let graph = RecordingGraph::new(log.clone());
    let pacer = RecordingPacer { log: log.clone() };
    let at = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();
    let values = CreativeValues {
        mode: PublishMode::Scheduled(at),
        ..CreativeValues::default()
    };
    let mut pages = pages(&["1"]);

    publish(&graph, &pacer, &RecordingObserver::default(), &request(&values), &mut pages)
        .await
        .unwrap();

    let body = log
        .lock()
        .unwrap()
        .iter()
        .find_map(|e| match e {
            Event::Publish { body, .. } => Some(body.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(body["scheduled_publish_time"], at.timestamp());
    assert!(body.get("is_published").is_none());
    assert_eq!(body["access_token"], "page-token-1");
}

#[tokio::test]
async fn rerun_clears_previous_outcome() {
    let log = Log::default();
    let mut graph = RecordingGraph::new(log.clone());
    graph.fail_creative_for.insert("1".into());
    let pacer = RecordingPacer { log: log.clone() };
    let values = CreativeValues::default();
    let mut pages = pages(&["1"]);

    publish(&graph, &pacer, &RecordingObserver::default(), &request(&values), &mut pages)
        .await
        .unwrap();
    assert_eq!(pages[0].status, PublishStatus::Failed);

    graph.fail_creative_for.clear();
    publish(&graph, &pacer, &RecordingObserver::default(), &request(&values), &mut pages)
        .await
        .unwrap();
    assert_eq!(pages[0].status, PublishStatus::Completed);
    assert!(pages[0].error_message.is_none());
}
