//! Ad-creative payload for a two-card video carousel.
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::model::CreativeValues;

/// Everything one page's creative is built from.
#[derive(Debug, Clone, Copy)]
pub struct CreativeInput<'a> {
    pub name: &'a str,
    pub page_id: &'a str,
    /// Ad video id (not the permalink id of the source post).
    pub video_id: &'a str,
    pub thumbnail_uri: &'a str,
    /// Picture shown on the right-hand card.
    pub pe_image_uri: &'a str,
    /// Account-level token; the page token is only used to publish.
    pub access_token: &'a str,
    pub values: &'a CreativeValues,
}

/// The click-through link, defaulting to the page itself when left blank.
pub fn cta_link(values: &CreativeValues, page_id: &str) -> String {
    let link = values.link.trim();
    if link.is_empty() {
        format!("https://facebook.com/{}", page_id)
    } else {
        link.to_string()
    }
}

/// Creatives are named by creation time in milliseconds.
pub fn default_creative_name(now: DateTime<Utc>) -> String {
    now.timestamp_millis().to_string()
}

pub fn get_adcreative_data(input: &CreativeInput<'_>) -> Value {
    let link = cta_link(input.values, input.page_id);
    let call_to_action = json!({
        "type": input.values.cta.as_str(),
        "value": { "page": input.page_id },
    });

    json!({
        "name": input.name,
        "object_story_spec": {
            "page_id": input.page_id,
            "link_data": {
                "message": input.values.message,
                "caption": link,
                "link": link,
                "multi_share_optimized": false,
                "child_attachments": [
                    {
                        "name": input.values.cta_link_title,
                        "link": link,
                        "video_id": input.video_id,
                        "picture": input.thumbnail_uri,
                        "call_to_action": call_to_action,
                    },
                    {
                        "name": input.values.cta_link_title,
                        "link": link,
                        "picture": input.pe_image_uri,
                        "call_to_action": call_to_action,
                    }
                ]
            }
        },
        "access_token": input.access_token,
    })
}
