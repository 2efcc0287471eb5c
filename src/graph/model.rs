use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct ErrorEnvelope {
    pub error: ApiError,
}

#[derive(Deserialize, Debug)]
pub struct ApiError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub typ: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
}

/// List endpoints wrap results in `{ "data": [...], "paging": {...} }`.
#[derive(Deserialize, Debug)]
pub struct DataEnvelope<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Deserialize, Debug, Default)]
pub struct Paging {
    #[serde(default)]
    pub cursors: Option<Cursors>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct Cursors {
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct IdResponse {
    pub id: String,
}

#[derive(Deserialize, Debug)]
pub struct CreativeInfo {
    pub effective_object_story_id: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct SuccessResponse {
    #[serde(default)]
    pub success: Option<bool>,
}

#[derive(Deserialize, Debug)]
pub struct MeResponse {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub picture: Option<PictureEnvelope>,
}

#[derive(Deserialize, Debug)]
pub struct PictureEnvelope {
    pub data: PictureData,
}

#[derive(Deserialize, Debug)]
pub struct PictureData {
    pub url: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AdVideo {
    pub id: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// One page of an ad account's video library plus the cursor for the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdVideoPage {
    pub videos: Vec<AdVideo>,
    pub after: Option<String>,
    pub has_more: bool,
}
