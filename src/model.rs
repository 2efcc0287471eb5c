use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Progress of one page through a publish run.
///
/// Variants are declared in run order; `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    #[default]
    Idle,
    CreatingCreative,
    ResolvingPost,
    Publishing,
    Completed,
    Failed,
}

impl PublishStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::Idle => "idle",
            PublishStatus::CreatingCreative => "creating_creative",
            PublishStatus::ResolvingPost => "resolving_post",
            PublishStatus::Publishing => "publishing",
            PublishStatus::Completed => "completed",
            PublishStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PublishStatus::Completed | PublishStatus::Failed)
    }

    /// Whether `next` is the single allowed step from `self`. Any in-flight
    /// status may also drop to `Failed`.
    pub fn can_transition_to(&self, next: PublishStatus) -> bool {
        use PublishStatus::*;
        matches!(
            (*self, next),
            (Idle, CreatingCreative)
                | (CreatingCreative, ResolvingPost)
                | (ResolvingPost, Publishing)
                | (Publishing, Completed)
                | (CreatingCreative | ResolvingPost | Publishing, Failed)
        )
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("page status cannot move from {from} to {to}")]
pub struct StatusTransitionError {
    pub from: PublishStatus,
    pub to: PublishStatus,
}

/// A video ready for ad-creative construction. `id` is `None` for direct file URLs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoSource {
    pub id: Option<String>,
    pub source_url: String,
    pub caption: String,
    pub created_at: DateTime<Utc>,
}

impl VideoSource {
    /// A non-Facebook URL taken as-is, without checking that it serves video.
    pub fn direct(url: &str) -> Self {
        Self {
            id: None,
            source_url: url.to_string(),
            caption: String::new(),
            created_at: Utc::now(),
        }
    }
}

/// A Facebook Page the linked account can publish to.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    pub id: String,
    pub name: String,
    pub access_token: String,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub status: PublishStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("selected", &self.selected)
            .field("status", &self.status)
            .field("published_url", &self.published_url)
            .field("error_message", &self.error_message)
            .finish_non_exhaustive()
    }
}

impl Page {
    pub fn new(id: impl Into<String>, name: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            access_token: access_token.into(),
            selected: false,
            status: PublishStatus::Idle,
            published_url: None,
            error_message: None,
        }
    }

    /// Clear the outcome of any previous run.
    pub fn reset_for_run(&mut self) {
        self.status = PublishStatus::Idle;
        self.published_url = None;
        self.error_message = None;
    }

    pub fn transition(&mut self, next: PublishStatus) -> Result<(), StatusTransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(StatusTransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn complete(&mut self, published_url: String) -> Result<(), StatusTransitionError> {
        self.transition(PublishStatus::Completed)?;
        self.published_url = Some(published_url);
        Ok(())
    }

    /// Record a failure. A page that never left `Idle` is failed as well so
    /// that every selected page ends the run in a terminal status.
    pub fn fail(&mut self, message: impl Into<String>) {
        if !self.status.is_terminal() {
            self.status = PublishStatus::Failed;
        }
        self.error_message = Some(message.into());
    }
}

/// A Facebook profile linked by pasting its access token.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub picture: String,
    pub access_token: String,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdAccount {
    pub id: String,
    pub account_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thumbnail {
    pub id: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default = "default_scale")]
    pub scale: f64,
    pub uri: String,
    #[serde(default)]
    pub is_preferred: bool,
    #[serde(default)]
    pub is_local_upload: bool,
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloudinarySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
}

impl CloudinarySettings {
    pub fn is_configured(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        filled(&self.cloud_name) && filled(&self.preset)
    }
}

/// Call-to-action button types accepted in carousel child attachments.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallToAction {
    NoButton,
    LikePage,
    LearnMore,
    BookTravel,
    ContactUs,
    Download,
    GetQuote,
    InstallApp,
    ListenMusic,
    MessagePage,
    OpenLink,
    PlayGame,
    ShopNow,
    SignUp,
    Subscribe,
    UseApp,
    WatchMore,
    WatchVideo,
}

impl CallToAction {
    pub const ALL: [CallToAction; 18] = [
        CallToAction::NoButton,
        CallToAction::LikePage,
        CallToAction::LearnMore,
        CallToAction::BookTravel,
        CallToAction::ContactUs,
        CallToAction::Download,
        CallToAction::GetQuote,
        CallToAction::InstallApp,
        CallToAction::ListenMusic,
        CallToAction::MessagePage,
        CallToAction::OpenLink,
        CallToAction::PlayGame,
        CallToAction::ShopNow,
        CallToAction::SignUp,
        CallToAction::Subscribe,
        CallToAction::UseApp,
        CallToAction::WatchMore,
        CallToAction::WatchVideo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CallToAction::NoButton => "NO_BUTTON",
            CallToAction::LikePage => "LIKE_PAGE",
            CallToAction::LearnMore => "LEARN_MORE",
            CallToAction::BookTravel => "BOOK_TRAVEL",
            CallToAction::ContactUs => "CONTACT_US",
            CallToAction::Download => "DOWNLOAD",
            CallToAction::GetQuote => "GET_QUOTE",
            CallToAction::InstallApp => "INSTALL_APP",
            CallToAction::ListenMusic => "LISTEN_MUSIC",
            CallToAction::MessagePage => "MESSAGE_PAGE",
            CallToAction::OpenLink => "OPEN_LINK",
            CallToAction::PlayGame => "PLAY_GAME",
            CallToAction::ShopNow => "SHOP_NOW",
            CallToAction::SignUp => "SIGN_UP",
            CallToAction::Subscribe => "SUBSCRIBE",
            CallToAction::UseApp => "USE_APP",
            CallToAction::WatchMore => "WATCH_MORE",
            CallToAction::WatchVideo => "WATCH_VIDEO",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CallToAction::NoButton => "No Button",
            CallToAction::LikePage => "Like Page",
            CallToAction::LearnMore => "Learn More",
            CallToAction::BookTravel => "Book Travel",
            CallToAction::ContactUs => "Contact Us",
            CallToAction::Download => "Download",
            CallToAction::GetQuote => "Get Quote",
            CallToAction::InstallApp => "Install App",
            CallToAction::ListenMusic => "Listen Music",
            CallToAction::MessagePage => "Message Page",
            CallToAction::OpenLink => "Open Link",
            CallToAction::PlayGame => "Play Game",
            CallToAction::ShopNow => "Shop Now",
            CallToAction::SignUp => "Sign Up",
            CallToAction::Subscribe => "Subscribe",
            CallToAction::UseApp => "Use App",
            CallToAction::WatchMore => "Watch More",
            CallToAction::WatchVideo => "Watch Video",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown call to action: {0}")]
pub struct UnknownCallToAction(pub String);

impl FromStr for CallToAction {
    type Err = UnknownCallToAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        CallToAction::ALL
            .into_iter()
            .find(|cta| cta.as_str() == wanted)
            .ok_or_else(|| UnknownCallToAction(s.to_string()))
    }
}

impl fmt::Display for CallToAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publish immediately or at a chosen time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PublishMode {
    #[default]
    Now,
    Scheduled(DateTime<Utc>),
}

/// User-entered fields shared by every page in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreativeValues {
    pub message: String,
    pub cta: CallToAction,
    /// Click-through link; blank means the page's own URL.
    pub link: String,
    pub cta_link_title: String,
    pub mode: PublishMode,
}

impl Default for CreativeValues {
    fn default() -> Self {
        Self {
            message: String::new(),
            cta: CallToAction::LikePage,
            link: String::new(),
            cta_link_title: "Like Page 🙏".to_string(),
            mode: PublishMode::Now,
        }
    }
}
