use serde::{Deserialize, Serialize};

/// One discovered post. Identity is `url`.
///
/// Every field except `url` carries a serde default: records written before
/// item metadata was collected must keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub url: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<u64>,
    #[serde(default)]
    pub created_at: String,
    #[serde(rename = "type", default)]
    pub kind: ItemKind,
    #[serde(alias = "pageType", default)]
    pub page_source: PageSource,
}

impl Item {
    /// A bare entry carrying only the link, used when richer metadata is unavailable.
    pub fn bare(
        url: impl Into<String>,
        author: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        let url = url.into();
        Self {
            kind: ItemKind::from_url(&url),
            url,
            author: author.into(),
            caption: String::new(),
            thumbnail_url: None,
            likes: 0,
            comments: 0,
            views: None,
            created_at: created_at.into(),
            page_source: PageSource::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    #[default]
    Post,
    Reel,
    Story,
}

impl ItemKind {
    pub fn from_url(url: &str) -> Self {
        if url.contains("/stories/") {
            ItemKind::Story
        } else if url.contains("/reel/") {
            ItemKind::Reel
        } else {
            ItemKind::Post
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Post => "post",
            ItemKind::Reel => "reel",
            ItemKind::Story => "story",
        }
    }
}

/// Which surface shape an item was harvested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSource {
    #[serde(alias = "main_profile")]
    ProfileGrid,
    ReelsTab,
    #[default]
    Other,
}

impl PageSource {
    pub fn as_str(self) -> &'static str {
        match self {
            PageSource::ProfileGrid => "profile_grid",
            PageSource::ReelsTab => "reels_tab",
            PageSource::Other => "other",
        }
    }
}

/// How a tick's items were found.
///
/// Lets callers tell "the page ended" apart from "the markup no longer matches".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Items came from recognised post containers.
    Structured,
    /// No container matched; items are bare post/reel anchors.
    AnchorFallback,
    /// Nothing on the page looked like a post.
    NoMatch,
}

/// Process-wide collection settings, persisted across jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub auto_scroll: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self { auto_scroll: true }
    }
}

/// A finished or stopped job handed over for (deferred) commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub username: String,
    pub items: Vec<Item>,
}

impl JobSnapshot {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
