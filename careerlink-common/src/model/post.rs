use crate::model::{Id, identity::Actor};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

pub const HASHTAG_MARKER: char = '#';

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

pub type PostId = Id<PostMarker>;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Post {
    pub id: PostId,
    pub author: Actor,
    pub content: String,
    pub image_url: Option<String>,
    pub categories: Categories,
    pub hashtags: Vec<Hashtag>,
    pub status: PostStatus,
    pub counters: PostCounters,
    pub viewer: ViewerFlags,
    pub created_at: OffsetDateTime,
}

impl Post {
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostStatus {
    Draft,
    #[default]
    Published,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostCounters {
    pub like_count: u64,
    pub comment_count: u64,
    pub bookmark_count: u64,
}

/// Per-viewer derived state. Never shared with other viewers.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct ViewerFlags {
    pub liked: bool,
    pub bookmarked: bool,
    pub following_author: bool,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Job,
    Topic,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
pub struct Category {
    pub kind: CategoryKind,
    pub name: String,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
#[error("A post may carry at most one {0:?} category")]
pub struct DuplicateCategoryError(CategoryKind);

/// At most one job category and at most one topic category.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct Categories {
    job: Option<String>,
    topic: Option<String>,
}

impl Categories {
    pub fn new(categories: impl IntoIterator<Item = Category>) -> Result<Self, DuplicateCategoryError> {
        let mut result = Self::default();

        for category in categories {
            let slot = match category.kind {
                CategoryKind::Job => &mut result.job,
                CategoryKind::Topic => &mut result.topic,
            };
            if slot.replace(category.name).is_some() {
                return Err(DuplicateCategoryError(category.kind));
            }
        }

        Ok(result)
    }

    #[must_use]
    pub fn job(&self) -> Option<&str> {
        self.job.as_deref()
    }

    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }
}

/// A hashtag stored without its leading marker.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Hashtag(String);

impl Hashtag {
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self(strip_hashtag_marker(raw).to_owned())
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Hashtag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Hashtag::new(&raw))
    }
}

#[must_use]
pub fn strip_hashtag_marker(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix(HASHTAG_MARKER).unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use crate::model::post::{Categories, Category, CategoryKind, Hashtag};

    fn category(kind: CategoryKind, name: &str) -> Category {
        Category {
            kind,
            name: name.to_owned(),
        }
    }

    #[test]
    fn one_category_of_each_kind() {
        let categories = Categories::new([
            category(CategoryKind::Job, "Backend"),
            category(CategoryKind::Topic, "Interviews"),
        ])
        .unwrap();

        assert_eq!(categories.job(), Some("Backend"));
        assert_eq!(categories.topic(), Some("Interviews"));
    }

    #[test]
    fn second_job_category_is_rejected() {
        assert!(
            Categories::new([
                category(CategoryKind::Job, "Backend"),
                category(CategoryKind::Job, "Frontend"),
            ])
            .is_err()
        );
    }

    #[test]
    fn hashtag_marker_is_stripped() {
        assert_eq!(Hashtag::new("#rust").get(), "rust");
        assert_eq!(Hashtag::new(" rust ").get(), "rust");
        assert_eq!(Hashtag::new("##rust").get(), "#rust");
    }
}
