use crate::model::{Id, identity::Actor, post::PostId};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

pub type CommentId = Id<CommentMarker>;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author: Actor,
    pub content: String,
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Comment content is empty")]
pub struct EmptyCommentError;

/// Comment text that is non-empty after trimming.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct CommentContent(String);

impl CommentContent {
    pub fn new(content: &str) -> Result<Self, EmptyCommentError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            Err(EmptyCommentError)
        } else {
            Ok(Self(trimmed.to_owned()))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}
