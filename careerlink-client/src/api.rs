//! The remote service contract consumed by the synchronization core.

use careerlink_common::model::{
    ModelValidationError,
    comment::{Comment, CommentContent, CommentId},
    follow::{FollowCounts, FollowEdge},
    identity::AccountId,
    page::{Page, PageRequest},
    post::{Post, PostId},
};
use std::{collections::HashMap, future::Future};
use thiserror::Error;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("The credential was rejected by the server")]
    Unauthenticated,
    #[error("The requested entity does not exist")]
    NotFound,
    #[error("Server responded with status {0}")]
    Status(u16),
    #[error("Server rejected the request: {}", message.as_deref().unwrap_or("no message"))]
    Rejected { message: Option<String> },
    #[error("Server reported success without a payload")]
    MissingData,
    #[error("Request timed out")]
    Timeout,
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("Response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Server returned an invalid object: {0}")]
    Data(#[from] ModelValidationError),
}

impl ApiError {
    /// Server-side or network trouble that might go away on its own.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Status(status) => *status >= 500,
            ApiError::Timeout | ApiError::Transport(_) => true,
            ApiError::Unauthenticated
            | ApiError::NotFound
            | ApiError::Rejected { .. }
            | ApiError::MissingData
            | ApiError::Decode(_)
            | ApiError::Data(_) => false,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub enum PostFilter {
    #[default]
    All,
    Category(String),
    Following,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostQuery {
    pub filter: PostFilter,
    pub page: PageRequest,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct LikeState {
    pub liked: bool,
    pub like_count: u64,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct BookmarkState {
    pub bookmarked: bool,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct FollowState {
    pub following: bool,
    pub counts: FollowCounts,
}

/// Every method resolves to the payload of a successful envelope. Non-2xx
/// statuses and `success: false` envelopes surface as [`ApiError`]s.
pub trait SocialApi: Send + Sync {
    fn fetch_posts(
        &self,
        query: &PostQuery,
        viewer: Option<AccountId>,
    ) -> impl Future<Output = Result<Page<Post>>> + Send;

    fn search_posts(
        &self,
        query: &str,
        page: PageRequest,
        viewer: Option<AccountId>,
    ) -> impl Future<Output = Result<Page<Post>>> + Send;

    fn toggle_like(
        &self,
        post: PostId,
        viewer: AccountId,
    ) -> impl Future<Output = Result<LikeState>> + Send;

    fn toggle_bookmark(
        &self,
        post: PostId,
        viewer: AccountId,
    ) -> impl Future<Output = Result<BookmarkState>> + Send;

    fn toggle_follow(&self, edge: FollowEdge) -> impl Future<Output = Result<FollowState>> + Send;

    fn follow_status(&self, edge: FollowEdge) -> impl Future<Output = Result<bool>> + Send;

    /// Bulk relationship lookup. `Ok(None)` means the service has no bulk
    /// endpoint and callers must fall back to [`SocialApi::follow_status`].
    fn follow_statuses(
        &self,
        _follower: AccountId,
        _following: &[AccountId],
    ) -> impl Future<Output = Result<Option<HashMap<AccountId, bool>>>> + Send {
        async { Ok(None) }
    }

    fn fetch_comments(
        &self,
        post: PostId,
        viewer: Option<AccountId>,
        page: PageRequest,
    ) -> impl Future<Output = Result<Page<Comment>>> + Send;

    fn create_comment(
        &self,
        post: PostId,
        author: AccountId,
        content: &CommentContent,
    ) -> impl Future<Output = Result<Comment>> + Send;

    fn delete_comment(
        &self,
        post: PostId,
        comment: CommentId,
        author: AccountId,
    ) -> impl Future<Output = Result<()>> + Send;
}
