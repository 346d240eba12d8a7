use careerlink_client::ApiError;
use careerlink_common::model::{
    comment::{CommentId, EmptyCommentError},
    follow::SelfFollowError,
    identity::AccountId,
    post::PostId,
};
use thiserror::Error;

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// Rejected locally, before anything was sent or changed.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ValidationError {
    #[error(transparent)]
    EmptyComment(#[from] EmptyCommentError),
    #[error(transparent)]
    SelfFollow(#[from] SelfFollowError),
    #[error("Post {0} is not held by any view")]
    UnknownPost(PostId),
    #[error("Post {0} is a draft")]
    DraftPost(PostId),
    #[error("Comment {comment} is not loaded for post {post}")]
    UnknownComment { post: PostId, comment: CommentId },
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum AuthorizationError {
    #[error("Comment {comment} belongs to another account")]
    NotCommentAuthor { comment: CommentId },
    #[error("The author of comment {comment} has no known account")]
    UnknownAuthorAccount { comment: CommentId },
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum ErrorKind {
    Validation,
    Authorization,
    Authentication,
    NotFound,
    TransientServer,
    Rejected,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error("The session is no longer authenticated")]
    Authentication,
    #[error("The target no longer exists on the server")]
    NotFound,
    #[error("The server is unavailable: {0}")]
    TransientServer(String),
    #[error("The server rejected the request: {0}")]
    Rejected(String),
}

impl SyncError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Validation(_) => ErrorKind::Validation,
            SyncError::Authorization(_) => ErrorKind::Authorization,
            SyncError::Authentication => ErrorKind::Authentication,
            SyncError::NotFound => ErrorKind::NotFound,
            SyncError::TransientServer(_) => ErrorKind::TransientServer,
            SyncError::Rejected(_) => ErrorKind::Rejected,
        }
    }

    /// The containing collection is probably stale and worth reloading.
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        matches!(self, SyncError::NotFound)
    }
}

impl From<ApiError> for SyncError {
    fn from(value: ApiError) -> Self {
        match value {
            ApiError::Unauthenticated => SyncError::Authentication,
            ApiError::NotFound => SyncError::NotFound,
            ApiError::Rejected { message } => {
                SyncError::Rejected(message.unwrap_or_else(|| "no reason given".to_owned()))
            }
            err if err.is_transient() => SyncError::TransientServer(err.to_string()),
            err => SyncError::Rejected(err.to_string()),
        }
    }
}

/// Some items of a batch could not be fetched and were given a safe default.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Error)]
#[error("{} of the relationship lookups failed", failed.len())]
pub struct PartialDataError {
    pub failed: Vec<AccountId>,
}
