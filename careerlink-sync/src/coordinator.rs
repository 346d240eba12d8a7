//! Optimistic mutations with server reconciliation.
//!
//! Every mutation is validated locally first. Toggles then show their
//! predicted value in one store transaction, call the server, and either take
//! the server's answer or undo their own prediction. Calls for the same
//! toggle on the same target are sent one after another, so the server sees
//! them in the order the user made them.

use crate::{
    error::{SyncError, ValidationError},
    identity::IdentityResolver,
    store::{ViewState, ViewStore},
};
use careerlink_client::{ApiError, SocialApi, api};
use careerlink_common::model::{
    comment::{Comment, CommentContent, CommentId},
    follow::{FollowCounts, FollowEdge},
    identity::{AccountId, Viewer},
    post::PostId,
};
use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use thiserror::Error;
use tokio::{sync::OwnedMutexGuard, time};
use tracing::{debug, warn};

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Mutation {
    Like(PostId),
    Bookmark(PostId),
    Follow(AccountId),
    CommentAdd { post: PostId, content: String },
    CommentDelete { post: PostId, comment: CommentId },
}

/// Server-confirmed outcome of a mutation.
///
/// Comment counts are `None` when no view held the post any more.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Confirmed {
    Like {
        post: PostId,
        liked: bool,
        like_count: u64,
    },
    Bookmark {
        post: PostId,
        bookmarked: bool,
        bookmark_count: Option<u64>,
    },
    Follow {
        account: AccountId,
        following: bool,
        counts: FollowCounts,
    },
    CommentAdded {
        comment: Comment,
        comment_count: Option<u64>,
    },
    CommentDeleted {
        post: PostId,
        comment: CommentId,
        comment_count: Option<u64>,
    },
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
#[error("{error}")]
pub struct MutationFailure {
    pub error: SyncError,
    /// Whether an optimistic change was undone. Local failures never apply one.
    pub rolled_back: bool,
}

impl MutationFailure {
    fn local(error: impl Into<SyncError>) -> Self {
        Self {
            error: error.into(),
            rolled_back: false,
        }
    }

    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        self.error.needs_refresh()
    }
}

pub type MutationResult = Result<Confirmed, MutationFailure>;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
enum Lane {
    Like(PostId),
    Bookmark(PostId),
    Follow(AccountId),
}

pub struct MutationCoordinator<A> {
    api: Arc<A>,
    store: Arc<ViewStore>,
    identities: Arc<IdentityResolver>,
    viewer: Viewer,
    request_timeout: Duration,
    lanes: Mutex<HashMap<Lane, Arc<tokio::sync::Mutex<()>>>>,
}

impl<A: SocialApi> MutationCoordinator<A> {
    pub fn new(
        api: Arc<A>,
        store: Arc<ViewStore>,
        identities: Arc<IdentityResolver>,
        viewer: Viewer,
        request_timeout: Duration,
    ) -> Self {
        Self {
            api,
            store,
            identities,
            viewer,
            request_timeout,
            lanes: Mutex::default(),
        }
    }

    #[must_use]
    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub async fn apply(&self, mutation: Mutation) -> MutationResult {
        match mutation {
            Mutation::Like(post) => self.toggle_like(post).await,
            Mutation::Bookmark(post) => self.toggle_bookmark(post).await,
            Mutation::Follow(account) => self.toggle_follow(account).await,
            Mutation::CommentAdd { post, content } => self.add_comment(post, &content).await,
            Mutation::CommentDelete { post, comment } => self.delete_comment(post, comment).await,
        }
    }

    pub async fn toggle_like(&self, post: PostId) -> MutationResult {
        let op = self
            .store
            .update(|state| {
                ensure_published(state, post)?;
                state
                    .propose_like(post)
                    .map(|proposal| proposal.op)
                    .ok_or(ValidationError::UnknownPost(post))
            })
            .map_err(MutationFailure::local)?;
        debug!(%post, ?op, "Applied optimistic like toggle");

        let _lane = self.enter(Lane::Like(post)).await;
        match self
            .remote(self.api.toggle_like(post, self.viewer.account_id))
            .await
        {
            Ok(like) => {
                self.store.update(|state| {
                    state.confirm_like(post, op, like.liked, like.like_count);
                });
                Ok(Confirmed::Like {
                    post,
                    liked: like.liked,
                    like_count: like.like_count,
                })
            }
            Err(error) => {
                let rolled_back = self.store.update(|state| state.revert_like(post, op));
                warn!(%post, ?op, %error, rolled_back, "Like toggle failed");
                Err(MutationFailure { error, rolled_back })
            }
        }
    }

    pub async fn toggle_bookmark(&self, post: PostId) -> MutationResult {
        let op = self
            .store
            .update(|state| {
                ensure_published(state, post)?;
                state
                    .propose_bookmark(post)
                    .map(|proposal| proposal.op)
                    .ok_or(ValidationError::UnknownPost(post))
            })
            .map_err(MutationFailure::local)?;
        debug!(%post, ?op, "Applied optimistic bookmark toggle");

        let _lane = self.enter(Lane::Bookmark(post)).await;
        match self
            .remote(self.api.toggle_bookmark(post, self.viewer.account_id))
            .await
        {
            Ok(bookmark) => {
                let bookmark_count = self
                    .store
                    .update(|state| state.confirm_bookmark(post, op, bookmark.bookmarked));
                Ok(Confirmed::Bookmark {
                    post,
                    bookmarked: bookmark.bookmarked,
                    bookmark_count,
                })
            }
            Err(error) => {
                let rolled_back = self.store.update(|state| state.revert_bookmark(post, op));
                warn!(%post, ?op, %error, rolled_back, "Bookmark toggle failed");
                Err(MutationFailure { error, rolled_back })
            }
        }
    }

    pub async fn toggle_follow(&self, account: AccountId) -> MutationResult {
        let edge = FollowEdge::new(self.viewer.account_id, account)
            .map_err(|err| MutationFailure::local(ValidationError::from(err)))?;

        let op = self.store.update(|state| state.propose_follow(account)).op;
        debug!(%account, ?op, "Applied optimistic follow toggle");

        let _lane = self.enter(Lane::Follow(account)).await;
        match self.remote(self.api.toggle_follow(edge)).await {
            Ok(follow) => {
                self.store.update(|state| {
                    state.confirm_follow(account, op, follow.following, follow.counts);
                });
                Ok(Confirmed::Follow {
                    account,
                    following: follow.following,
                    counts: follow.counts,
                })
            }
            Err(error) => {
                let rolled_back = self.store.update(|state| state.revert_follow(account, op));
                warn!(%account, ?op, %error, rolled_back, "Follow toggle failed");
                Err(MutationFailure { error, rolled_back })
            }
        }
    }

    /// Comments are not shown before the server created them.
    pub async fn add_comment(&self, post: PostId, content: &str) -> MutationResult {
        let content = CommentContent::new(content)
            .map_err(|err| MutationFailure::local(ValidationError::from(err)))?;
        self.store
            .read(|state| ensure_published(state, post))
            .map_err(MutationFailure::local)?;

        let comment = self
            .remote(
                self.api
                    .create_comment(post, self.viewer.account_id, &content),
            )
            .await
            .map_err(|error| {
                warn!(%post, %error, "Adding comment failed");
                MutationFailure {
                    error,
                    rolled_back: false,
                }
            })?;

        self.identities.register(&comment.author);
        let comment_count = self
            .store
            .update(|state| state.comment_added(post, comment.clone()));
        debug!(%post, comment = %comment.id, ?comment_count, "Comment added");

        Ok(Confirmed::CommentAdded {
            comment,
            comment_count,
        })
    }

    pub async fn delete_comment(&self, post: PostId, comment: CommentId) -> MutationResult {
        let target = self
            .store
            .read(|state| state.find_comment(post, comment).cloned())
            .ok_or_else(|| {
                MutationFailure::local(ValidationError::UnknownComment { post, comment })
            })?;
        self.identities
            .authorize_comment_delete(&self.viewer, &target)
            .map_err(MutationFailure::local)?;

        let hidden = self
            .store
            .update(|state| state.hide_comment(post, comment));
        debug!(%post, %comment, hidden, "Applied optimistic comment delete");

        match self
            .remote(
                self.api
                    .delete_comment(post, comment, self.viewer.account_id),
            )
            .await
        {
            Ok(()) => {
                let comment_count = self
                    .store
                    .update(|state| state.comment_deleted(post, comment));
                Ok(Confirmed::CommentDeleted {
                    post,
                    comment,
                    comment_count,
                })
            }
            Err(error) => {
                let rolled_back = self
                    .store
                    .update(|state| state.restore_comment(post, comment));
                warn!(%post, %comment, %error, rolled_back, "Comment delete failed");
                Err(MutationFailure { error, rolled_back })
            }
        }
    }

    async fn remote<T>(&self, call: impl Future<Output = api::Result<T>>) -> Result<T, SyncError> {
        match time::timeout(self.request_timeout, call).await {
            Ok(result) => result.map_err(SyncError::from),
            Err(_) => Err(ApiError::Timeout.into()),
        }
    }

    /// Waits until earlier calls on the same lane have completed.
    async fn enter(&self, lane: Lane) -> OwnedMutexGuard<()> {
        let lane = {
            let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
            lanes.retain(|_, held| Arc::strong_count(held) > 1);
            Arc::clone(lanes.entry(lane).or_default())
        };
        lane.lock_owned().await
    }
}

fn ensure_published(state: &ViewState, post: PostId) -> Result<(), ValidationError> {
    match state.is_published(post) {
        None => Err(ValidationError::UnknownPost(post)),
        Some(false) => Err(ValidationError::DraftPost(post)),
        Some(true) => Ok(()),
    }
}
