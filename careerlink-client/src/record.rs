//! JSON shapes exchanged with the remote service.

use crate::api::{BookmarkState, FollowState, LikeState};
use careerlink_common::model::{
    ModelValidationError,
    comment::{Comment, CommentId},
    follow::FollowCounts,
    identity::{AccountId, Actor, ProfileId},
    page::Page,
    post::{Categories, Category, Hashtag, Post, PostCounters, PostId, PostStatus, ViewerFlags},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub(crate) struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PageRecord<T> {
    pub content: Vec<T>,
    pub total_elements: u64,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthorRecord {
    pub profile_id: ProfileId,
    pub account_id: Option<AccountId>,
    pub display_name: String,
    pub job_title: Option<String>,
    pub profile_image_url: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostRecord {
    pub id: PostId,
    pub author: AuthorRecord,
    pub content: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub hashtags: Vec<Hashtag>,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub comments_count: u64,
    #[serde(default)]
    pub bookmarks_count: u64,
    #[serde(default)]
    pub is_liked: bool,
    #[serde(default)]
    pub is_bookmarked: bool,
    #[serde(default)]
    pub is_following: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommentRecord {
    pub id: CommentId,
    pub post_id: PostId,
    pub author: AuthorRecord,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LikeRecord {
    pub is_liked: bool,
    pub likes_count: u64,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BookmarkRecord {
    pub is_bookmarked: bool,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FollowRecord {
    pub following: bool,
    pub followers_count: u64,
    pub following_count: u64,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FollowStatusRecord {
    pub is_following: bool,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccountFollowStatusRecord {
    pub account_id: AccountId,
    pub is_following: bool,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FollowBody {
    pub follower_id: AccountId,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BulkFollowStatusBody {
    pub follower_id: AccountId,
    pub following_ids: Vec<AccountId>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateCommentBody {
    pub author_id: AccountId,
    pub content: String,
}

impl From<AuthorRecord> for Actor {
    fn from(value: AuthorRecord) -> Self {
        let mut actor = Actor::new(value.profile_id, value.account_id, value.display_name);
        actor.job_title = value.job_title;
        actor.avatar_url = value.profile_image_url;
        actor
    }
}

impl TryFrom<PostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            author: value.author.into(),
            content: value.content,
            image_url: value.image_url,
            categories: Categories::new(value.categories)?,
            hashtags: value.hashtags,
            status: value.status,
            counters: PostCounters {
                like_count: value.likes_count,
                comment_count: value.comments_count,
                bookmark_count: value.bookmarks_count,
            },
            viewer: ViewerFlags {
                liked: value.is_liked,
                bookmarked: value.is_bookmarked,
                following_author: value.is_following,
            },
            created_at: value.created_at,
        })
    }
}

impl From<CommentRecord> for Comment {
    fn from(value: CommentRecord) -> Self {
        Self {
            id: value.id,
            post_id: value.post_id,
            author: value.author.into(),
            content: value.content,
            created_at: value.created_at,
        }
    }
}

impl<R> PageRecord<R> {
    pub fn try_into_page<T>(self) -> Result<Page<T>, ModelValidationError>
    where
        T: TryFrom<R, Error = ModelValidationError>,
    {
        let items = self
            .content
            .into_iter()
            .map(T::try_from)
            .collect::<Result<_, _>>()?;

        Ok(Page {
            items,
            total: self.total_elements,
        })
    }

    pub fn into_page<T: From<R>>(self) -> Page<T> {
        Page {
            items: self.content.into_iter().map(T::from).collect(),
            total: self.total_elements,
        }
    }
}

impl From<LikeRecord> for LikeState {
    fn from(value: LikeRecord) -> Self {
        Self {
            liked: value.is_liked,
            like_count: value.likes_count,
        }
    }
}

impl From<BookmarkRecord> for BookmarkState {
    fn from(value: BookmarkRecord) -> Self {
        Self {
            bookmarked: value.is_bookmarked,
        }
    }
}

impl From<FollowRecord> for FollowState {
    fn from(value: FollowRecord) -> Self {
        Self {
            following: value.following,
            counts: FollowCounts {
                followers_count: value.followers_count,
                following_count: value.following_count,
            },
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer_id: Option<AccountId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    pub page: u32,
    pub size: u32,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccountQuery {
    pub account_id: AccountId,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FollowerQuery {
    pub follower_id: AccountId,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthorQuery {
    pub author_id: AccountId,
}
