use crate::{
    api::{
        ApiError, BookmarkState, FollowState, LikeState, PostFilter, PostQuery, Result, SocialApi,
    },
    record::{
        AccountFollowStatusRecord, AccountQuery, AuthorQuery, BookmarkRecord,
        BulkFollowStatusBody, CommentRecord, CreateCommentBody, Envelope, FollowBody,
        FollowRecord, FollowStatusRecord, FollowerQuery, LikeRecord, ListQuery, PageRecord,
        PostRecord,
    },
};
use careerlink_common::model::{
    auth::BearerToken,
    comment::{Comment, CommentContent, CommentId},
    follow::FollowEdge,
    identity::AccountId,
    page::{Page, PageRequest},
    post::{Post, PostId},
};
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::{DeserializeOwned, IgnoredAny};
use std::{collections::HashMap, time::Duration};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ApiClientBuildError {
    #[error("Invalid base url {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("Building the http client failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// HTTP implementation of [`SocialApi`].
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<BearerToken>,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        token: Option<BearerToken>,
        timeout: Duration,
    ) -> Result<Self, ApiClientBuildError> {
        let invalid = |reason: String| ApiClientBuildError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason,
        };

        let base_url = Url::parse(base_url.trim()).map_err(|err| invalid(err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(invalid("url cannot be a base".to_owned()));
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.url(segments);
        debug!(%method, %url, "Sending request");

        let request = self.http.request(method, url);
        match &self.token {
            Some(token) => request.bearer_auth(token.expose()),
            None => request,
        }
    }

    async fn envelope<T: DeserializeOwned>(request: RequestBuilder) -> Result<Envelope<T>> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        debug!(%status, "Received response");

        match status {
            StatusCode::UNAUTHORIZED => return Err(ApiError::Unauthenticated),
            StatusCode::NOT_FOUND => return Err(ApiError::NotFound),
            status if !status.is_success() => return Err(ApiError::Status(status.as_u16())),
            _ => {}
        }

        let body = response.bytes().await.map_err(transport_error)?;
        let envelope: Envelope<T> = serde_json::from_slice(&body)?;

        if envelope.success {
            Ok(envelope)
        } else {
            Err(ApiError::Rejected {
                message: envelope.message,
            })
        }
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        Self::envelope(request)
            .await?
            .data
            .ok_or(ApiError::MissingData)
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Transport(err)
    }
}

fn list_query(viewer: Option<AccountId>, page: PageRequest) -> ListQuery {
    ListQuery {
        viewer_id: viewer,
        q: None,
        page: page.page,
        size: page.size,
    }
}

impl SocialApi for ApiClient {
    async fn fetch_posts(&self, query: &PostQuery, viewer: Option<AccountId>) -> Result<Page<Post>> {
        let request = match &query.filter {
            PostFilter::All => self.request(Method::GET, &["posts"]),
            PostFilter::Category(category) => {
                self.request(Method::GET, &["posts", "category", category.as_str()])
            }
            PostFilter::Following => self.request(Method::GET, &["posts", "following"]),
        };

        let page: PageRecord<PostRecord> =
            Self::send(request.query(&list_query(viewer, query.page))).await?;
        Ok(page.try_into_page()?)
    }

    async fn search_posts(
        &self,
        query: &str,
        page: PageRequest,
        viewer: Option<AccountId>,
    ) -> Result<Page<Post>> {
        let query = ListQuery {
            q: Some(query.to_owned()),
            ..list_query(viewer, page)
        };
        let request = self.request(Method::GET, &["posts", "search"]).query(&query);

        let page: PageRecord<PostRecord> = Self::send(request).await?;
        Ok(page.try_into_page()?)
    }

    async fn toggle_like(&self, post: PostId, viewer: AccountId) -> Result<LikeState> {
        let post = post.to_string();
        let request = self
            .request(Method::POST, &["posts", post.as_str(), "like"])
            .query(&AccountQuery { account_id: viewer });

        let record: LikeRecord = Self::send(request).await?;
        Ok(record.into())
    }

    async fn toggle_bookmark(&self, post: PostId, viewer: AccountId) -> Result<BookmarkState> {
        let post = post.to_string();
        let request = self
            .request(Method::POST, &["posts", post.as_str(), "bookmark"])
            .query(&AccountQuery { account_id: viewer });

        let record: BookmarkRecord = Self::send(request).await?;
        Ok(record.into())
    }

    async fn toggle_follow(&self, edge: FollowEdge) -> Result<FollowState> {
        let following = edge.following().to_string();
        let request = self
            .request(Method::POST, &["follows", following.as_str()])
            .json(&FollowBody {
                follower_id: edge.follower(),
            });

        let record: FollowRecord = Self::send(request).await?;
        Ok(record.into())
    }

    async fn follow_status(&self, edge: FollowEdge) -> Result<bool> {
        let following = edge.following().to_string();
        let request = self
            .request(Method::GET, &["follows", following.as_str(), "status"])
            .query(&FollowerQuery {
                follower_id: edge.follower(),
            });

        let record: FollowStatusRecord = Self::send(request).await?;
        Ok(record.is_following)
    }

    async fn follow_statuses(
        &self,
        follower: AccountId,
        following: &[AccountId],
    ) -> Result<Option<HashMap<AccountId, bool>>> {
        let request = self
            .request(Method::POST, &["follows", "status"])
            .json(&BulkFollowStatusBody {
                follower_id: follower,
                following_ids: following.to_vec(),
            });

        match Self::send::<Vec<AccountFollowStatusRecord>>(request).await {
            Ok(records) => Ok(Some(
                records
                    .into_iter()
                    .map(|record| (record.account_id, record.is_following))
                    .collect(),
            )),
            // Older deployments have no bulk endpoint.
            Err(ApiError::NotFound | ApiError::Status(405)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn fetch_comments(
        &self,
        post: PostId,
        viewer: Option<AccountId>,
        page: PageRequest,
    ) -> Result<Page<Comment>> {
        let post = post.to_string();
        let request = self
            .request(Method::GET, &["posts", post.as_str(), "comments"])
            .query(&list_query(viewer, page));

        let page: PageRecord<CommentRecord> = Self::send(request).await?;
        Ok(page.into_page())
    }

    async fn create_comment(
        &self,
        post: PostId,
        author: AccountId,
        content: &CommentContent,
    ) -> Result<Comment> {
        let post = post.to_string();
        let request = self
            .request(Method::POST, &["posts", post.as_str(), "comments"])
            .json(&CreateCommentBody {
                author_id: author,
                content: content.get().to_owned(),
            });

        let record: CommentRecord = Self::send(request).await?;
        Ok(record.into())
    }

    async fn delete_comment(
        &self,
        post: PostId,
        comment: CommentId,
        author: AccountId,
    ) -> Result<()> {
        let (post, comment) = (post.to_string(), comment.to_string());
        let request = self
            .request(
                Method::DELETE,
                &["posts", post.as_str(), "comments", comment.as_str()],
            )
            .query(&AuthorQuery { author_id: author });

        Self::envelope::<IgnoredAny>(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        api::{ApiError, PostFilter, PostQuery, SocialApi},
        client::ApiClient,
        record::{
            AccountQuery, AuthorQuery, AuthorRecord, CommentRecord, CreateCommentBody, Envelope,
            LikeRecord, ListQuery, PageRecord, PostRecord,
        },
    };
    use axum::{
        Json, Router,
        extract::Query,
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    use axum_extra::{
        TypedHeader,
        routing::{RouterExt, TypedPath},
    };
    use careerlink_common::model::{
        auth::BearerToken,
        comment::{CommentContent, CommentId},
        follow::FollowEdge,
        identity::{AccountId, ProfileId},
        page::PageRequest,
        post::{PostId, PostStatus},
    };
    use headers::{Authorization, authorization::Bearer};
    use serde::{Deserialize, Serialize};
    use std::time::Duration;
    use time::macros::datetime;

    const TOKEN: &str = "test-token";

    async fn serve(router: Router) -> ApiClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        ApiClient::new(
            &format!("http://{address}/api/"),
            Some(BearerToken::new(TOKEN)),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
        Json(Envelope {
            success: true,
            data: Some(data),
            message: None,
        })
    }

    fn author(profile: u64, account: u64) -> AuthorRecord {
        AuthorRecord {
            profile_id: ProfileId::new(profile),
            account_id: Some(AccountId::new(account)),
            display_name: format!("user {profile}"),
            job_title: Some("Engineer".to_owned()),
            profile_image_url: None,
        }
    }

    fn post_record(id: u64) -> PostRecord {
        PostRecord {
            id: PostId::new(id),
            author: author(10 + id, 100 + id),
            content: format!("post {id}"),
            image_url: None,
            categories: Vec::new(),
            hashtags: Vec::new(),
            status: PostStatus::Published,
            likes_count: 3,
            comments_count: 1,
            bookmarks_count: 0,
            is_liked: true,
            is_bookmarked: false,
            is_following: false,
            created_at: datetime!(2025-06-01 12:00 UTC),
        }
    }

    #[derive(TypedPath)]
    #[typed_path("/api/posts")]
    struct PostsPath;

    #[derive(TypedPath, Deserialize)]
    #[typed_path("/api/posts/{id}/like")]
    struct LikePath {
        id: PostId,
    }

    #[derive(TypedPath, Deserialize)]
    #[typed_path("/api/posts/{id}/comments")]
    struct CommentsPath {
        id: PostId,
    }

    #[derive(TypedPath, Deserialize)]
    #[typed_path("/api/posts/{post_id}/comments/{comment_id}")]
    struct CommentPath {
        post_id: PostId,
        comment_id: CommentId,
    }

    #[derive(TypedPath, Deserialize)]
    #[typed_path("/api/follows/{id}/status")]
    struct FollowStatusPath {
        id: AccountId,
    }

    #[tokio::test]
    async fn fetch_posts_sends_bearer_and_viewer() {
        async fn posts(
            PostsPath: PostsPath,
            TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
            Query(query): Query<ListQuery>,
        ) -> Response {
            if auth.token() != TOKEN || query.viewer_id != Some(AccountId::new(7)) {
                return StatusCode::BAD_REQUEST.into_response();
            }
            ok(PageRecord {
                content: vec![post_record(1), post_record(2)],
                total_elements: 9,
            })
            .into_response()
        }

        let client = serve(Router::new().typed_get(posts)).await;
        let page = client
            .fetch_posts(&PostQuery::default(), Some(AccountId::new(7)))
            .await
            .unwrap();

        assert_eq!(page.total, 9);
        assert!(page.is_partial());
        assert_eq!(page.items[0].id, PostId::new(1));
        assert_eq!(page.items[1].author.account_id(), Some(AccountId::new(102)));
        assert!(page.items[0].viewer.liked);
    }

    #[tokio::test]
    async fn unsuccessful_envelope_is_rejected() {
        async fn posts(PostsPath: PostsPath) -> Json<Envelope<()>> {
            Json(Envelope {
                success: false,
                data: None,
                message: Some("nope".to_owned()),
            })
        }

        let client = serve(Router::new().typed_get(posts)).await;
        let err = client
            .fetch_posts(&PostQuery::default(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Rejected { message: Some(ref m) } if m == "nope"));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn statuses_map_to_error_kinds() {
        async fn like(LikePath { id }: LikePath) -> StatusCode {
            match id.get() {
                1 => StatusCode::UNAUTHORIZED,
                2 => StatusCode::NOT_FOUND,
                _ => StatusCode::SERVICE_UNAVAILABLE,
            }
        }

        let client = serve(Router::new().typed_post(like)).await;
        let viewer = AccountId::new(1);

        assert!(matches!(
            client.toggle_like(PostId::new(1), viewer).await,
            Err(ApiError::Unauthenticated)
        ));
        assert!(matches!(
            client.toggle_like(PostId::new(2), viewer).await,
            Err(ApiError::NotFound)
        ));
        let unavailable = client.toggle_like(PostId::new(3), viewer).await.unwrap_err();
        assert!(matches!(unavailable, ApiError::Status(503)));
        assert!(unavailable.is_transient());
    }

    #[tokio::test]
    async fn toggle_like_returns_server_state() {
        async fn like(LikePath { id }: LikePath, Query(query): Query<AccountQuery>) -> Response {
            if id != PostId::new(5) || query.account_id != AccountId::new(8) {
                return StatusCode::BAD_REQUEST.into_response();
            }
            ok(LikeRecord {
                is_liked: true,
                likes_count: 12,
            })
            .into_response()
        }

        let client = serve(Router::new().typed_post(like)).await;
        let state = client
            .toggle_like(PostId::new(5), AccountId::new(8))
            .await
            .unwrap();

        assert!(state.liked);
        assert_eq!(state.like_count, 12);
    }

    #[tokio::test]
    async fn string_ids_from_the_wire_are_accepted() {
        async fn status(FollowStatusPath { id }: FollowStatusPath) -> Response {
            let body = format!(
                r#"{{"success":true,"data":{{"isFollowing":{}}}}}"#,
                id == AccountId::new(4)
            );
            ([("content-type", "application/json")], body).into_response()
        }
        async fn comments(CommentsPath { id }: CommentsPath) -> Response {
            let body = format!(
                r#"{{"success":true,"data":{{"totalElements":1,"content":[{{
                    "id":"31","postId":"{id}","content":"hi",
                    "createdAt":"2025-06-01T12:00:00Z",
                    "author":{{"profileId":"5","accountId":"55","displayName":"Kim"}}
                }}]}}}}"#
            );
            ([("content-type", "application/json")], body).into_response()
        }

        let client = serve(Router::new().typed_get(status).typed_get(comments)).await;

        let edge = FollowEdge::new(AccountId::new(1), AccountId::new(4)).unwrap();
        assert!(client.follow_status(edge).await.unwrap());

        let page = client
            .fetch_comments(PostId::new(3), None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.items[0].id, CommentId::new(31));
        assert_eq!(page.items[0].post_id, PostId::new(3));
        assert_eq!(page.items[0].author.account_id(), Some(AccountId::new(55)));
    }

    #[tokio::test]
    async fn create_and_delete_comment() {
        async fn create(
            CommentsPath { id }: CommentsPath,
            Json(body): Json<CreateCommentBody>,
        ) -> Json<Envelope<CommentRecord>> {
            ok(CommentRecord {
                id: CommentId::new(77),
                post_id: id,
                author: author(1, body.author_id.get()),
                content: body.content,
                created_at: datetime!(2025-06-01 12:00 UTC),
            })
        }
        async fn delete(
            CommentPath {
                post_id,
                comment_id,
            }: CommentPath,
            Query(query): Query<AuthorQuery>,
        ) -> Response {
            if post_id == PostId::new(2)
                && comment_id == CommentId::new(77)
                && query.author_id == AccountId::new(9)
            {
                Json(Envelope::<()> {
                    success: true,
                    data: None,
                    message: None,
                })
                .into_response()
            } else {
                StatusCode::NOT_FOUND.into_response()
            }
        }

        let client = serve(Router::new().typed_post(create).typed_delete(delete)).await;
        let content = CommentContent::new("  nice post ").unwrap();

        let comment = client
            .create_comment(PostId::new(2), AccountId::new(9), &content)
            .await
            .unwrap();
        assert_eq!(comment.content, "nice post");
        assert_eq!(comment.author.account_id(), Some(AccountId::new(9)));

        client
            .delete_comment(PostId::new(2), comment.id, AccountId::new(9))
            .await
            .unwrap();
        assert!(matches!(
            client
                .delete_comment(PostId::new(2), comment.id, AccountId::new(10))
                .await,
            Err(ApiError::NotFound)
        ));
    }

    #[tokio::test]
    async fn missing_bulk_endpoint_falls_back() {
        let client = serve(Router::new()).await;

        let statuses = client
            .follow_statuses(AccountId::new(1), &[AccountId::new(2)])
            .await
            .unwrap();
        assert_eq!(statuses, None);
    }

    #[tokio::test]
    async fn category_filter_is_path_encoded() {
        #[derive(TypedPath, Deserialize)]
        #[typed_path("/api/posts/category/{category}")]
        struct CategoryPath {
            category: String,
        }

        async fn by_category(CategoryPath { category }: CategoryPath) -> Response {
            if category != "data science" {
                return StatusCode::BAD_REQUEST.into_response();
            }
            ok(PageRecord::<PostRecord> {
                content: Vec::new(),
                total_elements: 0,
            })
            .into_response()
        }

        let client = serve(Router::new().typed_get(by_category)).await;
        let query = PostQuery {
            filter: PostFilter::Category("data science".to_owned()),
            ..PostQuery::default()
        };

        assert!(client.fetch_posts(&query, None).await.unwrap().is_empty());
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(ApiClient::new("not a url", None, Duration::from_secs(1)).is_err());
        assert!(ApiClient::new("mailto:someone@example.com", None, Duration::from_secs(1)).is_err());
    }
}
