use careerlink_client::{
    ApiError, SocialApi,
    api::{BookmarkState, FollowState, LikeState, PostFilter, PostQuery, Result},
};
use careerlink_common::model::{
    comment::{Comment, CommentContent, CommentId},
    follow::{FollowCounts, FollowEdge},
    identity::{AccountId, Actor, ProfileId},
    page::{Page, PageRequest},
    post::{Categories, Post, PostCounters, PostId, PostStatus, ViewerFlags},
};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use time::OffsetDateTime;
use tokio::time::Instant;

pub fn actor(profile: u64, account: Option<u64>) -> Actor {
    Actor::new(
        ProfileId::new(profile),
        account.map(AccountId::new),
        format!("Member {profile}"),
    )
}

pub fn post(id: u64, author: Actor) -> Post {
    Post {
        id: PostId::new(id),
        author,
        content: format!("Post number {id}"),
        image_url: None,
        categories: Categories::default(),
        hashtags: Vec::new(),
        status: PostStatus::Published,
        counters: PostCounters::default(),
        viewer: ViewerFlags::default(),
        created_at: OffsetDateTime::UNIX_EPOCH,
    }
}

pub fn comment(id: u64, post_id: u64, author: Actor) -> Comment {
    Comment {
        id: CommentId::new(id),
        post_id: PostId::new(post_id),
        author,
        content: format!("Comment number {id}"),
        created_at: OffsetDateTime::UNIX_EPOCH,
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum Endpoint {
    FetchPosts,
    Search,
    Like,
    Bookmark,
    Follow,
    FollowStatus,
    FollowStatuses,
    FetchComments,
    CreateComment,
    DeleteComment,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Call {
    FetchPosts(PostFilter),
    Search(String),
    Like(PostId),
    Bookmark(PostId),
    Follow(AccountId),
    FollowStatus(AccountId),
    FollowStatuses(Vec<AccountId>),
    FetchComments(PostId),
    CreateComment(PostId, String),
    DeleteComment(PostId, CommentId),
}

impl Call {
    fn endpoint(&self) -> Endpoint {
        match self {
            Call::FetchPosts(_) => Endpoint::FetchPosts,
            Call::Search(_) => Endpoint::Search,
            Call::Like(_) => Endpoint::Like,
            Call::Bookmark(_) => Endpoint::Bookmark,
            Call::Follow(_) => Endpoint::Follow,
            Call::FollowStatus(_) => Endpoint::FollowStatus,
            Call::FollowStatuses(_) => Endpoint::FollowStatuses,
            Call::FetchComments(_) => Endpoint::FetchComments,
            Call::CreateComment(..) => Endpoint::CreateComment,
            Call::DeleteComment(..) => Endpoint::DeleteComment,
        }
    }
}

/// How a faked call fails. [`ApiError`] itself is not `Clone`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Failure {
    Unauthenticated,
    NotFound,
    Status(u16),
    Rejected,
}

impl Failure {
    fn to_error(self) -> ApiError {
        match self {
            Failure::Unauthenticated => ApiError::Unauthenticated,
            Failure::NotFound => ApiError::NotFound,
            Failure::Status(status) => ApiError::Status(status),
            Failure::Rejected => ApiError::Rejected {
                message: Some("rejected by fake".to_owned()),
            },
        }
    }
}

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<(Instant, Call)>,
    posts: Vec<Post>,
    search_hits: Option<Page<Post>>,
    likes: HashMap<PostId, LikeState>,
    bookmarks: HashSet<PostId>,
    following: HashSet<AccountId>,
    comments: HashMap<PostId, Vec<Comment>>,
    commenter: Option<Actor>,
    next_comment: u64,
    bulk: bool,
    failing: HashMap<Endpoint, Failure>,
    failing_follow_status: HashSet<AccountId>,
    delays: HashMap<Endpoint, VecDeque<Duration>>,
}

/// Server double. Each call is recorded, optionally delayed, optionally
/// failed, and otherwise applied to a tiny in-memory model of the backend.
#[derive(Debug, Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_posts(self, posts: Vec<Post>) -> Self {
        self.lock().posts = posts;
        self
    }

    /// Stage-one search answer. Without one the search endpoint returns nothing.
    pub fn with_search_hits(self, items: Vec<Post>, total: u64) -> Self {
        self.lock().search_hits = Some(Page { items, total });
        self
    }

    pub fn with_bulk_status(self) -> Self {
        self.lock().bulk = true;
        self
    }

    pub fn with_following(self, accounts: impl IntoIterator<Item = AccountId>) -> Self {
        self.lock().following.extend(accounts);
        self
    }

    pub fn with_comments(self, post: PostId, comments: Vec<Comment>) -> Self {
        {
            let mut state = self.lock();
            state.next_comment = state.next_comment.max(
                comments
                    .iter()
                    .map(|comment| comment.id.get())
                    .max()
                    .unwrap_or(0),
            );
            state.comments.insert(post, comments);
        }
        self
    }

    /// The author attached to comments the fake creates.
    pub fn with_commenter(self, author: Actor) -> Self {
        self.lock().commenter = Some(author);
        self
    }

    pub fn fail(&self, endpoint: Endpoint, failure: Failure) {
        self.lock().failing.insert(endpoint, failure);
    }

    pub fn recover(&self, endpoint: Endpoint) {
        self.lock().failing.remove(&endpoint);
    }

    pub fn fail_follow_status(&self, account: AccountId) {
        self.lock().failing_follow_status.insert(account);
    }

    /// Delays the next calls to `endpoint`, one entry per call.
    pub fn delay(&self, endpoint: Endpoint, delays: impl IntoIterator<Item = Duration>) {
        self.lock()
            .delays
            .entry(endpoint)
            .or_default()
            .extend(delays);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    pub fn call_count(&self, endpoint: Endpoint) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|(_, call)| call.endpoint() == endpoint)
            .count()
    }

    pub fn call_times(&self, endpoint: Endpoint) -> Vec<Instant> {
        self.lock()
            .calls
            .iter()
            .filter(|(_, call)| call.endpoint() == endpoint)
            .map(|(at, _)| *at)
            .collect()
    }

    pub fn like_state(&self, post: PostId) -> LikeState {
        self.lock().likes.get(&post).copied().unwrap_or_default()
    }

    pub fn is_following(&self, account: AccountId) -> bool {
        self.lock().following.contains(&account)
    }

    async fn begin(&self, call: Call) -> Result<()> {
        let endpoint = call.endpoint();
        let delay = {
            let mut state = self.lock();
            state.calls.push((Instant::now(), call));
            state
                .delays
                .get_mut(&endpoint)
                .and_then(VecDeque::pop_front)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.lock().failing.get(&endpoint) {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}

fn page_of<T: Clone>(items: &[T], page: PageRequest) -> Page<T> {
    let size = page.size as usize;
    Page {
        items: items
            .iter()
            .skip(page.page as usize * size)
            .take(size)
            .cloned()
            .collect(),
        total: items.len() as u64,
    }
}

impl SocialApi for FakeApi {
    async fn fetch_posts(&self, query: &PostQuery, _viewer: Option<AccountId>) -> Result<Page<Post>> {
        self.begin(Call::FetchPosts(query.filter.clone())).await?;

        Ok(page_of(&self.lock().posts, query.page))
    }

    async fn search_posts(
        &self,
        query: &str,
        _page: PageRequest,
        _viewer: Option<AccountId>,
    ) -> Result<Page<Post>> {
        self.begin(Call::Search(query.to_owned())).await?;
        Ok(self.lock().search_hits.clone().unwrap_or_default())
    }

    async fn toggle_like(&self, post: PostId, _viewer: AccountId) -> Result<LikeState> {
        self.begin(Call::Like(post)).await?;

        let mut state = self.lock();
        let like = state.likes.entry(post).or_default();
        like.liked = !like.liked;
        like.like_count = if like.liked {
            like.like_count + 1
        } else {
            like.like_count.saturating_sub(1)
        };
        Ok(*like)
    }

    async fn toggle_bookmark(&self, post: PostId, _viewer: AccountId) -> Result<BookmarkState> {
        self.begin(Call::Bookmark(post)).await?;

        let mut state = self.lock();
        let bookmarked = !state.bookmarks.remove(&post);
        if bookmarked {
            state.bookmarks.insert(post);
        }
        Ok(BookmarkState { bookmarked })
    }

    async fn toggle_follow(&self, edge: FollowEdge) -> Result<FollowState> {
        self.begin(Call::Follow(edge.following())).await?;

        let mut state = self.lock();
        let following = !state.following.remove(&edge.following());
        if following {
            state.following.insert(edge.following());
        }
        Ok(FollowState {
            following,
            counts: FollowCounts {
                followers_count: u64::from(following),
                following_count: 0,
            },
        })
    }

    async fn follow_status(&self, edge: FollowEdge) -> Result<bool> {
        self.begin(Call::FollowStatus(edge.following())).await?;

        let state = self.lock();
        if state.failing_follow_status.contains(&edge.following()) {
            return Err(ApiError::Status(503));
        }
        Ok(state.following.contains(&edge.following()))
    }

    async fn follow_statuses(
        &self,
        _follower: AccountId,
        following: &[AccountId],
    ) -> Result<Option<HashMap<AccountId, bool>>> {
        if !self.lock().bulk {
            return Ok(None);
        }
        self.begin(Call::FollowStatuses(following.to_vec())).await?;

        let state = self.lock();
        Ok(Some(
            following
                .iter()
                .map(|account| (*account, state.following.contains(account)))
                .collect(),
        ))
    }

    async fn fetch_comments(
        &self,
        post: PostId,
        _viewer: Option<AccountId>,
        page: PageRequest,
    ) -> Result<Page<Comment>> {
        self.begin(Call::FetchComments(post)).await?;

        let state = self.lock();
        Ok(page_of(
            state.comments.get(&post).map_or(&[], Vec::as_slice),
            page,
        ))
    }

    async fn create_comment(
        &self,
        post: PostId,
        author: AccountId,
        content: &CommentContent,
    ) -> Result<Comment> {
        self.begin(Call::CreateComment(post, content.get().to_owned()))
            .await?;

        let mut state = self.lock();
        state.next_comment += 1;
        let author = state
            .commenter
            .clone()
            .unwrap_or_else(|| actor(author.get(), Some(author.get())));
        let created = Comment {
            content: content.get().to_owned(),
            ..comment(state.next_comment, post.get(), author)
        };
        state.comments.entry(post).or_default().push(created.clone());
        Ok(created)
    }

    async fn delete_comment(&self, post: PostId, comment: CommentId, _author: AccountId) -> Result<()> {
        self.begin(Call::DeleteComment(post, comment)).await?;

        let mut state = self.lock();
        let comments = state.comments.get_mut(&post).ok_or(ApiError::NotFound)?;
        let before = comments.len();
        comments.retain(|held| held.id != comment);
        if comments.len() == before {
            return Err(ApiError::NotFound);
        }
        Ok(())
    }
}
