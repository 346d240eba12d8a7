use crate::{
    config::SyncConfig,
    coordinator::MutationCoordinator,
    error::{Result, SyncError, ValidationError},
    identity::IdentityResolver,
    reconciler::{FollowStateReconciler, ReconcileReport, VisibilityWatch},
    search::{DebouncedSearch, SearchPipeline, SearchResults},
    store::{CollectionName, ViewState, ViewStore},
};
use careerlink_client::{
    ApiError, SocialApi,
    api::{self, PostFilter, PostQuery},
};
use careerlink_common::model::{
    comment::Comment,
    identity::Viewer,
    page::PageRequest,
    post::{Post, PostId},
};
use std::{future::Future, sync::Arc};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// One viewer's feed, detail dialog and search, wired to the shared store.
pub struct FeedSession<A> {
    api: Arc<A>,
    config: SyncConfig,
    viewer: Viewer,
    store: Arc<ViewStore>,
    identities: Arc<IdentityResolver>,
    coordinator: MutationCoordinator<A>,
    reconciler: Arc<FollowStateReconciler<A>>,
    search: Arc<SearchPipeline<A>>,
}

impl<A: SocialApi> FeedSession<A> {
    pub fn new(api: Arc<A>, config: SyncConfig, viewer: Viewer) -> Self {
        let timeout = config.request_timeout.get();
        let store = Arc::new(ViewStore::new(config.comment_page_step));
        let identities = Arc::new(IdentityResolver::new());

        let coordinator = MutationCoordinator::new(
            Arc::clone(&api),
            Arc::clone(&store),
            Arc::clone(&identities),
            viewer,
            timeout,
        );
        let reconciler = Arc::new(FollowStateReconciler::new(
            Arc::clone(&api),
            Arc::clone(&store),
            config.follow_throttle_threshold,
            config.follow_throttle_delay.get(),
            timeout,
        ));
        let search = Arc::new(SearchPipeline::new(
            Arc::clone(&api),
            config.search_page_size,
            config.fallback_scan_size,
            timeout,
        ));

        Self {
            api,
            config,
            viewer,
            store,
            identities,
            coordinator,
            reconciler,
            search,
        }
    }

    #[must_use]
    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    #[must_use]
    pub fn store(&self) -> &Arc<ViewStore> {
        &self.store
    }

    #[must_use]
    pub fn identities(&self) -> &IdentityResolver {
        &self.identities
    }

    #[must_use]
    pub fn coordinator(&self) -> &MutationCoordinator<A> {
        &self.coordinator
    }

    #[must_use]
    pub fn reconciler(&self) -> &Arc<FollowStateReconciler<A>> {
        &self.reconciler
    }

    #[must_use]
    pub fn feed(&self) -> Vec<Post> {
        self.store.collection(&CollectionName::Feed)
    }

    /// Replaces the feed with the first page of `filter` and reconciles the
    /// follow state of its authors. Drafts are never shown.
    pub async fn load_feed(&self, filter: PostFilter) -> Result<ReconcileReport> {
        let query = PostQuery {
            filter,
            page: PageRequest::default(),
        };
        let fetched_at = self.store.begin_fetch();
        let page = self
            .remote(self.api.fetch_posts(&query, Some(self.viewer.account_id)))
            .await?;

        let posts: Vec<Post> = page.items.into_iter().filter(Post::is_published).collect();
        self.identities
            .register_all(posts.iter().map(|post| &post.author));
        info!(filter = ?query.filter, posts = posts.len(), total = page.total, "Loaded feed");

        self.store
            .replace_fetched(CollectionName::Feed, posts.clone(), fetched_at);
        Ok(self.reconciler.reconcile(&posts, &self.viewer).await)
    }

    /// Opens the detail dialog for a post some view already shows and loads
    /// all of its comments, page by page. Returns the loaded comment count.
    pub async fn open_detail(&self, post: PostId) -> Result<Option<u64>> {
        if !self.store.update(|state| state.open_detail(post)) {
            return Err(ValidationError::UnknownPost(post).into());
        }

        let comments = self.fetch_thread(post).await?;
        self.identities
            .register_all(comments.iter().map(|comment| &comment.author));
        let count = self
            .store
            .update(|state| state.load_comments(post, comments));
        debug!(%post, ?count, "Loaded comments");
        Ok(count)
    }

    async fn fetch_thread(&self, post: PostId) -> Result<Vec<Comment>> {
        let mut request = PageRequest::first(self.config.comment_fetch_size);
        let mut comments = Vec::new();

        loop {
            let page = self
                .remote(
                    self.api
                        .fetch_comments(post, Some(self.viewer.account_id), request),
                )
                .await?;
            let delivered = page.items.len();
            comments.extend(page.items);

            let complete = u64::try_from(comments.len()).is_ok_and(|len| len >= page.total);
            if delivered == 0 || complete {
                return Ok(comments);
            }
            request = request.next();
        }
    }

    pub fn close_detail(&self) {
        self.store.update(ViewState::close_detail);
    }

    pub fn show_more_comments(&self) -> Option<usize> {
        self.store.update(ViewState::show_more_comments)
    }

    #[must_use]
    pub fn visible_comments(&self) -> Vec<Comment> {
        self.store.read(|state| state.visible_comments().to_vec())
    }

    #[must_use]
    pub fn has_more_comments(&self) -> bool {
        self.store.read(ViewState::has_more_comments)
    }

    /// Runs a search and shows its results in the search collection.
    pub async fn search(&self, query: &str) -> SearchResults {
        let fetched_at = self.store.begin_fetch();
        let results = self.search.search(query, Some(self.viewer.account_id)).await;

        self.identities
            .register_all(results.posts.iter().map(|post| &post.author));
        if results.posts.is_empty() {
            self.store.remove_collection(&CollectionName::Search);
        } else {
            self.store
                .replace_fetched(CollectionName::Search, results.posts.clone(), fetched_at);
        }
        results
    }

    async fn remote<T>(&self, call: impl Future<Output = api::Result<T>>) -> Result<T> {
        match time::timeout(self.config.request_timeout.get(), call).await {
            Ok(result) => result.map_err(SyncError::from),
            Err(_) => Err(ApiError::Timeout.into()),
        }
    }
}

impl<A: SocialApi + 'static> FeedSession<A> {
    pub fn watch_visibility(&self, token: CancellationToken) -> VisibilityWatch {
        Arc::clone(&self.reconciler).watch_visibility(
            self.viewer,
            self.config.focus_debounce.get(),
            token,
        )
    }

    pub fn debounced_search(&self, token: CancellationToken) -> DebouncedSearch {
        DebouncedSearch::spawn(
            Arc::clone(&self.search),
            Some(self.viewer.account_id),
            self.config.search_debounce.get(),
            token,
        )
    }
}
