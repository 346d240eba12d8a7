use crate::{debounce::Debouncer, error::SyncError};
use careerlink_client::{
    ApiError, SocialApi, api,
    api::{PostFilter, PostQuery},
};
use careerlink_common::model::{
    identity::AccountId,
    page::{Page, PageRequest},
    post::{Post, strip_hashtag_marker},
};
use std::{
    collections::{HashMap, hash_map::Entry},
    future::Future,
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const RESULT_CAPACITY: usize = 8;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum SearchStatus {
    /// The query was blank; nothing was asked.
    Empty,
    /// The search endpoint found something.
    Matched,
    /// Only the local scan found something.
    FallbackMatched,
    NoMatches,
    /// Neither stage produced an answer.
    Unavailable,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct SearchResults {
    pub query: String,
    pub posts: Vec<Post>,
    pub status: SearchStatus,
}

impl SearchResults {
    fn empty(query: &str, status: SearchStatus) -> Self {
        Self {
            query: query.to_owned(),
            posts: Vec::new(),
            status,
        }
    }
}

pub struct SearchPipeline<A> {
    api: Arc<A>,
    page_size: u32,
    scan_size: u32,
    request_timeout: Duration,
}

impl<A: SocialApi> SearchPipeline<A> {
    pub fn new(api: Arc<A>, page_size: u32, scan_size: u32, request_timeout: Duration) -> Self {
        Self {
            api,
            page_size,
            scan_size,
            request_timeout,
        }
    }

    /// Never fails. A search nobody could answer reports
    /// [`SearchStatus::Unavailable`].
    pub async fn search(&self, query: &str, viewer: Option<AccountId>) -> SearchResults {
        let query = query.trim();
        if query.is_empty() {
            return SearchResults::empty(query, SearchStatus::Empty);
        }

        let primary = self
            .remote(
                self.api
                    .search_posts(query, PageRequest::first(self.page_size), viewer),
            )
            .await
            .inspect_err(|error| warn!(query, %error, "Search request failed"))
            .ok();

        let needs_fallback = primary
            .as_ref()
            .is_none_or(|page| page.is_empty() || page.is_partial());
        let fallback = if needs_fallback {
            self.scan(query, viewer).await
        } else {
            None
        };

        let status = match (&primary, &fallback) {
            (None, None) => return SearchResults::empty(query, SearchStatus::Unavailable),
            (Some(page), _) if !page.is_empty() => SearchStatus::Matched,
            (_, Some(matches)) if !matches.is_empty() => SearchStatus::FallbackMatched,
            _ => SearchStatus::NoMatches,
        };

        let primary = primary.map(|page| page.items).unwrap_or_default();
        let mut posts = merge_working_set(primary, fallback.unwrap_or_default());
        posts.retain(Post::is_published);
        debug!(query, ?status, results = posts.len(), "Search finished");

        SearchResults {
            query: query.to_owned(),
            posts,
            status,
        }
    }

    /// Stage two: filter a broad page of all posts locally.
    async fn scan(&self, query: &str, viewer: Option<AccountId>) -> Option<Vec<Post>> {
        let request = PostQuery {
            filter: PostFilter::All,
            page: PageRequest::first(self.scan_size),
        };

        match self.remote(self.api.fetch_posts(&request, viewer)).await {
            Ok(Page { items, .. }) => Some(
                items
                    .into_iter()
                    .filter(|post| post.is_published() && matches_query(post, query))
                    .collect(),
            ),
            Err(error) => {
                warn!(query, %error, "Fallback scan failed");
                None
            }
        }
    }

    async fn remote<T>(&self, call: impl Future<Output = api::Result<T>>) -> Result<T, SyncError> {
        match time::timeout(self.request_timeout, call).await {
            Ok(result) => result.map_err(SyncError::from),
            Err(_) => Err(ApiError::Timeout.into()),
        }
    }
}

/// Case-insensitive substring match on content, hashtags, author name and
/// author job title. Hashtags compare without their leading marker.
#[must_use]
pub fn matches_query(post: &Post, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }
    let contains = |haystack: &str| haystack.to_lowercase().contains(&needle);

    let tag = strip_hashtag_marker(&needle);
    let hashtag = !tag.is_empty()
        && post
            .hashtags
            .iter()
            .any(|hashtag| hashtag.get().to_lowercase().contains(tag));

    contains(&post.content)
        || hashtag
        || contains(&post.author.display_name)
        || post.author.job_title.as_deref().is_some_and(contains)
}

/// Primary order first, then secondary posts not seen yet in their own order.
///
/// A post present in both keeps its primary position but takes the
/// secondary copy, which was fetched last.
#[must_use]
pub fn merge_working_set(primary: Vec<Post>, secondary: Vec<Post>) -> Vec<Post> {
    let mut merged: Vec<Post> = Vec::with_capacity(primary.len() + secondary.len());
    let mut positions = HashMap::with_capacity(merged.capacity());

    for post in primary.into_iter().chain(secondary) {
        match positions.entry(post.id) {
            Entry::Occupied(slot) => merged[*slot.get()] = post,
            Entry::Vacant(slot) => {
                slot.insert(merged.len());
                merged.push(post);
            }
        }
    }

    merged
}

/// Search-as-you-type: only the query that stayed put for the quiet period
/// is searched.
pub struct DebouncedSearch {
    queries: Debouncer<String>,
    results: mpsc::Receiver<SearchResults>,
    task: JoinHandle<()>,
}

impl DebouncedSearch {
    pub fn spawn<A: SocialApi + 'static>(
        pipeline: Arc<SearchPipeline<A>>,
        viewer: Option<AccountId>,
        quiet: Duration,
        token: CancellationToken,
    ) -> Self {
        let (queries, mut settled) = Debouncer::spawn(quiet, token.clone());
        let (results_tx, results) = mpsc::channel(RESULT_CAPACITY);

        let task = tokio::spawn(async move {
            loop {
                let query: String = tokio::select! {
                    () = token.cancelled() => break,
                    query = settled.recv() => match query {
                        Some(query) => query,
                        None => break,
                    },
                };

                let results = pipeline.search(&query, viewer).await;
                if let Err(TrySendError::Closed(_)) = results_tx.try_send(results) {
                    break;
                }
            }
            debug!("Debounced search stopped");
        });

        Self {
            queries,
            results,
            task,
        }
    }

    pub fn type_query(&self, query: impl Into<String>) -> bool {
        self.queries.push(query.into())
    }

    pub async fn next_results(&mut self) -> Option<SearchResults> {
        self.results.recv().await
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
