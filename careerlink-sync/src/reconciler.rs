use crate::{
    debounce::Debouncer,
    error::{PartialDataError, SyncError},
    store::{ViewState, ViewStore},
};
use careerlink_client::{ApiError, SocialApi, api};
use careerlink_common::model::{
    follow::FollowEdge,
    identity::{AccountId, Viewer},
    post::Post,
};
use std::{
    collections::{HashMap, HashSet, VecDeque},
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
use tracing::{debug, info, warn};

const REPORT_CAPACITY: usize = 8;

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct ReconcileReport {
    /// Posts the reconciliation looked at.
    pub posts: usize,
    pub statuses: HashMap<AccountId, bool>,
    pub partial: Option<PartialDataError>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum Visibility {
    Visible,
    Hidden,
}

pub struct FollowStateReconciler<A> {
    api: Arc<A>,
    store: Arc<ViewStore>,
    throttle_threshold: usize,
    throttle_delay: Duration,
    request_timeout: Duration,
}

impl<A: SocialApi> FollowStateReconciler<A> {
    pub fn new(
        api: Arc<A>,
        store: Arc<ViewStore>,
        throttle_threshold: usize,
        throttle_delay: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            api,
            store,
            throttle_threshold,
            throttle_delay,
            request_timeout,
        }
    }

    /// Looks up the viewer's relationship to the author of every post and
    /// applies all answers in a single store transaction.
    ///
    /// Failed lookups are not retried. They count as "not following" and are
    /// listed in [`ReconcileReport::partial`].
    pub async fn reconcile(&self, posts: &[Post], viewer: &Viewer) -> ReconcileReport {
        let authors = distinct_authors(posts, viewer);
        if authors.is_empty() {
            debug!(posts = posts.len(), "No authors to reconcile");
            return ReconcileReport {
                posts: posts.len(),
                ..ReconcileReport::default()
            };
        }

        let fetched_at = self.store.begin_fetch();
        let (mut statuses, failed) = match self.bulk(viewer, &authors).await {
            Some(answer) => answer,
            None => self.sequential(viewer, authors).await,
        };

        let superseded = self.store.update(|state| {
            let superseded = state.apply_follow_statuses(&statuses, fetched_at);
            for account in &superseded {
                if let Some(following) = state.is_following(*account) {
                    statuses.insert(*account, following);
                }
            }
            superseded
        });
        if !superseded.is_empty() {
            debug!(?superseded, "Kept follow state confirmed during reconciliation");
        }

        let partial = (!failed.is_empty()).then(|| PartialDataError { failed });
        info!(
            posts = posts.len(),
            authors = statuses.len(),
            failed = partial.as_ref().map_or(0, |partial| partial.failed.len()),
            "Reconciled follow state"
        );

        ReconcileReport {
            posts: posts.len(),
            statuses,
            partial,
        }
    }

    /// Reconciles everything the store currently shows.
    pub async fn on_working_set_loaded(&self, viewer: &Viewer) -> ReconcileReport {
        let posts = self.store.read(ViewState::working_set);
        self.reconcile(&posts, viewer).await
    }

    async fn bulk(
        &self,
        viewer: &Viewer,
        authors: &[AccountId],
    ) -> Option<(HashMap<AccountId, bool>, Vec<AccountId>)> {
        match self
            .remote(self.api.follow_statuses(viewer.account_id, authors))
            .await
        {
            Ok(Some(mut answer)) => {
                let mut statuses = HashMap::with_capacity(authors.len());
                let mut failed = Vec::new();
                for author in authors {
                    match answer.remove(author) {
                        Some(following) => {
                            statuses.insert(*author, following);
                        }
                        None => {
                            statuses.insert(*author, false);
                            failed.push(*author);
                        }
                    }
                }
                Some((statuses, failed))
            }
            Ok(None) => None,
            Err(error) => {
                warn!(%error, "Bulk follow lookup failed, querying one by one");
                None
            }
        }
    }

    /// One lookup at a time. Larger batches are spaced out so the status
    /// endpoint is not flooded.
    async fn sequential(
        &self,
        viewer: &Viewer,
        authors: Vec<AccountId>,
    ) -> (HashMap<AccountId, bool>, Vec<AccountId>) {
        let throttled = authors.len() > self.throttle_threshold;
        let mut queue = VecDeque::from(authors);
        let mut statuses = HashMap::with_capacity(queue.len());
        let mut failed = Vec::new();

        while let Some(author) = queue.pop_front() {
            let Ok(edge) = FollowEdge::new(viewer.account_id, author) else {
                continue;
            };

            match self.remote(self.api.follow_status(edge)).await {
                Ok(following) => {
                    statuses.insert(author, following);
                }
                Err(error) => {
                    warn!(%author, %error, "Follow lookup failed, assuming not following");
                    statuses.insert(author, false);
                    failed.push(author);
                }
            }

            if throttled && !queue.is_empty() {
                time::sleep(self.throttle_delay).await;
            }
        }

        (statuses, failed)
    }

    async fn remote<T>(&self, call: impl Future<Output = api::Result<T>>) -> Result<T, SyncError> {
        match time::timeout(self.request_timeout, call).await {
            Ok(result) => result.map_err(SyncError::from),
            Err(_) => Err(ApiError::Timeout.into()),
        }
    }
}

/// Author accounts in first-seen order, without the viewer and without
/// authors whose account is unknown.
fn distinct_authors(posts: &[Post], viewer: &Viewer) -> Vec<AccountId> {
    let mut seen = HashSet::new();
    posts
        .iter()
        .filter_map(|post| post.author.account_id())
        .filter(|account| *account != viewer.account_id && seen.insert(*account))
        .collect()
}

/// A running focus listener. Bursts of visibility changes collapse into one
/// reconciliation, run only if the page ended up visible.
pub struct VisibilityWatch {
    events: Debouncer<Visibility>,
    reports: mpsc::Receiver<ReconcileReport>,
    task: JoinHandle<()>,
}

impl VisibilityWatch {
    pub fn notify(&self, visibility: Visibility) -> bool {
        self.events.push(visibility)
    }

    pub async fn next_report(&mut self) -> Option<ReconcileReport> {
        self.reports.recv().await
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<A: SocialApi + 'static> FollowStateReconciler<A> {
    pub fn watch_visibility(
        self: Arc<Self>,
        viewer: Viewer,
        quiet: Duration,
        token: CancellationToken,
    ) -> VisibilityWatch {
        let (events, mut settled) = Debouncer::spawn(quiet, token.clone());
        let (report_tx, reports) = mpsc::channel(REPORT_CAPACITY);

        let task = tokio::spawn(async move {
            loop {
                let visibility = tokio::select! {
                    () = token.cancelled() => break,
                    visibility = settled.recv() => match visibility {
                        Some(visibility) => visibility,
                        None => break,
                    },
                };
                if visibility == Visibility::Hidden {
                    continue;
                }

                let report = self.on_working_set_loaded(&viewer).await;
                if let Err(TrySendError::Closed(_)) = report_tx.try_send(report) {
                    break;
                }
            }
            debug!("Visibility watch stopped");
        });

        VisibilityWatch {
            events,
            reports,
            task,
        }
    }
}
