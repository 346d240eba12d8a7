use crate::comments::CommentProjection;
use careerlink_common::model::{
    comment::{Comment, CommentId},
    follow::FollowCounts,
    identity::AccountId,
    post::{Post, PostId},
};
use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_CAPACITY: usize = 64;

/// Orders mutations and server answers. Allocated in increasing order.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct OpId(u64);

/// A field whose displayed value may run ahead of the server.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Tracked<T> {
    confirmed: T,
    // When the server answer behind `confirmed` was taken.
    confirmed_at: OpId,
    answered: OpId,
    pending: Option<(OpId, T)>,
}

impl<T: Clone + PartialEq> Tracked<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::fetched(OpId::default(), value)
    }

    fn fetched(at: OpId, value: T) -> Self {
        Self {
            confirmed: value,
            confirmed_at: at,
            answered: OpId::default(),
            pending: None,
        }
    }

    /// The value to render: the newest optimistic guess, else the confirmed value.
    #[must_use]
    pub fn get(&self) -> &T {
        self.pending
            .as_ref()
            .map_or(&self.confirmed, |(_, value)| value)
    }

    #[must_use]
    pub fn confirmed(&self) -> &T {
        &self.confirmed
    }

    #[must_use]
    pub fn pending_op(&self) -> Option<OpId> {
        self.pending.as_ref().map(|(op, _)| *op)
    }

    pub fn propose(&mut self, op: OpId, value: T) {
        self.pending = Some((op, value));
    }

    /// Records the server's answer to `op`, received at `at`.
    ///
    /// Answers to mutations older than one already answered are dropped. A
    /// newer optimistic value stays displayed until its own answer arrives.
    pub fn confirm(&mut self, op: OpId, at: OpId, value: T) -> bool {
        if op < self.answered {
            return false;
        }
        self.answered = op;
        self.confirmed = value;
        self.confirmed_at = self.confirmed_at.max(at);
        if self.pending_op().is_some_and(|pending| pending <= op) {
            self.pending = None;
        }
        true
    }

    /// Drops the optimistic value of `op`, if it is still the displayed one.
    pub fn revert(&mut self, op: OpId) -> bool {
        if self.pending_op() == Some(op) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Takes a value from a fetch started at `at`. Answers received after
    /// that are newer and kept. An in-flight guess stays displayed.
    pub fn observe(&mut self, at: OpId, value: T) -> bool {
        if at < self.confirmed_at {
            return false;
        }
        self.confirmed = value;
        self.confirmed_at = at;
        true
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum CollectionName {
    Feed,
    Detail,
    Search,
}

/// Everything one transaction touched. Published once per transaction.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct StoreEvent {
    pub collections: BTreeSet<CollectionName>,
    pub posts: BTreeSet<PostId>,
    pub accounts: BTreeSet<AccountId>,
    pub comments: BTreeSet<PostId>,
}

impl StoreEvent {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
            && self.posts.is_empty()
            && self.accounts.is_empty()
            && self.comments.is_empty()
    }
}

#[derive(Clone, Debug)]
struct PostEntry {
    post: Post,
    liked: Tracked<bool>,
    like_count: Tracked<u64>,
    bookmarked: Tracked<bool>,
    bookmark_count: Tracked<u64>,
}

impl PostEntry {
    fn new(at: OpId, post: Post) -> Self {
        Self {
            liked: Tracked::fetched(at, post.viewer.liked),
            like_count: Tracked::fetched(at, post.counters.like_count),
            bookmarked: Tracked::fetched(at, post.viewer.bookmarked),
            bookmark_count: Tracked::fetched(at, post.counters.bookmark_count),
            post,
        }
    }

    fn observe(&mut self, at: OpId, post: Post) {
        self.liked.observe(at, post.viewer.liked);
        self.like_count.observe(at, post.counters.like_count);
        self.bookmarked.observe(at, post.viewer.bookmarked);
        self.bookmark_count.observe(at, post.counters.bookmark_count);
        self.post = post;
    }
}

/// Optimistic values handed back to the caller when a toggle starts.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct Proposal<T> {
    pub op: OpId,
    pub value: T,
}

/// Posts live once in a canonical table. Collections only hold ids into it,
/// so a change to a post shows in every collection at the same time.
#[derive(Debug, Default)]
pub struct ViewState {
    next_op: u64,
    posts: HashMap<PostId, PostEntry>,
    collections: HashMap<CollectionName, Vec<PostId>>,
    follows: HashMap<AccountId, Tracked<bool>>,
    follow_counts: HashMap<AccountId, FollowCounts>,
    pub(crate) comments: CommentProjection,
    changes: StoreEvent,
}

impl ViewState {
    pub(crate) fn with_comment_page_step(page_step: usize) -> Self {
        Self {
            comments: CommentProjection::new(page_step),
            ..Self::default()
        }
    }

    fn next_op(&mut self) -> OpId {
        self.next_op += 1;
        OpId(self.next_op)
    }

    /// Call before sending a fetch whose results end up in this state.
    /// Server answers received after this point win over the fetch's values.
    pub fn begin_fetch(&mut self) -> OpId {
        self.next_op()
    }

    pub(crate) fn touch_post(&mut self, id: PostId) {
        self.changes.posts.insert(id);
    }

    pub(crate) fn touch_comments(&mut self, id: PostId) {
        self.changes.comments.insert(id);
        self.changes.posts.insert(id);
    }

    fn touch_account(&mut self, account: AccountId) {
        self.changes.accounts.insert(account);
        let authored: Vec<PostId> = self
            .posts
            .values()
            .filter(|entry| entry.post.author.account_id() == Some(account))
            .map(|entry| entry.post.id)
            .collect();
        self.changes.posts.extend(authored);
    }

    /// Replaces the contents of one collection with posts fetched from
    /// `fetched_at`, refreshing shared entities.
    pub fn replace_collection(&mut self, name: CollectionName, posts: Vec<Post>, fetched_at: OpId) {
        let mut ids = Vec::with_capacity(posts.len());
        let mut seen = HashSet::with_capacity(posts.len());

        for post in posts {
            if !seen.insert(post.id) {
                continue;
            }
            ids.push(post.id);
            self.upsert_post(fetched_at, post);
        }

        self.collections.insert(name.clone(), ids);
        self.changes.collections.insert(name);
        self.collect_garbage();
    }

    pub fn remove_collection(&mut self, name: &CollectionName) {
        if self.collections.remove(name).is_some() {
            self.changes.collections.insert(name.clone());
            self.collect_garbage();
        }
    }

    fn upsert_post(&mut self, at: OpId, post: Post) {
        let id = post.id;

        if let Some(account) = post.author.account_id() {
            self.observe_follow(at, account, post.viewer.following_author);
        }

        match self.posts.get_mut(&id) {
            Some(entry) => entry.observe(at, post),
            None => {
                self.posts.insert(id, PostEntry::new(at, post));
            }
        }
        self.touch_post(id);
    }

    fn collect_garbage(&mut self) {
        let held: HashSet<PostId> = self.collections.values().flatten().copied().collect();
        let dropped: Vec<PostId> = self
            .posts
            .keys()
            .filter(|id| !held.contains(id))
            .copied()
            .collect();

        for id in dropped {
            debug!(post = %id, "Dropping post no collection holds");
            self.posts.remove(&id);
            self.comments.forget(id);
        }
    }

    #[must_use]
    pub fn contains(&self, id: PostId) -> bool {
        self.posts.contains_key(&id)
    }

    /// `None` when no collection holds the post.
    #[must_use]
    pub fn is_published(&self, id: PostId) -> Option<bool> {
        self.posts.get(&id).map(|entry| entry.post.is_published())
    }

    #[must_use]
    pub fn holds(&self, name: &CollectionName, id: PostId) -> bool {
        self.collections
            .get(name)
            .is_some_and(|ids| ids.contains(&id))
    }

    /// The post as every collection currently renders it.
    #[must_use]
    pub fn post(&self, id: PostId) -> Option<Post> {
        let entry = self.posts.get(&id)?;
        let mut post = entry.post.clone();

        post.viewer.liked = *entry.liked.get();
        post.viewer.bookmarked = *entry.bookmarked.get();
        post.counters.like_count = *entry.like_count.get();
        post.counters.bookmark_count = *entry.bookmark_count.get();
        post.counters.comment_count = self
            .comments
            .comment_count(id)
            .unwrap_or(entry.post.counters.comment_count);
        if let Some(following) = post
            .author
            .account_id()
            .and_then(|account| self.follows.get(&account))
        {
            post.viewer.following_author = *following.get();
        }

        Some(post)
    }

    #[must_use]
    pub fn collection(&self, name: &CollectionName) -> Vec<Post> {
        self.collections
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|id| self.post(*id))
            .collect()
    }

    /// Every distinct post held by any collection.
    #[must_use]
    pub fn working_set(&self) -> Vec<Post> {
        let mut ids: Vec<PostId> = self.posts.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter().filter_map(|id| self.post(id)).collect()
    }

    #[must_use]
    pub fn is_following(&self, account: AccountId) -> Option<bool> {
        self.follows.get(&account).map(|tracked| *tracked.get())
    }

    #[must_use]
    pub fn follow_counts(&self, account: AccountId) -> Option<FollowCounts> {
        self.follow_counts.get(&account).copied()
    }

    #[must_use]
    pub fn comments(&self, post: PostId) -> Option<&[Comment]> {
        self.comments.comments(post)
    }

    #[must_use]
    pub fn find_comment(&self, post: PostId, comment: CommentId) -> Option<&Comment> {
        self.comments
            .comments(post)?
            .iter()
            .find(|held| held.id == comment)
    }

    pub(crate) fn propose_like(&mut self, id: PostId) -> Option<Proposal<bool>> {
        let op = self.next_op();
        let entry = self.posts.get_mut(&id)?;

        let liked = !*entry.liked.get();
        let count = toggle_count(*entry.like_count.get(), liked);
        entry.liked.propose(op, liked);
        entry.like_count.propose(op, count);
        self.touch_post(id);

        Some(Proposal { op, value: liked })
    }

    pub(crate) fn confirm_like(&mut self, id: PostId, op: OpId, liked: bool, like_count: u64) {
        let at = self.next_op();
        let Some(entry) = self.posts.get_mut(&id) else {
            return;
        };
        entry.liked.confirm(op, at, liked);
        entry.like_count.confirm(op, at, like_count);
        self.touch_post(id);
    }

    pub(crate) fn revert_like(&mut self, id: PostId, op: OpId) -> bool {
        let Some(entry) = self.posts.get_mut(&id) else {
            return false;
        };
        let reverted = entry.liked.revert(op) | entry.like_count.revert(op);
        self.touch_post(id);
        reverted
    }

    pub(crate) fn propose_bookmark(&mut self, id: PostId) -> Option<Proposal<bool>> {
        let op = self.next_op();
        let entry = self.posts.get_mut(&id)?;

        let bookmarked = !*entry.bookmarked.get();
        let count = toggle_count(*entry.bookmark_count.get(), bookmarked);
        entry.bookmarked.propose(op, bookmarked);
        entry.bookmark_count.propose(op, count);
        self.touch_post(id);

        Some(Proposal {
            op,
            value: bookmarked,
        })
    }

    /// The server only reports the flag; the count follows the confirmed
    /// flag's transition.
    pub(crate) fn confirm_bookmark(&mut self, id: PostId, op: OpId, bookmarked: bool) -> Option<u64> {
        let at = self.next_op();
        let entry = self.posts.get_mut(&id)?;

        let previous = *entry.bookmarked.confirmed();
        let mut count = *entry.bookmark_count.confirmed();
        if previous != bookmarked {
            count = toggle_count(count, bookmarked);
        }
        entry.bookmarked.confirm(op, at, bookmarked);
        entry.bookmark_count.confirm(op, at, count);
        let displayed = *entry.bookmark_count.get();
        self.touch_post(id);

        Some(displayed)
    }

    pub(crate) fn revert_bookmark(&mut self, id: PostId, op: OpId) -> bool {
        let Some(entry) = self.posts.get_mut(&id) else {
            return false;
        };
        let reverted = entry.bookmarked.revert(op) | entry.bookmark_count.revert(op);
        self.touch_post(id);
        reverted
    }

    pub(crate) fn propose_follow(&mut self, account: AccountId) -> Proposal<bool> {
        let op = self.next_op();
        let tracked = self.follows.entry(account).or_default();

        let following = !*tracked.get();
        tracked.propose(op, following);
        self.touch_account(account);

        Proposal {
            op,
            value: following,
        }
    }

    pub(crate) fn confirm_follow(
        &mut self,
        account: AccountId,
        op: OpId,
        following: bool,
        counts: FollowCounts,
    ) {
        let at = self.next_op();
        let tracked = self.follows.entry(account).or_default();
        if tracked.confirm(op, at, following) {
            self.follow_counts.insert(account, counts);
        }
        self.touch_account(account);
    }

    pub(crate) fn revert_follow(&mut self, account: AccountId, op: OpId) -> bool {
        let reverted = self
            .follows
            .get_mut(&account)
            .is_some_and(|tracked| tracked.revert(op));
        self.touch_account(account);
        reverted
    }

    /// Applies a batch of relationships fetched from `fetched_at` in one go.
    /// Returns the accounts whose state was newer than the batch.
    pub(crate) fn apply_follow_statuses(
        &mut self,
        statuses: &HashMap<AccountId, bool>,
        fetched_at: OpId,
    ) -> Vec<AccountId> {
        let mut superseded = Vec::new();
        for (account, following) in statuses {
            if !self.observe_follow(fetched_at, *account, *following) {
                superseded.push(*account);
            }
            self.touch_account(*account);
        }
        superseded
    }

    fn observe_follow(&mut self, at: OpId, account: AccountId, following: bool) -> bool {
        match self.follows.get_mut(&account) {
            Some(tracked) => tracked.observe(at, following),
            None => {
                self.follows.insert(account, Tracked::fetched(at, following));
                true
            }
        }
    }

    /// Shows a held post in the detail dialog. Opening a different post
    /// resets the comment window.
    pub fn open_detail(&mut self, id: PostId) -> bool {
        if !self.contains(id) {
            return false;
        }

        self.collections.insert(CollectionName::Detail, vec![id]);
        self.changes.collections.insert(CollectionName::Detail);
        if self.comments.open(id) {
            self.touch_comments(id);
        }
        self.collect_garbage();
        true
    }

    pub fn close_detail(&mut self) {
        if let Some(id) = self.comments.close() {
            self.touch_comments(id);
        }
        self.remove_collection(&CollectionName::Detail);
    }

    #[must_use]
    pub fn detail_post(&self) -> Option<PostId> {
        self.comments.detail_post()
    }

    pub fn show_more_comments(&mut self) -> Option<usize> {
        let visible = self.comments.show_more()?;
        if let Some(id) = self.comments.detail_post() {
            self.touch_comments(id);
        }
        Some(visible)
    }

    #[must_use]
    pub fn visible_comments(&self) -> &[Comment] {
        self.comments.visible_comments()
    }

    #[must_use]
    pub fn has_more_comments(&self) -> bool {
        self.comments.has_more()
    }

    /// Takes a freshly fetched comment list. Ignored for posts no view holds.
    pub fn load_comments(&mut self, post: PostId, comments: Vec<Comment>) -> Option<u64> {
        if !self.contains(post) {
            return None;
        }
        let count = self.comments.load(post, comments);
        self.touch_comments(post);
        Some(count)
    }

    /// Applies a comment the server created. Returns the resulting count.
    pub(crate) fn comment_added(&mut self, post: PostId, comment: Comment) -> Option<u64> {
        let count = match self.comments.append(post, comment) {
            Some(count) => count,
            None => {
                let entry = self.posts.get_mut(&post)?;
                let hint = &mut entry.post.counters.comment_count;
                *hint = hint.saturating_add(1);
                *hint
            }
        };
        self.touch_comments(post);
        Some(count)
    }

    pub(crate) fn hide_comment(&mut self, post: PostId, comment: CommentId) -> bool {
        let hidden = self.comments.hide(post, comment);
        if hidden {
            self.touch_comments(post);
        }
        hidden
    }

    pub(crate) fn comment_deleted(&mut self, post: PostId, comment: CommentId) -> Option<u64> {
        let count = self.comments.finish_delete(post, comment)?;
        self.touch_comments(post);
        Some(count)
    }

    pub(crate) fn restore_comment(&mut self, post: PostId, comment: CommentId) -> bool {
        let restored = self.comments.restore(post, comment);
        if restored {
            self.touch_comments(post);
        }
        restored
    }

    fn take_changes(&mut self) -> StoreEvent {
        std::mem::take(&mut self.changes)
    }
}

fn toggle_count(count: u64, now_set: bool) -> u64 {
    if now_set {
        count.saturating_add(1)
    } else {
        count.saturating_sub(1)
    }
}

/// Handle to the view state shared by every surface and component.
#[derive(Debug)]
pub struct ViewStore {
    state: Mutex<ViewState>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for ViewStore {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_COMMENT_PAGE_STEP)
    }
}

impl ViewStore {
    #[must_use]
    pub fn new(comment_page_step: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(ViewState::with_comment_page_step(comment_page_step)),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs one transaction. Subscribers hear about it once, afterwards.
    pub fn update<R>(&self, f: impl FnOnce(&mut ViewState) -> R) -> R {
        let (result, changes) = {
            let mut state = self.lock();
            let result = f(&mut state);
            (result, state.take_changes())
        };

        if !changes.is_empty() {
            // Nobody listening is fine.
            let _ = self.events.send(changes);
        }
        result
    }

    pub fn read<R>(&self, f: impl FnOnce(&ViewState) -> R) -> R {
        f(&self.lock())
    }

    #[must_use]
    pub fn post(&self, id: PostId) -> Option<Post> {
        self.read(|state| state.post(id))
    }

    #[must_use]
    pub fn collection(&self, name: &CollectionName) -> Vec<Post> {
        self.read(|state| state.collection(name))
    }

    pub fn begin_fetch(&self) -> OpId {
        self.update(ViewState::begin_fetch)
    }

    /// Replaces one collection with posts fetched from `fetched_at`.
    pub fn replace_fetched(&self, name: CollectionName, posts: Vec<Post>, fetched_at: OpId) {
        self.update(|state| state.replace_collection(name, posts, fetched_at));
    }

    /// Replaces one collection with posts that are current as of now.
    pub fn replace_collection(&self, name: CollectionName, posts: Vec<Post>) {
        self.update(|state| {
            let now = state.begin_fetch();
            state.replace_collection(name, posts, now);
        });
    }

    pub fn remove_collection(&self, name: &CollectionName) {
        self.update(|state| state.remove_collection(name));
    }
}
