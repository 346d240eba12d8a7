use careerlink_common::model::{
    comment::{Comment, CommentId},
    post::PostId,
};
use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
struct CommentThread {
    comments: Vec<Comment>,
    // Optimistically deleted comments and where they used to be.
    hidden: HashMap<CommentId, (usize, Comment)>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
struct DetailWindow {
    post: PostId,
    visible: usize,
}

/// Once a post's list is loaded its comment count is the list length. Until
/// then the count carried by the post is a hint.
#[derive(Clone, Debug, Default)]
pub struct CommentProjection {
    page_step: usize,
    threads: HashMap<PostId, CommentThread>,
    detail: Option<DetailWindow>,
}

impl CommentProjection {
    #[must_use]
    pub fn new(page_step: usize) -> Self {
        Self {
            page_step: page_step.max(1),
            ..Self::default()
        }
    }

    /// Opens the detail window. Returns whether the window was reset.
    pub fn open(&mut self, post: PostId) -> bool {
        if self.detail.is_some_and(|detail| detail.post == post) {
            return false;
        }
        self.detail = Some(DetailWindow {
            post,
            visible: self.page_step,
        });
        true
    }

    pub fn close(&mut self) -> Option<PostId> {
        self.detail.take().map(|detail| detail.post)
    }

    #[must_use]
    pub fn detail_post(&self) -> Option<PostId> {
        self.detail.map(|detail| detail.post)
    }

    /// Reveals one more page of comments. Never shrinks the window.
    pub fn show_more(&mut self) -> Option<usize> {
        let step = self.page_step;
        let detail = self.detail.as_mut()?;
        detail.visible = detail.visible.saturating_add(step);
        Some(detail.visible)
    }

    #[must_use]
    pub fn visible_count(&self) -> Option<usize> {
        self.detail.map(|detail| detail.visible)
    }

    #[must_use]
    pub fn visible_comments(&self) -> &[Comment] {
        let Some(detail) = self.detail else {
            return &[];
        };
        self.comments(detail.post)
            .map(|comments| &comments[..detail.visible.min(comments.len())])
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.detail.is_some_and(|detail| {
            self.comments(detail.post)
                .is_some_and(|comments| comments.len() > detail.visible)
        })
    }

    /// Takes the server's list, keeping in-flight deletions hidden.
    pub fn load(&mut self, post: PostId, comments: Vec<Comment>) -> u64 {
        let thread = self.threads.entry(post).or_default();
        thread.comments = comments
            .into_iter()
            .filter(|comment| !thread.hidden.contains_key(&comment.id))
            .collect();
        len(&thread.comments)
    }

    #[must_use]
    pub fn comments(&self, post: PostId) -> Option<&[Comment]> {
        self.threads
            .get(&post)
            .map(|thread| thread.comments.as_slice())
    }

    #[must_use]
    pub fn comment_count(&self, post: PostId) -> Option<u64> {
        self.threads.get(&post).map(|thread| len(&thread.comments))
    }

    /// Appends a comment the server accepted. `None` when the list is not held.
    pub fn append(&mut self, post: PostId, comment: Comment) -> Option<u64> {
        let thread = self.threads.get_mut(&post)?;
        if !thread.comments.iter().any(|held| held.id == comment.id) {
            thread.comments.push(comment);
        }
        Some(len(&thread.comments))
    }

    pub fn hide(&mut self, post: PostId, comment: CommentId) -> bool {
        let Some(thread) = self.threads.get_mut(&post) else {
            return false;
        };
        let Some(index) = thread.comments.iter().position(|held| held.id == comment) else {
            return false;
        };
        let removed = thread.comments.remove(index);
        thread.hidden.insert(comment, (index, removed));
        true
    }

    pub fn finish_delete(&mut self, post: PostId, comment: CommentId) -> Option<u64> {
        let thread = self.threads.get_mut(&post)?;
        thread.hidden.remove(&comment);
        thread.comments.retain(|held| held.id != comment);
        Some(len(&thread.comments))
    }

    pub fn restore(&mut self, post: PostId, comment: CommentId) -> bool {
        let Some(thread) = self.threads.get_mut(&post) else {
            return false;
        };
        let Some((index, restored)) = thread.hidden.remove(&comment) else {
            return false;
        };
        let index = index.min(thread.comments.len());
        thread.comments.insert(index, restored);
        true
    }

    pub fn forget(&mut self, post: PostId) {
        self.threads.remove(&post);
        if self.detail_post() == Some(post) {
            self.detail = None;
        }
    }
}

fn len(comments: &[Comment]) -> u64 {
    u64::try_from(comments.len()).unwrap_or(u64::MAX)
}
