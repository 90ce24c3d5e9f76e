//! Blog: taxonomy, posts, comments and likes.

use serde::Serialize;
use tracing::{info, instrument};

use campus_core::lifecycle::PostStatus;
use campus_core::{Action, Actor, Error, Result};

use super::validate;
use crate::storage::{
    BlogCategory, BlogComment, BlogPost, BlogPostSummary, BlogTag, CampusDatabase, DatabaseError,
    NewPost, PostFilter,
};

/// A post as shown on its own page.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub post: BlogPost,
    pub tags: Vec<BlogTag>,
    pub like_count: i64,
}

/// An approved top-level comment and its approved replies.
#[derive(Debug, Clone, Serialize)]
pub struct CommentThread {
    pub comment: BlogComment,
    pub replies: Vec<BlogComment>,
}

pub struct BlogService {
    db: CampusDatabase,
}

impl BlogService {
    pub const fn new(db: CampusDatabase) -> Self {
        Self { db }
    }

    // ─── Taxonomy ────────────────────────────────────────────────────

    pub async fn create_category(&self, actor: &Actor, title: &str, slug: &str) -> Result<BlogCategory> {
        actor.authorize(Action::ModerateBlog, None)?;
        validate::non_empty("title", title)?;
        validate::slug(slug)?;
        Ok(self.db.create_blog_category(title, slug).await?)
    }

    pub async fn list_categories(&self) -> Result<Vec<BlogCategory>> {
        Ok(self.db.list_blog_categories().await?)
    }

    pub async fn create_tag(&self, actor: &Actor, name: &str, slug: &str) -> Result<BlogTag> {
        actor.authorize(Action::ModerateBlog, None)?;
        validate::non_empty("name", name)?;
        validate::slug(slug)?;
        Ok(self.db.create_blog_tag(name, slug).await?)
    }

    pub async fn list_tags(&self) -> Result<Vec<BlogTag>> {
        Ok(self.db.list_blog_tags().await?)
    }

    // ─── Posts ───────────────────────────────────────────────────────

    /// Create a draft authored by the actor.
    #[instrument(skip(self, new), fields(op = "create_post"))]
    pub async fn create_post(&self, actor: &Actor, new: &NewPost<'_>) -> Result<BlogPost> {
        check_post(new)?;
        let post = self.db.create_post(actor.user_id, new).await?;
        info!(post_id = post.id, slug = %post.slug, "Post created");
        Ok(post)
    }

    pub async fn update_post(&self, actor: &Actor, id: i64, new: &NewPost<'_>) -> Result<BlogPost> {
        let post = self.db.get_post(id).await?;
        authorize_edit(actor, &post)?;
        check_post(new)?;
        Ok(self.db.update_post(id, new).await?)
    }

    #[instrument(skip(self), fields(op = "delete_post"))]
    pub async fn delete_post(&self, actor: &Actor, id: i64) -> Result<()> {
        let post = self.db.get_post(id).await?;
        authorize_edit(actor, &post)?;
        self.db.delete_post(id).await?;
        info!(post_id = id, by = actor.user_id, "Post deleted");
        Ok(())
    }

    pub async fn publish(&self, actor: &Actor, id: i64) -> Result<BlogPost> {
        self.set_status(actor, id, PostStatus::Published).await
    }

    pub async fn unpublish(&self, actor: &Actor, id: i64) -> Result<BlogPost> {
        self.set_status(actor, id, PostStatus::Draft).await
    }

    #[instrument(skip(self), fields(op = "set_post_status"))]
    async fn set_status(&self, actor: &Actor, id: i64, status: PostStatus) -> Result<BlogPost> {
        actor.authorize(Action::ModerateBlog, None)?;
        let post = self.db.set_post_status(id, status).await?;
        info!(post_id = id, status = %status, "Post status changed");
        Ok(post)
    }

    /// List posts. Drafts are visible only to privileged viewers.
    pub async fn list_posts(
        &self,
        viewer: Option<&Actor>,
        filter: PostFilter,
    ) -> Result<Vec<BlogPostSummary>> {
        let privileged = viewer.is_some_and(|a| a.role.is_privileged());
        let filter = PostFilter {
            published_only: filter.published_only || !privileged,
            ..filter
        };
        Ok(self.db.list_posts(&filter).await?)
    }

    /// Read a post by slug and count the view. Drafts are hidden from
    /// everyone except their author and privileged viewers.
    pub async fn view_post(&self, viewer: Option<&Actor>, slug: &str) -> Result<PostView> {
        let mut post = self.visible_post(viewer, slug).await?;
        post.view_count = self.db.increment_view_count(post.id).await?;
        let tags = self.db.list_post_tags(post.id).await?;
        let like_count = self.db.like_count(post.id).await?;
        Ok(PostView {
            post,
            tags,
            like_count,
        })
    }

    async fn visible_post(&self, viewer: Option<&Actor>, slug: &str) -> Result<BlogPost> {
        let post = self.db.get_post_by_slug(slug).await?;
        if post.status == PostStatus::Published {
            return Ok(post);
        }
        let can_see = viewer.is_some_and(|a| {
            a.role.is_privileged() || post.author_id == Some(a.user_id)
        });
        if can_see {
            Ok(post)
        } else {
            Err(Error::NotFound(format!("Post '{slug}'")))
        }
    }

    // ─── Comments ────────────────────────────────────────────────────

    /// Comment on a post the actor can see. Comments wait for moderation.
    pub async fn add_comment(
        &self,
        actor: &Actor,
        slug: &str,
        content: &str,
        parent_id: Option<i64>,
    ) -> Result<BlogComment> {
        validate::non_empty("content", content)?;
        let post = self.visible_post(Some(actor), slug).await?;
        if let Some(parent_id) = parent_id {
            let parent = self.db.get_comment(parent_id).await?;
            if parent.post_id != post.id {
                return Err(Error::Validation("parent comment belongs to another post".into()));
            }
            // Threads are one level deep.
            if parent.parent_id.is_some() {
                return Err(Error::Validation("cannot reply to a reply".into()));
            }
        }
        Ok(self
            .db
            .add_comment(post.id, actor.user_id, parent_id, content)
            .await?)
    }

    pub async fn approve_comment(&self, actor: &Actor, id: i64) -> Result<BlogComment> {
        actor.authorize(Action::ModerateBlog, None)?;
        if self.db.approve_comment(id).await? {
            info!(comment_id = id, by = actor.user_id, "Comment approved");
        }
        Ok(self.db.get_comment(id).await?)
    }

    /// Approved top-level comments with their approved replies.
    pub async fn list_comments(&self, slug: &str) -> Result<Vec<CommentThread>> {
        let post = self.visible_post(None, slug).await?;
        let mut threads = Vec::new();
        for comment in self.db.list_approved_comments(post.id).await? {
            let replies = self.db.list_replies(comment.id).await?;
            threads.push(CommentThread { comment, replies });
        }
        Ok(threads)
    }

    // ─── Likes ───────────────────────────────────────────────────────

    pub async fn like(&self, actor: &Actor, slug: &str) -> Result<i64> {
        let post = self.visible_post(Some(actor), slug).await?;
        match self.db.like_post(post.id, actor.user_id).await {
            Ok(()) => {}
            Err(DatabaseError::Conflict(_)) => return Err(Error::AlreadyLiked),
            Err(e) => return Err(e.into()),
        }
        Ok(self.db.like_count(post.id).await?)
    }

    /// Remove the actor's like. Unliking a post that was not liked is a no-op.
    pub async fn unlike(&self, actor: &Actor, slug: &str) -> Result<i64> {
        let post = self.db.get_post_by_slug(slug).await?;
        self.db.unlike_post(post.id, actor.user_id).await?;
        Ok(self.db.like_count(post.id).await?)
    }
}

/// Authors edit their own posts; a post whose author was deleted is staff-only.
fn authorize_edit(actor: &Actor, post: &BlogPost) -> Result<()> {
    actor.authorize(Action::EditPost, post.author_id)
}

fn check_post(new: &NewPost<'_>) -> Result<()> {
    validate::non_empty("title", new.title)?;
    validate::non_empty("content", new.content)?;
    validate::slug(new.slug)
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
#[path = "blog_tests.rs"]
mod tests;
