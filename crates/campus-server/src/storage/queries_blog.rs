//! Blog queries: categories, tags, posts, comments and likes.

use campus_core::db::unix_timestamp;
use campus_core::lifecycle::PostStatus;

use super::db::{CampusDatabase, DatabaseError};
use super::models::{BlogCategory, BlogComment, BlogPost, BlogPostSummary, BlogTag};

/// Editable post fields.
#[derive(Debug, Clone)]
pub struct NewPost<'a> {
    pub title: &'a str,
    pub slug: &'a str,
    pub content: &'a str,
    pub excerpt: &'a str,
    pub category_id: Option<i64>,
    pub featured_image: Option<&'a str>,
    pub tag_ids: &'a [i64],
}

/// Listing filter. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub category_slug: Option<String>,
    pub tag_slug: Option<String>,
    pub author_id: Option<i64>,
    pub published_only: bool,
}

const SUMMARY_SELECT: &str = "SELECT p.id, p.title, p.slug, p.excerpt, p.category_id, p.author_id, p.status, \
     p.published_at, p.view_count, \
     (SELECT COUNT(*) FROM blog_likes l WHERE l.post_id = p.id) AS like_count, \
     (SELECT COUNT(*) FROM blog_comments c WHERE c.post_id = p.id AND c.is_approved = 1) AS comment_count \
     FROM blog_posts p LEFT JOIN blog_categories cat ON cat.id = p.category_id";

impl CampusDatabase {
    // =========================================================================
    // Category and tag queries
    // =========================================================================

    pub async fn create_blog_category(
        &self,
        title: &str,
        slug: &str,
    ) -> Result<BlogCategory, DatabaseError> {
        let now = unix_timestamp();
        let id = sqlx::query(
            "INSERT INTO blog_categories (title, slug, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(title)
        .bind(slug)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        sqlx::query_as::<_, BlogCategory>("SELECT * FROM blog_categories WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(Into::into)
    }

    pub async fn list_blog_categories(&self) -> Result<Vec<BlogCategory>, DatabaseError> {
        let rows = sqlx::query_as::<_, BlogCategory>("SELECT * FROM blog_categories ORDER BY title")
            .fetch_all(self.pool())
            .await?;
        Ok(rows)
    }

    pub async fn create_blog_tag(&self, name: &str, slug: &str) -> Result<BlogTag, DatabaseError> {
        let id = sqlx::query("INSERT INTO blog_tags (name, slug) VALUES (?, ?)")
            .bind(name)
            .bind(slug)
            .execute(self.pool())
            .await?
            .last_insert_rowid();

        sqlx::query_as::<_, BlogTag>("SELECT * FROM blog_tags WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(Into::into)
    }

    pub async fn list_blog_tags(&self) -> Result<Vec<BlogTag>, DatabaseError> {
        let rows = sqlx::query_as::<_, BlogTag>("SELECT * FROM blog_tags ORDER BY name")
            .fetch_all(self.pool())
            .await?;
        Ok(rows)
    }

    pub async fn list_post_tags(&self, post_id: i64) -> Result<Vec<BlogTag>, DatabaseError> {
        let rows = sqlx::query_as::<_, BlogTag>(
            "SELECT t.* FROM blog_tags t JOIN blog_post_tags pt ON pt.tag_id = t.id \
             WHERE pt.post_id = ? ORDER BY t.name",
        )
        .bind(post_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    // =========================================================================
    // Post queries
    // =========================================================================

    /// Insert a draft post and its tag links in one transaction.
    pub async fn create_post(
        &self,
        author_id: i64,
        new: &NewPost<'_>,
    ) -> Result<BlogPost, DatabaseError> {
        let now = unix_timestamp();
        let mut tx = self.pool().begin().await?;

        let id = sqlx::query(
            "INSERT INTO blog_posts (title, slug, content, excerpt, category_id, author_id, status, featured_image, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new.title)
        .bind(new.slug)
        .bind(new.content)
        .bind(new.excerpt)
        .bind(new.category_id)
        .bind(author_id)
        .bind(PostStatus::Draft)
        .bind(new.featured_image)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for tag_id in new.tag_ids {
            sqlx::query("INSERT OR IGNORE INTO blog_post_tags (post_id, tag_id) VALUES (?, ?)")
                .bind(id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        self.get_post(id).await
    }

    /// Replace a post's editable fields and tag set.
    pub async fn update_post(&self, id: i64, new: &NewPost<'_>) -> Result<BlogPost, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            "UPDATE blog_posts SET title = ?, slug = ?, content = ?, excerpt = ?, category_id = ?, featured_image = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(new.title)
        .bind(new.slug)
        .bind(new.content)
        .bind(new.excerpt)
        .bind(new.category_id)
        .bind(new.featured_image)
        .bind(unix_timestamp())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Post {id}")));
        }

        sqlx::query("DELETE FROM blog_post_tags WHERE post_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for tag_id in new.tag_ids {
            sqlx::query("INSERT OR IGNORE INTO blog_post_tags (post_id, tag_id) VALUES (?, ?)")
                .bind(id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        self.get_post(id).await
    }

    pub async fn delete_post(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM blog_posts WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_post(&self, id: i64) -> Result<BlogPost, DatabaseError> {
        sqlx::query_as::<_, BlogPost>("SELECT * FROM blog_posts WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Post {id}")))
    }

    pub async fn get_post_by_slug(&self, slug: &str) -> Result<BlogPost, DatabaseError> {
        sqlx::query_as::<_, BlogPost>("SELECT * FROM blog_posts WHERE slug = ?")
            .bind(slug)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Post '{slug}'")))
    }

    /// Set the post status. The first publication stamps `published_at`;
    /// later publications keep the original stamp.
    pub async fn set_post_status(
        &self,
        id: i64,
        status: PostStatus,
    ) -> Result<BlogPost, DatabaseError> {
        let now = unix_timestamp();
        let published_at = (status == PostStatus::Published).then_some(now);

        let result = sqlx::query(
            "UPDATE blog_posts SET status = ?, published_at = COALESCE(published_at, ?), updated_at = ? WHERE id = ?",
        )
        .bind(status)
        .bind(published_at)
        .bind(now)
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Post {id}")));
        }
        self.get_post(id).await
    }

    pub async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<BlogPostSummary>, DatabaseError> {
        let sql = format!(
            "{SUMMARY_SELECT} \
             WHERE (? IS NULL OR cat.slug = ?) \
             AND (? IS NULL OR EXISTS (SELECT 1 FROM blog_post_tags pt JOIN blog_tags t ON t.id = pt.tag_id \
                                       WHERE pt.post_id = p.id AND t.slug = ?)) \
             AND (? IS NULL OR p.author_id = ?) \
             AND (? = 0 OR p.status = ?) \
             ORDER BY COALESCE(p.published_at, p.created_at) DESC, p.id DESC"
        );

        let rows = sqlx::query_as::<_, BlogPostSummary>(&sql)
            .bind(filter.category_slug.as_deref())
            .bind(filter.category_slug.as_deref())
            .bind(filter.tag_slug.as_deref())
            .bind(filter.tag_slug.as_deref())
            .bind(filter.author_id)
            .bind(filter.author_id)
            .bind(filter.published_only)
            .bind(PostStatus::Published)
            .fetch_all(self.pool())
            .await?;
        Ok(rows)
    }

    /// Atomically bump the view counter.
    pub async fn increment_view_count(&self, id: i64) -> Result<i64, DatabaseError> {
        let count: i64 = sqlx::query_scalar(
            "UPDATE blog_posts SET view_count = view_count + 1 WHERE id = ? RETURNING view_count",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Post {id}")))?;
        Ok(count)
    }

    // =========================================================================
    // Comment queries
    // =========================================================================

    /// Insert an unapproved comment.
    pub async fn add_comment(
        &self,
        post_id: i64,
        author_id: i64,
        parent_id: Option<i64>,
        content: &str,
    ) -> Result<BlogComment, DatabaseError> {
        let now = unix_timestamp();
        let id = sqlx::query(
            "INSERT INTO blog_comments (post_id, author_id, parent_id, content, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(parent_id)
        .bind(content)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        self.get_comment(id).await
    }

    pub async fn get_comment(&self, id: i64) -> Result<BlogComment, DatabaseError> {
        sqlx::query_as::<_, BlogComment>("SELECT * FROM blog_comments WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Comment {id}")))
    }

    pub async fn approve_comment(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE blog_comments SET is_approved = 1, updated_at = ? WHERE id = ? AND is_approved = 0",
        )
        .bind(unix_timestamp())
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Approved top-level comments of a post, oldest first.
    pub async fn list_approved_comments(
        &self,
        post_id: i64,
    ) -> Result<Vec<BlogComment>, DatabaseError> {
        let rows = sqlx::query_as::<_, BlogComment>(
            "SELECT * FROM blog_comments WHERE post_id = ? AND parent_id IS NULL AND is_approved = 1 \
             ORDER BY created_at, id",
        )
        .bind(post_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Approved replies to one comment.
    pub async fn list_replies(&self, parent_id: i64) -> Result<Vec<BlogComment>, DatabaseError> {
        let rows = sqlx::query_as::<_, BlogComment>(
            "SELECT * FROM blog_comments WHERE parent_id = ? AND is_approved = 1 ORDER BY created_at, id",
        )
        .bind(parent_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    // =========================================================================
    // Like queries
    // =========================================================================

    /// Record a like. A second like by the same user is `DatabaseError::Conflict`.
    pub async fn like_post(&self, post_id: i64, user_id: i64) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO blog_likes (post_id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(post_id)
            .bind(user_id)
            .bind(unix_timestamp())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn unlike_post(&self, post_id: i64, user_id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM blog_likes WHERE post_id = ? AND user_id = ?")
            .bind(post_id)
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn like_count(&self, post_id: i64) -> Result<i64, DatabaseError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM blog_likes WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }
}
