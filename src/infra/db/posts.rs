use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{
    CreatePostParams, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{PostInfo, PostRecord, PostStatisticsRecord};
use crate::domain::types::Star;

use super::PostgresRepositories;
use super::map_sqlx_error;

const POST_COLUMNS: &str = "id, title, author, created_at, updated_at, body";

const POST_INFO_SELECT: &str = "SELECT p.id, p.title, p.author, p.created_at, p.updated_at, p.body, \
     COALESCE(s.star1, 0) AS star1, COALESCE(s.star2, 0) AS star2, \
     COALESCE(s.star3, 0) AS star3, COALESCE(s.star4, 0) AS star4, \
     COALESCE(s.star5, 0) AS star5 \
     FROM posts p LEFT JOIN post_statistics s ON s.post_id = p.id";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    title: String,
    author: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    body: String,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            author: row.author,
            created_at: row.created_at,
            updated_at: row.updated_at,
            body: row.body,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostInfoRow {
    #[sqlx(flatten)]
    post: PostRow,
    star1: i64,
    star2: i64,
    star3: i64,
    star4: i64,
    star5: i64,
}

impl From<PostInfoRow> for PostInfo {
    fn from(row: PostInfoRow) -> Self {
        Self {
            post: row.post.into(),
            statistics: PostStatisticsRecord {
                star1: row.star1,
                star2: row.star2,
                star3: row.star3,
                star4: row.star4,
                star5: row.star5,
            },
        }
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    async fn find_post_info(&self, id: i64) -> Result<Option<PostInfo>, RepoError> {
        let sql = format!("{POST_INFO_SELECT} WHERE p.id = $1");
        let row = sqlx::query_as::<_, PostInfoRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostInfo::from))
    }

    async fn list_post_infos(&self) -> Result<Vec<PostInfo>, RepoError> {
        let sql = format!("{POST_INFO_SELECT} ORDER BY p.id");
        let rows = sqlx::query_as::<_, PostInfoRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostInfo::from).collect())
    }

    async fn list_authors(&self) -> Result<Vec<String>, RepoError> {
        sqlx::query_scalar::<_, String>("SELECT DISTINCT author FROM posts ORDER BY author")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let CreatePostParams {
            title,
            author,
            body,
        } = params;

        let now = OffsetDateTime::now_utc();
        let sql = format!(
            "INSERT INTO posts (title, author, created_at, updated_at, body) \
             VALUES ($1, $2, $3, $3, $4) RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(title)
            .bind(author)
            .bind(now)
            .bind(body)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let UpdatePostParams { id, title, body } = params;

        let now = OffsetDateTime::now_utc();
        let sql = format!(
            "UPDATE posts SET title = $2, body = $3, updated_at = $4 \
             WHERE id = $1 RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .bind(title)
            .bind(body)
            .bind(now)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        Ok(row.into())
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn record_vote(&self, post_id: i64, star: Star) -> Result<(), RepoError> {
        let column = star.column();
        let sql = format!(
            "INSERT INTO post_statistics (post_id, {column}) VALUES ($1, 1) \
             ON CONFLICT (post_id) DO UPDATE SET {column} = post_statistics.{column} + 1"
        );
        sqlx::query(&sql)
            .bind(post_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
