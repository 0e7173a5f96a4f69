use async_trait::async_trait;

use crate::application::repos::{CreateUserParams, RepoError, UsersRepo};
use crate::domain::entities::{UserInfo, UserRecord};
use crate::domain::types::Rank;

use super::PostgresRepositories;
use super::map_sqlx_error;

#[derive(sqlx::FromRow)]
struct UserRow {
    username: String,
    password_hash: String,
    rank: Rank,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            username: row.username,
            password_hash: row.password_hash,
            rank: row.rank,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserInfoRow {
    username: String,
    rank: Rank,
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT username, password_hash, rank FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<(), RepoError> {
        sqlx::query("INSERT INTO users (username, password_hash, rank) VALUES ($1, $2, $3)")
            .bind(params.username)
            .bind(params.password_hash)
            .bind(params.rank)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<UserInfo>, RepoError> {
        let rows = sqlx::query_as::<_, UserInfoRow>(
            "SELECT username, rank FROM users ORDER BY username",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| UserInfo {
                username: row.username,
                rank: row.rank,
            })
            .collect())
    }

    async fn update_ranks(&self, changes: &[UserInfo]) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        for change in changes {
            let result = sqlx::query("UPDATE users SET rank = $1 WHERE username = $2")
                .bind(change.rank)
                .bind(&change.username)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            if result.rows_affected() == 0 {
                return Err(RepoError::InvalidInput {
                    message: format!("unknown user `{}`", change.username),
                });
            }
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}
