#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use lectern::application::accounts::AccountService;
use lectern::application::passwords::hash_password;
use lectern::application::posts::PostService;
use lectern::application::repos::{
    CreatePostParams, CreateUserParams, HealthRepo, PostsRepo, PostsWriteRepo, RepoError,
    UpdatePostParams, UsersRepo,
};
use lectern::application::session::{DEFAULT_SESSION_TTL, SessionManager};
use lectern::application::users::UserService;
use lectern::cache::{Admission, AdmissionLimits, CacheAside, CacheConfig, KvStore};
use lectern::domain::entities::{
    PostInfo, PostRecord, PostStatisticsRecord, UserInfo, UserRecord,
};
use lectern::domain::types::{Rank, Star};
use lectern::infra::http::HttpState;

pub const SESSION_NAMESPACE: &str = "session";

/// Posts and users kept in memory, counting every read that reaches them.
#[derive(Default)]
pub struct MemoryRepos {
    posts: Mutex<BTreeMap<i64, PostInfo>>,
    users: Mutex<BTreeMap<String, UserRecord>>,
    next_id: AtomicI64,
    post_reads: AtomicUsize,
    user_reads: AtomicUsize,
    database_down: AtomicBool,
}

impl MemoryRepos {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn post_reads(&self) -> usize {
        self.post_reads.load(Ordering::SeqCst)
    }

    pub fn user_reads(&self) -> usize {
        self.user_reads.load(Ordering::SeqCst)
    }

    pub fn set_database_down(&self, down: bool) {
        self.database_down.store(down, Ordering::SeqCst);
    }

    pub async fn add_user(&self, username: &str, password: &str, rank: Rank) {
        self.users.lock().await.insert(
            username.to_string(),
            UserRecord {
                username: username.to_string(),
                password_hash: hash_password(password).expect("password should hash"),
                rank,
            },
        );
    }

    pub async fn add_post(&self, author: &str, title: &str, body: &str) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = OffsetDateTime::now_utc();
        self.posts.lock().await.insert(
            id,
            PostInfo {
                post: PostRecord {
                    id,
                    title: title.to_string(),
                    author: author.to_string(),
                    created_at: now,
                    updated_at: now,
                    body: body.to_string(),
                },
                statistics: PostStatisticsRecord::default(),
            },
        );
        id
    }

    /// Changes a title behind the cache's back.
    pub async fn retitle(&self, id: i64, title: &str) {
        if let Some(info) = self.posts.lock().await.get_mut(&id) {
            info.post.title = title.to_string();
        }
    }

    fn count_post_read(&self) {
        self.post_reads.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PostsRepo for MemoryRepos {
    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        self.count_post_read();
        Ok(self.posts.lock().await.get(&id).map(|info| info.post.clone()))
    }

    async fn find_post_info(&self, id: i64) -> Result<Option<PostInfo>, RepoError> {
        self.count_post_read();
        Ok(self.posts.lock().await.get(&id).cloned())
    }

    async fn list_post_infos(&self) -> Result<Vec<PostInfo>, RepoError> {
        self.count_post_read();
        Ok(self.posts.lock().await.values().rev().cloned().collect())
    }

    async fn list_authors(&self) -> Result<Vec<String>, RepoError> {
        self.count_post_read();
        let mut authors: Vec<String> = self
            .posts
            .lock()
            .await
            .values()
            .map(|info| info.post.author.clone())
            .collect();
        authors.sort();
        authors.dedup();
        Ok(authors)
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryRepos {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let id = self
            .add_post(&params.author, &params.title, &params.body)
            .await;
        Ok(self.posts.lock().await[&id].post.clone())
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut posts = self.posts.lock().await;
        let info = posts.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        info.post.title = params.title;
        info.post.body = params.body;
        info.post.updated_at = OffsetDateTime::now_utc();
        Ok(info.post.clone())
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        self.posts.lock().await.remove(&id);
        Ok(())
    }

    async fn record_vote(&self, post_id: i64, star: Star) -> Result<(), RepoError> {
        let mut posts = self.posts.lock().await;
        let info = posts.get_mut(&post_id).ok_or(RepoError::NotFound)?;
        let stats = &mut info.statistics;
        match star.get() {
            1 => stats.star1 += 1,
            2 => stats.star2 += 1,
            3 => stats.star3 += 1,
            4 => stats.star4 += 1,
            _ => stats.star5 += 1,
        }
        Ok(())
    }
}

#[async_trait]
impl UsersRepo for MemoryRepos {
    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        self.user_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.users.lock().await.get(username).cloned())
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<(), RepoError> {
        let mut users = self.users.lock().await;
        if users.contains_key(&params.username) {
            return Err(RepoError::Duplicate {
                constraint: "users_pkey".to_string(),
            });
        }
        users.insert(
            params.username.clone(),
            UserRecord {
                username: params.username,
                password_hash: params.password_hash,
                rank: params.rank,
            },
        );
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<UserInfo>, RepoError> {
        self.user_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.users.lock().await.values().map(UserInfo::from).collect())
    }

    async fn update_ranks(&self, changes: &[UserInfo]) -> Result<(), RepoError> {
        let mut users = self.users.lock().await;
        if let Some(missing) = changes
            .iter()
            .find(|change| !users.contains_key(&change.username))
        {
            return Err(RepoError::InvalidInput {
                message: format!("unknown user `{}`", missing.username),
            });
        }
        for change in changes {
            if let Some(user) = users.get_mut(&change.username) {
                user.rank = change.rank;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl HealthRepo for MemoryRepos {
    async fn health_check(&self) -> Result<(), RepoError> {
        if self.database_down.load(Ordering::SeqCst) {
            Err(RepoError::Timeout)
        } else {
            Ok(())
        }
    }
}

/// Wires every service over the given repositories and store.
pub fn build_state(
    repos: Arc<MemoryRepos>,
    kv: Arc<dyn KvStore>,
    cache_config: CacheConfig,
    admission: Arc<Admission>,
    backend_timeout: Duration,
) -> HttpState {
    let cache = CacheAside::new(Arc::clone(&kv), &cache_config, backend_timeout);

    let sessions = SessionManager::new(
        cache.scoped(SESSION_NAMESPACE),
        repos.clone(),
        DEFAULT_SESSION_TTL,
        backend_timeout,
    );
    let accounts = AccountService::new(repos.clone(), backend_timeout);
    let posts = PostService::new(
        repos.clone(),
        repos.clone(),
        cache.clone(),
        Arc::clone(&admission),
        cache_config.ttl,
        backend_timeout,
    );
    let users = UserService::new(repos.clone(), cache, admission, cache_config.ttl, backend_timeout);

    HttpState {
        sessions: Arc::new(sessions),
        accounts: Arc::new(accounts),
        posts: Arc::new(posts),
        users: Arc::new(users),
        kv,
        database: repos,
    }
}

pub fn default_state(repos: Arc<MemoryRepos>, kv: Arc<dyn KvStore>) -> HttpState {
    let limits = AdmissionLimits::default();
    build_state(
        repos,
        kv,
        CacheConfig::default(),
        Arc::new(Admission::new(&limits)),
        limits.backend_timeout,
    )
}
