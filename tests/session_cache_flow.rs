mod common;

use std::sync::Arc;

use bytes::Bytes;
use lectern::application::posts::{PostServiceError, SavePostCommand};
use lectern::application::session::SessionError;
use lectern::cache::{
    Admission, AdmissionLimits, CacheConfig, InMemoryKvStore, KvStore, namespaced,
};
use lectern::domain::types::{Rank, Star};
use lectern::domain::users::Credentials;

use common::{MemoryRepos, SESSION_NAMESPACE, build_state, default_state};

async fn lucy_with_post() -> (Arc<MemoryRepos>, Arc<InMemoryKvStore>, i64) {
    let repos = MemoryRepos::new();
    repos.add_user("Lucy", "hunter22", Rank::Bronze).await;
    let id = repos.add_post("Lucy", "First light", "hello").await;
    (repos, Arc::new(InMemoryKvStore::new()), id)
}

#[tokio::test]
async fn lucy_signs_in_reads_through_cache_and_loses_stale_session() {
    let (repos, kv, id) = lucy_with_post().await;
    assert_eq!(id, 1);
    let state = default_state(repos.clone(), kv.clone());

    let session = state
        .sessions
        .sign_in(&Credentials::new("Lucy", "hunter22"))
        .await
        .expect("sign in");
    assert_eq!(session.subject, "Lucy");
    let stored = kv
        .get(&namespaced(SESSION_NAMESPACE, "Lucy"))
        .await
        .expect("kv get");
    assert!(stored.is_some(), "session lives under the session namespace");

    let subject = state
        .sessions
        .validate(Some(session.token.as_str()), Some("Lucy"))
        .await
        .expect("valid session");
    assert_eq!(subject, "Lucy");

    let first = state.posts.post(1).await.expect("first read");
    let second = state.posts.post(1).await.expect("second read");
    assert_eq!(first, second);
    assert_eq!(repos.post_reads(), 1, "second read is served from the cache");

    repos.retitle(1, "Edited elsewhere").await;
    let cached = state.posts.post(1).await.expect("cached read");
    assert_eq!(cached.title, "First light");

    state
        .posts
        .save(
            "Lucy",
            SavePostCommand {
                id: 1,
                title: "Second light".to_string(),
                body: "updated".to_string(),
            },
        )
        .await
        .expect("save");
    let fresh = state.posts.post(1).await.expect("read after save");
    assert_eq!(fresh.title, "Second light");
    assert_eq!(fresh.body, "updated");

    let replacement = state
        .sessions
        .sign_in(&Credentials::new("Lucy", "hunter22"))
        .await
        .expect("second sign in");
    assert_ne!(replacement.token, session.token);

    let stale = state
        .sessions
        .validate(Some(session.token.as_str()), Some("Lucy"))
        .await
        .expect_err("old token no longer validates");
    assert!(matches!(stale, SessionError::Mismatched { .. }));
    assert!(stale.clears_markers());

    state.sessions.sign_out("Lucy").await.expect("sign out");
    let ended = state
        .sessions
        .validate(Some(replacement.token.as_str()), Some("Lucy"))
        .await
        .expect_err("signed out");
    assert!(matches!(ended, SessionError::NoSession { .. }));
    assert!(!ended.clears_markers());
}

#[tokio::test]
async fn wrong_password_and_unknown_user_are_indistinguishable() {
    let (repos, kv, _) = lucy_with_post().await;
    let state = default_state(repos, kv.clone());

    let wrong = state
        .sessions
        .sign_in(&Credentials::new("Lucy", "nope"))
        .await
        .expect_err("wrong password");
    let unknown = state
        .sessions
        .sign_in(&Credentials::new("Ghost", "hunter22"))
        .await
        .expect_err("unknown user");

    assert!(matches!(wrong, SessionError::InvalidCredentials));
    assert!(matches!(unknown, SessionError::InvalidCredentials));
    assert!(kv.is_empty(), "failed sign-ins store nothing");
}

#[tokio::test]
async fn vote_refreshes_post_info_but_keeps_post_entry() {
    let (repos, kv, id) = lucy_with_post().await;
    let state = default_state(repos.clone(), kv);

    let before = state.posts.view("Lucy", id).await.expect("view");
    assert_eq!(before.votes.total, 0);
    let reads_after_view = repos.post_reads();

    state
        .posts
        .vote(id, Star::new(4).expect("star"))
        .await
        .expect("vote");
    state
        .posts
        .vote(id, Star::new(5).expect("star"))
        .await
        .expect("vote");

    let after = state.posts.view("Lucy", id).await.expect("view");
    assert_eq!(after.votes.total, 2);
    assert_eq!(after.votes.average, 5);
    assert_eq!(after.info.statistics.star4, 1);
    // Only the post info is fetched again; the post itself stays cached.
    assert_eq!(repos.post_reads(), reads_after_view + 1);
}

#[tokio::test]
async fn missing_posts_are_not_cached() {
    let (repos, kv, _) = lucy_with_post().await;
    let state = default_state(repos.clone(), kv.clone());

    for _ in 0..2 {
        let err = state.posts.post(42).await.expect_err("no such post");
        assert!(matches!(err, PostServiceError::NotFound(42)));
    }
    assert_eq!(repos.post_reads(), 2);
    let key = namespaced("cache", "post:42");
    assert!(kv.get(&key).await.expect("kv get").is_none());
}

#[tokio::test]
async fn other_users_may_view_but_not_edit() {
    let (repos, kv, id) = lucy_with_post().await;
    repos.add_user("Bob", "hunter22", Rank::Silver).await;
    let state = default_state(repos, kv);

    let view = state.posts.view("Bob", id).await.expect("view");
    assert!(view.permissions.view);
    assert!(!view.permissions.edit);

    let err = state
        .posts
        .save(
            "Bob",
            SavePostCommand {
                id,
                title: "Hijacked".to_string(),
                body: String::new(),
            },
        )
        .await
        .expect_err("not the author");
    assert!(matches!(err, PostServiceError::Domain(_)));

    state.posts.delete("superadmin", id).await.expect("superadmin deletes");
    let gone = state.posts.post(id).await.expect_err("deleted");
    assert!(matches!(gone, PostServiceError::NotFound(_)));
}

#[tokio::test]
async fn rank_changes_invalidate_cached_ranks() {
    let (repos, kv, _) = lucy_with_post().await;
    let state = default_state(repos.clone(), kv);

    assert_eq!(state.users.rank("Lucy").await.expect("rank"), Rank::Bronze);
    assert_eq!(state.users.rank("Lucy").await.expect("rank"), Rank::Bronze);
    assert_eq!(repos.user_reads(), 1);

    let change = lectern::domain::entities::UserInfo {
        username: "Lucy".to_string(),
        rank: Rank::Gold,
    };
    state
        .users
        .set_ranks("Lucy", std::slice::from_ref(&change))
        .await
        .expect_err("only admins change ranks");
    state
        .users
        .set_ranks("admin", &[change])
        .await
        .expect("admin changes ranks");

    assert_eq!(state.users.rank("Lucy").await.expect("rank"), Rank::Gold);
}

#[tokio::test]
async fn disabled_cache_reads_through_every_time_and_keeps_sessions() {
    let (repos, kv, id) = lucy_with_post().await;
    let limits = AdmissionLimits::default();
    let config = CacheConfig {
        enabled: false,
        ..CacheConfig::default()
    };
    let state = build_state(
        repos.clone(),
        kv.clone(),
        config,
        Arc::new(Admission::new(&limits)),
        limits.backend_timeout,
    );

    state.posts.post(id).await.expect("read");
    state.posts.post(id).await.expect("read");
    assert_eq!(repos.post_reads(), 2);

    let session = state
        .sessions
        .sign_in(&Credentials::new("Lucy", "hunter22"))
        .await
        .expect("sign in");
    state
        .sessions
        .validate(Some(session.token.as_str()), Some("Lucy"))
        .await
        .expect("sessions ignore the cache switch");
    assert_eq!(kv.len(), 1);
}

#[tokio::test]
async fn garbage_under_a_cache_key_is_refetched() {
    let (repos, kv, id) = lucy_with_post().await;
    let state = default_state(repos.clone(), kv.clone());

    kv.set_with_ttl(
        &namespaced("cache", &format!("post:{id}")),
        Bytes::from_static(b"not json"),
        std::time::Duration::from_secs(60),
    )
    .await
    .expect("seed garbage");

    let post = state.posts.post(id).await.expect("read");
    assert_eq!(post.title, "First light");
    assert_eq!(repos.post_reads(), 1);
}
