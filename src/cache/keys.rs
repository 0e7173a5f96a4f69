//! Cache key definitions.
//!
//! Every cached read has one logical key, rendered as `<shape>` or `<shape>:<param>`.
//! The store prefixes it with its namespace, so `post:1` lands at `cache:post:1`.

use std::fmt;

/// Logical key of a cached read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A single post body.
    Post(i64),
    /// A post joined with its vote statistics.
    PostInfo(i64),
    /// Every post with statistics, used by the index.
    PostInfos,
    /// Distinct author names.
    Authors,
    /// Rank of one user.
    UserRank(String),
}

impl CacheKey {
    fn shape(&self) -> &'static str {
        match self {
            CacheKey::Post(_) => "post",
            CacheKey::PostInfo(_) => "post-info",
            CacheKey::PostInfos => "post-infos",
            CacheKey::Authors => "authors",
            CacheKey::UserRank(_) => "user-rank",
        }
    }

    /// Keys whose cached value embeds post `id` or derives from the post table.
    pub fn dependents_of_post(id: i64) -> [CacheKey; 4] {
        [
            CacheKey::Post(id),
            CacheKey::PostInfo(id),
            CacheKey::PostInfos,
            CacheKey::Authors,
        ]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Post(id) | CacheKey::PostInfo(id) => write!(f, "{}:{id}", self.shape()),
            CacheKey::UserRank(name) => write!(f, "{}:{name}", self.shape()),
            CacheKey::PostInfos | CacheKey::Authors => f.write_str(self.shape()),
        }
    }
}

/// Joins a namespace and a logical key into the string stored in the key-value store.
pub fn namespaced(namespace: &str, key: &str) -> String {
    format!("{namespace}:{key}")
}
