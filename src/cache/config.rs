//! Cache and admission configuration derived from resolved settings.

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::config::{AdmissionSettings, CacheSettings};

const DEFAULT_CACHE_TTL_SECS: u64 = 600;
const DEFAULT_CACHE_NAMESPACE: &str = "cache";
const DEFAULT_POST_READ_LIMIT: usize = 500;
const DEFAULT_POST_LIST_LIMIT: usize = 100;
const DEFAULT_USER_READ_LIMIT: usize = 500;
const DEFAULT_BACKEND_TIMEOUT_MS: u64 = 3_000;

/// Read-through cache behaviour.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false, reads bypass the key-value store and go straight to admission.
    pub enabled: bool,
    /// Lifetime of populated entries.
    pub ttl: Duration,
    /// Leading key segment for cached reads.
    pub namespace: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            namespace: DEFAULT_CACHE_NAMESPACE.to_string(),
        }
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl: settings.ttl,
            namespace: settings.key_prefix.clone(),
        }
    }
}

/// Per-class concurrency limits plus the deadline applied to every admitted call.
#[derive(Debug, Clone)]
pub struct AdmissionLimits {
    pub post_read: NonZeroUsize,
    pub post_list: NonZeroUsize,
    pub user_read: NonZeroUsize,
    pub backend_timeout: Duration,
}

impl Default for AdmissionLimits {
    fn default() -> Self {
        Self {
            post_read: non_zero(DEFAULT_POST_READ_LIMIT),
            post_list: non_zero(DEFAULT_POST_LIST_LIMIT),
            user_read: non_zero(DEFAULT_USER_READ_LIMIT),
            backend_timeout: Duration::from_millis(DEFAULT_BACKEND_TIMEOUT_MS),
        }
    }
}

impl From<&AdmissionSettings> for AdmissionLimits {
    fn from(settings: &AdmissionSettings) -> Self {
        Self {
            post_read: settings.post_read_limit,
            post_list: settings.post_list_limit,
            user_read: settings.user_read_limit,
            backend_timeout: settings.backend_timeout,
        }
    }
}

fn non_zero(value: usize) -> NonZeroUsize {
    NonZeroUsize::new(value).unwrap_or(NonZeroUsize::MIN)
}
