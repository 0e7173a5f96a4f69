//! Shared key-value caching for Lectern.
//!
//! - [`KvStore`]: the remote map both sessions and cached reads live in
//! - [`CacheAside`]: read-through lookups with best-effort population and explicit invalidation
//! - [`Admission`]: per-class concurrency limits in front of the backing store
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 600
//!
//! [admission]
//! post_read_limit = 500
//! post_list_limit = 100
//! ```

mod admission;
mod config;
mod keys;
mod kv;
mod memory;
mod store;

pub use admission::{
    Admission, AdmissionClass, AdmissionController, AdmissionRejected, AdmissionTicket,
};
pub use config::{AdmissionLimits, CacheConfig};
pub use keys::{CacheKey, namespaced};
pub use kv::{KvError, KvStore};
pub use memory::InMemoryKvStore;
pub use store::{CacheAside, CacheError, FetchError};
