//! Lectern: a small blog server whose sessions and read-heavy queries live in a shared
//! key-value store, with per-class admission control in front of the database.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
