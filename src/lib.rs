//! Client-side caching engine for the education portal.
//!
//! Screens read through [`cache::CacheLayer`]: the process-wide facade first,
//! then their own persistent tier cache, then the remote document store.

pub mod cache;
pub mod commands;
pub mod config;
pub mod db;
pub mod logging;
pub mod portal;
