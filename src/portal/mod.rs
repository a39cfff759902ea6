//! Education-portal data, read through the cache.

mod client;
mod keys;
mod source;
mod types;

pub use client::CachedPortalClient;
pub use keys::PortalQueryKey;
pub use source::{DocumentSource, ASSIGNMENTS, COURSES, USERS};
pub use types::{Assignment, Course, Profile, Role};
