//! The remote document database, seen from the cache's side.

use color_eyre::Result;
use serde_json::Value;
use std::future::Future;

/// Collection holding course documents
pub const COURSES: &str = "courses";
/// Collection holding assignment documents
pub const ASSIGNMENTS: &str = "assignments";
/// Collection holding user profile documents
pub const USERS: &str = "users";

/// Read access to the remote document store.
pub trait DocumentSource: Send + Sync {
  /// Fetch one document by id.
  fn get_document(
    &self,
    collection: &str,
    id: &str,
  ) -> impl Future<Output = Result<Option<Value>>> + Send;

  /// Fetch every document in `collection` whose `field` equals `value`.
  fn query(
    &self,
    collection: &str,
    field: &str,
    value: &str,
  ) -> impl Future<Output = Result<Vec<Value>>> + Send;
}
