//! Portal reads routed through the cache layer.

use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::cache::CacheLayer;

use super::keys::PortalQueryKey;
use super::source::{DocumentSource, ASSIGNMENTS, COURSES, USERS};
use super::types::{Assignment, Course, Profile};

/// Portal client with transparent caching.
///
/// Wraps a [`DocumentSource`] and answers from the facade or screen cache when
/// it can. Missing documents are errors and are never cached.
pub struct CachedPortalClient<S: DocumentSource> {
  source: Arc<S>,
  cache: CacheLayer,
}

impl<S: DocumentSource> Clone for CachedPortalClient<S> {
  fn clone(&self) -> Self {
    Self {
      source: Arc::clone(&self.source),
      cache: self.cache.clone(),
    }
  }
}

fn decode_all<T: DeserializeOwned>(docs: Vec<Value>) -> Result<Vec<T>> {
  docs
    .into_iter()
    .map(|doc| serde_json::from_value(doc).map_err(|e| eyre!("Malformed document: {}", e)))
    .collect()
}

impl<S: DocumentSource> CachedPortalClient<S> {
  pub fn new(source: S, cache: CacheLayer) -> Self {
    Self {
      source: Arc::new(source),
      cache,
    }
  }

  /// Courses taught by `instructor_id`.
  pub async fn courses_for_instructor(&self, instructor_id: &str) -> Result<Vec<Course>> {
    let key = PortalQueryKey::InstructorCourses {
      instructor_id: instructor_id.to_string(),
    };

    let result = self
      .cache
      .fetch(&key, || async {
        let docs = self
          .source
          .query(COURSES, "instructorId", instructor_id)
          .await?;
        decode_all::<Course>(docs)
      })
      .await?;

    debug!(source = ?result.source, count = result.data.len(), "Loaded instructor courses");
    Ok(result.data)
  }

  /// A single course.
  pub async fn course(&self, id: &str) -> Result<Course> {
    let key = PortalQueryKey::Course { id: id.to_string() };

    let result = self
      .cache
      .fetch(&key, || async {
        let doc = self
          .source
          .get_document(COURSES, id)
          .await?
          .ok_or_else(|| eyre!("Course {} not found", id))?;
        let course: Course =
          serde_json::from_value(doc).map_err(|e| eyre!("Malformed course {}: {}", id, e))?;
        Ok(course)
      })
      .await?;

    Ok(result.data)
  }

  /// Assignments belonging to `course_id`.
  pub async fn assignments_for_course(&self, course_id: &str) -> Result<Vec<Assignment>> {
    let key = PortalQueryKey::CourseAssignments {
      course_id: course_id.to_string(),
    };

    let result = self
      .cache
      .fetch(&key, || async {
        let docs = self.source.query(ASSIGNMENTS, "courseId", course_id).await?;
        decode_all::<Assignment>(docs)
      })
      .await?;

    Ok(result.data)
  }

  /// A user's profile.
  pub async fn profile(&self, uid: &str) -> Result<Profile> {
    let key = PortalQueryKey::Profile {
      uid: uid.to_string(),
    };

    let result = self
      .cache
      .fetch(&key, || async {
        let doc = self
          .source
          .get_document(USERS, uid)
          .await?
          .ok_or_else(|| eyre!("Profile {} not found", uid))?;
        let profile: Profile =
          serde_json::from_value(doc).map_err(|e| eyre!("Malformed profile {}: {}", uid, e))?;
        Ok(profile)
      })
      .await?;

    Ok(result.data)
  }

  /// Forget a cached query, e.g. after the screen edits the underlying data.
  pub async fn invalidate(&self, key: &PortalQueryKey) {
    self.cache.invalidate(key).await;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheContext, TierCache, Tiers};
  use serde_json::json;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Mutex;

  /// In-memory document store that counts remote reads.
  struct FakeSource {
    docs: Mutex<Vec<(String, Value)>>,
    reads: AtomicU32,
  }

  impl FakeSource {
    fn new(docs: Vec<(&str, Value)>) -> Self {
      Self {
        docs: Mutex::new(docs.into_iter().map(|(c, d)| (c.to_string(), d)).collect()),
        reads: AtomicU32::new(0),
      }
    }
  }

  impl DocumentSource for FakeSource {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>> {
      self.reads.fetch_add(1, Ordering::SeqCst);
      let docs = self.docs.lock().unwrap();
      Ok(
        docs
          .iter()
          .find(|(c, d)| c == collection && (d["id"] == id || d["uid"] == id))
          .map(|(_, d)| d.clone()),
      )
    }

    async fn query(&self, collection: &str, field: &str, value: &str) -> Result<Vec<Value>> {
      self.reads.fetch_add(1, Ordering::SeqCst);
      let docs = self.docs.lock().unwrap();
      Ok(
        docs
          .iter()
          .filter(|(c, d)| c == collection && d[field] == value)
          .map(|(_, d)| d.clone())
          .collect(),
      )
    }
  }

  fn client(source: FakeSource) -> CachedPortalClient<FakeSource> {
    let tiers = Tiers::in_memory();
    let facade = Arc::new(CacheContext::new(tiers.clone()));
    let layer = CacheLayer::new(facade, TierCache::new("portal_", tiers));
    CachedPortalClient::new(source, layer)
  }

  fn fixtures() -> FakeSource {
    FakeSource::new(vec![
      (
        COURSES,
        json!({"id": "c1", "title": "Algebra", "instructorId": "t1", "published": true}),
      ),
      (COURSES, json!({"id": "c2", "title": "Biology", "instructorId": "t2"})),
      (
        ASSIGNMENTS,
        json!({"id": "a1", "courseId": "c1", "title": "Quiz 1", "maxPoints": 10,
               "dueDate": "2026-11-01T12:00:00Z"}),
      ),
      (
        USERS,
        json!({"uid": "u1", "displayName": "Ada", "email": "ada@example.edu", "role": "student"}),
      ),
    ])
  }

  #[tokio::test]
  async fn test_course_is_fetched_once() {
    let client = client(fixtures());

    let first = client.course("c1").await.unwrap();
    let second = client.course("c1").await.unwrap();

    assert_eq!(first.title, "Algebra");
    assert!(first.published);
    assert_eq!(first, second);
    assert_eq!(client.source.reads.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_instructor_courses_filtered() {
    let client = client(fixtures());
    let courses = client.courses_for_instructor("t2").await.unwrap();

    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0].id, "c2");
    assert_eq!(courses[0].description, None);
  }

  #[tokio::test]
  async fn test_assignments_decode_dates() {
    let client = client(fixtures());
    let assignments = client.assignments_for_course("c1").await.unwrap();

    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].max_points, Some(10));
    assert_eq!(
      assignments[0].due_date.map(|d| d.to_rfc3339()),
      Some("2026-11-01T12:00:00+00:00".to_string())
    );
  }

  #[tokio::test]
  async fn test_profile_and_missing_document() {
    let client = client(fixtures());

    let profile = client.profile("u1").await.unwrap();
    assert_eq!(profile.display_name, "Ada");

    let err = client.profile("nobody").await.unwrap_err();
    assert!(err.to_string().contains("not found"));

    // The miss was not cached; a second attempt goes remote again
    let reads = client.source.reads.load(Ordering::SeqCst);
    assert!(client.profile("nobody").await.is_err());
    assert_eq!(client.source.reads.load(Ordering::SeqCst), reads + 1);
  }

  #[tokio::test]
  async fn test_invalidate_refetches_updated_document() {
    let client = client(fixtures());
    client.course("c1").await.unwrap();

    {
      let mut docs = client.source.docs.lock().unwrap();
      docs[0].1["title"] = json!("Algebra II");
    }
    assert_eq!(client.course("c1").await.unwrap().title, "Algebra");

    client
      .invalidate(&PortalQueryKey::Course { id: "c1".into() })
      .await;
    assert_eq!(client.course("c1").await.unwrap().title, "Algebra II");
  }
}
