//! Cache keys for portal queries.

use sha2::{Digest, Sha256};

use crate::cache::QueryKey;

/// Query key types for portal reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PortalQueryKey {
  /// Courses taught by an instructor
  InstructorCourses { instructor_id: String },
  /// A single course document
  Course { id: String },
  /// Assignments belonging to a course
  CourseAssignments { course_id: String },
  /// A user's profile document
  Profile { uid: String },
}

impl PortalQueryKey {
  fn kind(&self) -> &'static str {
    match self {
      Self::InstructorCourses { .. } => "instructor_courses",
      Self::Course { .. } => "course",
      Self::CourseAssignments { .. } => "course_assignments",
      Self::Profile { .. } => "profile",
    }
  }

  fn id(&self) -> &str {
    match self {
      Self::InstructorCourses { instructor_id } => instructor_id,
      Self::Course { id } => id,
      Self::CourseAssignments { course_id } => course_id,
      Self::Profile { uid } => uid,
    }
  }
}

impl QueryKey for PortalQueryKey {
  fn cache_key(&self) -> String {
    let input = format!("{}:{}", self.kind(), self.id().trim());

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{}:{}", self.kind(), hex::encode(hasher.finalize()))
  }

  fn description(&self) -> String {
    match self {
      Self::InstructorCourses { instructor_id } => format!("courses taught by {}", instructor_id),
      Self::Course { id } => format!("course {}", id),
      Self::CourseAssignments { course_id } => format!("assignments for course {}", course_id),
      Self::Profile { uid } => format!("profile {}", uid),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_key_is_stable_and_namespaced() {
    let key = PortalQueryKey::Course { id: "c1".into() };
    let hashed = key.cache_key();

    assert!(hashed.starts_with("course:"));
    assert_eq!(hashed.len(), "course:".len() + 64);
    assert_eq!(hashed, key.clone().cache_key());
  }

  #[test]
  fn test_whitespace_is_normalized() {
    let a = PortalQueryKey::Profile { uid: "u1".into() };
    let b = PortalQueryKey::Profile { uid: "  u1 ".into() };
    assert_eq!(a.cache_key(), b.cache_key());
  }

  #[test]
  fn test_kinds_do_not_collide() {
    let course = PortalQueryKey::Course { id: "x".into() };
    let assignments = PortalQueryKey::CourseAssignments { course_id: "x".into() };
    assert_ne!(course.cache_key(), assignments.cache_key());
  }

  #[test]
  fn test_description() {
    let key = PortalQueryKey::InstructorCourses {
      instructor_id: "t9".into(),
    };
    assert_eq!(key.description(), "courses taught by t9");
  }
}
