use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Course summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
  pub id: String,
  pub title: String,
  pub instructor_id: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub published: bool,
}

/// Assignment within a course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
  pub id: String,
  pub course_id: String,
  pub title: String,
  #[serde(default)]
  pub due_date: Option<DateTime<Utc>>,
  #[serde(default)]
  pub max_points: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Student,
  Instructor,
  Admin,
}

/// User profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
  pub uid: String,
  pub display_name: String,
  pub email: String,
  pub role: Role,
}
