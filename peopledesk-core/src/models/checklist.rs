use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An onboarding checklist template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checklist {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: Uuid,
    pub checklist_id: Uuid,
    pub description: String,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

/// A checklist handed to a user. Source of truth for checklist progress rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistAssignment {
    pub id: Uuid,
    pub checklist_id: Uuid,
    pub user_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChecklistInput {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChecklistItemInput {
    pub description: String,
    #[serde(default)]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignChecklistInput {
    pub user_id: Uuid,
}
