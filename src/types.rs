//! Entity DTOs exchanged with the backing REST API and held in the cache.
//!
//! Relationships are embedded by value (nested collections), not by
//! reference: updating a citizen inside one grade's cached entry does not
//! propagate to the same citizen embedded elsewhere. The cache guarantees
//! intra-key consistency only.

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::mutation::{CacheItem, NoPatch, NoToggle};

/// Server-assigned entity id. Negative values are client-side placeholders
/// for optimistically created rows (see [`crate::mutation::PlaceholderIds`]).
pub type ItemId = i64;

/// Whose day plan an activity collection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityOwner {
    Citizen(ItemId),
    Grade(ItemId),
}

impl ActivityOwner {
    pub fn kind(&self) -> &'static str {
        match self {
            ActivityOwner::Citizen(_) => "citizen",
            ActivityOwner::Grade(_) => "grade",
        }
    }

    pub fn id(&self) -> ItemId {
        match self {
            ActivityOwner::Citizen(id) | ActivityOwner::Grade(id) => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDto {
    pub id: ItemId,
    pub name: String,
    pub description: Option<String>,
    pub date: Date,
    pub order: i32,
    pub is_completed: bool,
    pub pictogram_id: Option<ItemId>,
}

/// Partial update for an activity. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub order: Option<i32>,
    pub pictogram_id: Option<ItemId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    pub name: String,
    pub description: Option<String>,
    pub order: i32,
    pub pictogram_id: Option<ItemId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityToggle {
    IsCompleted,
}

impl CacheItem for ActivityDto {
    type Patch = ActivityPatch;
    type Toggle = ActivityToggle;

    fn item_id(&self) -> ItemId {
        self.id
    }

    fn apply_patch(&mut self, patch: &ActivityPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(order) = patch.order {
            self.order = order;
        }
        if let Some(pictogram_id) = patch.pictogram_id {
            self.pictogram_id = Some(pictogram_id);
        }
    }

    fn toggle(&mut self, field: ActivityToggle) {
        match field {
            ActivityToggle::IsCompleted => self.is_completed = !self.is_completed,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitizenDto {
    pub id: ItemId,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeDto {
    pub id: ItemId,
    pub name: String,
}

/// A grade with its member citizens embedded by value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeDetail {
    pub grade: GradeDto,
    pub citizens: Vec<CitizenDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDto {
    pub id: ItemId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClass {
    pub name: String,
}

impl CacheItem for ClassDto {
    type Patch = NoPatch;
    type Toggle = NoToggle;

    fn item_id(&self) -> ItemId {
        self.id
    }

    fn apply_patch(&mut self, _patch: &NoPatch) {}

    fn toggle(&mut self, field: NoToggle) {
        match field {}
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgOverviewDto {
    pub id: ItemId,
    pub name: String,
    pub member_count: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrganisation {
    pub name: String,
}

impl CacheItem for OrgOverviewDto {
    type Patch = NoPatch;
    type Toggle = NoToggle;

    fn item_id(&self) -> ItemId {
        self.id
    }

    fn apply_patch(&mut self, _patch: &NoPatch) {}

    fn toggle(&mut self, field: NoToggle) {
        match field {}
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationDto {
    pub id: ItemId,
    pub organisation_id: ItemId,
    pub organisation_name: String,
    pub sender_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationResponse {
    Accept,
    Decline,
}

impl CacheItem for InvitationDto {
    type Patch = NoPatch;
    type Toggle = NoToggle;

    fn item_id(&self) -> ItemId {
        self.id
    }

    fn apply_patch(&mut self, _patch: &NoPatch) {}

    fn toggle(&mut self, field: NoToggle) {
        match field {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    fn activity(id: ItemId) -> ActivityDto {
        ActivityDto {
            id,
            name: format!("activity-{}", id),
            description: None,
            date: date(2024, 10, 1),
            order: 0,
            is_completed: false,
            pictogram_id: None,
        }
    }

    #[test]
    fn test_patch_leaves_unset_fields_untouched() {
        let mut a = activity(1);
        a.description = Some("before".to_string());
        a.apply_patch(&ActivityPatch {
            name: Some("renamed".to_string()),
            ..Default::default()
        });
        assert_eq!(a.name, "renamed");
        assert_eq!(a.description.as_deref(), Some("before"));
        assert_eq!(a.order, 0);
    }

    #[test]
    fn test_toggle_flips_completion() {
        let mut a = activity(1);
        a.toggle(ActivityToggle::IsCompleted);
        assert!(a.is_completed);
        a.toggle(ActivityToggle::IsCompleted);
        assert!(!a.is_completed);
    }

    #[test]
    fn test_activity_serde_shape() {
        let a = activity(3);
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["isCompleted"], serde_json::json!(false));
        assert_eq!(json["date"], serde_json::json!("2024-10-01"));
        let back: ActivityDto = serde_json::from_value(json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn test_invitation_response_wire_form() {
        assert_eq!(
            serde_json::to_string(&InvitationResponse::Accept).unwrap(),
            "\"accept\""
        );
        assert_eq!(
            serde_json::to_string(&InvitationResponse::Decline).unwrap(),
            "\"decline\""
        );
    }
}
