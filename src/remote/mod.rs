//! Remote data source contracts.
//!
//! One trait per entity family, each operation resolving to a plain DTO (or
//! nothing) or failing with a normalized [`crate::error::SyncError`] whose
//! message is user-displayable. The cache layer treats every remote failure
//! identically — it triggers rollback — and never branches on status codes.
//! Retry and timeout policy belong to the implementation behind the trait,
//! not to the cache layer.

pub mod http;

use async_trait::async_trait;
use jiff::civil::Date;

use crate::error::Result;
use crate::types::{
    ActivityDto, ActivityOwner, ActivityPatch, ClassDto, GradeDetail, InvitationDto,
    InvitationResponse, ItemId, NewActivity, NewClass, NewOrganisation, OrgOverviewDto,
};

pub use http::RestClient;

#[async_trait]
pub trait ActivityApi: Send + Sync {
    /// Fetch one owner's day plan for a calendar date.
    async fn fetch_day(&self, owner: ActivityOwner, date: Date) -> Result<Vec<ActivityDto>>;

    /// Create an activity; the server assigns the authoritative id.
    async fn create(
        &self,
        owner: ActivityOwner,
        date: Date,
        new: NewActivity,
    ) -> Result<ActivityDto>;

    async fn update(&self, id: ItemId, patch: ActivityPatch) -> Result<()>;

    async fn remove(&self, id: ItemId) -> Result<()>;

    async fn set_completed(&self, id: ItemId, is_completed: bool) -> Result<()>;
}

#[async_trait]
pub trait GradeApi: Send + Sync {
    async fn fetch_grade(&self, grade_id: ItemId) -> Result<GradeDetail>;

    async fn add_citizens(&self, grade_id: ItemId, citizen_ids: Vec<ItemId>) -> Result<()>;

    async fn remove_citizens(&self, grade_id: ItemId, citizen_ids: Vec<ItemId>) -> Result<()>;
}

#[async_trait]
pub trait ClassApi: Send + Sync {
    async fn fetch_classes(&self, org_id: ItemId) -> Result<Vec<ClassDto>>;

    async fn create_class(&self, org_id: ItemId, new: NewClass) -> Result<ClassDto>;

    async fn remove_class(&self, class_id: ItemId) -> Result<()>;
}

#[async_trait]
pub trait OrganisationApi: Send + Sync {
    async fn fetch_overview(&self, user_id: &str) -> Result<Vec<OrgOverviewDto>>;

    async fn create_organisation(&self, new: NewOrganisation) -> Result<OrgOverviewDto>;

    async fn remove_organisation(&self, org_id: ItemId) -> Result<()>;
}

#[async_trait]
pub trait InvitationApi: Send + Sync {
    async fn fetch_invitations(&self, user_id: &str) -> Result<Vec<InvitationDto>>;

    async fn respond(&self, invitation_id: ItemId, response: InvitationResponse) -> Result<()>;
}
