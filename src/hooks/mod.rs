//! Domain hooks: per-entity composition of one query binding and one
//! optimistic mutation engine per writable operation.
//!
//! Each hook derives its cache key from semantic identity only (entity
//! kind, entity id, canonical date) — never from UI state — and defines the
//! entity-specific local transform for each mutation. All hooks share one
//! [`crate::store::CacheStore`]; isolation between unrelated data comes
//! entirely from key disjointness.
//!
//! # Hook surface
//!
//! - [`ActivitiesHook`]: a citizen's or grade's day plan, keyed on
//!   `["activity", kind, owner id, ISO date]`.
//! - [`GradesHook`]: one grade with embedded citizens, keyed on
//!   `["grade", grade id]`.
//! - [`ClassesHook`]: an organisation's class list, keyed on
//!   `["org", org id, "classes"]`.
//! - [`OrganisationOverviewHook`]: the current user's organisations, keyed
//!   on `["user", user id, "organisation-overview"]`.
//! - [`InvitationsHook`]: the current user's pending invitations, keyed on
//!   `["user", user id, "invitations"]`.

mod activities;
mod classes;
mod grades;
mod invitations;
mod organisations;

pub use activities::{ActivitiesHook, activity_key};
pub use classes::{ClassesHook, class_list_key};
pub use grades::{GradeOp, GradesHook, grade_key};
pub use invitations::{InvitationsHook, invitation_key};
pub use organisations::{OrganisationOverviewHook, org_overview_key};
