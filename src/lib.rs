//! Optimistic keyed cache and data-sync core for the weekplan client.
//!
//! Server-derived collections (activities, grades, classes, organisations,
//! invitations) are cached under keys derived from logical identity — a
//! canonical date, an entity id — in one process-wide [`CacheStore`].
//! [`QueryBinding`]s keep entries fresh and de-duplicate concurrent
//! fetches; the [`OptimisticEngine`] applies local mutations before the
//! server confirms them and rolls back to a snapshot on failure. The
//! per-entity hooks in [`hooks`] compose the two against a remote source
//! behind the [`remote`] traits.

pub mod error;
pub mod hooks;
pub mod key;
pub mod mutation;
pub mod query;
pub mod remote;
pub mod store;
pub mod types;

pub use error::{Result, SyncError};
pub use hooks::{
    ActivitiesHook, ClassesHook, GradeOp, GradesHook, InvitationsHook, OrganisationOverviewHook,
};
pub use key::{CacheKey, Segment, iso_date, parse_iso_date};
pub use mutation::{
    CacheItem, EntryOp, ListOp, MutationStatus, NoPatch, NoToggle, OptimisticEngine,
    PlaceholderIds,
};
pub use query::{QueryBinding, QueryState, Staleness};
pub use remote::{
    ActivityApi, ClassApi, GradeApi, InvitationApi, OrganisationApi, RestClient,
};
pub use store::{CacheStore, Subscription};
pub use types::{
    ActivityDto, ActivityOwner, ActivityPatch, ActivityToggle, CitizenDto, ClassDto, GradeDetail,
    GradeDto, InvitationDto, InvitationResponse, ItemId, NewActivity, NewClass, NewOrganisation,
    OrgOverviewDto,
};
