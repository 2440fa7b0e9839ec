//! Day-plan activities for one citizen or grade.

use std::sync::Arc;

use futures::FutureExt;
use jiff::civil::Date;

use crate::cache_key;
use crate::error::Result;
use crate::key::CacheKey;
use crate::mutation::{ListOp, MutationStatus, OptimisticEngine, PlaceholderIds};
use crate::query::{QueryBinding, QueryState, Staleness};
use crate::remote::ActivityApi;
use crate::store::CacheStore;
use crate::types::{ActivityDto, ActivityOwner, ActivityPatch, ActivityToggle, ItemId, NewActivity};

/// Key for one owner's day plan. Dates are canonicalized to `YYYY-MM-DD`,
/// so time-of-day can never split a day across two entries.
pub fn activity_key(owner: ActivityOwner, date: Date) -> CacheKey {
    cache_key!["activity", owner.kind(), owner.id(), date]
}

pub struct ActivitiesHook {
    api: Arc<dyn ActivityApi>,
    owner: ActivityOwner,
    date: Date,
    key: CacheKey,
    query: QueryBinding<Vec<ActivityDto>>,
    create: OptimisticEngine<Vec<ActivityDto>>,
    delete: OptimisticEngine<Vec<ActivityDto>>,
    update: OptimisticEngine<Vec<ActivityDto>>,
    toggle: OptimisticEngine<Vec<ActivityDto>>,
    placeholders: PlaceholderIds,
}

impl ActivitiesHook {
    pub fn new(
        store: Arc<CacheStore>,
        api: Arc<dyn ActivityApi>,
        owner: ActivityOwner,
        date: Date,
    ) -> Self {
        let key = activity_key(owner, date);
        let query = QueryBinding::new(store.clone(), key.clone(), Staleness::AlwaysRefetch, {
            let api = api.clone();
            move || {
                let api = api.clone();
                async move { api.fetch_day(owner, date).await }.boxed()
            }
        });
        ActivitiesHook {
            create: OptimisticEngine::new(store.clone(), key.clone()),
            delete: OptimisticEngine::new(store.clone(), key.clone()),
            update: OptimisticEngine::new(store.clone(), key.clone()),
            toggle: OptimisticEngine::new(store, key.clone()),
            placeholders: PlaceholderIds::new(),
            api,
            owner,
            date,
            key,
            query,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn state(&self) -> QueryState<Vec<ActivityDto>> {
        self.query.state()
    }

    pub async fn ensure(&self) -> QueryState<Vec<ActivityDto>> {
        self.query.ensure().await
    }

    pub async fn refetch(&self) {
        self.query.refetch().await;
    }

    /// Optimistically append the new activity under a placeholder id; the
    /// server-assigned row replaces it once the create resolves.
    pub async fn create_activity(&self, new: NewActivity) -> Result<ActivityDto> {
        let placeholder = ActivityDto {
            id: self.placeholders.next(),
            name: new.name.clone(),
            description: new.description.clone(),
            date: self.date,
            order: new.order,
            is_completed: false,
            pictogram_id: new.pictogram_id,
        };
        self.create
            .mutate_insert(placeholder, self.api.create(self.owner, self.date, new))
            .await
    }

    pub async fn delete_activity(&self, id: ItemId) -> Result<()> {
        self.delete
            .mutate(ListOp::Remove { id }, self.api.remove(id))
            .await
    }

    /// Patch an activity's fields. Settles with a refetch either way: the
    /// server may reorder the day by start time, which the local patch
    /// cannot predict.
    pub async fn update_activity(&self, id: ItemId, patch: ActivityPatch) -> Result<()> {
        let out = self
            .update
            .mutate(
                ListOp::Patch {
                    id,
                    patch: patch.clone(),
                },
                self.api.update(id, patch),
            )
            .await;
        self.query.refetch().await;
        out
    }

    /// Flip completion locally, then tell the server the explicit target
    /// state. Toggling an id absent from the cached day is a no-op locally;
    /// the wire call then sets the activity to completed.
    pub async fn toggle_completion(&self, id: ItemId) -> Result<()> {
        let target = self
            .query
            .state()
            .data
            .and_then(|list| list.iter().find(|a| a.id == id).map(|a| !a.is_completed))
            .unwrap_or(true);
        self.toggle
            .mutate(
                ListOp::Toggle {
                    id,
                    field: ActivityToggle::IsCompleted,
                },
                self.api.set_completed(id, target),
            )
            .await
    }

    pub fn create_status(&self) -> MutationStatus {
        self.create.status()
    }

    pub fn delete_status(&self) -> MutationStatus {
        self.delete.status()
    }

    pub fn update_status(&self) -> MutationStatus {
        self.update.status()
    }

    pub fn toggle_status(&self) -> MutationStatus {
        self.toggle.status()
    }
}
