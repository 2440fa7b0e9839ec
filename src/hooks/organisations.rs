//! The current user's organisation overview.

use std::sync::Arc;

use futures::FutureExt;

use crate::cache_key;
use crate::error::Result;
use crate::key::CacheKey;
use crate::mutation::{ListOp, MutationStatus, OptimisticEngine, PlaceholderIds};
use crate::query::{QueryBinding, QueryState, Staleness};
use crate::remote::OrganisationApi;
use crate::store::CacheStore;
use crate::types::{ItemId, NewOrganisation, OrgOverviewDto};

pub fn org_overview_key(user_id: &str) -> CacheKey {
    cache_key!["user", user_id, "organisation-overview"]
}

pub struct OrganisationOverviewHook {
    api: Arc<dyn OrganisationApi>,
    key: CacheKey,
    query: QueryBinding<Vec<OrgOverviewDto>>,
    create: OptimisticEngine<Vec<OrgOverviewDto>>,
    delete: OptimisticEngine<Vec<OrgOverviewDto>>,
    placeholders: PlaceholderIds,
}

impl OrganisationOverviewHook {
    pub fn new(
        store: Arc<CacheStore>,
        api: Arc<dyn OrganisationApi>,
        user_id: impl Into<String>,
    ) -> Self {
        let user_id = user_id.into();
        let key = org_overview_key(&user_id);
        let query = QueryBinding::new(store.clone(), key.clone(), Staleness::AlwaysRefetch, {
            let api = api.clone();
            move || {
                let api = api.clone();
                let user_id = user_id.clone();
                async move { api.fetch_overview(&user_id).await }.boxed()
            }
        });
        OrganisationOverviewHook {
            create: OptimisticEngine::new(store.clone(), key.clone()),
            delete: OptimisticEngine::new(store, key.clone()),
            placeholders: PlaceholderIds::new(),
            api,
            key,
            query,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn state(&self) -> QueryState<Vec<OrgOverviewDto>> {
        self.query.state()
    }

    pub async fn ensure(&self) -> QueryState<Vec<OrgOverviewDto>> {
        self.query.ensure().await
    }

    pub async fn refetch(&self) {
        self.query.refetch().await;
    }

    /// The creating user is the first member, so the placeholder starts
    /// with a member count of one.
    pub async fn create_organisation(&self, name: impl Into<String>) -> Result<OrgOverviewDto> {
        let new = NewOrganisation { name: name.into() };
        let placeholder = OrgOverviewDto {
            id: self.placeholders.next(),
            name: new.name.clone(),
            member_count: 1,
        };
        self.create
            .mutate_insert(placeholder, self.api.create_organisation(new))
            .await
    }

    pub async fn delete_organisation(&self, org_id: ItemId) -> Result<()> {
        self.delete
            .mutate(
                ListOp::Remove { id: org_id },
                self.api.remove_organisation(org_id),
            )
            .await
    }

    pub fn create_status(&self) -> MutationStatus {
        self.create.status()
    }

    pub fn delete_status(&self) -> MutationStatus {
        self.delete.status()
    }
}
