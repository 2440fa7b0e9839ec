//! An organisation's class list.

use std::sync::Arc;

use futures::FutureExt;

use crate::cache_key;
use crate::error::Result;
use crate::key::CacheKey;
use crate::mutation::{ListOp, MutationStatus, OptimisticEngine, PlaceholderIds};
use crate::query::{QueryBinding, QueryState, Staleness};
use crate::remote::ClassApi;
use crate::store::CacheStore;
use crate::types::{ClassDto, ItemId, NewClass};

pub fn class_list_key(org_id: ItemId) -> CacheKey {
    cache_key!["org", org_id, "classes"]
}

pub struct ClassesHook {
    api: Arc<dyn ClassApi>,
    org_id: ItemId,
    key: CacheKey,
    query: QueryBinding<Vec<ClassDto>>,
    create: OptimisticEngine<Vec<ClassDto>>,
    delete: OptimisticEngine<Vec<ClassDto>>,
    placeholders: PlaceholderIds,
}

impl ClassesHook {
    pub fn new(store: Arc<CacheStore>, api: Arc<dyn ClassApi>, org_id: ItemId) -> Self {
        let key = class_list_key(org_id);
        let query = QueryBinding::new(store.clone(), key.clone(), Staleness::AlwaysRefetch, {
            let api = api.clone();
            move || {
                let api = api.clone();
                async move { api.fetch_classes(org_id).await }.boxed()
            }
        });
        ClassesHook {
            create: OptimisticEngine::new(store.clone(), key.clone()),
            delete: OptimisticEngine::new(store, key.clone()),
            placeholders: PlaceholderIds::new(),
            api,
            org_id,
            key,
            query,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn state(&self) -> QueryState<Vec<ClassDto>> {
        self.query.state()
    }

    pub async fn ensure(&self) -> QueryState<Vec<ClassDto>> {
        self.query.ensure().await
    }

    pub async fn refetch(&self) {
        self.query.refetch().await;
    }

    pub async fn create_class(&self, name: impl Into<String>) -> Result<ClassDto> {
        let new = NewClass { name: name.into() };
        let placeholder = ClassDto {
            id: self.placeholders.next(),
            name: new.name.clone(),
        };
        self.create
            .mutate_insert(placeholder, self.api.create_class(self.org_id, new))
            .await
    }

    pub async fn delete_class(&self, class_id: ItemId) -> Result<()> {
        self.delete
            .mutate(
                ListOp::Remove { id: class_id },
                self.api.remove_class(class_id),
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
