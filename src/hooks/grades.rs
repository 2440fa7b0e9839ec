//! One grade with its member citizens (aggregate entry).

use std::sync::Arc;

use futures::FutureExt;

use crate::cache_key;
use crate::error::Result;
use crate::key::CacheKey;
use crate::mutation::{EntryOp, MutationStatus, OptimisticEngine};
use crate::query::{QueryBinding, QueryState, Staleness};
use crate::remote::GradeApi;
use crate::store::CacheStore;
use crate::types::{CitizenDto, GradeDetail, ItemId};

pub fn grade_key(grade_id: ItemId) -> CacheKey {
    cache_key!["grade", grade_id]
}

/// Local transforms over the grade aggregate.
pub enum GradeOp {
    AddCitizens(Vec<CitizenDto>),
    RemoveCitizens(Vec<ItemId>),
}

impl EntryOp<GradeDetail> for GradeOp {
    fn apply(&self, prev: Option<&GradeDetail>) -> GradeDetail {
        let mut next = prev.cloned().unwrap_or_default();
        match self {
            GradeOp::AddCitizens(citizens) => {
                for citizen in citizens {
                    if !next.citizens.iter().any(|c| c.id == citizen.id) {
                        next.citizens.push(citizen.clone());
                    }
                }
            }
            GradeOp::RemoveCitizens(ids) => {
                next.citizens.retain(|c| !ids.contains(&c.id));
            }
        }
        next
    }
}

pub struct GradesHook {
    api: Arc<dyn GradeApi>,
    grade_id: ItemId,
    key: CacheKey,
    query: QueryBinding<GradeDetail>,
    add: OptimisticEngine<GradeDetail>,
    remove: OptimisticEngine<GradeDetail>,
}

impl GradesHook {
    pub fn new(store: Arc<CacheStore>, api: Arc<dyn GradeApi>, grade_id: ItemId) -> Self {
        let key = grade_key(grade_id);
        let query = QueryBinding::new(store.clone(), key.clone(), Staleness::AlwaysRefetch, {
            let api = api.clone();
            move || {
                let api = api.clone();
                async move { api.fetch_grade(grade_id).await }.boxed()
            }
        });
        GradesHook {
            add: OptimisticEngine::new(store.clone(), key.clone()),
            remove: OptimisticEngine::new(store, key.clone()),
            api,
            grade_id,
            key,
            query,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn state(&self) -> QueryState<GradeDetail> {
        self.query.state()
    }

    pub async fn ensure(&self) -> QueryState<GradeDetail> {
        self.query.ensure().await
    }

    pub async fn refetch(&self) {
        self.query.refetch().await;
    }

    pub async fn add_citizens(&self, citizens: Vec<CitizenDto>) -> Result<()> {
        let ids: Vec<ItemId> = citizens.iter().map(|c| c.id).collect();
        self.add
            .mutate(
                GradeOp::AddCitizens(citizens),
                self.api.add_citizens(self.grade_id, ids),
            )
            .await
    }

    pub async fn remove_citizens(&self, citizen_ids: Vec<ItemId>) -> Result<()> {
        self.remove
            .mutate(
                GradeOp::RemoveCitizens(citizen_ids.clone()),
                self.api.remove_citizens(self.grade_id, citizen_ids),
            )
            .await
    }

    pub fn add_status(&self) -> MutationStatus {
        self.add.status()
    }

    pub fn remove_status(&self) -> MutationStatus {
        self.remove.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citizen(id: ItemId, name: &str) -> CitizenDto {
        CitizenDto {
            id,
            first_name: name.to_string(),
            last_name: "Tester".to_string(),
        }
    }

    #[test]
    fn test_add_citizens_dedupes_by_id() {
        let detail = GradeOp::AddCitizens(vec![citizen(1, "Anna")]).apply(None);
        let again = GradeOp::AddCitizens(vec![citizen(1, "Anna"), citizen(2, "Bo")])
            .apply(Some(&detail));
        assert_eq!(again.citizens.len(), 2);
    }

    #[test]
    fn test_remove_citizens_missing_id_is_noop() {
        let detail = GradeOp::AddCitizens(vec![citizen(1, "Anna")]).apply(None);
        let out = GradeOp::RemoveCitizens(vec![99]).apply(Some(&detail));
        assert_eq!(out.citizens, detail.citizens);
    }
}
