//! The current user's pending organisation invitations.

use std::sync::Arc;

use futures::FutureExt;

use crate::cache_key;
use crate::error::Result;
use crate::key::CacheKey;
use crate::mutation::{ListOp, MutationStatus, OptimisticEngine};
use crate::query::{QueryBinding, QueryState, Staleness};
use crate::remote::InvitationApi;
use crate::store::CacheStore;
use crate::types::{InvitationDto, InvitationResponse, ItemId};

pub fn invitation_key(user_id: &str) -> CacheKey {
    cache_key!["user", user_id, "invitations"]
}

pub struct InvitationsHook {
    api: Arc<dyn InvitationApi>,
    key: CacheKey,
    query: QueryBinding<Vec<InvitationDto>>,
    respond: OptimisticEngine<Vec<InvitationDto>>,
}

impl InvitationsHook {
    pub fn new(
        store: Arc<CacheStore>,
        api: Arc<dyn InvitationApi>,
        user_id: impl Into<String>,
    ) -> Self {
        let user_id = user_id.into();
        let key = invitation_key(&user_id);
        let query = QueryBinding::new(store.clone(), key.clone(), Staleness::AlwaysRefetch, {
            let api = api.clone();
            move || {
                let api = api.clone();
                let user_id = user_id.clone();
                async move { api.fetch_invitations(&user_id).await }.boxed()
            }
        });
        InvitationsHook {
            respond: OptimisticEngine::new(store, key.clone()),
            api,
            key,
            query,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn state(&self) -> QueryState<Vec<InvitationDto>> {
        self.query.state()
    }

    pub async fn ensure(&self) -> QueryState<Vec<InvitationDto>> {
        self.query.ensure().await
    }

    pub async fn refetch(&self) {
        self.query.refetch().await;
    }

    /// Answer an invitation. The entry is removed optimistically either
    /// way; accepting settles with a refetch because acceptance changes
    /// what the server reports for this user beyond the removal itself.
    pub async fn respond(
        &self,
        invitation_id: ItemId,
        response: InvitationResponse,
    ) -> Result<()> {
        let out = self
            .respond
            .mutate(
                ListOp::Remove { id: invitation_id },
                self.api.respond(invitation_id, response),
            )
            .await;
        if response == InvitationResponse::Accept {
            self.query.refetch().await;
        }
        out
    }

    pub fn respond_status(&self) -> MutationStatus {
        self.respond.status()
    }
}
