//! reqwest-backed client for the backing REST API.
//!
//! All five entity-family contracts are implemented against one base URL.
//! Transport failures and non-success statuses are both normalized into a
//! single error carrying a human-readable message; callers never see raw
//! status codes.

use async_trait::async_trait;
use jiff::civil::Date;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use url::Url;

use crate::error::{Result, SyncError};
use crate::key::iso_date;
use crate::remote::{ActivityApi, ClassApi, GradeApi, InvitationApi, OrganisationApi};
use crate::types::{
    ActivityDto, ActivityOwner, ActivityPatch, ClassDto, GradeDetail, InvitationDto,
    InvitationResponse, ItemId, NewActivity, NewClass, NewOrganisation, OrgOverviewDto,
};

pub struct RestClient {
    http: Client,
    base: Url,
    token: Option<String>,
}

impl RestClient {
    pub fn new(base: Url) -> Self {
        RestClient {
            http: Client::new(),
            base,
            token: None,
        }
    }

    /// Attach a bearer token for authenticated endpoints.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.base.join(path)?;
        let mut builder = self.http.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        expect_success(response).await
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        builder: RequestBuilder,
        body: &B,
    ) -> Result<Response> {
        let response = builder.json(body).send().await?;
        expect_success(response).await
    }
}

/// Translate a non-success response into `SyncError::Api` with the most
/// readable message available: the server's JSON `message` field if present,
/// otherwise the status line.
async fn expect_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = extract_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });
    Err(SyncError::Api(format!("{} ({})", detail, status.as_u16())))
}

fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("message")?.as_str().map(str::to_string)
}

#[async_trait]
impl ActivityApi for RestClient {
    async fn fetch_day(&self, owner: ActivityOwner, date: Date) -> Result<Vec<ActivityDto>> {
        let path = format!(
            "weekplan/{}/{}/day/{}",
            owner.kind(),
            owner.id(),
            iso_date(date)
        );
        let response = self.send(self.request(Method::GET, &path)?).await?;
        Ok(response.json().await?)
    }

    async fn create(
        &self,
        owner: ActivityOwner,
        date: Date,
        new: NewActivity,
    ) -> Result<ActivityDto> {
        let path = format!(
            "weekplan/{}/{}/day/{}",
            owner.kind(),
            owner.id(),
            iso_date(date)
        );
        let response = self
            .send_json(self.request(Method::POST, &path)?, &new)
            .await?;
        Ok(response.json().await?)
    }

    async fn update(&self, id: ItemId, patch: ActivityPatch) -> Result<()> {
        let path = format!("activity/{}", id);
        self.send_json(self.request(Method::PATCH, &path)?, &patch)
            .await?;
        Ok(())
    }

    async fn remove(&self, id: ItemId) -> Result<()> {
        let path = format!("activity/{}", id);
        self.send(self.request(Method::DELETE, &path)?).await?;
        Ok(())
    }

    async fn set_completed(&self, id: ItemId, is_completed: bool) -> Result<()> {
        let path = format!("activity/{}/completed", id);
        self.send_json(
            self.request(Method::PUT, &path)?,
            &serde_json::json!({ "isCompleted": is_completed }),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl GradeApi for RestClient {
    async fn fetch_grade(&self, grade_id: ItemId) -> Result<GradeDetail> {
        let path = format!("grade/{}", grade_id);
        let response = self.send(self.request(Method::GET, &path)?).await?;
        Ok(response.json().await?)
    }

    async fn add_citizens(&self, grade_id: ItemId, citizen_ids: Vec<ItemId>) -> Result<()> {
        let path = format!("grade/{}/citizens", grade_id);
        self.send_json(self.request(Method::POST, &path)?, &citizen_ids)
            .await?;
        Ok(())
    }

    async fn remove_citizens(&self, grade_id: ItemId, citizen_ids: Vec<ItemId>) -> Result<()> {
        let path = format!("grade/{}/citizens", grade_id);
        self.send_json(self.request(Method::DELETE, &path)?, &citizen_ids)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ClassApi for RestClient {
    async fn fetch_classes(&self, org_id: ItemId) -> Result<Vec<ClassDto>> {
        let path = format!("organisation/{}/classes", org_id);
        let response = self.send(self.request(Method::GET, &path)?).await?;
        Ok(response.json().await?)
    }

    async fn create_class(&self, org_id: ItemId, new: NewClass) -> Result<ClassDto> {
        let path = format!("organisation/{}/classes", org_id);
        let response = self
            .send_json(self.request(Method::POST, &path)?, &new)
            .await?;
        Ok(response.json().await?)
    }

    async fn remove_class(&self, class_id: ItemId) -> Result<()> {
        let path = format!("class/{}", class_id);
        self.send(self.request(Method::DELETE, &path)?).await?;
        Ok(())
    }
}

#[async_trait]
impl OrganisationApi for RestClient {
    async fn fetch_overview(&self, user_id: &str) -> Result<Vec<OrgOverviewDto>> {
        let path = format!("user/{}/organisations", user_id);
        let response = self.send(self.request(Method::GET, &path)?).await?;
        Ok(response.json().await?)
    }

    async fn create_organisation(&self, new: NewOrganisation) -> Result<OrgOverviewDto> {
        let response = self
            .send_json(self.request(Method::POST, "organisation")?, &new)
            .await?;
        Ok(response.json().await?)
    }

    async fn remove_organisation(&self, org_id: ItemId) -> Result<()> {
        let path = format!("organisation/{}", org_id);
        self.send(self.request(Method::DELETE, &path)?).await?;
        Ok(())
    }
}

#[async_trait]
impl InvitationApi for RestClient {
    async fn fetch_invitations(&self, user_id: &str) -> Result<Vec<InvitationDto>> {
        let path = format!("user/{}/invitations", user_id);
        let response = self.send(self.request(Method::GET, &path)?).await?;
        Ok(response.json().await?)
    }

    async fn respond(&self, invitation_id: ItemId, response: InvitationResponse) -> Result<()> {
        let path = format!("invitation/{}/respond", invitation_id);
        self.send_json(
            self.request(Method::PUT, &path)?,
            &serde_json::json!({ "response": response }),
        )
        .await?;
        Ok(())
    }
}
