// reqwest-backed production transport.
//
// Each operation POSTs its request as JSON to `<base>/<operation>` and
// deserializes the typed response. A fixed per-call timeout applies to
// every operation; non-success HTTP status surfaces as an error with
// the response body attached.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use cuesync_common::protocol::{
    AckResponse, DeleteLinesRequest, GetOriginalSubtitleResponse, GetSubtitleRequest,
    GetSubtitleResponse, GetUpdatesRequest, GetUpdatesResponse, InsertLineRequest, JoinRequest,
    JoinResponse, LeaveRequest, SendMessageRequest, StartRequest, StartResponse,
    UpdateLineRequest,
};

use super::{normalize_base_url, SyncTransport};

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpTransport {
    base_url: Url,
    client: Client,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn post<Req, Resp>(&self, operation: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self
            .base_url
            .join(operation)
            .map_err(|error| anyhow!("invalid operation path `{operation}`: {error}"))?;

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .with_context(|| format!("{operation} request failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("{operation} returned {status}: {body}"));
        }

        response
            .json::<Resp>()
            .await
            .with_context(|| format!("failed to decode {operation} response"))
    }

    async fn post_ack<Req>(&self, operation: &str, request: &Req) -> Result<bool>
    where
        Req: Serialize + Sync,
    {
        let ack: AckResponse = self.post(operation, request).await?;
        Ok(ack.ok)
    }
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn start(&self, request: &StartRequest) -> Result<StartResponse> {
        self.post("start", request).await
    }

    async fn join(&self, request: &JoinRequest) -> Result<JoinResponse> {
        self.post("join", request).await
    }

    async fn leave(&self, request: &LeaveRequest) -> Result<()> {
        let _: serde_json::Value = self.post("leave", request).await?;
        Ok(())
    }

    async fn get_subtitle(&self, request: &GetSubtitleRequest) -> Result<GetSubtitleResponse> {
        self.post("get_subtitle", request).await
    }

    async fn get_original_subtitle(
        &self,
        request: &GetSubtitleRequest,
    ) -> Result<GetOriginalSubtitleResponse> {
        self.post("get_original_subtitle", request).await
    }

    async fn get_updates(&self, request: &GetUpdatesRequest) -> Result<GetUpdatesResponse> {
        self.post("get_updates", request).await
    }

    async fn send_message(&self, request: &SendMessageRequest) -> Result<bool> {
        self.post_ack("send_message", request).await
    }

    async fn update_line(&self, request: &UpdateLineRequest) -> Result<bool> {
        self.post_ack("update_line", request).await
    }

    async fn insert_line(&self, request: &InsertLineRequest) -> Result<bool> {
        self.post_ack("insert_line", request).await
    }

    async fn delete_lines(&self, request: &DeleteLinesRequest) -> Result<bool> {
        self.post_ack("delete_lines", request).await
    }
}
