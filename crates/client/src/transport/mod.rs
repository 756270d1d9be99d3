// Transport seam for the cuesync session protocol.
//
// `SyncTransport` abstracts the network layer for testability: the
// session client speaks typed requests/responses, production code uses
// the reqwest-backed `HttpTransport`, and tests substitute a scripted
// mock. The transport owns connection timeout policy; the session
// client never retries a plain push/pull on its own.

pub mod http;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use url::Url;

use cuesync_common::protocol::{
    DeleteLinesRequest, GetOriginalSubtitleResponse, GetSubtitleRequest, GetSubtitleResponse,
    GetUpdatesRequest, GetUpdatesResponse, InsertLineRequest, JoinRequest, JoinResponse,
    LeaveRequest, SendMessageRequest, StartRequest, StartResponse, UpdateLineRequest,
};

pub use http::HttpTransport;

/// One method per remote operation of the session protocol.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn start(&self, request: &StartRequest) -> Result<StartResponse>;

    async fn join(&self, request: &JoinRequest) -> Result<JoinResponse>;

    /// The response message is ignored by every caller.
    async fn leave(&self, request: &LeaveRequest) -> Result<()>;

    async fn get_subtitle(&self, request: &GetSubtitleRequest) -> Result<GetSubtitleResponse>;

    async fn get_original_subtitle(
        &self,
        request: &GetSubtitleRequest,
    ) -> Result<GetOriginalSubtitleResponse>;

    async fn get_updates(&self, request: &GetUpdatesRequest) -> Result<GetUpdatesResponse>;

    async fn send_message(&self, request: &SendMessageRequest) -> Result<bool>;

    async fn update_line(&self, request: &UpdateLineRequest) -> Result<bool>;

    async fn insert_line(&self, request: &InsertLineRequest) -> Result<bool>;

    async fn delete_lines(&self, request: &DeleteLinesRequest) -> Result<bool>;
}

/// Parse and normalize a service base address: http(s) only, and the
/// path always ends with a slash so operation names join cleanly.
pub fn normalize_base_url(value: &str) -> Result<Url> {
    let mut parsed =
        Url::parse(value).map_err(|error| anyhow!("invalid service url `{value}`: {error}"))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(anyhow!("service url must use http or https, got `{other}`")),
    }
    if !parsed.path().ends_with('/') {
        let path = format!("{}/", parsed.path());
        parsed.set_path(&path);
    }
    Ok(parsed)
}
