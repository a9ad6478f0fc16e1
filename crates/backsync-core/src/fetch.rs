use async_trait::async_trait;
use tracing::debug;

use crate::error::FetchError;
use crate::request::HttpRequest;

/// The host fetch primitive the replay loop issues requests through.
///
/// Resolve with `Ok` whenever the request produced an HTTP response,
/// whatever the status code; `Err` means the request never reached a server
/// (DNS, connect, TLS, or mid-body transport failure). Replay treats only
/// `Err` as a reason to stop and re-queue.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &HttpRequest) -> Result<(), FetchError>;
}

/// Production fetcher over a shared `reqwest::Client`.
///
/// Per-request fields (method, URL, headers, body) come from the stored
/// request. Client-level policy — redirect handling, TLS, proxies,
/// timeouts — comes from the client handed to [`ReqwestFetcher::new`], so a
/// host that wants a non-default redirect mode honored configures the
/// client accordingly.
#[derive(Clone, Default)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, request: &HttpRequest) -> Result<(), FetchError> {
        let response = self.client.execute(request.to_reqwest()).await?;
        debug!(url = %request.url, status = %response.status(), "request replayed");
        Ok(())
    }
}
