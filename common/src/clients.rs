//! A module containing utility functions to handle HTTP responses from `reqwest`

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::Error;

/// Builds the `reqwest` client used to talk to management APIs.
///
/// Lab vCenter appliances are commonly deployed with self-signed certificates, so certificate
/// verification can be switched off with `accept_invalid_certs`.
pub fn new_reqwest_client(accept_invalid_certs: bool) -> reqwest::Result<Client> {
    // We set the max number of allowed idle connections to 0 to avoid
    // a race condition where a connection is selected from the pool and
    // written to at the same time the server is closing it.
    // More details here:
    // https://github.com/hyperium/hyper/issues/2136#issuecomment-589345238
    Client::builder()
        .pool_max_idle_per_host(0)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
}

async fn handle_error<T>(resp: Response) -> anyhow::Result<T> {
    let status = resp.status();
    let error_text = resp.text().await?;
    tracing::error!("Error {}: {}", status, error_text);
    Err(Error::Api(status, error_text))?
}

/// Use this when you don't need to do anything with the response from the server (e.g. you don't need
/// to turn it to text or json) but just want to capture errors
pub async fn handle_response(resp: Response) -> anyhow::Result<()> {
    if resp.status().is_success() {
        Ok(())
    } else {
        handle_error(resp).await
    }
}

/// Turns the response to Json and captures errors
pub async fn handle_response_json<T>(resp: Response) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    if resp.status().is_success() {
        let text = resp.text().await?;
        let json = serde_json::from_str(&text).map_err(Error::from)?;
        Ok(json)
    } else {
        handle_error(resp).await
    }
}

/// Like [`handle_response_json`] but maps a `404 Not Found` to `None`.
///
/// Many management APIs answer lookups of objects which do not exist yet with a 404, which is an
/// expected outcome when checking whether something needs creating.
pub async fn handle_optional_response_json<T>(resp: Response) -> anyhow::Result<Option<T>>
where
    T: DeserializeOwned,
{
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }

    handle_response_json(resp).await.map(Some)
}
