//! Initial snapshot fetched before the live subscription starts, so a
//! dashboard opened mid-session is not blank until the next frame.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use regalia_core::TelemetryObject;
use tracing::debug;
use url::Url;

const FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// Derives the relay's `/latest` endpoint from its websocket URL.
pub fn snapshot_url(ws_url: &Url) -> Result<Url> {
    let scheme = match ws_url.scheme() {
        "ws" => "http",
        "wss" => "https",
        other => return Err(anyhow!("unsupported relay scheme: {other}")),
    };
    let mut url = ws_url.clone();
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("cannot rewrite scheme of {ws_url}"))?;
    url.set_path("/latest");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

pub async fn fetch_snapshot(client: &reqwest::Client, url: &Url) -> Result<TelemetryObject> {
    let response = client
        .get(url.clone())
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .with_context(|| format!("failed to request {url}"))?
        .error_for_status()
        .with_context(|| format!("relay rejected {url}"))?;
    let snapshot: TelemetryObject = response
        .json()
        .await
        .context("snapshot body is not a JSON object")?;
    debug!(keys = snapshot.len(), "fetched relay snapshot");
    Ok(snapshot)
}
