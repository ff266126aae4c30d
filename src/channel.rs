//! Creating a fresh relay channel.

use reqwest::header::LOCATION;

use crate::Error;

/// Endpoint that answers with a redirect to a newly created channel.
pub const DEFAULT_CHANNEL_ENDPOINT: &str = "https://smee.io/new";

/// Sends `HEAD endpoint` and returns the `Location` it redirects to.
///
/// `http` must not follow redirects, otherwise the location is lost.
pub(crate) async fn create(http: &reqwest::Client, endpoint: &str) -> Result<String, Error> {
    let response = http.head(endpoint).send().await.map_err(Error::transport)?;
    let status = response.status().as_u16();

    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::missing_location(status))?;

    tracing::info!(%location, "created channel");
    Ok(location.to_owned())
}
