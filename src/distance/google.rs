use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::distance::{DistanceCalculator, DistanceError};
use crate::models::order::GeoPoint;

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/distancematrix/json";

pub struct GoogleDistanceMatrix {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    #[serde(default)]
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    #[serde(default)]
    distance: Option<MatrixValue>,
}

#[derive(Debug, Deserialize)]
struct MatrixValue {
    value: u32,
}

impl GoogleDistanceMatrix {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, DistanceError> {
        Self::with_base_url(api_key, timeout, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        timeout: Duration,
        base_url: impl Into<String>,
    ) -> Result<Self, DistanceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| DistanceError::Transport(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl DistanceCalculator for GoogleDistanceMatrix {
    async fn distance(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
    ) -> Result<u32, DistanceError> {
        let origins = origin.to_query();
        let destinations = destination.to_query();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("origins", origins.as_str()),
                ("destinations", destinations.as_str()),
                ("mode", "driving"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| {
                // the request url carries the api key
                let err = err.without_url();
                error!(error = %err, %origins, %destinations, "distance matrix request failed");
                DistanceError::Transport(err.to_string())
            })?;

        let body: MatrixResponse = response.json().await.map_err(|err| {
            let err = err.without_url();
            error!(error = %err, "distance matrix response is not valid json");
            DistanceError::Transport(err.to_string())
        })?;

        let result = interpret(body);
        match &result {
            Ok(meters) => debug!(%origins, %destinations, meters, "distance resolved"),
            Err(DistanceError::Unresolvable) => {
                warn!(%origins, %destinations, "no route between locations")
            }
            Err(err) => error!(error = %err, "distance matrix rejected request"),
        }
        result
    }

    fn name(&self) -> &'static str {
        "google"
    }
}

fn interpret(body: MatrixResponse) -> Result<u32, DistanceError> {
    if body.status != "OK" {
        let detail = body.error_message.unwrap_or_default();
        return Err(DistanceError::Transport(format!(
            "distance matrix status {}: {detail}",
            body.status
        )));
    }

    match body.rows.as_slice() {
        [row] => match row.elements.as_slice() {
            [element] if element.status == "OK" => element
                .distance
                .as_ref()
                .map(|distance| distance.value)
                .ok_or(DistanceError::Unresolvable),
            _ => Err(DistanceError::Unresolvable),
        },
        _ => Err(DistanceError::Unresolvable),
    }
}
