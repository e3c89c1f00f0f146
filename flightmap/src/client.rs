use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{
    Airport, FlightSummary,
    wire::{
        AirlineEntry, AirlinesResponse, AirportCoords, CrisisRequest, CrisisResponse,
        FlightsResponse, TrajectoryPayload,
    },
};

use crate::{
    config::Config,
    error::LookupError,
    resolver::{AirportLookup, is_well_formed, normalize_code},
};

/// JSON client for the crisis-operations backend.
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    api_root: String,
}

impl BackendClient {
    pub fn new(api_root: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_root: api_root.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, LookupError> {
        Self::new(&config.api_root, config.http_timeout)
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_root, path)
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, LookupError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status));
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| LookupError::Malformed(err.to_string()))
    }

    pub async fn airlines(&self) -> Result<Vec<AirlineEntry>, LookupError> {
        let request = self.http.get(self.url("/bootstrap-style-airlines"));
        Ok(self.fetch_json::<AirlinesResponse>(request).await?.into_vec())
    }

    pub async fn flights(&self, airline: &str) -> Result<Vec<FlightSummary>, LookupError> {
        let request = self.http.get(self.url("/flights")).query(&[("airline", airline)]);
        let flights = self.fetch_json::<FlightsResponse>(request).await?.into_vec();
        tracing::debug!("backend returned {} flights for {airline}", flights.len());
        Ok(flights)
    }

    /// The decoded payload, unvalidated. The view hands it to
    /// [`TrajectorySampler::accept_backend`](crate::trajectory::TrajectorySampler::accept_backend).
    pub async fn trajectory(&self, flight_number: &str) -> Result<TrajectoryPayload, LookupError> {
        let request = self.http.get(self.url(&format!("/flight-trajectory/{flight_number}")));
        let mut payload: TrajectoryPayload = self.fetch_json(request).await?;
        payload
            .flight_number
            .get_or_insert_with(|| flight_number.to_string());
        Ok(payload)
    }

    /// Codes that are not three letters are refused without a request.
    pub async fn airport(&self, code: &str) -> Result<Airport, LookupError> {
        let code = normalize_code(code);
        if !is_well_formed(&code) {
            return Err(LookupError::InvalidCode(code));
        }
        let request = self.http.get(self.url(&format!("/airport/{code}")));
        let coords: AirportCoords = self.fetch_json(request).await?;
        let location = coords.location().ok_or_else(|| {
            LookupError::Malformed(format!("airport {code} has no usable lat/lon"))
        })?;
        let display_name = coords.name.unwrap_or_else(|| code.clone());
        Ok(Airport::new(code, display_name, location))
    }

    /// Returns the post-crisis flight list when the backend includes one.
    pub async fn activate_crisis(
        &self,
        request: &CrisisRequest,
    ) -> Result<Option<Vec<FlightSummary>>, LookupError> {
        let request = self.http.post(self.url("/activate-crisis")).json(request);
        let response: CrisisResponse = self.fetch_json(request).await?;
        Ok(response.flights)
    }
}

impl AirportLookup for BackendClient {
    async fn lookup(&self, code: &str) -> Result<Airport, LookupError> {
        self.airport(code).await
    }
}
