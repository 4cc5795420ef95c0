use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::LimsCredentials;
use crate::domain::RunInfoEntry;
use crate::error::DeliveryError;

/// Source of sequencing run details, keyed by run (flowcell) id.
pub trait LimsClient {
    fn run_details(&self, run_id: &str) -> Result<Vec<RunInfoEntry>, DeliveryError>;
}

/// Galaxy nglims API client. The session cookie obtained at login lives in
/// this client's cookie store and is reused by every later request.
pub struct LimsHttpClient {
    client: Client,
    base_url: String,
}

impl LimsHttpClient {
    pub fn authenticate(credentials: &LimsCredentials) -> Result<Self, DeliveryError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("fc-deliver/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DeliveryError::LimsHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .timeout(None::<Duration>)
            .build()
            .map_err(|err| DeliveryError::LimsHttp(err.to_string()))?;

        let lims = Self {
            client,
            base_url: credentials.base_url.clone(),
        };
        lims.login(&credentials.user, &credentials.password)?;
        Ok(lims)
    }

    fn login(&self, user: &str, password: &str) -> Result<(), DeliveryError> {
        let url = format!("{}/user/login", self.base_url);
        debug!("logging in to {url} as {user}");
        let response = self
            .client
            .post(&url)
            .form(&[
                ("email", user),
                ("password", password),
                ("login_button", "Login"),
            ])
            .send()
            .map_err(|err| DeliveryError::LimsHttp(err.to_string()))?;
        handle_status(response)?;
        info!("authenticated with LIMS at {}", self.base_url);
        Ok(())
    }
}

impl LimsClient for LimsHttpClient {
    fn run_details(&self, run_id: &str) -> Result<Vec<RunInfoEntry>, DeliveryError> {
        let url = format!("{}/nglims/api_run_details", self.base_url);
        let response = self
            .client
            .post(&url)
            .form(&[("run", run_id)])
            .send()
            .map_err(|err| DeliveryError::LimsHttp(err.to_string()))?;
        let body: Value = handle_status(response)?
            .json()
            .map_err(|err| DeliveryError::LimsHttp(err.to_string()))?;
        parse_run_details(body)
    }
}

fn handle_status(response: Response) -> Result<Response, DeliveryError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .unwrap_or_else(|_| "LIMS request failed".to_string());
    Err(DeliveryError::LimsStatus { status, message })
}

pub fn parse_run_details(mut body: Value) -> Result<Vec<RunInfoEntry>, DeliveryError> {
    if let Some(error) = body.get("error") {
        let message = match error {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        return Err(DeliveryError::Remote(message));
    }
    let details = body
        .get_mut("details")
        .map(Value::take)
        .ok_or_else(|| DeliveryError::Remote("response carries no run details".to_string()))?;
    serde_json::from_value(details).map_err(|err| DeliveryError::RunInfoParse(err.to_string()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn details_are_returned() {
        let body = json!({
            "details": [
                {"lane": "1", "description": "P1_Lab", "genome_build": "hg19"},
                {"lane": 2, "description": "P2_Lab", "multiplex": [
                    {"barcode_id": 3, "name": "s3", "sequence": "ACGT"}
                ]}
            ],
            "run_id": "AB0023XX"
        });
        let details = parse_run_details(body).unwrap();
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].genome_build.as_deref(), Some("hg19"));
        assert!(details[1].is_multiplexed());
    }

    #[test]
    fn error_key_fails() {
        let body = json!({"error": "run not found"});
        assert_matches!(
            parse_run_details(body),
            Err(DeliveryError::Remote(message)) if message == "run not found"
        );
    }

    #[test]
    fn missing_details_fails() {
        assert_matches!(
            parse_run_details(json!({})),
            Err(DeliveryError::Remote(_))
        );
    }
}
