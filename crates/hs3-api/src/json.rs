// JSON API HTTP client
//
// Wraps `reqwest::Client` with HS3-specific URL construction, basic auth,
// and payload unwrapping. Every public call degrades to `None` on failure
// after logging the error category; callers treat absence as "the call did
// not complete" rather than branching on error types.

use std::time::Duration;

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, error, warn};
use url::Url;

use crate::error::Error;
use crate::models::{ControlRecord, DeviceRecord, DeviceRef, DeviceValue, EventRecord};
use crate::transport::{DEFAULT_HTTP_TIMEOUT, TransportConfig};

/// Default HTTP port of the controller's web server.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Authenticated client for the controller's `/JSON` endpoint.
///
/// Cheap to clone: the inner `reqwest::Client` is reference counted, so
/// device handles each carry their own copy.
#[derive(Clone)]
pub struct JsonClient {
    http: reqwest::Client,
    url: Url,
    username: String,
    password: SecretString,
    timeout: Duration,
}

impl JsonClient {
    /// Create a client for `http://{host}:{http_port}/JSON`.
    pub fn new(
        host: &str,
        http_port: u16,
        username: impl Into<String>,
        password: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let url = Url::parse(&format!("http://{host}:{http_port}/JSON"))?;
        let http = transport.build_client()?;
        Ok(Self {
            http,
            url,
            username: username.into(),
            password,
            timeout: transport.timeout,
        })
    }

    /// Create a client with a pre-built `reqwest::Client` and base URL.
    ///
    /// `base_url` is the server root; `/JSON` is appended.
    pub fn with_client(
        http: reqwest::Client,
        base_url: &Url,
        username: impl Into<String>,
        password: SecretString,
    ) -> Result<Self, Error> {
        let url = base_url.join("/JSON")?;
        Ok(Self {
            http,
            url,
            username: username.into(),
            password,
            timeout: DEFAULT_HTTP_TIMEOUT,
        })
    }

    /// The full `/JSON` endpoint URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Perform one authenticated call and decode the JSON response.
    ///
    /// Returns `None` on any failure (transport, timeout, non-2xx status,
    /// non-JSON body); the failure is logged with its category.
    pub async fn request(
        &self,
        method: Method,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Option<Value> {
        match self.try_request(method.clone(), query, body).await {
            Ok(value) => Some(value),
            Err(e) => {
                let category = e.category();
                match &e {
                    Error::Deserialization { body, .. } => {
                        debug!(%method, category, body = %body, "HS3 returned non-JSON response");
                    }
                    Error::Timeout { .. } => {
                        error!(%method, url = %self.url, category, "timeout while requesting HS3 data");
                    }
                    _ => warn!(%method, category, error = %e, "HS3 HTTP request error"),
                }
                None
            }
        }
    }

    async fn try_request(
        &self,
        method: Method,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, Error> {
        debug!(%method, url = %self.url, ?query, "HS3 request");

        let mut req = self
            .http
            .request(method, self.url.clone())
            .basic_auth(&self.username, Some(self.password.expose_secret()));
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(|e| self.map_transport(e))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.map_transport(e))?;

        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        debug!(body = %text, "HS3 response");
        serde_json::from_str(&text).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: text,
        })
    }

    fn map_transport(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            Error::Transport(err)
        }
    }

    async fn get_request(&self, request: &str, extra: &[(&str, String)]) -> Option<Value> {
        let mut query = vec![("request", request.to_owned())];
        query.extend(extra.iter().cloned());
        self.request(Method::GET, &query, None).await
    }

    // ── Snapshots ────────────────────────────────────────────────────

    /// Full device status list (`request=getstatus`).
    pub async fn get_status(&self) -> Option<Vec<DeviceRecord>> {
        let payload = self.get_request("getstatus", &[]).await?;
        log_decode("getstatus", decode_records(payload, "Devices"))
    }

    /// Control-pair metadata for every device (`request=getcontrol`).
    pub async fn get_control(&self) -> Option<Vec<ControlRecord>> {
        let payload = self.get_request("getcontrol", &[]).await?;
        log_decode("getcontrol", decode_records(payload, "Devices"))
    }

    /// All event definitions (`request=getevents`).
    pub async fn get_events(&self) -> Option<Vec<EventRecord>> {
        let payload = self.get_request("getevents", &[]).await?;
        log_decode("getevents", decode_records(payload, "Events"))
    }

    // ── Actions ──────────────────────────────────────────────────────

    /// Set a device to a raw control value.
    ///
    /// `GET /JSON?request=controldevicebyvalue&ref={ref}&value={value}`
    pub async fn control_device_by_value(
        &self,
        reference: DeviceRef,
        value: DeviceValue,
    ) -> Option<Value> {
        debug!(reference, %value, "controlling device by value");
        self.get_request(
            "controldevicebyvalue",
            &[("ref", reference.to_string()), ("value", value.to_string())],
        )
        .await
    }

    /// POST form of a value control.
    ///
    /// `POST /JSON` with `{"action":"controlbyvalue","deviceref":..,"value":..}`
    pub async fn control_by_value(&self, reference: DeviceRef, value: DeviceValue) -> Option<Value> {
        let body = json!({
            "action": "controlbyvalue",
            "deviceref": reference,
            "value": value,
        });
        self.request(Method::POST, &[], Some(&body)).await
    }

    /// Trigger an event by its `(group, name)` identity.
    ///
    /// `POST /JSON` with `{"action":"runevent","group":..,"name":..}`
    pub async fn run_event(&self, group: &str, name: &str) -> Option<Value> {
        debug!(group, name, "running event");
        let body = json!({
            "action": "runevent",
            "group": group,
            "name": name,
        });
        self.request(Method::POST, &[], Some(&body)).await
    }
}

impl std::fmt::Debug for JsonClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonClient")
            .field("url", &self.url.as_str())
            .field("username", &self.username)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

// ── Payload decoding ─────────────────────────────────────────────────

/// Pull the array under `key` out of a response and decode each element.
///
/// A record that fails to decode is skipped and logged; only a missing or
/// non-array payload fails the whole batch.
fn decode_records<T: DeserializeOwned>(payload: Value, key: &'static str) -> Result<Vec<T>, Error> {
    let Value::Object(mut object) = payload else {
        return Err(Error::MissingKey { key });
    };
    let Some(Value::Array(items)) = object.remove(key) else {
        return Err(Error::MissingKey { key });
    };

    let mut records = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<T>(item) {
            Ok(record) => records.push(record),
            Err(e) => debug!(key, error = %e, "skipping undecodable record"),
        }
    }
    Ok(records)
}

fn log_decode<T>(request: &str, result: Result<Vec<T>, Error>) -> Option<Vec<T>> {
    match result {
        Ok(records) => Some(records),
        Err(e) => {
            error!(request, category = e.category(), error = %e, "error retrieving HS3 data");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn builds_json_endpoint_url() {
        let client = JsonClient::new(
            "192.168.1.20",
            8080,
            "admin",
            SecretString::from("secret".to_string()),
            &TransportConfig::default(),
        )
        .unwrap();
        assert_eq!(client.url().as_str(), "http://192.168.1.20:8080/JSON");
    }

    #[test]
    fn debug_output_hides_password() {
        let client = JsonClient::new(
            "hs3.local",
            DEFAULT_HTTP_PORT,
            "admin",
            SecretString::from("hunter2".to_string()),
            &TransportConfig::default(),
        )
        .unwrap();
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("hs3.local"));
    }

    #[test]
    fn decode_skips_bad_records() {
        let payload = serde_json::json!({
            "Devices": [
                { "ref": 1, "device_type_string": "Z-Wave Switch", "value": 0 },
                { "name": "no ref or value" },
                { "ref": 2, "device_type_string": "Z-Wave Battery", "value": 100 }
            ]
        });

        let records: Vec<DeviceRecord> = decode_records(payload, "Devices").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].reference, 2);
    }

    #[test]
    fn decode_requires_payload_key() {
        let payload = serde_json::json!({ "Response": "Error" });
        let result: Result<Vec<EventRecord>, Error> = decode_records(payload, "Events");
        assert!(matches!(result, Err(Error::MissingKey { key: "Events" })));

        let result: Result<Vec<EventRecord>, Error> =
            decode_records(serde_json::json!([1, 2, 3]), "Events");
        assert!(matches!(result, Err(Error::MissingKey { .. })));
    }
}
