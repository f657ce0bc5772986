//! Alarm device adapter (reqwest).
//!
//! Every operation is a plain `GET` against the device base URL:
//! `/arm`, `/disarm`, `/status` and `/change_pin?pin=...`.

use std::time::Duration;

use async_trait::async_trait;

use hab_core::{
    device::{DevicePort, DeviceStatus},
    errors::Error,
    Result,
};

const TARGET: &str = "device";

#[derive(Clone, Debug)]
pub struct DeviceClient {
    base: String,
    http: reqwest::Client,
}

impl DeviceClient {
    pub fn new(base: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("device http client: {e}")))?;
        Ok(Self::with_client(base, http))
    }

    pub fn with_client(base: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn map_err(e: reqwest::Error) -> Error {
        Error::Transport(format!("device request failed: {e}"))
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let resp = self
            .http
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(Self::map_err)?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(path, %status, "device rejected command");
            return Err(Error::Rejected {
                target: TARGET,
                status: status.to_string(),
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl DevicePort for DeviceClient {
    async fn arm(&self) -> Result<()> {
        self.get("/arm", &[]).await?;
        Ok(())
    }

    async fn disarm(&self) -> Result<()> {
        self.get("/disarm", &[]).await?;
        Ok(())
    }

    async fn status(&self) -> Result<DeviceStatus> {
        let body = self
            .get("/status", &[])
            .await?
            .bytes()
            .await
            .map_err(Self::map_err)?;
        Ok(DeviceStatus::parse(&body))
    }

    async fn change_pin(&self, pin: &str) -> Result<()> {
        self.get("/change_pin", &[("pin", pin)]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Query, State},
        http::{StatusCode, Uri},
        response::IntoResponse,
        routing::get,
        Router,
    };
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Seen {
        paths: Arc<Mutex<Vec<String>>>,
        pins: Arc<Mutex<Vec<String>>>,
    }

    /// Spin up a fake device on an ephemeral port; `reply` decides every response.
    async fn fake_device(
        reply: fn(&str) -> (StatusCode, &'static str),
    ) -> (DeviceClient, Seen) {
        let seen = Seen::default();

        async fn any_path(
            State((seen, reply)): State<(Seen, fn(&str) -> (StatusCode, &'static str))>,
            uri: Uri,
            Query(q): Query<HashMap<String, String>>,
        ) -> impl IntoResponse {
            seen.paths.lock().unwrap().push(uri.path().to_string());
            if let Some(pin) = q.get("pin") {
                seen.pins.lock().unwrap().push(pin.clone());
            }
            reply(uri.path())
        }

        let app = Router::new()
            .route("/*path", get(any_path))
            .with_state((seen.clone(), reply));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let client = DeviceClient::new(format!("http://{addr}/"), Duration::from_secs(5)).unwrap();
        (client, seen)
    }

    #[tokio::test]
    async fn arm_and_disarm_ok() {
        let (client, seen) = fake_device(|_| (StatusCode::OK, "")).await;
        client.arm().await.unwrap();
        client.disarm().await.unwrap();
        assert_eq!(*seen.paths.lock().unwrap(), vec!["/arm", "/disarm"]);
    }

    #[tokio::test]
    async fn non_2xx_is_rejected_with_status() {
        let (client, _seen) = fake_device(|_| (StatusCode::INTERNAL_SERVER_ERROR, "boom")).await;

        let err = client.arm().await.unwrap_err();
        assert!(err.is_rejected());
        assert!(err.to_string().contains("500"));

        assert!(client.change_pin("1234").await.unwrap_err().is_rejected());
        assert!(client.status().await.unwrap_err().is_rejected());
    }

    #[tokio::test]
    async fn accepts_any_2xx() {
        let (client, _seen) = fake_device(|_| (StatusCode::NO_CONTENT, "")).await;
        client.disarm().await.unwrap();
    }

    #[tokio::test]
    async fn status_json_and_plain_text() {
        let (client, _) = fake_device(|_| (StatusCode::OK, r#"{"state":"disarmed"}"#)).await;
        assert_eq!(client.status().await.unwrap().as_str(), "DISARMED");

        let (client, _) = fake_device(|_| (StatusCode::OK, "ArMed\n")).await;
        assert!(client.status().await.unwrap().is_armed());

        let (client, _) = fake_device(|_| (StatusCode::OK, "[not json")).await;
        assert_eq!(client.status().await.unwrap().as_str(), "[NOT JSON");
    }

    #[tokio::test]
    async fn change_pin_round_trips_special_characters() {
        const PIN: &str = " 42&%$! ";
        let (client, seen) = fake_device(|_| (StatusCode::OK, "")).await;

        client.change_pin(PIN).await.unwrap();

        assert_eq!(*seen.paths.lock().unwrap(), vec!["/change_pin"]);
        assert_eq!(*seen.pins.lock().unwrap(), vec![PIN.to_string()]);
    }

    #[tokio::test]
    async fn connection_refused_is_a_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let addr = {
            let l = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap()
        };
        let client = DeviceClient::new(format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        let err = client.arm().await.unwrap_err();
        assert!(err.is_transport(), "{err}");
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let c = DeviceClient::with_client("http://pi.local//", reqwest::Client::new());
        assert_eq!(c.base, "http://pi.local");
        assert_eq!(c.url("/arm"), "http://pi.local/arm");
    }
}
