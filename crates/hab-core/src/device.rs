//! Port for the remote alarm device, plus the status-body parsing every adapter shares.

use async_trait::async_trait;
use serde::Deserialize;

use crate::{domain::AlarmState, Result};

/// Hexagonal port for the alarm-control device.
#[async_trait]
pub trait DevicePort: Send + Sync {
    async fn arm(&self) -> Result<()>;
    async fn disarm(&self) -> Result<()>;
    async fn status(&self) -> Result<DeviceStatus>;
    async fn change_pin(&self, pin: &str) -> Result<()>;
}

/// Device-reported state, trimmed and uppercased.
///
/// Kept as a string: devices are free to report something other than the two known states.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceStatus(pub String);

#[derive(Deserialize)]
struct StatusBody {
    #[serde(default)]
    state: String,
}

impl DeviceStatus {
    /// Parse a `/status` body.
    ///
    /// `{"state": "..."}` wins when it decodes to a non-empty field; anything else is taken
    /// as plain text. Never fails.
    pub fn parse(body: &[u8]) -> Self {
        if let Ok(parsed) = serde_json::from_slice::<StatusBody>(body) {
            let state = parsed.state.trim();
            if !state.is_empty() {
                return Self(state.to_uppercase());
            }
        }
        Self(String::from_utf8_lossy(body).trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_armed(&self) -> bool {
        self.0 == AlarmState::Armed.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_and_plain_bodies() {
        let cases: &[(&str, &str)] = &[
            (r#"{"state":"ARMED"}"#, "ARMED"),
            (r#"{"state":"disarmed"}"#, "DISARMED"),
            (r#"{ "state" : " armed " }"#, "ARMED"),
            ("ArMed", "ARMED"),
            ("  disarmed\n", "DISARMED"),
            ("[not json", "[NOT JSON"),
        ];
        for (body, want) in cases {
            assert_eq!(DeviceStatus::parse(body.as_bytes()).as_str(), *want, "{body}");
        }
    }

    #[test]
    fn empty_json_state_falls_back_to_raw_body() {
        let st = DeviceStatus::parse(br#"{"state":""}"#);
        assert_eq!(st.as_str(), r#"{"STATE":""}"#);
        assert!(!st.is_armed());
    }

    #[test]
    fn is_armed_only_for_exact_state() {
        assert!(DeviceStatus::parse(b"armed").is_armed());
        assert!(!DeviceStatus::parse(b"disarmed").is_armed());
        assert!(!DeviceStatus::parse(b"armed-away").is_armed());
    }
}
