//! Device command client.
//!
//! One HTTP GET per operation against the light's tiny web server, each under
//! a fixed timeout and with no automatic retry: callers get retry-by-next-pass
//! semantics from the engine. The trait seam exists so engine and monitor
//! logic can be tested against a mock.

use std::net::IpAddr;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::protocol::AckResponse;
use super::protocol::DeviceInfo;
use super::protocol::SetResponse;
use crate::engine::TallyState;
use crate::error::DeviceError;

/// Fixed per-call timeout for every device operation.
pub const DEVICE_TIMEOUT: Duration = Duration::from_secs(3);

/// Resolved HTTP location of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceAddr {
    pub ip: IpAddr,
    pub port: u16,
}

impl DeviceAddr {
    fn url(&self, path: &str) -> String {
        // SocketAddr display brackets IPv6 addresses correctly.
        format!("http://{}{}", SocketAddr::new(self.ip, self.port), path)
    }
}

/// The four device-facing commands plus the liveness probe.
#[async_trait]
pub trait DeviceCommands: Send + Sync {
    /// `GET /` — device self-report.
    async fn query_info(&self, target: DeviceAddr) -> Result<DeviceInfo, DeviceError>;

    /// `GET /set` — push a display state and brightness.
    async fn set_state(
        &self,
        target: DeviceAddr,
        state: TallyState,
        brightness: u8,
    ) -> Result<(), DeviceError>;

    /// `GET /ping` — liveness only, body ignored.
    async fn ping(&self, target: DeviceAddr) -> Result<(), DeviceError>;

    /// `GET /identify` — flash a visual identification pattern.
    async fn identify(&self, target: DeviceAddr) -> Result<(), DeviceError>;

    /// `GET /restart` — device restarts after a short delay.
    async fn restart(&self, target: DeviceAddr) -> Result<(), DeviceError>;
}

/// reqwest-backed client used in production.
pub struct HttpDeviceClient {
    http: reqwest::Client,
    api_key: String,
}

impl HttpDeviceClient {
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEVICE_TIMEOUT)
            .build()?;
        Ok(Self { http, api_key })
    }

    async fn get_ack(&self, target: DeviceAddr, path: &str) -> Result<(), DeviceError> {
        let resp = self
            .http
            .get(target.url(path))
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await?;
        if resp.status() == StatusCode::FORBIDDEN {
            return Err(DeviceError::AuthRejected);
        }
        let ack: AckResponse = resp.json().await?;
        if !ack.success {
            return Err(DeviceError::Rejected(
                ack.error.unwrap_or_else(|| "unspecified".to_string()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceCommands for HttpDeviceClient {
    async fn query_info(&self, target: DeviceAddr) -> Result<DeviceInfo, DeviceError> {
        let resp = self.http.get(target.url("/")).send().await?;
        if resp.status() == StatusCode::FORBIDDEN {
            return Err(DeviceError::AuthRejected);
        }
        Ok(resp.json().await?)
    }

    async fn set_state(
        &self,
        target: DeviceAddr,
        state: TallyState,
        brightness: u8,
    ) -> Result<(), DeviceError> {
        let resp = self
            .http
            .get(target.url("/set"))
            .query(&[
                ("state", state.to_string()),
                ("brightness", brightness.to_string()),
                ("apiKey", self.api_key.clone()),
            ])
            .send()
            .await?;
        if resp.status() == StatusCode::FORBIDDEN {
            return Err(DeviceError::AuthRejected);
        }
        // A 400 still carries the {success:false, error} payload.
        let body: SetResponse = resp.json().await?;
        if !body.success {
            return Err(DeviceError::Rejected(
                body.error.unwrap_or_else(|| "unspecified".to_string()),
            ));
        }
        Ok(())
    }

    async fn ping(&self, target: DeviceAddr) -> Result<(), DeviceError> {
        let resp = self.http.get(target.url("/ping")).send().await?;
        if !resp.status().is_success() {
            return Err(DeviceError::Unreachable(format!(
                "ping returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn identify(&self, target: DeviceAddr) -> Result<(), DeviceError> {
        self.get_ack(target, "/identify").await
    }

    async fn restart(&self, target: DeviceAddr) -> Result<(), DeviceError> {
        self.get_ack(target, "/restart").await
    }
}
