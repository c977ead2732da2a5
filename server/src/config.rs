//! Server Configuration
//!
//! Loads WebRTC transport configuration from environment variables.

use std::env;
use std::net::IpAddr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use webrtc::ice_transport::ice_server::RTCIceServer;

/// Default STUN server used when `WEBRTC_ICE_SERVERS` is unset.
const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// Default ephemeral UDP port range.
const DEFAULT_PORT_RANGE: (u16, u16) = (59000, 59100);

/// ICE server entry handed to both the transport and the remote browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    /// Server URLs (e.g., "stun:stun.l.google.com:19302")
    pub urls: Vec<String>,
    /// Username for TURN servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Credential for TURN servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl From<&IceServer> for RTCIceServer {
    fn from(server: &IceServer) -> Self {
        Self {
            urls: server.urls.clone(),
            username: server.username.clone().unwrap_or_default(),
            credential: server.credential.clone().unwrap_or_default(),
            ..Default::default()
        }
    }
}

/// WebRTC transport configuration.
#[derive(Debug, Clone)]
pub struct WebRtcConfig {
    /// Run the ICE agent in lite mode (host candidates only, no STUN/TURN).
    pub ice_lite: bool,

    /// ICE servers; ignored when `ice_lite` is set.
    pub ice_servers: Vec<IceServer>,

    /// Lowest UDP port for host candidates (inclusive).
    pub ephemeral_port_min: u16,

    /// Highest UDP port for host candidates (inclusive). `0..=0` lets the OS pick.
    pub ephemeral_port_max: u16,

    /// Public addresses advertised in place of local host candidate addresses.
    pub nat1to1_ips: Vec<String>,
}

impl WebRtcConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `WEBRTC_ICE_LITE`: Enable ICE-lite mode (default: false)
    /// - `WEBRTC_ICE_SERVERS`: JSON list of `{"urls": [..], "username": .., "credential": ..}`
    /// - `WEBRTC_EPR`: Ephemeral UDP port range as "min-max" (default: 59000-59100)
    /// - `WEBRTC_NAT1TO1`: Comma-separated public IPs for host candidates
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ice_lite = match lookup("WEBRTC_ICE_LITE") {
            Some(val) => parse_bool(&val).context("WEBRTC_ICE_LITE must be a boolean")?,
            None => false,
        };

        let ice_servers = match lookup("WEBRTC_ICE_SERVERS") {
            Some(val) => parse_ice_servers(&val).context("invalid WEBRTC_ICE_SERVERS")?,
            None => vec![IceServer {
                urls: vec![DEFAULT_STUN_SERVER.into()],
                username: None,
                credential: None,
            }],
        };

        let (ephemeral_port_min, ephemeral_port_max) = match lookup("WEBRTC_EPR") {
            Some(val) => parse_port_range(&val).context("invalid WEBRTC_EPR")?,
            None => DEFAULT_PORT_RANGE,
        };

        let nat1to1_ips = match lookup("WEBRTC_NAT1TO1") {
            Some(val) => parse_nat_ips(&val).context("invalid WEBRTC_NAT1TO1")?,
            None => Vec::new(),
        };

        Ok(Self {
            ice_lite,
            ice_servers,
            ephemeral_port_min,
            ephemeral_port_max,
            nat1to1_ips,
        })
    }

    /// Whether a fixed UDP port range is configured.
    #[must_use]
    pub const fn has_port_range(&self) -> bool {
        self.ephemeral_port_max > 0
    }

    /// ICE servers to use for a peer connection (empty in lite mode).
    #[must_use]
    pub fn effective_ice_servers(&self) -> Vec<RTCIceServer> {
        if self.ice_lite {
            Vec::new()
        } else {
            self.ice_servers.iter().map(RTCIceServer::from).collect()
        }
    }

    /// Create a default configuration for testing.
    ///
    /// Full ICE, no servers, OS-assigned ports, no NAT mapping.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            ice_lite: false,
            ice_servers: Vec::new(),
            ephemeral_port_min: 0,
            ephemeral_port_max: 0,
            nat1to1_ips: Vec::new(),
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("unrecognized boolean {other:?}"),
    }
}

/// Parse an inclusive port range in the form "min-max".
fn parse_port_range(value: &str) -> Result<(u16, u16)> {
    let (min, max) = value
        .trim()
        .split_once('-')
        .context("expected \"min-max\"")?;
    let min: u16 = min.trim().parse().context("invalid minimum port")?;
    let max: u16 = max.trim().parse().context("invalid maximum port")?;

    if min > max {
        bail!("minimum port {min} is above maximum port {max}");
    }

    Ok((min, max))
}

fn parse_nat_ips(value: &str) -> Result<Vec<String>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(|ip| {
            ip.parse::<IpAddr>()
                .with_context(|| format!("{ip:?} is not an IP address"))?;
            Ok(ip.to_string())
        })
        .collect()
}

fn parse_ice_servers(value: &str) -> Result<Vec<IceServer>> {
    let servers: Vec<IceServer> = serde_json::from_str(value)?;

    if let Some(server) = servers.iter().find(|s| s.urls.is_empty()) {
        bail!("ICE server entry without urls: {server:?}");
    }

    Ok(servers)
}
