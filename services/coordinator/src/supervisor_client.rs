//! HTTP client for pushing assignments to supervisors.
//!
//! Each delivery builds a short-lived [`SupervisorClient`] addressed by the
//! host read out of the payload. The underlying `reqwest::Client` is pooled
//! and shared by every delivery.

use std::net::IpAddr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tempest_assignments::{SupervisorAssignments, RECEIVE_ASSIGNMENTS_PATH};
use tempest_id::NodeId;
use tracing::{debug, error};

use crate::config::Config;
use crate::distribution::AssignmentTransport;

/// Distributed-mode transport posting JSON to each supervisor.
#[derive(Clone)]
pub struct HttpAssignmentTransport {
    client: reqwest::Client,
    default_port: u16,
}

impl HttpAssignmentTransport {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.supervisor_request_timeout)
            .build()
            .context("failed to build supervisor HTTP client")?;

        Ok(Self {
            client,
            default_port: config.supervisor_port,
        })
    }

    /// A client for one supervisor host.
    pub fn client_for(&self, host: &str) -> Result<SupervisorClient> {
        SupervisorClient::new(self.client.clone(), host, self.default_port)
    }
}

#[async_trait]
impl AssignmentTransport for HttpAssignmentTransport {
    async fn send(
        &self,
        host: &str,
        node: &NodeId,
        assignments: &SupervisorAssignments,
    ) -> Result<()> {
        let client = self
            .client_for(host)
            .with_context(|| format!("failed to create supervisor client for node {node}"))?;
        let result = client.send_supervisor_assignments(assignments).await;
        client.close();
        result.with_context(|| format!("failed to send assignments to node {node}"))
    }
}

/// Client bound to one supervisor's base URL.
#[derive(Debug)]
pub struct SupervisorClient {
    client: reqwest::Client,
    base_url: String,
}

impl SupervisorClient {
    pub fn new(client: reqwest::Client, host: &str, default_port: u16) -> Result<Self> {
        Ok(Self {
            client,
            base_url: base_url(host, default_port)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Push a full assignment snapshot. Any non-2xx response is an error.
    pub async fn send_supervisor_assignments(
        &self,
        assignments: &SupervisorAssignments,
    ) -> Result<()> {
        let url = format!("{}{}", self.base_url, RECEIVE_ASSIGNMENTS_PATH);
        debug!(url = %url, jobs = assignments.storm_assignment.len(), "Pushing assignments");

        let response = self.client.post(&url).json(assignments).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Supervisor rejected assignments");
            anyhow::bail!("Supervisor rejected assignments: {} - {}", status, body);
        }

        Ok(())
    }

    /// Release the client. Pooled connections stay with the shared client.
    pub fn close(self) {
        debug!(base_url = %self.base_url, "Closing supervisor client");
    }
}

/// Base URL for a supervisor host.
///
/// Accepts `host`, `host:port`, bare IPv6 addresses, `[v6]:port`, and full
/// `http(s)://` URLs. The default port applies when none is given.
fn base_url(host: &str, default_port: u16) -> Result<String> {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        anyhow::bail!("supervisor host is empty");
    }

    if host.starts_with("http://") || host.starts_with("https://") {
        return Ok(host.to_string());
    }

    if let Ok(IpAddr::V6(addr)) = host.parse::<IpAddr>() {
        return Ok(format!("http://[{addr}]:{default_port}"));
    }

    if host.starts_with('[') {
        return Ok(match host.rsplit_once("]:") {
            Some(_) => format!("http://{host}"),
            None => format!("http://{host}:{default_port}"),
        });
    }

    match host.rsplit_once(':') {
        Some((name, port)) => {
            let port: u16 = port
                .parse()
                .with_context(|| format!("invalid port in supervisor host '{host}'"))?;
            Ok(format!("http://{name}:{port}"))
        }
        None => Ok(format!("http://{host}:{default_port}")),
    }
}
