//! Masternode registry client.
//!
//! Fetches the current masternode list from the RPC endpoint with a single
//! `masternodelist` call and folds it into an [`Allowlist`]. A fetch either
//! succeeds as a whole or fails as a whole; individual malformed or disabled
//! entries are skipped with a log line, never aborting the fetch.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use p2pgate_core::{Allowlist, GateError, GateResult};

/// Response to the `masternodelist` RPC call.
#[derive(Debug, Deserialize)]
pub struct MasternodeList {
    pub result: HashMap<String, MasternodeInfo>,
}

/// One masternode record. Auxiliary fields (payout addresses, penalty
/// scores, platform ports, ...) are ignored on decode.
#[derive(Debug, Deserialize)]
pub struct MasternodeInfo {
    pub address: String,
    pub status: String,
}

/// Fetch the masternode list and build the destination allowlist.
///
/// Sends one POST to `base_url`, attaching basic credentials when `user` is
/// non-empty. No retry or backoff — a failed fetch is reported once and the
/// caller decides what to do with it.
pub async fn fetch_allowed(
    base_url: &str,
    user: &str,
    pass: &str,
    default_ports: Vec<String>,
) -> GateResult<Allowlist> {
    let client = reqwest::Client::new();
    let body = json!({"method": "masternodelist", "params": []});

    let mut request = client.post(base_url).json(&body);
    if !user.is_empty() {
        request = request.basic_auth(user, Some(pass));
    }

    let response = request
        .send()
        .await
        .map_err(|e| GateError::Transport(format!("registry request failed: {e}")))?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        return Err(GateError::RegistryStatus {
            status: status.as_u16(),
            body,
        });
    }

    let list: MasternodeList = response
        .json()
        .await
        .map_err(|e| GateError::Decode(e.to_string()))?;

    Ok(build_allowlist(list, default_ports))
}

/// Fold a decoded masternode list into an [`Allowlist`].
///
/// Only entries with status `ENABLED` (case-sensitive) and an address of the
/// exact form `host:port` are admitted. Ports accumulate per host across
/// records, duplicates preserved.
pub fn build_allowlist(list: MasternodeList, default_ports: Vec<String>) -> Allowlist {
    let mut allowlist = Allowlist::new(default_ports);

    for (id, mn) in &list.result {
        if mn.status != "ENABLED" {
            debug!(id = %id, address = %mn.address, status = %mn.status, "skipping disabled masternode");
            continue;
        }

        match split_host_port(&mn.address) {
            Some((host, port)) => allowlist.insert(host, port),
            None => {
                debug!(id = %id, address = %mn.address, "skipping masternode with invalid address");
            }
        }
    }

    allowlist
}

/// Split `host:port`, requiring exactly one colon and two non-empty parts.
fn split_host_port(address: &str) -> Option<(&str, &str)> {
    let mut parts = address.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(host), Some(port), None) if !host.is_empty() && !port.is_empty() => {
            Some((host, port))
        }
        _ => None,
    }
}
