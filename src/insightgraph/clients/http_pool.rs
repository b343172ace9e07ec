//! Shared `reqwest::Client` instances, one per base URL.
//!
//! Branches of a fan-out hit the same API host concurrently; sharing one
//! client per host lets them reuse pooled connections and TLS sessions.

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

lazy_static! {
    static ref HTTP_CLIENT_POOL: Mutex<HashMap<String, reqwest::Client>> = Mutex::new(HashMap::new());
}

/// Get or create the pooled client for `base_url`.
///
/// Clients keep idle connections for 90 seconds, send TCP keepalives every
/// 60 seconds and abort any single request after 5 minutes.
pub fn get_http_client(base_url: &str) -> reqwest::Client {
    let mut pool = HTTP_CLIENT_POOL.lock().unwrap_or_else(|p| p.into_inner());

    if let Some(client) = pool.get(base_url) {
        return client.clone();
    }

    let client = match reqwest::ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .timeout(Duration::from_secs(300))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            log::warn!("Falling back to a default HTTP client for {}: {}", base_url, e);
            reqwest::Client::new()
        }
    };

    pool.insert(base_url.to_string(), client.clone());
    client
}
