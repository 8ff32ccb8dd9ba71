use std::{sync::OnceLock, time::Duration};

use tracing::{debug, warn};

use crate::proxy::DEFAULT_UPSTREAM_TIMEOUT;

/// Idle upstream connections kept per origin host.
const POOL_MAX_IDLE_PER_HOST: usize = 16;

const USER_AGENT: &str = concat!("tubetto/", env!("CARGO_PKG_VERSION"));

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build the client used for upstream media requests.
///
/// `timeout` bounds connecting and each individual read, not the whole
/// transfer, so long streams stay open as long as bytes keep flowing.
/// Bodies are relayed untouched, so transparent decompression is off.
/// A zero `timeout` is replaced by [`DEFAULT_UPSTREAM_TIMEOUT`].
pub fn build_upstream_client(timeout: Duration) -> reqwest::Client {
    install_rustls_provider();

    let timeout = effective_timeout(timeout);
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .no_gzip()
        .no_deflate()
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .build().unwrap_or_else(|error| {
        warn!(
            error = %error,
            "Failed to create upstream HTTP client; falling back to reqwest defaults"
        );
        reqwest::Client::new()
    })
}

fn effective_timeout(timeout: Duration) -> Duration {
    if timeout.is_zero() {
        DEFAULT_UPSTREAM_TIMEOUT
    } else {
        timeout
    }
}
