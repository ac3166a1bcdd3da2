//! Candidate reachability probing.
//!
//! # Responsibilities
//! - Define the prober seam (real HTTP or injected test doubles)
//! - Probe all candidates of a cycle concurrently, each under its own timeout
//! - Pick the lowest-index candidate that answered
//!
//! # Design Decisions
//! - Any HTTP response counts as reachable; status is recorded, not judged
//! - Redirects are not followed, the first response is enough
//! - The cycle resolves as soon as every higher-priority candidate has failed

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::time::{self, Instant};
use url::Url;

use crate::endpoint::error::ProbeError;
use crate::observability::metrics;

/// Reachability check for one candidate URL.
#[async_trait]
pub trait Prober: Send + Sync + 'static {
    /// Issue one lightweight request and return the HTTP status received.
    ///
    /// Implementations should honour `timeout`; the selector enforces it as well.
    async fn probe(&self, url: &Url, timeout: Duration) -> Result<u16, ProbeError>;
}

/// Prober backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    /// Create a prober with a client that does not follow redirects.
    pub fn new() -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("paywindow-probe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeError::Http(e.to_string()))?;
        Ok(Self { client })
    }

    /// Use a caller-supplied client (proxies, TLS roots, ...).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &Url, timeout: Duration) -> Result<u16, ProbeError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;
        Ok(response.status().as_u16())
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> ProbeError {
    if err.is_timeout() {
        ProbeError::Timeout(timeout)
    } else if err.is_connect() {
        ProbeError::Connect(err.to_string())
    } else {
        ProbeError::Http(err.to_string())
    }
}

/// Successful probe details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSuccess {
    pub status: u16,
    pub latency: Duration,
}

/// Outcome of probing one candidate during one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// Position in the candidate list (0 = default server).
    pub index: usize,
    pub url: Url,
    pub outcome: Result<ProbeSuccess, ProbeError>,
}

impl ProbeResult {
    pub fn reachable(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Probe every candidate concurrently and return the lowest-index reachable one.
///
/// Results of candidates that were still pending when the winner became
/// certain are not waited for; their futures are dropped.
pub async fn first_reachable(
    prober: Arc<dyn Prober>,
    candidates: &[Url],
    timeout: Duration,
) -> Option<ProbeResult> {
    let mut pending: FuturesUnordered<_> = candidates
        .iter()
        .enumerate()
        .map(|(index, url)| probe_one(prober.clone(), index, url.clone(), timeout))
        .collect();

    let mut settled: Vec<Option<ProbeResult>> = vec![None; candidates.len()];

    while let Some(result) = pending.next().await {
        let index = result.index;
        settled[index] = Some(result);

        match decide(&settled) {
            Decision::Winner(i) => return settled[i].take(),
            Decision::NoneReachable => return None,
            Decision::Undecided => {}
        }
    }
    None
}

enum Decision {
    Winner(usize),
    NoneReachable,
    Undecided,
}

fn decide(settled: &[Option<ProbeResult>]) -> Decision {
    for (i, slot) in settled.iter().enumerate() {
        match slot {
            None => return Decision::Undecided,
            Some(result) if result.reachable() => return Decision::Winner(i),
            Some(_) => {}
        }
    }
    Decision::NoneReachable
}

async fn probe_one(prober: Arc<dyn Prober>, index: usize, url: Url, timeout: Duration) -> ProbeResult {
    let started = Instant::now();
    let outcome = match time::timeout(timeout, prober.probe(&url, timeout)).await {
        Ok(Ok(status)) => Ok(ProbeSuccess {
            status,
            latency: started.elapsed(),
        }),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(ProbeError::Timeout(timeout)),
    };

    match &outcome {
        Ok(success) => {
            tracing::debug!(
                index,
                url = %url,
                status = success.status,
                latency_ms = success.latency.as_millis() as u64,
                "Candidate reachable"
            );
        }
        Err(e) => {
            tracing::debug!(index, url = %url, error = %e, "Candidate unreachable");
        }
    }
    metrics::record_probe(url.host_str().unwrap_or("unknown"), outcome.is_ok(), started.elapsed());

    ProbeResult { index, url, outcome }
}
