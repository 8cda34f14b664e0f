//! Reachability probe.
//!
//! Fetches the target URL once with a hard upper bound on the wait and
//! classifies the outcome as reachable, timed out, opaque (answered but not
//! observable) or unreachable. The fetched document feeds the
//! document-based checks of the category analyzers.

use crate::config::ProbeConfig;
use crate::models::{Device, HttpStatus};
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

/// Genuine network failure: nothing answered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Site unreachable: {reason}")]
pub struct ProbeError {
    pub reason: String,
    pub elapsed_ms: u64,
}

/// Facts read from the fetched document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentSignals {
    /// `<html>` carries a `lang` attribute.
    pub has_lang: bool,
    /// A `<meta name="viewport">` tag is present.
    pub has_viewport: bool,
    /// Document starts with `<!DOCTYPE html>`.
    pub html5_doctype: bool,
}

impl DocumentSignals {
    /// Scan an HTML document for the signals the analyzers use.
    pub fn from_html(html: &str) -> Self {
        let lower = html.to_lowercase();
        let head = lower.trim_start_matches('\u{feff}').trim_start();

        let html5_doctype = head
            .strip_prefix("<!doctype html")
            .and_then(|rest| rest.chars().next())
            .map(|c| c == '>' || c.is_whitespace())
            .unwrap_or(false);

        let has_lang = tags(&lower, "html")
            .next()
            .map(|tag| tag.contains(" lang=") || tag.contains("\nlang="))
            .unwrap_or(false);

        let has_viewport = tags(&lower, "meta").any(|tag| {
            tag.contains("name=\"viewport\"")
                || tag.contains("name='viewport'")
                || tag.contains("name=viewport")
        });

        Self {
            has_lang,
            has_viewport,
            html5_doctype,
        }
    }
}

/// Iterate the opening tags named `name` in an already lowercased document.
fn tags<'a>(lower: &'a str, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    let needle = format!("<{}", name);
    let mut cursor = 0;
    std::iter::from_fn(move || loop {
        let start = cursor + lower[cursor..].find(&needle)?;
        let after = start + needle.len();
        cursor = after;
        match lower[after..].chars().next() {
            Some(c) if c.is_whitespace() || c == '>' || c == '/' => {
                let end = lower[after..].find('>').map(|i| after + i).unwrap_or(lower.len());
                return Some(&lower[start..end]);
            }
            Some(_) => continue,
            None => return None,
        }
    })
}

/// Outcome of a probe that did not fail outright.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    /// The site answered (including opaque answers).
    pub accessible: bool,
    /// Milliseconds until response headers, or until the probe gave up.
    pub response_time_ms: u64,
    /// Milliseconds until the full document was received.
    pub load_time_ms: Option<u64>,
    pub status: HttpStatus,
    /// Response headers with lowercased names, when observed.
    pub headers: Option<Vec<(String, String)>>,
    pub document: Option<DocumentSignals>,
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn timed_out(&self) -> bool {
        self.status == HttpStatus::TIMEOUT
    }

    /// Whether a response header with the given (lowercase) name was seen.
    /// `None` when headers were not observed at all.
    pub fn has_header(&self, name: &str) -> Option<bool> {
        self.headers
            .as_ref()
            .map(|headers| headers.iter().any(|(n, _)| n == name))
    }

    fn timeout(elapsed_ms: u64, bound: Duration) -> Self {
        Self {
            accessible: false,
            response_time_ms: elapsed_ms,
            load_time_ms: None,
            status: HttpStatus::TIMEOUT,
            headers: None,
            document: None,
            error: Some(format!(
                "No response within {}ms",
                bound.as_millis()
            )),
        }
    }

    fn opaque(elapsed_ms: u64) -> Self {
        Self {
            accessible: true,
            response_time_ms: elapsed_ms,
            load_time_ms: None,
            status: HttpStatus::OPAQUE,
            headers: None,
            document: None,
            error: None,
        }
    }
}

/// A reachability probe.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, url: &Url, device: Device) -> Result<ProbeOutcome, ProbeError>;
}

/// User-Agent strings sent for each device profile.
#[derive(Debug, Clone)]
pub struct UserAgents {
    pub desktop: String,
    pub mobile: String,
    pub tablet: String,
}

impl UserAgents {
    pub fn for_device(&self, device: Device) -> &str {
        match device {
            Device::Desktop => &self.desktop,
            Device::Mobile => &self.mobile,
            Device::Tablet => &self.tablet,
        }
    }
}

/// Probe backed by a `reqwest` client.
pub struct HttpProbe {
    client: reqwest::Client,
    timeout: Duration,
    user_agents: UserAgents,
}

impl HttpProbe {
    /// Build a probe from configuration.
    pub fn new(config: &ProbeConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client, config))
    }

    /// Build a probe around an existing client.
    pub fn with_client(client: reqwest::Client, config: &ProbeConfig) -> Self {
        Self {
            client,
            timeout: Duration::from_millis(config.timeout_ms()),
            user_agents: config.user_agents(),
        }
    }
}

/// Raw parts of a response that arrived in time.
struct Arrival {
    response_time: Duration,
    status: u16,
    headers: Vec<(String, String)>,
    body: Result<String, reqwest::Error>,
    load_time: Duration,
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, url: &Url, device: Device) -> Result<ProbeOutcome, ProbeError> {
        info!("Probing {} as {}", url, device);
        let start = Instant::now();

        let attempt = async {
            let response = self
                .client
                .get(url.clone())
                .header(USER_AGENT, self.user_agents.for_device(device))
                .send()
                .await?;
            let response_time = start.elapsed();
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_lowercase(),
                        value.to_str().unwrap_or_default().to_string(),
                    )
                })
                .collect();
            let body = response.text().await;
            Ok::<_, reqwest::Error>(Arrival {
                response_time,
                status,
                headers,
                body,
                load_time: start.elapsed(),
            })
        };

        let elapsed_ms = || start.elapsed().as_millis() as u64;

        match tokio::time::timeout(self.timeout, attempt).await {
            Err(_) => {
                warn!("Probe of {} timed out after {:?}", url, self.timeout);
                Ok(ProbeOutcome::timeout(elapsed_ms(), self.timeout))
            }
            Ok(Err(e)) if e.is_timeout() => {
                warn!("Probe of {} timed out: {}", url, e);
                Ok(ProbeOutcome::timeout(elapsed_ms(), self.timeout))
            }
            Ok(Err(e)) if e.is_redirect() || e.is_decode() || e.is_body() => {
                debug!("Probe of {} got an unobservable answer: {}", url, e);
                Ok(ProbeOutcome::opaque(elapsed_ms()))
            }
            Ok(Err(e)) => Err(ProbeError {
                reason: e.to_string(),
                elapsed_ms: elapsed_ms(),
            }),
            Ok(Ok(arrival)) => {
                let (document, load_time_ms) = match arrival.body {
                    Ok(body) => (
                        Some(DocumentSignals::from_html(&body)),
                        Some(arrival.load_time.as_millis() as u64),
                    ),
                    Err(e) => {
                        debug!("Could not read body of {}: {}", url, e);
                        (None, None)
                    }
                };
                debug!(
                    "Probe of {} answered {} in {:?}",
                    url, arrival.status, arrival.response_time
                );
                Ok(ProbeOutcome {
                    accessible: true,
                    response_time_ms: arrival.response_time.as_millis() as u64,
                    load_time_ms,
                    status: HttpStatus::Code(arrival.status),
                    headers: Some(arrival.headers),
                    document,
                    error: None,
                })
            }
        }
    }
}
