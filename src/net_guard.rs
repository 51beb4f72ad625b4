//! # Outbound Fetch Guard
//!
//! Shared plumbing for fetching user-supplied URLs (client sites, shared
//! documents). Hosts are resolved once and refused when any address is not
//! public; the checked addresses are pinned into the client so the request
//! cannot be rebound to another address. Redirects are followed by hand and
//! every hop goes through the same check. Bodies are read chunk by chunk and
//! stop at a byte limit.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use reqwest::header::{ACCEPT, LOCATION};
use reqwest::{Client, Response};
use tracing::debug;
use url::Url;

use crate::pitch_errors::FetchError;

const RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// How a guarded GET behaves
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub timeout: Duration,
    pub user_agent: String,
    pub accept: &'static str,
    /// Skip the public address check (local test servers)
    pub allow_private_hosts: bool,
    /// Redirect hops followed; `0` hands the redirect response back
    pub max_redirects: usize,
}

/// Body read up to a limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CappedBody {
    pub bytes: Vec<u8>,
    /// Bytes received, including the chunk that crossed the limit
    pub received: u64,
    pub truncated: bool,
}

/// Parse `raw` as an http(s) URL with a host
pub fn parse_web_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(FetchError::InvalidUrl {
            url: raw.to_string(),
            reason: "only http(s) URLs with a host are allowed".to_string(),
        });
    }
    Ok(url)
}

/// Resolve the URL's host, refusing loopback, private or otherwise
/// non-public addresses. Returns the checked addresses.
pub async fn resolve_public(url: &Url) -> Result<Vec<SocketAddr>, FetchError> {
    let host = url.host_str().ok_or_else(|| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: "missing host".to_string(),
    })?;
    let port = url.port_or_known_default().unwrap_or(443);
    let host = host.trim_start_matches('[').trim_end_matches(']');

    let lookup = tokio::time::timeout(RESOLVE_TIMEOUT, tokio::net::lookup_host((host, port)))
        .await
        .map_err(|_| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: "host resolution timed out".to_string(),
        })?;
    let addrs: Vec<SocketAddr> = lookup
        .map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: format!("could not resolve host: {e}"),
        })?
        .collect();

    if addrs.is_empty() {
        return Err(FetchError::InvalidUrl {
            url: url.to_string(),
            reason: "host resolved to no addresses".to_string(),
        });
    }
    if addrs.iter().any(|addr| !is_public_ip(addr.ip())) {
        return Err(FetchError::UnsafeUrl {
            url: url.to_string(),
        });
    }
    Ok(addrs)
}

pub fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_public_v4(v4),
            None => is_public_v6(v6),
        },
    }
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
    !(ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast()
        // 100.64.0.0/10 carrier-grade NAT
        || (ip.octets()[0] == 100 && (ip.octets()[1] & 0xc0) == 64))
}

fn is_public_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    !(ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        || (first & 0xfe00) == 0xfc00
        || (first & 0xffc0) == 0xfe80)
}

/// Client for one hop, pinned to the checked addresses unless private hosts are allowed
async fn client_for(url: &Url, policy: &FetchPolicy) -> Result<Client, FetchError> {
    let mut builder = Client::builder()
        .timeout(policy.timeout)
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(policy.user_agent.clone());
    if !policy.allow_private_hosts {
        let addrs = resolve_public(url).await?;
        if let Some(host) = url.host_str() {
            builder = builder.resolve_to_addrs(host, &addrs);
        }
    }
    Ok(builder.build()?)
}

/// GET a URL under the policy. Returns the final URL and its response.
pub async fn guarded_get(url: Url, policy: &FetchPolicy) -> Result<(Url, Response), FetchError> {
    let mut url = url;
    let mut hops = 0;
    loop {
        let client = client_for(&url, policy).await?;
        let response = client
            .get(url.clone())
            .header(ACCEPT, policy.accept)
            .send()
            .await?;

        if !response.status().is_redirection() || policy.max_redirects == 0 {
            return Ok((url, response));
        }
        let Some(location) = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
        else {
            return Ok((url, response));
        };
        if hops == policy.max_redirects {
            return Err(FetchError::TooManyRedirects {
                url: url.to_string(),
            });
        }

        let next = url.join(location).map_err(|e| FetchError::InvalidUrl {
            url: location.to_string(),
            reason: e.to_string(),
        })?;
        let next = parse_web_url(next.as_str())?;
        debug!(from = %url, to = %next, "Following redirect");
        url = next;
        hops += 1;
    }
}

/// HEAD a URL under the policy, without following redirects
pub async fn guarded_head(url: Url, policy: &FetchPolicy) -> Result<Response, FetchError> {
    let client = client_for(&url, policy).await?;
    Ok(client.head(url).send().await?)
}

/// Read the body chunk by chunk, stopping once `limit` bytes are exceeded
pub async fn read_capped(mut response: Response, limit: usize) -> Result<CappedBody, FetchError> {
    let mut bytes = Vec::new();
    let mut received: u64 = 0;
    while let Some(chunk) = response.chunk().await? {
        received += chunk.len() as u64;
        let room = limit - bytes.len();
        if chunk.len() > room {
            bytes.extend_from_slice(&chunk[..room]);
            return Ok(CappedBody {
                bytes,
                received,
                truncated: true,
            });
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(CappedBody {
        bytes,
        received,
        truncated: false,
    })
}
