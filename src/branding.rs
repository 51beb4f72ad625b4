//! # Branding Extractor
//!
//! Best-effort logo and primary color discovery for a client website. The
//! fetch goes through [`crate::net_guard`], so it is bounded and refuses
//! non-public hosts; every failure degrades to [`Branding::default`].
//! Extraction itself is a pure function over the HTML that runs an ordered
//! list of strategies per attribute, first match wins. When the page names no
//! logo, `/favicon.ico` is checked with a HEAD request.

use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::BrandingConfig;
use crate::net_guard::{self, FetchPolicy};
use crate::pitch_errors::FetchError;
use crate::proposal_model::Branding;

lazy_static! {
    static ref HEX_COLOR: Regex = Regex::new(r"^#(?:[0-9a-fA-F]{3,8})$").unwrap();
    static ref STYLE_HEX: Regex = Regex::new(r"#[0-9a-fA-F]{6}\b").unwrap();
    static ref META: Selector = Selector::parse("meta").unwrap();
    static ref LINK: Selector = Selector::parse("link[rel][href]").unwrap();
    static ref STYLE: Selector = Selector::parse("style").unwrap();
    static ref TITLE: Selector = Selector::parse("title").unwrap();
}

const MAX_SITE_NAME_CHARS: usize = 40;
const MAX_REDIRECTS: usize = 3;
const FAVICON_TIMEOUT: Duration = Duration::from_secs(3);

/// A single extraction heuristic over a parsed page
type Strategy = fn(&Html, &Url) -> Option<String>;

/// Color strategies in priority order
const COLOR_STRATEGIES: &[(&str, Strategy)] = &[
    ("theme-color", theme_color_meta),
    ("msapplication-TileColor", tile_color_meta),
    ("inline-style", inline_style_color),
];

/// Logo strategies in priority order
const LOGO_STRATEGIES: &[(&str, Strategy)] = &[
    ("og:logo", og_logo),
    ("og:image", og_image),
    ("icon-link", icon_link),
];

/// Fetches client pages and derives their branding
#[derive(Debug, Clone)]
pub struct BrandingExtractor {
    config: BrandingConfig,
}

impl BrandingExtractor {
    pub fn new(config: BrandingConfig) -> Self {
        Self { config }
    }

    fn policy(&self, timeout: Duration) -> FetchPolicy {
        FetchPolicy {
            timeout,
            user_agent: self.config.user_agent.clone(),
            accept: "text/html,application/xhtml+xml",
            allow_private_hosts: self.config.allow_private_hosts,
            max_redirects: MAX_REDIRECTS,
        }
    }

    /// Branding for the client's site. Never fails; any fetch problem yields
    /// the default branding.
    pub async fn extract(&self, client_url: Option<&str>) -> Branding {
        let Some(raw_url) = client_url else {
            debug!("No client URL, using default branding");
            return Branding::default();
        };

        match self.fetch_page(raw_url).await {
            Ok((page_url, html)) => {
                let mut branding = extract_branding(&html, &page_url);
                if branding.logo_url.is_none() {
                    branding.logo_url = self.favicon(&page_url).await;
                }
                info!(
                    url = %page_url,
                    color = %branding.primary_color,
                    has_logo = branding.logo_url.is_some(),
                    "Branding extracted"
                );
                branding
            }
            Err(e) => {
                warn!(url = %raw_url, error = %e, "Branding fetch failed, using defaults");
                Branding::default()
            }
        }
    }

    /// Fetch the page HTML, returning the final URL alongside it. The body is
    /// cut at `max_body_bytes`.
    pub async fn fetch_page(&self, raw_url: &str) -> Result<(Url, String), FetchError> {
        let url = net_guard::parse_web_url(&normalize_url(raw_url))?;
        let policy = self.policy(Duration::from_secs(self.config.timeout_secs));
        let (url, response) = net_guard::guarded_get(url, &policy).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = net_guard::read_capped(response, self.config.max_body_bytes).await?;
        if body.truncated {
            debug!(url = %url, received = body.received, "Page body truncated");
        }
        let html = String::from_utf8_lossy(&body.bytes).into_owned();
        Ok((url, html))
    }

    /// `/favicon.ico` on the page's origin, if the server answers a HEAD with 2xx
    pub async fn favicon(&self, page_url: &Url) -> Option<String> {
        let favicon = page_url.join("/favicon.ico").ok()?;
        let timeout = FAVICON_TIMEOUT.min(Duration::from_secs(self.config.timeout_secs));
        match net_guard::guarded_head(favicon.clone(), &self.policy(timeout)).await {
            Ok(response) if response.status().is_success() => {
                debug!(url = %favicon, "Using favicon as logo");
                Some(favicon.to_string())
            }
            Ok(response) => {
                debug!(url = %favicon, status = %response.status(), "No favicon");
                None
            }
            Err(e) => {
                debug!(url = %favicon, error = %e, "Favicon check failed");
                None
            }
        }
    }
}

/// Add a scheme to bare `www.` style input
pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Derive branding from a fetched page
pub fn extract_branding(html: &str, page_url: &Url) -> Branding {
    let document = Html::parse_document(html);
    let defaults = Branding::default();

    let primary_color = first_match(COLOR_STRATEGIES, &document, page_url)
        .unwrap_or(defaults.primary_color);
    let logo_url = first_match(LOGO_STRATEGIES, &document, page_url);

    Branding {
        logo_url,
        primary_color,
        site_name: site_name(&document),
    }
}

fn first_match(strategies: &[(&str, Strategy)], document: &Html, base: &Url) -> Option<String> {
    strategies.iter().find_map(|(name, strategy)| {
        let found = strategy(document, base)?;
        debug!(strategy = %name, value = %found, "Branding strategy matched");
        Some(found)
    })
}

fn meta_content(document: &Html, key_attr: &str, key_value: &str) -> Option<String> {
    document.select(&META).find_map(|meta| {
        let key = meta.value().attr(key_attr)?;
        if !key.trim().eq_ignore_ascii_case(key_value) {
            return None;
        }
        meta.value()
            .attr("content")
            .map(str::trim)
            .filter(|content| !content.is_empty())
            .map(str::to_string)
    })
}

fn valid_color(candidate: String) -> Option<String> {
    HEX_COLOR.is_match(&candidate).then_some(candidate)
}

fn theme_color_meta(document: &Html, _base: &Url) -> Option<String> {
    meta_content(document, "name", "theme-color").and_then(valid_color)
}

fn tile_color_meta(document: &Html, _base: &Url) -> Option<String> {
    meta_content(document, "name", "msapplication-TileColor").and_then(valid_color)
}

fn inline_style_color(document: &Html, _base: &Url) -> Option<String> {
    document.select(&STYLE).find_map(|style| {
        let css: String = style.text().collect();
        STYLE_HEX.find(&css).map(|m| m.as_str().to_string())
    })
}

fn absolutize(base: &Url, candidate: &str) -> Option<String> {
    let candidate = candidate.trim().replace("&amp;", "&");
    if candidate.is_empty() || candidate.starts_with("data:") {
        return None;
    }
    base.join(&candidate)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|u| u.to_string())
}

fn og_logo(document: &Html, base: &Url) -> Option<String> {
    meta_content(document, "property", "og:logo").and_then(|raw| absolutize(base, &raw))
}

fn og_image(document: &Html, base: &Url) -> Option<String> {
    meta_content(document, "property", "og:image").and_then(|raw| absolutize(base, &raw))
}

fn rel_tokens(link: &ElementRef<'_>) -> Vec<String> {
    link.value()
        .attr("rel")
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_ascii_lowercase)
        .collect()
}

fn icon_link(document: &Html, base: &Url) -> Option<String> {
    let links: Vec<ElementRef<'_>> = document.select(&LINK).collect();
    let wanted: [fn(&[String]) -> bool; 3] = [
        |rel| rel.len() == 1 && rel[0] == "icon",
        |rel| rel.iter().any(|t| t == "shortcut") && rel.iter().any(|t| t == "icon"),
        |rel| rel.iter().any(|t| t == "apple-touch-icon"),
    ];

    wanted.iter().find_map(|matches_rel| {
        links.iter().find_map(|link| {
            if !matches_rel(&rel_tokens(link)) {
                return None;
            }
            link.value().attr("href").and_then(|href| absolutize(base, href))
        })
    })
}

fn site_name(document: &Html) -> Option<String> {
    if let Some(name) = meta_content(document, "property", "og:site_name") {
        return Some(name.chars().take(MAX_SITE_NAME_CHARS).collect());
    }

    let title: String = document.select(&TITLE).next()?.text().collect();
    let name = title
        .split(['|', '-', '–'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() {
        None
    } else {
        Some(name.chars().take(MAX_SITE_NAME_CHARS).collect())
    }
}

/// Client display name derived from a URL host (`https://www.acme.io` → `Acme`)
pub fn name_from_url(raw_url: &str) -> Option<String> {
    let url = Url::parse(&normalize_url(raw_url)).ok()?;
    let host = url.host_str()?;
    let label = host.trim_start_matches("www.").split('.').next()?;
    let mut chars = label.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}
