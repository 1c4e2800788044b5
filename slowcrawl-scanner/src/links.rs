use crate::session::RenderSession;
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

/// Network location of `url`: the host, plus the port when one is given
/// explicitly and differs from the scheme default.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// True when both addresses have the same network location. Scheme, path,
/// query and fragment are ignored. An address without a host matches nothing.
pub fn is_same_domain(a: &str, b: &str) -> bool {
    match (host_of(a), host_of(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Same-domain link targets of the page currently shown in `session`.
///
/// Enumeration errors are logged and produce an empty list so the crawl can
/// carry on with whatever it already has queued.
pub async fn extract_links<S: RenderSession + ?Sized>(
    session: &mut S,
    reference_url: &str,
) -> Vec<String> {
    match session.anchor_hrefs().await {
        Ok(hrefs) => filter_same_domain(hrefs, reference_url),
        Err(e) => {
            warn!("Could not enumerate links: {}", e);
            Vec::new()
        }
    }
}

/// Keep the targets on `reference_url`'s host, dropping empty entries and
/// exact duplicates. First-seen order is preserved.
pub fn filter_same_domain<I>(hrefs: I, reference_url: &str) -> Vec<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    let Some(reference_host) = host_of(reference_url) else {
        warn!("Reference URL has no host: {}", reference_url);
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for href in hrefs.into_iter().flatten() {
        let href = href.trim();
        if href.is_empty() {
            continue;
        }
        if host_of(href).as_deref() != Some(reference_host.as_str()) {
            debug!("Skipping off-domain link: {}", href);
            continue;
        }
        if seen.insert(href.to_string()) {
            links.push(href.to_string());
        }
    }

    links
}
