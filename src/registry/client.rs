use crate::error::{Result, UpdaterError};
use crate::registry::{ListingShape, Registry, Tag, TagSource};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::io::Read;
use std::time::Duration;
use tracing::debug;
use url::Url;

const MAX_LISTING_BYTES: usize = 10 * 1024 * 1024;
const USER_AGENT: &str = concat!("imgbump/", env!("CARGO_PKG_VERSION"));

/// Blocking HTTP client for registry tag listings
pub struct RegistryClient {
    client: Client,
}

impl RegistryClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| UpdaterError::Registry(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    fn get_text(&self, url: &str) -> Result<String> {
        debug!(url, "fetching tag listing");

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| UpdaterError::Registry(format!("GET {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(UpdaterError::Registry(format!(
                "HTTP {} from {url}",
                response.status()
            )));
        }

        if response
            .content_length()
            .is_some_and(|len| len > MAX_LISTING_BYTES as u64)
        {
            return Err(listing_too_large(url));
        }

        read_capped(response, url)
    }
}

/// Reads at most `MAX_LISTING_BYTES` of `body`; anything longer is an error.
fn read_capped(body: impl Read, url: &str) -> Result<String> {
    let mut text = String::new();
    body.take(MAX_LISTING_BYTES as u64 + 1)
        .read_to_string(&mut text)
        .map_err(|e| UpdaterError::Registry(format!("Failed to read body of {url}: {e}")))?;

    if text.len() > MAX_LISTING_BYTES {
        return Err(listing_too_large(url));
    }
    Ok(text)
}

fn listing_too_large(url: &str) -> UpdaterError {
    UpdaterError::Registry(format!("Tag listing from {url} exceeded 10MB limit"))
}

impl TagSource for RegistryClient {
    fn fetch_tags(&self, registry: Registry, repository: &str) -> Result<Vec<Tag>> {
        let endpoint = registry.tags_endpoint(repository);

        let names = match registry.listing_shape() {
            ListingShape::Paginated => collect_pages(&endpoint, |url| self.get_text(url))?,
            ListingShape::Flat => parse_flat_listing(&endpoint, &self.get_text(&endpoint)?)?,
        };

        debug!(%registry, repository, tags = names.len(), "tag listing complete");
        Ok(names.into_iter().map(Tag::new).collect())
    }
}

#[derive(Debug, Deserialize)]
struct TagPage {
    #[serde(default)]
    results: Vec<PagedTag>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PagedTag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FlatListing {
    tags: Option<Vec<String>>,
}

/// Follows `next` cursors from `first_url` until the registry stops returning one.
///
/// There is no page cap. Cursors must stay on the first page's host over https.
pub fn collect_pages<F>(first_url: &str, mut fetch: F) -> Result<Vec<String>>
where
    F: FnMut(&str) -> Result<String>,
{
    let origin = Url::parse(first_url)
        .map_err(|e| UpdaterError::Registry(format!("Invalid listing URL '{first_url}': {e}")))?;

    let mut names = Vec::new();
    let mut pages = 0usize;
    let mut next = Some(first_url.to_string());

    while let Some(url) = next.take() {
        let body = fetch(&url)?;
        let page: TagPage = serde_json::from_str(&body).map_err(|e| {
            UpdaterError::Registry(format!("Malformed tag page from {url}: {e}"))
        })?;

        pages += 1;
        names.extend(page.results.into_iter().map(|tag| tag.name));

        next = match page.next.filter(|cursor| !cursor.is_empty()) {
            Some(cursor) => Some(validate_cursor(&origin, &cursor)?),
            None => None,
        };
    }

    debug!(pages, tags = names.len(), "collected paginated listing");
    Ok(names)
}

pub fn parse_flat_listing(url: &str, body: &str) -> Result<Vec<String>> {
    let listing: FlatListing = serde_json::from_str(body)
        .map_err(|e| UpdaterError::Registry(format!("Malformed tag listing from {url}: {e}")))?;
    Ok(listing.tags.unwrap_or_default())
}

fn validate_cursor(origin: &Url, cursor: &str) -> Result<String> {
    let parsed = Url::parse(cursor)
        .map_err(|e| UpdaterError::Registry(format!("Invalid next-page URL '{cursor}': {e}")))?;

    if parsed.scheme() != "https" || parsed.host_str() != origin.host_str() {
        return Err(UpdaterError::Registry(format!(
            "Refusing next-page URL '{cursor}' outside {}",
            origin.host_str().unwrap_or("the registry")
        )));
    }

    Ok(parsed.to_string())
}
