// src/sources/mod.rs
//! Job board adapters.
//!
//! Each adapter performs a single GET against its board, then scrapes at most
//! `limit` candidate elements from the returned markup. A candidate missing an
//! expected element is dropped with a [`SkipReason`]; only network and HTTP
//! status failures surface as [`FetchError`].

pub mod foundit;
pub mod indeed;
pub mod linkedin;
pub mod naukri;

pub use foundit::FounditSource;
pub use indeed::IndeedSource;
pub use linkedin::LinkedInSource;
pub use naukri::NaukriSource;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::types::{FetchError, Platform, SkipReason};
use crate::utils::{clean_text, resolve_link};

/// One posting as scraped, before deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawListing {
    pub platform: Platform,
    pub title: String,
    pub company: String,
    pub link: String,
}

/// Outcome of scraping one results page.
#[derive(Debug, Default)]
pub struct ParsedPage {
    pub listings: Vec<RawListing>,
    pub skipped: Vec<SkipReason>,
}

#[async_trait]
pub trait JobSource: Send + Sync {
    fn platform(&self) -> Platform;

    async fn fetch(
        &self,
        keywords: &str,
        location: &str,
        limit: u32,
    ) -> Result<Vec<RawListing>, FetchError>;
}

/// The four production adapters in combine order.
pub fn default_sources(client: &Client) -> Vec<Arc<dyn JobSource>> {
    vec![
        Arc::new(LinkedInSource::new(client.clone())),
        Arc::new(NaukriSource::new(client.clone())),
        Arc::new(IndeedSource::new(client.clone())),
        Arc::new(FounditSource::new(client.clone())),
    ]
}

/// Send the request and return the body along with the final page URL.
pub(crate) async fn fetch_page(
    platform: Platform,
    request: RequestBuilder,
) -> Result<(String, Url), FetchError> {
    let response = request
        .send()
        .await
        .map_err(|source| FetchError::Http { platform, source })?;

    let status = response.status();
    let page_url = response.url().clone();

    if !status.is_success() {
        return Err(FetchError::Status {
            platform,
            status: status.as_u16(),
            url: page_url.to_string(),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|source| FetchError::Http { platform, source })?;

    Ok((body, page_url))
}

/// Walk up to `limit` candidate elements, keeping the ones `extract` accepts.
pub(crate) fn parse_candidates<F>(
    html: &str,
    candidate_css: &str,
    limit: u32,
    mut extract: F,
) -> ParsedPage
where
    F: FnMut(ElementRef<'_>) -> Result<RawListing, SkipReason>,
{
    let mut page = ParsedPage::default();
    let Ok(candidate) = Selector::parse(candidate_css) else {
        return page;
    };

    let document = Html::parse_document(html);
    for element in document.select(&candidate).take(limit as usize) {
        match extract(element) {
            Ok(listing) => page.listings.push(listing),
            Err(reason) => page.skipped.push(reason),
        }
    }

    page
}

/// Whitespace-normalized text of the first descendant matching `css`.
pub(crate) fn first_text(element: ElementRef<'_>, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    let found = element.select(&selector).next()?;
    let text = clean_text(&found.text().collect::<Vec<_>>().join(" "));
    (!text.is_empty()).then_some(text)
}

/// Absolute URL from the href of the first descendant matching `css`.
///
/// Only that first match is considered: no href there means no link.
pub(crate) fn first_link(
    element: ElementRef<'_>,
    css: &str,
    page_url: &Url,
) -> Result<String, SkipReason> {
    let selector = Selector::parse(css).map_err(|_| SkipReason::MissingLink)?;
    let href = element
        .select(&selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .ok_or(SkipReason::MissingLink)?;
    resolve_link(page_url, href)
}

pub(crate) fn log_page(platform: Platform, page_url: &Url, page: &ParsedPage) {
    for reason in &page.skipped {
        debug!(%platform, %reason, "Skipped candidate");
    }
    info!(
        %platform,
        url = %page_url,
        listings = page.listings.len(),
        skipped = page.skipped.len(),
        "Scraped results page"
    );
}
