// src/sources/foundit.rs
use async_trait::async_trait;
use reqwest::{Client, Url};

use super::{fetch_page, first_link, first_text, log_page, parse_candidates};
use super::{JobSource, ParsedPage, RawListing};
use crate::types::{FetchError, Platform, SkipReason};
use crate::utils::normalize_base_url;

pub const DEFAULT_BASE_URL: &str = "https://www.foundit.in";
// Fixed search page; the user's keywords and location are not applied.
const LISTING_PATH: &str = "/search/devops-jobs";

pub struct FounditSource {
    client: Client,
    base_url: String,
}

impl FounditSource {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }

    /// Company is optional on Foundit cards and defaults to an empty string.
    pub fn parse_page(html: &str, page_url: &Url, limit: u32) -> ParsedPage {
        parse_candidates(html, "div.cardContainer", limit, |card| {
            let title = first_text(card, "h3").ok_or(SkipReason::MissingTitle)?;
            let company = first_text(card, "span.companyName").unwrap_or_default();
            let link = first_link(card, "a", page_url)?;

            Ok(RawListing {
                platform: Platform::Foundit,
                title,
                company,
                link,
            })
        })
    }
}

#[async_trait]
impl JobSource for FounditSource {
    fn platform(&self) -> Platform {
        Platform::Foundit
    }

    async fn fetch(
        &self,
        _keywords: &str,
        _location: &str,
        limit: u32,
    ) -> Result<Vec<RawListing>, FetchError> {
        let url = format!("{}{}", self.base_url, LISTING_PATH);
        let request = self.client.get(&url);

        let (body, page_url) = fetch_page(Platform::Foundit, request).await?;
        let page = Self::parse_page(&body, &page_url, limit);
        log_page(Platform::Foundit, &page_url, &page);
        Ok(page.listings)
    }
}
