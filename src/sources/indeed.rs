// src/sources/indeed.rs
use async_trait::async_trait;
use reqwest::{Client, Url};

use super::{fetch_page, first_link, first_text, log_page, parse_candidates};
use super::{JobSource, ParsedPage, RawListing};
use crate::types::{FetchError, Platform, SkipReason};
use crate::utils::normalize_base_url;

pub const DEFAULT_BASE_URL: &str = "https://in.indeed.com";
const SEARCH_PATH: &str = "/jobs";

pub struct IndeedSource {
    client: Client,
    base_url: String,
}

impl IndeedSource {
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

    /// Indeed card links are site-relative (`/rc/clk?jk=...`).
    pub fn parse_page(html: &str, page_url: &Url, limit: u32) -> ParsedPage {
        parse_candidates(html, "div.job_seen_beacon", limit, |card| {
            let title = first_text(card, "h2").ok_or(SkipReason::MissingTitle)?;
            let company =
                first_text(card, "span.companyName").ok_or(SkipReason::MissingCompany)?;
            let link = first_link(card, "a", page_url)?;

            Ok(RawListing {
                platform: Platform::Indeed,
                title,
                company,
                link,
            })
        })
    }
}

#[async_trait]
impl JobSource for IndeedSource {
    fn platform(&self) -> Platform {
        Platform::Indeed
    }

    async fn fetch(
        &self,
        keywords: &str,
        location: &str,
        limit: u32,
    ) -> Result<Vec<RawListing>, FetchError> {
        let url = format!("{}{}", self.base_url, SEARCH_PATH);
        let request = self
            .client
            .get(&url)
            .query(&[("q", keywords), ("l", location)]);

        let (body, page_url) = fetch_page(Platform::Indeed, request).await?;
        let page = Self::parse_page(&body, &page_url, limit);
        log_page(Platform::Indeed, &page_url, &page);
        Ok(page.listings)
    }
}
