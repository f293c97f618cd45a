// src/sources/naukri.rs
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::{Client, Url};

use super::{fetch_page, first_link, first_text, log_page, parse_candidates};
use super::{JobSource, ParsedPage, RawListing};
use crate::types::{FetchError, Platform, SkipReason};
use crate::utils::normalize_base_url;

pub const DEFAULT_BASE_URL: &str = "https://www.naukri.com";
// Naukri is scraped from a fixed listing page; keywords and location are not sent.
const LISTING_PATH: &str = "/devops-jobs-in-bangalore";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0";

pub struct NaukriSource {
    client: Client,
    base_url: String,
}

impl NaukriSource {
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

    pub fn parse_page(html: &str, page_url: &Url, limit: u32) -> ParsedPage {
        parse_candidates(html, "article", limit, |article| {
            let title = first_text(article, "a.title").ok_or(SkipReason::MissingTitle)?;
            let company = first_text(article, "a.subTitle").ok_or(SkipReason::MissingCompany)?;
            let link = first_link(article, "a", page_url)?;

            Ok(RawListing {
                platform: Platform::Naukri,
                title,
                company,
                link,
            })
        })
    }
}

#[async_trait]
impl JobSource for NaukriSource {
    fn platform(&self) -> Platform {
        Platform::Naukri
    }

    async fn fetch(
        &self,
        _keywords: &str,
        _location: &str,
        limit: u32,
    ) -> Result<Vec<RawListing>, FetchError> {
        let url = format!("{}{}", self.base_url, LISTING_PATH);
        let request = self.client.get(&url).header(USER_AGENT, BROWSER_USER_AGENT);

        let (body, page_url) = fetch_page(Platform::Naukri, request).await?;
        let page = Self::parse_page(&body, &page_url, limit);
        log_page(Platform::Naukri, &page_url, &page);
        Ok(page.listings)
    }
}
