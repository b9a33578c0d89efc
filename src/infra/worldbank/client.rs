use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info};

use crate::fetch::{HttpClient, fetch_bytes};
use crate::infra::store::size_table::{self, SizeRow};

const PER_PAGE: u32 = 20_000;

/// One page of a World Bank v2 indicator response.
#[derive(Debug, PartialEq)]
pub struct IndicatorPage {
    pub page: u32,
    pub pages: u32,
    pub rows: Vec<SizeRow>,
}

/// What `fetch_size` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The file already existed and `force` was not set.
    Kept,
    Written { rows: usize },
}

pub struct WorldBankClient<'a, C: HttpClient + ?Sized> {
    http: &'a C,
    base_url: String,
}

impl<'a, C: HttpClient + ?Sized> WorldBankClient<'a, C> {
    pub fn new(http: &'a C, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn page_url(&self, indicator: &str, page: u32) -> String {
        format!(
            "{}/country/all/indicator/{}?format=json&per_page={}&page={}",
            self.base_url, indicator, PER_PAGE, page
        )
    }

    /// Every observation of `indicator` across all countries and years.
    pub async fn indicator(&self, indicator: &str) -> Result<Vec<SizeRow>> {
        let mut rows = Vec::new();
        let mut page = 1;

        loop {
            let url = self.page_url(indicator, page);
            debug!(%url, "Fetching World Bank page");
            let body = fetch_bytes(self.http, &url).await?;
            let parsed = parse_page(&body).with_context(|| format!("Failed to parse response from {url}"))?;

            rows.extend(parsed.rows);
            if parsed.page >= parsed.pages {
                break;
            }
            page = parsed.page + 1;
        }

        info!(indicator, rows = rows.len(), "World Bank indicator downloaded");
        Ok(rows)
    }

    /// Downloads `indicator` into `path` unless the file exists and `force` is off.
    pub async fn fetch_size(&self, indicator: &str, path: &Path, force: bool) -> Result<FetchOutcome> {
        if path.exists() && !force {
            info!(path = %path.display(), "Size table already present, use --force to refresh");
            return Ok(FetchOutcome::Kept);
        }

        let rows = self.indicator(indicator).await?;
        if rows.is_empty() {
            anyhow::bail!("World Bank returned no observations for {indicator}");
        }
        size_table::write_rows(path, &rows)?;
        info!(path = %path.display(), rows = rows.len(), "Size table written");
        Ok(FetchOutcome::Written { rows: rows.len() })
    }
}

fn as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Parses `[metadata, observations]`; an API error payload becomes an error.
pub fn parse_page(body: &[u8]) -> Result<IndicatorPage> {
    let json: Value = serde_json::from_slice(body)?;
    let meta = json.get(0).context("Response is not a [metadata, data] array")?;

    if let Some(message) = meta.get("message") {
        anyhow::bail!("World Bank API error: {message}");
    }

    let page = meta.get("page").and_then(as_u32).unwrap_or(1);
    let pages = meta.get("pages").and_then(as_u32).unwrap_or(1);

    let rows = json
        .get(1)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let cty_iso3 = item["countryiso3code"].as_str()?.trim().to_string();
                    if cty_iso3.is_empty() {
                        return None;
                    }
                    Some(SizeRow {
                        cty_iso3,
                        cty_iso2: item["country"]["id"].as_str().unwrap_or("").to_string(),
                        cty_name: item["country"]["value"].as_str().unwrap_or("").to_string(),
                        period: item["date"].as_str()?.to_string(),
                        value: item["value"].as_f64(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(IndicatorPage { page, pages, rows })
}
