use std::collections::HashSet;
use std::sync::Arc;

use crate::error::FetchError;
use crate::fetcher::RetryingFetcher;
use crate::models::{Site, SitesResponse};
use crate::transport::ApiRequest;

/// Lists monitoring sites for one environmental segment
pub struct SiteCatalog {
    fetcher: Arc<RetryingFetcher>,
    segment: String,
}

impl SiteCatalog {
    pub fn new(fetcher: Arc<RetryingFetcher>, segment: impl Into<String>) -> Self {
        Self {
            fetcher,
            segment: segment.into(),
        }
    }

    /// Sites in service order. Records without an id are skipped and repeated
    /// ids keep their first occurrence.
    pub async fn fetch_sites(&self) -> Result<Vec<Site>, FetchError> {
        let request = ApiRequest::get("sites", "sites").query("environmentalSegment", &self.segment);
        let response: SitesResponse = self.fetcher.fetch(&request).await?;

        let listed = response.records.len();
        let mut seen = HashSet::new();
        let sites: Vec<Site> = response
            .records
            .into_iter()
            .filter_map(Site::from_record)
            .filter(|site| seen.insert(site.id.clone()))
            .collect();

        if sites.len() != listed {
            tracing::warn!(
                listed,
                kept = sites.len(),
                "dropped site records without an id or with a repeated id"
            );
        }
        tracing::info!(
            total_records = ?response.total_records,
            sites = sites.len(),
            segment = %self.segment,
            "fetched site catalog"
        );
        Ok(sites)
    }
}
