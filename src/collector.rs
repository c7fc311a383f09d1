use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::fetcher::RetryingFetcher;
use crate::models::{ParameterBlock, ParametersResponse, RawSitePayload, Site};
use crate::transport::ApiRequest;

/// Result of fetching one site's parameters
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Success(RawSitePayload),
    Failed { site_id: String, reason: String },
}

impl FetchOutcome {
    pub fn site_id(&self) -> &str {
        match self {
            FetchOutcome::Success(payload) => &payload.site_id,
            FetchOutcome::Failed { site_id, .. } => site_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteFailure {
    pub site_id: String,
    pub reason: String,
}

/// Outcomes split into payloads and failures, both in site order
#[derive(Debug, Default)]
pub struct Collection {
    pub payloads: Vec<RawSitePayload>,
    pub failures: Vec<SiteFailure>,
}

impl FromIterator<FetchOutcome> for Collection {
    fn from_iter<I: IntoIterator<Item = FetchOutcome>>(outcomes: I) -> Self {
        let mut collection = Collection::default();
        for outcome in outcomes {
            match outcome {
                FetchOutcome::Success(payload) => collection.payloads.push(payload),
                FetchOutcome::Failed { site_id, reason } => {
                    collection.failures.push(SiteFailure { site_id, reason })
                }
            }
        }
        collection
    }
}

/// Fetches every site's parameters concurrently; the rate limiter inside the
/// fetcher paces actual dispatch.
pub struct ParameterCollector {
    fetcher: Arc<RetryingFetcher>,
    segment: String,
    in_flight: Arc<Semaphore>,
}

impl ParameterCollector {
    pub fn new(fetcher: Arc<RetryingFetcher>, segment: impl Into<String>, concurrency: usize) -> Self {
        Self {
            fetcher,
            segment: segment.into(),
            in_flight: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// One outcome per site, in the order the sites were given
    pub async fn collect(&self, sites: &[Site]) -> Vec<FetchOutcome> {
        let handles: Vec<_> = sites
            .iter()
            .map(|site| {
                let site_id = site.id.clone();
                let fetcher = Arc::clone(&self.fetcher);
                let in_flight = Arc::clone(&self.in_flight);
                let request = ApiRequest::get(format!("sites/{}/parameters", site.id), &site.id)
                    .query("environmentalSegment", &self.segment);

                let handle = tokio::spawn(async move {
                    // the semaphore is never closed
                    let _permit = in_flight.acquire_owned().await.ok();
                    fetch_site(&fetcher, request).await
                });
                (site_id, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (site_id, handle) in handles {
            let outcome = match handle.await {
                Ok(Ok(parameters)) => FetchOutcome::Success(RawSitePayload {
                    site_id,
                    parameters,
                }),
                Ok(Err(reason)) => FetchOutcome::Failed { site_id, reason },
                Err(join_err) => FetchOutcome::Failed {
                    site_id,
                    reason: format!("fetch task aborted: {join_err}"),
                },
            };
            if let FetchOutcome::Failed { site_id, reason } = &outcome {
                tracing::warn!(site = %site_id, %reason, "site fetch failed");
            }
            outcomes.push(outcome);
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        tracing::info!(
            sites = outcomes.len(),
            succeeded,
            failed = outcomes.len() - succeeded,
            "parameter collection finished"
        );
        outcomes
    }
}

async fn fetch_site(
    fetcher: &RetryingFetcher,
    request: ApiRequest,
) -> Result<Vec<ParameterBlock>, String> {
    fetcher
        .fetch::<ParametersResponse>(&request)
        .await
        .map(|response| response.parameters)
        .map_err(|err| err.to_string())
}
