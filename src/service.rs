use std::sync::Arc;

use anyhow::{Context, Result};

use crate::catalog::SiteCatalog;
use crate::collector::{Collection, ParameterCollector, SiteFailure};
use crate::config::{AdvicePolicy, Config};
use crate::fetcher::{RetryPolicy, RetryingFetcher};
use crate::models::{Reading, Site};
use crate::normalizer::normalize_all;
use crate::rate_limiter::RateLimiter;
use crate::transport::Transport;

/// Everything a finished run reports
#[derive(Debug)]
pub struct CollectionRun {
    pub sites: Vec<Site>,
    pub collected: usize,
    pub failures: Vec<SiteFailure>,
    pub readings: Vec<Reading>,
}

impl CollectionRun {
    pub fn sites_total(&self) -> usize {
        self.sites.len()
    }
}

/// Wires the catalog, collector and normalizer around one shared fetcher
pub struct AirQualityService {
    catalog: SiteCatalog,
    collector: ParameterCollector,
    advice_policy: AdvicePolicy,
}

impl AirQualityService {
    pub fn new(
        transport: Arc<dyn Transport>,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
        segment: &str,
        concurrency: usize,
        advice_policy: AdvicePolicy,
    ) -> Self {
        let fetcher = Arc::new(RetryingFetcher::new(transport, limiter, policy));
        Self {
            catalog: SiteCatalog::new(Arc::clone(&fetcher), segment),
            collector: ParameterCollector::new(fetcher, segment, concurrency),
            advice_policy,
        }
    }

    pub fn from_config(transport: Arc<dyn Transport>, config: &Config) -> Self {
        Self::new(
            transport,
            Arc::new(RateLimiter::per_second(config.rate_per_sec)),
            config.retry_policy(),
            &config.segment,
            config.concurrency,
            config.advice_fallback,
        )
    }

    pub async fn sites(&self) -> Result<Vec<Site>> {
        self.catalog
            .fetch_sites()
            .await
            .context("failed to list monitoring sites")
    }

    /// Lists sites, collects each site's parameters and normalizes them.
    /// Only a catalog failure is an error; per-site failures are reported.
    pub async fn run(&self) -> Result<CollectionRun> {
        let sites = self.sites().await?;
        tracing::info!(sites = sites.len(), "collecting site parameters");

        let Collection { payloads, failures } =
            self.collector.collect(&sites).await.into_iter().collect();
        let readings = normalize_all(&payloads, self.advice_policy);
        tracing::info!(rows = readings.len(), "normalized readings");

        Ok(CollectionRun {
            collected: payloads.len(),
            sites,
            failures,
            readings,
        })
    }
}
