//! Pricing oracle: live price quotes and cheapest-region selection
//!
//! Quotes are point-in-time reads against the provider; nothing is cached
//! beyond the single planning call that asked.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cloud::client::CloudClient;
use crate::{Error, Result};

/// Supported regions, in priority order.
///
/// Declaration order matters: price ties are broken by whichever region
/// comes first here, and the first variant is the fallback default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "us-east-1")]
    UsEast1,
    #[serde(rename = "us-east-2")]
    UsEast2,
    #[serde(rename = "us-west-1")]
    UsWest1,
    #[serde(rename = "us-west-2")]
    UsWest2,
    #[serde(rename = "eu-central-1")]
    EuCentral1,
    #[serde(rename = "eu-west-1")]
    EuWest1,
    #[serde(rename = "ap-southeast-1")]
    ApSoutheast1,
}

impl Region {
    pub const DEFAULT: Region = Region::UsEast1;

    pub const ALL: [Region; 7] = [
        Region::UsEast1,
        Region::UsEast2,
        Region::UsWest1,
        Region::UsWest2,
        Region::EuCentral1,
        Region::EuWest1,
        Region::ApSoutheast1,
    ];

    /// Provider API identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::UsEast1 => "us-east-1",
            Region::UsEast2 => "us-east-2",
            Region::UsWest1 => "us-west-1",
            Region::UsWest2 => "us-west-2",
            Region::EuCentral1 => "eu-central-1",
            Region::EuWest1 => "eu-west-1",
            Region::ApSoutheast1 => "ap-southeast-1",
        }
    }

    /// Long-form name as used by the billing catalog
    pub fn display_name(&self) -> &'static str {
        match self {
            Region::UsEast1 => "US East (N. Virginia)",
            Region::UsEast2 => "US East (Ohio)",
            Region::UsWest1 => "US West (N. California)",
            Region::UsWest2 => "US West (Oregon)",
            Region::EuCentral1 => "EU (Frankfurt)",
            Region::EuWest1 => "EU (Ireland)",
            Region::ApSoutheast1 => "Asia Pacific (Singapore)",
        }
    }

    /// Position in the priority ordering (lower wins ties)
    fn priority(&self) -> usize {
        Region::ALL.iter().position(|r| r == self).unwrap_or(usize::MAX)
    }

    pub fn parse(s: &str) -> Option<Region> {
        Region::ALL.iter().copied().find(|r| r.as_str() == s)
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Region> {
        Region::parse(s).ok_or_else(|| Error::Config(format!("unsupported region: {}", s)))
    }
}

/// Capacity market a quote or launch targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    OnDemand,
    Spot,
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Market::OnDemand => write!(f, "on-demand"),
            Market::Spot => write!(f, "spot"),
        }
    }
}

/// Point-in-time price for an (instance type, region, market) triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub instance_type: String,
    pub region: Region,
    pub market: Market,
    pub hourly_usd: f64,
}

/// Selects region and market from live price data
pub struct PricingOracle {
    client: Arc<dyn CloudClient>,
}

impl PricingOracle {
    pub fn new(client: Arc<dyn CloudClient>) -> Self {
        Self { client }
    }

    /// Most recent price for the triple, or `PriceUnavailable`
    pub async fn price_for(
        &self,
        instance_type: &str,
        region: Region,
        market: Market,
    ) -> Result<PriceQuote> {
        if instance_type.is_empty() {
            return Err(Error::InvalidRequest("instance type is empty".into()));
        }

        let hourly_usd = self.client.get_price(instance_type, region, market).await?;
        Ok(PriceQuote {
            instance_type: instance_type.to_string(),
            region,
            market,
            hourly_usd,
        })
    }

    /// Cheapest candidate region for the type and market.
    ///
    /// Regions with no quote are skipped; price ties go to whichever region
    /// comes first in [`Region::ALL`]. Errors with `PriceUnavailable` when no
    /// candidate has a quote at all.
    pub async fn best_region(
        &self,
        instance_type: &str,
        market: Market,
        candidates: &[Region],
    ) -> Result<Region> {
        if candidates.is_empty() {
            return Err(Error::InvalidRequest("no candidate regions".into()));
        }

        let mut quotes = Vec::new();
        for &region in candidates {
            match self.price_for(instance_type, region, market).await {
                Ok(quote) => quotes.push(quote),
                Err(e) if e.is_price_unavailable() => {
                    tracing::debug!(instance_type, region = %region, "no quote, skipping");
                }
                Err(e) => return Err(e),
            }
        }

        quotes
            .into_iter()
            .min_by(|a, b| {
                a.hourly_usd
                    .partial_cmp(&b.hourly_usd)
                    .unwrap_or(Ordering::Equal)
                    .then(a.region.priority().cmp(&b.region.priority()))
            })
            .map(|q| {
                tracing::info!(
                    instance_type,
                    region = %q.region,
                    price = q.hourly_usd,
                    "selected cheapest region"
                );
                q.region
            })
            .ok_or_else(|| Error::PriceUnavailable {
                instance_type: instance_type.to_string(),
                region: candidates
                    .iter()
                    .map(|r| r.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            })
    }

    /// Like [`best_region`](Self::best_region), but a missing quote falls
    /// back to [`Region::DEFAULT`] instead of failing the launch
    pub async fn best_region_or_default(
        &self,
        instance_type: &str,
        market: Market,
        candidates: &[Region],
    ) -> Result<Region> {
        match self.best_region(instance_type, market, candidates).await {
            Ok(region) => Ok(region),
            Err(e) if e.is_price_unavailable() => {
                tracing::warn!(instance_type, "no quotes anywhere, using default region");
                Ok(Region::DEFAULT)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::fake::FakeCloud;

    #[test]
    fn test_region_roundtrip() {
        for region in Region::ALL {
            assert_eq!(Region::parse(region.as_str()), Some(region));
        }
        assert_eq!(Region::parse("mars-north-1"), None);
    }

    #[test]
    fn test_region_display_name() {
        assert_eq!(Region::UsEast1.display_name(), "US East (N. Virginia)");
        assert_eq!(Region::EuCentral1.display_name(), "EU (Frankfurt)");
    }

    #[test]
    fn test_default_is_first() {
        assert_eq!(Region::DEFAULT, Region::ALL[0]);
    }

    #[tokio::test]
    async fn test_price_for() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.set_price("t2.micro", Region::UsEast1, Market::OnDemand, 0.0116);

        let oracle = PricingOracle::new(cloud);
        let quote = oracle
            .price_for("t2.micro", Region::UsEast1, Market::OnDemand)
            .await
            .unwrap();
        assert_eq!(quote.hourly_usd, 0.0116);
        assert_eq!(quote.region, Region::UsEast1);
    }

    #[tokio::test]
    async fn test_price_for_unavailable() {
        let cloud = Arc::new(FakeCloud::new());
        let oracle = PricingOracle::new(cloud);

        let err = oracle
            .price_for("p2.xlarge", Region::UsWest2, Market::Spot)
            .await
            .unwrap_err();
        assert!(err.is_price_unavailable());
    }

    #[tokio::test]
    async fn test_best_region_picks_cheapest() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.set_price("p2.xlarge", Region::UsEast1, Market::Spot, 0.30);
        cloud.set_price("p2.xlarge", Region::UsWest2, Market::Spot, 0.27);

        let oracle = PricingOracle::new(cloud);
        let best = oracle
            .best_region("p2.xlarge", Market::Spot, &[Region::UsEast1, Region::UsWest2])
            .await
            .unwrap();
        assert_eq!(best, Region::UsWest2);
    }

    #[tokio::test]
    async fn test_best_region_tie_goes_to_enumeration_order() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.set_price("t2.micro", Region::UsWest2, Market::OnDemand, 0.0116);
        cloud.set_price("t2.micro", Region::UsEast1, Market::OnDemand, 0.0116);

        let oracle = PricingOracle::new(cloud);
        // Candidates listed west-first; the tie still resolves to us-east-1.
        let best = oracle
            .best_region("t2.micro", Market::OnDemand, &[Region::UsWest2, Region::UsEast1])
            .await
            .unwrap();
        assert_eq!(best, Region::UsEast1);
    }

    #[tokio::test]
    async fn test_best_region_skips_unquoted() {
        let cloud = Arc::new(FakeCloud::new());
        cloud.set_price("t2.micro", Region::UsWest2, Market::OnDemand, 0.02);

        let oracle = PricingOracle::new(cloud);
        let best = oracle
            .best_region("t2.micro", Market::OnDemand, &[Region::UsEast1, Region::UsWest2])
            .await
            .unwrap();
        assert_eq!(best, Region::UsWest2);
    }

    #[tokio::test]
    async fn test_best_region_all_unavailable() {
        let cloud = Arc::new(FakeCloud::new());
        let oracle = PricingOracle::new(cloud);

        let err = oracle
            .best_region("t2.micro", Market::OnDemand, &[Region::UsEast1, Region::UsWest2])
            .await
            .unwrap_err();
        assert!(err.is_price_unavailable());
    }

    #[tokio::test]
    async fn test_best_region_or_default_falls_back() {
        let cloud = Arc::new(FakeCloud::new());
        let oracle = PricingOracle::new(cloud);

        let region = oracle
            .best_region_or_default("t2.micro", Market::OnDemand, &[Region::UsWest2])
            .await
            .unwrap();
        assert_eq!(region, Region::DEFAULT);
    }
}
