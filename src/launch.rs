//! Launch planner: market decision, create calls, tag application
//!
//! The one branch point in the whole crate lives here: a caller-supplied
//! duration selects time-bounded spot capacity, its absence selects
//! on-demand. Both paths converge on the same tag contract so the registry
//! never needs to know how an instance was bought.

use std::sync::Arc;

use crate::cloud::client::{CloudClient, CreateSpec, InstanceId, MarketSpec};
use crate::logging::LogSink;
use crate::pricing::{Market, PriceQuote, PricingOracle, Region};
use crate::tags::{TagSet, TIMEOUT_KEY};
use crate::{Error, Result};

/// One launch order for a batch of identical instances
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub instance_type: String,
    pub image: String,
    pub count: u32,
    /// Root volume size on top of the image default, in GiB
    pub extra_disk_gb: u32,
    /// Committed runtime in minutes; absent means on-demand with the
    /// default timeout tag
    pub duration_minutes: Option<u32>,
    pub group: Option<String>,
    pub analysis: Option<String>,
    pub job: Option<String>,
}

impl LaunchRequest {
    pub fn new(instance_type: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            instance_type: instance_type.into(),
            image: image.into(),
            count: 1,
            extra_disk_gb: 0,
            duration_minutes: None,
            group: None,
            analysis: None,
            job: None,
        }
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn extra_disk_gb(mut self, gb: u32) -> Self {
        self.extra_disk_gb = gb;
        self
    }

    pub fn duration_minutes(mut self, minutes: u32) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn analysis(mut self, analysis: impl Into<String>) -> Self {
        self.analysis = Some(analysis.into());
        self
    }

    pub fn job(mut self, job: impl Into<String>) -> Self {
        self.job = Some(job.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.instance_type.is_empty() {
            return Err(Error::InvalidRequest("instance type cannot be empty".into()));
        }
        if self.image.is_empty() {
            return Err(Error::InvalidRequest("image cannot be empty".into()));
        }
        if self.count < 1 {
            return Err(Error::InvalidRequest("count must be at least 1".into()));
        }
        if self.duration_minutes == Some(0) {
            return Err(Error::InvalidRequest("duration must be positive".into()));
        }
        Ok(())
    }

    /// The market this request buys into
    pub fn market(&self) -> MarketSpec {
        match self.duration_minutes {
            None => MarketSpec::OnDemand,
            Some(minutes) => MarketSpec::Spot {
                block_minutes: minutes,
            },
        }
    }

    /// Tags every instance of this request carries
    pub fn tag_set(&self) -> TagSet {
        TagSet::for_job(
            self.duration_minutes,
            self.group.as_deref(),
            self.analysis.as_deref(),
            self.job.as_deref(),
        )
    }

    fn to_create_spec(&self) -> CreateSpec {
        CreateSpec {
            image: self.image.clone(),
            instance_type: self.instance_type.clone(),
            count: self.count,
            extra_disk_gb: self.extra_disk_gb,
            market: self.market(),
        }
    }
}

/// Where and how a request should be bought, per current prices
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub region: Region,
    pub market: Market,
    /// Quote in the selected region, when one exists
    pub quote: Option<PriceQuote>,
}

/// Issues create calls and applies the tag contract
pub struct Launcher {
    client: Arc<dyn CloudClient>,
}

impl Launcher {
    pub fn new(client: Arc<dyn CloudClient>) -> Self {
        Self { client }
    }

    /// Launch the batch and tag every instance before returning.
    ///
    /// On success returns exactly `count` handles. `CapacityUnavailable`
    /// surfaces untouched — retry policy belongs to the caller. A create
    /// that succeeds but fails to tag returns `TaggingFailed` carrying the
    /// handles: those instances are running and billable until the caller
    /// retags or terminates them.
    pub async fn launch(
        &self,
        request: &LaunchRequest,
        log: &mut dyn LogSink,
    ) -> Result<Vec<InstanceId>> {
        request.validate()?;

        let market = request.market();
        tracing::info!(
            image = %request.image,
            instance_type = %request.instance_type,
            count = request.count,
            market = %market.market(),
            "launching instances"
        );
        log.append(&format!(
            "requesting {} {} instance(s) of type {}",
            request.count,
            market.market(),
            request.instance_type
        ));

        let instances = self.client.create_instances(&request.to_create_spec()).await?;
        log.append(&format!(
            "launched {} instances of type {}",
            instances.len(),
            request.instance_type
        ));

        let tags = request.tag_set();
        if let Err(e) = self.client.tag_instances(&instances, &tags).await {
            tracing::error!(count = instances.len(), error = %e, "tagging failed");
            log.append(&format!(
                "tagging failed, {} untagged instance(s) left running",
                instances.len()
            ));
            log.flush();
            return Err(Error::TaggingFailed {
                instances,
                reason: e.to_string(),
            });
        }

        log.append(&format!(
            "tagged {} instance(s) for cost tracking, Timeout={}",
            instances.len(),
            tags.get(TIMEOUT_KEY).unwrap_or_default()
        ));
        log.flush();

        Ok(instances)
    }

    /// Pick region and market for the request from live prices.
    ///
    /// A request with no quote in any candidate region falls back to
    /// [`Region::DEFAULT`] rather than failing the launch.
    pub async fn plan(
        &self,
        request: &LaunchRequest,
        candidates: &[Region],
    ) -> Result<LaunchPlan> {
        request.validate()?;

        let market = request.market().market();
        let oracle = PricingOracle::new(self.client.clone());
        let region = oracle
            .best_region_or_default(&request.instance_type, market, candidates)
            .await?;

        let quote = match oracle.price_for(&request.instance_type, region, market).await {
            Ok(q) => Some(q),
            Err(e) if e.is_price_unavailable() => None,
            Err(e) => return Err(e),
        };

        Ok(LaunchPlan {
            region,
            market,
            quote,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::fake::FakeCloud;
    use crate::cloud::client::{InstanceFilter, InstanceState};
    use crate::logging::{MemorySink, MockLogSink};
    use crate::tags::DEFAULT_TIMEOUT_MINUTES;

    fn launcher_with_image() -> (Launcher, Arc<FakeCloud>, String) {
        let cloud = Arc::new(FakeCloud::new());
        let ami = cloud.register_image("base");
        (Launcher::new(cloud.clone()), cloud, ami)
    }

    #[test]
    fn test_validate_rejects_empty_type() {
        let req = LaunchRequest::new("", "ami-1");
        assert!(matches!(req.validate(), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_validate_rejects_zero_count() {
        let req = LaunchRequest::new("t2.micro", "ami-1").count(0);
        assert!(matches!(req.validate(), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_validate_rejects_zero_duration() {
        let req = LaunchRequest::new("t2.micro", "ami-1").duration_minutes(0);
        assert!(matches!(req.validate(), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_market_decision() {
        let od = LaunchRequest::new("t2.micro", "ami-1");
        assert_eq!(od.market(), MarketSpec::OnDemand);
        assert_eq!(od.tag_set().get(TIMEOUT_KEY), Some("20"));

        let spot = LaunchRequest::new("t2.micro", "ami-1").duration_minutes(15);
        assert_eq!(spot.market(), MarketSpec::Spot { block_minutes: 15 });
        assert_eq!(spot.tag_set().get(TIMEOUT_KEY), Some("15"));
    }

    #[test]
    fn test_default_timeout_constant() {
        assert_eq!(DEFAULT_TIMEOUT_MINUTES, 20);
    }

    #[tokio::test]
    async fn test_launch_returns_count_handles() {
        let (launcher, _cloud, ami) = launcher_with_image();
        let req = LaunchRequest::new("t2.micro", &ami).count(3);

        let mut sink = MemorySink::new();
        let handles = launcher.launch(&req, &mut sink).await.unwrap();
        assert_eq!(handles.len(), 3);
    }

    #[tokio::test]
    async fn test_launch_progress_lines() {
        let (launcher, _cloud, ami) = launcher_with_image();
        let req = LaunchRequest::new("t2.micro", &ami).count(2);

        let mut sink = MockLogSink::new();
        let mut seq = mockall::Sequence::new();
        sink.expect_append()
            .withf(|m: &str| m.starts_with("requesting 2 on-demand"))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        sink.expect_append()
            .withf(|m: &str| m == "launched 2 instances of type t2.micro")
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        sink.expect_append()
            .withf(|m: &str| m.starts_with("tagged 2 instance(s)"))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        sink.expect_flush().times(1).return_const(());

        launcher.launch(&req, &mut sink).await.unwrap();
    }

    #[tokio::test]
    async fn test_launch_spot_records_market() {
        let (launcher, cloud, ami) = launcher_with_image();
        let req = LaunchRequest::new("t2.micro", &ami).duration_minutes(20);

        let mut sink = MemorySink::new();
        let handles = launcher.launch(&req, &mut sink).await.unwrap();
        assert_eq!(
            cloud.market_of(&handles[0]),
            Some(MarketSpec::Spot { block_minutes: 20 })
        );
    }

    #[tokio::test]
    async fn test_capacity_error_surfaces_untouched() {
        let (launcher, cloud, ami) = launcher_with_image();
        cloud.fail_capacity(true);

        let mut sink = MemorySink::new();
        let err = launcher
            .launch(&LaunchRequest::new("t2.micro", &ami), &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CapacityUnavailable(_)));
    }

    #[tokio::test]
    async fn test_tagging_failure_carries_handles() {
        let (launcher, cloud, ami) = launcher_with_image();
        cloud.fail_tagging(true);

        let mut sink = MemorySink::new();
        let err = launcher
            .launch(&LaunchRequest::new("t2.micro", &ami).count(2), &mut sink)
            .await
            .unwrap_err();

        let Error::TaggingFailed { instances, .. } = err else {
            panic!("expected TaggingFailed");
        };
        assert_eq!(instances.len(), 2);

        // The orphans are running, billable, and untagged.
        let records = cloud
            .describe_instances(&InstanceFilter::new().state(InstanceState::Running))
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.tags.is_empty()));
    }

    #[tokio::test]
    async fn test_plan_picks_cheapest_region() {
        let (launcher, cloud, ami) = launcher_with_image();
        cloud.set_price("t2.micro", Region::UsEast1, Market::OnDemand, 0.012);
        cloud.set_price("t2.micro", Region::UsWest2, Market::OnDemand, 0.010);

        let plan = launcher
            .plan(
                &LaunchRequest::new("t2.micro", &ami),
                &[Region::UsEast1, Region::UsWest2],
            )
            .await
            .unwrap();
        assert_eq!(plan.region, Region::UsWest2);
        assert_eq!(plan.market, Market::OnDemand);
        assert_eq!(plan.quote.unwrap().hourly_usd, 0.010);
    }

    #[tokio::test]
    async fn test_plan_falls_back_to_default_region() {
        let (launcher, _cloud, ami) = launcher_with_image();

        let plan = launcher
            .plan(&LaunchRequest::new("t2.micro", &ami).duration_minutes(30), &[Region::UsWest2])
            .await
            .unwrap();
        assert_eq!(plan.region, Region::DEFAULT);
        assert_eq!(plan.market, Market::Spot);
        assert!(plan.quote.is_none());
    }
}
