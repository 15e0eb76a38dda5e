//! Active instance registry: tag-based state recovered by live query
//!
//! There is no store here on purpose. Every call asks the provider afresh
//! and derives counts and committed duration from what comes back, so two
//! successive calls may legitimately disagree while instances transition.

use std::sync::Arc;

use crate::cloud::client::{CloudClient, InstanceFilter, InstanceRecord, InstanceState};
use crate::tags::TIMEOUT_KEY;
use crate::{Error, Result};

/// Snapshot of running instances for one image, taken at query time.
///
/// Finite and non-restartable; a fresh call to
/// [`Registry::active_instances`] yields an independent snapshot, not a
/// continuation of this one. No ordering guarantee across instances.
pub struct ActiveInstances {
    iter: std::vec::IntoIter<InstanceRecord>,
}

impl Iterator for ActiveInstances {
    type Item = InstanceRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl ExactSizeIterator for ActiveInstances {}

/// Pure query view over provider-owned instance state
pub struct Registry {
    client: Arc<dyn CloudClient>,
}

impl Registry {
    pub fn new(client: Arc<dyn CloudClient>) -> Self {
        Self { client }
    }

    /// Filter matching the instances this registry would report for `image`.
    ///
    /// Exposed so cleanup drivers can terminate exactly what the registry
    /// sees without re-implementing the query.
    pub fn running_filter(image: &str) -> InstanceFilter {
        InstanceFilter::new()
            .image(image)
            .state(InstanceState::Running)
    }

    /// Instances currently running from `image`
    pub async fn active_instances(&self, image: &str) -> Result<ActiveInstances> {
        let records = self
            .client
            .describe_instances(&Self::running_filter(image))
            .await?;

        tracing::debug!(image, count = records.len(), "active instance snapshot");
        Ok(ActiveInstances {
            iter: records.into_iter(),
        })
    }

    /// Number of instances currently running from `image`
    pub async fn count(&self, image: &str) -> Result<usize> {
        Ok(self.active_instances(image).await?.len())
    }

    /// Sum of the `Timeout` tags over the active instances, in minutes.
    ///
    /// This is the fleet's committed cost exposure, so the aggregation is
    /// strict: an active instance with a missing or non-numeric `Timeout`
    /// tag fails the whole call with [`Error::InvalidDurationTag`] naming
    /// the instance, rather than silently understating the total.
    pub async fn committed_duration(&self, image: &str) -> Result<u64> {
        let mut total: u64 = 0;
        for record in self.active_instances(image).await? {
            total += parse_timeout(&record)?;
        }
        Ok(total)
    }
}

fn parse_timeout(record: &InstanceRecord) -> Result<u64> {
    let raw = record
        .tags
        .get(TIMEOUT_KEY)
        .ok_or_else(|| Error::InvalidDurationTag {
            instance: record.id.clone(),
            value: "<absent>".into(),
        })?;

    raw.parse::<u64>().map_err(|_| Error::InvalidDurationTag {
        instance: record.id.clone(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::client::{CreateSpec, InstanceId, MarketSpec};
    use crate::cloud::fake::FakeCloud;
    use crate::tags::TagSet;

    async fn launch_tagged(
        cloud: &FakeCloud,
        image: &str,
        instance_type: &str,
        count: u32,
        duration: Option<u32>,
    ) -> Vec<InstanceId> {
        let ids = cloud
            .create_instances(&CreateSpec {
                image: image.to_string(),
                instance_type: instance_type.to_string(),
                count,
                extra_disk_gb: 0,
                market: MarketSpec::OnDemand,
            })
            .await
            .unwrap();
        cloud
            .tag_instances(&ids, &TagSet::for_job(duration, None, None, None))
            .await
            .unwrap();
        ids
    }

    #[tokio::test]
    async fn test_active_instances_filters_image_and_state() {
        let cloud = Arc::new(FakeCloud::new());
        let ami1 = cloud.register_image("one");
        let ami2 = cloud.register_image("two");

        launch_tagged(&cloud, &ami1, "t2.micro", 3, Some(5)).await;
        launch_tagged(&cloud, &ami2, "t2.micro", 1, Some(5)).await;
        let stopped = launch_tagged(&cloud, &ami1, "t2.micro", 1, Some(5)).await;
        cloud.terminate_instances(&stopped).await.unwrap();

        let registry = Registry::new(cloud);
        assert_eq!(registry.count(&ami1).await.unwrap(), 3);
        assert_eq!(registry.count(&ami2).await.unwrap(), 1);
        assert!(registry
            .active_instances(&ami1)
            .await
            .unwrap()
            .all(|r| r.image == ami1 && r.state == InstanceState::Running));
    }

    #[tokio::test]
    async fn test_committed_duration_sums_timeouts() {
        let cloud = Arc::new(FakeCloud::new());
        let ami = cloud.register_image("one");
        launch_tagged(&cloud, &ami, "t2.micro", 5, Some(5)).await;

        let registry = Registry::new(cloud);
        assert_eq!(registry.committed_duration(&ami).await.unwrap(), 25);
    }

    #[tokio::test]
    async fn test_committed_duration_mixed_timeouts() {
        let cloud = Arc::new(FakeCloud::new());
        let ami = cloud.register_image("one");
        launch_tagged(&cloud, &ami, "t2.micro", 2, Some(10)).await;
        launch_tagged(&cloud, &ami, "t2.micro", 1, None).await;

        let registry = Registry::new(cloud);
        assert_eq!(registry.committed_duration(&ami).await.unwrap(), 40);
    }

    #[tokio::test]
    async fn test_committed_duration_fails_on_malformed_tag() {
        let cloud = Arc::new(FakeCloud::new());
        let ami = cloud.register_image("one");
        let ids = launch_tagged(&cloud, &ami, "t2.micro", 1, Some(5)).await;

        let mut bad = TagSet::new();
        bad.push(TIMEOUT_KEY, "soon");
        cloud.tag_instances(&ids, &bad).await.unwrap();

        let registry = Registry::new(cloud);
        let err = registry.committed_duration(&ami).await.unwrap_err();
        let Error::InvalidDurationTag { instance, value } = err else {
            panic!("expected InvalidDurationTag");
        };
        assert_eq!(instance, ids[0]);
        assert_eq!(value, "soon");
    }

    #[tokio::test]
    async fn test_committed_duration_fails_on_missing_tag() {
        let cloud = Arc::new(FakeCloud::new());
        let ami = cloud.register_image("one");
        let ids = cloud
            .create_instances(&CreateSpec {
                image: ami.clone(),
                instance_type: "t2.micro".to_string(),
                count: 1,
                extra_disk_gb: 0,
                market: MarketSpec::OnDemand,
            })
            .await
            .unwrap();

        let registry = Registry::new(cloud);
        let err = registry.committed_duration(&ami).await.unwrap_err();
        let Error::InvalidDurationTag { instance, value } = err else {
            panic!("expected InvalidDurationTag");
        };
        assert_eq!(instance, ids[0]);
        assert_eq!(value, "<absent>");
    }

    #[tokio::test]
    async fn test_snapshots_are_independent() {
        let cloud = Arc::new(FakeCloud::new());
        let ami = cloud.register_image("one");
        launch_tagged(&cloud, &ami, "t2.micro", 2, Some(5)).await;

        let registry = Registry::new(cloud);
        let mut first = registry.active_instances(&ami).await.unwrap();
        first.next();
        first.next();
        assert!(first.next().is_none());

        // Draining the first snapshot does not affect a fresh one.
        let second = registry.active_instances(&ami).await.unwrap();
        assert_eq!(second.len(), 2);
    }
}
