//! In-memory provider used by the test-suite
//!
//! Behaves like a small, single-region EC2: sequential resource ids, image
//! registry, per-instance ordered tags, settable prices, and switchable
//! failure modes for the capacity and tagging paths. Freshly created
//! instances report `running` so launch-then-query tests need no waiting.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::cloud::client::{
    CloudClient, CreateSpec, InstanceFilter, InstanceId, InstanceRecord, InstanceState,
    MarketSpec,
};
use crate::pricing::{Market, Region};
use crate::tags::TagSet;
use crate::{Error, Result};

struct FakeInstance {
    record: InstanceRecord,
    market: MarketSpec,
}

#[derive(Default)]
struct Inner {
    instances: Vec<FakeInstance>,
    images: Vec<String>,
    prices: HashMap<(String, Region, Market), f64>,
    next_instance: u32,
    next_image: u32,
    fail_capacity: bool,
    fail_tagging: bool,
}

/// Stand-in [`CloudClient`] holding all state behind one lock
#[derive(Default)]
pub struct FakeCloud {
    inner: Mutex<Inner>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint an image id without snapshotting an instance (setup shortcut)
    pub fn register_image(&self, _name: &str) -> String {
        let mut inner = self.inner.lock();
        inner.next_image += 1;
        let id = format!("ami-{:08x}", inner.next_image);
        inner.images.push(id.clone());
        id
    }

    pub fn set_price(&self, instance_type: &str, region: Region, market: Market, hourly: f64) {
        self.inner
            .lock()
            .prices
            .insert((instance_type.to_string(), region, market), hourly);
    }

    /// Make the next create calls fail with `CapacityUnavailable`
    pub fn fail_capacity(&self, fail: bool) {
        self.inner.lock().fail_capacity = fail;
    }

    /// Make the next tag calls fail, leaving created instances untagged
    pub fn fail_tagging(&self, fail: bool) {
        self.inner.lock().fail_tagging = fail;
    }

    /// Every record the provider currently holds, any state
    pub fn records(&self) -> Vec<InstanceRecord> {
        self.inner
            .lock()
            .instances
            .iter()
            .map(|i| i.record.clone())
            .collect()
    }

    /// Market the instance was created under
    pub fn market_of(&self, id: &InstanceId) -> Option<MarketSpec> {
        self.inner
            .lock()
            .instances
            .iter()
            .find(|i| &i.record.id == id)
            .map(|i| i.market)
    }
}

#[async_trait]
impl CloudClient for FakeCloud {
    async fn create_instances(&self, spec: &CreateSpec) -> Result<Vec<InstanceId>> {
        let mut inner = self.inner.lock();

        if inner.fail_capacity {
            return Err(Error::CapacityUnavailable(format!(
                "no {} capacity",
                spec.instance_type
            )));
        }
        if !inner.images.contains(&spec.image) {
            return Err(Error::ImageNotFound(spec.image.clone()));
        }

        let mut ids = Vec::with_capacity(spec.count as usize);
        for _ in 0..spec.count {
            inner.next_instance += 1;
            let id = InstanceId::new(format!("i-{:08x}", inner.next_instance));
            inner.instances.push(FakeInstance {
                record: InstanceRecord {
                    id: id.clone(),
                    image: spec.image.clone(),
                    instance_type: spec.instance_type.clone(),
                    state: InstanceState::Running,
                    tags: TagSet::new(),
                },
                market: spec.market,
            });
            ids.push(id);
        }

        Ok(ids)
    }

    async fn create_image(&self, instance: &InstanceId, _name: &str) -> Result<String> {
        let mut inner = self.inner.lock();

        if !inner.instances.iter().any(|i| &i.record.id == instance) {
            return Err(Error::InstanceNotFound(instance.to_string()));
        }

        inner.next_image += 1;
        let id = format!("ami-{:08x}", inner.next_image);
        inner.images.push(id.clone());
        Ok(id)
    }

    async fn tag_instances(&self, instances: &[InstanceId], tags: &TagSet) -> Result<()> {
        let mut inner = self.inner.lock();

        if inner.fail_tagging {
            return Err(Error::Provider("tag service rejected the request".into()));
        }

        for id in instances {
            let Some(fake) = inner.instances.iter_mut().find(|i| &i.record.id == id) else {
                return Err(Error::InstanceNotFound(id.to_string()));
            };
            for tag in tags {
                fake.record.tags.set(&tag.key, tag.value.clone());
            }
        }

        Ok(())
    }

    async fn describe_instances(&self, filter: &InstanceFilter) -> Result<Vec<InstanceRecord>> {
        Ok(self
            .inner
            .lock()
            .instances
            .iter()
            .filter(|i| filter.matches(&i.record))
            .map(|i| i.record.clone())
            .collect())
    }

    async fn terminate_instances(&self, instances: &[InstanceId]) -> Result<()> {
        let mut inner = self.inner.lock();

        for id in instances {
            let Some(fake) = inner.instances.iter_mut().find(|i| &i.record.id == id) else {
                return Err(Error::InstanceNotFound(id.to_string()));
            };
            fake.record.state = InstanceState::Terminated;
        }

        Ok(())
    }

    async fn get_price(
        &self,
        instance_type: &str,
        region: Region,
        market: Market,
    ) -> Result<f64> {
        self.inner
            .lock()
            .prices
            .get(&(instance_type.to_string(), region, market))
            .copied()
            .ok_or_else(|| Error::PriceUnavailable {
                instance_type: instance_type.to_string(),
                region: region.to_string(),
            })
    }

    async fn list_regions(&self) -> Result<Vec<Region>> {
        Ok(Region::ALL.to_vec())
    }
}
