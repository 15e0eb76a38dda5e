//! Provider client trait and the record types it traffics in
//!
//! The client is always a constructor parameter — both the real EC2 adapter
//! and the in-memory fake implement [`CloudClient`], so nothing in the crate
//! ever reaches for a process-wide session.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::pricing::{Market, Region};
use crate::tags::TagSet;
use crate::Result;

/// Opaque identifier the provider returns on creation.
///
/// The crate hands these to the caller and never retains them past the
/// launch call that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Provider-reported runtime state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceState {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
}

impl InstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::ShuttingDown => "shutting-down",
            InstanceState::Terminated => "terminated",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One instance as the provider currently reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub id: InstanceId,
    pub image: String,
    pub instance_type: String,
    pub state: InstanceState,
    pub tags: TagSet,
}

/// Capacity market to request at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketSpec {
    /// Standard capacity, no runtime bound on the provider side
    OnDemand,
    /// Time-bounded low-cost capacity
    Spot { block_minutes: u32 },
}

impl MarketSpec {
    pub fn market(&self) -> Market {
        match self {
            MarketSpec::OnDemand => Market::OnDemand,
            MarketSpec::Spot { .. } => Market::Spot,
        }
    }
}

/// Parameters for one create call
#[derive(Debug, Clone)]
pub struct CreateSpec {
    pub image: String,
    pub instance_type: String,
    pub count: u32,
    /// Root volume size to request on top of the image default, in GiB
    pub extra_disk_gb: u32,
    pub market: MarketSpec,
}

/// Server-side filter for describe queries.
///
/// These are the primitives a cleanup driver composes: by image, by state,
/// by tag — the same query surface the registry itself is built on.
#[derive(Debug, Clone, Default)]
pub struct InstanceFilter {
    pub image: Option<String>,
    pub states: Vec<InstanceState>,
    pub tags: Vec<(String, String)>,
}

impl InstanceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn state(mut self, state: InstanceState) -> Self {
        self.states.push(state);
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Whether a record passes this filter
    pub fn matches(&self, record: &InstanceRecord) -> bool {
        if let Some(ref image) = self.image {
            if &record.image != image {
                return false;
            }
        }
        if !self.states.is_empty() && !self.states.contains(&record.state) {
            return false;
        }
        self.tags
            .iter()
            .all(|(k, v)| record.tags.get(k) == Some(v.as_str()))
    }
}

/// Remote compute API surface this crate consumes.
///
/// Create has at-least-once semantics: once the provider accepts the call
/// the instances exist and must be reconciled by the caller even if the
/// surrounding operation is abandoned.
#[async_trait]
pub trait CloudClient: Send + Sync {
    async fn create_instances(&self, spec: &CreateSpec) -> Result<Vec<InstanceId>>;

    /// Register an image from an instance. Setup tooling only.
    async fn create_image(&self, instance: &InstanceId, name: &str) -> Result<String>;

    async fn tag_instances(&self, instances: &[InstanceId], tags: &TagSet) -> Result<()>;

    async fn describe_instances(&self, filter: &InstanceFilter) -> Result<Vec<InstanceRecord>>;

    async fn terminate_instances(&self, instances: &[InstanceId]) -> Result<()>;

    async fn get_price(&self, instance_type: &str, region: Region, market: Market)
        -> Result<f64>;

    async fn list_regions(&self) -> Result<Vec<Region>>;
}
