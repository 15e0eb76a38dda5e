//! batchfleet
//!
//! Provisions ephemeral EC2 instances for batch analysis jobs and tracks
//! them through tags alone — no database. Every instance is stamped at
//! creation with cost-tracking metadata (`PriceTracking`, `Timeout`, and
//! optional `group`/`analysis`/`job` ownership keys), and the registry
//! later reconstructs fleet state by querying the provider directly.
//!
//! # Key Properties
//!
//! - **Tags as the only store** - state survives process restarts because
//!   it lives on the provider's resources, not here
//! - **Fresh queries, no cache** - every registry call re-asks the provider
//! - **Injected client** - the provider client is a constructor parameter
//!   implemented by both the real EC2 adapter and an in-memory fake
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use batchfleet::{Ec2Cloud, Launcher, LaunchRequest, Registry, TracingSink};
//!
//! # async fn run() -> batchfleet::Result<()> {
//! let cloud = Arc::new(Ec2Cloud::new().await?);
//!
//! let request = LaunchRequest::new("t2.micro", "ami-0abcdef12345")
//!     .count(5)
//!     .extra_disk_gb(200)
//!     .duration_minutes(60)
//!     .analysis("analysis1")
//!     .job("job15__analysis1");
//!
//! let launcher = Launcher::new(cloud.clone());
//! let handles = launcher.launch(&request, &mut TracingSink).await?;
//!
//! let registry = Registry::new(cloud);
//! let committed = registry.committed_duration("ami-0abcdef12345").await?;
//! println!("{} launched, {} minute(s) committed", handles.len(), committed);
//! # Ok(())
//! # }
//! ```

pub mod cloud;
pub mod config;
pub mod error;
pub mod launch;
pub mod logging;
pub mod pricing;
pub mod registry;
pub mod tags;

pub use cloud::{CloudClient, Ec2Cloud, FakeCloud, InstanceFilter, InstanceId, InstanceRecord, InstanceState};
pub use config::AppConfig;
pub use error::{Error, Result};
pub use launch::{LaunchPlan, LaunchRequest, Launcher};
pub use logging::{LogSink, MemorySink, TracingSink};
pub use pricing::{Market, PriceQuote, PricingOracle, Region};
pub use registry::{ActiveInstances, Registry};
pub use tags::{Tag, TagSet};
