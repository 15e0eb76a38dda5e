//! Provider client layer
//!
//! The trait in [`client`] is the only way the rest of the crate talks to
//! the provider; [`aws`] is the production adapter and [`fake`] the
//! in-memory stand-in the test-suite injects.

pub mod aws;
pub mod catalog;
pub mod client;
pub mod fake;

pub use aws::Ec2Cloud;
pub use client::{
    CloudClient, CreateSpec, InstanceFilter, InstanceId, InstanceRecord, InstanceState,
    MarketSpec,
};
pub use fake::FakeCloud;
