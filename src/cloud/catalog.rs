//! Built-in on-demand price catalog
//!
//! Spot prices are read live from the provider; on-demand list prices move
//! slowly enough to ship as a table. Entries cover the instance types the
//! batch analyses actually request.

use crate::pricing::Region;

pub struct CatalogEntry {
    pub instance_type: &'static str,
    pub hourly_usd: f64,
    pub regions: &'static [Region],
}

const COMMON_REGIONS: &[Region] = &[
    Region::UsEast1,
    Region::UsEast2,
    Region::UsWest1,
    Region::UsWest2,
    Region::EuCentral1,
    Region::EuWest1,
    Region::ApSoutheast1,
];

const GPU_REGIONS: &[Region] = &[
    Region::UsEast1,
    Region::UsWest2,
    Region::EuWest1,
];

pub const ENTRIES: &[CatalogEntry] = &[
    CatalogEntry {
        instance_type: "t2.micro",
        hourly_usd: 0.0116,
        regions: COMMON_REGIONS,
    },
    CatalogEntry {
        instance_type: "t3.medium",
        hourly_usd: 0.0416,
        regions: COMMON_REGIONS,
    },
    CatalogEntry {
        instance_type: "m5.xlarge",
        hourly_usd: 0.192,
        regions: COMMON_REGIONS,
    },
    CatalogEntry {
        instance_type: "m5.4xlarge",
        hourly_usd: 0.768,
        regions: COMMON_REGIONS,
    },
    CatalogEntry {
        instance_type: "c5.4xlarge",
        hourly_usd: 0.68,
        regions: COMMON_REGIONS,
    },
    CatalogEntry {
        instance_type: "p2.xlarge",
        hourly_usd: 0.90,
        regions: GPU_REGIONS,
    },
    CatalogEntry {
        instance_type: "p3.2xlarge",
        hourly_usd: 3.06,
        regions: GPU_REGIONS,
    },
    CatalogEntry {
        instance_type: "g4dn.xlarge",
        hourly_usd: 0.526,
        regions: GPU_REGIONS,
    },
];

/// List price for the pair, if the type is catalogued in that region
pub fn on_demand_price(instance_type: &str, region: Region) -> Option<f64> {
    ENTRIES
        .iter()
        .find(|e| e.instance_type == instance_type && e.regions.contains(&region))
        .map(|e| e.hourly_usd)
}
