//! Driver configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::pricing::Region;
use crate::{Error, Result};

/// Settings the job driver supplies to the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Home region for provider clients
    #[serde(default = "default_region")]
    pub region: Region,
    /// Regions the launch planner may shop across
    #[serde(default = "default_candidates")]
    pub candidate_regions: Vec<Region>,
    #[serde(default = "default_instance_type")]
    pub default_instance_type: String,
    /// Image launched when the caller names none
    #[serde(default)]
    pub default_image: Option<String>,
}

fn default_region() -> Region {
    Region::DEFAULT
}

fn default_candidates() -> Vec<Region> {
    Region::ALL.to_vec()
}

fn default_instance_type() -> String {
    "t2.micro".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            candidate_regions: default_candidates(),
            default_instance_type: default_instance_type(),
            default_image: None,
        }
    }
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_instance_type.is_empty() {
            return Err(Error::Config("default_instance_type cannot be empty".into()));
        }
        if self.candidate_regions.is_empty() {
            return Err(Error::Config("candidate_regions cannot be empty".into()));
        }
        Ok(())
    }
}
