//! Error types for batchfleet

use thiserror::Error;

use crate::cloud::client::InstanceId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no price available for {instance_type} in {region}")]
    PriceUnavailable {
        instance_type: String,
        region: String,
    },

    #[error("capacity unavailable: {0}")]
    CapacityUnavailable(String),

    #[error("tagging failed for {} instance(s): {reason}", .instances.len())]
    TaggingFailed {
        /// Handles of the instances that exist but carry no tags.
        instances: Vec<InstanceId>,
        reason: String,
    },

    #[error("invalid Timeout tag on {instance}: {value:?}")]
    InvalidDurationTag { instance: InstanceId, value: String },

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if the caller may recover by falling back to the default region
    pub fn is_price_unavailable(&self) -> bool {
        matches!(self, Error::PriceUnavailable { .. })
    }

    /// Map a provider error code to the taxonomy
    pub fn from_aws_code(code: &str, message: &str) -> Self {
        match code {
            "InsufficientInstanceCapacity" | "SpotMaxPriceTooLow" => {
                Error::CapacityUnavailable(message.to_string())
            }
            "InvalidAMIID.NotFound" | "InvalidAMIID.Malformed" => {
                Error::ImageNotFound(message.to_string())
            }
            "InvalidInstanceID.NotFound" | "InvalidInstanceID.Malformed" => {
                Error::InstanceNotFound(message.to_string())
            }
            _ => Error::Provider(format!("{}: {}", code, message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_aws_code_capacity() {
        let err = Error::from_aws_code("InsufficientInstanceCapacity", "no t2.micro left");
        assert!(matches!(err, Error::CapacityUnavailable(_)));
    }

    #[test]
    fn test_from_aws_code_image() {
        let err = Error::from_aws_code("InvalidAMIID.NotFound", "ami-123 does not exist");
        assert!(matches!(err, Error::ImageNotFound(_)));
        assert!(err.to_string().contains("ami-123"));
    }

    #[test]
    fn test_from_aws_code_other() {
        let err = Error::from_aws_code("RequestLimitExceeded", "slow down");
        assert!(matches!(err, Error::Provider(_)));
    }

    #[test]
    fn test_price_unavailable_recoverable() {
        let err = Error::PriceUnavailable {
            instance_type: "p2.xlarge".into(),
            region: "us-east-1".into(),
        };
        assert!(err.is_price_unavailable());
        assert!(!Error::CapacityUnavailable("x".into()).is_price_unavailable());
    }
}
