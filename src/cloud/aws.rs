//! EC2 adapter for [`CloudClient`]

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ec2::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types::{
    BlockDeviceMapping, EbsBlockDevice, Filter, InstanceMarketOptions, InstanceStateName,
    InstanceType, MarketType, SpotInstanceType, SpotMarketOptions, Tag as AwsTag,
};
use aws_sdk_ec2::Client;
use tracing::{debug, info};

use crate::cloud::catalog;
use crate::cloud::client::{
    CloudClient, CreateSpec, InstanceFilter, InstanceId, InstanceRecord, InstanceState,
    MarketSpec,
};
use crate::pricing::{Market, Region};
use crate::tags::{Tag, TagSet};
use crate::{Error, Result};

/// Root device EC2 images use unless the image says otherwise
const DEFAULT_ROOT_DEVICE: &str = "/dev/sda1";
const DEFAULT_ROOT_GB: i32 = 8;

/// Production provider client over `aws-sdk-ec2`
pub struct Ec2Cloud {
    client: Client,
    config: aws_config::SdkConfig,
    region: Region,
}

impl Ec2Cloud {
    /// Create a client from ambient credentials and region
    pub async fn new() -> Result<Self> {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let region = config
            .region()
            .and_then(|r| Region::parse(r.as_ref()))
            .unwrap_or(Region::DEFAULT);

        Ok(Self {
            client: Client::new(&config),
            config,
            region,
        })
    }

    /// Create a client pinned to a specific region
    pub async fn with_region(region: Region) -> Result<Self> {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_ec2::config::Region::new(region.as_str()))
            .load()
            .await;

        Ok(Self {
            client: Client::new(&config),
            config,
            region,
        })
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Client bound to `region`, reusing the loaded credentials
    fn client_for(&self, region: Region) -> Client {
        if region == self.region {
            return self.client.clone();
        }
        let conf = aws_sdk_ec2::config::Builder::from(&self.config)
            .region(aws_sdk_ec2::config::Region::new(region.as_str()))
            .build();
        Client::from_conf(conf)
    }

    /// Root device name and size the image boots with
    async fn root_volume(&self, image: &str) -> Result<(String, i32)> {
        let resp = self
            .client
            .describe_images()
            .image_ids(image)
            .send()
            .await
            .map_err(|e| map_sdk_err("describe_images", e))?;

        let img = resp
            .images()
            .first()
            .ok_or_else(|| Error::ImageNotFound(image.to_string()))?;

        let device = img
            .root_device_name()
            .unwrap_or(DEFAULT_ROOT_DEVICE)
            .to_string();
        let size = img
            .block_device_mappings()
            .iter()
            .find(|m| m.device_name() == Some(device.as_str()))
            .and_then(|m| m.ebs())
            .and_then(|e| e.volume_size())
            .unwrap_or(DEFAULT_ROOT_GB);

        Ok((device, size))
    }
}

#[async_trait]
impl CloudClient for Ec2Cloud {
    async fn create_instances(&self, spec: &CreateSpec) -> Result<Vec<InstanceId>> {
        debug!(
            image = %spec.image,
            instance_type = %spec.instance_type,
            count = spec.count,
            "requesting instances"
        );

        let mut req = self
            .client
            .run_instances()
            .image_id(&spec.image)
            .instance_type(InstanceType::from(spec.instance_type.as_str()))
            .min_count(spec.count as i32)
            .max_count(spec.count as i32)
            .client_token(uuid::Uuid::new_v4().to_string());

        if spec.extra_disk_gb > 0 {
            let (device, base_gb) = self.root_volume(&spec.image).await?;
            req = req.block_device_mappings(
                BlockDeviceMapping::builder()
                    .device_name(device)
                    .ebs(
                        EbsBlockDevice::builder()
                            .volume_size(base_gb + spec.extra_disk_gb as i32)
                            .build(),
                    )
                    .build(),
            );
        }

        if let MarketSpec::Spot { block_minutes } = spec.market {
            req = req.instance_market_options(
                InstanceMarketOptions::builder()
                    .market_type(MarketType::Spot)
                    .spot_options(
                        SpotMarketOptions::builder()
                            .spot_instance_type(SpotInstanceType::OneTime)
                            .block_duration_minutes(block_minutes as i32)
                            .build(),
                    )
                    .build(),
            );
        }

        let resp = req
            .send()
            .await
            .map_err(|e| map_sdk_err("run_instances", e))?;

        let ids: Vec<InstanceId> = resp
            .instances()
            .iter()
            .filter_map(|i| i.instance_id())
            .map(InstanceId::from)
            .collect();

        if ids.len() != spec.count as usize {
            return Err(Error::Provider(format!(
                "requested {} instances, provider returned {}",
                spec.count,
                ids.len()
            )));
        }

        info!(count = ids.len(), instance_type = %spec.instance_type, "instances created");
        Ok(ids)
    }

    async fn create_image(&self, instance: &InstanceId, name: &str) -> Result<String> {
        let resp = self
            .client
            .create_image()
            .instance_id(instance.as_str())
            .name(name)
            .send()
            .await
            .map_err(|e| map_sdk_err("create_image", e))?;

        resp.image_id()
            .map(str::to_string)
            .ok_or_else(|| Error::Provider("create_image returned no image id".into()))
    }

    async fn tag_instances(&self, instances: &[InstanceId], tags: &TagSet) -> Result<()> {
        let mut req = self.client.create_tags();
        for id in instances {
            req = req.resources(id.as_str());
        }
        for tag in tags {
            req = req.tags(AwsTag::builder().key(&tag.key).value(&tag.value).build());
        }

        req.send()
            .await
            .map_err(|e| map_sdk_err("create_tags", e))?;
        Ok(())
    }

    async fn describe_instances(&self, filter: &InstanceFilter) -> Result<Vec<InstanceRecord>> {
        let filters = to_aws_filters(filter);
        let resp = self
            .client
            .describe_instances()
            .set_filters((!filters.is_empty()).then_some(filters))
            .send()
            .await
            .map_err(|e| map_sdk_err("describe_instances", e))?;

        let mut records = Vec::new();
        for reservation in resp.reservations() {
            for inst in reservation.instances() {
                let Some(id) = inst.instance_id() else { continue };
                let Some(state) = inst.state().and_then(|s| s.name()).and_then(map_state)
                else {
                    debug!(instance = id, "unreadable state, skipping");
                    continue;
                };

                let tags: Vec<Tag> = inst
                    .tags()
                    .iter()
                    .filter_map(|t| match (t.key(), t.value()) {
                        (Some(k), Some(v)) => Some(Tag::new(k, v)),
                        _ => None,
                    })
                    .collect();

                records.push(InstanceRecord {
                    id: InstanceId::new(id),
                    image: inst.image_id().unwrap_or_default().to_string(),
                    instance_type: inst
                        .instance_type()
                        .map(|t| t.as_str().to_string())
                        .unwrap_or_default(),
                    state,
                    tags: TagSet::from(tags),
                });
            }
        }

        Ok(records)
    }

    async fn terminate_instances(&self, instances: &[InstanceId]) -> Result<()> {
        let ids: Vec<String> = instances.iter().map(|i| i.as_str().to_string()).collect();
        self.client
            .terminate_instances()
            .set_instance_ids(Some(ids))
            .send()
            .await
            .map_err(|e| map_sdk_err("terminate_instances", e))?;
        Ok(())
    }

    async fn get_price(
        &self,
        instance_type: &str,
        region: Region,
        market: Market,
    ) -> Result<f64> {
        match market {
            Market::OnDemand => catalog::on_demand_price(instance_type, region).ok_or_else(|| {
                Error::PriceUnavailable {
                    instance_type: instance_type.to_string(),
                    region: region.to_string(),
                }
            }),
            Market::Spot => {
                let resp = self
                    .client_for(region)
                    .describe_spot_price_history()
                    .instance_types(InstanceType::from(instance_type))
                    .product_descriptions("Linux/UNIX")
                    .max_results(1)
                    .send()
                    .await
                    .map_err(|e| map_sdk_err("describe_spot_price_history", e))?;

                resp.spot_price_history()
                    .first()
                    .and_then(|p| p.spot_price())
                    .and_then(|p| p.parse::<f64>().ok())
                    .ok_or_else(|| Error::PriceUnavailable {
                        instance_type: instance_type.to_string(),
                        region: region.to_string(),
                    })
            }
        }
    }

    async fn list_regions(&self) -> Result<Vec<Region>> {
        let resp = self
            .client
            .describe_regions()
            .send()
            .await
            .map_err(|e| map_sdk_err("describe_regions", e))?;

        Ok(resp
            .regions()
            .iter()
            .filter_map(|r| r.region_name().and_then(Region::parse))
            .collect())
    }
}

/// Translate our filter into the provider's server-side form
fn to_aws_filters(filter: &InstanceFilter) -> Vec<Filter> {
    let mut filters = Vec::new();

    if let Some(ref image) = filter.image {
        filters.push(Filter::builder().name("image-id").values(image).build());
    }

    if !filter.states.is_empty() {
        let mut f = Filter::builder().name("instance-state-name");
        for state in &filter.states {
            f = f.values(state.as_str());
        }
        filters.push(f.build());
    }

    for (key, value) in &filter.tags {
        filters.push(
            Filter::builder()
                .name(format!("tag:{}", key))
                .values(value)
                .build(),
        );
    }

    filters
}

fn map_state(name: &InstanceStateName) -> Option<InstanceState> {
    match name {
        InstanceStateName::Pending => Some(InstanceState::Pending),
        InstanceStateName::Running => Some(InstanceState::Running),
        InstanceStateName::ShuttingDown => Some(InstanceState::ShuttingDown),
        InstanceStateName::Terminated => Some(InstanceState::Terminated),
        InstanceStateName::Stopping => Some(InstanceState::Stopping),
        InstanceStateName::Stopped => Some(InstanceState::Stopped),
        _ => None,
    }
}

fn map_sdk_err<E>(context: &str, err: SdkError<E>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match err.code() {
        Some(code) => {
            let message = err.message().unwrap_or(context).to_string();
            Error::from_aws_code(code, &message)
        }
        None => Error::Provider(format!("{}: {}", context, err)),
    }
}
