//! batchfleet CLI

use clap::{Parser, Subcommand};

use batchfleet::{
    AppConfig, CloudClient, Ec2Cloud, LaunchRequest, Launcher, LogSink, Market, PricingOracle,
    Region, Registry,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "batchfleet")]
#[command(about = "Ephemeral EC2 fleets with tag-based cost tracking", long_about = None)]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch and tag a batch of instances
    Launch {
        /// Image to boot from
        #[arg(short, long)]
        image: String,
        /// Instance type (default from config)
        #[arg(short = 't', long)]
        instance_type: Option<String>,
        /// Number of instances
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,
        /// Extra root disk beyond the image default, GiB
        #[arg(long, default_value = "0")]
        disk: u32,
        /// Committed runtime in minutes; selects spot capacity
        #[arg(short, long)]
        duration: Option<u32>,
        /// Owning user group tag
        #[arg(long)]
        group: Option<String>,
        /// Analysis identifier tag
        #[arg(long)]
        analysis: Option<String>,
        /// Job identifier tag
        #[arg(long)]
        job: Option<String>,
    },
    /// List running instances for an image
    Instances {
        /// Image id
        image: String,
    },
    /// Total committed duration for an image, in minutes
    Duration {
        /// Image id
        image: String,
    },
    /// Quote a price for an instance type
    Price {
        /// Instance type
        instance_type: String,
        /// Region (default from config)
        #[arg(short, long)]
        region: Option<Region>,
        /// Quote the spot market instead of on-demand
        #[arg(long)]
        spot: bool,
    },
    /// Pick the cheapest candidate region for a launch
    Plan {
        /// Instance type
        instance_type: String,
        /// Committed runtime in minutes; selects the spot market
        #[arg(short, long)]
        duration: Option<u32>,
    },
    /// Terminate every running instance of an image
    Terminate {
        /// Image id
        image: String,
    },
    /// List regions the provider reports
    Regions,
}

/// Sink that narrates launch progress to stdout
struct StdoutSink;

impl LogSink for StdoutSink {
    fn append(&mut self, message: &str) {
        println!("  {}", message);
    }

    fn flush(&mut self) {}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Launch {
            image,
            instance_type,
            count,
            disk,
            duration,
            group,
            analysis,
            job,
        } => {
            let instance_type =
                instance_type.unwrap_or_else(|| config.default_instance_type.clone());
            cmd_launch(
                &config,
                &instance_type,
                &image,
                count,
                disk,
                duration,
                group,
                analysis,
                job,
            )
            .await?;
        }
        Commands::Instances { image } => {
            cmd_instances(&config, &image).await?;
        }
        Commands::Duration { image } => {
            cmd_duration(&config, &image).await?;
        }
        Commands::Price {
            instance_type,
            region,
            spot,
        } => {
            cmd_price(&config, &instance_type, region, spot).await?;
        }
        Commands::Plan {
            instance_type,
            duration,
        } => {
            cmd_plan(&config, &instance_type, duration).await?;
        }
        Commands::Terminate { image } => {
            cmd_terminate(&config, &image).await?;
        }
        Commands::Regions => {
            cmd_regions(&config).await?;
        }
    }

    Ok(())
}

async fn client(config: &AppConfig) -> Result<Arc<Ec2Cloud>, Box<dyn std::error::Error>> {
    Ok(Arc::new(Ec2Cloud::with_region(config.region).await?))
}

#[allow(clippy::too_many_arguments)]
async fn cmd_launch(
    config: &AppConfig,
    instance_type: &str,
    image: &str,
    count: u32,
    disk: u32,
    duration: Option<u32>,
    group: Option<String>,
    analysis: Option<String>,
    job: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Launching {} x {} from {}...", count, instance_type, image);

    let mut request = LaunchRequest::new(instance_type, image)
        .count(count)
        .extra_disk_gb(disk);
    if let Some(minutes) = duration {
        request = request.duration_minutes(minutes);
    }
    if let Some(g) = group {
        request = request.group(g);
    }
    if let Some(a) = analysis {
        request = request.analysis(a);
    }
    if let Some(j) = job {
        request = request.job(j);
    }

    let launcher = Launcher::new(client(config).await?);
    let handles = launcher.launch(&request, &mut StdoutSink).await?;

    println!("\nLaunched:");
    for handle in handles {
        println!("  {}", handle);
    }

    Ok(())
}

async fn cmd_instances(config: &AppConfig, image: &str) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::new(client(config).await?);
    let instances: Vec<_> = registry.active_instances(image).await?.collect();

    if instances.is_empty() {
        println!("No running instances for {}.", image);
        return Ok(());
    }

    println!("{:<22} {:<14} {:<10} {:<8}", "ID", "TYPE", "STATE", "TIMEOUT");
    println!("{}", "-".repeat(58));
    for record in instances {
        println!(
            "{:<22} {:<14} {:<10} {:<8}",
            record.id,
            record.instance_type,
            record.state,
            record.tags.get("Timeout").unwrap_or("-")
        );
    }

    Ok(())
}

async fn cmd_duration(config: &AppConfig, image: &str) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::new(client(config).await?);
    let count = registry.count(image).await?;
    let total = registry.committed_duration(image).await?;

    println!("{} running instance(s), {} minute(s) committed", count, total);
    Ok(())
}

async fn cmd_price(
    config: &AppConfig,
    instance_type: &str,
    region: Option<Region>,
    spot: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let market = if spot { Market::Spot } else { Market::OnDemand };
    let region = region.unwrap_or(config.region);

    let oracle = PricingOracle::new(client(config).await?);
    match oracle.price_for(instance_type, region, market).await {
        Ok(quote) => println!(
            "{} in {} ({}): ${:.4}/hr",
            quote.instance_type, quote.region, quote.market, quote.hourly_usd
        ),
        Err(e) => println!("No quote: {}", e),
    }

    Ok(())
}

async fn cmd_plan(
    config: &AppConfig,
    instance_type: &str,
    duration: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let market = if duration.is_some() {
        Market::Spot
    } else {
        Market::OnDemand
    };

    let oracle = PricingOracle::new(client(config).await?);
    let region = oracle
        .best_region_or_default(instance_type, market, &config.candidate_regions)
        .await?;
    let quote = match oracle.price_for(instance_type, region, market).await {
        Ok(q) => Some(q),
        Err(e) if e.is_price_unavailable() => None,
        Err(e) => return Err(e.into()),
    };

    println!("Market:  {}", market);
    println!("Region:  {} ({})", region, region.display_name());
    match quote {
        Some(quote) => println!("Price:   ${:.4}/hr", quote.hourly_usd),
        None => println!("Price:   no quote (default region fallback)"),
    }

    Ok(())
}

async fn cmd_terminate(config: &AppConfig, image: &str) -> Result<(), Box<dyn std::error::Error>> {
    let cloud = client(config).await?;

    let filter = Registry::running_filter(image);
    let records = cloud.describe_instances(&filter).await?;
    if records.is_empty() {
        println!("Nothing running for {}.", image);
        return Ok(());
    }

    let ids: Vec<_> = records.into_iter().map(|r| r.id).collect();
    println!("Terminating {} instance(s)...", ids.len());
    cloud.terminate_instances(&ids).await?;

    for id in ids {
        println!("  {} terminated", id);
    }

    Ok(())
}

async fn cmd_regions(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let cloud = client(config).await?;
    for region in cloud.list_regions().await? {
        println!("{:<16} {}", region, region.display_name());
    }
    Ok(())
}
