//! 5G FAPI Translation Process
//!
//! Hosts the FAPI <-> IAPI translation layer between a MAC and a vendor
//! PHY: loads the configuration, builds the shared buffer pool and both
//! WLS links, then runs the mac2phy, phy2mac and URLLC workers until
//! Ctrl-C.

mod config;
mod loopback;
mod workers;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use interfaces::wls::{BufferPool, HeapRegion, LocalWls, MemoryRegion, ShmRegion, FREE_BLOCKS_PER_PHY};
use layers::PhyContext;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{FapiConfig, RegionBackend};
use crate::loopback::Loopback;
use crate::workers::Workers;

const ATTACH_TIMEOUT: Duration = Duration::from_secs(5);

/// 5G FAPI to vendor PHY translation layer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (TOML or YAML)
    #[arg(short = 'f', long = "cfg", default_value = "config/nr5g_fapi.toml")]
    cfg: String,

    /// Log level (trace, debug, info, warn, error); overrides [logger] level
    #[arg(short, long)]
    log_level: Option<String>,

    /// Run against the in-process echo PHY and scripted MAC
    #[arg(long)]
    loopback: bool,

    /// Cells the scripted MAC brings up in loopback mode
    #[arg(long, default_value = "1")]
    cells: u8,
}

fn init_logging(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();
}

fn build_pool(config: &FapiConfig) -> Result<Arc<BufferPool>> {
    let wls = &config.wls;
    let region: Box<dyn MemoryRegion> = match wls.backend {
        RegionBackend::Heap => Box::new(HeapRegion::new(wls.shmem_size)?),
        RegionBackend::Shm => Box::new(ShmRegion::open(&wls.device_name, wls.shmem_size)?),
    };
    let pool = BufferPool::new(region, wls.block_size)?;
    info!("WLS pool on {:?} '{}': {} blocks of {} bytes",
          wls.backend, wls.device_name, pool.num_blocks(), pool.block_size());
    Ok(pool)
}

fn dump_stats(ctx: &PhyContext, file: &str) {
    match ctx.stats_snapshot().write_to(Path::new(file)) {
        Ok(()) => info!("statistics written to {}", file),
        Err(e) => error!("cannot write statistics to {}: {}", file, e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = FapiConfig::from_file(&args.cfg)?;
    init_logging(args.log_level.as_deref().unwrap_or(&config.logger.level));

    info!("Starting 5G FAPI translation layer");
    info!("Configuration file: {}", args.cfg);
    for (name, worker) in config.workers() {
        info!("  {}: core {} policy {} priority {}",
              name, worker.core_id, worker.thread_sched_policy, worker.thread_priority);
    }
    if !config.dpdk.memory_zone.is_empty() {
        info!("  dpdk memory zone {} iova mode {}", config.dpdk.memory_zone, config.dpdk.iova_mode);
    }

    if !args.loopback {
        bail!("this build links only the in-process WLS link; start with --loopback");
    }

    let pool = build_pool(&config)?;
    let (mac_ours, mac_theirs) = LocalWls::pair("mac", config.wls.ring_depth);
    let (phy_ours, phy_theirs) = LocalWls::pair("phy", config.wls.ring_depth);
    let ctx = Arc::new(PhyContext::new(Arc::clone(&pool), Arc::new(mac_ours), Arc::new(phy_ours)));

    let peers = Loopback::start(&pool, mac_theirs, phy_theirs, args.cells)?;
    ctx.mac.ready(Some(ATTACH_TIMEOUT)).context("MAC did not attach")?;
    ctx.phy.ready(Some(ATTACH_TIMEOUT)).context("PHY did not attach")?;

    let posted = ctx.phy.add_blocks_to_ul(FREE_BLOCKS_PER_PHY)?;
    if posted == 0 {
        warn!("no UL blocks posted to the PHY");
    }

    let workers = Workers::start(&ctx, config.mac2phy_worker, config.phy2mac_worker, config.urllc_worker)?;
    info!("FAPI translation layer running");

    let stats_handle = (config.stats.interval_secs > 0).then(|| {
        let ctx = Arc::clone(&ctx);
        let period = Duration::from_secs(config.stats.interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                ctx.log_stats();
                let pool = ctx.pool().stats();
                info!("[STATS] pool: {:?}, active phys {}", pool, ctx.num_phy_instance());
            }
        })
    });

    tokio::signal::ctrl_c().await.context("cannot listen for Ctrl-C")?;
    info!("Received shutdown signal");

    if let Some(handle) = stats_handle {
        handle.abort();
    }
    let ctx_for_stop = Arc::clone(&ctx);
    tokio::task::spawn_blocking(move || {
        workers.stop(&ctx_for_stop);
        let slots = peers.slots();
        peers.stop();
        info!("[LOOPBACK] {} SLOT.indications reached the MAC", slots);
    })
    .await?;

    ctx.mac.flush_deferred();
    ctx.phy.flush_deferred();
    ctx.log_stats();
    if let Some(file) = &config.stats.file {
        dump_stats(&ctx, file);
    }

    info!("FAPI translation layer shutdown complete");
    Ok(())
}
