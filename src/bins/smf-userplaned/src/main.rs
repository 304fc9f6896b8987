//! SMF user plane daemon
//!
//! Thin process-lifetime holder around the user plane core: loads the
//! declarative topology from YAML, builds the shared context and keeps
//! it alive until shutdown. PFCP association and the admin HTTP surface
//! are wired in by their respective collaborators; this binary only
//! drives the initial association kick-off and owns the cancel flag
//! those tasks watch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use smf_userplane::topology::PendingAssociation;
use smf_userplane::{Config, UpfAssociator, UpfStatus, UserPlaneContext};

/// SMF user plane topology and UE IP allocation daemon
#[derive(Parser, Debug)]
#[command(name = "smf-userplaned")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "SMF user plane topology core", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, default_value = "/etc/smf/userplane.yaml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'e', long, default_value = "info")]
    log_level: String,
}

/// Marks newly added UPFs as `Associating` and leaves completion to the
/// PFCP stack, which flips the status once the association setup
/// response arrives.
struct AssociationDriver {
    ctx: Arc<UserPlaneContext>,
}

impl UpfAssociator for AssociationDriver {
    fn associate(&self, upf: PendingAssociation, cancel: Arc<AtomicBool>) {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        log::info!(
            "starting PFCP association with UPF [{}] ({})",
            upf.name,
            upf.node_id
        );
        self.ctx.set_upf_status(&upf.name, UpfStatus::Associating);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .parse_filters(&args.log_level)
        .init();

    let content = std::fs::read_to_string(&args.config)
        .with_context(|| format!("failed to read configuration file {}", args.config))?;
    let config: Config = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse configuration file {}", args.config))?;
    config.validate().context("invalid configuration")?;

    let ctx = Arc::new(
        UserPlaneContext::from_config(&config.user_plane_information)
            .context("failed to build user plane topology")?,
    );
    {
        let topology = ctx.read();
        log::info!(
            "user plane topology ready: {} nodes ({} UPF, {} AN)",
            topology.len(),
            topology.upf_names().count(),
            topology.an_names().count()
        );
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let driver = AssociationDriver { ctx: Arc::clone(&ctx) };
    let pending = ctx.read().upfs_with_status(UpfStatus::NotAssociated);
    for upf in pending {
        driver.associate(upf, Arc::clone(&cancel));
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    log::info!("shutting down");
    cancel.store(true, Ordering::Relaxed);

    Ok(())
}
