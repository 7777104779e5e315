//! Two pools with different handlers, sizes and lifecycles.
//!
//! Run with `RUST_LOG=multipool=debug` for per-pool logs.

use std::time::Duration;

use multipool::{logging, ManagerConfig, PoolManager, PoolResult};
use tracing::info;

#[tokio::main]
async fn main() -> PoolResult<()> {
    logging::init_development();

    let manager = PoolManager::<String>::new(ManagerConfig::default());

    manager.create("thumbnails", 4, 64, true)?;
    manager.set_handler("thumbnails", |image: String| {
        std::thread::sleep(Duration::from_millis(20));
        info!(%image, "thumbnail rendered");
        true
    })?;

    manager.create("emails", 1, 8, false)?;
    manager.set_handler("emails", |address: String| {
        let valid = address.contains('@');
        info!(%address, valid, "email sent");
        valid
    })?;

    manager.start("thumbnails")?;
    manager.start("emails")?;

    // Emails queue up while paused and go out after resume.
    manager.pause("emails")?;
    for n in 0..20 {
        manager.submit("thumbnails", format!("img-{n:03}.png")).await?;
    }
    for address in ["ada@example.com", "not-an-address", "grace@example.com"] {
        manager.submit("emails", address.to_string()).await?;
    }

    manager.add_workers("thumbnails", 2)?;
    manager.resume("emails")?;

    manager.drain("thumbnails")?;
    manager.drain("emails")?;
    manager.wait_all().await?;

    for id in manager.pool_ids() {
        let info = manager.info(id.as_str())?;
        info!(
            pool = %info.id,
            completed = info.stats.completed,
            failed = info.stats.failed,
            uptime = ?info.uptime,
            "pool finished"
        );
    }
    Ok(())
}
