use dotenvy::dotenv;

use hackmate::config::AppConfig;
use hackmate::database::{self, hackathon_repo};
use hackmate::services::expiry_service::SweepReport;
use hackmate::services::ArbitrationEngine;

/// Settles every lapsed reservation and membership without waiting for traffic to
/// trigger the lazy sweep. Safe to run next to the server.
#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("sweep: invalid configuration: {}", e);
            std::process::exit(2);
        }
    };
    let pool = match database::connect(&config.database_url, config.max_connections).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("sweep: cannot open {}: {}", config.database_url, e);
            std::process::exit(1);
        }
    };
    let engine = ArbitrationEngine::new(pool, config.settings);

    let hackathon_ids = match hackathon_repo::list_hackathon_ids(engine.pool()).await {
        Ok(ids) => ids,
        Err(e) => {
            eprintln!("sweep: listing hackathons failed: {}", e);
            std::process::exit(1);
        }
    };

    let mut total = SweepReport::default();
    let mut failed = 0usize;
    for hackathon_id in &hackathon_ids {
        match engine.sweep(hackathon_id).await {
            Ok(report) => total.absorb(&report),
            Err(e) => {
                failed += 1;
                eprintln!("sweep: hackathon {} failed: {}", hackathon_id, e);
            }
        }
    }

    println!(
        "sweep: hackathons={}, reservations_expired={}, applications_expired={}, applications_confirmed={}, memberships_expired={}, failed={}",
        hackathon_ids.len(),
        total.reservations_expired,
        total.applications_expired,
        total.applications_confirmed,
        total.memberships_expired,
        failed
    );
    if failed > 0 {
        std::process::exit(1);
    }
}
