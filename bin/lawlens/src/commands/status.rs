use lawlens_core::{Clock, Config, ElectionRecord, Paths, SystemClock};
use lawlens_scheduler::ELECTION_KEY;
use lawlens_storage::get_json;

use super::open_store;

pub async fn run(paths: &Paths) -> anyhow::Result<()> {
    let config = Config::load_or_default(paths)?;
    let store = open_store(paths).await?;

    println!("lawlens status");
    println!("==============");
    println!();
    println!("Store:     {}", store.path().display());

    let threshold_ms = config.election.stale_threshold_ms as i64;
    match get_json::<ElectionRecord>(&*store, ELECTION_KEY).await {
        Ok(Some(record)) => {
            let age_ms = record.age_ms(SystemClock.now_ms());
            let state = if record.is_stale(SystemClock.now_ms(), threshold_ms) {
                "stale, next agent check takes over"
            } else {
                "active"
            };
            println!("Owner:     {}", record.owner_id);
            println!("Heartbeat: {:.1}s ago ({})", age_ms as f64 / 1000.0, state);
        }
        Ok(None) => println!("Owner:     none"),
        Err(e) => println!("Owner:     unreadable record ({})", e),
    }
    println!(
        "Timing:    heartbeat {}s, stale after {}s, ping every {}s",
        config.election.heartbeat_interval().as_secs(),
        threshold_ms / 1000,
        config.keep_alive.interval().as_secs()
    );
    Ok(())
}
