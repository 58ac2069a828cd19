use lawlens_agent::{AgentHandle, LogPresentation, TabAgent};
use lawlens_core::{AgentCommand, Config, Paths, SystemClock};
use lawlens_scheduler::HttpPinger;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::open_store;

/// Settings are keyed by the page's host name.
pub fn domain_from_url(url: &str) -> anyhow::Result<String> {
    let parsed = Url::parse(url).map_err(|e| anyhow::anyhow!("Invalid URL '{}': {}", url, e))?;
    parsed
        .host_str()
        .map(|h| h.to_string())
        .ok_or_else(|| anyhow::anyhow!("URL '{}' has no host", url))
}

pub async fn run(
    paths: &Paths,
    url: String,
    domain: Option<String>,
    title: Option<String>,
) -> anyhow::Result<()> {
    let config = Config::load_or_default(paths)?;
    let domain = match domain {
        Some(d) => d,
        None => domain_from_url(&url)?,
    };

    let store = open_store(paths).await?;
    let pinger = Arc::new(HttpPinger::new(url.clone(), &config.keep_alive)?);
    let presentation = Arc::new(LogPresentation::new());

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let mut agent = TabAgent::new(
        domain.clone(),
        config,
        store.clone(),
        Arc::new(SystemClock),
        pinger,
        presentation,
    )
    .with_page(url.clone(), title.unwrap_or_else(|| domain.clone()));
    let (handle, commands) = AgentHandle::channel(32);
    let agent_handle = {
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            agent.run_loop(commands, shutdown_rx).await;
        })
    };

    info!(domain = %domain, url = %url, "Agent running; one command per line, Ctrl-D to stop");
    let status = handle.send(AgentCommand::GetStatus).await?;
    println!("{}", serde_json::to_string(&status)?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "Failed to read command input");
                        break;
                    }
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match AgentCommand::parse_line(line) {
                    Ok(command) => {
                        let status = handle.send(command).await?;
                        println!("{}", serde_json::to_string(&status)?);
                    }
                    Err(e) => {
                        println!("{}", serde_json::json!({ "error": e.to_string() }));
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    info!("Shutting down agent...");
    let _ = shutdown_tx.send(());
    drop(handle);

    // The agent releases ownership on its way out; give it a moment.
    let _ = tokio::time::timeout(Duration::from_secs(3), agent_handle).await;
    Ok(())
}
