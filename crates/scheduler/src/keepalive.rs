use async_trait::async_trait;
use lawlens_core::config::KeepAliveConfig;
use lawlens_core::{Error, Result};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A lightweight request that keeps the site session from expiring.
#[async_trait]
pub trait KeepAlivePinger: Send + Sync {
    async fn ping(&self) -> Result<()>;
}

/// Fallback used when the ping request fails: pretend the user did something.
pub trait ActivityFallback: Send + Sync {
    fn simulate_activity(&self);
}

/// `HEAD` request against the page the agent is attached to.
pub struct HttpPinger {
    client: Client,
    url: String,
}

impl HttpPinger {
    pub fn new(url: impl Into<String>, config: &KeepAliveConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .cookie_store(true);
        if let Some(ua) = config.user_agent.as_deref() {
            builder = builder.user_agent(ua);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl KeepAlivePinger for HttpPinger {
    /// Any HTTP response counts as success; only transport errors fail.
    async fn ping(&self) -> Result<()> {
        let response = self
            .client
            .head(&self.url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        debug!(url = %self.url, status = %response.status(), "Keep-alive ping answered");
        Ok(())
    }
}

/// Periodic pinging. Only the elected owner runs one; the handle returned by
/// `spawn` is the ping timer and is aborted to stop it.
pub struct KeepAliveService {
    pinger: Arc<dyn KeepAlivePinger>,
    fallback: Arc<dyn ActivityFallback>,
    interval: Duration,
}

impl KeepAliveService {
    pub fn new(
        pinger: Arc<dyn KeepAlivePinger>,
        fallback: Arc<dyn ActivityFallback>,
        interval: Duration,
    ) -> Self {
        Self {
            pinger,
            fallback,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One ping, with the activity fallback on failure. Returns whether the ping succeeded.
    pub async fn ping_once(&self) -> bool {
        info!("Sending keep-alive ping");
        match self.pinger.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Keep-alive ping failed, simulating activity instead");
                self.fallback.simulate_activity();
                false
            }
        }
    }

    /// First ping fires one full interval after start.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + self.interval;
            let mut ticker = tokio::time::interval_at(start, self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.ping_once().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingPinger {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl KeepAlivePinger for CountingPinger {
        async fn ping(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::Http("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct CountingFallback(AtomicUsize);

    impl ActivityFallback for CountingFallback {
        fn simulate_activity(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_fallback_only_on_failure() {
        let fallback = Arc::new(CountingFallback::default());

        let ok = KeepAliveService::new(
            Arc::new(CountingPinger::default()),
            fallback.clone(),
            Duration::from_secs(300),
        );
        assert!(ok.ping_once().await);
        assert_eq!(fallback.0.load(Ordering::SeqCst), 0);

        let failing = KeepAliveService::new(
            Arc::new(CountingPinger { fail: true, ..Default::default() }),
            fallback.clone(),
            Duration::from_secs(300),
        );
        assert!(!failing.ping_once().await);
        assert_eq!(fallback.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_timer_pings_every_interval_until_aborted() {
        let pinger = Arc::new(CountingPinger::default());
        let service = Arc::new(KeepAliveService::new(
            pinger.clone(),
            Arc::new(CountingFallback::default()),
            Duration::from_secs(300),
        ));

        let handle = service.spawn();
        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(pinger.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(pinger.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(pinger.calls.load(Ordering::SeqCst), 3);

        handle.abort();
        let _ = handle.await;
        tokio::time::sleep(Duration::from_secs(900)).await;
        assert_eq!(pinger.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_http_pinger_builds() {
        let pinger = HttpPinger::new("https://example.com/doc", &KeepAliveConfig::default()).unwrap();
        assert_eq!(pinger.url(), "https://example.com/doc");
    }
}
