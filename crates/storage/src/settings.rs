//! Per-domain presentation settings.
//!
//! Every field lives under its own key, `"{prefix}_{domain}"`, so two sites
//! never share settings and a single corrupt value only resets that field.

use lawlens_core::{DomainSettings, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};

use crate::kv::{get_json, set_json, KvStore};

pub const FONT_SIZE_KEY: &str = "divFontSize";
pub const LINE_HEIGHT_KEY: &str = "lineHeight";
pub const LEFT_MARGIN_KEY: &str = "leftMargin";
pub const RIGHT_MARGIN_KEY: &str = "rightMargin";
pub const SIDEBAR_KEY: &str = "sidebarHidden";
pub const FOCUS_MODE_KEY: &str = "focusMode";
pub const KEEP_ALIVE_KEY: &str = "keepAlive";
pub const KILLSWITCH_KEY: &str = "killswitch";

pub fn domain_key(prefix: &str, domain: &str) -> String {
    format!("{}_{}", prefix, domain)
}

pub struct SettingsStore {
    store: Arc<dyn KvStore>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    async fn field<T: DeserializeOwned>(&self, prefix: &str, domain: &str, default: T) -> T {
        let key = domain_key(prefix, domain);
        match get_json::<T>(self.store.as_ref(), &key).await {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                warn!(key = %key, error = %e, "Unreadable setting, using default");
                default
            }
        }
    }

    /// Missing or unreadable fields fall back to their defaults.
    pub async fn load(&self, domain: &str) -> DomainSettings {
        let d = DomainSettings::default();
        DomainSettings {
            font_size: self.field(FONT_SIZE_KEY, domain, d.font_size).await,
            line_height: self.field(LINE_HEIGHT_KEY, domain, d.line_height).await,
            left_margin: self.field(LEFT_MARGIN_KEY, domain, d.left_margin).await,
            right_margin: self.field(RIGHT_MARGIN_KEY, domain, d.right_margin).await,
            sidebar_hidden: self.field(SIDEBAR_KEY, domain, d.sidebar_hidden).await,
            focus_mode: self.field(FOCUS_MODE_KEY, domain, d.focus_mode).await,
            keep_alive: self.field(KEEP_ALIVE_KEY, domain, d.keep_alive).await,
            killswitch: self.field(KILLSWITCH_KEY, domain, d.killswitch).await,
        }
    }

    async fn put<T: Serialize>(&self, prefix: &str, domain: &str, value: &T) -> Result<()> {
        set_json(self.store.as_ref(), &domain_key(prefix, domain), value).await
    }

    /// Writes every field. Stops at the first failure and returns it.
    pub async fn save(&self, domain: &str, settings: &DomainSettings) -> Result<()> {
        self.put(FONT_SIZE_KEY, domain, &settings.font_size).await?;
        self.put(LINE_HEIGHT_KEY, domain, &settings.line_height).await?;
        self.put(LEFT_MARGIN_KEY, domain, &settings.left_margin).await?;
        self.put(RIGHT_MARGIN_KEY, domain, &settings.right_margin).await?;
        self.put(SIDEBAR_KEY, domain, &settings.sidebar_hidden).await?;
        self.put(FOCUS_MODE_KEY, domain, &settings.focus_mode).await?;
        self.put(KEEP_ALIVE_KEY, domain, &settings.keep_alive).await?;
        self.put(KILLSWITCH_KEY, domain, &settings.killswitch).await?;
        Ok(())
    }

    /// Like `save`, but a failed write is only logged.
    pub async fn save_logged(&self, domain: &str, settings: &DomainSettings) {
        if let Err(e) = self.save(domain, settings).await {
            error!(domain = %domain, error = %e, "Failed to persist settings");
        }
    }

    pub async fn reset(&self, domain: &str) -> Result<()> {
        for prefix in [
            FONT_SIZE_KEY,
            LINE_HEIGHT_KEY,
            LEFT_MARGIN_KEY,
            RIGHT_MARGIN_KEY,
            SIDEBAR_KEY,
            FOCUS_MODE_KEY,
            KEEP_ALIVE_KEY,
            KILLSWITCH_KEY,
        ] {
            self.store.remove(&domain_key(prefix, domain)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKvStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_defaults_when_empty() {
        let settings = SettingsStore::new(Arc::new(MemoryKvStore::new()));
        assert_eq!(settings.load("example.com").await, DomainSettings::default());
    }

    #[tokio::test]
    async fn test_round_trip_is_domain_scoped() {
        let kv = MemoryKvStore::new();
        let settings = SettingsStore::new(Arc::new(kv.clone()));

        let mut s = DomainSettings::default();
        s.increase_font_size();
        s.keep_alive = true;
        settings.save("a.example", &s).await.unwrap();

        assert_eq!(settings.load("a.example").await, s);
        assert_eq!(settings.load("b.example").await, DomainSettings::default());
        assert_eq!(kv.get("divFontSize_a.example").await.unwrap(), Some(json!(19)));
        assert_eq!(kv.get("keepAlive_a.example").await.unwrap(), Some(json!(true)));
    }

    #[tokio::test]
    async fn test_corrupt_field_falls_back_alone() {
        let kv = MemoryKvStore::new();
        kv.set("divFontSize_x", json!("huge")).await.unwrap();
        kv.set("focusMode_x", json!(true)).await.unwrap();

        let loaded = SettingsStore::new(Arc::new(kv)).load("x").await;
        assert_eq!(loaded.font_size, 18);
        assert!(loaded.focus_mode);
    }

    #[tokio::test]
    async fn test_reset() {
        let kv = MemoryKvStore::new();
        let settings = SettingsStore::new(Arc::new(kv.clone()));
        let mut s = DomainSettings::default();
        s.killswitch = true;
        settings.save("x", &s).await.unwrap();

        settings.reset("x").await.unwrap();
        assert_eq!(settings.load("x").await, DomainSettings::default());
        assert_eq!(kv.get("killswitch_x").await.unwrap(), None);
    }
}
