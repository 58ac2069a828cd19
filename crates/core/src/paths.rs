use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".lawlens"))
            .unwrap_or_else(|| PathBuf::from(".lawlens"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    /// Shared key-value store used by every agent on this machine.
    pub fn store_file(&self) -> PathBuf {
        self.base.join("store.json")
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
