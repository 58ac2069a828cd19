pub mod agent;
pub mod notes;
pub mod settings;
pub mod status;

use lawlens_core::Paths;
use lawlens_storage::FileKvStore;
use std::sync::Arc;

pub(crate) async fn open_store(paths: &Paths) -> anyhow::Result<Arc<FileKvStore>> {
    Ok(Arc::new(FileKvStore::open(paths.store_file()).await?))
}
