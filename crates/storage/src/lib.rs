pub mod kv;
pub mod notes;
pub mod settings;

pub use kv::{get_json, set_json, FileKvStore, KvStore, MemoryKvStore, StoreChange};
pub use notes::{NotesStore, NOTES_KEY};
pub use settings::SettingsStore;
