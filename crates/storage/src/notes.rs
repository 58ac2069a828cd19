use chrono::Utc;
use lawlens_core::{Error, NoteEntry, Result};
use std::sync::Arc;
use tracing::{debug, info};

use crate::kv::{get_json, set_json, KvStore};

pub const NOTES_KEY: &str = "notes";

/// Captured quotations, newest first. Shared by every agent and the CLI.
pub struct NotesStore {
    store: Arc<dyn KvStore>,
}

impl NotesStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<NoteEntry>> {
        Ok(get_json::<Vec<NoteEntry>>(self.store.as_ref(), NOTES_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn add(&self, entry: NoteEntry) -> Result<usize> {
        let mut notes = self.list().await?;
        notes.insert(0, entry);
        set_json(self.store.as_ref(), NOTES_KEY, &notes).await?;
        debug!(count = notes.len(), "Note added");
        Ok(notes.len())
    }

    /// Build a note from selected text and save it. Blank selections are rejected.
    pub async fn capture(&self, quotation: &str, page_title: &str, url: &str) -> Result<NoteEntry> {
        let quotation = quotation.trim();
        if quotation.is_empty() {
            return Err(Error::Validation(
                "nothing selected; select text before saving a quotation".to_string(),
            ));
        }
        let entry = NoteEntry {
            quotation: quotation.to_string(),
            citation: String::new(),
            page_title: page_title.to_string(),
            url: url.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        };
        self.add(entry.clone()).await?;
        info!(url = %url, "Quotation saved to notes");
        Ok(entry)
    }

    pub async fn clear(&self) -> Result<()> {
        set_json(self.store.as_ref(), NOTES_KEY, &Vec::<NoteEntry>::new()).await
    }
}
