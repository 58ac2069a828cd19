use lawlens_core::{Config, NoteEntry, Paths};
use lawlens_storage::{FileKvStore, KvStore, NotesStore, NOTES_KEY};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::warn;

use super::open_store;

fn render(notes: &[NoteEntry]) -> String {
    if notes.is_empty() {
        return "No notes saved.\n".to_string();
    }
    let mut out = String::new();
    for (i, note) in notes.iter().enumerate() {
        out.push_str(&format!("{}. \"{}\"\n", i + 1, note.quotation));
        if !note.page_title.is_empty() {
            out.push_str(&format!("   {}\n", note.page_title));
        }
        if !note.url.is_empty() {
            out.push_str(&format!("   {}\n", note.url));
        }
        out.push_str(&format!("   saved {}\n", note.timestamp));
    }
    out
}

pub async fn list(paths: &Paths, follow: bool) -> anyhow::Result<()> {
    let store = open_store(paths).await?;
    if !follow {
        let notes = NotesStore::new(store).list().await?;
        print!("{}", render(&notes));
        return Ok(());
    }

    let config = Config::load_or_default(paths)?;
    let mut stdout = std::io::stdout();
    follow_notes(store, config.store.watch_interval(), &mut stdout, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;
    Ok(())
}

/// Print the notes, then reprint whenever any process changes them, until
/// `stop` resolves. Returns how many times the list was reprinted.
async fn follow_notes<W: Write>(
    store: Arc<FileKvStore>,
    interval: Duration,
    out: &mut W,
    stop: impl Future<Output = ()>,
) -> anyhow::Result<usize> {
    let notes = NotesStore::new(store.clone());
    let mut changes = store.subscribe();
    write!(out, "{}", render(&notes.list().await?))?;
    out.flush()?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let watcher_handle = {
        let store = store.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            store.run_watch_loop(interval, shutdown_rx).await;
        })
    };

    tokio::pin!(stop);
    let mut refreshes = 0;
    loop {
        let reload = tokio::select! {
            change = changes.recv() => match change {
                Ok(change) => change.key == NOTES_KEY,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Store change feed lagged, reloading notes");
                    true
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = &mut stop => break,
        };
        if reload {
            writeln!(out)?;
            write!(out, "{}", render(&notes.list().await?))?;
            out.flush()?;
            refreshes += 1;
        }
    }

    let _ = shutdown_tx.send(());
    let _ = watcher_handle.await;
    Ok(refreshes)
}

pub async fn add(
    paths: &Paths,
    text: &str,
    title: Option<String>,
    url: Option<String>,
) -> anyhow::Result<()> {
    let notes = NotesStore::new(open_store(paths).await?);
    notes
        .capture(text, title.as_deref().unwrap_or(""), url.as_deref().unwrap_or(""))
        .await?;
    println!("✓ Saved to notes ({} total)", notes.list().await?.len());
    Ok(())
}

pub async fn clear(paths: &Paths) -> anyhow::Result<()> {
    NotesStore::new(open_store(paths).await?).clear().await?;
    println!("✓ Notes cleared");
    Ok(())
}
