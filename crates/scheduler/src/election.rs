//! Best-effort keep-alive owner election over the shared store.
//!
//! There is no compare-and-swap: two agents that read an empty or stale record
//! at the same time will both claim it. The later write wins and the loser
//! corrects itself on its next staleness check. Duplicate pings in that window
//! are harmless.

use lawlens_core::{Clock, ElectionRecord};
use lawlens_storage::KvStore;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const ELECTION_KEY: &str = "keepAliveMaster";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Record was absent or stale and we wrote our own.
    Claimed,
    /// Record already named us.
    Reaffirmed,
    /// Another agent holds a fresh record.
    Deferred { owner_id: String },
}

pub struct Election {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    owner_id: String,
    stale_threshold_ms: i64,
    is_owner: bool,
}

impl Election {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, stale_threshold_ms: u64) -> Self {
        Self::with_owner_id(store, clock, stale_threshold_ms, new_owner_id())
    }

    pub fn with_owner_id(
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        stale_threshold_ms: u64,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            clock,
            owner_id: owner_id.into(),
            stale_threshold_ms: stale_threshold_ms as i64,
            is_owner: false,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    /// Current record; read failures and undecodable values count as absent.
    pub async fn read_record(&self) -> Option<ElectionRecord> {
        match self.store.get(ELECTION_KEY).await {
            Ok(Some(value)) => match serde_json::from_value::<ElectionRecord>(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Malformed election record, treating as absent");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Election record read failed, treating as absent");
                None
            }
        }
    }

    /// Failed writes are logged and not retried; the next heartbeat writes again.
    async fn write_record(&self, now_ms: i64) -> bool {
        let record = ElectionRecord::new(self.owner_id.clone(), now_ms);
        let value = match serde_json::to_value(&record) {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "Failed to encode election record");
                return false;
            }
        };
        match self.store.set(ELECTION_KEY, value).await {
            Ok(()) => true,
            Err(e) => {
                error!(owner_id = %self.owner_id, error = %e, "Failed to write election record");
                false
            }
        }
    }

    pub async fn claim_or_verify_ownership(&mut self) -> ClaimOutcome {
        let record = self.read_record().await;
        let now = self.clock.now_ms();

        match record {
            Some(r) if !r.is_stale(now, self.stale_threshold_ms) => {
                if r.owner_id == self.owner_id {
                    self.is_owner = true;
                    ClaimOutcome::Reaffirmed
                } else {
                    if self.is_owner {
                        info!(owner_id = %self.owner_id, new_owner = %r.owner_id, "Lost keep-alive ownership");
                    } else {
                        debug!(owner = %r.owner_id, "Another agent is keep-alive master");
                    }
                    self.is_owner = false;
                    ClaimOutcome::Deferred { owner_id: r.owner_id }
                }
            }
            previous => {
                self.write_record(now).await;
                self.is_owner = true;
                match previous {
                    Some(stale) => info!(
                        owner_id = %self.owner_id,
                        previous = %stale.owner_id,
                        age_ms = stale.age_ms(now),
                        "Took over stale keep-alive ownership"
                    ),
                    None => info!(owner_id = %self.owner_id, "Became keep-alive master"),
                }
                ClaimOutcome::Claimed
            }
        }
    }

    /// Refresh the record's timestamp. Only the owner writes; returns whether it did.
    pub async fn heartbeat(&mut self) -> bool {
        if !self.is_owner {
            return false;
        }
        let now = self.clock.now_ms();
        self.write_record(now).await
    }

    /// Periodic re-run of the full claim logic; this is how a dead owner gets replaced.
    pub async fn check_staleness(&mut self) -> ClaimOutcome {
        self.claim_or_verify_ownership().await
    }

    /// Clear the record so another agent can claim immediately. No-op for non-owners.
    pub async fn release_ownership(&mut self) {
        if !self.is_owner {
            return;
        }
        self.is_owner = false;
        match self.store.set(ELECTION_KEY, Value::Null).await {
            Ok(()) => info!(owner_id = %self.owner_id, "Released keep-alive ownership"),
            Err(e) => error!(owner_id = %self.owner_id, error = %e, "Failed to release ownership"),
        }
    }
}

pub fn new_owner_id() -> String {
    Uuid::new_v4().simple().to_string()
}
