pub mod election;
pub mod keepalive;

pub use election::{ClaimOutcome, Election, ELECTION_KEY};
pub use keepalive::{ActivityFallback, HttpPinger, KeepAlivePinger, KeepAliveService};
