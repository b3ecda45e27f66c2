//! Component C: the token-gossip leader election engine shared by a
//! daemon's sync-tx and sync-rx tasks.
//!
//! State transitions follow the Python `daemon.__sync_tx` /
//! `daemon.__sync_rx` they are translated from: the sync-rx task is the
//! sole writer of `sync_token`, `master_candidate` and `read_own_it`, with
//! the single exception of the fresh-token draw on re-enable. Every field
//! is a small, independently-updated atomic rather than a struct behind a
//! mutex, since correctness only requires that each scalar never tear
//! under concurrent access, not that the triple update atomically
//! together.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use rand::Rng;

use crate::config::{ServiceName, MAX_INITIAL_TOKEN, MCAST_SYNC_READ_TIME, MCAST_SYNC_SEND_TIME, READ_OWN_MAX_COUNT};
use crate::multicast::MulticastEndpoint;
use crate::protocol::{encode_sync, parse_sync};

/// Sentinel meaning "no service port has been set" in an atomic `u32`
/// field. Valid ports are `1..=65535`, so `0` is free to reuse.
const NO_PORT: u32 = 0;

fn random_token() -> u64 {
    rand::thread_rng().gen_range(1..=MAX_INITIAL_TOKEN)
}

/// State shared between a daemon's three workers.
pub struct SharedState {
    pub service_name: ServiceName,
    run: AtomicBool,
    enable: AtomicBool,
    master_candidate: AtomicBool,
    read_own_it: AtomicU32,
    sync_token: AtomicU64,
    service_port: AtomicU32,
}

impl SharedState {
    pub fn new(service_name: ServiceName) -> Arc<Self> {
        Arc::new(SharedState {
            service_name,
            run: AtomicBool::new(true),
            enable: AtomicBool::new(true),
            master_candidate: AtomicBool::new(true),
            read_own_it: AtomicU32::new(0),
            sync_token: AtomicU64::new(random_token()),
            service_port: AtomicU32::new(NO_PORT),
        })
    }

    pub fn is_running(&self) -> bool {
        self.run.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.run.store(false, Ordering::SeqCst);
    }

    pub fn enabled(&self) -> bool {
        self.enable.load(Ordering::SeqCst)
    }

    /// Re-enabling from disabled re-draws a fresh random token so a stale
    /// `T = 0` from a prior master does not persist.
    pub fn set_enable(&self, enable: bool) {
        let was_enabled = self.enable.swap(enable, Ordering::SeqCst);
        if enable && !was_enabled {
            self.sync_token.store(random_token(), Ordering::SeqCst);
            self.master_candidate.store(true, Ordering::SeqCst);
            self.read_own_it.store(0, Ordering::SeqCst);
        }
    }

    pub fn is_master(&self) -> bool {
        self.sync_token.load(Ordering::SeqCst) == 0
    }

    pub fn sync_token(&self) -> u64 {
        self.sync_token.load(Ordering::SeqCst)
    }

    pub fn set_service_port(&self, port: Option<u16>) {
        self.service_port
            .store(port.map(u32::from).unwrap_or(NO_PORT), Ordering::SeqCst);
    }

    pub fn service_port(&self) -> Option<u16> {
        match self.service_port.load(Ordering::SeqCst) {
            NO_PORT => None,
            p => Some(p as u16),
        }
    }

    fn is_master_candidate(&self) -> bool {
        self.master_candidate.load(Ordering::SeqCst)
    }
}

/// Sync-tx loop: every [`MCAST_SYNC_SEND_TIME`], if enabled and still a
/// candidate, broadcast `S.T` on the sync channel. Runs until `state.stop()`.
pub async fn run_sync_tx(state: Arc<SharedState>, sync: Arc<MulticastEndpoint>) {
    while state.is_running() {
        tokio::time::sleep(MCAST_SYNC_SEND_TIME).await;
        if !state.is_running() {
            break;
        }
        if state.enabled() && state.is_master_candidate() {
            let token = state.sync_token();
            let msg = encode_sync(&state.service_name, token);
            log::trace!("{}: broadcasting sync token {token}", state.service_name);
            sync.send(&msg).await;
        }
    }
}

/// Sync-rx loop: classifies every sync observation (timeout, lower token,
/// equal token, higher token) and mutates `sync_token` / `master_candidate`
/// / `read_own_it` accordingly. Runs until `state.stop()`.
pub async fn run_sync_rx(state: Arc<SharedState>, sync: Arc<MulticastEndpoint>) {
    let read_timeout = MCAST_SYNC_READ_TIME * 2;

    while state.is_running() {
        match sync.read(Some(read_timeout)).await {
            None => {
                // Timeout, or endpoint closed underneath us; either way
                // silence on the channel re-enables candidacy.
                if !state.is_running() {
                    break;
                }
                log::trace!(
                    "{}: sync channel silent; re-enabling candidacy",
                    state.service_name
                );
                state.master_candidate.store(true, Ordering::SeqCst);
                state.read_own_it.store(0, Ordering::SeqCst);
            }
            Some((payload, _src)) => {
                let Some(other_token) = parse_sync(&state.service_name, &payload) else {
                    continue;
                };
                let my_token = state.sync_token();

                match other_token.cmp(&my_token) {
                    std::cmp::Ordering::Less => {
                        log::debug!(
                            "{}: observed lower token {other_token} < {my_token}; yielding candidacy",
                            state.service_name
                        );
                        state.master_candidate.store(false, Ordering::SeqCst);
                        state.read_own_it.store(0, Ordering::SeqCst);
                    }
                    std::cmp::Ordering::Equal => {
                        let count = state.read_own_it.fetch_add(1, Ordering::SeqCst) + 1;
                        log::trace!(
                            "{}: observed own token {my_token} echoed ({count}/{READ_OWN_MAX_COUNT})",
                            state.service_name
                        );
                        if count >= READ_OWN_MAX_COUNT {
                            log::debug!(
                                "{}: self-promoting to master (was candidate at token {my_token})",
                                state.service_name
                            );
                            state.sync_token.store(0, Ordering::SeqCst);
                        }
                    }
                    std::cmp::Ordering::Greater => {
                        log::trace!(
                            "{}: observed higher token {other_token} > {my_token}; still outranking",
                            state.service_name
                        );
                        state.read_own_it.store(0, Ordering::SeqCst);
                    }
                }
            }
        }
    }
}
