//! Fixed-capacity open-addressing slots (lock-free counters).
//!
//! Slot lifecycle: `EMPTY -> CLAIMED -> READY`, never back. The claimer owns
//! the key bytes while `CLAIMED` and publishes them with a release store of
//! `READY`. Readers only look at key bytes after an acquire load of `READY`.
//! A key lives in the first slot of its probe sequence that was free when it
//! was inserted, and an `EMPTY` slot ends every probe.
//!
//! The layout is `repr(C)` and valid when zeroed, so the same slots can live
//! in heap memory or in a shared file mapping.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::error::{Result, StatsError};

/// Longest key (in bytes) a slot can hold.
pub const KEY_MAX: usize = 64;

const EMPTY: u32 = 0;
const CLAIMED: u32 = 1;
const READY: u32 = 2;

/// A claimer that never publishes (died mid-insert) must not hang callers.
const CLAIM_SPIN_LIMIT: u32 = 1 << 20;

#[repr(C)]
pub(crate) struct Slot {
    state: AtomicU32,
    key_len: AtomicU32,
    counter: AtomicU64,
    key: UnsafeCell<[u8; KEY_MAX]>,
}

// SAFETY: key bytes are written only by the thread that won EMPTY -> CLAIMED
// and read only after READY was observed with acquire ordering.
unsafe impl Sync for Slot {}

impl Default for Slot {
    fn default() -> Self {
        Self {
            state: AtomicU32::new(EMPTY),
            key_len: AtomicU32::new(0),
            counter: AtomicU64::new(0),
            key: UnsafeCell::new([0; KEY_MAX]),
        }
    }
}

impl Slot {
    /// Caller must have observed `READY` with acquire ordering.
    fn holds(&self, key: &[u8]) -> bool {
        let len = self.key_len.load(Ordering::Relaxed) as usize;
        if len != key.len() {
            return false;
        }
        // SAFETY: READY was observed, the key bytes are immutable from now on.
        let stored = unsafe { &*self.key.get() };
        stored.get(..len) == Some(key)
    }

    fn wait_published(&self) -> Result<()> {
        let mut spins = 0u32;
        while self.state.load(Ordering::Acquire) == CLAIMED {
            spins += 1;
            if spins >= CLAIM_SPIN_LIMIT {
                return Err(StatsError::Internal(
                    "counter slot stuck mid-insert".into(),
                ));
            }
            if spins.is_multiple_of(64) {
                std::thread::yield_now();
            } else {
                std::hint::spin_loop();
            }
        }
        Ok(())
    }

    /// Publish `key` into a slot this thread just claimed.
    fn publish(&self, key: &[u8]) {
        // SAFETY: we won EMPTY -> CLAIMED, nobody else touches the key bytes.
        let dst = unsafe { &mut *self.key.get() };
        if let Some(prefix) = dst.get_mut(..key.len()) {
            prefix.copy_from_slice(key);
        }
        self.key_len.store(key.len() as u32, Ordering::Relaxed);
        self.state.store(READY, Ordering::Release);
    }

    fn bump(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }
}

fn checked_key(key: &str) -> Result<&[u8]> {
    let bytes = key.as_bytes();
    if bytes.is_empty() {
        return Err(StatsError::BadRequest("counter key must not be empty".into()));
    }
    if bytes.len() > KEY_MAX {
        return Err(StatsError::BadRequest(format!(
            "counter key longer than {KEY_MAX} bytes"
        )));
    }
    Ok(bytes)
}

/// FNV-1a. Stable across processes and builds, unlike the std hasher.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        h ^= u64::from(*b);
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h
}

/// Slots in probe order for `key`.
fn probe<'a>(slots: &'a [Slot], key: &[u8]) -> impl Iterator<Item = &'a Slot> {
    let start = match slots.len() {
        0 => 0,
        n => (fnv1a(key) % n as u64) as usize,
    };
    let (head, tail) = slots.split_at(start);
    tail.iter().chain(head.iter())
}

pub(crate) fn increment(slots: &[Slot], key: &str) -> Result<u64> {
    let key = checked_key(key)?;

    for slot in probe(slots, key) {
        loop {
            match slot.state.load(Ordering::Acquire) {
                READY => {
                    if slot.holds(key) {
                        return Ok(slot.bump());
                    }
                    break;
                }
                CLAIMED => slot.wait_published()?,
                EMPTY => {
                    if slot
                        .state
                        .compare_exchange(EMPTY, CLAIMED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        slot.publish(key);
                        return Ok(slot.bump());
                    }
                }
                // Unknown state (foreign or damaged mapping): never reuse it.
                _ => break,
            }
        }
    }

    Err(StatsError::ResourceExhausted {
        capacity: slots.len(),
    })
}

pub(crate) fn get(slots: &[Slot], key: &str) -> u64 {
    let Ok(key) = checked_key(key) else {
        return 0;
    };

    for slot in probe(slots, key) {
        match slot.state.load(Ordering::Acquire) {
            EMPTY => return 0,
            READY if slot.holds(key) => return slot.counter.load(Ordering::Acquire),
            // A CLAIMED row has not been counted yet; keep probing.
            _ => {}
        }
    }
    0
}

pub(crate) fn occupied(slots: &[Slot]) -> usize {
    slots
        .iter()
        .filter(|s| s.state.load(Ordering::Acquire) == READY)
        .count()
}
