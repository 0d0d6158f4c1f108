//! Lazily populated session-mode support cache.
//!
//! Each mode is probed at most once per context: the first query marks the
//! entry [`ModeSupport::Probing`] and hands a [`ModeProbe`] to the runtime.
//! Later queries read the entry and never re-trigger a probe.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::{ModeSupport, SessionMode};

#[derive(Debug, Default)]
pub(crate) struct ModeSupportTable {
    entries: [ModeSupport; 3],
}

impl ModeSupportTable {
    pub(crate) fn get(&self, mode: SessionMode) -> ModeSupport {
        self.entries[mode.index()]
    }

    /// Latch `Unknown` to `Probing`. Returns false if the entry was not `Unknown`.
    pub(crate) fn begin_probe(&mut self, mode: SessionMode) -> bool {
        let entry = &mut self.entries[mode.index()];
        if *entry != ModeSupport::Unknown {
            return false;
        }
        *entry = ModeSupport::Probing;
        true
    }

    /// Store an answer. Resolved entries are never overwritten.
    pub(crate) fn resolve(&mut self, mode: SessionMode, supported: bool) -> bool {
        let entry = &mut self.entries[mode.index()];
        if entry.resolved().is_some() {
            return false;
        }
        *entry = if supported {
            ModeSupport::Supported
        } else {
            ModeSupport::Unsupported
        };
        true
    }
}

/// One-shot answer channel for a mode-support probe.
///
/// Consumed by [`resolve`](Self::resolve). Dropping it unanswered leaves the
/// mode in `Probing` for the rest of the context's lifetime.
#[derive(Debug)]
pub struct ModeProbe {
    mode: SessionMode,
    table: Arc<Mutex<ModeSupportTable>>,
}

impl ModeProbe {
    pub(crate) fn new(mode: SessionMode, table: Arc<Mutex<ModeSupportTable>>) -> Self {
        Self { mode, table }
    }

    /// The mode being probed.
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Deliver the environment's answer.
    pub fn resolve(self, supported: bool) {
        if self.table.lock().resolve(self.mode, supported) {
            log::debug!(
                "Session mode {} support resolved: {}",
                self.mode.as_str(),
                supported
            );
        } else {
            log::debug!(
                "Ignoring repeated support answer for {}",
                self.mode.as_str()
            );
        }
    }
}
