use image::RgbaImage;

use crate::canvas::PixelSurface;
use crate::error::{CanvasError, Result};
use crate::io::{self, Snapshot};

pub const DEFAULT_MAX_HISTORY: usize = 50;

// ============================================================================
// HISTORY ENTRY
// ============================================================================

/// One committed state of the whole surface.
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub description: String,
    pub snapshot: Snapshot,
}

// ============================================================================
// HISTORY MANAGER - linear snapshot stack with a cursor
// ============================================================================

/// Linear undo/redo history of full-surface snapshots.
///
/// `entries[cursor]` always matches the live surface right after a commit.
/// Recording after an undo drops the redo tail; once the stack grows past
/// `max_history_size` the oldest entries are evicted first.
pub struct HistoryManager {
    entries: Vec<HistoryEntry>,
    cursor: usize,
    max_history_size: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            max_history_size: max_history_size.max(1),
        }
    }

    /// Snapshot the surface and push it as the newest entry.
    pub fn record(&mut self, description: impl Into<String>, surface: &PixelSurface) -> Result<()> {
        let snapshot = surface.snapshot()?;
        self.push(description, snapshot);
        Ok(())
    }

    /// Push an already encoded snapshot.
    pub fn push(&mut self, description: impl Into<String>, snapshot: Snapshot) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push(HistoryEntry {
            description: description.into(),
            snapshot,
        });
        self.prune();
        self.cursor = self.entries.len() - 1;
    }

    /// Step back one entry and restore it. Returns `false` at the oldest entry.
    /// If the snapshot fails to decode the cursor stays where it was.
    pub fn undo(&mut self, surface: &mut PixelSurface) -> Result<bool> {
        if !self.can_undo() {
            return Ok(false);
        }
        surface.restore(&self.entries[self.cursor - 1].snapshot)?;
        self.cursor -= 1;
        Ok(true)
    }

    /// Step forward one entry and restore it. Returns `false` at the newest entry.
    pub fn redo(&mut self, surface: &mut PixelSurface) -> Result<bool> {
        if !self.can_redo() {
            return Ok(false);
        }
        surface.restore(&self.entries[self.cursor + 1].snapshot)?;
        self.cursor += 1;
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn undo_description(&self) -> Option<&str> {
        if self.can_undo() {
            Some(&self.entries[self.cursor].description)
        } else {
            None
        }
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.entries.get(self.cursor + 1).map(|e| e.description.as_str())
    }

    /// Descriptions up to the cursor, most recent first.
    pub fn undo_history(&self) -> Vec<&str> {
        if self.entries.is_empty() {
            return Vec::new();
        }
        self.entries[..=self.cursor]
            .iter()
            .rev()
            .map(|e| e.description.as_str())
            .collect()
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.cursor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn max_history_size(&self) -> usize {
        self.max_history_size
    }

    pub fn undo_count(&self) -> usize {
        self.cursor
    }

    pub fn redo_count(&self) -> usize {
        self.entries.len().saturating_sub(self.cursor + 1)
    }

    /// Total encoded bytes held by the stack.
    pub fn memory_usage(&self) -> usize {
        self.entries.iter().map(|e| e.snapshot.len()).sum()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }

    fn prune(&mut self) {
        if self.entries.len() > self.max_history_size {
            let excess = self.entries.len() - self.max_history_size;
            self.entries.drain(..excess);
        }
    }
}

// ============================================================================
// RESTORE SEQUENCING - ordering for asynchronously decoded loads
// ============================================================================

/// Hands out generation numbers for buffer replacements and decides whether
/// a finished decode may still be applied.
///
/// Every issued load and every synchronous commit takes the next generation.
/// A completion is accepted only if nothing newer has been applied or
/// committed since it was issued, so late decodes can never revert newer work.
#[derive(Clone, Debug, Default)]
pub struct RestoreSequencer {
    issued: u64,
    last_applied: u64,
    last_commit: u64,
}

impl RestoreSequencer {
    pub fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Mark a synchronous edit; pending loads issued before it go stale.
    pub fn note_commit(&mut self) {
        self.issued += 1;
        self.last_commit = self.issued;
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation > self.last_applied && generation > self.last_commit
    }

    /// Accept `generation` if it is still current and mark it applied.
    pub fn accept(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.last_applied = generation;
        true
    }

    pub fn latest_issued(&self) -> u64 {
        self.issued
    }
}

/// An encoded image waiting to be decoded off the editing thread.
#[derive(Debug)]
pub struct PendingRestore {
    pub generation: u64,
    bytes: Vec<u8>,
}

impl PendingRestore {
    pub fn new(generation: u64, bytes: Vec<u8>) -> Self {
        Self { generation, bytes }
    }

    /// Decode the payload. Safe to call from any thread.
    pub fn decode(self) -> DecodedRestore {
        DecodedRestore {
            generation: self.generation,
            image: io::decode_image(&self.bytes),
        }
    }
}

/// Result of decoding a [`PendingRestore`], handed back to the session.
#[derive(Debug)]
pub struct DecodedRestore {
    pub generation: u64,
    pub image: std::result::Result<RgbaImage, CanvasError>,
}
