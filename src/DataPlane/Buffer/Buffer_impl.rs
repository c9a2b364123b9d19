use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use super::Buffer::{BufferId, TransferBuffer};
use crate::Core::Template::TemplateKey;
use crate::DataPlane::Structs::Meta_Structs::BufferMetaData;

use parking_lot::Mutex;

impl TransferBuffer {
    /// Create a buffer at slot `tid` of port `port_id`. Buffers start empty
    /// and live for the life of the owning port.
    pub fn new(port_id: u32, tid: u32, output: bool, start_offset: u64) -> Self {
        Self {
            tid,
            port_id,
            output,
            full: AtomicBool::new(false),
            in_use: AtomicBool::new(false),
            start_offset,
            meta: BufferMetaData::default(),
            pending: Mutex::new(Vec::new()),
            zero_copy_from: Mutex::new(None),
        }
    }

    #[inline]
    pub fn tid(&self) -> u32 {
        self.tid
    }

    #[inline]
    pub fn port_id(&self) -> u32 {
        self.port_id
    }

    #[inline]
    pub fn id(&self) -> BufferId {
        BufferId::new(self.port_id, self.tid)
    }

    #[inline]
    pub fn is_output(&self) -> bool {
        self.output
    }

    #[inline]
    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    #[inline]
    pub fn meta(&self) -> &BufferMetaData {
        &self.meta
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.full.load(Acquire)
    }

    #[inline]
    pub fn in_use(&self) -> bool {
        self.in_use.load(Acquire)
    }

    pub fn set_in_use(&self, in_use: bool) {
        self.in_use.store(in_use, Release);
    }

    /// Hand the buffer to the consuming side. Clears the claim; a buffer is
    /// claimed only between a ready-check and this call.
    pub fn mark_full(&self) {
        self.in_use.store(false, Relaxed);
        self.full.store(true, Release);
    }

    /// Return the buffer to the producing side, releasing backpressure.
    pub fn mark_empty(&self) {
        self.in_use.store(false, Relaxed);
        self.full.store(false, Release);
    }

    // -- pending transfer list ------------------------------------------

    pub fn push_pending(&self, key: TemplateKey) {
        self.pending.lock().push(key);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Snapshot of the pending-transfer keys, oldest first.
    pub fn pending_keys(&self) -> Vec<TemplateKey> {
        self.pending.lock().clone()
    }

    pub fn clear_pending(&self) {
        self.pending.lock().clear();
    }

    // -- zero-copy splice -----------------------------------------------

    /// Record that this buffer now borrows `other`'s memory directly. Used
    /// instead of re-issuing a transport descriptor when the bound template
    /// is already a zero-copy chain.
    pub fn attach_zero_copy(&self, other: BufferId) {
        *self.zero_copy_from.lock() = Some(other);
    }

    pub fn detach_zero_copy(&self) {
        *self.zero_copy_from.lock() = None;
    }

    pub fn zero_copy_from(&self) -> Option<BufferId> {
        *self.zero_copy_from.lock()
    }

    /// Reset state, metadata and bookkeeping. Teardown path only.
    pub fn reset(&self) {
        self.full.store(false, Relaxed);
        self.in_use.store(false, Relaxed);
        self.meta.reset();
        self.pending.lock().clear();
        *self.zero_copy_from.lock() = None;
    }
}

impl fmt::Debug for TransferBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferBuffer")
            .field("port_id", &self.port_id)
            .field("tid", &self.tid)
            .field("output", &self.output)
            .field("empty", &self.is_empty())
            .field("in_use", &self.in_use())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}
