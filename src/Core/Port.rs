// One worker's connection endpoint: a fixed ring of transfer buffers

use crate::DataPlane::Buffer::Buffer::TransferBuffer;

use std::fmt;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};
use std::sync::atomic::{AtomicI32, AtomicU32};

/// A port owns a fixed ring of buffers and the cursors the controller uses
/// to walk them. Created once at circuit setup; the ring size never changes
/// afterwards.
pub struct Port {
    /// Id of this port within its port set.
    port_id: u32,

    /// Rank within the port set. Under a whole output set only rank 0
    /// actually issues data movement.
    rank: u32,

    /// Direction. Output ports are produced from, input ports consumed from.
    output: bool,

    /// The buffer ring. Length is the configured buffer count.
    buffers: Vec<TransferBuffer>,

    /// Ordinal of the last input buffer handed out. Starts at -1 so the
    /// first claim lands on slot 0.
    last_buffer_ord: AtomicI32,

    /// Cursor over output slots for the next-empty-buffer scan.
    last_buffer_tid_processed: AtomicU32,

    /// Consumer-reported load indicator; the least-busy policy picks the
    /// input port with the lowest value.
    busy_factor: AtomicU32,
}

impl Port {
    /// Build a port with `buffer_count` slots. `offset_stride` spaces the
    /// per-slot transport offsets.
    pub fn new(port_id: u32, rank: u32, output: bool, buffer_count: u32, offset_stride: u64) -> Self {
        let buffers = (0..buffer_count)
            .map(|tid| TransferBuffer::new(port_id, tid, output, u64::from(tid) * offset_stride))
            .collect();
        Self {
            port_id,
            rank,
            output,
            buffers,
            last_buffer_ord: AtomicI32::new(-1),
            last_buffer_tid_processed: AtomicU32::new(0),
            busy_factor: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn port_id(&self) -> u32 {
        self.port_id
    }

    #[inline]
    pub fn rank(&self) -> u32 {
        self.rank
    }

    #[inline]
    pub fn is_output(&self) -> bool {
        self.output
    }

    #[inline]
    pub fn buffer_count(&self) -> u32 {
        self.buffers.len() as u32
    }

    /// Direction-agnostic slot access. Panics on an out-of-range tid; slot
    /// indices are connection-time constants, so that is a wiring bug.
    pub fn buffer(&self, tid: u32) -> &TransferBuffer {
        &self.buffers[tid as usize]
    }

    /// Slot access for the producing side. Asserts the direction matches.
    pub fn output_buffer(&self, tid: u32) -> &TransferBuffer {
        assert!(self.output, "output_buffer() called on input port {}", self.port_id);
        self.buffer(tid)
    }

    /// Slot access for the consuming side. Asserts the direction matches.
    pub fn input_buffer(&self, tid: u32) -> &TransferBuffer {
        assert!(!self.output, "input_buffer() called on output port {}", self.port_id);
        self.buffer(tid)
    }

    pub fn buffers(&self) -> &[TransferBuffer] {
        &self.buffers
    }

    // -- cursors --------------------------------------------------------

    /// Slot the next input claim will inspect: one past the last ordinal,
    /// modulo the ring size.
    pub fn next_input_tid(&self) -> u32 {
        let lo = self.last_buffer_ord.load(Relaxed);
        ((lo + 1) as u32) % self.buffer_count()
    }

    pub fn set_last_buffer_ord(&self, ord: u32) {
        self.last_buffer_ord.store(ord as i32, Relaxed);
    }

    pub fn last_buffer_tid_processed(&self) -> u32 {
        self.last_buffer_tid_processed.load(Relaxed)
    }

    pub fn set_last_buffer_tid_processed(&self, tid: u32) {
        debug_assert!(tid < self.buffer_count());
        self.last_buffer_tid_processed.store(tid, Relaxed);
    }

    // -- load reporting -------------------------------------------------

    pub fn busy_factor(&self) -> u32 {
        self.busy_factor.load(Acquire)
    }

    /// Consumer-side load report. Higher means busier; the load-balancing
    /// policy steers new transfers away from it.
    pub fn set_busy_factor(&self, bf: u32) {
        self.busy_factor.store(bf, Release);
    }

    /// Reset cursors to their initial values. Teardown path only.
    pub fn reset_cursors(&self) {
        self.last_buffer_ord.store(-1, Relaxed);
        self.last_buffer_tid_processed.store(0, Relaxed);
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("port_id", &self.port_id)
            .field("rank", &self.rank)
            .field("output", &self.output)
            .field("buffer_count", &self.buffer_count())
            .field("busy_factor", &self.busy_factor())
            .finish_non_exhaustive()
    }
}
