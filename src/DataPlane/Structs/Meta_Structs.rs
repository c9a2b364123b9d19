// These are the transport-visible state words attached to every buffer

use crossbeam_utils::CachePadded;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};
use std::sync::atomic::{AtomicBool, AtomicU32};

/// Per-transfer metadata carried with each buffer.
///
/// The producing worker fills this in while it owns the buffer; the input
/// side uses `sequence`/`parts_sequence` to re-order arrivals that came in
/// over redundant paths. All fields are atomics because a buffer is reached
/// through shared references from both sides of a circuit; `#[repr(C)]`
/// keeps the layout stable for transports that map it directly.
#[repr(C)]
#[derive(Debug, Default)]
pub struct BufferMetaData {
    /// Output-side transfer ordinal. Monotonic per output port set.
    pub sequence: AtomicU32,

    /// Sub-ordinal used when one whole is delivered as multiple parts.
    pub parts_sequence: AtomicU32,

    /// Set when this buffer was delivered via the broadcast path.
    pub broad_cast: AtomicBool,

    /// Last buffer of the stream. Forces delivery through the broadcast
    /// path so every input port observes it.
    pub end_of_stream: AtomicBool,

    /// Last part of the current whole.
    pub end_of_whole: AtomicBool,
}

impl BufferMetaData {
    pub fn sequence(&self) -> u32 {
        self.sequence.load(Acquire)
    }

    pub fn set_sequence(&self, seq: u32) {
        self.sequence.store(seq, Release);
    }

    pub fn parts_sequence(&self) -> u32 {
        self.parts_sequence.load(Acquire)
    }

    pub fn set_parts_sequence(&self, seq: u32) {
        self.parts_sequence.store(seq, Release);
    }

    pub fn broad_cast(&self) -> bool {
        self.broad_cast.load(Acquire)
    }

    pub fn set_broad_cast(&self, bcast: bool) {
        self.broad_cast.store(bcast, Release);
    }

    pub fn end_of_stream(&self) -> bool {
        self.end_of_stream.load(Acquire)
    }

    pub fn set_end_of_stream(&self, eos: bool) {
        self.end_of_stream.store(eos, Release);
    }

    pub fn end_of_whole(&self) -> bool {
        self.end_of_whole.load(Acquire)
    }

    pub fn set_end_of_whole(&self, eow: bool) {
        self.end_of_whole.store(eow, Release);
    }

    /// Reset everything to the initial state. Used at circuit teardown.
    pub fn reset(&self) {
        self.sequence.store(0, Relaxed);
        self.parts_sequence.store(0, Relaxed);
        self.broad_cast.store(false, Relaxed);
        self.end_of_stream.store(false, Relaxed);
        self.end_of_whole.store(false, Relaxed);
    }
}

/// Control block shared by all output ports of one port set.
///
/// This is the piece of state a transport exposes to every peer producer:
/// the rotating barrier token for sequential output sets, and the
/// end-of-stream/end-of-whole marks copied out of buffer metadata when a
/// broadcast is issued.
#[repr(C)]
#[derive(Debug, Default)]
pub struct OutputControlBlock {
    /// Rotating ownership marker. The output port whose id equals the
    /// token holds the right to produce. Padded so peer producers polling
    /// it do not false-share with the flags below.
    pub sequential_control_token: CachePadded<AtomicU32>,

    /// End-of-stream mark, copied from buffer metadata on broadcast.
    pub end_of_stream: AtomicBool,

    /// End-of-whole mark, copied from buffer metadata on broadcast.
    pub end_of_whole: AtomicBool,
}

impl OutputControlBlock {
    pub fn token(&self) -> u32 {
        self.sequential_control_token.load(Acquire)
    }

    pub fn set_token(&self, token: u32) {
        self.sequential_control_token.store(token, Release);
    }

    /// Hand the token to the next peer producer, wrapping at `port_count`.
    pub fn advance_token(&self, port_count: u32) {
        let next = (self.token() + 1) % port_count;
        self.sequential_control_token.store(next, Release);
    }

    pub fn end_of_stream(&self) -> bool {
        self.end_of_stream.load(Acquire)
    }

    pub fn end_of_whole(&self) -> bool {
        self.end_of_whole.load(Acquire)
    }

    pub fn set_stream_marks(&self, eos: bool, eow: bool) {
        self.end_of_stream.store(eos, Release);
        self.end_of_whole.store(eow, Release);
    }
}
