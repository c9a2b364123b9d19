// One slot of a port's circular buffer ring

use crate::Core::Template::TemplateKey;
use crate::DataPlane::Structs::Meta_Structs::BufferMetaData;

use parking_lot::Mutex;
use std::sync::atomic::AtomicBool;

/// Index handle naming one buffer: the owning port's id within its port
/// set, and the slot index (tid) within that port's ring. Handles are plain
/// indices so they can be held across dispatch cycles without borrowing the
/// circuit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferId {
    pub port: u32,
    pub tid: u32,
}

impl BufferId {
    pub fn new(port: u32, tid: u32) -> Self {
        Self { port, tid }
    }
}

/// One fixed-size slot of a port's circular queue.
///
/// A buffer is either empty (producer-owned) or full (consumer-owned); the
/// two states are a single `full` word, so they can never be observed
/// simultaneously. `in_use` is set only while a controller has claimed the
/// buffer between a successful `can_produce`/`can_consume` check and the
/// matching `produce`/`consume`.
///
/// ### Ownership protocol
/// There is no lock around buffer state. The producing side may touch a
/// buffer only while it is empty, the consuming side only while it is full,
/// and all calls for one circuit come from a single dispatch thread. The
/// atomics exist because both sides reach the buffer through shared
/// references, not because state changes race.
pub struct TransferBuffer {
    /// Slot index within the owning port's ring.
    pub(crate) tid: u32,

    /// Id of the owning port within its port set. Non-owning back-reference.
    pub(crate) port_id: u32,

    /// Direction of the owning port.
    pub(crate) output: bool,

    /// Full/empty state word. `empty == !full` by construction.
    pub(crate) full: AtomicBool,

    /// Claimed by a controller between a ready-check and its hand-off call.
    pub(crate) in_use: AtomicBool,

    /// Byte offset of this slot in the transport's address space. Fixed at
    /// circuit setup; used when retargeting a transfer template in place.
    pub(crate) start_offset: u64,

    /// Per-transfer metadata (sequence numbers, stream marks).
    pub(crate) meta: BufferMetaData,

    /// Transfer templates issued against this buffer that have not been
    /// observed complete. Pattern-4 gating walks this list.
    pub(crate) pending: Mutex<Vec<TemplateKey>>,

    /// When spliced, the buffer whose memory this one borrows.
    pub(crate) zero_copy_from: Mutex<Option<BufferId>>,
}
