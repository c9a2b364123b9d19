// Transfer-template contract and the per-circuit template table

use crate::DataPlane::Buffer::Buffer::BufferId;

use std::collections::HashMap;
use std::io;

/// Which side of a circuit a template acts for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TransferDirection {
    Output,
    Input,
}

/// The 6-tuple identifying one pre-built transfer template: source port and
/// slot, destination port and slot, whether it is the broadcast variant, and
/// the direction it serves. Table entries are registered once at
/// connection-setup time and are immutable afterwards.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TemplateKey {
    pub out_port: u32,
    pub out_tid: u32,
    pub in_port: u32,
    pub in_tid: u32,
    pub broadcast: bool,
    pub direction: TransferDirection,
}

impl TemplateKey {
    pub fn output(out_port: u32, out_tid: u32, in_port: u32, in_tid: u32, broadcast: bool) -> Self {
        Self {
            out_port,
            out_tid,
            in_port,
            in_tid,
            broadcast,
            direction: TransferDirection::Output,
        }
    }

    pub fn input(in_port: u32, in_tid: u32) -> Self {
        Self {
            out_port: 0,
            out_tid: 0,
            in_port,
            in_tid,
            broadcast: false,
            direction: TransferDirection::Input,
        }
    }
}

/// A pre-built, transport-specific descriptor that moves the bytes for one
/// (source, destination) buffer pair. Implemented by transport drivers
/// (shared-memory PIO, RDMA, message bus); the controller only decides when
/// to fire it. Driver failures propagate out of the controller untouched.
pub trait TransferTemplate {
    /// Begin (possibly asynchronous) data movement for the bound pair.
    fn produce(&self) -> io::Result<()>;

    /// Acknowledge that the input buffer is empty again, releasing
    /// backpressure toward the producer. May return a buffer reference for
    /// chaining.
    fn consume(&self) -> io::Result<Option<BufferId>>;

    /// Retarget the underlying transport descriptor to new byte offsets in
    /// place. The previous offsets are written into `old_offsets` so the
    /// change can be reversed.
    fn modify(&self, new_offsets: &[u64], old_offsets: &mut Vec<u64>) -> io::Result<()>;

    /// Fire the gated variant of this template for the given destination.
    /// Returns the number of transfers started.
    fn produce_gated(&self, port_id: u32, tid: u32) -> io::Result<u32>;

    /// Highest sequence this template has gated. Informational; callers use
    /// it for flow-control heuristics.
    fn max_gated_sequence(&self) -> u32 {
        0
    }

    /// Driver-assigned type tag. Gated aggregation only fires templates
    /// tagged with its own type.
    fn type_id(&self) -> u32 {
        0
    }

    /// True when this template is a zero-copy chain, in which case
    /// retargeting is done by buffer splice rather than `modify`.
    fn is_zero_copy(&self) -> bool {
        false
    }
}

/// Associative map from the 6-tuple to the driver-owned template.
///
/// The reference layout for this table is a dense fixed-bound array; a map
/// keyed on the tuple removes the hard upper limits and turns an
/// out-of-range lookup into a reportable error instead of undefined
/// behavior.
#[derive(Default)]
pub struct TemplateTable {
    map: HashMap<TemplateKey, Box<dyn TransferTemplate>>,
}

impl TemplateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template. Entries are write-once; a duplicate key is a
    /// circuit-setup bug and is reported as such.
    pub fn add(&mut self, key: TemplateKey, template: Box<dyn TransferTemplate>) -> io::Result<()> {
        if self.map.contains_key(&key) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("TemplateTable::add(): duplicate template registration for {key:?}"),
            ));
        }
        self.map.insert(key, template);
        Ok(())
    }

    /// Look up the template for `key`. A missing entry means the circuit
    /// was wired without the template this controller needs.
    pub fn get(&self, key: TemplateKey) -> io::Result<&dyn TransferTemplate> {
        self.map.get(&key).map(|t| t.as_ref()).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "TemplateTable::get(): no template registered:\n\
                     ├─ out port/tid: {}/{}\n\
                     ├─ in port/tid:  {}/{}\n\
                     ├─ broadcast:    {}\n\
                     ╰─ direction:    {:?}",
                    key.out_port, key.out_tid, key.in_port, key.in_tid, key.broadcast, key.direction
                ),
            )
        })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
