// src/controller.rs
//
// The transfer controller decides, for one bound pair of port sets, when a
// filled output buffer may be handed to its input buffer(s), which slot
// receives it, and which transfer template is fired to move the bytes. The
// reference behavior family is a small class hierarchy; here it is one
// struct with a tagged policy variant dispatched through single
// `can_produce`/`produce`/`consume` entry points.

use crate::Core::Port::Port;
use crate::Core::PortSet::{DataPartition, DistributionSubType, DistributionType, PortSet};
use crate::Core::Template::{TemplateKey, TemplateTable};
use crate::DataPlane::Buffer::Buffer::{BufferId, TransferBuffer};

use std::fmt;
use std::io;
use tracing::{trace, warn};

/// Hand-off policy, selected at circuit construction.
#[derive(Debug)]
pub enum Policy {
    /// Deterministic round robin with lock-step fan-out to every input
    /// port.
    RoundRobin,

    /// Busy-factor load balancing across input ports. With `use_token`,
    /// peer producers of a sequential output set additionally rotate a
    /// barrier token for mutual exclusion.
    LeastBusy {
        use_token: bool,
        /// Input port picked by the last successful `can_produce`.
        input_port: Option<u32>,
    },

    /// Gated aggregation: a hand-off only completes once a prior-stage
    /// template is observed pending on the buffer.
    Gated,
}

/// Orchestrates buffer hand-off between one output port set and one input
/// port set. Single-threaded and poll-driven: no call blocks, and "not
/// ready" is a normal immediate result.
pub struct TransferController {
    pub(crate) policy: Policy,

    /// Under a whole output set only rank 0 issues data movement.
    pub(crate) whole_output_set: bool,

    /// Next input slot to target.
    pub(crate) next_tid: u32,

    /// Fill-side circular cursor for `buffer_full`.
    pub(crate) fill_q: u32,

    /// Empty-side circular cursor for `free_buffer`.
    pub(crate) empty_q: u32,
}

impl TransferController {
    pub fn new(policy: Policy, whole_output_set: bool) -> Self {
        Self {
            policy,
            whole_output_set,
            next_tid: 0,
            fill_q: 0,
            empty_q: 0,
        }
    }

    /// Select the controller for a bound pair of port sets.
    ///
    /// Parts-partitioned input takes the gated controller; a whole input
    /// set takes round robin; a sequential input set takes least-busy load
    /// balancing (with the barrier token when the output side is itself
    /// sequential). The remaining sequential sub-types are an acknowledged
    /// gap and are rejected as a configuration error, not an abort.
    pub fn create(output: &PortSet, input: &PortSet) -> io::Result<Self> {
        let whole = output.distribution().dist_type == DistributionType::Whole;
        let input_dist = input.distribution();

        if input_dist.partition == DataPartition::Parts {
            return Ok(Self::new(Policy::Gated, whole));
        }

        match input_dist.dist_type {
            DistributionType::Whole => Ok(Self::new(Policy::RoundRobin, whole)),
            DistributionType::Sequential => match input_dist.sub_type {
                DistributionSubType::LeastBusy => Ok(Self::new(
                    Policy::LeastBusy {
                        use_token: !whole,
                        input_port: None,
                    },
                    whole,
                )),
                other => Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "TransferController::create(): unsupported policy:\n\
                         ├─ input distribution: Sequential\n\
                         ├─ sub-type:           {other:?}\n\
                         ╰─ supported sub-type: LeastBusy"
                    ),
                )),
            },
        }
    }

    #[inline]
    pub fn whole_output_set(&self) -> bool {
        self.whole_output_set
    }

    #[inline]
    pub fn next_tid(&self) -> u32 {
        self.next_tid
    }

    /// Whether a new transfer may start while earlier ones are still
    /// queued. No implemented policy allows it.
    pub fn can_transfer_buffer_while_others_are_queued(&self) -> bool {
        false
    }

    // -- ready checks (no state change) ---------------------------------

    /// True when the port's next output slot is free to fill.
    pub fn has_empty_output_buffer(&self, src_port: &Port) -> bool {
        let buffer = src_port.output_buffer(src_port.last_buffer_tid_processed());
        buffer.is_empty() && !buffer.in_use()
    }

    /// True when the port's next input slot holds unconsumed data; returns
    /// the buffer without claiming it.
    pub fn has_full_input_buffer(&self, input_port: &Port) -> Option<BufferId> {
        let buffer = input_port.input_buffer(input_port.next_input_tid());
        if !buffer.is_empty() && !buffer.in_use() {
            return Some(buffer.id());
        }
        None
    }

    // -- circular fill/empty cursors ------------------------------------

    /// Mark the buffer at the fill cursor full and advance. The ring is
    /// circular, so the target buffer is implied.
    pub fn buffer_full(&mut self, port: &Port) {
        port.buffer(self.fill_q).mark_full();
        self.fill_q = (self.fill_q + 1) % port.buffer_count();
    }

    /// Mark the buffer at the empty cursor empty and advance.
    pub fn free_buffer(&mut self, port: &Port) {
        port.buffer(self.empty_q).mark_empty();
        self.empty_q = (self.empty_q + 1) % port.buffer_count();
    }

    // -- claiming -------------------------------------------------------

    /// Claim the next free output buffer of `src_port`, if any.
    pub fn next_empty_output_buffer(&mut self, src_port: &Port) -> Option<BufferId> {
        let n = src_port.last_buffer_tid_processed();
        let buffer = src_port.output_buffer(n);
        if buffer.is_empty() && !buffer.in_use() {
            buffer.set_in_use(true);
            src_port.set_last_buffer_tid_processed((n + 1) % src_port.buffer_count());
            return Some(buffer.id());
        }
        None
    }

    /// Claim the next full input buffer of `input_port`, if any.
    ///
    /// Round robin walks the ring in order. The load-balanced and gated
    /// policies deliver out of queue order, so they recover ordering by
    /// metadata instead: the candidate with the lowest
    /// `(sequence, parts_sequence)` wins.
    pub fn next_full_input_buffer(&mut self, input_port: &Port) -> Option<BufferId> {
        match self.policy {
            Policy::RoundRobin => {
                let tlo = input_port.next_input_tid();
                let buffer = input_port.input_buffer(tlo);
                if !buffer.is_empty() && !buffer.in_use() {
                    input_port.set_last_buffer_ord(tlo);
                    buffer.set_in_use(true);
                    return Some(buffer.id());
                }
                None
            }
            Policy::LeastBusy { .. } | Policy::Gated => {
                let low_seq = Self::lowest_sequence_input(input_port)?;
                low_seq.set_in_use(true);
                Some(low_seq.id())
            }
        }
    }

    /// Full, unclaimed input buffer with the lowest
    /// `(sequence, parts_sequence)` pair.
    fn lowest_sequence_input(input_port: &Port) -> Option<&TransferBuffer> {
        let mut low_seq: Option<&TransferBuffer> = None;
        for buffer in input_port.buffers() {
            if buffer.is_empty() || buffer.in_use() {
                continue;
            }
            low_seq = match low_seq {
                None => Some(buffer),
                Some(low) => {
                    let cand = (buffer.meta().sequence(), buffer.meta().parts_sequence());
                    let best = (low.meta().sequence(), low.meta().parts_sequence());
                    if cand < best {
                        Some(buffer)
                    } else {
                        Some(low)
                    }
                }
            };
        }
        low_seq
    }

    // -- broadcast ------------------------------------------------------

    /// Whether a broadcast can start: some input slot `p` must be empty on
    /// every input port simultaneously. Under a whole output set, non-rank-0
    /// ports report true since rank 0 does the actual movement.
    pub fn can_broadcast(&mut self, output: &PortSet, input: &PortSet, buffer: &TransferBuffer) -> bool {
        if self.whole_output_set && output.port(buffer.port_id()).rank() != 0 {
            return true;
        }

        for p in 0..input.buffer_count() {
            let mut produce = false;
            for n in 0..input.port_count() {
                if input.port(n).buffer(p).is_empty() {
                    produce = true;
                } else {
                    produce = false;
                    break;
                }
            }
            // All inputs have a free buffer at this slot
            if produce {
                self.next_tid = p;
                trace!(next_tid = self.next_tid, "can_broadcast: slot selected");
                return true;
            }
        }
        false
    }

    /// Issue a broadcast from `buffer` to slot `next_tid` of every input
    /// port, carrying the stream marks into the control block.
    pub fn broadcast_output(
        &mut self,
        output: &PortSet,
        input: &PortSet,
        templates: &TemplateTable,
        buffer: &TransferBuffer,
    ) -> io::Result<()> {
        trace!(
            port = buffer.port_id(),
            tid = buffer.tid(),
            "broadcast_output: propagating stream marks"
        );

        // Resolved before any state changes so a missing entry cannot leave
        // a half-issued broadcast behind.
        let key = TemplateKey::output(buffer.port_id(), buffer.tid(), 0, self.next_tid, true);
        let template = templates.get(key)?;

        // The stream marks ride in the control block so every consumer can
        // see them without reading buffer metadata.
        output
            .control_block()
            .set_stream_marks(buffer.meta().end_of_stream(), buffer.meta().end_of_whole());

        buffer.mark_full();

        for n in 0..input.port_count() {
            input.port(n).buffer(self.next_tid).mark_full();
        }

        template.produce()?;
        buffer.push_pending(key);
        Ok(())
    }

    /// Whether this output buffer's port currently holds the rotating
    /// barrier token. Only meaningful for token-rotating policies; others
    /// always hold it.
    pub fn have_output_barrier_token(&self, output: &PortSet, src_buf: &TransferBuffer) -> bool {
        match self.policy {
            Policy::LeastBusy { use_token: true, .. } => {
                output.control_block().token() == src_buf.port_id()
            }
            _ => true,
        }
    }

    // -- policy dispatch ------------------------------------------------

    /// Whether `buffer` can be handed off right now. A false return is
    /// ordinary backpressure, not an error; retry on the next dispatch
    /// cycle.
    pub fn can_produce(&mut self, output: &PortSet, input: &PortSet, buffer: &TransferBuffer) -> bool {
        match self.policy {
            Policy::RoundRobin => crate::round_robin::can_produce(self, output, input, buffer),
            Policy::LeastBusy { .. } => crate::least_busy::can_produce(self, output, input, buffer),
            Policy::Gated => crate::gated::can_produce(self, output, input, buffer),
        }
    }

    /// Hand `buffer` off to the input side and fire the matching template.
    /// Must only be called after `can_produce` returned true on the same
    /// dispatch cycle. Returns the template's gated-sequence hint.
    pub fn produce(
        &mut self,
        output: &PortSet,
        input: &PortSet,
        templates: &TemplateTable,
        buffer: &TransferBuffer,
        broadcast: bool,
    ) -> io::Result<u32> {
        if broadcast && !buffer.meta().end_of_stream() {
            warn!(
                port = buffer.port_id(),
                tid = buffer.tid(),
                "produce: broadcast requested without end-of-stream mark"
            );
        }
        match self.policy {
            Policy::RoundRobin => {
                crate::round_robin::produce(self, output, input, templates, buffer, broadcast)
            }
            Policy::LeastBusy { .. } => {
                crate::least_busy::produce(self, output, input, templates, buffer, broadcast)
            }
            Policy::Gated => crate::gated::produce(self, output, input, templates, buffer, broadcast),
        }
    }

    /// Mark an input buffer empty and fire its input-direction template,
    /// which releases backpressure toward the producer.
    pub fn consume(
        &mut self,
        templates: &TemplateTable,
        buffer: &TransferBuffer,
    ) -> io::Result<Option<BufferId>> {
        let key = TemplateKey::input(buffer.port_id(), buffer.tid());
        let template = templates.get(key)?;
        buffer.mark_empty();
        template.consume()
    }

    // -- retargeting ----------------------------------------------------

    /// Retarget the output template for `me` at the current slot to write
    /// into `new_buffer`'s memory. A zero-copy chain is retargeted by
    /// splicing the buffers; anything else gets its transport descriptor
    /// offsets rewritten in place.
    pub fn modify_output_offsets(
        &self,
        templates: &TemplateTable,
        input: &PortSet,
        me: &TransferBuffer,
        new_buffer: &TransferBuffer,
        reverse: bool,
    ) -> io::Result<()> {
        let key = TemplateKey::output(me.port_id(), me.tid(), 0, self.next_tid, false);
        let template = templates.get(key)?;

        if template.is_zero_copy() {
            if !reverse {
                me.attach_zero_copy(new_buffer.id());
            } else {
                me.detach_zero_copy();
            }
            return Ok(());
        }

        // A buffer that is itself a zero-copy view retargets to the buffer
        // it borrows from.
        let target_offset = if reverse {
            me.start_offset()
        } else {
            match new_buffer.zero_copy_from() {
                Some(id) => input.port(id.port).buffer(id.tid).start_offset(),
                None => new_buffer.start_offset(),
            }
        };
        let new_offsets = [target_offset, 0];
        let mut old_offsets = Vec::new();
        template.modify(&new_offsets, &mut old_offsets)
    }

    // -- teardown -------------------------------------------------------

    /// Reset every buffer of an input port to empty, clearing metadata and
    /// cursors. Teardown and re-initialization only.
    pub fn free_all_buffers_local(&mut self, port: &Port) {
        assert!(
            !port.is_output(),
            "free_all_buffers_local() called on output port {}",
            port.port_id()
        );
        self.empty_q = 0;
        port.reset_cursors();
        for buffer in port.buffers() {
            buffer.reset();
        }
    }

    /// Reset every buffer of an output port to empty, clearing metadata and
    /// cursors. Teardown and re-initialization only.
    pub fn consume_all_buffers_local(&mut self, port: &Port) {
        assert!(
            port.is_output(),
            "consume_all_buffers_local() called on input port {}",
            port.port_id()
        );
        self.fill_q = 0;
        port.reset_cursors();
        for buffer in port.buffers() {
            buffer.reset();
        }
    }
}

impl fmt::Debug for TransferController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferController")
            .field("policy", &self.policy)
            .field("whole_output_set", &self.whole_output_set)
            .field("next_tid", &self.next_tid)
            .field("fill_q", &self.fill_q)
            .field("empty_q", &self.empty_q)
            .finish()
    }
}
