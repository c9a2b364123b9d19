// src/round_robin.rs
//
// Pattern 1: deterministic round robin with lock-step fan-out. The Nth
// non-broadcast hand-off always lands in slot N mod buffer_count of every
// input port simultaneously.

use crate::Core::PortSet::PortSet;
use crate::Core::Template::{TemplateKey, TemplateTable};
use crate::DataPlane::Buffer::Buffer::TransferBuffer;
use crate::TransferController;

use std::io;
use tracing::trace;

/// Ready iff every input port has an empty buffer at the current target
/// slot. Non-rank-0 ports of a whole output set never gate, and an
/// end-of-stream buffer goes through the broadcast check instead.
pub(crate) fn can_produce(
    ctl: &mut TransferController,
    output: &PortSet,
    input: &PortSet,
    buffer: &TransferBuffer,
) -> bool {
    if ctl.whole_output_set && output.port(buffer.port_id()).rank() != 0 {
        return true;
    }

    if buffer.meta().end_of_stream() {
        return ctl.can_broadcast(output, input, buffer);
    }

    // The input rings run in lock step, so only the slot at the cursor
    // needs checking.
    for n in 0..input.port_count() {
        if !input.port(n).buffer(ctl.next_tid).is_empty() {
            return false;
        }
    }
    true
}

pub(crate) fn produce(
    ctl: &mut TransferController,
    output: &PortSet,
    input: &PortSet,
    templates: &TemplateTable,
    buffer: &TransferBuffer,
    broadcast: bool,
) -> io::Result<u32> {
    // Rank 0 already moved the data for the whole set; everyone else just
    // releases their local buffer and compensates the cursor for the slot
    // they skipped.
    if ctl.whole_output_set && output.port(buffer.port_id()).rank() != 0 {
        buffer.mark_empty();
        ctl.next_tid = (ctl.next_tid % input.buffer_count()).saturating_sub(1);
        trace!(next_tid = ctl.next_tid, "produce: non-rank-0 skip");
        return Ok(0);
    }

    if broadcast {
        ctl.broadcast_output(output, input, templates, buffer)?;
        return Ok(0);
    }

    // The output slot is a given here, so the input slot is the only part
    // of the template key that varies per cycle. Resolved before any state
    // changes: a mis-wired table must not leave half a hand-off behind.
    let key = TemplateKey::output(buffer.port_id(), buffer.tid(), 0, ctl.next_tid, false);
    let template = templates.get(key)?;

    buffer.mark_full();

    // Lock-step fan-out: the same slot goes full on every input port.
    for n in 0..input.port_count() {
        input.port(n).buffer(ctl.next_tid).mark_full();
    }

    template.produce()?;
    buffer.push_pending(key);

    ctl.next_tid = (ctl.next_tid + 1) % input.buffer_count();
    trace!(next_tid = ctl.next_tid, "produce: advanced input slot");

    Ok(template.max_gated_sequence())
}
