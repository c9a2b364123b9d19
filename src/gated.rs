// src/gated.rs
//
// Pattern 4: gated aggregation. When other stages have already issued
// transfer templates against a buffer, the hand-off is a fan-out gated on
// one of our own templates being observed in that pending list; with no
// pending transfers the round-robin path applies unchanged.

use crate::Core::PortSet::PortSet;
use crate::Core::Template::TemplateTable;
use crate::DataPlane::Buffer::Buffer::TransferBuffer;
use crate::{round_robin, TransferController};

use std::io;
use tracing::trace;

/// Type tag a template must carry for the gated controller to fire it. Any
/// stage may append templates to a buffer's pending list; only our own are
/// ours to complete.
pub(crate) const GATED_TEMPLATE_TYPE: u32 = 4;

pub(crate) fn can_produce(
    ctl: &mut TransferController,
    output: &PortSet,
    input: &PortSet,
    buffer: &TransferBuffer,
) -> bool {
    if ctl.whole_output_set && output.port(buffer.port_id()).rank() != 0 {
        return true;
    }
    // With nothing pending the round-robin predicate is exactly right.
    round_robin::can_produce(ctl, output, input, buffer)
}

pub(crate) fn produce(
    ctl: &mut TransferController,
    output: &PortSet,
    input: &PortSet,
    templates: &TemplateTable,
    buffer: &TransferBuffer,
    broadcast: bool,
) -> io::Result<u32> {
    let pending = buffer.pending_keys();
    if pending.is_empty() {
        return round_robin::produce(ctl, output, input, templates, buffer, broadcast);
    }

    trace!(pending = pending.len(), "produce: gated hand-off");

    // One produce per successful can_produce: fire the first of our own
    // templates found pending and stop.
    let mut total = 0;
    for key in pending {
        let template = templates.get(key)?;
        if template.type_id() != GATED_TEMPLATE_TYPE {
            continue;
        }

        // Effectively a broadcast: every input port's slot goes full, gated
        // on the prior stage's completion.
        for n in 0..input.port_count() {
            input.port(n).buffer(ctl.next_tid).mark_full();
        }

        total += template.produce_gated(0, ctl.next_tid)?;
        break;
    }

    Ok(total)
}
