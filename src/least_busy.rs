// src/least_busy.rs
//
// Patterns 2 and 3: busy-factor load balancing across input ports, with an
// optional rotating barrier token for mutual exclusion among peer producers
// of a sequential output set. Delivery order is load-skewed; the input side
// recovers ordering via (sequence, parts_sequence) metadata.

use crate::Core::PortSet::PortSet;
use crate::Core::Template::{TemplateKey, TemplateTable};
use crate::DataPlane::Buffer::Buffer::TransferBuffer;
use crate::{Policy, TransferController};

use std::io;
use tracing::trace;

/// Ready iff we hold the barrier token (when rotating) and some input port
/// has an empty slot. Among candidate ports the lowest busy factor wins,
/// first found on a tie; the selection is recorded for the matching
/// `produce`.
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

    if !ctl.have_output_barrier_token(output, buffer) {
        return false;
    }

    let mut selected: Option<u32> = None;
    let mut selected_tid = ctl.next_tid;

    for n in 0..input.port_count() {
        let port = input.port(n);
        for p in 0..input.buffer_count() {
            if !port.buffer(p).is_empty() {
                continue;
            }
            let better = match selected {
                Some(cur) => port.busy_factor() < input.port(cur).busy_factor(),
                None => true,
            };
            if better {
                selected = Some(n);
                selected_tid = p;
                trace!(
                    input_port = n,
                    next_tid = p,
                    busy_factor = port.busy_factor(),
                    "can_produce: candidate input"
                );
            }
            // First empty slot per port is enough.
            break;
        }
    }

    ctl.next_tid = selected_tid;
    match &mut ctl.policy {
        Policy::LeastBusy { input_port, .. } => *input_port = selected,
        _ => unreachable!("least_busy::can_produce on non-least-busy policy"),
    }
    selected.is_some()
}

pub(crate) fn produce(
    ctl: &mut TransferController,
    output: &PortSet,
    input: &PortSet,
    templates: &TemplateTable,
    buffer: &TransferBuffer,
    broadcast: bool,
) -> io::Result<u32> {
    if ctl.whole_output_set && output.port(buffer.port_id()).rank() != 0 {
        buffer.mark_empty();
        return Ok(0);
    }

    if broadcast {
        ctl.broadcast_output(output, input, templates, buffer)?;
        return Ok(0);
    }

    let target = match ctl.policy {
        Policy::LeastBusy { input_port, .. } => input_port,
        _ => unreachable!("least_busy::produce on non-least-busy policy"),
    };
    let target = target.expect("produce called without a successful can_produce");

    // Resolve the template before touching any state.
    let key = TemplateKey::output(buffer.port_id(), buffer.tid(), target, ctl.next_tid, false);
    let template = templates.get(key)?;

    buffer.mark_full();
    input.port(target).buffer(ctl.next_tid).mark_full();

    // Hand the token to the next peer producer.
    output.control_block().advance_token(output.port_count());

    template.produce()?;
    buffer.push_pending(key);

    trace!(
        input_port = target,
        next_tid = ctl.next_tid,
        token = output.control_block().token(),
        "produce: load-balanced hand-off"
    );

    Ok(0)
}
