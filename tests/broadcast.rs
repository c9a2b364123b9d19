use dpxs_dataplane::Core::PortSet::DataDistribution;
use dpxs_dataplane::Core::Template::{TemplateKey, TransferTemplate};
use dpxs_dataplane::DataPlane::Buffer::Buffer::BufferId;
use dpxs_dataplane::{Circuit, CircuitBuilder};

use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

#[derive(Default)]
struct BcastLog {
    fired: Mutex<Vec<TemplateKey>>,
}

struct BcastTemplate {
    key: TemplateKey,
    log: Arc<BcastLog>,
}

impl TransferTemplate for BcastTemplate {
    fn produce(&self) -> io::Result<()> {
        self.log.fired.lock().push(self.key);
        Ok(())
    }

    fn consume(&self) -> io::Result<Option<BufferId>> {
        Ok(None)
    }

    fn modify(&self, _new_offsets: &[u64], _old_offsets: &mut Vec<u64>) -> io::Result<()> {
        Ok(())
    }

    fn produce_gated(&self, _port_id: u32, _tid: u32) -> io::Result<u32> {
        Ok(0)
    }
}

fn build_circuit(in_ports: u32, in_bufs: u32) -> (Circuit, Arc<BcastLog>) {
    let log = Arc::new(BcastLog::default());
    let mut builder = CircuitBuilder::new()
        .output_set(1, 2, DataDistribution::whole())
        .input_set(in_ports, in_bufs, DataDistribution::whole());

    for ot in 0..2 {
        for it in 0..in_bufs {
            for bcast in [false, true] {
                let key = TemplateKey::output(0, ot, 0, it, bcast);
                builder = builder.template(key, Box::new(BcastTemplate { key, log: log.clone() }));
            }
        }
    }
    for ip in 0..in_ports {
        for it in 0..in_bufs {
            let key = TemplateKey::input(ip, it);
            builder = builder.template(key, Box::new(BcastTemplate { key, log: log.clone() }));
        }
    }

    (builder.build().unwrap(), log)
}

#[test]
fn broadcast_needs_a_common_empty_slot() {
    let (mut circuit, _log) = build_circuit(3, 2);

    // Slot 0 is blocked on one port, slot 1 on another: no common slot.
    circuit.input_set().port(0).buffer(0).mark_full();
    circuit.input_set().port(1).buffer(1).mark_full();

    let id = circuit.next_empty_output_buffer(0).unwrap();
    circuit.output_buffer(id).meta().set_end_of_stream(true);
    assert!(!circuit.can_produce(id));

    // Clearing one blockage opens candidate slot 1 on every port.
    circuit.input_set().port(1).buffer(1).mark_empty();
    assert!(circuit.can_produce(id));
}

#[test]
fn end_of_stream_broadcasts_to_every_port() {
    let (mut circuit, log) = build_circuit(3, 2);

    let id = circuit.next_empty_output_buffer(0).unwrap();
    circuit.output_buffer(id).meta().set_end_of_stream(true);
    circuit.output_buffer(id).meta().set_end_of_whole(true);

    assert!(circuit.can_produce(id));
    circuit.produce(id, true).unwrap();

    // Stream marks surfaced in the transport-visible control block.
    assert!(circuit.output_set().control_block().end_of_stream());
    assert!(circuit.output_set().control_block().end_of_whole());

    // Source went full, and the chosen slot went full on every input port.
    assert!(!circuit.output_buffer(id).is_empty());
    for p in 0..3 {
        assert!(!circuit.input_set().port(p).buffer(0).is_empty());
    }

    // Exactly one template fired: the broadcast variant.
    let fired = log.fired.lock();
    assert_eq!(fired.len(), 1);
    assert!(fired[0].broadcast);

    // And it was recorded against the source buffer.
    assert_eq!(circuit.output_buffer(id).pending_count(), 1);
    assert_eq!(circuit.output_buffer(id).pending_keys()[0], fired[0]);
}

#[test]
fn broadcast_skips_occupied_candidate_slots() {
    let (mut circuit, log) = build_circuit(2, 3);

    // Slot 0 is busy somewhere; the first common empty slot is 1.
    circuit.input_set().port(1).buffer(0).mark_full();

    let id = circuit.next_empty_output_buffer(0).unwrap();
    circuit.output_buffer(id).meta().set_end_of_stream(true);
    assert!(circuit.can_produce(id));
    circuit.produce(id, true).unwrap();

    assert_eq!(log.fired.lock()[0].in_tid, 1);
    for p in 0..2 {
        assert!(!circuit.input_set().port(p).buffer(1).is_empty());
    }
}
