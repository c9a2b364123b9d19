use dpxs_dataplane::Core::PortSet::{DataDistribution, DistributionSubType};
use dpxs_dataplane::Core::Template::{TemplateKey, TransferTemplate};
use dpxs_dataplane::DataPlane::Buffer::Buffer::BufferId;
use dpxs_dataplane::{Circuit, CircuitBuilder};

use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

/// Records the output keys fired, in order.
#[derive(Default)]
struct FiredLog {
    keys: Mutex<Vec<TemplateKey>>,
}

struct RecordingTemplate {
    key: TemplateKey,
    log: Arc<FiredLog>,
}

impl TransferTemplate for RecordingTemplate {
    fn produce(&self) -> io::Result<()> {
        self.log.keys.lock().push(self.key);
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

/// Circuit with a load-balanced (least-busy) input set. `sequential_output`
/// selects the token-rotating variant.
fn build_circuit(
    out_ports: u32,
    out_bufs: u32,
    in_ports: u32,
    in_bufs: u32,
    sequential_output: bool,
) -> (Circuit, Arc<FiredLog>) {
    let log = Arc::new(FiredLog::default());
    let out_dist = if sequential_output {
        DataDistribution::sequential(DistributionSubType::RoundRobin)
    } else {
        DataDistribution::whole()
    };
    let mut builder = CircuitBuilder::new()
        .output_set(out_ports, out_bufs, out_dist)
        .input_set(in_ports, in_bufs, DataDistribution::sequential(DistributionSubType::LeastBusy));

    for op in 0..out_ports {
        for ot in 0..out_bufs {
            for ip in 0..in_ports {
                for it in 0..in_bufs {
                    for bcast in [false, true] {
                        let key = TemplateKey::output(op, ot, ip, it, bcast);
                        builder = builder.template(
                            key,
                            Box::new(RecordingTemplate { key, log: log.clone() }),
                        );
                    }
                }
            }
        }
    }
    for ip in 0..in_ports {
        for it in 0..in_bufs {
            let key = TemplateKey::input(ip, it);
            builder = builder.template(key, Box::new(RecordingTemplate { key, log: log.clone() }));
        }
    }

    (builder.build().unwrap(), log)
}

#[test]
fn unsupported_sequential_sub_types_are_rejected() {
    for sub in [
        DistributionSubType::RoundRobin,
        DistributionSubType::RandomEven,
        DistributionSubType::RandomStatistical,
        DistributionSubType::FirstAvailable,
    ] {
        let err = CircuitBuilder::new()
            .output_set(1, 2, DataDistribution::whole())
            .input_set(1, 2, DataDistribution::sequential(sub))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}

#[test]
fn least_busy_input_port_wins() {
    let (mut circuit, log) = build_circuit(1, 2, 3, 2, false);

    circuit.input_set().port(0).set_busy_factor(9);
    circuit.input_set().port(1).set_busy_factor(2);
    circuit.input_set().port(2).set_busy_factor(5);

    let id = circuit.next_empty_output_buffer(0).unwrap();
    assert!(circuit.can_produce(id));
    circuit.produce(id, false).unwrap();

    let fired = log.keys.lock();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].in_port, 1);
    // Only the selected port's slot went full.
    assert!(!circuit.input_set().port(1).buffer(fired[0].in_tid).is_empty());
    assert!(circuit.input_set().port(0).buffer(0).is_empty());
    assert!(circuit.input_set().port(2).buffer(0).is_empty());
}

#[test]
fn busy_factor_tie_takes_first_port() {
    let (mut circuit, log) = build_circuit(1, 2, 2, 2, false);

    // Equal load everywhere: first found wins.
    let id = circuit.next_empty_output_buffer(0).unwrap();
    assert!(circuit.can_produce(id));
    circuit.produce(id, false).unwrap();

    assert_eq!(log.keys.lock()[0].in_port, 0);
}

#[test]
fn barrier_token_rotates_across_producers() {
    let (mut circuit, _log) = build_circuit(2, 2, 1, 4, true);

    assert_eq!(circuit.output_set().control_block().token(), 0);

    // Port 1 does not hold the token yet.
    let blocked = BufferId::new(1, 0);
    circuit.output_buffer(blocked).set_in_use(true);
    assert!(!circuit.can_produce(blocked));
    circuit.output_buffer(blocked).set_in_use(false);

    // Producers alternate as the token rotates: after K produces the token
    // reads K mod 2.
    for k in 0..4u32 {
        let id = BufferId::new(k % 2, (k / 2) % 2);
        circuit.output_buffer(id).set_in_use(true);
        assert!(circuit.can_produce(id), "producer {} should hold the token", k % 2);
        circuit.produce(id, false).unwrap();
        assert_eq!(circuit.output_set().control_block().token(), (k + 1) % 2);
    }
}

#[test]
fn input_buffers_drain_in_metadata_order() {
    let (mut circuit, _log) = build_circuit(1, 2, 1, 3, false);

    // Arrivals land out of queue order: slots carry sequences 5, 3, 4.
    let port = circuit.input_set().port(0);
    for (tid, seq) in [(0u32, 5u32), (1, 3), (2, 4)] {
        port.buffer(tid).meta().set_sequence(seq);
        port.buffer(tid).mark_full();
    }

    let mut drained = Vec::new();
    while let Some(id) = circuit.next_full_input_buffer(0) {
        drained.push(circuit.input_buffer(id).meta().sequence());
        circuit.consume(id).unwrap();
    }
    assert_eq!(drained, vec![3, 4, 5]);
}
