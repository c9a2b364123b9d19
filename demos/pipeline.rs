// In demos/pipeline.rs
//
// Small in-process pipeline: one producer port streaming numbered payloads
// through a circuit to one consumer port, with copy templates standing in
// for a real transport. Run with `cargo run --example pipeline [messages]`.
use dpxs_dataplane::Core::PortSet::DataDistribution;
use dpxs_dataplane::Core::Template::{TemplateKey, TransferTemplate};
use dpxs_dataplane::DataPlane::Buffer::Buffer::BufferId;
use dpxs_dataplane::CircuitBuilder;

use std::env;
use std::io;

/// Copy template: "moves" a payload by printing the hand-off it performs.
struct CopyTemplate {
    key: TemplateKey,
}

impl TransferTemplate for CopyTemplate {
    fn produce(&self) -> io::Result<()> {
        println!(
            "  xfer: out({},{}) -> in({},{})",
            self.key.out_port, self.key.out_tid, self.key.in_port, self.key.in_tid
        );
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

fn main() -> io::Result<()> {
    let args: Vec<String> = env::args().collect();
    let messages: u32 = if args.len() > 1 {
        args[1].parse().unwrap_or(8)
    } else {
        8
    };

    const OUT_BUFS: u32 = 2;
    const IN_BUFS: u32 = 3;

    let mut builder = CircuitBuilder::new()
        .output_set(1, OUT_BUFS, DataDistribution::whole())
        .input_set(1, IN_BUFS, DataDistribution::whole());
    for ot in 0..OUT_BUFS {
        for it in 0..IN_BUFS {
            for bcast in [false, true] {
                let key = TemplateKey::output(0, ot, 0, it, bcast);
                builder = builder.template(key, Box::new(CopyTemplate { key }));
            }
        }
    }
    for it in 0..IN_BUFS {
        let key = TemplateKey::input(0, it);
        builder = builder.template(key, Box::new(CopyTemplate { key }));
    }
    let mut circuit = builder.build()?;

    println!("Pipeline: streaming {} messages through {:?} slots", messages, (OUT_BUFS, IN_BUFS));

    let mut sent = 0u32;
    let mut received = 0u32;
    let mut claimed: Option<BufferId> = None;
    while received < messages {
        // Producer side: claim a free output buffer and hand it off.
        if sent < messages && claimed.is_none() {
            claimed = circuit.next_empty_output_buffer(0);
            if let Some(id) = claimed {
                circuit.output_buffer(id).meta().set_sequence(sent);
            }
        }
        if let Some(id) = claimed {
            if circuit.can_produce(id) {
                println!("produce #{sent}");
                circuit.produce(id, false)?;
                sent += 1;
                claimed = None;
            }
        }

        // Consumer side: drain anything that arrived.
        if let Some(id) = circuit.next_full_input_buffer(0) {
            let seq = circuit.input_buffer(id).meta().sequence();
            println!("consume #{seq}");
            circuit.consume(id)?;
            circuit.free_buffer(0);
            received += 1;
        }
    }

    println!("Done: {} sent, {} received", sent, received);
    Ok(())
}
