// src/circuit.rs
//
// A circuit binds one output port set and one input port set to a transfer
// controller and the template table that serves them, for the lifetime of
// one application connection. The dispatch loop drives everything through
// this facade.

use crate::controller::TransferController;
use crate::Core::PortSet::{DataDistribution, PortSet};
use crate::Core::Template::{TemplateKey, TemplateTable, TransferTemplate};
use crate::DataPlane::Buffer::Buffer::{BufferId, TransferBuffer};

use std::fmt;
use std::io;
use tracing::debug;

/// Default spacing between per-slot transport offsets.
const DEFAULT_OFFSET_STRIDE: u64 = 4096;

pub struct Circuit {
    output: PortSet,
    input: PortSet,
    templates: TemplateTable,
    controller: TransferController,
}

impl Circuit {
    pub fn builder() -> CircuitBuilder {
        CircuitBuilder::new()
    }

    #[inline]
    pub fn output_set(&self) -> &PortSet {
        &self.output
    }

    #[inline]
    pub fn input_set(&self) -> &PortSet {
        &self.input
    }

    #[inline]
    pub fn controller(&self) -> &TransferController {
        &self.controller
    }

    /// Resolve an output-side buffer handle.
    pub fn output_buffer(&self, id: BufferId) -> &TransferBuffer {
        self.output.port(id.port).buffer(id.tid)
    }

    /// Resolve an input-side buffer handle.
    pub fn input_buffer(&self, id: BufferId) -> &TransferBuffer {
        self.input.port(id.port).buffer(id.tid)
    }

    // -- dispatch-loop surface ------------------------------------------

    pub fn has_empty_output_buffer(&self, port: u32) -> bool {
        self.controller.has_empty_output_buffer(self.output.port(port))
    }

    pub fn has_full_input_buffer(&self, port: u32) -> Option<BufferId> {
        self.controller.has_full_input_buffer(self.input.port(port))
    }

    /// Claim the next free output buffer of `port`, if any.
    pub fn next_empty_output_buffer(&mut self, port: u32) -> Option<BufferId> {
        self.controller.next_empty_output_buffer(self.output.port(port))
    }

    /// Claim the next full input buffer of `port`, if any.
    pub fn next_full_input_buffer(&mut self, port: u32) -> Option<BufferId> {
        self.controller.next_full_input_buffer(self.input.port(port))
    }

    /// Whether the buffer can be handed off this cycle. False means
    /// backpressure; retry on the next dispatch.
    pub fn can_produce(&mut self, id: BufferId) -> bool {
        let buffer = self.output.port(id.port).buffer(id.tid);
        self.controller.can_produce(&self.output, &self.input, buffer)
    }

    /// Hand a filled output buffer to the input side.
    pub fn produce(&mut self, id: BufferId, broadcast: bool) -> io::Result<u32> {
        let buffer = self.output.port(id.port).buffer(id.tid);
        self.controller
            .produce(&self.output, &self.input, &self.templates, buffer, broadcast)
    }

    /// Transport completion callback: the next input slot of `port` now
    /// holds arrived data.
    pub fn buffer_full(&mut self, port: u32) {
        self.controller.buffer_full(self.input.port(port));
    }

    /// Transport completion callback: the remote consumer released the next
    /// output slot of `port`.
    pub fn free_buffer(&mut self, port: u32) {
        self.controller.free_buffer(self.output.port(port));
    }

    /// Release a consumed input buffer back to the producer.
    pub fn consume(&mut self, id: BufferId) -> io::Result<Option<BufferId>> {
        let buffer = self.input.port(id.port).buffer(id.tid);
        self.controller.consume(&self.templates, buffer)
    }

    /// Retarget the current output template for `me` to `new_buffer`.
    pub fn modify_output_offsets(
        &self,
        me: BufferId,
        new_buffer: BufferId,
        reverse: bool,
    ) -> io::Result<()> {
        let me = self.output.port(me.port).buffer(me.tid);
        let nb = self.input.port(new_buffer.port).buffer(new_buffer.tid);
        self.controller
            .modify_output_offsets(&self.templates, &self.input, me, nb, reverse)
    }

    // -- teardown -------------------------------------------------------

    /// Reset all buffers of an input port to empty.
    pub fn free_all_buffers_local(&mut self, port: u32) {
        self.controller.free_all_buffers_local(self.input.port(port));
    }

    /// Reset all buffers of an output port to empty.
    pub fn consume_all_buffers_local(&mut self, port: u32) {
        self.controller.consume_all_buffers_local(self.output.port(port));
    }
}

impl fmt::Debug for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Circuit")
            .field("output", &self.output)
            .field("input", &self.input)
            .field("controller", &self.controller)
            .field("templates", &self.templates.len())
            .finish()
    }
}

/// Builds a circuit: port-set shapes, distribution policies and the
/// template registrations, validated together at `build`.
pub struct CircuitBuilder {
    output: Option<(u32, u32, DataDistribution)>,
    input: Option<(u32, u32, DataDistribution)>,
    offset_stride: u64,
    templates: Vec<(TemplateKey, Box<dyn TransferTemplate>)>,
}

impl Default for CircuitBuilder {
    fn default() -> Self {
        Self {
            output: None,
            input: None,
            offset_stride: DEFAULT_OFFSET_STRIDE,
            templates: Vec::new(),
        }
    }
}

impl CircuitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output_set(mut self, port_count: u32, buffer_count: u32, dist: DataDistribution) -> Self {
        self.output = Some((port_count, buffer_count, dist));
        self
    }

    pub fn input_set(mut self, port_count: u32, buffer_count: u32, dist: DataDistribution) -> Self {
        self.input = Some((port_count, buffer_count, dist));
        self
    }

    /// Spacing between per-slot transport offsets. Transports that manage
    /// their own addressing can leave the default.
    pub fn offset_stride(mut self, stride: u64) -> Self {
        self.offset_stride = stride;
        self
    }

    /// Register a transfer template for one 6-tuple. Duplicates are
    /// reported at `build`.
    pub fn template(mut self, key: TemplateKey, template: Box<dyn TransferTemplate>) -> Self {
        self.templates.push((key, template));
        self
    }

    pub fn build(self) -> io::Result<Circuit> {
        let (out_ports, out_bufs, out_dist) = self.output.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "CircuitBuilder::build(): no output port set configured",
            )
        })?;
        let (in_ports, in_bufs, in_dist) = self.input.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "CircuitBuilder::build(): no input port set configured",
            )
        })?;

        let output = PortSet::new(out_ports, out_bufs, true, out_dist, self.offset_stride);
        let input = PortSet::new(in_ports, in_bufs, false, in_dist, self.offset_stride);

        let controller = TransferController::create(&output, &input)?;

        let mut templates = TemplateTable::new();
        for (key, template) in self.templates {
            templates.add(key, template)?;
        }

        debug!(
            out_ports,
            out_bufs,
            in_ports,
            in_bufs,
            templates = templates.len(),
            controller = ?controller,
            "circuit built"
        );

        Ok(Circuit {
            output,
            input,
            templates,
            controller,
        })
    }
}
