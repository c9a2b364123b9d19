// A group of ports sharing one distribution policy

use super::Port::Port;
use crate::DataPlane::Structs::Meta_Structs::OutputControlBlock;

use std::fmt;

/// How buffers are distributed across the ports of a set.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DistributionType {
    /// Every input port receives every buffer; only rank 0 of an output
    /// set actually issues data movement.
    Whole,
    /// Buffers are spread across the ports of the set.
    Sequential,
}

/// Sub-policy for a sequential distribution.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DistributionSubType {
    RoundRobin,
    RandomEven,
    RandomStatistical,
    FirstAvailable,
    LeastBusy,
}

/// Whether each transfer carries a whole buffer or a part of one. Parts
/// delivery is what routes a connection through the gated controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DataPartition {
    Whole,
    Parts,
}

/// Distribution policy carried by a port set.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DataDistribution {
    pub dist_type: DistributionType,
    pub sub_type: DistributionSubType,
    pub partition: DataPartition,
}

impl DataDistribution {
    pub fn whole() -> Self {
        Self {
            dist_type: DistributionType::Whole,
            sub_type: DistributionSubType::RoundRobin,
            partition: DataPartition::Whole,
        }
    }

    pub fn sequential(sub_type: DistributionSubType) -> Self {
        Self {
            dist_type: DistributionType::Sequential,
            sub_type,
            partition: DataPartition::Whole,
        }
    }

    pub fn with_partition(mut self, partition: DataPartition) -> Self {
        self.partition = partition;
        self
    }
}

/// An ordered group of same-direction ports bound to one distribution
/// policy. Buffer counts are uniform across the set by construction.
pub struct PortSet {
    ports: Vec<Port>,
    buffer_count: u32,
    output: bool,
    distribution: DataDistribution,

    /// Shared producer-side control block. Present on every set but only
    /// the output side's is consulted.
    control: OutputControlBlock,
}

impl PortSet {
    /// Build a set of `port_count` ports, each with `buffer_count` slots.
    /// Port ids and ranks are assigned by position.
    pub fn new(
        port_count: u32,
        buffer_count: u32,
        output: bool,
        distribution: DataDistribution,
        offset_stride: u64,
    ) -> Self {
        assert!(port_count > 0, "a port set needs at least one port");
        assert!(buffer_count > 0, "a port needs at least one buffer");
        let ports = (0..port_count)
            .map(|id| Port::new(id, id, output, buffer_count, offset_stride))
            .collect();
        Self {
            ports,
            buffer_count,
            output,
            distribution,
            control: OutputControlBlock::default(),
        }
    }

    #[inline]
    pub fn port_count(&self) -> u32 {
        self.ports.len() as u32
    }

    #[inline]
    pub fn buffer_count(&self) -> u32 {
        self.buffer_count
    }

    #[inline]
    pub fn is_output(&self) -> bool {
        self.output
    }

    #[inline]
    pub fn distribution(&self) -> DataDistribution {
        self.distribution
    }

    pub fn port(&self, id: u32) -> &Port {
        &self.ports[id as usize]
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn control_block(&self) -> &OutputControlBlock {
        &self.control
    }
}

impl fmt::Debug for PortSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortSet")
            .field("port_count", &self.port_count())
            .field("buffer_count", &self.buffer_count)
            .field("output", &self.output)
            .field("distribution", &self.distribution)
            .finish_non_exhaustive()
    }
}
