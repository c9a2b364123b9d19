// Module naming follows project convention (DPXS = Data-Plane Xfer Sync)
#[allow(non_snake_case)]
pub mod DataPlane {
    pub mod Buffer {
        pub mod Buffer;
        pub mod Buffer_impl;
        pub use Buffer::{BufferId, TransferBuffer}; // re-export for stable path
    }
    pub mod Structs {
        pub mod Meta_Structs;
        pub use Meta_Structs::{BufferMetaData, OutputControlBlock}; // re-export for stable path
    }
}
#[allow(non_snake_case)]
pub mod Core {
    pub mod Port;
    pub mod PortSet;
    pub mod Template;
    pub use PortSet::{DataDistribution, DataPartition, DistributionSubType, DistributionType};
    pub use Template::{TemplateKey, TemplateTable, TransferDirection, TransferTemplate};
}

mod circuit;
mod controller;
mod gated;
mod least_busy;
mod round_robin;

pub use circuit::{Circuit, CircuitBuilder};
pub use controller::{Policy, TransferController};
