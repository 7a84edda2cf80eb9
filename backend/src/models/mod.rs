//! Domain models for the ring simulator

pub mod buffer;
pub mod channel;
pub mod event;
pub mod node;
pub mod packet;

// Re-exports
pub use buffer::{Buffer, Enqueue};
pub use channel::{ChannelError, WavelengthChannels};
pub use event::{Event, EventKind, EventLog, EventRecord, EventTag};
pub use node::{Node, NodeSpec};
pub use packet::{DropReason, NodeId, Packet, PacketError, PacketId, PacketStatus, Wavelength};
