pub use ddp::{chunk_frame, DdpPacket, DdpSender, DDP_HEADER_LEN, MAX_CHUNK_BYTES};

#[allow(clippy::module_inception)]
mod ddp;
