use std::collections::HashMap;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use lumen_fixtures::Fixture;

use crate::error::{EngineError, Result};

/// DDP header length in bytes.
pub const DDP_HEADER_LEN: usize = 10;

/// Maximum payload per packet: 480 RGB pixels.
pub const MAX_CHUNK_BYTES: usize = 480 * 3;

const FLAG_VER1: u8 = 0x40;
const FLAG_PUSH: u8 = 0x01;
const DATA_TYPE_RGB8: u8 = 0x0B;
const DESTINATION_DEFAULT: u8 = 0x01;

/// One DDP packet prior to serialization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DdpPacket {
    pub sequence: u8,
    pub push: bool,
    pub byte_offset: u32,
    pub data: Vec<u8>,
}

impl DdpPacket {
    /// Serialize to the 10-byte header followed by the payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(DDP_HEADER_LEN + self.data.len());
        let flags = if self.push {
            FLAG_VER1 | FLAG_PUSH
        } else {
            FLAG_VER1
        };
        buf.push(flags);
        buf.push(self.sequence & 0x0F);
        buf.push(DATA_TYPE_RGB8);
        buf.push(DESTINATION_DEFAULT);
        buf.extend_from_slice(&self.byte_offset.to_be_bytes());
        buf.extend_from_slice(&(self.data.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.data);
        buf
    }
}

/// Split one frame into offset-ordered packets of at most
/// [`MAX_CHUNK_BYTES`]. Every chunk carries the same sequence number and
/// its absolute byte offset; only the final chunk sets PUSH.
pub fn chunk_frame(sequence: u8, byte_offset: u32, data: &[u8]) -> Vec<DdpPacket> {
    let chunk_count = data.len().div_ceil(MAX_CHUNK_BYTES).max(1);
    let mut packets = Vec::with_capacity(chunk_count);
    let mut offset = byte_offset;

    if data.is_empty() {
        packets.push(DdpPacket {
            sequence,
            push: true,
            byte_offset,
            data: Vec::new(),
        });
        return packets;
    }

    for (i, chunk) in data.chunks(MAX_CHUNK_BYTES).enumerate() {
        packets.push(DdpPacket {
            sequence,
            push: i == chunk_count - 1,
            byte_offset: offset,
            data: chunk.to_vec(),
        });
        offset += chunk.len() as u32;
    }
    packets
}

/// Next sequence value: 1..=15, wrapping 15 -> 1, never 0.
fn advance_sequence(seq: u8) -> u8 {
    if seq >= 15 {
        1
    } else {
        seq + 1
    }
}

/// UDP egress for DDP frames.
///
/// Owns one datagram socket. Stateless apart from the socket handle and a
/// per-fixture sequence counter; all errors are returned to the caller.
pub struct DdpSender {
    socket: UdpSocket,
    sequences: HashMap<String, u8>,
}

impl DdpSender {
    pub fn new() -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        Ok(DdpSender {
            socket,
            sequences: HashMap::new(),
        })
    }

    /// Send one frame of RGB bytes for `fixture` starting at
    /// `pixel_offset` pixels from the start of the display. Chunks are
    /// emitted in offset order under a single sequence number.
    pub fn send_pixels(&mut self, fixture: &Fixture, pixel_offset: usize, rgb: &[u8]) -> Result<()> {
        let addr = resolve_addr(fixture)?;
        let sequence = self.next_sequence(&fixture.id);
        let byte_offset = (pixel_offset * 3) as u32;

        for packet in chunk_frame(sequence, byte_offset, rgb) {
            self.socket.send_to(&packet.to_bytes(), addr)?;
        }
        Ok(())
    }

    /// Send an all-zero frame for `length` pixels so the fixture goes
    /// dark, with a final PUSH.
    pub fn send_blackout(&mut self, fixture: &Fixture, pixel_offset: usize, length: usize) -> Result<()> {
        let zeros = vec![0u8; length * 3];
        self.send_pixels(fixture, pixel_offset, &zeros)
    }

    fn next_sequence(&mut self, fixture_id: &str) -> u8 {
        let entry = self.sequences.entry(fixture_id.to_string()).or_insert(0);
        *entry = advance_sequence(*entry);
        *entry
    }
}

fn resolve_addr(fixture: &Fixture) -> Result<SocketAddr> {
    (fixture.address.as_str(), fixture.udp_port)
        .to_socket_addrs()
        .map_err(|_| EngineError::UnknownFixture(fixture.id.clone()))?
        .next()
        .ok_or_else(|| EngineError::UnknownFixture(fixture.id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(port: u16) -> Fixture {
        Fixture {
            id: "f1".to_string(),
            name: "F1".to_string(),
            address: "127.0.0.1".to_string(),
            udp_port: port,
            pixel_count: 500,
            spans: Vec::new(),
        }
    }

    #[test]
    fn test_header_layout() {
        let packet = DdpPacket {
            sequence: 7,
            push: true,
            byte_offset: 0x01020304,
            data: vec![1, 2, 3],
        };
        let bytes = packet.to_bytes();
        assert_eq!(bytes[0], 0x41); // VER1 | PUSH
        assert_eq!(bytes[1], 7);
        assert_eq!(bytes[2], 0x0B);
        assert_eq!(bytes[3], 0x01);
        assert_eq!(&bytes[4..8], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&bytes[8..10], &[0x00, 0x03]);
        assert_eq!(&bytes[10..], &[1, 2, 3]);
    }

    #[test]
    fn test_chunking_500_pixels() {
        // 500 px = 1500 bytes: 1440 + 60, PUSH only on the second chunk.
        let data = vec![0xAAu8; 1500];
        let packets = chunk_frame(3, 0, &data);
        assert_eq!(packets.len(), 2);

        assert_eq!(packets[0].byte_offset, 0);
        assert_eq!(packets[0].data.len(), 1440);
        assert!(!packets[0].push);

        assert_eq!(packets[1].byte_offset, 1440);
        assert_eq!(packets[1].data.len(), 60);
        assert!(packets[1].push);

        assert!(packets.iter().all(|p| p.sequence == 3));
        assert!(packets.iter().all(|p| p.data.len() <= MAX_CHUNK_BYTES));
    }

    #[test]
    fn test_chunk_offsets_are_contiguous() {
        let data = vec![0u8; 4000];
        let packets = chunk_frame(1, 300, &data);
        let mut expected = 300u32;
        for p in &packets {
            assert_eq!(p.byte_offset, expected);
            expected += p.data.len() as u32;
        }
        assert_eq!(packets.last().unwrap().push, true);
        assert_eq!(
            packets.iter().map(|p| p.data.len()).sum::<usize>(),
            4000
        );
    }

    #[test]
    fn test_sequence_cycles_one_to_fifteen() {
        let mut seq = 0u8;
        let mut seen = Vec::new();
        for _ in 0..31 {
            seq = advance_sequence(seq);
            seen.push(seq);
        }
        assert_eq!(seen[0], 1);
        assert_eq!(seen[14], 15);
        assert_eq!(seen[15], 1); // wrap 15 -> 1, never 0
        assert!(seen.iter().all(|s| (1..=15).contains(s)));
    }

    #[test]
    fn test_send_over_loopback() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = receiver.local_addr().unwrap().port();
        receiver
            .set_read_timeout(Some(std::time::Duration::from_secs(1)))
            .unwrap();

        let mut sender = DdpSender::new().unwrap();
        let rgb = vec![0x10u8; 30];
        sender.send_pixels(&fixture(port), 5, &rgb).unwrap();

        let mut buf = [0u8; 2048];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(len, DDP_HEADER_LEN + 30);
        assert_eq!(buf[0], 0x41);
        assert_eq!(buf[1], 1); // first frame for this fixture
        // 5 px offset = 15 bytes
        assert_eq!(&buf[4..8], &[0, 0, 0, 15]);
    }
}
