//! # Wire Protocol
//!
//! Packet packing and unpacking. Every packet starts with a one-byte `PacketTag`; all
//! multi-byte fields are big-endian.
//!
//! | Packet          | Tag  | Payload                                                            |
//! |-----------------|------|--------------------------------------------------------------------|
//! | ChunkData       | 0x01 | coord (3×i32), float count (u32), floats, index count (u32), u32s  |
//! | PlayerMove      | 0x02 | x, y, z, yaw, pitch (5×f32)                                        |
//! | PlayerJoin      | 0x03 | name length (u32), UTF-8 name                                      |
//! | PlayerLeave     | 0x04 | none                                                               |
//! | SpawnPosition   | 0x05 | x, y, z (3×f32)                                                    |
//! | RespawnRequest  | 0x06 | none                                                               |
//!
//! ChunkData floats are interleaved per vertex: position xyz then normal xyz.

use num_derive::FromPrimitive;

use crate::error::ProtocolError;
use crate::server_state::meshing::vertex::{Vertex, FLOATS_PER_VERTEX};
use crate::server_state::meshing::Mesh;
use crate::server_state::voxels::coords::ChunkCoordinate;

/// The first byte of every packet.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u8)]
pub enum PacketTag {
    /// Server → client: one chunk's mesh.
    ChunkData = 0x01,
    /// Client → server: player position and orientation.
    PlayerMove = 0x02,
    /// Client → server: player announces its name.
    PlayerJoin = 0x03,
    /// Client → server: player is leaving.
    PlayerLeave = 0x04,
    /// Server → client: where the player spawns.
    SpawnPosition = 0x05,
    /// Client → server: player asks to be respawned.
    RespawnRequest = 0x06,
}

impl PacketTag {
    /// Parses a tag byte.
    pub fn from_byte(byte: u8) -> Result<Self, ProtocolError> {
        num::FromPrimitive::from_u8(byte).ok_or(ProtocolError::UnknownTag(byte))
    }
}

/// A decoded packet.
#[derive(Clone, Debug, PartialEq)]
pub enum Packet {
    ChunkData {
        coord: ChunkCoordinate,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
    },
    PlayerMove {
        x: f32,
        y: f32,
        z: f32,
        yaw: f32,
        pitch: f32,
    },
    PlayerJoin {
        name: String,
    },
    PlayerLeave,
    SpawnPosition {
        x: f32,
        y: f32,
        z: f32,
    },
    RespawnRequest,
}

impl Packet {
    /// The tag this packet is written with.
    pub fn tag(&self) -> PacketTag {
        match self {
            Packet::ChunkData { .. } => PacketTag::ChunkData,
            Packet::PlayerMove { .. } => PacketTag::PlayerMove,
            Packet::PlayerJoin { .. } => PacketTag::PlayerJoin,
            Packet::PlayerLeave => PacketTag::PlayerLeave,
            Packet::SpawnPosition { .. } => PacketTag::SpawnPosition,
            Packet::RespawnRequest => PacketTag::RespawnRequest,
        }
    }

    /// Serializes the packet to its wire form.
    pub fn pack(&self) -> Vec<u8> {
        match self {
            Packet::ChunkData {
                coord,
                vertices,
                indices,
            } => pack_chunk_parts(*coord, vertices, indices),
            Packet::PlayerMove {
                x,
                y,
                z,
                yaw,
                pitch,
            } => {
                let mut out = Writer::new(PacketTag::PlayerMove, 20);
                for value in [*x, *y, *z, *yaw, *pitch] {
                    out.f32(value);
                }
                out.finish()
            }
            Packet::PlayerJoin { name } => {
                let mut out = Writer::new(PacketTag::PlayerJoin, 4 + name.len());
                out.u32(name.len() as u32);
                out.bytes(name.as_bytes());
                out.finish()
            }
            Packet::PlayerLeave => Writer::new(PacketTag::PlayerLeave, 0).finish(),
            Packet::SpawnPosition { x, y, z } => {
                let mut out = Writer::new(PacketTag::SpawnPosition, 12);
                for value in [*x, *y, *z] {
                    out.f32(value);
                }
                out.finish()
            }
            Packet::RespawnRequest => Writer::new(PacketTag::RespawnRequest, 0).finish(),
        }
    }

    /// Parses a packet from its wire form.
    ///
    /// The whole buffer must be consumed; trailing bytes are an error.
    pub fn unpack(bytes: &[u8]) -> Result<Packet, ProtocolError> {
        let (&first, rest) = bytes.split_first().ok_or(ProtocolError::Empty)?;
        let tag = PacketTag::from_byte(first)?;
        let mut reader = Reader { tag, bytes: rest };

        let packet = match tag {
            PacketTag::ChunkData => {
                let coord = ChunkCoordinate::new(reader.i32()?, reader.i32()?, reader.i32()?);
                let float_count = reader.u32()?;
                if float_count as usize % FLOATS_PER_VERTEX != 0 {
                    return Err(ProtocolError::VertexStride(float_count));
                }
                let floats = reader.array(float_count, |chunk| {
                    f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
                })?;
                let vertices = floats
                    .chunks_exact(FLOATS_PER_VERTEX)
                    .map(|v| Vertex::from_floats([v[0], v[1], v[2], v[3], v[4], v[5]]))
                    .collect();
                let index_count = reader.u32()?;
                let indices = reader.array(index_count, |chunk| {
                    u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
                })?;
                Packet::ChunkData {
                    coord,
                    vertices,
                    indices,
                }
            }
            PacketTag::PlayerMove => Packet::PlayerMove {
                x: reader.f32()?,
                y: reader.f32()?,
                z: reader.f32()?,
                yaw: reader.f32()?,
                pitch: reader.f32()?,
            },
            PacketTag::PlayerJoin => {
                let length = reader.u32()? as usize;
                let raw = reader.take(length)?;
                let name = std::str::from_utf8(raw)
                    .map_err(|_| ProtocolError::InvalidName)?
                    .to_string();
                Packet::PlayerJoin { name }
            }
            PacketTag::PlayerLeave => Packet::PlayerLeave,
            PacketTag::SpawnPosition => Packet::SpawnPosition {
                x: reader.f32()?,
                y: reader.f32()?,
                z: reader.f32()?,
            },
            PacketTag::RespawnRequest => Packet::RespawnRequest,
        };

        reader.finish()?;
        Ok(packet)
    }
}

/// Serializes a chunk mesh directly into a ChunkData packet.
///
/// Equivalent to packing a `Packet::ChunkData` built from the mesh, without cloning the
/// vertex and index buffers first.
pub fn pack_chunk(coord: ChunkCoordinate, mesh: &Mesh) -> Vec<u8> {
    pack_chunk_parts(coord, &mesh.vertices, &mesh.indices)
}

fn pack_chunk_parts(coord: ChunkCoordinate, vertices: &[Vertex], indices: &[u32]) -> Vec<u8> {
    let float_count = vertices.len() * FLOATS_PER_VERTEX;
    let mut out = Writer::new(PacketTag::ChunkData, 12 + 4 + float_count * 4 + 4 + indices.len() * 4);
    out.i32(coord.x);
    out.i32(coord.y);
    out.i32(coord.z);
    out.u32(float_count as u32);
    for vertex in vertices {
        for value in vertex.to_floats() {
            out.f32(value);
        }
    }
    out.u32(indices.len() as u32);
    for index in indices {
        out.u32(*index);
    }
    out.finish()
}

struct Writer {
    buffer: Vec<u8>,
}

impl Writer {
    fn new(tag: PacketTag, payload_len: usize) -> Self {
        let mut buffer = Vec::with_capacity(1 + payload_len);
        buffer.push(tag as u8);
        Writer { buffer }
    }

    fn u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    fn i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    fn f32(&mut self, value: f32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    fn bytes(&mut self, value: &[u8]) {
        self.buffer.extend_from_slice(value);
    }

    fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

struct Reader<'a> {
    tag: PacketTag,
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, needed: usize) -> Result<&'a [u8], ProtocolError> {
        if self.bytes.len() < needed {
            return Err(ProtocolError::Truncated {
                tag: self.tag,
                needed,
                remaining: self.bytes.len(),
            });
        }
        let (head, tail) = self.bytes.split_at(needed);
        self.bytes = tail;
        Ok(head)
    }

    fn word(&mut self) -> Result<[u8; 4], ProtocolError> {
        let raw = self.take(4)?;
        Ok([raw[0], raw[1], raw[2], raw[3]])
    }

    fn u32(&mut self) -> Result<u32, ProtocolError> {
        self.word().map(u32::from_be_bytes)
    }

    fn i32(&mut self) -> Result<i32, ProtocolError> {
        self.word().map(i32::from_be_bytes)
    }

    fn f32(&mut self) -> Result<f32, ProtocolError> {
        self.word().map(f32::from_be_bytes)
    }

    /// Reads `count` four-byte elements. The length is checked before allocating, so a
    /// hostile count cannot trigger a huge allocation.
    fn array<T>(&mut self, count: u32, decode: impl Fn(&[u8]) -> T) -> Result<Vec<T>, ProtocolError> {
        let needed = (count as usize).checked_mul(4).unwrap_or(usize::MAX);
        let raw = self.take(needed)?;
        Ok(raw.chunks_exact(4).map(decode).collect())
    }

    fn finish(self) -> Result<(), ProtocolError> {
        if self.bytes.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::TrailingBytes {
                tag: self.tag,
                extra: self.bytes.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn sample_chunk() -> Packet {
        Packet::ChunkData {
            coord: ChunkCoordinate::new(-3, 0, 7),
            vertices: vec![
                Vertex::new([1.0, 2.0, 3.0], [0.0, 1.0, 0.0]),
                Vertex::new([-1.5, 2.25, 8.0], [1.0, 0.0, 0.0]),
                Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ],
            indices: vec![0, 1, 2],
        }
    }

    #[test_case(sample_chunk() ; "chunk data")]
    #[test_case(Packet::PlayerMove { x: 1.0, y: -2.0, z: 3.5, yaw: 90.0, pitch: -10.0 } ; "player move")]
    #[test_case(Packet::PlayerJoin { name: "Skywalker".to_string() } ; "player join")]
    #[test_case(Packet::PlayerJoin { name: String::new() } ; "empty name")]
    #[test_case(Packet::PlayerLeave ; "player leave")]
    #[test_case(Packet::SpawnPosition { x: 0.0, y: 33.8, z: 0.0 } ; "spawn position")]
    #[test_case(Packet::RespawnRequest ; "respawn request")]
    fn packets_survive_the_wire(packet: Packet) {
        let bytes = packet.pack();
        assert_eq!(bytes[0], packet.tag() as u8);
        assert_eq!(Packet::unpack(&bytes).unwrap(), packet);
    }

    #[test]
    fn chunk_layout_is_big_endian() {
        let bytes = sample_chunk().pack();
        assert_eq!(bytes[0], 0x01);
        assert_eq!(&bytes[1..5], &(-3i32).to_be_bytes());
        assert_eq!(&bytes[9..13], &7i32.to_be_bytes());
        // 3 vertices × 6 floats
        assert_eq!(&bytes[13..17], &18u32.to_be_bytes());
        assert_eq!(&bytes[17..21], &1.0f32.to_be_bytes());
        assert_eq!(bytes.len(), 1 + 12 + 4 + 18 * 4 + 4 + 3 * 4);
    }

    #[test]
    fn pack_chunk_matches_packet_encoding() {
        let Packet::ChunkData { coord, vertices, indices } = sample_chunk() else {
            unreachable!()
        };
        let mesh = Mesh {
            vertices: vertices.clone(),
            indices: indices.clone(),
        };
        assert_eq!(
            pack_chunk(coord, &mesh),
            Packet::ChunkData { coord, vertices, indices }.pack()
        );
    }

    #[test]
    fn empty_buffer_is_rejected() {
        assert_eq!(Packet::unpack(&[]), Err(ProtocolError::Empty));
    }

    #[test_case(0x00)]
    #[test_case(0x07)]
    #[test_case(0xff)]
    fn unknown_tags_are_rejected(tag: u8) {
        assert_eq!(Packet::unpack(&[tag, 0, 0]), Err(ProtocolError::UnknownTag(tag)));
    }

    #[test]
    fn truncated_move_is_rejected() {
        let bytes = Packet::PlayerMove { x: 1.0, y: 2.0, z: 3.0, yaw: 0.0, pitch: 0.0 }.pack();
        assert!(matches!(
            Packet::unpack(&bytes[..bytes.len() - 1]),
            Err(ProtocolError::Truncated { tag: PacketTag::PlayerMove, .. })
        ));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = Packet::PlayerLeave.pack();
        bytes.push(0xAA);
        assert_eq!(
            Packet::unpack(&bytes),
            Err(ProtocolError::TrailingBytes { tag: PacketTag::PlayerLeave, extra: 1 })
        );
    }

    #[test]
    fn bad_vertex_stride_is_rejected() {
        let mut bytes = vec![0x01];
        for v in [0i32, 0, 0] {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        bytes.extend_from_slice(&5u32.to_be_bytes());
        assert_eq!(Packet::unpack(&bytes), Err(ProtocolError::VertexStride(5)));
    }

    #[test]
    fn hostile_lengths_fail_without_allocating() {
        let mut bytes = vec![0x03];
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            Packet::unpack(&bytes),
            Err(ProtocolError::Truncated { tag: PacketTag::PlayerJoin, .. })
        ));
    }

    #[test]
    fn invalid_utf8_name_is_rejected() {
        let mut bytes = vec![0x03];
        bytes.extend_from_slice(&2u32.to_be_bytes());
        bytes.extend_from_slice(&[0xC3, 0x28]);
        assert_eq!(Packet::unpack(&bytes), Err(ProtocolError::InvalidName));
    }
}
