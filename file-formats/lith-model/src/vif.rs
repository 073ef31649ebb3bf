//! Decoder for the console vector-stream geometry batches.
//!
//! A console piece is not a flat vertex/index buffer. Geometry arrives as a
//! sequence of batches, each a command-tagged byte stream feeding the
//! vector unit: a connector block, one or more mesh sets of raw vertex
//! records, and an end command. No batch count is stored anywhere; the only
//! way to know a piece is finished is to peek ahead for another
//! direct/unpack command pair and treat any failure as the end.
//!
//! Decoded vertices are welded by exact position and the per-set vertex
//! runs expanded into triangles, reproducing the strip order the hardware
//! walked without ever representing the strip explicitly.

use std::collections::HashMap;
use std::io::{Read, Seek};

use crate::error::{ModelError, Result};
use crate::io_ext::{peek_with, ReadExt, SeekExt};
use crate::model::{Face, FaceVertex, Vertex};
use crate::types::{Vec2, Vec3};

/// `constant` field of the direct transfer command opening a batch.
const VIF_DIRECT: i16 = 0x50;
/// `code` field of the unpack command opening a batch.
const VIF_UNPACK: u8 = 0x6C;
/// Microprogram-call word closing a batch.
const VIF_MSCAL: i32 = 0x1500_0000;

/// Winding-order tag marking a mesh set whose triangles are reversed.
const WINDING_REVERSED: u32 = 0x8412;
/// Mesh-set flag value marking the last set of a batch.
const LAST_MESH_SET: u8 = 0x80;

/// Distance, in bytes, from the end command to where the next batch's
/// unpack command would sit (the size of the connector block).
const CONNECTOR_PEEK: i64 = 28;

/// Filler written into `sublod_vertex_index` for stream-decoded vertices.
const NO_SUBLOD_INDEX: u16 = 0xCDCD;

/// One 4-byte command word from the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VifCommand {
    constant: i16,
    variable: u8,
    code: u8,
}

impl VifCommand {
    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            constant: reader.read_i16_le()?,
            variable: reader.read_u8()?,
            code: reader.read_u8()?,
        })
    }

    /// True for the direct/unpack pair that opens every batch.
    fn opens_batch(self) -> bool {
        self.constant == VIF_DIRECT && self.code == VIF_UNPACK
    }
}

/// Vertices and faces recovered from one piece's batch stream.
#[derive(Debug, Default)]
pub struct DecodedGeometry {
    pub vertices: Vec<Vertex>,
    pub faces: Vec<Face>,
}

/// Accumulates stream vertices, welding duplicates by exact position.
///
/// The first occurrence of a position wins; later duplicates only add
/// another mesh-set association to the existing entry. Keys are the
/// formatted coordinates, not a fuzzy distance, so only bit-identical
/// positions merge.
#[derive(Debug, Default)]
pub struct VertexWelder {
    vertices: Vec<Vertex>,
    by_position: HashMap<String, u16>,
    /// Mesh-set ids in order of first appearance.
    set_ids: Vec<u32>,
    /// Every corner pushed, tagged with its originating mesh set.
    corners: Vec<(u32, FaceVertex)>,
}

impl VertexWelder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct positions seen so far.
    pub fn welded_len(&self) -> usize {
        self.vertices.len()
    }

    /// Adds one decoded vertex. `face_vertex.vertex_index` is rewritten to
    /// the welded index.
    pub fn push(&mut self, vertex: Vertex, set_id: u32, mut face_vertex: FaceVertex) -> Result<()> {
        let key = merge_key(vertex.location);
        let index = match self.by_position.get(&key) {
            Some(&existing) => existing,
            None => {
                let index = u16::try_from(self.vertices.len()).map_err(|_| {
                    ModelError::CorruptModel("welded vertex list exceeds 65535 entries".to_string())
                })?;
                self.vertices.push(vertex);
                self.by_position.insert(key, index);
                index
            }
        };
        face_vertex.vertex_index = index;
        if !self.set_ids.contains(&set_id) {
            self.set_ids.push(set_id);
        }
        self.corners.push((set_id, face_vertex));
        Ok(())
    }

    /// Expands the per-set vertex runs into triangles and returns the final
    /// geometry.
    ///
    /// Within a set the first two corners only bootstrap the run; every
    /// further corner emits one triangle. The winding alternates on each
    /// emission (`flip`), and the corner order additionally honors the
    /// per-set reversed tag recorded at decode time.
    pub fn into_geometry(self) -> DecodedGeometry {
        let mut faces = Vec::new();

        for &set_id in &self.set_ids {
            let run: Vec<&FaceVertex> = self
                .corners
                .iter()
                .filter(|(id, _)| *id == set_id)
                .map(|(_, fv)| fv)
                .collect();

            let mut flip = false;
            for i in 2..run.len() {
                let (a, b, c) = match (run[i].reversed, flip) {
                    (true, true) => (run[i - 1], run[i], run[i - 2]),
                    (true, false) => (run[i - 2], run[i], run[i - 1]),
                    (false, true) => (run[i], run[i - 1], run[i - 2]),
                    (false, false) => (run[i], run[i - 2], run[i - 1]),
                };
                faces.push(Face {
                    vertices: [*a, *b, *c],
                });
                flip = !flip;
            }
        }

        DecodedGeometry {
            vertices: self.vertices,
            faces,
        }
    }
}

fn merge_key(position: Vec3) -> String {
    format!("{:.6}/{:.6}/{:.6}", position.x, position.y, position.z)
}

/// Reads every batch of one piece's geometry stream into `welder`.
///
/// The first batch is assumed present; after each end command the decoder
/// peeks [`CONNECTOR_PEEK`] bytes ahead for another direct/unpack pair and
/// loops while one is found. A failed peek (EOF, short read) is an ordinary
/// end of data, never an error.
pub fn decode_batches<R: Read + Seek>(reader: &mut R, welder: &mut VertexWelder) -> Result<()> {
    let mut mesh_set_index: u32 = 1;
    let mut stream_index: u16 = 0;

    loop {
        read_batch(reader, welder, &mut mesh_set_index, &mut stream_index)?;

        let next = peek_with(reader, |r| {
            r.skip(CONNECTOR_PEEK)?;
            VifCommand::parse(r)
        });
        match next {
            Ok(command) if command.opens_batch() => {
                log::debug!("another geometry batch follows");
            }
            Ok(_) => break,
            Err(ModelError::TruncatedInput(_) | ModelError::Io(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn read_batch<R: Read + Seek>(
    reader: &mut R,
    welder: &mut VertexWelder,
    mesh_set_index: &mut u32,
    stream_index: &mut u16,
) -> Result<()> {
    // Connector block: transfer command, flush command, unpack command,
    // with interleaved words we carry as padding.
    let _transfer = VifCommand::parse(reader)?;
    reader.skip(4)?;
    let _flush = VifCommand::parse(reader)?;
    reader.skip(4 * 4)?;
    let _unpack = VifCommand::parse(reader)?;

    let mesh_set_count = reader.read_i32_le()?;
    let mesh_data_count = reader.read_i32_le()?;
    reader.skip(4 * 2)?;
    log::debug!("batch header: {mesh_set_count} sets, {mesh_data_count} data words");

    loop {
        let last = read_mesh_set(reader, welder, *mesh_set_index, stream_index)?;
        *mesh_set_index += 1;
        if last {
            break;
        }
    }

    // The four words before the end command are usually zero padding
    // terminated by the mscal word; when they are not, extra data precedes
    // the end command and is skipped.
    let tail = [
        reader.read_i32_le()?,
        reader.read_i32_le()?,
        reader.read_i32_le()?,
        reader.read_i32_le()?,
    ];
    if tail == [0, 0, 0, VIF_MSCAL] {
        reader.skip(-16)?;
    } else {
        log::debug!("extra data before batch end command");
    }
    // End command: three padding words and the microprogram call.
    reader.skip(4 * 3)?;
    let _code = reader.read_i32_le()?;
    Ok(())
}

/// Reads one mesh set. Returns true when this was the batch's last set.
fn read_mesh_set<R: Read + Seek>(
    reader: &mut R,
    welder: &mut VertexWelder,
    set_id: u32,
    stream_index: &mut u16,
) -> Result<bool> {
    let vertex_count = reader.read_u8()?;
    let flag = reader.read_u8()?;
    reader.skip(2)?;
    let _patch_start = reader.read_u32_le()?;
    let winding = reader.read_u32_le()?;
    let _unknown = reader.read_u32_le()?;
    let reversed = winding == WINDING_REVERSED;

    for _ in 0..vertex_count {
        let (location, normal, texcoord) = read_vertex_record(reader)?;
        let vertex = Vertex {
            location,
            normal,
            sublod_vertex_index: NO_SUBLOD_INDEX,
            ..Default::default()
        };
        let face_vertex = FaceVertex {
            texcoord,
            vertex_index: *stream_index,
            reversed,
        };
        welder.push(vertex, set_id, face_vertex)?;
        *stream_index = stream_index.wrapping_add(1);
    }

    Ok(flag == LAST_MESH_SET)
}

/// Reads one raw vertex record, handling the format's two record shapes.
///
/// Padded records carry the sentinel `1.0` at byte offset 12; records in
/// the wider variant layout put extra interleaved words first. The decoder
/// probes the sentinel position, backs up, and reads whichever shape is
/// present.
fn read_vertex_record<R: Read + Seek>(reader: &mut R) -> Result<(Vec3, Vec3, Vec2)> {
    reader.skip(4 * 3)?;
    let sentinel = reader.read_f32_le()?;
    if sentinel.to_bits() == 1.0f32.to_bits() {
        reader.skip(-16)?;
    }

    let location = Vec3::parse(reader)?;
    let _location_pad = reader.read_f32_le()?;
    let normal = Vec3::parse(reader)?;
    let _normal_pad = reader.read_f32_le()?;
    let texcoord = Vec2::parse(reader)?;
    let _stream_position = reader.read_f32_le()?;
    let _pad = reader.read_f32_le()?;
    Ok((location, normal, texcoord))
}
