//! Reader for the console (PS2) LTB variant.
//!
//! The console build strips plaintext names in favor of seeded 32-bit
//! hashes, stores geometry as vector-unit batch streams instead of flat
//! buffers, and compresses animation channels to 16-bit fixed point. The
//! reader follows the header's offset table; sections are not contiguous,
//! so every section read starts with an explicit seek. Section-local damage
//! is downgraded to a warning and an empty section because later sections
//! are independently addressed.

use std::io::{Read, Seek, SeekFrom};

use crate::attachment::resolve_attachments;
use crate::error::{ModelError, Result};
use crate::hash::{HashLookup, NameKind};
use crate::io_ext::{read_string_or_placeholder, ReadExt, SeekExt};
use crate::model::{
    Animation, ChildModel, Keyframe, Lod, MeshType, Model, Node, NodeFlags, Piece, Socket, Vertex,
    Weight, WeightSet,
};
use crate::types::{Mat4, Quat, Transform, Vec3};
use crate::vif::{decode_batches, VertexWelder};

const FILE_TYPE: i32 = 2;
const VERSION: i16 = 16;

/// Rotation channels always divide by this constant.
const SCALE_ROT: f32 = 0x4000 as f32;
/// Position scale when the per-transform flag is nonzero.
const SCALE_LOC_SMALL: f32 = 0x10 as f32;
/// Position scale when the per-transform flag is zero.
const SCALE_LOC_LARGE: f32 = 0x1000 as f32;

/// Counts past these values are treated as section corruption.
const MAX_ANIMATIONS: u32 = 1000;
const MAX_SOCKETS: u32 = 50;
const MAX_WEIGHT_SETS: u32 = 1000;

/// Fixed-point divisor for skeletal vertex weights.
const WEIGHT_DENOMINATOR: f32 = 4096.0;

#[derive(Debug, Clone, Copy, Default)]
struct SectionOffsets {
    pieces: u32,
    nodes: u32,
    child_models: u32,
    animations: u32,
    sockets: u32,
    file_size: u32,
}

/// Stateful driver for one console LTB read.
///
/// All fields are transient; a fresh reader is cheap and one instance
/// should not be reused across files.
#[derive(Debug, Default)]
pub struct Ps2LtbReader {
    node_count: u32,
    lod_count: u32,
    socket_count: u32,
    sockets_synthesized: u32,
    animations_synthesized: u32,
    hasher: Option<HashLookup>,
}

impl Ps2LtbReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a whole console LTB file into a model graph.
    ///
    /// Fails with [`ModelError::UnsupportedFormat`] when the file-type or
    /// version tag does not match; callers then probe another reader.
    pub fn read<R: Read + Seek>(&mut self, reader: &mut R) -> Result<Model> {
        let mut model = Model::default();

        let file_type = reader.read_i32_le()?;
        let version = reader.read_i16_le()?;
        if file_type != FILE_TYPE || version != VERSION {
            return Err(ModelError::UnsupportedFormat {
                format: "PS2 LTB",
                file_type: file_type as u32,
                version: u32::from(version as u16),
            });
        }
        // Reserved fields.
        reader.skip(2 + 4 * 3)?;

        let offsets = SectionOffsets {
            pieces: {
                let _offset_offset = reader.read_i32_le()?;
                reader.read_i32_le()? as u32
            },
            nodes: reader.read_i32_le()? as u32,
            child_models: reader.read_i32_le()? as u32,
            animations: reader.read_i32_le()? as u32,
            sockets: reader.read_i32_le()? as u32,
            file_size: reader.read_i32_le()? as u32,
        };
        reader.skip(4)?;

        let stream_len = stream_length(reader)?;
        check_offsets(&offsets, stream_len)?;

        let _keyframe_count = reader.read_i32_le()?;
        let _animation_count = reader.read_i32_le()?;
        self.node_count = reader.read_i32_le()? as u32;
        let _piece_count = reader.read_i32_le()?;
        let _child_model_count = reader.read_i32_le()?;
        let _triangle_count = reader.read_i32_le()?;
        let _vertex_count = reader.read_i32_le()?;
        let _weight_count = reader.read_i32_le()?;
        self.lod_count = reader.read_i32_le()? as u32;
        self.socket_count = reader.read_i32_le()? as u32;
        let _weight_set_count = reader.read_i32_le()?;
        let _string_count = reader.read_i32_le()?;
        let _string_length = reader.read_i32_le()?;
        let _unknown = reader.read_i32_le()?;

        model.command_string = read_string_or_placeholder(reader)?;
        model.internal_radius = reader.read_f32_le()?;
        model.version = u32::from(version as u16);
        model.lod_count = self.lod_count;

        let hash_magic = reader.read_i32_le()? as u32;
        reader.skip(4 * 2)?;
        self.hasher = Some(HashLookup::new(hash_magic));

        reader.seek(SeekFrom::Start(u64::from(offsets.pieces)))?;
        model.pieces = self.read_pieces(reader)?;

        reader.seek(SeekFrom::Start(u64::from(offsets.nodes)))?;
        model.nodes = self.read_nodes(reader)?;
        model.link_nodes()?;

        resolve_attachments(&mut model);

        // Weight sets directly follow the node records, no offset entry.
        model.weight_sets = match self.read_weight_sets(reader) {
            Ok(sets) => sets,
            Err(e) => {
                log::warn!("skipping weight sets: {e}");
                Vec::new()
            }
        };

        reader.seek(SeekFrom::Start(u64::from(offsets.child_models)))?;
        model.child_models = match self.read_child_models(reader) {
            Ok(children) => children,
            Err(e) => {
                log::warn!("skipping child models: {e}");
                Vec::new()
            }
        };

        reader.seek(SeekFrom::Start(u64::from(offsets.animations)))?;
        model.animations = match self.read_animations(reader) {
            Ok(animations) => animations,
            Err(e) => {
                log::warn!("skipping animations: {e}");
                Vec::new()
            }
        };

        reader.seek(SeekFrom::Start(u64::from(offsets.sockets)))?;
        model.sockets = match self.read_sockets(reader) {
            Ok(sockets) => sockets,
            Err(e) => {
                log::warn!("skipping sockets: {e}");
                Vec::new()
            }
        };

        Ok(model)
    }

    fn read_pieces<R: Read + Seek>(&mut self, reader: &mut R) -> Result<Vec<Piece>> {
        let piece_count = reader.read_i32_le()?;
        if !(0..=10_000).contains(&piece_count) {
            return Err(ModelError::CorruptSection {
                section: "pieces",
                reason: format!("implausible piece count {piece_count}"),
            });
        }
        log::debug!("reading {piece_count} pieces");

        let mut pieces = Vec::with_capacity(piece_count as usize);
        for piece_index in 0..piece_count {
            pieces.push(self.read_piece(reader, piece_index as u32)?);
        }
        Ok(pieces)
    }

    fn read_piece<R: Read + Seek>(&mut self, reader: &mut R, piece_index: u32) -> Result<Piece> {
        let hashed_name = reader.read_i32_le()? as u32;
        let specular_power = reader.read_f32_le()?;
        let specular_scale = reader.read_f32_le()?;
        let lod_weight = reader.read_f32_le()?;
        reader.skip(4 * 9)?;
        let texture_index = reader.read_i32_le()?;
        reader.skip(4 * 2)?;
        let _four = reader.read_i32_le()?;

        let mut piece = Piece {
            name: self
                .lookup_name(NameKind::Piece, hashed_name)
                .unwrap_or_else(|| format!("Piece {piece_index}")),
            material_index: texture_index as u16,
            specular_power,
            specular_scale,
            lod_weight,
            ..Default::default()
        };

        for lod_index in 0..self.lod_count {
            log::debug!("piece {piece_index} LOD {lod_index}");
            piece.lods.push(self.read_lod(reader)?);
        }
        piece.mesh_type = piece.lods.first().and_then(|lod| lod.mesh_type);
        Ok(piece)
    }

    fn read_lod<R: Read + Seek>(&mut self, reader: &mut R) -> Result<Lod> {
        let raw_mesh_type = reader.read_i32_le()? as u32;
        let mesh_type = MeshType::from_raw(raw_mesh_type);
        if mesh_type.is_none() {
            log::warn!("unknown mesh type tag {raw_mesh_type}");
        }

        let mut weight_sector_size = 0u32;
        if mesh_type == Some(MeshType::Skeletal) {
            let _unknown = reader.read_i32_le()?;
            weight_sector_size = reader.read_i32_le()? as u32;
        }

        let declared_vertex_count = reader.read_i32_le()? as u32;
        let node_binding = reader.read_i32_le()? as u32;

        let mut welder = VertexWelder::new();
        decode_batches(reader, &mut welder)?;
        let geometry = welder.into_geometry();

        let mut lod = Lod {
            mesh_type,
            node_binding,
            vertices: geometry.vertices,
            faces: geometry.faces,
        };

        if mesh_type == Some(MeshType::Skeletal) {
            self.read_skeletal_weights(
                reader,
                &mut lod,
                declared_vertex_count,
                node_binding,
                weight_sector_size,
            )?;
        }
        Ok(lod)
    }

    /// Reads the side sector that follows a skeletal LOD's batches: a
    /// skip-list of opaque entries, the stream-ordered vertex table, the
    /// local-to-global node map, and one packed weight record per vertex.
    fn read_skeletal_weights<R: Read + Seek>(
        &self,
        reader: &mut R,
        lod: &mut Lod,
        vertex_count: u32,
        bone_count: u32,
        sector_size: u32,
    ) -> Result<()> {
        let sector_start = reader.stream_position()?;
        loop {
            let skip = reader.read_u16_le()?;
            reader.skip(i64::from(skip) * 2)?;

            let consumed = (reader.stream_position()? - sector_start) / 2;
            if consumed >= u64::from(sector_size) {
                // Scan for the 1.0 marker opening the ordered vertex table.
                loop {
                    let mut probe = [0.0f32; 4];
                    for value in &mut probe {
                        *value = reader.read_f32_le()?;
                    }
                    if probe[3].to_bits() == 1.0f32.to_bits() {
                        reader.skip(-16)?;
                        break;
                    }
                    reader.skip(-14)?;
                }
                break;
            }
        }

        let mut ordered = Vec::with_capacity(vertex_count as usize);
        for _ in 0..vertex_count {
            let location = Vec3::parse(reader)?;
            let _location_pad = reader.read_f32_le()?;
            let _normal = Vec3::parse(reader)?;
            let _normal_pad = reader.read_f32_le()?;
            ordered.push(location);
        }

        let mut node_map = Vec::with_capacity(bone_count as usize);
        for _ in 0..bone_count {
            node_map.push(reader.read_i32_le()?);
        }
        log::debug!("skeletal node map: {node_map:?}");

        for location in &ordered {
            let mut raw_weights = [0i16; 4];
            for value in &mut raw_weights {
                *value = reader.read_i16_le()?;
            }
            let mut raw_nodes = [0i8; 4];
            for value in &mut raw_nodes {
                *value = reader.read_i8()?;
            }

            let mut weights = Vec::new();
            let mut pair_index = 0usize;
            for &raw in &raw_weights {
                // Zero-weight slots are padding, not influences. The n-th
                // nonzero weight pairs with the n-th node byte.
                if raw == 0 {
                    continue;
                }
                let raw_node = raw_nodes[pair_index];
                pair_index += 1;
                let local_slot = if raw_node == 0 { 0 } else { raw_node / 4 };
                if local_slot < 0 {
                    log::warn!("negative bone slot {local_slot} in packed weight record");
                    continue;
                }
                let local = local_slot as usize;
                let Some(&global) = node_map.get(local) else {
                    log::warn!("weight references bone slot {local} outside the node map");
                    continue;
                };
                weights.push(Weight {
                    node_index: global as u32,
                    location: *location,
                    bias: f32::from(raw) / WEIGHT_DENOMINATOR,
                });
            }

            // Weights are matched back to welded vertices by exact position.
            if let Some(vertex) = find_vertex_by_position(&mut lod.vertices, *location) {
                vertex.weights = weights;
            }
        }
        Ok(())
    }

    fn read_nodes<R: Read + Seek>(&self, reader: &mut R) -> Result<Vec<Node>> {
        let mut nodes = Vec::with_capacity(self.node_count as usize);
        for i in 0..self.node_count {
            let name = read_string_or_placeholder(reader)?;
            let bind_matrix = Mat4::parse(reader)?;
            reader.skip(4)?;
            let child_count = reader.read_u32_le()?;
            let index = reader.read_u16_le()?;
            reader.skip(2)?;
            nodes.push(Node {
                name,
                index,
                // Console records carry no flag byte; the root is the one
                // node consumers expect to be removable.
                flags: if i == 0 {
                    NodeFlags::REMOVABLE
                } else {
                    NodeFlags::empty()
                },
                bind_matrix,
                child_count,
                ..Default::default()
            });
        }
        Ok(nodes)
    }

    fn read_weight_sets<R: Read + Seek>(&self, reader: &mut R) -> Result<Vec<WeightSet>> {
        let count = reader.read_u32_le()?;
        if count >= MAX_WEIGHT_SETS {
            return Err(ModelError::CorruptSection {
                section: "weight sets",
                reason: format!("implausible count {count}"),
            });
        }
        let mut sets = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let id = reader.read_u32_le()?;
            let node_count = reader.read_u32_le()?;
            if node_count >= MAX_WEIGHT_SETS {
                return Err(ModelError::CorruptSection {
                    section: "weight sets",
                    reason: format!("implausible node count {node_count}"),
                });
            }
            let mut node_weights = Vec::with_capacity(node_count as usize);
            for _ in 0..node_count {
                node_weights.push(reader.read_f32_le()?);
            }
            sets.push(WeightSet { id, node_weights });
        }
        Ok(sets)
    }

    fn read_child_models<R: Read + Seek>(&self, reader: &mut R) -> Result<Vec<ChildModel>> {
        let stored_count = reader.read_u32_le()?;
        // The stored count includes the model itself.
        let count = stored_count.saturating_sub(1);
        if count >= MAX_WEIGHT_SETS {
            return Err(ModelError::CorruptSection {
                section: "child models",
                reason: format!("implausible count {stored_count}"),
            });
        }
        let mut children = Vec::with_capacity(count as usize);
        for _ in 0..count {
            children.push(ChildModel {
                name: read_string_or_placeholder(reader)?,
                ..Default::default()
            });
        }
        Ok(children)
    }

    fn read_animations<R: Read + Seek>(&mut self, reader: &mut R) -> Result<Vec<Animation>> {
        let count = reader.read_u32_le()?;
        if count == 0 || count >= MAX_ANIMATIONS {
            if count != 0 {
                return Err(ModelError::CorruptSection {
                    section: "animations",
                    reason: format!("implausible count {count}"),
                });
            }
            return Ok(Vec::new());
        }

        let mut animations = Vec::with_capacity(count as usize);
        for _ in 0..count {
            animations.push(self.read_animation(reader)?);
        }
        Ok(animations)
    }

    fn read_animation<R: Read + Seek>(&mut self, reader: &mut R) -> Result<Animation> {
        let extents = Vec3::parse(reader)?;
        let _unknown_extents = Vec3::parse(reader)?;
        let hashed_name = reader.read_u32_le()?;
        let interpolation_time = reader.read_u32_le()?;
        let keyframe_count = reader.read_u32_le()?;
        if keyframe_count > 100_000 {
            return Err(ModelError::CorruptSection {
                section: "animations",
                reason: format!("implausible keyframe count {keyframe_count}"),
            });
        }

        let mut keyframes = Vec::with_capacity(keyframe_count as usize);
        for _ in 0..keyframe_count {
            keyframes.push(Keyframe {
                time: reader.read_u32_le()?,
                string: read_string_or_placeholder(reader)?,
            });
        }

        let mut node_keyframe_transforms = Vec::with_capacity(self.node_count as usize);
        for _ in 0..self.node_count {
            let _start_marker = reader.read_u32_le()?;
            let mut transforms = Vec::with_capacity(keyframe_count as usize);
            for _ in 0..keyframe_count {
                transforms.push(read_compressed_transform(reader)?);
            }
            node_keyframe_transforms.push(transforms);
        }

        let name = self
            .lookup_name(NameKind::Animation, hashed_name)
            .unwrap_or_else(|| format!("Animation_{}", self.animations_synthesized));
        self.animations_synthesized += 1;

        Ok(Animation {
            name,
            extents,
            interpolation_time,
            keyframes,
            node_keyframe_transforms,
            ..Default::default()
        })
    }

    fn read_sockets<R: Read + Seek>(&mut self, reader: &mut R) -> Result<Vec<Socket>> {
        if self.socket_count == 0 {
            return Ok(Vec::new());
        }
        if self.socket_count >= MAX_SOCKETS {
            return Err(ModelError::CorruptSection {
                section: "sockets",
                reason: format!("implausible count {}", self.socket_count),
            });
        }

        let mut sockets = Vec::with_capacity(self.socket_count as usize);
        for _ in 0..self.socket_count {
            reader.skip(4)?;
            let rotation = Quat::parse(reader)?;
            let location = Vec3::parse(reader)?;
            reader.skip(4)?;
            let node_index = reader.read_u32_le()?;
            let hashed_name = reader.read_u32_le()?;
            reader.skip(4)?;

            let name = self
                .lookup_name(NameKind::Socket, hashed_name)
                .unwrap_or_else(|| format!("Socket{}", self.sockets_synthesized));
            self.sockets_synthesized += 1;

            sockets.push(Socket {
                node_index,
                name,
                rotation,
                location,
            });
        }
        Ok(sockets)
    }

    fn lookup_name(&self, kind: NameKind, hash: u32) -> Option<String> {
        self.hasher
            .as_ref()
            .and_then(|h| h.lookup(kind, hash))
            .map(str::to_string)
    }
}

/// Decodes one 16-bit fixed-point keyframe transform.
///
/// A flag halfword selects between two position scales; rotation always
/// uses one constant. The selection rule is an empirical hypothesis
/// validated against reference data, not documented format semantics, so it
/// is applied exactly as observed and not generalized. PC files reuse the
/// same channel layout under compression tag 2.
pub(crate) fn read_compressed_transform<R: Read>(reader: &mut R) -> Result<Transform> {
    let mut location_raw = [0i16; 3];
    for value in &mut location_raw {
        *value = reader.read_i16_le()?;
    }
    let small_scale_flag = reader.read_i16_le()?;
    let mut rotation_raw = [0i16; 4];
    for value in &mut rotation_raw {
        *value = reader.read_i16_le()?;
    }

    let loc_scale = if small_scale_flag == 0 {
        SCALE_LOC_LARGE
    } else {
        SCALE_LOC_SMALL
    };

    Ok(Transform {
        location: Vec3::new(
            f32::from(location_raw[0]) / loc_scale,
            f32::from(location_raw[1]) / loc_scale,
            f32::from(location_raw[2]) / loc_scale,
        ),
        rotation: Quat::new(
            f32::from(rotation_raw[0]) / SCALE_ROT,
            f32::from(rotation_raw[1]) / SCALE_ROT,
            f32::from(rotation_raw[2]) / SCALE_ROT,
            f32::from(rotation_raw[3]) / SCALE_ROT,
        ),
    })
}

fn find_vertex_by_position(vertices: &mut [Vertex], location: Vec3) -> Option<&mut Vertex> {
    vertices.iter_mut().find(|v| {
        v.location.x.to_bits() == location.x.to_bits()
            && v.location.y.to_bits() == location.y.to_bits()
            && v.location.z.to_bits() == location.z.to_bits()
    })
}

fn stream_length<R: Seek>(reader: &mut R) -> Result<u64> {
    let current = reader.stream_position()?;
    let length = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(current))?;
    Ok(length)
}

fn check_offsets(offsets: &SectionOffsets, stream_len: u64) -> Result<()> {
    let entries = [
        ("pieces", offsets.pieces),
        ("nodes", offsets.nodes),
        ("child models", offsets.child_models),
        ("animations", offsets.animations),
        ("sockets", offsets.sockets),
    ];
    for (name, offset) in entries {
        if u64::from(offset) >= stream_len {
            return Err(ModelError::CorruptModel(format!(
                "{name} offset {offset} is outside the file ({stream_len} bytes)"
            )));
        }
    }
    if u64::from(offsets.file_size) > stream_len {
        log::warn!(
            "header claims {} bytes but the file holds {stream_len}",
            offsets.file_size
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use test_case::test_case;

    #[test]
    fn wrong_file_type_is_unsupported() {
        let mut data = Vec::new();
        data.extend_from_slice(&1i32.to_le_bytes());
        data.extend_from_slice(&16i16.to_le_bytes());
        data.extend_from_slice(&[0u8; 64]);
        let mut reader = Ps2LtbReader::new();
        assert!(matches!(
            reader.read(&mut Cursor::new(data)),
            Err(ModelError::UnsupportedFormat {
                format: "PS2 LTB",
                file_type: 1,
                version: 16,
            })
        ));
    }

    #[test]
    fn wrong_version_is_unsupported() {
        let mut data = Vec::new();
        data.extend_from_slice(&2i32.to_le_bytes());
        data.extend_from_slice(&9i16.to_le_bytes());
        data.extend_from_slice(&[0u8; 64]);
        let mut reader = Ps2LtbReader::new();
        assert!(matches!(
            reader.read(&mut Cursor::new(data)),
            Err(ModelError::UnsupportedFormat { version: 9, .. })
        ));
    }

    #[test_case(0, 0x1000, 0x1000 ; "flag zero selects the large divisor")]
    #[test_case(1, 0x10, 0x10 ; "nonzero flag selects the small divisor")]
    fn compressed_location_scale_follows_flag(flag: i16, raw: i16, divisor: i32) {
        let mut data = Vec::new();
        for v in [raw, raw, raw, flag, 0, 0, 0, 0x4000] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let t = read_compressed_transform(&mut Cursor::new(data)).unwrap();
        let expected = f32::from(raw) / divisor as f32;
        assert!((t.location.x - expected).abs() < 1e-6);
        assert!((t.rotation.w - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rotation_scale_is_fixed() {
        let mut data = Vec::new();
        for v in [0i16, 0, 0, 1, 0x2000, 0, 0, 0x4000] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let t = read_compressed_transform(&mut Cursor::new(data)).unwrap();
        assert!((t.rotation.x - 0.5).abs() < 1e-6);
    }
}
