//! Reader for the PC LTB variant (file type 1, version 23).
//!
//! The PC build shares the console header family (offset table plus
//! aggregate counts) but keeps plaintext names and flat vertex/face
//! buffers, so no hash table or batch decoding is involved. Attachment is
//! unambiguous here: every LOD carries its mesh type, and rigid bindings
//! are applied directly without the console resolver pass.

use std::io::{Read, Seek, SeekFrom};

use crate::error::{ModelError, Result};
use crate::io_ext::{read_string_or_placeholder, ReadExt, SeekExt};
use crate::model::{
    Animation, AnimBinding, Attachment, ChildModel, Face, FaceVertex, Keyframe, Lod, MeshType,
    Model, Node, NodeFlags, Piece, Socket, Vertex, Weight,
};
use crate::reader_ltb_ps2::read_compressed_transform;
use crate::types::{Mat4, Quat, Transform, Vec2, Vec3};

const FILE_TYPE: u16 = 1;
const VERSION: u16 = 23;

/// Animation channel stored as uncompressed float transforms.
const COMPRESSION_NONE: u32 = 0;
/// Animation channel stored as 16-bit fixed point, console scale rule.
const COMPRESSION_RELEVANT_16: u32 = 2;

const MAX_PLAUSIBLE_COUNT: u32 = 1_000_000;

fn plausible(section: &'static str, count: u32) -> Result<u32> {
    if count > MAX_PLAUSIBLE_COUNT {
        return Err(ModelError::CorruptSection {
            section,
            reason: format!("implausible count {count}"),
        });
    }
    Ok(count)
}

/// Stateful driver for one PC LTB read.
#[derive(Debug, Default)]
pub struct PcLtbReader {
    node_count: u32,
    lod_count: u32,
}

impl PcLtbReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a whole PC LTB file into a model graph.
    pub fn read<R: Read + Seek>(&mut self, reader: &mut R) -> Result<Model> {
        let mut model = Model::default();

        let file_type = reader.read_u16_le()?;
        let version = reader.read_u16_le()?;
        if file_type != FILE_TYPE || version != VERSION {
            return Err(ModelError::UnsupportedFormat {
                format: "PC LTB",
                file_type: u32::from(file_type),
                version: u32::from(version),
            });
        }
        reader.skip(4 * 3)?;

        let _offset_offset = reader.read_u32_le()?;
        let piece_offset = reader.read_u32_le()?;
        let node_offset = reader.read_u32_le()?;
        let child_model_offset = reader.read_u32_le()?;
        let animation_offset = reader.read_u32_le()?;
        let socket_offset = reader.read_u32_le()?;
        let _file_size = reader.read_u32_le()?;
        reader.skip(4)?;

        let stream_len = {
            let current = reader.stream_position()?;
            let length = reader.seek(SeekFrom::End(0))?;
            reader.seek(SeekFrom::Start(current))?;
            length
        };
        for (name, offset) in [
            ("pieces", piece_offset),
            ("nodes", node_offset),
            ("child models", child_model_offset),
            ("animations", animation_offset),
            ("sockets", socket_offset),
        ] {
            if u64::from(offset) >= stream_len {
                return Err(ModelError::CorruptModel(format!(
                    "{name} offset {offset} is outside the file ({stream_len} bytes)"
                )));
            }
        }

        let _keyframe_count = reader.read_i32_le()?;
        let _animation_count = reader.read_i32_le()?;
        self.node_count = reader.read_i32_le()? as u32;
        let _piece_count = reader.read_i32_le()?;
        let _child_model_count = reader.read_i32_le()?;
        let _triangle_count = reader.read_i32_le()?;
        let _vertex_count = reader.read_i32_le()?;
        let _weight_count = reader.read_i32_le()?;
        self.lod_count = reader.read_i32_le()? as u32;
        let _socket_count = reader.read_i32_le()?;
        let _weight_set_count = reader.read_i32_le()?;
        let _string_count = reader.read_i32_le()?;
        let _string_length = reader.read_i32_le()?;
        let _unknown = reader.read_i32_le()?;

        model.command_string = read_string_or_placeholder(reader)?;
        model.internal_radius = reader.read_f32_le()?;
        model.version = u32::from(version);
        model.lod_count = self.lod_count;

        reader.seek(SeekFrom::Start(u64::from(piece_offset)))?;
        model.pieces = self.read_pieces(reader)?;

        reader.seek(SeekFrom::Start(u64::from(node_offset)))?;
        model.nodes = self.read_nodes(reader)?;
        model.link_nodes()?;

        // Attachment is encoded unambiguously; apply it directly instead of
        // running the console classification pass.
        apply_attachments(&mut model);

        reader.seek(SeekFrom::Start(u64::from(child_model_offset)))?;
        model.child_models = match self.read_child_models(reader) {
            Ok(children) => children,
            Err(e) => {
                log::warn!("skipping child models: {e}");
                Vec::new()
            }
        };

        reader.seek(SeekFrom::Start(u64::from(animation_offset)))?;
        model.animations = match self.read_animations(reader) {
            Ok(animations) => animations,
            Err(e) => {
                log::warn!("skipping animations: {e}");
                Vec::new()
            }
        };

        reader.seek(SeekFrom::Start(u64::from(socket_offset)))?;
        model.sockets = match self.read_sockets(reader) {
            Ok(sockets) => sockets,
            Err(e) => {
                log::warn!("skipping sockets: {e}");
                Vec::new()
            }
        };

        // The PC format stores no bindings; synthesize one per animation so
        // downstream writers always have a binding table.
        model.anim_bindings = model
            .animations
            .iter()
            .map(|animation| AnimBinding {
                name: animation.name.clone(),
                extents: animation.extents,
                origin: Vec3::ZERO,
            })
            .collect();

        Ok(model)
    }

    fn read_pieces<R: Read + Seek>(&self, reader: &mut R) -> Result<Vec<Piece>> {
        let piece_count = plausible("pieces", reader.read_u32_le()?)?;
        let mut pieces = Vec::with_capacity(piece_count as usize);
        for _ in 0..piece_count {
            let name = read_string_or_placeholder(reader)?;
            let material_index = reader.read_u16_le()?;
            let specular_power = reader.read_f32_le()?;
            let specular_scale = reader.read_f32_le()?;
            let lod_weight = reader.read_f32_le()?;
            let _padding = reader.read_u16_le()?;

            let mut lods = Vec::with_capacity(self.lod_count as usize);
            for _ in 0..self.lod_count {
                lods.push(self.read_lod(reader)?);
            }

            let mesh_type = lods.first().and_then(|lod| lod.mesh_type);
            pieces.push(Piece {
                name,
                material_index,
                specular_power,
                specular_scale,
                lod_weight,
                mesh_type,
                lods,
                ..Default::default()
            });
        }
        Ok(pieces)
    }

    fn read_lod<R: Read + Seek>(&self, reader: &mut R) -> Result<Lod> {
        let raw_mesh_type = reader.read_u32_le()?;
        let mesh_type = MeshType::from_raw(raw_mesh_type);
        if mesh_type.is_none() {
            log::warn!("unknown mesh type tag {raw_mesh_type}");
        }
        let node_binding = reader.read_u32_le()?;
        let vertex_count = plausible("pieces", reader.read_u32_le()?)?;
        let face_count = plausible("pieces", reader.read_u32_le()?)?;

        let mut vertices = Vec::with_capacity(vertex_count as usize);
        for _ in 0..vertex_count {
            let weight_count = reader.read_u16_le()?;
            let sublod_vertex_index = reader.read_u16_le()?;
            let mut weights = Vec::with_capacity(usize::from(weight_count));
            for _ in 0..weight_count {
                weights.push(Weight {
                    node_index: reader.read_u32_le()?,
                    location: Vec3::parse(reader)?,
                    bias: reader.read_f32_le()?,
                });
            }
            vertices.push(Vertex {
                weights,
                sublod_vertex_index,
                location: Vec3::parse(reader)?,
                normal: Vec3::parse(reader)?,
                ..Default::default()
            });
        }

        let mut faces = Vec::with_capacity(face_count as usize);
        for _ in 0..face_count {
            let mut corners = [FaceVertex::default(); 3];
            for corner in &mut corners {
                corner.texcoord = Vec2::parse(reader)?;
                corner.vertex_index = reader.read_u16_le()?;
            }
            faces.push(Face { vertices: corners });
        }

        Ok(Lod {
            mesh_type,
            node_binding,
            vertices,
            faces,
        })
    }

    fn read_nodes<R: Read + Seek>(&self, reader: &mut R) -> Result<Vec<Node>> {
        let mut nodes = Vec::with_capacity(self.node_count.min(MAX_PLAUSIBLE_COUNT) as usize);
        for _ in 0..self.node_count {
            let name = read_string_or_placeholder(reader)?;
            let index = reader.read_u16_le()?;
            let flags = NodeFlags::from_bits_truncate(reader.read_i8()? as u8);
            let bind_matrix = Mat4::parse(reader)?;
            let child_count = reader.read_u32_le()?;
            nodes.push(Node {
                name,
                index,
                flags,
                bind_matrix,
                child_count,
                ..Default::default()
            });
        }
        Ok(nodes)
    }

    fn read_child_models<R: Read + Seek>(&self, reader: &mut R) -> Result<Vec<ChildModel>> {
        let count = plausible("child models", reader.read_u32_le()?)?;
        let mut children = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = read_string_or_placeholder(reader)?;
            let build_number = reader.read_u32_le()?;
            let mut transforms = Vec::with_capacity(self.node_count as usize);
            for _ in 0..self.node_count {
                transforms.push(Transform::parse(reader)?);
            }
            children.push(ChildModel {
                name,
                build_number,
                transforms,
            });
        }
        Ok(children)
    }

    fn read_animations<R: Read + Seek>(&self, reader: &mut R) -> Result<Vec<Animation>> {
        let count = plausible("animations", reader.read_u32_le()?)?;
        let mut animations = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let extents = Vec3::parse(reader)?;
            let name = read_string_or_placeholder(reader)?;
            let compression = reader.read_u32_le()?;
            let interpolation_time = reader.read_u32_le()?;
            let keyframe_count = plausible("animations", reader.read_u32_le()?)?;

            let mut keyframes = Vec::with_capacity(keyframe_count as usize);
            for _ in 0..keyframe_count {
                keyframes.push(Keyframe {
                    time: reader.read_u32_le()?,
                    string: read_string_or_placeholder(reader)?,
                });
            }

            let mut node_keyframe_transforms = Vec::with_capacity(self.node_count as usize);
            for _ in 0..self.node_count {
                let mut transforms = Vec::with_capacity(keyframe_count as usize);
                for _ in 0..keyframe_count {
                    transforms.push(match compression {
                        COMPRESSION_NONE => Transform::parse(reader)?,
                        COMPRESSION_RELEVANT_16 => read_compressed_transform(reader)?,
                        other => {
                            return Err(ModelError::CorruptSection {
                                section: "animations",
                                reason: format!("unknown compression tag {other}"),
                            });
                        }
                    });
                }
                node_keyframe_transforms.push(transforms);
            }

            animations.push(Animation {
                name,
                extents,
                interpolation_time,
                keyframes,
                node_keyframe_transforms,
                ..Default::default()
            });
        }
        Ok(animations)
    }

    fn read_sockets<R: Read + Seek>(&self, reader: &mut R) -> Result<Vec<Socket>> {
        let count = plausible("sockets", reader.read_u32_le()?)?;
        let mut sockets = Vec::with_capacity(count as usize);
        for _ in 0..count {
            sockets.push(Socket {
                node_index: reader.read_u32_le()?,
                name: read_string_or_placeholder(reader)?,
                rotation: Quat::parse(reader)?,
                location: Vec3::parse(reader)?,
            });
        }
        Ok(sockets)
    }
}

/// Applies each LOD's declared attachment. Rigid pieces are reprojected to
/// world space with the target node's bind matrix; everything else keeps
/// its coordinates.
fn apply_attachments(model: &mut Model) {
    let nodes = &model.nodes;
    for piece in &mut model.pieces {
        let Some(lod) = piece.lods.first_mut() else {
            continue;
        };
        match lod.mesh_type {
            Some(MeshType::Rigid) => {
                let node_index = lod.node_binding as usize;
                let Some(node) = nodes.get(node_index) else {
                    log::warn!(
                        "piece '{}': rigid node index {node_index} out of range",
                        piece.name
                    );
                    piece.attachment = Attachment::Unresolved;
                    continue;
                };
                let bind = node.bind_matrix;
                for vertex in &mut lod.vertices {
                    vertex.original_location = Some(vertex.location);
                    vertex.original_normal = Some(vertex.normal);
                    vertex.location = bind.transform_point(vertex.location);
                    vertex.normal = bind.rotate_direction(vertex.normal);
                    if vertex.weights.is_empty() {
                        vertex.weights = vec![Weight {
                            node_index: lod.node_binding,
                            location: vertex.original_location.unwrap_or_default(),
                            bias: 1.0,
                        }];
                    }
                }
                piece.attachment = Attachment::Rigid {
                    node_index,
                    transform: bind,
                };
            }
            Some(MeshType::Skeletal) => piece.attachment = Attachment::Skeletal,
            _ => piece.attachment = Attachment::World,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn wrong_gate_is_unsupported() {
        let mut data = Vec::new();
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&16u16.to_le_bytes());
        data.extend_from_slice(&[0u8; 64]);
        assert!(matches!(
            PcLtbReader::new().read(&mut Cursor::new(data)),
            Err(ModelError::UnsupportedFormat {
                format: "PC LTB",
                file_type: 2,
                version: 16,
            })
        ));
    }

    #[test]
    fn truncated_header_is_fatal() {
        let mut data = Vec::new();
        data.extend_from_slice(&FILE_TYPE.to_le_bytes());
        data.extend_from_slice(&VERSION.to_le_bytes());
        data.extend_from_slice(&[0u8; 8]);
        assert!(matches!(
            PcLtbReader::new().read(&mut Cursor::new(data)),
            Err(ModelError::TruncatedInput(_))
        ));
    }
}
