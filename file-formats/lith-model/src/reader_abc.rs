//! Reader for the ABC model format (version 12).
//!
//! ABC files are a stream of named sections, each carrying the absolute
//! offset of the following section (sentinel on the last). Because every
//! section is independently addressed, damage inside one section is
//! contained: the section is skipped with an empty result and the walk
//! resumes at the recorded offset.

use std::io::{Read, Seek, SeekFrom};

use crate::error::{ModelError, Result};
use crate::io_ext::{read_string, read_string_or_placeholder, ReadExt};
use crate::model::{
    Animation, AnimBinding, ChildModel, Face, FaceVertex, Keyframe, Lod, Model, Node, NodeFlags,
    Piece, Socket, Vertex, Weight, WeightSet,
};
use crate::types::{Mat4, Quat, Transform, Vec2, Vec3};
use crate::writer_abc::ABC_VERSION;

const LAST_SECTION: i32 = -1;

/// Per-section counts above this are treated as corruption rather than
/// allocated for.
const MAX_PLAUSIBLE_COUNT: u32 = 1_000_000;

fn plausible(section: &'static str, what: &str, count: u32) -> Result<u32> {
    if count > MAX_PLAUSIBLE_COUNT {
        return Err(ModelError::CorruptSection {
            section,
            reason: format!("implausible {what} count {count}"),
        });
    }
    Ok(count)
}

/// Stateful driver for one ABC read.
#[derive(Debug, Default)]
pub struct AbcReader {
    node_count: u32,
    lod_count: u32,
}

impl AbcReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a whole ABC file into a model graph.
    pub fn read<R: Read + Seek>(&mut self, reader: &mut R) -> Result<Model> {
        let mut model = Model::default();
        let mut saw_header = false;

        loop {
            let name = match read_string(reader) {
                Ok(name) => name,
                Err(ModelError::InvalidEncoding { .. } | ModelError::TruncatedInput(_))
                    if !saw_header =>
                {
                    return Err(self.not_abc());
                }
                Err(e) => return Err(e),
            };
            let next_offset = reader.read_i32_le()?;

            if !saw_header {
                // The first section must be the header; anything else means
                // this is not an ABC file at all.
                if name != "Header" {
                    return Err(self.not_abc());
                }
                self.read_header(reader, &mut model)?;
                saw_header = true;
            } else {
                let outcome = match name.as_str() {
                    "Pieces" => self.read_pieces(reader, &mut model),
                    "Nodes" => self.read_nodes(reader, &mut model),
                    "ChildModels" => self.read_child_models(reader, &mut model),
                    "Animation" => self.read_animations(reader, &mut model),
                    "Sockets" => self.read_sockets(reader, &mut model),
                    "AnimBindings" => self.read_anim_bindings(reader, &mut model),
                    other => {
                        log::debug!("skipping unknown section '{other}'");
                        Ok(())
                    }
                };
                if let Err(e) = outcome {
                    if next_offset == LAST_SECTION {
                        return Err(e);
                    }
                    log::warn!("skipping damaged '{name}' section: {e}");
                }
            }

            if next_offset == LAST_SECTION {
                break;
            }
            reader.seek(SeekFrom::Start(next_offset as u64))?;
        }

        Ok(model)
    }

    fn not_abc(&self) -> ModelError {
        ModelError::UnsupportedFormat {
            format: "ABC",
            file_type: 0,
            version: 0,
        }
    }

    fn read_header<R: Read + Seek>(&mut self, reader: &mut R, model: &mut Model) -> Result<()> {
        let version = reader.read_u32_le()?;
        if version != ABC_VERSION {
            return Err(ModelError::UnsupportedFormat {
                format: "ABC",
                file_type: 0,
                version,
            });
        }
        model.version = version;

        let _keyframe_count = reader.read_u32_le()?;
        let _animation_count = reader.read_u32_le()?;
        self.node_count = reader.read_u32_le()?;
        if self.node_count > MAX_PLAUSIBLE_COUNT {
            return Err(ModelError::CorruptModel(format!(
                "implausible node count {}",
                self.node_count
            )));
        }
        let _piece_count = reader.read_u32_le()?;
        let _child_model_count = reader.read_u32_le()?;
        let _face_count = reader.read_u32_le()?;
        let _vertex_count = reader.read_u32_le()?;
        let _weight_count = reader.read_u32_le()?;
        self.lod_count = reader.read_u32_le()?;
        let _socket_count = reader.read_u32_le()?;
        let _weight_set_count = reader.read_u32_le()?;
        let _string_count = reader.read_u32_le()?;
        let _string_length = reader.read_u32_le()?;

        model.command_string = read_string_or_placeholder(reader)?;
        model.internal_radius = reader.read_f32_le()?;
        model.lod_count = self.lod_count;

        let lod_distance_count = reader.read_u32_le()?;
        let mut padding = [0u8; 60];
        reader.read_exact(&mut padding)?;
        for _ in 0..lod_distance_count {
            model.lod_distances.push(reader.read_f32_le()?);
        }
        Ok(())
    }

    fn read_pieces<R: Read + Seek>(&self, reader: &mut R, model: &mut Model) -> Result<()> {
        let _weight_count = reader.read_u32_le()?;
        let piece_count = plausible("pieces", "piece", reader.read_u32_le()?)?;

        let mut pieces = Vec::with_capacity(piece_count as usize);
        for _ in 0..piece_count {
            let material_index = reader.read_u16_le()?;
            let specular_power = reader.read_f32_le()?;
            let specular_scale = reader.read_f32_le()?;
            let lod_weight = reader.read_f32_le()?;
            let _padding = reader.read_u16_le()?;
            let name = read_string_or_placeholder(reader)?;

            let mut lods = Vec::with_capacity(self.lod_count as usize);
            for _ in 0..self.lod_count.max(1) {
                lods.push(self.read_lod(reader)?);
            }

            pieces.push(Piece {
                name,
                material_index,
                specular_power,
                specular_scale,
                lod_weight,
                lods,
                ..Default::default()
            });
        }
        model.pieces = pieces;
        Ok(())
    }

    fn read_lod<R: Read + Seek>(&self, reader: &mut R) -> Result<Lod> {
        let face_count = plausible("pieces", "face", reader.read_u32_le()?)?;
        let mut faces = Vec::with_capacity(face_count as usize);
        for _ in 0..face_count {
            let mut corners = [FaceVertex::default(); 3];
            for corner in &mut corners {
                corner.texcoord = Vec2::parse(reader)?;
                corner.vertex_index = reader.read_u16_le()?;
            }
            faces.push(Face { vertices: corners });
        }

        let vertex_count = plausible("pieces", "vertex", reader.read_u32_le()?)?;
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

        Ok(Lod {
            vertices,
            faces,
            ..Default::default()
        })
    }

    fn read_nodes<R: Read + Seek>(&self, reader: &mut R, model: &mut Model) -> Result<()> {
        let mut nodes = Vec::with_capacity(self.node_count as usize);
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
        model.nodes = nodes;
        model.link_nodes()?;

        // Blend weight sets trail the node records.
        let weight_set_count = plausible("nodes", "weight set", reader.read_u32_le()?)?;
        for _ in 0..weight_set_count {
            let id = reader.read_u32_le()?;
            let node_count = reader.read_u32_le()?;
            let mut node_weights = Vec::with_capacity(node_count as usize);
            for _ in 0..node_count {
                node_weights.push(reader.read_f32_le()?);
            }
            model.weight_sets.push(WeightSet { id, node_weights });
        }
        Ok(())
    }

    fn read_child_models<R: Read + Seek>(&self, reader: &mut R, model: &mut Model) -> Result<()> {
        let count = reader.read_u16_le()?;
        for _ in 0..count {
            let name = read_string_or_placeholder(reader)?;
            let build_number = reader.read_u32_le()?;
            let mut transforms = Vec::with_capacity(self.node_count as usize);
            for _ in 0..self.node_count {
                transforms.push(Transform::parse(reader)?);
            }
            model.child_models.push(ChildModel {
                name,
                build_number,
                transforms,
            });
        }
        Ok(())
    }

    fn read_animations<R: Read + Seek>(&self, reader: &mut R, model: &mut Model) -> Result<()> {
        let count = plausible("animations", "animation", reader.read_u32_le()?)?;
        for _ in 0..count {
            let extents = Vec3::parse(reader)?;
            let name = read_string_or_placeholder(reader)?;
            let unknown1 = reader.read_i32_le()?;
            let interpolation_time = reader.read_u32_le()?;
            let keyframe_count = plausible("animations", "keyframe", reader.read_u32_le()?)?;

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
                    transforms.push(Transform::parse(reader)?);
                }
                node_keyframe_transforms.push(transforms);
            }

            model.animations.push(Animation {
                name,
                extents,
                unknown1,
                interpolation_time,
                keyframes,
                node_keyframe_transforms,
            });
        }
        Ok(())
    }

    fn read_sockets<R: Read + Seek>(&self, reader: &mut R, model: &mut Model) -> Result<()> {
        let count = plausible("sockets", "socket", reader.read_u32_le()?)?;
        for _ in 0..count {
            let node_index = reader.read_u32_le()?;
            let name = read_string_or_placeholder(reader)?;
            let rotation = Quat::parse(reader)?;
            let location = Vec3::parse(reader)?;
            model.sockets.push(Socket {
                node_index,
                name,
                rotation,
                location,
            });
        }
        Ok(())
    }

    fn read_anim_bindings<R: Read + Seek>(&self, reader: &mut R, model: &mut Model) -> Result<()> {
        let count = plausible("anim bindings", "binding", reader.read_u32_le()?)?;
        for _ in 0..count {
            model.anim_bindings.push(AnimBinding {
                name: read_string_or_placeholder(reader)?,
                extents: Vec3::parse(reader)?,
                origin: Vec3::parse(reader)?,
            });
        }
        Ok(())
    }
}
