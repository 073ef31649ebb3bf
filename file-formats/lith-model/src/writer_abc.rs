//! Binary writer for the ABC model format (version 12).
//!
//! Every section is built in memory before the first byte reaches the
//! destination, so a failed write never leaves a truncated file behind.
//! The section stream is self-describing: each section starts with its
//! name and the absolute offset one past its payload; the final section
//! carries a sentinel instead.

use std::io::Write;

use crate::error::Result;
use crate::io_ext::{write_string, WriteExt};
use crate::model::{Animation, Model, Node};
use crate::types::Vec3;

/// Version tag this writer emits.
pub const ABC_VERSION: u32 = 12;

/// Directory sentinel marking the final section.
const LAST_SECTION: i32 = -1;

/// Fallback animation extents by skeleton shape, used when an animation
/// carries a zero extent vector.
fn fallback_extents(nodes: &[Node]) -> Vec3 {
    let lower = |node: &Node| node.name.to_lowercase();
    let has = |needle: &str| nodes.iter().any(|n| lower(n).contains(needle));
    if has("head") && has("leg") {
        Vec3::new(24.0, 53.0, 24.0)
    } else if has("arm") && has("wrist") {
        Vec3::new(1.5, 2.0, 1.5)
    } else {
        Vec3::new(1.0, 1.0, 1.0)
    }
}

/// Serializes a model graph to ABC bytes.
#[derive(Debug, Default)]
pub struct AbcWriter;

impl AbcWriter {
    pub fn new() -> Self {
        Self
    }

    /// Builds the complete file image in memory.
    pub fn write(&self, model: &Model) -> Result<Vec<u8>> {
        let sections: Vec<(&str, Vec<u8>)> = vec![
            ("Header", self.build_header(model)?),
            ("Pieces", self.build_pieces(model)?),
            ("Nodes", self.build_nodes(model)?),
            ("ChildModels", self.build_child_models(model)?),
            ("Animation", self.build_animations(model)?),
            ("Sockets", self.build_sockets(model)?),
            ("AnimBindings", self.build_anim_bindings(model)?),
        ];

        let mut out = Vec::new();
        let count = sections.len();
        for (index, (name, data)) in sections.into_iter().enumerate() {
            write_string(&mut out, name)?;
            if index + 1 == count {
                out.write_i32_le(LAST_SECTION)?;
            } else {
                // Absolute offset one past this section's payload.
                let next = out.len() + 4 + data.len();
                out.write_i32_le(next as i32)?;
            }
            out.write_all(&data)?;
        }
        Ok(out)
    }

    /// Writes the file image to `writer` in one pass.
    pub fn write_to<W: Write>(&self, writer: &mut W, model: &Model) -> Result<()> {
        let bytes = self.write(model)?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    fn build_header(&self, model: &Model) -> Result<Vec<u8>> {
        // Counts over the distinct non-empty strings embedded in the file.
        let mut strings: Vec<String> = Vec::new();
        let mut push = |strings: &mut Vec<String>, s: &str| {
            if !s.is_empty() && !strings.iter().any(|known| known == s) {
                strings.push(s.to_string());
            }
        };
        push(&mut strings, &model.command_string);
        for node in &model.nodes {
            push(&mut strings, &node.name);
        }
        for child in &model.child_models {
            push(&mut strings, &child.name);
        }
        for animation in &model.animations {
            push(&mut strings, &animation.name);
            for keyframe in &animation.keyframes {
                push(&mut strings, &keyframe.string);
            }
        }
        let string_length: usize = strings.iter().map(String::len).sum();

        let mut buf = Vec::new();
        buf.write_u32_le(ABC_VERSION)?;
        buf.write_u32_le(model.keyframe_count())?;
        buf.write_u32_le(model.animations.len() as u32)?;
        buf.write_u32_le(model.nodes.len() as u32)?;
        buf.write_u32_le(model.pieces.len() as u32)?;
        buf.write_u32_le(model.child_models.len() as u32)?;
        buf.write_u32_le(model.face_count())?;
        buf.write_u32_le(model.vertex_count())?;
        buf.write_u32_le(model.weight_count())?;
        buf.write_u32_le(model.lod_count)?;
        buf.write_u32_le(model.sockets.len() as u32)?;
        buf.write_u32_le(model.weight_sets.len() as u32)?;
        buf.write_u32_le(strings.len() as u32)?;
        buf.write_u32_le(string_length as u32)?;
        write_string(&mut buf, &model.command_string)?;
        buf.write_f32_le(model.internal_radius)?;
        buf.write_u32_le(model.lod_distances.len() as u32)?;
        buf.extend_from_slice(&[0u8; 60]);
        for distance in &model.lod_distances {
            buf.write_f32_le(*distance)?;
        }
        Ok(buf)
    }

    fn build_pieces(&self, model: &Model) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u32_le(model.weight_count())?;
        buf.write_u32_le(model.pieces.len() as u32)?;

        for piece in &model.pieces {
            buf.write_u16_le(piece.material_index)?;
            buf.write_f32_le(piece.specular_power)?;
            buf.write_f32_le(piece.specular_scale)?;
            buf.write_f32_le(piece.lod_weight)?;
            buf.write_u16_le(0)?;
            write_string(&mut buf, &piece.name)?;
            for lod in &piece.lods {
                buf.write_u32_le(lod.faces.len() as u32)?;
                for face in &lod.faces {
                    for corner in &face.vertices {
                        corner.texcoord.write(&mut buf)?;
                        buf.write_u16_le(corner.vertex_index)?;
                    }
                }
                buf.write_u32_le(lod.vertices.len() as u32)?;
                for vertex in &lod.vertices {
                    buf.write_u16_le(vertex.weights.len() as u16)?;
                    buf.write_u16_le(vertex.sublod_vertex_index)?;
                    for weight in &vertex.weights {
                        buf.write_u32_le(weight.node_index)?;
                        weight.location.write(&mut buf)?;
                        buf.write_f32_le(weight.bias)?;
                    }
                    vertex.location.write(&mut buf)?;
                    vertex.normal.write(&mut buf)?;
                }
            }
        }
        Ok(buf)
    }

    fn build_nodes(&self, model: &Model) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        for node in &model.nodes {
            write_string(&mut buf, &node.name)?;
            buf.write_u16_le(node.index)?;
            buf.write_i8(node.flags.bits() as i8)?;
            node.bind_matrix.write(&mut buf)?;
            buf.write_u32_le(node.children.len() as u32)?;
        }
        // Blend weight sets trail the node records.
        buf.write_u32_le(model.weight_sets.len() as u32)?;
        for set in &model.weight_sets {
            buf.write_u32_le(set.id)?;
            buf.write_u32_le(set.node_weights.len() as u32)?;
            for weight in &set.node_weights {
                buf.write_f32_le(*weight)?;
            }
        }
        Ok(buf)
    }

    fn build_child_models(&self, model: &Model) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u16_le(model.child_models.len() as u16)?;
        for child in &model.child_models {
            write_string(&mut buf, &child.name)?;
            buf.write_u32_le(child.build_number)?;
            for transform in &child.transforms {
                transform.write(&mut buf)?;
            }
        }
        Ok(buf)
    }

    fn build_animations(&self, model: &Model) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u32_le(model.animations.len() as u32)?;
        for animation in &model.animations {
            self.build_animation(&mut buf, model, animation)?;
        }
        Ok(buf)
    }

    fn build_animation(
        &self,
        buf: &mut Vec<u8>,
        model: &Model,
        animation: &Animation,
    ) -> Result<()> {
        let extents = if animation.extents.length() == 0.0 {
            fallback_extents(&model.nodes)
        } else {
            animation.extents
        };
        extents.write(buf)?;
        write_string(buf, &animation.name)?;
        buf.write_i32_le(animation.unknown1)?;
        buf.write_u32_le(animation.interpolation_time)?;
        buf.write_u32_le(animation.keyframes.len() as u32)?;
        for keyframe in &animation.keyframes {
            buf.write_u32_le(keyframe.time)?;
            write_string(buf, &keyframe.string)?;
        }
        for transforms in &animation.node_keyframe_transforms {
            for transform in transforms {
                transform.write(buf)?;
            }
        }
        Ok(())
    }

    fn build_sockets(&self, model: &Model) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u32_le(model.sockets.len() as u32)?;
        for socket in &model.sockets {
            buf.write_u32_le(socket.node_index)?;
            write_string(&mut buf, &socket.name)?;
            socket.rotation.write(&mut buf)?;
            socket.location.write(&mut buf)?;
        }
        Ok(buf)
    }

    fn build_anim_bindings(&self, model: &Model) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u32_le(model.anim_bindings.len() as u32)?;
        for binding in &model.anim_bindings {
            write_string(&mut buf, &binding.name)?;
            binding.extents.write(&mut buf)?;
            binding.origin.write(&mut buf)?;
        }
        Ok(buf)
    }
}
