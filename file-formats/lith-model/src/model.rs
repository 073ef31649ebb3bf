//! The canonical in-memory model graph all readers produce and all writers
//! consume.
//!
//! A [`Model`] owns flat vectors of nodes, pieces, animations, sockets,
//! child models, animation bindings, and weight sets. Node parent/child
//! relations are stored as indices into `Model::nodes`; the vector order is
//! always a pre-order traversal of the skeleton, which is how every format
//! in the family serializes trees.

use bitflags::bitflags;

use crate::error::{ModelError, Result};
use crate::types::{Mat4, Quat, Transform, Vec2, Vec3};

bitflags! {
    /// Node behavior bits as stored in PC format node records.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        /// Node (and geometry bound to it) may be removed at low detail.
        const REMOVABLE = 0x1;
        /// Animation tracks carry rotation only for this node.
        const ROTATION_ONLY = 0x2;
    }
}

/// How a piece's geometry binds to the skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshType {
    Rigid,
    Skeletal,
    VertexAnimated,
}

impl MeshType {
    /// Wire tag used by the LTB formats.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            4 => Some(Self::Rigid),
            5 => Some(Self::Skeletal),
            6 => Some(Self::VertexAnimated),
            _ => None,
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            Self::Rigid => 4,
            Self::Skeletal => 5,
            Self::VertexAnimated => 6,
        }
    }
}

/// Outcome of attachment resolution for a piece.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Attachment {
    /// No binding; geometry stays in world coordinates.
    #[default]
    World,
    /// Whole piece rides one node. Vertices were reprojected through the
    /// node's bind matrix and the original object-space values retained.
    Rigid { node_index: usize, transform: Mat4 },
    /// Per-vertex weights drive the piece; no single anchor exists.
    Skeletal,
    /// The piece matched no attachment rule and was left untouched.
    Unresolved,
}

/// One bone in the skeleton.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub name: String,
    pub index: u16,
    pub flags: NodeFlags,
    /// World-space bind pose, row-major, translation in the fourth column.
    pub bind_matrix: Mat4,
    /// Number of direct children in the serialized pre-order stream.
    pub child_count: u32,
    /// Back-reference into `Model::nodes`; `None` only on the root.
    pub parent: Option<usize>,
    /// Indices into `Model::nodes`, in serialization order.
    pub children: Vec<usize>,
}

/// One bone influence on a vertex.
#[derive(Debug, Clone, Copy, Default)]
pub struct Weight {
    pub node_index: u32,
    /// Vertex position in the influencing bone's space.
    pub location: Vec3,
    pub bias: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Vertex {
    pub location: Vec3,
    pub normal: Vec3,
    /// Object-space position kept when a resolver reprojects the vertex,
    /// so writers can recover either frame.
    pub original_location: Option<Vec3>,
    pub original_normal: Option<Vec3>,
    pub sublod_vertex_index: u16,
    pub weights: Vec<Weight>,
}

/// One corner of a face: texture coordinates plus the vertex it references.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaceVertex {
    pub texcoord: Vec2,
    pub vertex_index: u16,
    /// Winding marker carried through strip-order decoding.
    pub reversed: bool,
}

/// A triangle. Always exactly three corners.
#[derive(Debug, Clone, Copy, Default)]
pub struct Face {
    pub vertices: [FaceVertex; 3],
}

/// One detail level of a piece.
#[derive(Debug, Clone, Default)]
pub struct Lod {
    /// Wire mesh-type tag, when the source format stores one. Consumed by
    /// attachment resolution.
    pub mesh_type: Option<MeshType>,
    /// Rigid meshes: target node index. Skeletal meshes: bone count.
    pub node_binding: u32,
    pub vertices: Vec<Vertex>,
    pub faces: Vec<Face>,
}

impl Lod {
    /// Per-vertex normals rebuilt by averaging the normals of adjacent
    /// faces, the same weighting the original model tooling used. Vertices
    /// without adjacent faces keep their stored normal.
    pub fn averaged_normals(&self) -> Vec<Vec3> {
        let mut sums = vec![glam::Vec3::ZERO; self.vertices.len()];
        let mut counts = vec![0u32; self.vertices.len()];

        for face in &self.faces {
            let idx: Vec<usize> = face
                .vertices
                .iter()
                .map(|fv| usize::from(fv.vertex_index))
                .collect();
            if idx.iter().any(|&i| i >= self.vertices.len()) {
                continue;
            }
            let a = self.vertices[idx[0]].location.to_glam();
            let b = self.vertices[idx[1]].location.to_glam();
            let c = self.vertices[idx[2]].location.to_glam();
            let normal = (b - a).cross(c - a).normalize_or_zero();
            for &i in &idx {
                sums[i] += normal;
                counts[i] += 1;
            }
        }

        self.vertices
            .iter()
            .zip(sums.iter().zip(&counts))
            .map(|(vertex, (sum, count))| {
                if *count == 0 {
                    vertex.normal
                } else {
                    Vec3::from_glam(sum.normalize_or_zero())
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Piece {
    pub name: String,
    pub material_index: u16,
    pub specular_power: f32,
    pub specular_scale: f32,
    pub lod_weight: f32,
    /// Classification copied from the primary detail level.
    pub mesh_type: Option<MeshType>,
    pub attachment: Attachment,
    pub lods: Vec<Lod>,
}

#[derive(Debug, Clone, Default)]
pub struct Keyframe {
    pub time: u32,
    /// Annotation string fired when playback crosses this keyframe.
    pub string: String,
}

#[derive(Debug, Clone)]
pub struct Animation {
    pub name: String,
    pub extents: Vec3,
    /// Opaque field carried through from disk.
    pub unknown1: i32,
    pub interpolation_time: u32,
    pub keyframes: Vec<Keyframe>,
    /// Outer index: node (model order). Inner index: keyframe.
    pub node_keyframe_transforms: Vec<Vec<Transform>>,
}

impl Default for Animation {
    fn default() -> Self {
        Self {
            name: String::new(),
            extents: Vec3::ZERO,
            unknown1: -1,
            interpolation_time: 200,
            keyframes: Vec::new(),
            node_keyframe_transforms: Vec::new(),
        }
    }
}

/// Named anchor point hanging off a node.
#[derive(Debug, Clone, Default)]
pub struct Socket {
    pub node_index: u32,
    pub name: String,
    pub rotation: Quat,
    pub location: Vec3,
}

#[derive(Debug, Clone, Default)]
pub struct ChildModel {
    pub name: String,
    pub build_number: u32,
    /// Per-node bind adjustments, model node order.
    pub transforms: Vec<Transform>,
}

/// Animation-to-dimensions binding carried by the PC formats.
#[derive(Debug, Clone, Default)]
pub struct AnimBinding {
    pub name: String,
    pub extents: Vec3,
    pub origin: Vec3,
}

/// Per-node blend weights used when layering animations.
#[derive(Debug, Clone, Default)]
pub struct WeightSet {
    pub id: u32,
    pub node_weights: Vec<f32>,
}

/// The whole model graph.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub name: String,
    pub command_string: String,
    pub internal_radius: f32,
    /// Version tag of the file this model was read from.
    pub version: u32,
    /// Detail levels each piece carries.
    pub lod_count: u32,
    pub lod_distances: Vec<f32>,
    pub nodes: Vec<Node>,
    pub pieces: Vec<Piece>,
    pub animations: Vec<Animation>,
    pub sockets: Vec<Socket>,
    pub child_models: Vec<ChildModel>,
    pub anim_bindings: Vec<AnimBinding>,
    pub weight_sets: Vec<WeightSet>,
}

impl Model {
    /// Total keyframes across all animations.
    pub fn keyframe_count(&self) -> u32 {
        self.animations
            .iter()
            .map(|a| a.keyframes.len() as u32)
            .sum()
    }

    /// Total faces across all pieces and detail levels.
    pub fn face_count(&self) -> u32 {
        self.pieces
            .iter()
            .flat_map(|p| &p.lods)
            .map(|l| l.faces.len() as u32)
            .sum()
    }

    /// Total vertices across all pieces and detail levels.
    pub fn vertex_count(&self) -> u32 {
        self.pieces
            .iter()
            .flat_map(|p| &p.lods)
            .map(|l| l.vertices.len() as u32)
            .sum()
    }

    /// Total bone influences across all vertices.
    pub fn weight_count(&self) -> u32 {
        self.pieces
            .iter()
            .flat_map(|p| &p.lods)
            .flat_map(|l| &l.vertices)
            .map(|v| v.weights.len() as u32)
            .sum()
    }

    /// Rebuilds parent/child links from the serialized child counts.
    ///
    /// Nodes arrive in pre-order with no parent pointers; each record only
    /// says how many of the following nodes are its direct children. The
    /// walk keeps an explicit stack of nodes that still owe children and
    /// assigns each new node to the deepest unfinished one.
    pub fn link_nodes(&mut self) -> Result<()> {
        if self.nodes.is_empty() {
            return Ok(());
        }

        let claimed: u64 = self.nodes.iter().map(|n| u64::from(n.child_count)).sum();
        if claimed + 1 != self.nodes.len() as u64 {
            return Err(ModelError::CorruptModel(format!(
                "node tree claims {claimed} children for {} nodes",
                self.nodes.len()
            )));
        }

        for node in &mut self.nodes {
            node.parent = None;
            node.children.clear();
        }

        // (node index, children still unclaimed)
        let mut stack: Vec<(usize, u32)> = Vec::new();
        for index in 0..self.nodes.len() {
            while stack.last().is_some_and(|&(_, left)| left == 0) {
                stack.pop();
            }
            if index > 0 {
                let Some((parent, left)) = stack.last_mut() else {
                    return Err(ModelError::CorruptModel(
                        "node tree ran out of parents before the list ended".to_string(),
                    ));
                };
                let parent = *parent;
                *left -= 1;
                self.nodes[index].parent = Some(parent);
                self.nodes[parent].children.push(index);
            }
            stack.push((index, self.nodes[index].child_count));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn node(name: &str, child_count: u32) -> Node {
        Node {
            name: name.to_string(),
            child_count,
            ..Default::default()
        }
    }

    #[test]
    fn link_nodes_rebuilds_preorder_tree() {
        let mut model = Model {
            nodes: vec![
                node("root", 2),
                node("torso", 1),
                node("head", 0),
                node("pelvis", 0),
            ],
            ..Default::default()
        };
        model.link_nodes().unwrap();

        assert_eq!(model.nodes[0].parent, None);
        assert_eq!(model.nodes[0].children, vec![1, 3]);
        assert_eq!(model.nodes[1].parent, Some(0));
        assert_eq!(model.nodes[1].children, vec![2]);
        assert_eq!(model.nodes[2].parent, Some(1));
        assert_eq!(model.nodes[3].parent, Some(0));
    }

    #[test]
    fn link_nodes_deep_chain() {
        let mut model = Model {
            nodes: vec![node("a", 1), node("b", 1), node("c", 1), node("d", 0)],
            ..Default::default()
        };
        model.link_nodes().unwrap();
        assert_eq!(model.nodes[3].parent, Some(2));
        assert_eq!(model.nodes[2].parent, Some(1));
    }

    #[test]
    fn link_nodes_rejects_inconsistent_counts() {
        let mut model = Model {
            nodes: vec![node("root", 1), node("a", 1)],
            ..Default::default()
        };
        assert!(matches!(
            model.link_nodes(),
            Err(ModelError::CorruptModel(_))
        ));
    }

    #[test]
    fn link_nodes_rejects_orphan_tail() {
        // counts sum correctly but the root closes before the list ends
        let mut model = Model {
            nodes: vec![node("root", 0), node("stray", 1)],
            ..Default::default()
        };
        assert!(matches!(
            model.link_nodes(),
            Err(ModelError::CorruptModel(_))
        ));
    }

    #[test]
    fn aggregate_counts_sum_all_lods() {
        let lod = Lod {
            vertices: vec![
                Vertex {
                    weights: vec![Weight::default(), Weight::default()],
                    ..Default::default()
                },
                Vertex::default(),
            ],
            faces: vec![Face::default()],
            ..Default::default()
        };
        let model = Model {
            pieces: vec![Piece {
                lods: vec![lod.clone(), lod],
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(model.vertex_count(), 4);
        assert_eq!(model.face_count(), 2);
        assert_eq!(model.weight_count(), 4);
    }

    #[test]
    fn averaged_normals_flat_quad() {
        let mut lod = Lod::default();
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            lod.vertices.push(Vertex {
                location: Vec3::new(x, y, 0.0),
                ..Default::default()
            });
        }
        let tri = |a: u16, b: u16, c: u16| Face {
            vertices: [
                FaceVertex {
                    vertex_index: a,
                    ..Default::default()
                },
                FaceVertex {
                    vertex_index: b,
                    ..Default::default()
                },
                FaceVertex {
                    vertex_index: c,
                    ..Default::default()
                },
            ],
        };
        lod.faces = vec![tri(0, 1, 2), tri(0, 2, 3)];

        let normals = lod.averaged_normals();
        for n in normals {
            assert!((n.z - 1.0).abs() < 1e-6, "expected +z normal, got {n:?}");
        }
    }

    #[test]
    fn averaged_normals_keeps_stored_normal_for_isolated_vertices() {
        let lod = Lod {
            vertices: vec![Vertex {
                normal: Vec3::new(0.0, 1.0, 0.0),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(lod.averaged_normals()[0], Vec3::new(0.0, 1.0, 0.0));
    }
}
