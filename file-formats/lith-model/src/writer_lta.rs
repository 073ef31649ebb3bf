//! Text writer for the LTA S-expression model form.
//!
//! The document is built as a labelled tree first and serialized in one
//! pass afterwards, because consumers of the grammar expect deeply nested
//! scoping (hierarchical node transforms, per-animation per-node transform
//! lists) that maps naturally onto nested sections. All floats are printed
//! with six fractional digits so output stays diffable across revisions,
//! and indentation is one tab per nesting depth.

use std::fmt::Write as _;

use crate::model::{Animation, Attachment, Model, Node, Piece};
use crate::types::{Mat4, Quat, Vec3};

/// Extents substituted when an animation binding carries a zero vector.
const DEFAULT_BINDING_DIMS: Vec3 = Vec3 {
    x: 10.0,
    y: 10.0,
    z: 10.0,
};
/// Extents substituted when an animation itself carries a zero vector.
const DEFAULT_ANIMATION_DIMS: Vec3 = Vec3 {
    x: 24.0,
    y: 53.0,
    z: 24.0,
};

/// A typed leaf value inside the text grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum LtaValue {
    Str(String),
    Float(f32),
    Int(i64),
    Vector(Vec3),
    Quat(Quat),
    Matrix(Mat4),
    List(Vec<LtaValue>),
}

impl LtaValue {
    fn serialize(&self, depth: usize, out: &mut String) {
        match self {
            Self::Str(s) => {
                let _ = write!(out, "\"{s}\"");
            }
            Self::Float(f) => {
                let _ = write!(out, "{f:.6}");
            }
            Self::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Self::Vector(v) => {
                let _ = write!(out, "{:.6} {:.6} {:.6}", v.x, v.y, v.z);
            }
            Self::Quat(q) => {
                let _ = write!(out, "{:.6} {:.6} {:.6} {:.6}", q.x, q.y, q.z, q.w);
            }
            Self::Matrix(m) => {
                for row in &m.rows {
                    out.push('\n');
                    push_tabs(out, depth);
                    out.push('(');
                    for value in row {
                        let _ = write!(out, " {value:.6}");
                    }
                    out.push_str(" )");
                }
                out.push('\n');
                push_tabs(out, depth);
            }
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    item.serialize(depth, out);
                    if i + 1 != items.len() {
                        out.push(' ');
                    }
                }
            }
        }
    }
}

/// One labelled node of the text tree: a name, an optional typed value,
/// and ordered children. Anonymous nodes (empty name) act as property
/// slots and grouping containers.
#[derive(Debug, Clone, Default)]
pub struct LtaNode {
    name: String,
    value: Option<LtaValue>,
    children: Vec<LtaNode>,
}

impl LtaNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_value(name: &str, value: LtaValue) -> Self {
        Self {
            name: name.to_string(),
            value: Some(value),
            children: Vec::new(),
        }
    }

    /// Anonymous value slot.
    pub fn property(value: LtaValue) -> Self {
        Self::with_value("", value)
    }

    /// Anonymous grouping container.
    pub fn container() -> Self {
        Self::new("")
    }

    pub fn push(&mut self, child: Self) -> &mut Self {
        self.children.push(child);
        self.children.last_mut().unwrap_or_else(|| unreachable!())
    }

    /// Serializes the subtree with tab indentation per depth.
    pub fn serialize(&self, depth: usize, out: &mut String) {
        push_tabs(out, depth);
        let _ = write!(out, "({} ", self.name);

        if let Some(value) = &self.value {
            value.serialize(depth, out);
        }

        if self.children.is_empty() {
            out.push_str(")\n");
            return;
        }

        out.push('\n');
        for child in &self.children {
            child.serialize(depth + 1, out);
        }
        push_tabs(out, depth);
        out.push_str(")\n");
    }
}

fn push_tabs(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

/// Serializes a model graph to LTA text.
#[derive(Debug, Default)]
pub struct LtaWriter;

impl LtaWriter {
    pub fn new() -> Self {
        Self
    }

    /// Builds the whole document and renders it to a string.
    pub fn write(&self, model: &Model) -> String {
        let mut root = LtaNode::new("lt-model-0");
        root.push(self.build_on_load_cmds(model));
        root.push(self.build_hierarchy(model));
        for piece in &model.pieces {
            root.push(self.build_shape(piece));
        }
        for animation in &model.animations {
            root.push(self.build_animset(model, animation));
        }

        let mut out = String::new();
        root.serialize(0, &mut out);
        out
    }

    fn build_on_load_cmds(&self, model: &Model) -> LtaNode {
        let mut cmds = LtaNode::new("on-load-cmds");
        let container = cmds.push(LtaNode::container());

        container.push(self.build_anim_bindings(model));
        container.push(self.build_node_flags(model));
        for piece in &model.pieces {
            container.push(self.build_deformer(model, piece));
        }

        // An empty command string is still written out explicitly.
        container.push(LtaNode::with_value(
            "set-command-string",
            LtaValue::Str(model.command_string.clone()),
        ));
        container.push(LtaNode::with_value(
            "set-global-radius",
            LtaValue::Float(model.internal_radius),
        ));

        if !model.sockets.is_empty() {
            container.push(self.build_sockets(model));
        }
        if !model.weight_sets.is_empty() {
            container.push(self.build_anim_weightsets(model));
        }
        cmds
    }

    fn build_anim_bindings(&self, model: &Model) -> LtaNode {
        let mut bindings = LtaNode::new("anim-bindings");
        let container = bindings.push(LtaNode::container());

        if model.animations.is_empty() {
            return bindings;
        }

        if model.anim_bindings.is_empty() {
            // No binding table in the source; derive one per animation.
            for animation in &model.animations {
                let dims = if animation.extents.length() == 0.0 {
                    DEFAULT_ANIMATION_DIMS
                } else {
                    animation.extents
                };
                let binding = container.push(LtaNode::new("anim-binding"));
                binding.push(LtaNode::with_value(
                    "name",
                    LtaValue::Str(animation.name.clone()),
                ));
                binding
                    .push(LtaNode::new("dims"))
                    .push(LtaNode::property(LtaValue::Vector(dims)));
                binding
                    .push(LtaNode::new("translation"))
                    .push(LtaNode::property(LtaValue::Vector(Vec3::ZERO)));
                binding.push(LtaNode::with_value(
                    "interp-time",
                    LtaValue::Int(i64::from(animation.interpolation_time)),
                ));
            }
        } else {
            for (i, anim_binding) in model.anim_bindings.iter().enumerate() {
                let dims = if anim_binding.extents.length() == 0.0 {
                    DEFAULT_BINDING_DIMS
                } else {
                    anim_binding.extents
                };
                let interp_time = model
                    .animations
                    .get(i)
                    .map_or(200, |a| a.interpolation_time);

                let binding = container.push(LtaNode::new("anim-binding"));
                binding.push(LtaNode::with_value(
                    "name",
                    LtaValue::Str(anim_binding.name.clone()),
                ));
                binding
                    .push(LtaNode::new("dims"))
                    .push(LtaNode::property(LtaValue::Vector(dims)));
                binding
                    .push(LtaNode::new("translation"))
                    .push(LtaNode::property(LtaValue::Vector(anim_binding.origin)));
                binding.push(LtaNode::with_value(
                    "interp-time",
                    LtaValue::Int(i64::from(interp_time)),
                ));
            }
        }
        bindings
    }

    fn build_node_flags(&self, model: &Model) -> LtaNode {
        let mut flags = LtaNode::new("set-node-flags");
        let container = flags.push(LtaNode::container());
        for node in &model.nodes {
            container.push(LtaNode::property(LtaValue::List(vec![
                LtaValue::Str(node.name.clone()),
                LtaValue::Int(i64::from(node.flags.bits())),
            ])));
        }
        flags
    }

    fn build_deformer(&self, model: &Model, piece: &Piece) -> LtaNode {
        let mut add_deformer = LtaNode::new("add-deformer");
        let deformer = add_deformer.push(LtaNode::new("skel-deformer"));
        deformer.push(LtaNode::with_value(
            "target",
            LtaValue::Str(piece.name.clone()),
        ));

        let influences = LtaValue::List(
            model
                .nodes
                .iter()
                .map(|n| LtaValue::Str(n.name.clone()))
                .collect(),
        );
        deformer
            .push(LtaNode::new("influences"))
            .push(LtaNode::property(influences));

        let rigid_node = match piece.attachment {
            Attachment::Rigid { node_index, .. } => Some(node_index),
            _ => None,
        };

        let weightsets = deformer.push(LtaNode::new("weightsets"));
        let container = weightsets.push(LtaNode::container());
        for lod in &piece.lods {
            for vertex in &lod.vertices {
                let mut pairs = Vec::new();
                if let Some(node_index) = rigid_node {
                    // Rigid geometry rides one bone at full weight.
                    pairs.push(LtaValue::Int(node_index as i64));
                    pairs.push(LtaValue::Float(1.0));
                } else if vertex.weights.is_empty() {
                    pairs.push(LtaValue::Int(0));
                    pairs.push(LtaValue::Float(1.0));
                } else {
                    for weight in &vertex.weights {
                        if (weight.node_index as usize) < model.nodes.len() {
                            pairs.push(LtaValue::Int(i64::from(weight.node_index)));
                            pairs.push(LtaValue::Float(weight.bias));
                        }
                    }
                }
                container.push(LtaNode::property(LtaValue::List(pairs)));
            }
        }
        add_deformer
    }

    fn build_sockets(&self, model: &Model) -> LtaNode {
        let mut add_sockets = LtaNode::new("add-sockets");
        for socket in &model.sockets {
            let Some(parent) = model.nodes.get(socket.node_index as usize) else {
                log::warn!(
                    "socket '{}' references node {} outside the skeleton",
                    socket.name,
                    socket.node_index
                );
                continue;
            };
            let entry =
                add_sockets.push(LtaNode::with_value("socket", LtaValue::Str(socket.name.clone())));
            entry.push(LtaNode::with_value(
                "parent",
                LtaValue::Str(parent.name.clone()),
            ));
            entry
                .push(LtaNode::new("pos"))
                .push(LtaNode::property(LtaValue::Vector(socket.location)));
            entry
                .push(LtaNode::new("quat"))
                .push(LtaNode::property(LtaValue::Quat(socket.rotation)));
        }
        add_sockets
    }

    fn build_anim_weightsets(&self, model: &Model) -> LtaNode {
        let mut weightsets = LtaNode::new("anim-weightsets");
        let container = weightsets.push(LtaNode::container());
        for set in &model.weight_sets {
            let entry = container.push(LtaNode::new("anim-weightset"));
            entry.push(LtaNode::with_value(
                "name",
                LtaValue::Str(format!("WeightSet{}", set.id)),
            ));
            let weights = LtaValue::List(
                set.node_weights
                    .iter()
                    .map(|&w| LtaValue::Float(w))
                    .collect(),
            );
            entry
                .push(LtaNode::new("weights"))
                .push(LtaNode::property(weights));
        }
        weightsets
    }

    /// Emits the skeleton as nested transform scopes.
    ///
    /// The walk is an explicit stack over the pre-order node list: each
    /// frame owns the transform being assembled plus the number of direct
    /// children it still expects; a frame whose children are all delivered
    /// is folded into its parent.
    fn build_hierarchy(&self, model: &Model) -> LtaNode {
        struct Frame {
            transform: LtaNode,
            remaining: u32,
            completed: Vec<LtaNode>,
        }

        fn fold(frame: Frame) -> LtaNode {
            let mut transform = frame.transform;
            if !frame.completed.is_empty() {
                let children = transform.push(LtaNode::new("children"));
                let container = children.push(LtaNode::container());
                for child in frame.completed {
                    container.push(child);
                }
            }
            transform
        }

        let mut hierarchy = LtaNode::new("hierarchy");
        let children = hierarchy.push(LtaNode::new("children"));
        let top = children.push(LtaNode::container());

        let mut stack: Vec<Frame> = Vec::new();
        let mut roots: Vec<LtaNode> = Vec::new();

        for node in &model.nodes {
            // Fold finished frames before placing the next node.
            while stack.last().is_some_and(|f| f.remaining == 0) {
                let done = fold(stack.pop().unwrap_or_else(|| unreachable!()));
                match stack.last_mut() {
                    Some(parent) => parent.completed.push(done),
                    None => roots.push(done),
                }
            }

            let mut transform = LtaNode::with_value("transform", LtaValue::Str(node.name.clone()));
            transform
                .push(LtaNode::new("matrix"))
                .push(LtaNode::property(LtaValue::Matrix(node.bind_matrix)));

            if let Some(parent) = stack.last_mut() {
                parent.remaining = parent.remaining.saturating_sub(1);
            }
            stack.push(Frame {
                transform,
                remaining: node.child_count,
                completed: Vec::new(),
            });
        }
        while let Some(frame) = stack.pop() {
            let done = fold(frame);
            match stack.last_mut() {
                Some(parent) => parent.completed.push(done),
                None => roots.push(done),
            }
        }
        for root in roots {
            top.push(root);
        }
        hierarchy
    }

    fn build_shape(&self, piece: &Piece) -> LtaNode {
        let mut shape = LtaNode::with_value("shape", LtaValue::Str(piece.name.clone()));
        let geometry = shape.push(LtaNode::new("geometry"));
        let mesh = geometry.push(LtaNode::with_value("mesh", LtaValue::Str(piece.name.clone())));

        let mut vertex_container = LtaNode::container();
        let mut normal_container = LtaNode::container();
        let mut uv_container = LtaNode::container();
        let mut face_indices: Vec<LtaValue> = Vec::new();

        let rigid_transform = match &piece.attachment {
            Attachment::Rigid { transform, .. } => Some(*transform),
            _ => None,
        };

        for lod in &piece.lods {
            for face in &lod.faces {
                for corner in &face.vertices {
                    uv_container.push(LtaNode::property(LtaValue::List(vec![
                        LtaValue::Float(corner.texcoord.x),
                        LtaValue::Float(corner.texcoord.y),
                    ])));
                    face_indices.push(LtaValue::Int(i64::from(corner.vertex_index)));
                }
            }
            for vertex in &lod.vertices {
                // Rigid geometry is written in world space, recovered from
                // the retained object-space values where present.
                let (location, normal) = match (rigid_transform, vertex.original_location) {
                    (Some(bind), Some(original)) => (
                        bind.transform_point(original),
                        bind.rotate_direction(vertex.original_normal.unwrap_or(vertex.normal)),
                    ),
                    _ => (vertex.location, vertex.normal),
                };
                vertex_container.push(LtaNode::property(LtaValue::Vector(location)));
                normal_container.push(LtaNode::property(LtaValue::Vector(normal)));
            }
        }

        let uv_indices: Vec<LtaValue> =
            (0..face_indices.len() as i64).map(LtaValue::Int).collect();

        mesh.push(LtaNode::new("vertex")).push(vertex_container);
        mesh.push(LtaNode::new("normals")).push(normal_container);
        mesh.push(LtaNode::new("uvs")).push(uv_container);
        mesh.push(LtaNode::new("tex-fs"))
            .push(LtaNode::property(LtaValue::List(uv_indices)));
        mesh.push(LtaNode::new("tri-fs"))
            .push(LtaNode::property(LtaValue::List(face_indices)));

        shape
            .push(LtaNode::new("texture-indices"))
            .push(LtaNode::property(LtaValue::List(vec![LtaValue::Int(
                i64::from(piece.material_index),
            )])));
        shape
    }

    fn build_animset(&self, model: &Model, animation: &Animation) -> LtaNode {
        let mut animset = LtaNode::with_value("animset", LtaValue::Str(animation.name.clone()));
        animset
            .push(LtaNode::new("dims"))
            .push(LtaNode::property(LtaValue::Vector(animation.extents)));

        let keyframe_outer = animset.push(LtaNode::new("keyframe"));
        let keyframe_inner = keyframe_outer.push(LtaNode::new("keyframe"));
        let times: Vec<LtaValue> = animation
            .keyframes
            .iter()
            .map(|k| LtaValue::Int(i64::from(k.time)))
            .collect();
        let values: Vec<LtaValue> = animation
            .keyframes
            .iter()
            .map(|k| LtaValue::Str(k.string.clone()))
            .collect();
        keyframe_inner
            .push(LtaNode::new("times"))
            .push(LtaNode::property(LtaValue::List(times)));
        keyframe_inner
            .push(LtaNode::new("values"))
            .push(LtaNode::property(LtaValue::List(values)));

        let anims = animset.push(LtaNode::new("anims"));
        let container = anims.push(LtaNode::container());
        for (i, transforms) in animation.node_keyframe_transforms.iter().enumerate() {
            let parent_name = model
                .nodes
                .get(i)
                .map_or_else(|| format!("node{i}"), |n: &Node| n.name.clone());
            let anim = container.push(LtaNode::new("anim"));
            anim.push(LtaNode::with_value("parent", LtaValue::Str(parent_name)));
            let frames = anim.push(LtaNode::new("frames"));
            let posquat = frames.push(LtaNode::new("posquat"));
            let posquat_container = posquat.push(LtaNode::container());
            for transform in transforms {
                let entry = posquat_container.push(LtaNode::container());
                entry.push(LtaNode::property(LtaValue::Vector(transform.location)));
                entry.push(LtaNode::property(LtaValue::Quat(transform.rotation)));
            }
        }
        animset
    }
}
