//! Shared fixtures: an in-memory sample model and a hand-assembled
//! console LTB byte image exercising the hashed-name and batch paths.

use lith_model::hash::hash_name;
use lith_model::io_ext::{write_string, WriteExt};
use lith_model::model::{
    Animation, AnimBinding, ChildModel, Keyframe, Lod, Model, Node, NodeFlags, Piece, Socket,
    Vertex, Weight, WeightSet,
};
use lith_model::types::{Mat4, Quat, Transform, Vec2, Vec3};

/// Seed magic written into the fixture header.
pub const FIXTURE_MAGIC: u32 = 0x0600_0D00;

/// A small but fully-populated model: two bones, one skinned piece, one
/// animation, one socket, one child model reference.
pub fn sample_model() -> Model {
    let mut model = Model {
        command_string: "LODWeight 0.5".to_string(),
        internal_radius: 32.0,
        lod_count: 1,
        nodes: vec![
            Node {
                name: "root".to_string(),
                index: 0,
                flags: NodeFlags::REMOVABLE,
                child_count: 1,
                ..Default::default()
            },
            Node {
                name: "hand".to_string(),
                index: 1,
                bind_matrix: Mat4::from_translation(Vec3::new(0.0, 8.0, 0.0)),
                ..Default::default()
            },
        ],
        pieces: vec![Piece {
            name: "Body".to_string(),
            material_index: 2,
            specular_power: 5.0,
            lods: vec![sample_lod()],
            ..Default::default()
        }],
        animations: vec![Animation {
            name: "walk".to_string(),
            extents: Vec3::new(24.0, 53.0, 24.0),
            interpolation_time: 200,
            keyframes: vec![
                Keyframe {
                    time: 0,
                    string: String::new(),
                },
                Keyframe {
                    time: 400,
                    string: "footstep".to_string(),
                },
            ],
            node_keyframe_transforms: vec![
                vec![Transform::default(), Transform::default()],
                vec![Transform::default(), Transform::default()],
            ],
            ..Default::default()
        }],
        sockets: vec![Socket {
            node_index: 1,
            name: "RightHand".to_string(),
            rotation: Quat::default(),
            location: Vec3::new(0.5, 1.5, 2.5),
        }],
        child_models: vec![ChildModel {
            name: "body_base".to_string(),
            build_number: 7,
            transforms: vec![Transform::default(), Transform::default()],
        }],
        anim_bindings: vec![AnimBinding {
            name: "walk".to_string(),
            extents: Vec3::new(24.0, 53.0, 24.0),
            origin: Vec3::ZERO,
        }],
        weight_sets: vec![WeightSet {
            id: 3,
            node_weights: vec![0.0, 1.0],
        }],
        ..Default::default()
    };
    model.link_nodes().expect("consistent child counts");
    model
}

fn sample_lod() -> Lod {
    let vertex = |x: f32, y: f32, w0: f32| Vertex {
        location: Vec3::new(x, y, 0.0),
        normal: Vec3::new(0.0, 0.0, 1.0),
        weights: vec![
            Weight {
                node_index: 0,
                location: Vec3::new(x, y, 0.0),
                bias: w0,
            },
            Weight {
                node_index: 1,
                location: Vec3::new(x, y, 0.0),
                bias: 1.0 - w0,
            },
        ],
        ..Default::default()
    };
    let mut lod = Lod {
        vertices: vec![
            vertex(0.0, 0.0, 1.0),
            vertex(1.0, 0.0, 0.25),
            vertex(0.0, 1.0, 0.5),
        ],
        ..Default::default()
    };
    let mut face = lith_model::model::Face::default();
    for (corner, (index, u)) in face
        .vertices
        .iter_mut()
        .zip([(0u16, 0.0f32), (1, 0.5), (2, 1.0)])
    {
        corner.vertex_index = index;
        corner.texcoord = Vec2::new(u, 0.5);
    }
    lod.faces = vec![face];
    lod
}

fn push_command(buf: &mut Vec<u8>, constant: i16, code: u8) {
    buf.write_i16_le(constant).unwrap();
    buf.write_u8(0).unwrap();
    buf.write_u8(code).unwrap();
}

/// Connector block opening a geometry batch (48 bytes).
fn push_connector(buf: &mut Vec<u8>) {
    push_command(buf, 0, 0); // transfer
    buf.write_i32_le(0).unwrap();
    push_command(buf, 0x11, 0); // flush
    for _ in 0..4 {
        buf.write_i32_le(0).unwrap();
    }
    push_command(buf, 0x50, 0x6C); // unpack
    buf.write_i32_le(1).unwrap(); // mesh set count
    buf.write_i32_le(0).unwrap(); // mesh data count
    buf.write_i32_le(0).unwrap();
    buf.write_i32_le(0).unwrap();
}

/// Padded vertex record with the 1.0 sentinel at byte 12 (48 bytes).
fn push_vertex(buf: &mut Vec<u8>, location: [f32; 3], stream_index: u16) {
    for v in location {
        buf.write_f32_le(v).unwrap();
    }
    buf.write_f32_le(1.0).unwrap();
    for v in [0.0f32, 0.0, 1.0] {
        buf.write_f32_le(v).unwrap();
    }
    buf.write_f32_le(1.0).unwrap();
    buf.write_f32_le(f32::from(stream_index) * 0.1).unwrap(); // u
    buf.write_f32_le(0.5).unwrap(); // v
    buf.write_f32_le(f32::from(stream_index)).unwrap();
    buf.write_f32_le(0.0).unwrap();
}

/// One compressed keyframe transform: location x = raw/0x1000, identity
/// rotation.
fn push_compressed_transform(buf: &mut Vec<u8>, loc_x_raw: i16) {
    for v in [loc_x_raw, 0, 0, 0, 0, 0, 0, 0x4000] {
        buf.write_i16_le(v).unwrap();
    }
}

/// Builds a complete single-piece console LTB file image.
///
/// Two plaintext-named nodes, one rigid piece bound to node 1, one
/// animation, one socket, one blend weight set. Piece, animation, and
/// socket names are stored hashed under [`FIXTURE_MAGIC`].
pub fn build_ps2_fixture() -> Vec<u8> {
    let mut buf = Vec::new();

    buf.write_i32_le(2).unwrap(); // file type
    buf.write_i16_le(16).unwrap(); // version
    buf.extend_from_slice(&[0u8; 14]); // reserved

    // Offset table, patched once the section positions are known.
    let offset_table_at = buf.len();
    for _ in 0..7 {
        buf.write_i32_le(0).unwrap();
    }
    buf.write_i32_le(0).unwrap(); // trailing reserved word

    // keyframes, animations, nodes, pieces, child models, triangles,
    // vertices, weights, lods, sockets, weight sets, strings, string
    // length, unknown
    for count in [2, 1, 2, 1, 1, 1, 3, 3, 1, 1, 1, 0, 0, 0] {
        buf.write_i32_le(count).unwrap();
    }

    write_string(&mut buf, "SetScale 1.0").unwrap();
    buf.write_f32_le(48.0).unwrap(); // radius
    buf.write_i32_le(FIXTURE_MAGIC as i32).unwrap();
    buf.write_i32_le(0).unwrap();
    buf.write_i32_le(0).unwrap();

    // Pieces: one rigid piece bound to node 1, one mesh set of three
    // vertices.
    let pieces_at = buf.len() as i32;
    buf.write_i32_le(1).unwrap();
    buf.write_i32_le(hash_name(FIXTURE_MAGIC, "Gun") as i32).unwrap();
    buf.write_f32_le(5.0).unwrap(); // specular power
    buf.write_f32_le(1.0).unwrap(); // specular scale
    buf.write_f32_le(0.5).unwrap(); // lod weight
    buf.extend_from_slice(&[0u8; 36]);
    buf.write_i32_le(3).unwrap(); // texture index
    buf.extend_from_slice(&[0u8; 8]);
    buf.write_i32_le(4).unwrap();

    buf.write_i32_le(4).unwrap(); // mesh type: rigid
    buf.write_i32_le(3).unwrap(); // vertex count
    buf.write_i32_le(1).unwrap(); // node binding
    push_connector(&mut buf);
    // Mesh set header: 3 vertices, last-set flag, plain winding.
    buf.write_u8(3).unwrap();
    buf.write_u8(0x80).unwrap();
    buf.extend_from_slice(&[0, 0]);
    buf.write_u32_le(0).unwrap();
    buf.write_u32_le(0x412).unwrap();
    buf.write_u32_le(0).unwrap();
    push_vertex(&mut buf, [0.0, 0.0, 0.0], 0);
    push_vertex(&mut buf, [1.0, 0.0, 0.0], 1);
    push_vertex(&mut buf, [0.0, 1.0, 0.0], 2);
    // End command.
    for _ in 0..3 {
        buf.write_i32_le(0).unwrap();
    }
    buf.write_i32_le(0x1500_0000).unwrap();

    // Nodes, weight sets trailing.
    let nodes_at = buf.len() as i32;
    write_string(&mut buf, "root").unwrap();
    Mat4::default().write(&mut buf).unwrap();
    buf.write_i32_le(0).unwrap();
    buf.write_u32_le(1).unwrap(); // child count
    buf.write_u16_le(0).unwrap(); // index
    buf.extend_from_slice(&[0, 0]);
    write_string(&mut buf, "gun_mount").unwrap();
    Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0))
        .write(&mut buf)
        .unwrap();
    buf.write_i32_le(0).unwrap();
    buf.write_u32_le(0).unwrap();
    buf.write_u16_le(1).unwrap();
    buf.extend_from_slice(&[0, 0]);

    buf.write_u32_le(1).unwrap(); // weight set count
    buf.write_u32_le(3).unwrap(); // id
    buf.write_u32_le(2).unwrap();
    buf.write_f32_le(0.0).unwrap();
    buf.write_f32_le(1.0).unwrap();

    // Child models: the stored count includes the model itself.
    let child_models_at = buf.len() as i32;
    buf.write_u32_le(1).unwrap();

    // Animations.
    let animations_at = buf.len() as i32;
    buf.write_u32_le(1).unwrap();
    Vec3::new(1.0, 2.0, 3.0).write(&mut buf).unwrap(); // extents
    Vec3::ZERO.write(&mut buf).unwrap();
    buf.write_u32_le(hash_name(FIXTURE_MAGIC, "walk")).unwrap();
    buf.write_u32_le(200).unwrap(); // interpolation time
    buf.write_u32_le(2).unwrap(); // keyframe count
    buf.write_u32_le(0).unwrap();
    write_string(&mut buf, "").unwrap();
    buf.write_u32_le(400).unwrap();
    write_string(&mut buf, "fire").unwrap();
    for _node in 0..2 {
        buf.write_u32_le(0).unwrap(); // start marker
        push_compressed_transform(&mut buf, 0x1000);
        push_compressed_transform(&mut buf, 0x2000);
    }

    // Sockets.
    let sockets_at = buf.len() as i32;
    buf.write_u32_le(0).unwrap();
    Quat::default().write(&mut buf).unwrap();
    Vec3::new(0.5, 1.5, 2.5).write(&mut buf).unwrap();
    buf.write_u32_le(0).unwrap();
    buf.write_u32_le(1).unwrap(); // node index
    buf.write_u32_le(hash_name(FIXTURE_MAGIC, "RightHand")).unwrap();
    buf.write_u32_le(0).unwrap();

    let file_size = buf.len() as i32;
    for (slot, value) in [
        (1, pieces_at),
        (2, nodes_at),
        (3, child_models_at),
        (4, animations_at),
        (5, sockets_at),
        (6, file_size),
    ] {
        let at = offset_table_at + slot * 4;
        buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }
    buf
}
