//! Writing a model graph as ABC and reading it back.

mod common;

use std::io::Cursor;

use lith_model::{read_model, AbcReader, AbcWriter, FileKind};
use pretty_assertions::assert_eq;

use common::sample_model;

#[test]
fn counts_survive_the_round_trip() {
    let original = sample_model();
    let bytes = AbcWriter::new().write(&original).unwrap();
    let restored = AbcReader::new().read(&mut Cursor::new(bytes)).unwrap();

    assert_eq!(restored.nodes.len(), original.nodes.len());
    assert_eq!(restored.pieces.len(), original.pieces.len());
    assert_eq!(restored.animations.len(), original.animations.len());
    assert_eq!(restored.sockets.len(), original.sockets.len());
    assert_eq!(restored.child_models.len(), original.child_models.len());
    assert_eq!(restored.anim_bindings.len(), original.anim_bindings.len());
    assert_eq!(restored.weight_sets.len(), original.weight_sets.len());
    assert_eq!(restored.keyframe_count(), original.keyframe_count());
    assert_eq!(restored.face_count(), original.face_count());
    assert_eq!(restored.vertex_count(), original.vertex_count());
}

#[test]
fn header_fields_survive_the_round_trip() {
    let original = sample_model();
    let bytes = AbcWriter::new().write(&original).unwrap();
    let restored = AbcReader::new().read(&mut Cursor::new(bytes)).unwrap();

    assert_eq!(restored.command_string, "LODWeight 0.5");
    assert!((restored.internal_radius - 32.0).abs() < f32::EPSILON);
    assert_eq!(restored.lod_count, 1);
}

#[test]
fn skeleton_structure_survives_the_round_trip() {
    let original = sample_model();
    let bytes = AbcWriter::new().write(&original).unwrap();
    let restored = AbcReader::new().read(&mut Cursor::new(bytes)).unwrap();

    assert_eq!(restored.nodes[0].name, "root");
    assert_eq!(restored.nodes[1].name, "hand");
    assert_eq!(restored.nodes[0].flags, original.nodes[0].flags);
    assert_eq!(restored.nodes[0].children, vec![1]);
    assert_eq!(restored.nodes[1].parent, Some(0));
    assert_eq!(
        restored.nodes[1].bind_matrix.translation(),
        original.nodes[1].bind_matrix.translation()
    );
}

#[test]
fn vertex_weights_stay_normalized() {
    let original = sample_model();
    let bytes = AbcWriter::new().write(&original).unwrap();
    let restored = AbcReader::new().read(&mut Cursor::new(bytes)).unwrap();

    let lod = &restored.pieces[0].lods[0];
    assert_eq!(lod.vertices.len(), 3);
    for vertex in &lod.vertices {
        let sum: f32 = vertex.weights.iter().map(|w| w.bias).sum();
        assert!((sum - 1.0).abs() < 1e-4, "weight sum {sum} drifted");
    }
    // Per-weight values are preserved, not just the sum.
    assert!((lod.vertices[1].weights[0].bias - 0.25).abs() < 1e-6);
    assert!((lod.vertices[1].weights[1].bias - 0.75).abs() < 1e-6);
}

#[test]
fn faces_and_texcoords_survive_the_round_trip() {
    let original = sample_model();
    let bytes = AbcWriter::new().write(&original).unwrap();
    let restored = AbcReader::new().read(&mut Cursor::new(bytes)).unwrap();

    let lod = &restored.pieces[0].lods[0];
    assert_eq!(lod.faces.len(), 1);
    let face = &lod.faces[0];
    let indices: Vec<u16> = face.vertices.iter().map(|c| c.vertex_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert!((face.vertices[1].texcoord.x - 0.5).abs() < f32::EPSILON);
}

#[test]
fn animation_content_survives_the_round_trip() {
    let original = sample_model();
    let bytes = AbcWriter::new().write(&original).unwrap();
    let restored = AbcReader::new().read(&mut Cursor::new(bytes)).unwrap();

    let animation = &restored.animations[0];
    assert_eq!(animation.name, "walk");
    assert_eq!(animation.interpolation_time, 200);
    assert_eq!(animation.keyframes[0].time, 0);
    assert_eq!(animation.keyframes[1].time, 400);
    assert_eq!(animation.keyframes[1].string, "footstep");
    assert_eq!(animation.node_keyframe_transforms.len(), 2);
    assert_eq!(animation.node_keyframe_transforms[0].len(), 2);
}

#[test]
fn sockets_and_bindings_survive_the_round_trip() {
    let original = sample_model();
    let bytes = AbcWriter::new().write(&original).unwrap();
    let restored = AbcReader::new().read(&mut Cursor::new(bytes)).unwrap();

    assert_eq!(restored.sockets[0].name, "RightHand");
    assert_eq!(restored.sockets[0].node_index, 1);
    assert_eq!(restored.anim_bindings[0].name, "walk");
    assert_eq!(restored.child_models[0].name, "body_base");
    assert_eq!(restored.child_models[0].build_number, 7);
    assert_eq!(restored.child_models[0].transforms.len(), 2);
}

#[test]
fn written_bytes_probe_as_abc() {
    let bytes = AbcWriter::new().write(&sample_model()).unwrap();
    let (_, kind) = read_model(&mut Cursor::new(bytes)).unwrap();
    assert_eq!(kind, FileKind::Abc);
}
