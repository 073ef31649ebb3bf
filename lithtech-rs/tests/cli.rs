//! CLI integration tests: real invocations of the binary against a small
//! ABC file generated on the fly.

use std::fs;

use assert_cmd::Command;
use lith_model::model::{Face, Lod, Model, Node, NodeFlags, Piece, Vertex};
use lith_model::types::Vec3;
use lith_model::AbcWriter;
use predicates::prelude::*;
use tempfile::TempDir;

fn write_sample_abc(dir: &TempDir) -> std::path::PathBuf {
    let mut model = Model {
        command_string: "LODWeight 0.5".to_string(),
        internal_radius: 32.0,
        nodes: vec![
            Node {
                name: "root".to_string(),
                flags: NodeFlags::REMOVABLE,
                child_count: 1,
                ..Default::default()
            },
            Node {
                name: "head".to_string(),
                index: 1,
                ..Default::default()
            },
        ],
        ..Default::default()
    };
    model.link_nodes().unwrap();

    // A triangle in the XY plane whose stored normals all point along +X,
    // away from the face normal.
    let mut face = Face::default();
    for (corner, index) in face.vertices.iter_mut().zip(0u16..) {
        corner.vertex_index = index;
    }
    let vertex = |x: f32, y: f32| Vertex {
        location: Vec3::new(x, y, 0.0),
        normal: Vec3::new(1.0, 0.0, 0.0),
        ..Default::default()
    };
    model.lod_count = 1;
    model.pieces.push(Piece {
        name: "Body".to_string(),
        lods: vec![Lod {
            vertices: vec![vertex(0.0, 0.0), vertex(1.0, 0.0), vertex(0.0, 1.0)],
            faces: vec![face],
            ..Default::default()
        }],
        ..Default::default()
    });

    let path = dir.path().join("sample.abc");
    fs::write(&path, AbcWriter::new().write(&model).unwrap()).unwrap();
    path
}

#[test]
fn info_reports_format_and_counts() {
    let dir = TempDir::new().unwrap();
    let input = write_sample_abc(&dir);

    Command::cargo_bin("lithtech-rs")
        .unwrap()
        .args(["info"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"Format:\s+ABC").unwrap())
        .stdout(predicate::str::is_match(r"Nodes:\s+2").unwrap());
}

#[test]
fn detailed_info_prints_the_skeleton_tree() {
    let dir = TempDir::new().unwrap();
    let input = write_sample_abc(&dir);

    Command::cargo_bin("lithtech-rs")
        .unwrap()
        .args(["info", "--detailed"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("=== Skeleton ==="))
        .stdout(predicate::str::contains("root (0)"))
        .stdout(predicate::str::contains("  head (1)"));
}

#[test]
fn detailed_info_flags_normals_that_disagree_with_face_average() {
    let dir = TempDir::new().unwrap();
    let input = write_sample_abc(&dir);

    // All three stored normals point away from the rebuilt face normal.
    Command::cargo_bin("lithtech-rs")
        .unwrap()
        .args(["info", "--detailed"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Body: 3 vertices, 1 faces, world-anchored, 3 divergent normals",
        ));
}

#[test]
fn convert_to_lta_writes_a_model_document() {
    let dir = TempDir::new().unwrap();
    let input = write_sample_abc(&dir);
    let output = dir.path().join("sample.lta");

    Command::cargo_bin("lithtech-rs")
        .unwrap()
        .arg("convert")
        .arg(&input)
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Detected format: ABC"));

    let text = fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("(lt-model-0 "));
    assert!(text.contains("(set-command-string \"LODWeight 0.5\")"));
}

#[test]
fn convert_to_abc_round_trips_through_the_probe() {
    let dir = TempDir::new().unwrap();
    let input = write_sample_abc(&dir);
    let output = dir.path().join("copy.abc");

    Command::cargo_bin("lithtech-rs")
        .unwrap()
        .arg("convert")
        .arg(&input)
        .arg(&output)
        .assert()
        .success();

    Command::cargo_bin("lithtech-rs")
        .unwrap()
        .arg("info")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"Format:\s+ABC").unwrap());
}

#[test]
fn unknown_output_extension_fails() {
    let dir = TempDir::new().unwrap();
    let input = write_sample_abc(&dir);
    let output = dir.path().join("sample.obj");

    Command::cargo_bin("lithtech-rs")
        .unwrap()
        .arg("convert")
        .arg(&input)
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported output extension"));
}

#[test]
fn unreadable_input_fails_with_context() {
    let dir = TempDir::new().unwrap();
    let garbage = dir.path().join("noise.ltb");
    fs::write(&garbage, vec![0xEEu8; 64]).unwrap();

    Command::cargo_bin("lithtech-rs")
        .unwrap()
        .arg("info")
        .arg(&garbage)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read model"));
}
