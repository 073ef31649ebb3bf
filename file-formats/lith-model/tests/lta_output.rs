//! Shape checks on the generated LTA text.

mod common;

use std::io::Cursor;

use lith_model::{LtaWriter, Ps2LtbReader};

use common::{build_ps2_fixture, sample_model};

#[test]
fn sample_model_renders_every_top_level_section() {
    let text = LtaWriter::new().write(&sample_model());

    assert!(text.starts_with("(lt-model-0 \n"));
    for needle in [
        "(on-load-cmds ",
        "(anim-bindings ",
        "(set-node-flags ",
        "(add-deformer ",
        "(set-command-string \"LODWeight 0.5\")",
        "(set-global-radius 32.000000)",
        "(add-sockets ",
        "(anim-weightsets ",
        "(hierarchy ",
        "(shape \"Body\"",
        "(animset \"walk\"",
    ] {
        assert!(text.contains(needle), "missing {needle} in:\n{text}");
    }
}

#[test]
fn deformer_lists_per_vertex_weight_pairs() {
    let text = LtaWriter::new().write(&sample_model());

    assert!(text.contains("(target \"Body\")"));
    assert!(text.contains("(influences "));
    // Vertex 1 carries weights 0.25 / 0.75 across both bones.
    assert!(text.contains("0 0.250000 1 0.750000"));
}

#[test]
fn console_model_round_trips_into_text() {
    let data = build_ps2_fixture();
    let model = Ps2LtbReader::new().read(&mut Cursor::new(data)).unwrap();
    let text = LtaWriter::new().write(&model);

    assert!(text.contains("(shape \"Gun\""));
    assert!(text.contains("(animset \"walk\""));
    assert!(text.contains("(socket \"RightHand\""));
    assert!(text.contains("(parent \"gun_mount\")"));
    // Rigid pieces get a single full-weight pair per vertex.
    assert!(text.contains("1 1.000000"));
}

#[test]
fn rigid_vertices_are_written_in_world_space() {
    let data = build_ps2_fixture();
    let model = Ps2LtbReader::new().read(&mut Cursor::new(data)).unwrap();
    let text = LtaWriter::new().write(&model);

    // Object-space (1, 0, 0) through the (10, 0, 0) bind translation.
    assert!(text.contains("11.000000 0.000000 0.000000"));
}

#[test]
fn list_values_nest_below_their_named_node() {
    let text = LtaWriter::new().write(&sample_model());

    // Index and keyframe lists sit in an anonymous child one tab deeper
    // than the named node, never inline on the named node's own line.
    for needle in [
        "\t\t\t\t(tex-fs \n\t\t\t\t\t( 0 1 2)\n\t\t\t\t)\n",
        "\t\t\t\t(tri-fs \n\t\t\t\t\t( 0 1 2)\n\t\t\t\t)\n",
        "\t\t(texture-indices \n\t\t\t( 2)\n\t\t)\n",
        "\t\t\t\t(times \n\t\t\t\t\t( 0 400)\n\t\t\t\t)\n",
        "\t\t\t\t(values \n\t\t\t\t\t( \"\" \"footstep\")\n\t\t\t\t)\n",
    ] {
        assert!(text.contains(needle), "missing {needle:?} in:\n{text}");
    }
    assert!(!text.contains("(times 0"));
    assert!(!text.contains("(tri-fs 0"));
}

#[test]
fn output_indents_with_tabs_only() {
    let text = LtaWriter::new().write(&sample_model());
    for line in text.lines() {
        let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
        assert!(
            indent.chars().all(|c| c == '\t'),
            "non-tab indentation in line: {line:?}"
        );
    }
}
