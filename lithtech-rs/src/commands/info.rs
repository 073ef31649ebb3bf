//! Model inspection command

use std::path::Path;

use anyhow::{Context, Result};
use lith_model::model::{Attachment, Lod, Model, Node, Piece};
use lith_model::read_model_file;

pub fn execute(path: &Path, detailed: bool) -> Result<()> {
    println!("Loading model: {}", path.display());

    let (model, kind) = read_model_file(path)
        .with_context(|| format!("Failed to read model from {}", path.display()))?;

    println!("\n=== Model Information ===");
    println!("Format:          {kind}");
    println!("Version:         {}", model.version);
    println!("Command string:  {:?}", model.command_string);
    println!("Radius:          {}", model.internal_radius);
    println!("Nodes:           {}", model.nodes.len());
    println!("Pieces:          {}", model.pieces.len());
    println!("Faces:           {}", model.face_count());
    println!("Vertices:        {}", model.vertex_count());
    println!("Animations:      {}", model.animations.len());
    println!("Keyframes:       {}", model.keyframe_count());
    println!("Sockets:         {}", model.sockets.len());
    println!("Child models:    {}", model.child_models.len());
    println!("Weight sets:     {}", model.weight_sets.len());

    if detailed {
        print_skeleton(&model);
        print_animations(&model);
        print_pieces(&model);
    }

    Ok(())
}

fn print_skeleton(model: &Model) {
    println!("\n=== Skeleton ===");
    for (index, node) in model.nodes.iter().enumerate() {
        if node.parent.is_none() {
            print_node(model, index, node, 0);
        }
    }
}

fn print_node(model: &Model, index: usize, node: &Node, depth: usize) {
    let flags = if node.flags.is_empty() {
        String::new()
    } else {
        format!("  [{:?}]", node.flags)
    };
    println!("{}{} ({index}){flags}", "  ".repeat(depth), node.name);
    for &child in &node.children {
        if let Some(child_node) = model.nodes.get(child) {
            print_node(model, child, child_node, depth + 1);
        }
    }
}

fn print_animations(model: &Model) {
    if model.animations.is_empty() {
        return;
    }
    println!("\n=== Animations ===");
    println!("{:<24} {:>10} {:>12}", "Name", "Keyframes", "Duration(ms)");
    for animation in &model.animations {
        let duration = animation.keyframes.last().map_or(0, |k| k.time);
        println!(
            "{:<24} {:>10} {:>12}",
            animation.name,
            animation.keyframes.len(),
            duration
        );
    }
}

fn print_pieces(model: &Model) {
    if model.pieces.is_empty() {
        return;
    }
    println!("\n=== Pieces ===");
    for piece in &model.pieces {
        let lod = piece.lods.first();
        println!(
            "{}: {} vertices, {} faces, {}, {} divergent normals",
            piece.name,
            lod.map_or(0, |l| l.vertices.len()),
            lod.map_or(0, |l| l.faces.len()),
            attachment_label(piece),
            lod.map_or(0, divergent_normal_count),
        );
    }
}

/// Stored normals that disagree with a face-averaged rebuild. A nonzero
/// count usually means the source mesh shipped hand-edited normals.
fn divergent_normal_count(lod: &Lod) -> usize {
    lod.vertices
        .iter()
        .zip(lod.averaged_normals())
        .filter(|(vertex, avg)| {
            let dot =
                vertex.normal.x * avg.x + vertex.normal.y * avg.y + vertex.normal.z * avg.z;
            dot < 0.999
        })
        .count()
}

fn attachment_label(piece: &Piece) -> String {
    match &piece.attachment {
        Attachment::World => "world-anchored".to_string(),
        Attachment::Rigid { node_index, .. } => format!("rigid on node {node_index}"),
        Attachment::Skeletal => "skeletal".to_string(),
        Attachment::Unresolved => "unresolved attachment".to_string(),
    }
}
