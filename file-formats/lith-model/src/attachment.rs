//! Post-pass classifying how each piece binds to the skeleton.
//!
//! The console format overloads one per-LOD field: for rigid meshes it is
//! the attaching node index, for skeletal meshes a bone count. Resolution
//! runs once after pieces and nodes are loaded, normalizes rigid geometry
//! into world space, and marks anything it cannot classify as unresolved
//! rather than failing the import.

use crate::model::{Attachment, MeshType, Model, Weight};

/// Classifies every piece and normalizes its vertex coordinate space.
///
/// Failure to resolve a piece (out-of-range node index, missing weights)
/// is logged and recorded as [`Attachment::Unresolved`]; it never aborts
/// the import.
pub fn resolve_attachments(model: &mut Model) {
    let nodes = &model.nodes;
    for piece in &mut model.pieces {
        let Some(lod) = piece.lods.first_mut() else {
            log::warn!("piece '{}' has no detail levels, leaving unresolved", piece.name);
            piece.attachment = Attachment::Unresolved;
            continue;
        };

        match lod.mesh_type {
            Some(MeshType::Rigid) => {
                let node_index = lod.node_binding as usize;
                let Some(node) = nodes.get(node_index) else {
                    log::warn!(
                        "piece '{}': rigid node index {node_index} out of range ({} nodes)",
                        piece.name,
                        nodes.len()
                    );
                    piece.attachment = Attachment::Unresolved;
                    continue;
                };

                let bind = node.bind_matrix;
                for vertex in &mut lod.vertices {
                    // Keep the object-space values so writers can recover
                    // either frame.
                    vertex.original_location = Some(vertex.location);
                    vertex.original_normal = Some(vertex.normal);
                    vertex.location = bind.transform_point(vertex.location);
                    vertex.normal = bind.rotate_direction(vertex.normal);
                    vertex.weights = vec![Weight {
                        node_index: lod.node_binding,
                        location: vertex.original_location.unwrap_or_default(),
                        bias: 1.0,
                    }];
                }

                piece.mesh_type = Some(MeshType::Rigid);
                piece.attachment = Attachment::Rigid {
                    node_index,
                    transform: bind,
                };
            }
            Some(MeshType::Skeletal) => {
                let weighted = lod.vertices.iter().filter(|v| !v.weights.is_empty()).count();
                if weighted > 0 {
                    log::debug!(
                        "piece '{}': {weighted}/{} vertices carry bone weights",
                        piece.name,
                        lod.vertices.len()
                    );
                    piece.mesh_type = Some(MeshType::Skeletal);
                    piece.attachment = Attachment::Skeletal;
                } else {
                    log::warn!(
                        "piece '{}': skeletal mesh without any vertex weights",
                        piece.name
                    );
                    piece.attachment = Attachment::Unresolved;
                }
            }
            _ if lod.node_binding == 0 => {
                // World-anchored geometry stays in the coordinates as read.
                piece.attachment = Attachment::World;
            }
            other => {
                log::warn!(
                    "piece '{}': unclassifiable mesh type {other:?} with binding {}",
                    piece.name,
                    lod.node_binding
                );
                piece.attachment = Attachment::Unresolved;
            }
        }
    }
}
