//! Structural merge for intersections
//!
//! `A & B` over object shapes merges members by name, later candidates
//! overriding earlier ones; index signatures concatenate. Nominal classes
//! cannot be merged: when two distinct host classes meet, the merge falls
//! back to the first candidate.

use crate::ty::{ClassRef, NodeId, TypeArena, TypeKind};

/// Merge object-shaped intersection candidates into one `objectLiteral`
///
/// Candidates that are neither object literals nor classes contribute
/// nothing. Returns the first candidate unchanged when the set contains two
/// different host classes (nominal identity cannot merge), or `never` when
/// the candidate list is empty.
pub fn merge(arena: &mut TypeArena, candidates: &[NodeId]) -> NodeId {
    if candidates.is_empty() {
        return arena.alloc(TypeKind::Never);
    }
    if candidates.len() == 1 {
        return candidates[0];
    }

    // Two distinct nominal classes cannot merge structurally.
    let mut seen_class: Option<ClassRef> = None;
    for &c in candidates {
        if let TypeKind::Class { class, .. } = arena.kind(c) {
            match seen_class {
                None => seen_class = Some(*class),
                Some(prev) if prev == *class => {}
                Some(_) => return candidates[0],
            }
        }
    }

    let mut properties: Vec<NodeId> = Vec::new();
    let mut index_signatures: Vec<NodeId> = Vec::new();
    for &candidate in candidates {
        let members = match arena.kind(candidate) {
            TypeKind::ObjectLiteral { members } => members.clone(),
            TypeKind::Class { members, .. } => members.clone(),
            _ => continue,
        };
        for member in members {
            match arena.kind(member) {
                TypeKind::IndexSignature { .. } => index_signatures.push(member),
                kind => {
                    if let Some(name) = kind.member_name() {
                        let name = name.to_string();
                        // Later candidates override earlier members by name.
                        if let Some(existing) = properties
                            .iter()
                            .position(|&p| arena.kind(p).member_name() == Some(name.as_str()))
                        {
                            properties[existing] = member;
                        } else {
                            properties.push(member);
                        }
                    }
                }
            }
        }
    }

    let mut members = properties;
    members.extend(index_signatures);
    arena.alloc_linked(TypeKind::ObjectLiteral { members })
}
