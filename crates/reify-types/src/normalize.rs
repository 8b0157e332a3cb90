//! Union normalization and literal widening
//!
//! Unions the VM emits are always normalized: nested unions are flattened,
//! `never` members are dropped, and members are pairwise distinct by
//! structural equality. Literal widening replaces a literal type with its
//! base primitive while remembering the original payload so the terminal
//! result of a program can be narrowed back.

use crate::ty::{same_type, LiteralValue, NodeId, TypeArena, TypeKind};

/// Check whether `ty` is structurally included in `types`
pub fn is_type_included(arena: &TypeArena, types: &[NodeId], ty: NodeId) -> bool {
    types.iter().any(|&t| same_type(arena, t, ty))
}

/// Flatten union members: nested unions are expanded recursively, `never`
/// drops out, and structural duplicates collapse to the first occurrence
pub fn flatten_union_types(arena: &TypeArena, types: &[NodeId]) -> Vec<NodeId> {
    let mut out: Vec<NodeId> = Vec::with_capacity(types.len());
    flatten_into(arena, types, &mut out);
    out
}

fn flatten_into(arena: &TypeArena, types: &[NodeId], out: &mut Vec<NodeId>) {
    for &ty in types {
        match arena.kind(ty) {
            TypeKind::Never => {}
            TypeKind::Union { types: inner } => {
                let inner = inner.clone();
                flatten_into(arena, &inner, out);
            }
            _ => {
                if !is_type_included(arena, out, ty) {
                    out.push(ty);
                }
            }
        }
    }
}

/// Collapse a member list to a single type: empty becomes `never`, a single
/// member is unboxed, anything else becomes a parented `union` node
pub fn unbox_union(arena: &mut TypeArena, members: Vec<NodeId>) -> NodeId {
    match members.len() {
        0 => arena.alloc(TypeKind::Never),
        1 => members[0],
        _ => arena.alloc_linked(TypeKind::Union { types: members }),
    }
}

/// Widen a literal to its base primitive, remembering the payload on the
/// widened node. Non-literals pass through unchanged.
pub fn widen_literal(arena: &mut TypeArena, ty: NodeId) -> NodeId {
    let TypeKind::Literal { value } = arena.kind(ty) else {
        return ty;
    };
    let value = value.clone();
    let kind = match value {
        LiteralValue::String(_) => TypeKind::String,
        LiteralValue::Number(_) => TypeKind::Number { brand: None },
        LiteralValue::Boolean(_) => TypeKind::Boolean,
        LiteralValue::BigInt(_) => TypeKind::Bigint,
        LiteralValue::Regex(_) => TypeKind::Regexp,
    };
    let widened = arena.alloc(kind);
    arena.get_mut(widened).literal_origin = Some(value);
    widened
}

/// Reverse widening for a terminal result node: a primitive that remembers a
/// literal origin collapses back to that literal
pub fn narrow_original_literal(arena: &mut TypeArena, ty: NodeId) -> NodeId {
    let node = arena.get(ty);
    if !matches!(
        node.kind,
        TypeKind::String | TypeKind::Number { .. } | TypeKind::Boolean | TypeKind::Bigint
    ) {
        return ty;
    }
    let Some(origin) = node.literal_origin.clone() else {
        return ty;
    };
    let narrowed = arena.alloc(TypeKind::Literal { value: origin });
    let annotations = arena.get(ty).annotations.clone();
    arena.get_mut(narrowed).annotations = annotations;
    narrowed
}
