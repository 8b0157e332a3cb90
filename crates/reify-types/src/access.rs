//! Indexed access (`T[K]`), `keyof`, and member accessors

use crate::extendable::{aggregate_members, find_member, member_value_type};
use crate::normalize::{flatten_union_types, unbox_union};
use crate::ty::{
    Annotations, LiteralValue, NodeId, TypeArena, TypeKind,
};

/// Resolve the structural indexed-access operator `container[index]`
///
/// Unions distribute on both sides; a miss resolves to `never`.
pub fn index_access(arena: &mut TypeArena, container: NodeId, index: NodeId) -> NodeId {
    // Distribute over the container first, then over the index.
    if let TypeKind::Union { types } = arena.kind(container) {
        let members = types.clone();
        let results: Vec<NodeId> = members
            .iter()
            .map(|&m| index_access(arena, m, index))
            .collect();
        let flat = flatten_union_types(arena, &results);
        return unbox_union(arena, flat);
    }
    if let TypeKind::Union { types } = arena.kind(index) {
        let keys = types.clone();
        let results: Vec<NodeId> = keys
            .iter()
            .map(|&k| index_access(arena, container, k))
            .collect();
        let flat = flatten_union_types(arena, &results);
        return unbox_union(arena, flat);
    }

    match (arena.kind(container).clone(), arena.kind(index).clone()) {
        // Named member lookup.
        (
            TypeKind::ObjectLiteral { .. } | TypeKind::Class { .. },
            TypeKind::Literal { value },
        ) => {
            let name = value.to_display_string();
            let members = aggregate_members(arena, container);
            match find_member(arena, &members, &name) {
                Some(member) => match arena.kind(member) {
                    TypeKind::Method { .. } | TypeKind::MethodSignature { .. } => member,
                    _ => {
                        let ty = member_value_type(arena, member);
                        if member_is_optional(arena, member) {
                            let undef = arena.alloc(TypeKind::Undefined);
                            let flat = flatten_union_types(arena, &[ty, undef]);
                            unbox_union(arena, flat)
                        } else {
                            ty
                        }
                    }
                },
                None => index_signature_lookup(arena, container, index)
                    .unwrap_or_else(|| arena.alloc(TypeKind::Never)),
            }
        }
        // Index signature domain lookup: `T[string]`, `T[number]`.
        (
            TypeKind::ObjectLiteral { .. } | TypeKind::Class { .. },
            TypeKind::String | TypeKind::Number { .. } | TypeKind::Symbol,
        ) => index_signature_lookup(arena, container, index)
            .unwrap_or_else(|| arena.alloc(TypeKind::Never)),
        // Tuples by literal position.
        (TypeKind::Tuple { members }, TypeKind::Literal { value: LiteralValue::Number(n) }) => {
            let pos = n as usize;
            match members.get(pos) {
                Some(&member) => tuple_member_payload(arena, member),
                None => arena.alloc(TypeKind::Never),
            }
        }
        // Tuples by `number`: union of member types.
        (TypeKind::Tuple { members }, TypeKind::Number { .. }) => {
            let payloads: Vec<NodeId> = members
                .iter()
                .map(|&m| tuple_member_payload(arena, m))
                .collect();
            let flat = flatten_union_types(arena, &payloads);
            unbox_union(arena, flat)
        }
        // Arrays by `number` or numeric literal.
        (
            TypeKind::Array { element },
            TypeKind::Number { .. } | TypeKind::Literal { value: LiteralValue::Number(_) },
        ) => element,
        // `string[index]` and template parts are out of this operator's domain.
        _ => arena.alloc(TypeKind::Never),
    }
}

fn member_is_optional(arena: &TypeArena, member: NodeId) -> bool {
    matches!(
        arena.kind(member),
        TypeKind::Property { optional: true, .. }
            | TypeKind::PropertySignature { optional: true, .. }
    )
}

fn tuple_member_payload(arena: &TypeArena, member: NodeId) -> NodeId {
    match arena.kind(member) {
        TypeKind::TupleMember { member, .. } => *member,
        TypeKind::Rest { ty } => *ty,
        _ => member,
    }
}

/// Find an index signature whose domain accepts `index`
fn index_signature_lookup(
    arena: &TypeArena,
    container: NodeId,
    index: NodeId,
) -> Option<NodeId> {
    let members = aggregate_members(arena, container);
    members.iter().copied().find_map(|m| {
        let TypeKind::IndexSignature { index: domain, ty } = arena.kind(m) else {
            return None;
        };
        let matches = match (arena.kind(*domain), arena.kind(index)) {
            (TypeKind::String, TypeKind::String)
            | (TypeKind::Number { .. }, TypeKind::Number { .. })
            | (TypeKind::Symbol, TypeKind::Symbol) => true,
            // String index signatures also serve literal string keys; number
            // signatures serve numeric literals.
            (TypeKind::String, TypeKind::Literal { value: LiteralValue::String(_) }) => true,
            (TypeKind::Number { .. }, TypeKind::Literal { value: LiteralValue::Number(_) }) => {
                true
            }
            _ => false,
        };
        matches.then_some(*ty)
    })
}

/// Member-name literals for `keyof T`
///
/// Object shapes yield one string (or number) literal per named member;
/// every other kind yields nothing, so `keyof` of it collapses to `never`.
pub fn keyof_members(arena: &mut TypeArena, ty: NodeId) -> Vec<NodeId> {
    let members = aggregate_members(arena, ty);
    let names: Vec<String> = members
        .iter()
        .filter_map(|&m| arena.kind(m).member_name().map(str::to_string))
        .collect();
    names
        .into_iter()
        .map(|name| {
            arena.alloc(TypeKind::Literal {
                value: LiteralValue::String(name),
            })
        })
        .collect()
}

/// Find a named member on an object shape
pub fn get_member(arena: &TypeArena, ty: NodeId, name: &str) -> Option<NodeId> {
    let members = aggregate_members(arena, ty);
    find_member(arena, &members, name)
}

/// The annotation map of a node
pub fn get_annotations(arena: &TypeArena, ty: NodeId) -> &Annotations {
    &arena.get(ty).annotations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj_with(arena: &mut TypeArena, fields: &[(&str, NodeId)]) -> NodeId {
        let members: Vec<NodeId> = fields
            .iter()
            .map(|(name, ty)| {
                arena.alloc(TypeKind::PropertySignature {
                    name: (*name).into(),
                    ty: *ty,
                    optional: false,
                    readonly: false,
                    description: None,
                })
            })
            .collect();
        arena.alloc_linked(TypeKind::ObjectLiteral { members })
    }

    fn string_key(arena: &mut TypeArena, name: &str) -> NodeId {
        arena.alloc(TypeKind::Literal {
            value: LiteralValue::String(name.into()),
        })
    }

    #[test]
    fn test_index_access_named_member() {
        let mut arena = TypeArena::new();
        let n = arena.alloc(TypeKind::Number { brand: None });
        let obj = obj_with(&mut arena, &[("a", n)]);
        let key = string_key(&mut arena, "a");
        assert_eq!(index_access(&mut arena, obj, key), n);

        let missing = string_key(&mut arena, "zzz");
        let result = index_access(&mut arena, obj, missing);
        assert!(arena.kind(result).is_never());
    }

    #[test]
    fn test_index_access_optional_member_unions_undefined() {
        let mut arena = TypeArena::new();
        let n = arena.alloc(TypeKind::Number { brand: None });
        let prop = arena.alloc(TypeKind::PropertySignature {
            name: "a".into(),
            ty: n,
            optional: true,
            readonly: false,
            description: None,
        });
        let obj = arena.alloc_linked(TypeKind::ObjectLiteral {
            members: vec![prop],
        });
        let key = string_key(&mut arena, "a");
        let result = index_access(&mut arena, obj, key);
        let TypeKind::Union { types } = arena.kind(result) else {
            panic!("expected union");
        };
        assert_eq!(types.len(), 2);
    }

    #[test]
    fn test_index_access_distributes_over_key_union() {
        let mut arena = TypeArena::new();
        let n = arena.alloc(TypeKind::Number { brand: None });
        let s = arena.alloc(TypeKind::String);
        let obj = obj_with(&mut arena, &[("a", n), ("b", s)]);
        let ka = string_key(&mut arena, "a");
        let kb = string_key(&mut arena, "b");
        let keys = arena.alloc(TypeKind::Union {
            types: vec![ka, kb],
        });
        let result = index_access(&mut arena, obj, keys);
        let TypeKind::Union { types } = arena.kind(result) else {
            panic!("expected union");
        };
        assert_eq!(types, &vec![n, s]);
    }

    #[test]
    fn test_index_access_tuple_and_array() {
        let mut arena = TypeArena::new();
        let s = arena.alloc(TypeKind::String);
        let n = arena.alloc(TypeKind::Number { brand: None });
        let m0 = arena.alloc(TypeKind::TupleMember {
            member: s,
            name: None,
            optional: false,
        });
        let m1 = arena.alloc(TypeKind::TupleMember {
            member: n,
            name: None,
            optional: false,
        });
        let tuple = arena.alloc_linked(TypeKind::Tuple {
            members: vec![m0, m1],
        });
        let one = arena.alloc(TypeKind::Literal {
            value: LiteralValue::Number(1.0),
        });
        assert_eq!(index_access(&mut arena, tuple, one), n);

        let number = arena.alloc(TypeKind::Number { brand: None });
        let all = index_access(&mut arena, tuple, number);
        assert!(arena.kind(all).is_union());

        let arr = arena.alloc(TypeKind::Array { element: s });
        assert_eq!(index_access(&mut arena, arr, number), s);
    }

    #[test]
    fn test_index_signature_serves_literals() {
        let mut arena = TypeArena::new();
        let s = arena.alloc(TypeKind::String);
        let n = arena.alloc(TypeKind::Number { brand: None });
        let sig = arena.alloc(TypeKind::IndexSignature { index: s, ty: n });
        let obj = arena.alloc_linked(TypeKind::ObjectLiteral { members: vec![sig] });

        let key = string_key(&mut arena, "anything");
        assert_eq!(index_access(&mut arena, obj, key), n);

        let domain = arena.alloc(TypeKind::String);
        assert_eq!(index_access(&mut arena, obj, domain), n);
    }

    #[test]
    fn test_keyof_members() {
        let mut arena = TypeArena::new();
        let n = arena.alloc(TypeKind::Number { brand: None });
        let obj = obj_with(&mut arena, &[("a", n), ("b", n)]);
        let keys = keyof_members(&mut arena, obj);
        assert_eq!(keys.len(), 2);
        assert!(matches!(
            arena.kind(keys[0]),
            TypeKind::Literal { value: LiteralValue::String(s) } if s == "a"
        ));

        let keys_of_string = keyof_members(&mut arena, n);
        assert!(keys_of_string.is_empty());
    }

    #[test]
    fn test_get_member() {
        let mut arena = TypeArena::new();
        let n = arena.alloc(TypeKind::Number { brand: None });
        let obj = obj_with(&mut arena, &[("a", n)]);
        assert!(get_member(&arena, obj, "a").is_some());
        assert!(get_member(&arena, obj, "b").is_none());
    }
}
