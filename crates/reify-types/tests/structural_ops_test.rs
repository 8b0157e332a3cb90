//! Cross-module tests composing the structural operations the VM consumes:
//! normalization feeding extendability, merge feeding indexed access.

use reify_types::{
    flatten_union_types, index_access, is_extendable, keyof_members, merge, unbox_union,
    widen_literal, LiteralValue, TypeArena, TypeKind,
};

fn prop(arena: &mut TypeArena, name: &str, ty: reify_types::NodeId) -> reify_types::NodeId {
    arena.alloc(TypeKind::PropertySignature {
        name: name.into(),
        ty,
        optional: false,
        readonly: false,
        description: None,
    })
}

#[test]
fn test_widened_literals_collapse_in_unions() {
    // widen("a") | widen("b") | string flattens to a single string
    let mut arena = TypeArena::new();
    let la = arena.alloc(TypeKind::Literal {
        value: LiteralValue::String("a".into()),
    });
    let lb = arena.alloc(TypeKind::Literal {
        value: LiteralValue::String("b".into()),
    });
    let wa = widen_literal(&mut arena, la);
    let wb = widen_literal(&mut arena, lb);
    let s = arena.alloc(TypeKind::String);

    let flat = flatten_union_types(&arena, &[wa, wb, s]);
    let unioned = unbox_union(&mut arena, flat);
    assert!(matches!(arena.kind(unioned), TypeKind::String));
}

#[test]
fn test_merged_intersection_satisfies_both_sides() {
    // merge({a: number}, {b: string}) extends both operands and serves
    // indexed access for both keys
    let mut arena = TypeArena::new();
    let n = arena.alloc(TypeKind::Number { brand: None });
    let s = arena.alloc(TypeKind::String);
    let pa = prop(&mut arena, "a", n);
    let pb = prop(&mut arena, "b", s);
    let oa = arena.alloc_linked(TypeKind::ObjectLiteral { members: vec![pa] });
    let ob = arena.alloc_linked(TypeKind::ObjectLiteral { members: vec![pb] });

    let merged = merge(&mut arena, &[oa, ob]);
    assert!(is_extendable(&arena, merged, oa));
    assert!(is_extendable(&arena, merged, ob));
    assert!(!is_extendable(&arena, oa, merged));

    let key = arena.alloc(TypeKind::Literal {
        value: LiteralValue::String("b".into()),
    });
    assert_eq!(index_access(&mut arena, merged, key), s);
}

#[test]
fn test_keyof_of_merge_unions_all_keys() {
    let mut arena = TypeArena::new();
    let n = arena.alloc(TypeKind::Number { brand: None });
    let pa = prop(&mut arena, "a", n);
    let pb = prop(&mut arena, "b", n);
    let oa = arena.alloc_linked(TypeKind::ObjectLiteral { members: vec![pa] });
    let ob = arena.alloc_linked(TypeKind::ObjectLiteral { members: vec![pb] });
    let merged = merge(&mut arena, &[oa, ob]);

    let keys = keyof_members(&mut arena, merged);
    let flat = flatten_union_types(&arena, &keys);
    let key_union = unbox_union(&mut arena, flat);
    let TypeKind::Union { types } = arena.kind(key_union) else {
        panic!("expected union of keys");
    };
    assert_eq!(types.len(), 2);

    // Each key literal extends the union of keys.
    let ka = arena.alloc(TypeKind::Literal {
        value: LiteralValue::String("a".into()),
    });
    assert!(is_extendable(&arena, ka, key_union));
}
