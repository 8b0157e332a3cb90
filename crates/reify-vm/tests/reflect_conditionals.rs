//! Integration tests for conditional types: extends checks, eager and
//! jumped branches, distribution over unions, and infer captures

use reify_types::{same_type, LiteralValue, TypeKind};
use reify_vm::{Op, Packed, PoolEntry, Processor, ReflectOptions};

#[test]
fn test_extends_pushes_boolean_literal() {
    // literal "abc" extends string -> true
    let (packed, mut p) = (
        Packed::new(
            vec![PoolEntry::String("abc".into())],
            &[
                Op::Literal as u8,
                0,
                Op::String as u8,
                Op::Extends as u8,
            ],
        )
        .unwrap(),
        Processor::new(),
    );
    let ty = p.reflect(packed, &[], ReflectOptions::default()).unwrap();
    assert!(matches!(
        p.arena().kind(ty),
        TypeKind::Literal { value: LiteralValue::Boolean(true) }
    ));
}

#[test]
fn test_jump_condition_calls_branch_programs() {
    // condition ? string : number, as two subroutines
    let ops = [
        Op::Jump as u8,
        7,
        // then-branch subroutine
        Op::String as u8,
        Op::Return as u8,
        // else-branch subroutine
        Op::Number as u8,
        Op::Return as u8,
        Op::Never as u8, // padding, never executed
        // main
        Op::Literal as u8,
        0,
        Op::JumpCondition as u8,
        2,
        4,
    ];

    let truthy = Packed::new(vec![PoolEntry::Boolean(true)], &ops).unwrap();
    let mut p = Processor::new();
    let ty = p.reflect(truthy, &[], ReflectOptions::default()).unwrap();
    assert!(matches!(p.arena().kind(ty), TypeKind::String));

    let falsy = Packed::new(vec![PoolEntry::Boolean(false)], &ops).unwrap();
    let ty = p.reflect(falsy, &[], ReflectOptions::default()).unwrap();
    assert!(matches!(p.arena().kind(ty), TypeKind::Number { .. }));
}

/// `type NonNull<T> = T extends null | undefined ? never : T`, distributive
fn non_null_program() -> std::rc::Rc<reify_vm::Packed> {
    Packed::new(
        vec![PoolEntry::String("T".into())],
        &[
            Op::Jump as u8,
            17,
            // body: called per union member, member in the distribute frame
            Op::Frame as u8, // 2: condition frame
            Op::Loads as u8,
            2,
            0, // member
            Op::Frame as u8, // 6: union frame
            Op::Null as u8,
            Op::Undefined as u8,
            Op::Union as u8,
            Op::Extends as u8, // 10
            Op::Never as u8,   // 11: then-branch
            Op::Loads as u8,   // 12: else-branch = member
            2,
            0,
            Op::Condition as u8, // 15
            Op::Return as u8,    // 16
            // main
            Op::TypeParameter as u8, // 17
            0,
            Op::Frame as u8, // 19: distribute frame
            Op::Var as u8,   // 20: loop variable
            Op::Loads as u8, // 21: the distributed type
            1,
            0,
            Op::Distribute as u8, // 24
            2,
        ],
    )
    .unwrap()
}

#[test]
fn test_distributive_conditional_filters_null() {
    // NonNull<string | null> -> string
    let mut p = Processor::new();
    let s = p.arena_mut().alloc(TypeKind::String);
    let null = p.arena_mut().alloc(TypeKind::Null);
    let input = p
        .arena_mut()
        .alloc(TypeKind::Union { types: vec![s, null] });
    let ty = p
        .reflect(non_null_program(), &[input], ReflectOptions::default())
        .unwrap();
    assert!(matches!(p.arena().kind(ty), TypeKind::String));
}

#[test]
fn test_distributive_law() {
    // NonNull<A | B> == NonNull<A> | NonNull<B>
    let program = non_null_program();
    let mut p = Processor::new();
    let s = p.arena_mut().alloc(TypeKind::String);
    let n = p.arena_mut().alloc(TypeKind::Number { brand: None });
    let union = p.arena_mut().alloc(TypeKind::Union { types: vec![s, n] });

    let whole = p
        .reflect(program.clone(), &[union], ReflectOptions::default())
        .unwrap();

    let per_s = p
        .reflect(program.clone(), &[s], ReflectOptions::default())
        .unwrap();
    let per_n = p
        .reflect(program, &[n], ReflectOptions::default())
        .unwrap();
    let manual = p.arena_mut().alloc(TypeKind::Union {
        types: vec![per_s, per_n],
    });

    assert!(same_type(p.arena(), whole, manual));
}

#[test]
fn test_distribute_over_non_union_runs_once() {
    let mut p = Processor::new();
    let s = p.arena_mut().alloc(TypeKind::String);
    let ty = p
        .reflect(non_null_program(), &[s], ReflectOptions::default())
        .unwrap();
    assert!(matches!(p.arena().kind(ty), TypeKind::String));
}

#[test]
fn test_all_members_filtered_yields_never() {
    let mut p = Processor::new();
    let null = p.arena_mut().alloc(TypeKind::Null);
    let undef = p.arena_mut().alloc(TypeKind::Undefined);
    let input = p.arena_mut().alloc(TypeKind::Union {
        types: vec![null, undef],
    });
    let ty = p
        .reflect(non_null_program(), &[input], ReflectOptions::default())
        .unwrap();
    assert!(p.arena().kind(ty).is_never());
}

#[test]
fn test_infer_captures_into_variable_slot() {
    // type ElementOf<T> = T extends (infer U)[] ? U : never
    let packed = Packed::new(
        vec![PoolEntry::String("T".into())],
        &[
            Op::TypeParameter as u8,
            0,
            Op::Var as u8, // U
            Op::Frame as u8,
            Op::Loads as u8,
            1,
            0, // T
            Op::Infer as u8,
            1,
            1, // capture into root slot 1 (U)
            Op::Array as u8,
            Op::Extends as u8,
            Op::Loads as u8,
            1,
            1, // U
            Op::Never as u8,
            Op::Condition as u8,
        ],
    )
    .unwrap();

    let mut p = Processor::new();
    let s = p.arena_mut().alloc(TypeKind::String);
    let arr = p.arena_mut().alloc_linked(TypeKind::Array { element: s });
    let ty = p
        .reflect(packed.clone(), &[arr], ReflectOptions::default())
        .unwrap();
    assert!(matches!(p.arena().kind(ty), TypeKind::String));

    // A non-array input takes the else branch.
    let num = p.arena_mut().alloc(TypeKind::Number { brand: None });
    let ty = p.reflect(packed, &[num], ReflectOptions::default()).unwrap();
    assert!(p.arena().kind(ty).is_never());
}
