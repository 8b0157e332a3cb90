//! Integration tests for basic type program execution
//!
//! Programs are assembled by hand, the way the encoder would emit them:
//! op bytes with in-line parameters, names and payloads in the constant
//! pool.

use std::rc::Rc;

use reify_types::{same_type, EnumValue, LiteralValue, TypeKind, Visibility};
use reify_vm::{Op, Packed, PoolEntry, Processor, ReflectOptions, Value};

fn run(pool: Vec<PoolEntry>, ops: &[u8]) -> (Processor, reify_types::NodeId) {
    let _ = env_logger::builder().is_test(true).try_init();
    let packed = Packed::new(pool, ops).unwrap();
    let mut processor = Processor::new();
    let ty = processor
        .reflect(packed, &[], ReflectOptions::default())
        .unwrap();
    (processor, ty)
}

#[test]
fn test_union_of_string_and_literal() {
    // union { string, literal "abc" } after flattening
    let (p, ty) = run(
        vec![PoolEntry::String("abc".into())],
        &[Op::String as u8, Op::Literal as u8, 0, Op::Union as u8],
    );
    let TypeKind::Union { types } = p.arena().kind(ty) else {
        panic!("expected union, got {}", p.arena().kind(ty).name());
    };
    assert_eq!(types.len(), 2);
    assert!(matches!(p.arena().kind(types[0]), TypeKind::String));
    assert!(matches!(
        p.arena().kind(types[1]),
        TypeKind::Literal { value: LiteralValue::String(s) } if s == "abc"
    ));
}

#[test]
fn test_union_flattens_and_drops_never() {
    // union { string, union { number, never } } -> string | number
    let (p, ty) = run(
        vec![],
        &[
            Op::String as u8,
            Op::Frame as u8,
            Op::Number as u8,
            Op::Never as u8,
            Op::Union as u8,
            Op::Union as u8,
        ],
    );
    let TypeKind::Union { types } = p.arena().kind(ty) else {
        panic!("expected union");
    };
    assert_eq!(types.len(), 2);
    assert!(types
        .iter()
        .all(|&t| !p.arena().kind(t).is_union() && !p.arena().kind(t).is_never()));
}

#[test]
fn test_property_signature_unwraps_undefined_union() {
    // { a?: string } encoded as a: string | undefined
    let (p, ty) = run(
        vec![PoolEntry::String("a".into())],
        &[
            Op::Frame as u8,
            Op::Frame as u8,
            Op::String as u8,
            Op::Undefined as u8,
            Op::Union as u8,
            Op::PropertySignature as u8,
            0,
            Op::ObjectLiteral as u8,
        ],
    );
    let TypeKind::ObjectLiteral { members } = p.arena().kind(ty) else {
        panic!("expected object literal");
    };
    let TypeKind::PropertySignature {
        name,
        ty: prop_ty,
        optional,
        ..
    } = p.arena().kind(members[0])
    else {
        panic!("expected property signature");
    };
    assert_eq!(name, "a");
    assert!(*optional);
    assert!(matches!(p.arena().kind(*prop_ty), TypeKind::String));
}

#[test]
fn test_array_and_tuple_with_rest_splice() {
    // [boolean, ...[string, number]] splices to [boolean, string, number]
    let (p, ty) = run(
        vec![],
        &[
            Op::Frame as u8,
            Op::Boolean as u8,
            Op::TupleMember as u8,
            Op::Frame as u8,
            Op::String as u8,
            Op::TupleMember as u8,
            Op::Number as u8,
            Op::TupleMember as u8,
            Op::Tuple as u8,
            Op::Rest as u8,
            Op::Tuple as u8,
        ],
    );
    let TypeKind::Tuple { members } = p.arena().kind(ty) else {
        panic!("expected tuple");
    };
    assert_eq!(members.len(), 3);
    let kinds: Vec<&str> = members
        .iter()
        .map(|&m| {
            let TypeKind::TupleMember { member, .. } = p.arena().kind(m) else {
                panic!("expected tuple member");
            };
            p.arena().kind(*member).name()
        })
        .collect();
    assert_eq!(kinds, vec!["boolean", "string", "number"]);
}

#[test]
fn test_object_literal_extends_spread_and_duplicate_replacement() {
    // { a: string } spread into { a: number } — own member wins
    let (p, ty) = run(
        vec![PoolEntry::String("a".into())],
        &[
            Op::Frame as u8,
            Op::Frame as u8,
            Op::String as u8,
            Op::PropertySignature as u8,
            0,
            Op::ObjectLiteral as u8,
            Op::Number as u8,
            Op::PropertySignature as u8,
            0,
            Op::ObjectLiteral as u8,
        ],
    );
    let TypeKind::ObjectLiteral { members } = p.arena().kind(ty) else {
        panic!("expected object literal");
    };
    assert_eq!(members.len(), 1);
    let TypeKind::PropertySignature { ty: prop_ty, .. } = p.arena().kind(members[0]) else {
        panic!("expected property signature");
    };
    assert!(matches!(p.arena().kind(*prop_ty), TypeKind::Number { .. }));
}

#[test]
fn test_method_and_function() {
    // method m(a: string) => number
    let (p, ty) = run(
        vec![PoolEntry::String("a".into()), PoolEntry::String("m".into())],
        &[
            Op::Frame as u8,
            Op::String as u8,
            Op::Parameter as u8,
            0,
            Op::Number as u8,
            Op::Method as u8,
            1,
        ],
    );
    let TypeKind::Method {
        name,
        parameters,
        return_type,
        visibility,
        ..
    } = p.arena().kind(ty)
    else {
        panic!("expected method");
    };
    assert_eq!(name, "m");
    assert_eq!(*visibility, Visibility::Public);
    assert_eq!(parameters.len(), 1);
    assert!(matches!(
        p.arena().kind(*return_type),
        TypeKind::Number { .. }
    ));

    // function f() => void
    let (p, ty) = run(
        vec![PoolEntry::String("f".into())],
        &[
            Op::Frame as u8,
            Op::Void as u8,
            Op::Function as u8,
            0,
        ],
    );
    let TypeKind::Function { name, .. } = p.arena().kind(ty) else {
        panic!("expected function");
    };
    assert_eq!(name.as_deref(), Some("f"));
}

#[test]
fn test_modifiers() {
    let (p, ty) = run(
        vec![PoolEntry::String("a".into())],
        &[
            Op::Frame as u8,
            Op::String as u8,
            Op::Property as u8,
            0,
            Op::Readonly as u8,
            Op::Optional as u8,
            Op::Private as u8,
            Op::ObjectLiteral as u8,
        ],
    );
    let TypeKind::ObjectLiteral { members } = p.arena().kind(ty) else {
        panic!("expected object literal");
    };
    let TypeKind::Property {
        optional,
        readonly,
        visibility,
        ..
    } = p.arena().kind(members[0])
    else {
        panic!("expected property");
    };
    assert!(*optional);
    assert!(*readonly);
    assert_eq!(*visibility, Visibility::Private);
}

#[test]
fn test_enum_value_continuation() {
    // enum { A, B = 5, C, D = "x" } -> 0, 5, 6, "x"
    let thunk_five: reify_vm::ValueThunk = Rc::new(|| Value::Number(5.0));
    let thunk_x: reify_vm::ValueThunk = Rc::new(|| Value::String("x".into()));
    let (p, ty) = run(
        vec![
            PoolEntry::String("A".into()),
            PoolEntry::String("B".into()),
            PoolEntry::String("C".into()),
            PoolEntry::String("D".into()),
            PoolEntry::ValueThunk(thunk_five),
            PoolEntry::ValueThunk(thunk_x),
        ],
        &[
            Op::Frame as u8,
            Op::EnumMember as u8,
            0,
            Op::EnumMember as u8,
            1,
            Op::DefaultValue as u8,
            4,
            Op::EnumMember as u8,
            2,
            Op::EnumMember as u8,
            3,
            Op::DefaultValue as u8,
            5,
            Op::Enum as u8,
        ],
    );
    let TypeKind::Enum { members, values } = p.arena().kind(ty) else {
        panic!("expected enum");
    };
    assert_eq!(
        members,
        &vec![
            ("A".to_string(), EnumValue::Number(0.0)),
            ("B".to_string(), EnumValue::Number(5.0)),
            ("C".to_string(), EnumValue::Number(6.0)),
            ("D".to_string(), EnumValue::String("x".into())),
        ]
    );
    assert_eq!(values.len(), 4);
}

#[test]
fn test_builtin_generics() {
    // Set<string>
    let (p, ty) = run(vec![], &[Op::String as u8, Op::Set as u8]);
    let node = p.arena().get(ty);
    assert_eq!(node.type_name.as_deref(), Some("Set"));
    assert_eq!(node.type_arguments.len(), 1);

    // Map<string, number>: key pushed first, then value
    let (p, ty) = run(
        vec![],
        &[Op::String as u8, Op::Number as u8, Op::Map as u8],
    );
    let node = p.arena().get(ty);
    assert_eq!(node.type_name.as_deref(), Some("Map"));
    assert!(matches!(
        p.arena().kind(node.type_arguments[0]),
        TypeKind::String
    ));
    assert!(matches!(
        p.arena().kind(node.type_arguments[1]),
        TypeKind::Number { .. }
    ));

    // Promise<boolean>
    let (p, ty) = run(vec![], &[Op::Boolean as u8, Op::Promise as u8]);
    assert!(matches!(p.arena().kind(ty), TypeKind::Promise { .. }));
}

#[test]
fn test_parent_closure() {
    // Every non-root node's parent contains it.
    let (p, ty) = run(
        vec![PoolEntry::String("a".into())],
        &[
            Op::Frame as u8,
            Op::Frame as u8,
            Op::String as u8,
            Op::Undefined as u8,
            Op::Union as u8,
            Op::PropertySignature as u8,
            0,
            Op::ObjectLiteral as u8,
        ],
    );
    let arena = p.arena();
    let mut queue = vec![ty];
    let mut visited = std::collections::HashSet::new();
    while let Some(node) = queue.pop() {
        if !visited.insert(node) {
            continue;
        }
        for child in arena.kind(node).children() {
            let parent = arena.get(child).parent.expect("child has a parent");
            assert!(
                arena.kind(parent).children().contains(&child),
                "parent does not contain its child"
            );
            queue.push(child);
        }
    }
}

#[test]
fn test_determinism() {
    let pool = vec![PoolEntry::String("abc".into())];
    let ops = [Op::String as u8, Op::Literal as u8, 0, Op::Union as u8];
    let packed = Packed::new(pool, &ops).unwrap();
    let mut p = Processor::new();
    let a = p
        .reflect(packed.clone(), &[], ReflectOptions::default())
        .unwrap();
    let b = p.reflect(packed, &[], ReflectOptions::default()).unwrap();
    assert_ne!(a, b);
    assert!(same_type(p.arena(), a, b));
}

#[test]
fn test_terminal_literal_narrowing() {
    // A widened literal at program end narrows back to its original.
    let (p, ty) = run(
        vec![PoolEntry::String("abc".into())],
        &[Op::Literal as u8, 0, Op::Widen as u8],
    );
    assert!(matches!(
        p.arena().kind(ty),
        TypeKind::Literal { value: LiteralValue::String(s) } if s == "abc"
    ));
}

#[test]
fn test_widen_inside_containers_sticks() {
    // widen is not terminal here, so the array element stays widened
    let (p, ty) = run(
        vec![PoolEntry::String("abc".into())],
        &[Op::Literal as u8, 0, Op::Widen as u8, Op::Array as u8],
    );
    let TypeKind::Array { element } = p.arena().kind(ty) else {
        panic!("expected array");
    };
    assert!(matches!(p.arena().kind(*element), TypeKind::String));
}

#[test]
fn test_number_brand() {
    let (p, ty) = run(vec![], &[Op::NumberBrand as u8, 0]);
    assert!(matches!(
        p.arena().kind(ty),
        TypeKind::Number {
            brand: Some(reify_types::NumberBrand::Integer)
        }
    ));
}

#[test]
fn test_stack_underflow_fails_fast() {
    let packed = Packed::new(vec![], &[Op::Array as u8]).unwrap();
    let mut p = Processor::new();
    let err = p.reflect(packed, &[], ReflectOptions::default()).unwrap_err();
    assert!(matches!(err, reify_vm::ReflectError::StackUnderflow { .. }));
}

#[test]
fn test_arg_reads_below_call_frame() {
    // sub(x) = x[]; main: sub(string)
    let (p, ty) = run(
        vec![],
        &[
            Op::Jump as u8,
            6,
            // subroutine
            Op::Arg as u8,
            1,
            Op::Array as u8,
            Op::Return as u8,
            // main
            Op::String as u8,
            Op::Call as u8,
            2,
        ],
    );
    let TypeKind::Array { element } = p.arena().kind(ty) else {
        panic!("expected array, got {}", p.arena().kind(ty).name());
    };
    assert!(matches!(p.arena().kind(*element), TypeKind::String));
}

#[test]
fn test_move_frame_keeps_value() {
    let (p, ty) = run(
        vec![],
        &[
            Op::String as u8,
            Op::Frame as u8,
            Op::Number as u8,
            Op::MoveFrame as u8,
        ],
    );
    assert!(matches!(p.arena().kind(ty), TypeKind::Number { .. }));
}

#[test]
fn test_named_tuple_member() {
    let (p, ty) = run(
        vec![PoolEntry::String("x".into())],
        &[
            Op::Frame as u8,
            Op::Number as u8,
            Op::NamedTupleMember as u8,
            0,
            Op::Tuple as u8,
        ],
    );
    let TypeKind::Tuple { members } = p.arena().kind(ty) else {
        panic!("expected tuple");
    };
    let TypeKind::TupleMember { name, .. } = p.arena().kind(members[0]) else {
        panic!("expected tuple member");
    };
    assert_eq!(name.as_deref(), Some("x"));
}

#[test]
fn test_description_and_default_value() {
    let thunk: reify_vm::ValueThunk = Rc::new(|| Value::Number(7.0));
    let (p, ty) = run(
        vec![
            PoolEntry::String("port".into()),
            PoolEntry::ValueThunk(thunk),
            PoolEntry::String("listen port".into()),
        ],
        &[
            Op::Frame as u8,
            Op::Number as u8,
            Op::Property as u8,
            0,
            Op::DefaultValue as u8,
            1,
            Op::Description as u8,
            2,
            Op::ObjectLiteral as u8,
        ],
    );
    let TypeKind::ObjectLiteral { members } = p.arena().kind(ty) else {
        panic!("expected object literal");
    };
    let TypeKind::Property {
        default,
        description,
        ..
    } = p.arena().kind(members[0])
    else {
        panic!("expected property");
    };
    assert_eq!(description.as_deref(), Some("listen port"));
    let value = default
        .as_ref()
        .and_then(|d| d.downcast_ref::<Value>())
        .expect("default holds the host value");
    assert!(matches!(value, Value::Number(n) if *n == 7.0));
}

#[test]
fn test_class_extends_arguments() {
    let (p, ty) = run(
        vec![PoolEntry::String("a".into())],
        &[
            Op::Frame as u8,
            Op::String as u8,
            Op::Property as u8,
            0,
            Op::Class as u8,
            Op::String as u8,
            Op::Number as u8,
            Op::ClassExtends as u8,
            2,
        ],
    );
    let TypeKind::Class {
        extends_arguments, ..
    } = p.arena().kind(ty)
    else {
        panic!("expected class");
    };
    assert_eq!(extends_arguments.len(), 2);
    assert!(matches!(
        p.arena().kind(extends_arguments[0]),
        TypeKind::String
    ));
    assert!(matches!(
        p.arena().kind(extends_arguments[1]),
        TypeKind::Number { .. }
    ));
}
