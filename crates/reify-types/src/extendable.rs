//! Structural extendability: the `extends` operator
//!
//! Implements the assignability relation the conditional-type opcodes ask
//! about (`A extends B`). `infer` slots on the right-hand side do not fail
//! the check; they capture the matched left-hand type into an assignment
//! list the VM writes back into frame variables.

use crate::ty::{LiteralValue, NodeId, TypeArena, TypeKind};

/// An `infer` capture produced while checking extendability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferAssignment {
    /// Lexical frame distance recorded on the `infer` node
    pub frame_offset: u8,
    /// Variable slot inside that frame
    pub slot: u16,
    /// The captured type
    pub ty: NodeId,
}

/// Check whether `left extends right`
pub fn is_extendable(arena: &TypeArena, left: NodeId, right: NodeId) -> bool {
    let mut assignments = Vec::new();
    is_extendable_with_infer(arena, left, right, &mut assignments)
}

/// Check whether `left extends right`, collecting `infer` captures
pub fn is_extendable_with_infer(
    arena: &TypeArena,
    left: NodeId,
    right: NodeId,
    assignments: &mut Vec<InferAssignment>,
) -> bool {
    use TypeKind::*;

    // An infer slot matches anything and captures it.
    if let Infer { frame_offset, slot } = arena.kind(right) {
        assignments.push(InferAssignment {
            frame_offset: *frame_offset,
            slot: *slot,
            ty: left,
        });
        return true;
    }

    match (arena.kind(left), arena.kind(right)) {
        // Top types on the right accept everything.
        (_, Any) | (_, Unknown) => true,
        // `any` distributes into both branches upstream; here it extends anything.
        (Any, _) => true,
        // Bottom type.
        (Never, _) => true,
        (_, Never) => false,

        // Union on the right: some member must accept the left.
        // Checked before left-union so `A | B extends A | B` holds.
        (_, Union { .. }) if !arena.kind(left).is_union() => {
            let Union { types } = arena.kind(right) else {
                unreachable!()
            };
            let members = types.clone();
            members
                .iter()
                .any(|&m| is_extendable_with_infer(arena, left, m, assignments))
        }
        // Union on the left: every member must extend the right.
        (Union { types }, _) => {
            let members = types.clone();
            members
                .iter()
                .all(|&m| is_extendable_with_infer(arena, m, right, assignments))
        }

        // Literals extend equal literals and their base primitive.
        (Literal { value: a }, Literal { value: b }) => a == b,
        (Literal { value }, String) => matches!(value, LiteralValue::String(_)),
        (Literal { value }, Number { .. }) => matches!(value, LiteralValue::Number(_)),
        (Literal { value }, Boolean) => matches!(value, LiteralValue::Boolean(_)),
        (Literal { value }, Bigint) => matches!(value, LiteralValue::BigInt(_)),
        (Literal { value }, Regexp) => matches!(value, LiteralValue::Regex(_)),

        // Primitives are reflexive; branded numbers extend the bare number.
        (String, String)
        | (Boolean, Boolean)
        | (Bigint, Bigint)
        | (Symbol, Symbol)
        | (Null, Null)
        | (Undefined, Undefined)
        | (Void, Void)
        | (Regexp, Regexp) => true,
        (Number { brand: a }, Number { brand: b }) => b.is_none() || a == b,
        // `undefined` is assignable to `void`.
        (Undefined, Void) => true,

        // Everything non-primitive extends the `object` primitive.
        (
            ObjectLiteral { .. } | Class { .. } | Array { .. } | Tuple { .. } | Function { .. },
            Object,
        ) => true,
        (Object, Object) => true,

        // Template literals.
        (TemplateLiteral { .. }, String) => true,
        (Literal { value: LiteralValue::String(s) }, TemplateLiteral { parts }) => {
            let s = s.clone();
            let parts = parts.clone();
            template_matches(arena, &s, &parts)
        }
        (TemplateLiteral { parts: a }, TemplateLiteral { parts: b }) => {
            let (a, b) = (a.clone(), b.clone());
            a.len() == b.len()
                && a.iter()
                    .zip(&b)
                    .all(|(&x, &y)| is_extendable_with_infer(arena, x, y, assignments))
        }

        // Containers.
        (Array { element: a }, Array { element: b }) => {
            is_extendable_with_infer(arena, *a, *b, assignments)
        }
        (Tuple { members }, Array { element }) => {
            let (members, element) = (members.clone(), *element);
            members.iter().all(|&m| {
                let inner = tuple_member_type(arena, m);
                is_extendable_with_infer(arena, inner, element, assignments)
            })
        }
        (Tuple { members: a }, Tuple { members: b }) => {
            let (a, b) = (a.clone(), b.clone());
            a.len() == b.len()
                && a.iter().zip(&b).all(|(&x, &y)| {
                    let (x, y) = (tuple_member_type(arena, x), tuple_member_type(arena, y));
                    is_extendable_with_infer(arena, x, y, assignments)
                })
        }
        (Promise { ty: a }, Promise { ty: b }) => {
            is_extendable_with_infer(arena, *a, *b, assignments)
        }

        // Functions: contravariant parameters, covariant return.
        (
            Function {
                parameters: p1,
                return_type: r1,
                ..
            },
            Function {
                parameters: p2,
                return_type: r2,
                ..
            },
        ) => {
            let (p1, p2, r1, r2) = (p1.clone(), p2.clone(), *r1, *r2);
            p1.len() == p2.len()
                && p1.iter().zip(&p2).all(|(&a, &b)| {
                    let (a, b) = (parameter_type(arena, a), parameter_type(arena, b));
                    is_extendable_with_infer(arena, b, a, assignments)
                })
                && is_extendable_with_infer(arena, r1, r2, assignments)
        }

        // Structural width subtyping for object shapes.
        (
            ObjectLiteral { .. } | Class { .. },
            ObjectLiteral {
                members: required, ..
            },
        )
        | (
            ObjectLiteral { .. } | Class { .. },
            Class {
                members: required, ..
            },
        ) => {
            let required = required.clone();
            required
                .iter()
                .all(|&req| member_satisfied(arena, left, req, assignments))
        }

        // Enums extend by value inclusion of their members.
        (Enum { values: a, .. }, Enum { values: b, .. }) => {
            a.iter().all(|v| b.contains(v))
        }

        // Unbound type parameters only extend themselves by name.
        (TypeParameter { name: a }, TypeParameter { name: b }) => a == b,

        _ => false,
    }
}

/// Unwrap a tuple member to its payload type
fn tuple_member_type(arena: &TypeArena, id: NodeId) -> NodeId {
    match arena.kind(id) {
        TypeKind::TupleMember { member, .. } => *member,
        TypeKind::Rest { ty } => *ty,
        _ => id,
    }
}

/// Unwrap a parameter to its payload type
fn parameter_type(arena: &TypeArena, id: NodeId) -> NodeId {
    match arena.kind(id) {
        TypeKind::Parameter { ty, .. } => *ty,
        _ => id,
    }
}

/// Check whether aggregate `left` satisfies the single required member `req`
fn member_satisfied(
    arena: &TypeArena,
    left: NodeId,
    req: NodeId,
    assignments: &mut Vec<InferAssignment>,
) -> bool {
    let members = aggregate_members(arena, left);
    match arena.kind(req) {
        TypeKind::PropertySignature {
            name,
            ty,
            optional,
            ..
        }
        | TypeKind::Property {
            name,
            ty,
            optional,
            ..
        } => {
            let (name, req_ty, req_optional) = (name.clone(), *ty, *optional);
            match find_member(arena, &members, &name) {
                Some(found) => {
                    let found_ty = member_value_type(arena, found);
                    is_extendable_with_infer(arena, found_ty, req_ty, assignments)
                }
                // A missing property is fine only when the requirement is optional.
                None => req_optional,
            }
        }
        TypeKind::MethodSignature { name, .. } | TypeKind::Method { name, .. } => {
            let name = name.clone();
            match find_member(arena, &members, &name) {
                Some(found) => {
                    let (fp, fr) = callable_shape(arena, found);
                    let (rp, rr) = callable_shape(arena, req);
                    fp.len() == rp.len()
                        && fp.iter().zip(&rp).all(|(&a, &b)| {
                            let (a, b) = (parameter_type(arena, a), parameter_type(arena, b));
                            is_extendable_with_infer(arena, b, a, assignments)
                        })
                        && is_extendable_with_infer(arena, fr, rr, assignments)
                }
                None => false,
            }
        }
        // Index signatures on the right are satisfied when every member of
        // the left fits the value type.
        TypeKind::IndexSignature { ty, .. } => {
            let req_ty = *ty;
            members.iter().all(|&m| {
                let value = member_value_type(arena, m);
                is_extendable_with_infer(arena, value, req_ty, assignments)
            })
        }
        _ => false,
    }
}

/// Members of an object literal or class
pub(crate) fn aggregate_members(arena: &TypeArena, id: NodeId) -> Vec<NodeId> {
    match arena.kind(id) {
        TypeKind::ObjectLiteral { members } | TypeKind::Class { members, .. } => members.clone(),
        _ => Vec::new(),
    }
}

/// Find a named member in a member list
pub(crate) fn find_member(arena: &TypeArena, members: &[NodeId], name: &str) -> Option<NodeId> {
    members
        .iter()
        .copied()
        .find(|&m| arena.kind(m).member_name() == Some(name))
}

/// The value type carried by a member node
pub(crate) fn member_value_type(arena: &TypeArena, id: NodeId) -> NodeId {
    match arena.kind(id) {
        TypeKind::Property { ty, .. }
        | TypeKind::PropertySignature { ty, .. }
        | TypeKind::IndexSignature { ty, .. } => *ty,
        _ => id,
    }
}

/// Parameters and return type of a callable member
fn callable_shape(arena: &TypeArena, id: NodeId) -> (Vec<NodeId>, NodeId) {
    match arena.kind(id) {
        TypeKind::Function {
            parameters,
            return_type,
            ..
        }
        | TypeKind::Method {
            parameters,
            return_type,
            ..
        }
        | TypeKind::MethodSignature {
            parameters,
            return_type,
            ..
        } => (parameters.clone(), *return_type),
        _ => (Vec::new(), id),
    }
}

/// Match a string against template literal parts (literal runs interleaved
/// with wildcard primitives), backtracking on wildcard lengths
fn template_matches(arena: &TypeArena, s: &str, parts: &[NodeId]) -> bool {
    fn go(arena: &TypeArena, s: &str, parts: &[NodeId]) -> bool {
        let Some((&first, rest)) = parts.split_first() else {
            return s.is_empty();
        };
        match arena.kind(first) {
            TypeKind::Literal { value } => {
                let text = value.to_display_string();
                s.strip_prefix(text.as_str())
                    .is_some_and(|tail| go(arena, tail, rest))
            }
            TypeKind::String => {
                // A string hole absorbs any prefix, including the empty one.
                (0..=s.len())
                    .filter(|&i| s.is_char_boundary(i))
                    .any(|i| go(arena, &s[i..], rest))
            }
            TypeKind::Number { .. } => {
                let digits = s
                    .char_indices()
                    .take_while(|(_, c)| c.is_ascii_digit() || *c == '.' || *c == '-')
                    .map(|(i, c)| i + c.len_utf8())
                    .collect::<Vec<_>>();
                digits
                    .iter()
                    .any(|&i| s[..i].parse::<f64>().is_ok() && go(arena, &s[i..], rest))
            }
            _ => false,
        }
    }
    go(arena, s, parts)
}
