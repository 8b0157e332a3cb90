//! Type decorator recognition
//!
//! An intersection participant can be an *annotation* object-literal rather
//! than a structural member: `T & { __meta: ['primaryKey'] }`. A registry of
//! predicates classifies such literals; a match absorbs the literal into the
//! annotation map of the type under construction instead of merging it.

use crate::ty::{AnnotationValue, Annotations, LiteralValue, NodeId, TypeArena, TypeKind};

/// A predicate that recognizes one decorator shape. Returns `true` when it
/// consumed the object literal (recording payloads into `annotations`).
pub type TypeDecoratorPredicate =
    fn(arena: &TypeArena, annotations: &mut Annotations, object_literal: NodeId) -> bool;

/// Registry of decorator predicates tried against intersection participants
#[derive(Clone)]
pub struct TypeDecoratorRegistry {
    predicates: Vec<TypeDecoratorPredicate>,
}

impl Default for TypeDecoratorRegistry {
    fn default() -> Self {
        TypeDecoratorRegistry {
            predicates: vec![meta_decorator],
        }
    }
}

impl TypeDecoratorRegistry {
    /// An empty registry that recognizes nothing
    pub fn empty() -> Self {
        TypeDecoratorRegistry {
            predicates: Vec::new(),
        }
    }

    /// Add a predicate tried after the existing ones
    pub fn register(&mut self, predicate: TypeDecoratorPredicate) {
        self.predicates.push(predicate);
    }

    /// Try every predicate; `true` when one consumed the literal
    pub fn apply(
        &self,
        arena: &TypeArena,
        annotations: &mut Annotations,
        object_literal: NodeId,
    ) -> bool {
        self.predicates
            .iter()
            .any(|p| p(arena, annotations, object_literal))
    }
}

/// The standard decorator shape: a single `__meta` property whose type is a
/// tuple led by a string literal naming the annotation; the remaining tuple
/// members are the payload.
fn meta_decorator(
    arena: &TypeArena,
    annotations: &mut Annotations,
    object_literal: NodeId,
) -> bool {
    let TypeKind::ObjectLiteral { members } = arena.kind(object_literal) else {
        return false;
    };
    let [member] = members.as_slice() else {
        return false;
    };
    let TypeKind::PropertySignature { name, ty, .. } = arena.kind(*member) else {
        return false;
    };
    if name != "__meta" {
        return false;
    }
    let TypeKind::Tuple { members: parts } = arena.kind(*ty) else {
        return false;
    };
    let Some((&head, payload)) = parts.split_first() else {
        return false;
    };
    let head_ty = match arena.kind(head) {
        TypeKind::TupleMember { member, .. } => *member,
        _ => head,
    };
    let TypeKind::Literal {
        value: LiteralValue::String(symbol),
    } = arena.kind(head_ty)
    else {
        return false;
    };
    let entry = annotations.entry(symbol.clone()).or_default();
    for &part in payload {
        let part_ty = match arena.kind(part) {
            TypeKind::TupleMember { member, .. } => *member,
            _ => part,
        };
        entry.push(AnnotationValue::Type(part_ty));
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta_literal(arena: &mut TypeArena, symbol: &str, payload: &[NodeId]) -> NodeId {
        let head = arena.alloc(TypeKind::Literal {
            value: LiteralValue::String(symbol.into()),
        });
        let mut members = vec![head];
        members.extend_from_slice(payload);
        let members = members
            .into_iter()
            .map(|m| {
                arena.alloc(TypeKind::TupleMember {
                    member: m,
                    name: None,
                    optional: false,
                })
            })
            .collect();
        let tuple = arena.alloc_linked(TypeKind::Tuple { members });
        let prop = arena.alloc(TypeKind::PropertySignature {
            name: "__meta".into(),
            ty: tuple,
            optional: false,
            readonly: false,
            description: None,
        });
        arena.alloc_linked(TypeKind::ObjectLiteral {
            members: vec![prop],
        })
    }

    #[test]
    fn test_meta_decorator_recognized() {
        let mut arena = TypeArena::new();
        let payload = arena.alloc(TypeKind::Literal {
            value: LiteralValue::Number(255.0),
        });
        let literal = meta_literal(&mut arena, "maxLength", &[payload]);

        let registry = TypeDecoratorRegistry::default();
        let mut annotations = Annotations::default();
        assert!(registry.apply(&arena, &mut annotations, literal));
        let values = &annotations["maxLength"];
        assert_eq!(values.len(), 1);
        assert!(matches!(values[0], AnnotationValue::Type(id) if id == payload));
    }

    #[test]
    fn test_ordinary_object_literal_not_consumed() {
        let mut arena = TypeArena::new();
        let s = arena.alloc(TypeKind::String);
        let prop = arena.alloc(TypeKind::PropertySignature {
            name: "a".into(),
            ty: s,
            optional: false,
            readonly: false,
            description: None,
        });
        let obj = arena.alloc_linked(TypeKind::ObjectLiteral {
            members: vec![prop],
        });

        let registry = TypeDecoratorRegistry::default();
        let mut annotations = Annotations::default();
        assert!(!registry.apply(&arena, &mut annotations, obj));
        assert!(annotations.is_empty());
    }

    #[test]
    fn test_empty_registry() {
        let mut arena = TypeArena::new();
        let literal = meta_literal(&mut arena, "anything", &[]);
        let registry = TypeDecoratorRegistry::empty();
        let mut annotations = Annotations::default();
        assert!(!registry.apply(&arena, &mut annotations, literal));
    }
}
