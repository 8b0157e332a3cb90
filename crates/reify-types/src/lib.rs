//! reify type system
//!
//! The type node model and pure structural operations consumed by the reify
//! reflection VM: an arena of tagged type nodes, union normalization,
//! literal widening, the `extends` assignability relation, intersection
//! merging, indexed access and `keyof`, and decorator recognition.

#![warn(missing_docs)]

pub mod access;
pub mod decorators;
pub mod extendable;
pub mod merge;
pub mod normalize;
pub mod ty;

pub use access::{get_annotations, get_member, index_access, keyof_members};
pub use decorators::{TypeDecoratorPredicate, TypeDecoratorRegistry};
pub use extendable::{is_extendable, is_extendable_with_infer, InferAssignment};
pub use merge::merge;
pub use normalize::{
    flatten_union_types, is_type_included, narrow_original_literal, unbox_union, widen_literal,
};
pub use ty::{
    format_number, same_type, AnnotationValue, Annotations, BuiltinClass, ClassRef, EnumValue,
    HostId, HostPayload, IndexAccessOrigin, LiteralValue, NodeId, NumberBrand, TypeArena,
    TypeDisplay, TypeKind, TypeNode, Visibility, ANNOTATION_DEFAULT, ANNOTATION_VALIDATION,
};
