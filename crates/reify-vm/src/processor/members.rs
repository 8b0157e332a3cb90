//! Handlers building literals, containers, structural members and
//! aggregates (object literals, classes, enums, unions, intersections)

use reify_types::{
    flatten_union_types, merge, unbox_union, AnnotationValue, Annotations, BuiltinClass, ClassRef,
    EnumValue, HostPayload, LiteralValue, NodeId, NumberBrand, TypeKind, Visibility,
    ANNOTATION_DEFAULT,
};

use crate::error::{ReflectError, ReflectResult};
use crate::host::Value;
use crate::opcode::Op;
use crate::packed::PoolEntry;
use crate::processor::Processor;

impl Processor {
    // =========================================================
    // Literals & built-ins
    // =========================================================

    pub(crate) fn op_literal(&mut self) -> ReflectResult<()> {
        let slot = self.eat_param()?;
        let value = match self.pool_entry(slot)? {
            PoolEntry::String(s) => LiteralValue::String(s),
            PoolEntry::Number(n) => LiteralValue::Number(n),
            PoolEntry::Boolean(b) => LiteralValue::Boolean(b),
            PoolEntry::BigInt(s) => LiteralValue::BigInt(s),
            PoolEntry::Regex(s) => LiteralValue::Regex(s),
            other => {
                return Err(ReflectError::UnexpectedPoolEntry {
                    slot,
                    found: other.kind_name(),
                    expected: "literal payload",
                })
            }
        };
        let id = self.arena_mut().alloc(TypeKind::Literal { value });
        self.push_type(id);
        Ok(())
    }

    pub(crate) fn op_number_brand(&mut self) -> ReflectResult<()> {
        let code = self.eat_param()?;
        let brand = NumberBrand::from_u8(code as u8);
        let id = self.arena_mut().alloc(TypeKind::Number { brand });
        self.push_type(id);
        Ok(())
    }

    pub(crate) fn op_builtin_class(&mut self, op: Op) {
        let builtin = match op {
            Op::Date => BuiltinClass::Date,
            Op::Int8Array => BuiltinClass::Int8Array,
            Op::Uint8Array => BuiltinClass::Uint8Array,
            Op::Uint8ClampedArray => BuiltinClass::Uint8ClampedArray,
            Op::Int16Array => BuiltinClass::Int16Array,
            Op::Uint16Array => BuiltinClass::Uint16Array,
            Op::Int32Array => BuiltinClass::Int32Array,
            Op::Uint32Array => BuiltinClass::Uint32Array,
            Op::Float32Array => BuiltinClass::Float32Array,
            Op::Float64Array => BuiltinClass::Float64Array,
            Op::BigInt64Array => BuiltinClass::BigInt64Array,
            Op::BigUint64Array => BuiltinClass::BigUint64Array,
            _ => BuiltinClass::ArrayBuffer,
        };
        let id = self.builtin_class(builtin, Vec::new());
        self.push_type(id);
    }

    /// Build an instantiated built-in class node
    pub(crate) fn builtin_class(
        &mut self,
        builtin: BuiltinClass,
        type_arguments: Vec<NodeId>,
    ) -> NodeId {
        let id = self.arena_mut().alloc(TypeKind::Class {
            class: ClassRef::Builtin(builtin),
            members: Vec::new(),
            arguments: Vec::new(),
            extends_arguments: Vec::new(),
        });
        let node = self.arena_mut().get_mut(id);
        node.type_name = Some(builtin.name().to_string());
        node.type_arguments = type_arguments;
        id
    }

    // =========================================================
    // Containers
    // =========================================================

    pub(crate) fn op_array(&mut self) -> ReflectResult<()> {
        let element = self.pop_type()?;
        let id = self
            .arena_mut()
            .alloc_linked(TypeKind::Array { element });
        self.push_type(id);
        Ok(())
    }

    pub(crate) fn op_tuple(&mut self) -> ReflectResult<()> {
        let values = self.pop_frame_types()?;
        let mut members = Vec::with_capacity(values.len());
        for value in values {
            match self.arena().kind(value).clone() {
                TypeKind::TupleMember { .. } => members.push(value),
                // A rest of a concrete tuple splices its members in place.
                TypeKind::Rest { ty } => match self.arena().kind(ty).clone() {
                    TypeKind::Tuple {
                        members: spliced, ..
                    } => members.extend(spliced),
                    _ => members.push(value),
                },
                _ => {
                    let wrapped = self.arena_mut().alloc_linked(TypeKind::TupleMember {
                        member: value,
                        name: None,
                        optional: false,
                    });
                    members.push(wrapped);
                }
            }
        }
        let id = self.arena_mut().alloc_linked(TypeKind::Tuple { members });
        self.push_type(id);
        Ok(())
    }

    pub(crate) fn op_tuple_member(&mut self, name: Option<String>) -> ReflectResult<()> {
        let member = self.pop_type()?;
        let id = self.arena_mut().alloc_linked(TypeKind::TupleMember {
            member,
            name,
            optional: false,
        });
        self.push_type(id);
        Ok(())
    }

    pub(crate) fn op_rest(&mut self) -> ReflectResult<()> {
        let ty = self.pop_type()?;
        let id = self.arena_mut().alloc_linked(TypeKind::Rest { ty });
        self.push_type(id);
        Ok(())
    }

    pub(crate) fn op_set(&mut self) -> ReflectResult<()> {
        let element = self.pop_type()?;
        let id = self.builtin_class(BuiltinClass::Set, vec![element]);
        self.push_type(id);
        Ok(())
    }

    pub(crate) fn op_map(&mut self) -> ReflectResult<()> {
        let value = self.pop_type()?;
        let key = self.pop_type()?;
        let id = self.builtin_class(BuiltinClass::Map, vec![key, value]);
        self.push_type(id);
        Ok(())
    }

    pub(crate) fn op_promise(&mut self) -> ReflectResult<()> {
        let ty = self.pop_type()?;
        let id = self.arena_mut().alloc_linked(TypeKind::Promise { ty });
        self.push_type(id);
        Ok(())
    }

    // =========================================================
    // Members
    // =========================================================

    pub(crate) fn op_property(&mut self, signature: bool) -> ReflectResult<()> {
        let slot = self.eat_param()?;
        let name = self.pool_str(slot)?;
        let popped = self.pop_type()?;
        let (ty, optional) = self.unwrap_optional(popped);
        let kind = if signature {
            TypeKind::PropertySignature {
                name,
                ty,
                optional,
                readonly: false,
                description: None,
            }
        } else {
            TypeKind::Property {
                name,
                ty,
                optional,
                readonly: false,
                visibility: Visibility::Public,
                is_abstract: false,
                default: None,
                description: None,
            }
        };
        let id = self.arena_mut().alloc_linked(kind);
        self.push_type(id);
        Ok(())
    }

    /// Unwrap `T | undefined` into `(T, optional)`
    fn unwrap_optional(&mut self, ty: NodeId) -> (NodeId, bool) {
        let TypeKind::Union { types } = self.arena().kind(ty) else {
            return (ty, false);
        };
        let types = types.clone();
        let remaining: Vec<NodeId> = types
            .iter()
            .copied()
            .filter(|&t| !matches!(self.arena().kind(t), TypeKind::Undefined))
            .collect();
        if remaining.len() == types.len() {
            return (ty, false);
        }
        let unwrapped = unbox_union(self.arena_mut(), remaining);
        (unwrapped, true)
    }

    pub(crate) fn op_method(&mut self, signature: bool) -> ReflectResult<()> {
        let slot = self.eat_param()?;
        let name = self.pool_str(slot)?;
        let mut values = self.pop_frame_types()?;
        let pc = self.cur().pc;
        let return_type = values.pop().ok_or(ReflectError::StackUnderflow { pc })?;
        let kind = if signature {
            TypeKind::MethodSignature {
                name,
                parameters: values,
                return_type,
                optional: false,
            }
        } else {
            TypeKind::Method {
                name,
                parameters: values,
                return_type,
                visibility: Visibility::Public,
                is_abstract: false,
            }
        };
        let id = self.arena_mut().alloc_linked(kind);
        self.push_type(id);
        Ok(())
    }

    pub(crate) fn op_parameter(&mut self) -> ReflectResult<()> {
        let slot = self.eat_param()?;
        let name = self.pool_str(slot)?;
        let popped = self.pop_type()?;
        let (ty, optional) = self.unwrap_optional(popped);
        let id = self.arena_mut().alloc_linked(TypeKind::Parameter {
            name,
            ty,
            optional,
            readonly: false,
            visibility: None,
            default: None,
        });
        self.push_type(id);
        Ok(())
    }

    pub(crate) fn op_function(&mut self) -> ReflectResult<()> {
        let slot = self.eat_param()?;
        let name = self.pool_str(slot)?;
        let name = if name.is_empty() { None } else { Some(name) };
        let mut values = self.pop_frame_types()?;
        let pc = self.cur().pc;
        let return_type = values.pop().ok_or(ReflectError::StackUnderflow { pc })?;
        let id = self.arena_mut().alloc_linked(TypeKind::Function {
            name,
            parameters: values,
            return_type,
        });
        self.push_type(id);
        Ok(())
    }

    pub(crate) fn op_modifier(&mut self, op: Op) -> ReflectResult<()> {
        let pc = self.cur().pc;
        let top = match self.cur().stack.last() {
            Some(crate::processor::StackEntry::Type(id)) => *id,
            _ => return Err(ReflectError::StackUnderflow { pc }),
        };
        let kind = &mut self.arena_mut().get_mut(top).kind;
        match op {
            Op::Optional => match kind {
                TypeKind::Property { optional, .. }
                | TypeKind::PropertySignature { optional, .. }
                | TypeKind::Parameter { optional, .. }
                | TypeKind::TupleMember { optional, .. }
                | TypeKind::MethodSignature { optional, .. } => *optional = true,
                _ => {}
            },
            Op::Readonly => match kind {
                TypeKind::Property { readonly, .. }
                | TypeKind::PropertySignature { readonly, .. }
                | TypeKind::Parameter { readonly, .. } => *readonly = true,
                _ => {}
            },
            Op::Public | Op::Protected | Op::Private => {
                let v = match op {
                    Op::Public => Visibility::Public,
                    Op::Protected => Visibility::Protected,
                    _ => Visibility::Private,
                };
                match kind {
                    TypeKind::Property { visibility, .. }
                    | TypeKind::Method { visibility, .. } => *visibility = v,
                    TypeKind::Parameter { visibility, .. } => *visibility = Some(v),
                    _ => {}
                }
            }
            Op::Abstract => match kind {
                TypeKind::Property { is_abstract, .. }
                | TypeKind::Method { is_abstract, .. } => *is_abstract = true,
                _ => {}
            },
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn op_default_value(&mut self) -> ReflectResult<()> {
        let slot = self.eat_param()?;
        let entry = self.pool_entry(slot)?;
        let PoolEntry::ValueThunk(thunk) = entry else {
            return Err(ReflectError::UnexpectedPoolEntry {
                slot,
                found: entry.kind_name(),
                expected: "value thunk",
            });
        };
        let value = thunk();
        let pc = self.cur().pc;
        let top = match self.cur().stack.last() {
            Some(crate::processor::StackEntry::Type(id)) => *id,
            _ => return Err(ReflectError::StackUnderflow { pc }),
        };
        match &mut self.arena_mut().get_mut(top).kind {
            TypeKind::EnumMember { default, .. } => *default = Some(enum_value_of(&value)),
            TypeKind::Property { default, .. } | TypeKind::Parameter { default, .. } => {
                *default = Some(HostPayload::new(value))
            }
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn op_description(&mut self) -> ReflectResult<()> {
        let slot = self.eat_param()?;
        let text = self.pool_str(slot)?;
        let pc = self.cur().pc;
        let top = match self.cur().stack.last() {
            Some(crate::processor::StackEntry::Type(id)) => *id,
            _ => return Err(ReflectError::StackUnderflow { pc }),
        };
        match &mut self.arena_mut().get_mut(top).kind {
            TypeKind::Property { description, .. }
            | TypeKind::PropertySignature { description, .. } => *description = Some(text),
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn op_index_signature(&mut self) -> ReflectResult<()> {
        let ty = self.pop_type()?;
        let index = self.pop_type()?;
        let id = self
            .arena_mut()
            .alloc_linked(TypeKind::IndexSignature { index, ty });
        self.push_type(id);
        Ok(())
    }

    // =========================================================
    // Aggregates
    // =========================================================

    pub(crate) fn op_object_literal(&mut self) -> ReflectResult<()> {
        let values = self.pop_frame_types()?;
        let mut annotations = Annotations::default();
        let mut decorators: Vec<NodeId> = Vec::new();
        let mut members: Vec<NodeId> = Vec::new();

        let mut add_member = |arena: &reify_types::TypeArena, members: &mut Vec<NodeId>, m: NodeId| {
            if let Some(name) = arena.kind(m).member_name() {
                let name = name.to_string();
                if let Some(existing) = members
                    .iter()
                    .position(|&p| arena.kind(p).member_name() == Some(name.as_str()))
                {
                    // Duplicates by name are replaced.
                    members[existing] = m;
                    return;
                }
            }
            members.push(m);
        };

        for value in values {
            match self.arena().kind(value).clone() {
                // Nested object literals arose from `extends` clauses and
                // spread their members at the beginning, unless they are
                // decorator literals.
                TypeKind::ObjectLiteral { members: spread } => {
                    let registry = self.type_decorators_clone();
                    if registry.apply(self.arena(), &mut annotations, value) {
                        decorators.push(value);
                    } else {
                        for m in spread {
                            add_member(self.arena(), &mut members, m);
                        }
                    }
                }
                kind if kind.is_member() => add_member(self.arena(), &mut members, value),
                _ => {}
            }
        }

        let id = self
            .arena_mut()
            .alloc_linked(TypeKind::ObjectLiteral { members });
        let node = self.arena_mut().get_mut(id);
        node.annotations = annotations;
        node.decorators = decorators;
        self.push_type(id);
        Ok(())
    }

    pub(crate) fn op_class(&mut self) -> ReflectResult<()> {
        let values = self.pop_frame_types()?;
        let mut members: Vec<NodeId> = values
            .into_iter()
            .filter(|&v| self.arena().kind(v).is_member())
            .collect();

        // Constructor parameters carrying a visibility modifier promote to
        // properties; the constructor's parameters also become the class's
        // construction signature.
        let mut arguments: Vec<NodeId> = Vec::new();
        let constructor = members.iter().copied().find(|&m| {
            matches!(
                self.arena().kind(m),
                TypeKind::Method { name, .. } if name == "constructor"
            )
        });
        if let Some(ctor) = constructor {
            let TypeKind::Method { parameters, .. } = self.arena().kind(ctor).clone() else {
                unreachable!("constructor matched as method");
            };
            for param in &parameters {
                arguments.push(self.arena_mut().deep_clone(*param));
            }
            for param in parameters {
                let TypeKind::Parameter {
                    name,
                    ty,
                    optional,
                    readonly,
                    visibility,
                    default,
                } = self.arena().kind(param).clone()
                else {
                    continue;
                };
                let Some(visibility) = visibility else {
                    continue;
                };
                let promoted_ty = self.arena_mut().deep_clone(ty);
                let promoted = self.arena_mut().alloc_linked(TypeKind::Property {
                    name,
                    ty: promoted_ty,
                    optional,
                    readonly,
                    visibility,
                    is_abstract: false,
                    default,
                    description: None,
                });
                members.push(promoted);
            }
        }

        // Generic arguments come from the instantiation inputs, falling back
        // to whatever the typeParameter ops produced.
        let inputs = self.cur().frame().inputs.clone();
        let type_arguments = if inputs.is_empty() {
            self.cur().type_parameters.clone()
        } else {
            inputs
        };

        let id = self.arena_mut().alloc_linked(TypeKind::Class {
            class: ClassRef::Placeholder,
            members,
            arguments,
            extends_arguments: Vec::new(),
        });
        self.arena_mut().get_mut(id).type_arguments = type_arguments;
        self.push_type(id);
        Ok(())
    }

    pub(crate) fn op_class_extends(&mut self) -> ReflectResult<()> {
        let count = self.eat_param()?;
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            args.push(self.pop_type()?);
        }
        args.reverse();
        let pc = self.cur().pc;
        let top = match self.cur().stack.last() {
            Some(crate::processor::StackEntry::Type(id)) => *id,
            _ => return Err(ReflectError::StackUnderflow { pc }),
        };
        if let TypeKind::Class {
            extends_arguments, ..
        } = &mut self.arena_mut().get_mut(top).kind
        {
            *extends_arguments = args;
        }
        self.arena_mut().link_children(top);
        Ok(())
    }

    pub(crate) fn op_enum_member(&mut self) -> ReflectResult<()> {
        let slot = self.eat_param()?;
        let name = self.pool_str(slot)?;
        let id = self.arena_mut().alloc(TypeKind::EnumMember {
            name,
            default: None,
        });
        self.push_type(id);
        Ok(())
    }

    pub(crate) fn op_enum(&mut self) -> ReflectResult<()> {
        let values = self.pop_frame_types()?;
        let mut members: Vec<(String, EnumValue)> = Vec::with_capacity(values.len());
        // Numeric members continue from the previous value.
        let mut counter = 0.0f64;
        for value in values {
            let TypeKind::EnumMember { name, default } = self.arena().kind(value).clone() else {
                continue;
            };
            let resolved = match default {
                Some(EnumValue::Number(n)) => {
                    counter = n + 1.0;
                    EnumValue::Number(n)
                }
                Some(EnumValue::String(s)) => EnumValue::String(s),
                Some(EnumValue::Undefined) | None => {
                    let v = counter;
                    counter += 1.0;
                    EnumValue::Number(v)
                }
            };
            members.push((name, resolved));
        }
        let enum_values: Vec<EnumValue> = members.iter().map(|(_, v)| v.clone()).collect();
        let id = self.arena_mut().alloc(TypeKind::Enum {
            members,
            values: enum_values,
        });
        self.push_type(id);
        Ok(())
    }

    pub(crate) fn op_union(&mut self) -> ReflectResult<()> {
        let values = self.pop_frame_types()?;
        let flat = flatten_union_types(self.arena(), &values);
        let id = unbox_union(self.arena_mut(), flat);
        self.push_type(id);
        Ok(())
    }

    pub(crate) fn op_intersection(&mut self) -> ReflectResult<()> {
        let values = self.pop_frame_types()?;
        let id = self.collapse_intersection(values)?;
        self.push_type(id);
        Ok(())
    }

    /// Collapse intersection candidates per the decorator/primitive/merge
    /// classification
    fn collapse_intersection(&mut self, candidates: Vec<NodeId>) -> ReflectResult<NodeId> {
        // Flatten nested intersections first.
        let mut flat: Vec<NodeId> = Vec::with_capacity(candidates.len());
        let mut queue = candidates;
        while let Some(c) = queue.pop() {
            match self.arena().kind(c) {
                TypeKind::Intersection { types } => queue.extend(types.clone()),
                _ => flat.push(c),
            }
        }
        flat.reverse();

        // `T & never` is `never`.
        if flat.iter().any(|&c| self.arena().kind(c).is_never()) {
            return Ok(self.arena_mut().alloc(TypeKind::Never));
        }

        // Pull decorator object-literals out of the structural participants.
        let mut annotations = Annotations::default();
        let mut decorators: Vec<NodeId> = Vec::new();
        let registry = self.type_decorators_clone();
        let mut structural: Vec<NodeId> = Vec::new();
        for c in flat {
            if matches!(self.arena().kind(c), TypeKind::ObjectLiteral { .. })
                && registry.apply(self.arena(), &mut annotations, c)
            {
                decorators.push(c);
            } else {
                structural.push(c);
            }
        }

        // One primitive-ish candidate dominates; remaining aggregates attach
        // as its `default` annotation.
        let dominant = structural.iter().copied().find(|&c| {
            matches!(
                self.arena().kind(c),
                TypeKind::String
                    | TypeKind::Number { .. }
                    | TypeKind::Boolean
                    | TypeKind::Bigint
                    | TypeKind::Symbol
                    | TypeKind::Regexp
                    | TypeKind::Literal { .. }
                    | TypeKind::Array { .. }
                    | TypeKind::Tuple { .. }
                    | TypeKind::Any
            )
        });
        let result = if let Some(primitive) = dominant {
            let aggregates: Vec<NodeId> = structural
                .iter()
                .copied()
                .filter(|&c| {
                    matches!(
                        self.arena().kind(c),
                        TypeKind::ObjectLiteral { .. } | TypeKind::Class { .. }
                    )
                })
                .collect();
            if !aggregates.is_empty() {
                let entry = annotations
                    .entry(ANNOTATION_DEFAULT.to_string())
                    .or_default();
                entry.extend(aggregates.into_iter().map(AnnotationValue::Type));
            }
            primitive
        } else {
            let aggregates: Vec<NodeId> = structural
                .iter()
                .copied()
                .filter(|&c| {
                    matches!(
                        self.arena().kind(c),
                        TypeKind::ObjectLiteral { .. } | TypeKind::Class { .. }
                    )
                })
                .collect();
            if aggregates.is_empty() {
                // Nothing structural remains: annotations alone cannot make
                // a type.
                self.arena_mut().alloc(TypeKind::Never)
            } else {
                merge(self.arena_mut(), &aggregates)
            }
        };

        let node = self.arena_mut().get_mut(result);
        for (key, values) in annotations {
            node.annotations.entry(key).or_default().extend(values);
        }
        node.decorators.extend(decorators);
        Ok(result)
    }
}

/// Convert a host value into an enum member value
fn enum_value_of(value: &Value) -> EnumValue {
    match value {
        Value::Number(n) => EnumValue::Number(*n),
        Value::String(s) => EnumValue::String(s.clone()),
        _ => EnumValue::Undefined,
    }
}
