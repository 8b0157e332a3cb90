//! The value inferer: synthesize a type graph for an arbitrary runtime value
//!
//! Scalars become literal types; containers infer their contents with
//! widening; values carrying a type program reflect it. Plain objects do
//! *not* inspect their fields inline — they emit a fresh program
//! (`typeof k; widen; propertySignature k; ...; objectLiteral`) and queue it
//! on the processor, because a recursive reflection inside a field may be
//! deferred behind a placeholder, and only work scheduled inside the VM is
//! patched when the producing program completes.

use std::rc::Rc;

use reify_types::{flatten_union_types, unbox_union, widen_literal, BuiltinClass, ClassRef,
    LiteralValue, NodeId, TypeKind};

use crate::error::ReflectResult;
use crate::host::Value;
use crate::opcode::Op;
use crate::packed::{Packed, PoolEntry};
use crate::processor::Processor;

impl Processor {
    /// Infer the type of `value`, possibly queueing programs on the chain
    pub(crate) fn infer_value(&mut self, value: &Value) -> ReflectResult<NodeId> {
        let id = match value {
            Value::Undefined => self.arena_mut().alloc(TypeKind::Undefined),
            Value::Null => self.arena_mut().alloc(TypeKind::Null),
            Value::Boolean(b) => self.arena_mut().alloc(TypeKind::Literal {
                value: LiteralValue::Boolean(*b),
            }),
            Value::Number(n) => self.arena_mut().alloc(TypeKind::Literal {
                value: LiteralValue::Number(*n),
            }),
            Value::BigInt(s) => self.arena_mut().alloc(TypeKind::Literal {
                value: LiteralValue::BigInt(s.clone()),
            }),
            Value::String(s) => self.arena_mut().alloc(TypeKind::Literal {
                value: LiteralValue::String(s.clone()),
            }),
            Value::Regex(s) => self.arena_mut().alloc(TypeKind::Literal {
                value: LiteralValue::Regex(s.clone()),
            }),
            Value::Date(_) => self.builtin_class(BuiltinClass::Date, Vec::new()),
            Value::Array(items) => {
                let element = self.infer_container(items)?;
                self.arena_mut().alloc_linked(TypeKind::Array { element })
            }
            Value::Set(items) => {
                let element = self.infer_container(items)?;
                self.builtin_class(BuiltinClass::Set, vec![element])
            }
            Value::Map(pairs) => {
                let keys: Vec<Value> = pairs.iter().map(|(k, _)| k.clone()).collect();
                let values: Vec<Value> = pairs.iter().map(|(_, v)| v.clone()).collect();
                let key = self.infer_container(&keys)?;
                let value = self.infer_container(&values)?;
                self.builtin_class(BuiltinClass::Map, vec![key, value])
            }
            Value::Function(target) => match target.type_program() {
                // A typed function (or class) reflects its own program.
                Some(program) => {
                    self.enqueue(program, Some(target.clone()), Vec::new(), true)?
                }
                None => {
                    let any = self.arena_mut().alloc(TypeKind::Any);
                    let id = self.arena_mut().alloc_linked(TypeKind::Function {
                        name: target.name().map(str::to_string),
                        parameters: Vec::new(),
                        return_type: any,
                    });
                    id
                }
            },
            Value::Instance { class, .. } => match class.type_program() {
                Some(program) => {
                    self.enqueue(program, Some(class.clone()), Vec::new(), true)?
                }
                None => {
                    let host_id = self.intern_host(class);
                    let id = self.arena_mut().alloc(TypeKind::Class {
                        class: ClassRef::Host(host_id),
                        members: Vec::new(),
                        arguments: Vec::new(),
                        extends_arguments: Vec::new(),
                    });
                    self.arena_mut().get_mut(id).type_name =
                        class.name().map(str::to_string);
                    id
                }
            },
            Value::Object(fields) => {
                let packed = emit_object_program(fields)?;
                self.enqueue(packed, None, Vec::new(), false)?
            }
        };
        Ok(id)
    }

    /// Union of the widened element types of a container
    fn infer_container(&mut self, items: &[Value]) -> ReflectResult<NodeId> {
        let mut types = Vec::with_capacity(items.len());
        for item in items {
            let inferred = self.infer_value(item)?;
            types.push(widen_literal(self.arena_mut(), inferred));
        }
        if types.is_empty() {
            return Ok(self.arena_mut().alloc(TypeKind::Unknown));
        }
        let flat = flatten_union_types(self.arena(), &types);
        Ok(unbox_union(self.arena_mut(), flat))
    }
}

/// Emit a program reconstructing a plain object's shape field by field
fn emit_object_program(fields: &[(String, Value)]) -> ReflectResult<Rc<Packed>> {
    let mut pool: Vec<PoolEntry> = Vec::with_capacity(fields.len() * 2);
    let mut ops: Vec<u8> = Vec::with_capacity(fields.len() * 5 + 1);
    for (name, value) in fields {
        let value = value.clone();
        let value_slot = pool.len();
        pool.push(PoolEntry::ValueThunk(Rc::new(move || value.clone())));
        let name_slot = pool.len();
        pool.push(PoolEntry::String(name.clone()));
        ops.extend_from_slice(&[
            Op::Typeof as u8,
            value_slot as u8,
            Op::Widen as u8,
            Op::PropertySignature as u8,
            name_slot as u8,
        ]);
    }
    ops.push(Op::ObjectLiteral as u8);
    Packed::new(pool, &ops)
}
