//! Handlers crossing program boundaries: class references, inlined aliases
//! and recursive generic calls
//!
//! Each of these pushes the referenced program's pre-allocated result node
//! and lets the dispatch loop run the nested program; a reference to a
//! carrier already on the active chain gets a placeholder patched later.

use std::rc::Rc;

use reify_types::{ClassRef, NodeId, TypeKind};

use crate::error::{ReflectError, ReflectResult};
use crate::packed::{Packed, PoolEntry};
use crate::processor::Processor;

impl Processor {
    pub(crate) fn op_class_reference(&mut self) -> ReflectResult<()> {
        let slot = self.eat_param()?;
        let entry = self.pool_entry(slot)?;
        let PoolEntry::ClassThunk(thunk) = entry else {
            return Err(ReflectError::UnexpectedPoolEntry {
                slot,
                found: entry.kind_name(),
                expected: "class thunk",
            });
        };
        let target = thunk().ok_or(ReflectError::UnresolvedClassThunk { slot })?;
        let inputs = self.pop_frame_types()?;

        match target.type_program() {
            // A class without a program reflects to a bare reference node.
            None => {
                let host_id = self.intern_host(&target);
                let id = self.arena_mut().alloc(TypeKind::Class {
                    class: ClassRef::Host(host_id),
                    members: Vec::new(),
                    arguments: Vec::new(),
                    extends_arguments: Vec::new(),
                });
                let node = self.arena_mut().get_mut(id);
                node.type_name = target.name().map(str::to_string);
                node.type_arguments = inputs;
                self.push_type(id);
            }
            Some(program) => {
                let name = target.name().map(str::to_string);
                let id = self.enqueue(program, Some(target), inputs.clone(), false)?;
                self.stamp_instantiation(id, name, inputs);
                self.push_type(id);
            }
        }
        Ok(())
    }

    pub(crate) fn op_inline(&mut self) -> ReflectResult<()> {
        let slot = self.eat_param()?;
        // Cache reuse is enabled when this inline terminates the program.
        let reuse = {
            let prog = self.cur();
            prog.pc >= prog.end
        };
        let entry = self.pool_entry(slot)?;
        let id = match entry {
            PoolEntry::Packed(p) => self.enqueue(p, None, Vec::new(), reuse)?,
            PoolEntry::PackedThunk(thunk) => {
                let p = thunk();
                self.enqueue(p, None, Vec::new(), reuse)?
            }
            // `0` means "use this program's result type": a self-reference.
            PoolEntry::Number(n) if n == 0.0 => self.cur().result_type,
            PoolEntry::Number(n) => {
                return Err(ReflectError::InvalidProgramPointer(n as i64));
            }
            other => {
                return Err(ReflectError::UnexpectedPoolEntry {
                    slot,
                    found: other.kind_name(),
                    expected: "packed program, thunk, or 0",
                });
            }
        };
        self.push_type(id);
        Ok(())
    }

    pub(crate) fn op_inline_call(&mut self) -> ReflectResult<()> {
        let slot = self.eat_param()?;
        let count = self.eat_param()?;
        let mut args: Vec<NodeId> = Vec::with_capacity(count);
        for _ in 0..count {
            args.push(self.pop_type()?);
        }
        args.reverse();
        // A popped `never` in position i forwards this program's own input i
        // (generic forwarding through recursive aliases).
        let own_inputs = self.cur().inputs.clone();
        for (i, arg) in args.iter_mut().enumerate() {
            if self.arena().kind(*arg).is_never() {
                if let Some(&forwarded) = own_inputs.get(i) {
                    *arg = forwarded;
                }
            }
        }

        let entry = self.pool_entry(slot)?;
        let (packed, object): (Rc<Packed>, _) = match entry {
            PoolEntry::Packed(p) => (p, None),
            PoolEntry::PackedThunk(thunk) => (thunk(), None),
            // Self-reference: re-run this very program with the new inputs.
            PoolEntry::Number(n) if n == 0.0 => {
                let prog = self.cur();
                (prog.packed.clone(), prog.object.clone())
            }
            PoolEntry::Number(n) => {
                return Err(ReflectError::InvalidProgramPointer(n as i64));
            }
            other => {
                return Err(ReflectError::UnexpectedPoolEntry {
                    slot,
                    found: other.kind_name(),
                    expected: "packed program, thunk, or 0",
                });
            }
        };

        let name = object.as_ref().and_then(|o: &Rc<dyn crate::host::ReflectTarget>| {
            o.name().map(str::to_string)
        });
        let id = self.enqueue(packed, object, args.clone(), false)?;
        self.stamp_instantiation(id, name, args);
        self.push_type(id);
        Ok(())
    }

    /// Record the alias name and type arguments of an instantiation on the
    /// node that will hold its result
    fn stamp_instantiation(&mut self, id: NodeId, name: Option<String>, args: Vec<NodeId>) {
        let node = self.arena_mut().get_mut(id);
        if node.type_name.is_none() {
            node.type_name = name;
        }
        if node.type_arguments.is_empty() {
            node.type_arguments = args;
        }
    }
}
