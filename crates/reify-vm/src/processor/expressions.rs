//! Handlers for type expressions: conditionals, distribution, mapped types,
//! template literals, indexed access, `keyof`, inference slots and variables
//!
//! The distributive and mapped-type loops are driven by return-address
//! arithmetic: the loop body is invoked with a negative jump-back so its
//! `return` lands on the looping opcode again, which re-reads its parameters
//! and advances the iterator installed on the frame.

use reify_types::{
    flatten_union_types, index_access, is_extendable_with_infer, keyof_members, unbox_union,
    widen_literal, IndexAccessOrigin, LiteralValue, NodeId, TypeKind,
};

use crate::error::{ReflectError, ReflectResult};
use crate::opcode::mapped_modifier;
use crate::packed::PoolEntry;
use crate::processor::{Processor, StackEntry, TypeLoop};

impl Processor {
    // =========================================================
    // Variables, arguments & inference slots
    // =========================================================

    pub(crate) fn op_var(&mut self) {
        let id = self.arena_mut().alloc(TypeKind::Never);
        self.cur().stack.push(StackEntry::Type(id));
        self.cur().frame_mut().variables += 1;
    }

    pub(crate) fn op_loads(&mut self) -> ReflectResult<()> {
        let frame_offset = self.eat_param()?;
        let slot = self.eat_param()?;
        let pc = self.cur().pc;
        let prog = self.cur();
        let depth = prog
            .frames
            .len()
            .checked_sub(1 + frame_offset)
            .ok_or(ReflectError::StackUnderflow { pc })?;
        let position = prog.frames[depth].start + slot;
        match prog.stack.get(position) {
            Some(StackEntry::Type(id)) => {
                let id = *id;
                self.push_type(id);
                Ok(())
            }
            _ => Err(ReflectError::StackUnderflow { pc }),
        }
    }

    pub(crate) fn op_arg(&mut self) -> ReflectResult<()> {
        let n = self.eat_param()?;
        let pc = self.cur().pc;
        let prog = self.cur();
        let position = prog
            .frame()
            .start
            .checked_sub(1 + n)
            .ok_or(ReflectError::StackUnderflow { pc })?;
        match prog.stack.get(position) {
            Some(StackEntry::Type(id)) => {
                let id = *id;
                self.push_type(id);
                Ok(())
            }
            _ => Err(ReflectError::UnexpectedStackEntry { pc }),
        }
    }

    pub(crate) fn op_infer(&mut self) -> ReflectResult<()> {
        let frame_offset = self.eat_param()? as u8;
        let slot = self.eat_param()? as u16;
        let id = self.arena_mut().alloc(TypeKind::Infer { frame_offset, slot });
        self.push_type(id);
        Ok(())
    }

    pub(crate) fn op_type_parameter(&mut self, with_default: bool) -> ReflectResult<()> {
        let slot = self.eat_param()?;
        let name = self.pool_str(slot)?;
        let default = if with_default {
            Some(self.pop_type()?)
        } else {
            None
        };
        let index = self.cur().frame().variables;
        let input = self.cur().frame().inputs.get(index).copied();
        let chosen = match input.or(default) {
            Some(ty) => {
                self.cur().type_parameters.push(ty);
                ty
            }
            // Unbound: leave a sentinel in place, but record `any` as the
            // effective generic argument.
            None => {
                let sentinel = self.arena_mut().alloc(TypeKind::TypeParameter { name });
                let any = self.arena_mut().alloc(TypeKind::Any);
                self.cur().type_parameters.push(any);
                sentinel
            }
        };
        self.cur().stack.push(StackEntry::Type(chosen));
        self.cur().frame_mut().variables += 1;
        Ok(())
    }

    // =========================================================
    // Conditionals
    // =========================================================

    pub(crate) fn op_extends(&mut self) -> ReflectResult<()> {
        let right = self.pop_type()?;
        let left = self.pop_type()?;
        let mut assignments = Vec::new();
        let extendable = is_extendable_with_infer(self.arena(), left, right, &mut assignments);
        // Write inferred captures into their frame variable slots.
        let pc = self.cur().pc;
        for assignment in assignments {
            let prog = self.cur();
            let depth = prog
                .frames
                .len()
                .checked_sub(1 + assignment.frame_offset as usize)
                .ok_or(ReflectError::StackUnderflow { pc })?;
            let position = prog.frames[depth].start + assignment.slot as usize;
            if position >= prog.stack.len() {
                return Err(ReflectError::StackUnderflow { pc });
            }
            prog.stack[position] = StackEntry::Type(assignment.ty);
        }
        let id = self.arena_mut().alloc(TypeKind::Literal {
            value: LiteralValue::Boolean(extendable),
        });
        self.push_type(id);
        Ok(())
    }

    fn is_truthy(&self, id: NodeId) -> bool {
        match self.arena().kind(id) {
            TypeKind::Literal { value } => value.is_truthy(),
            _ => false,
        }
    }

    pub(crate) fn op_condition(&mut self) -> ReflectResult<()> {
        let right = self.pop_type()?;
        let left = self.pop_type()?;
        let condition = self.pop_type()?;
        self.drop_frame();
        let taken = if self.is_truthy(condition) { left } else { right };
        self.push_type(taken);
        Ok(())
    }

    pub(crate) fn op_jump_condition(&mut self) -> ReflectResult<()> {
        let then_address = self.eat_param()?;
        let else_address = self.eat_param()?;
        let condition = self.pop_type()?;
        let target = if self.is_truthy(condition) {
            then_address
        } else {
            else_address
        };
        self.call(target, 1);
        Ok(())
    }

    // =========================================================
    // Distributive conditionals
    // =========================================================

    pub(crate) fn op_distribute(&mut self) -> ReflectResult<()> {
        let body = self.eat_param()?;
        if self.cur().frame().distributive_loop.is_none() {
            // First entry: install the loop over the distributed type.
            let ty = self.pop_type()?;
            let looped = TypeLoop::new(self.arena(), ty);
            self.cur().frame_mut().distributive_loop = Some(looped);
        }
        // On re-entry the body's result is already on the stack inside the
        // frame; it is collected when the frame pops.
        let next = self
            .cur()
            .frame_mut()
            .distributive_loop
            .as_mut()
            .expect("installed above")
            .next();
        match next {
            Some(member) => {
                let pc = self.cur().pc;
                let prog = self.cur();
                let slot = prog.frame().start;
                if slot >= prog.stack.len() {
                    return Err(ReflectError::StackUnderflow { pc });
                }
                prog.stack[slot] = StackEntry::Type(member);
                // Replay this opcode when the body returns.
                self.call(body, -1);
            }
            None => {
                let results = self.pop_frame_types()?;
                let flat = flatten_union_types(self.arena(), &results);
                let id = unbox_union(self.arena_mut(), flat);
                self.push_type(id);
            }
        }
        Ok(())
    }

    // =========================================================
    // Mapped types
    // =========================================================

    pub(crate) fn op_mapped_type(&mut self) -> ReflectResult<()> {
        let body = self.eat_param()?;
        let modifier = self.eat_param()? as u8;
        if self.cur().frame().mapped_type.is_none() {
            let key_source = self.pop_type()?;
            let looped = TypeLoop::new(self.arena(), key_source);
            self.cur().frame_mut().mapped_type = Some(looped);
        } else {
            // Back from the value expression: turn (key, value) into a member.
            let value = self.pop_type()?;
            let pc = self.cur().pc;
            let key = {
                let prog = self.cur();
                let slot = prog.frame().start;
                match prog.stack.get(slot) {
                    Some(StackEntry::Type(id)) => *id,
                    _ => return Err(ReflectError::StackUnderflow { pc }),
                }
            };
            if let Some(member) = self.mapped_member(key, value, modifier) {
                self.push_type(member);
            }
        }
        let next = self
            .cur()
            .frame_mut()
            .mapped_type
            .as_mut()
            .expect("installed above")
            .next();
        match next {
            Some(key) => {
                let pc = self.cur().pc;
                let prog = self.cur();
                let slot = prog.frame().start;
                if slot >= prog.stack.len() {
                    return Err(ReflectError::StackUnderflow { pc });
                }
                prog.stack[slot] = StackEntry::Type(key);
                self.call(body, -2);
            }
            None => {
                let members = self.pop_frame_types()?;
                let id = self
                    .arena_mut()
                    .alloc_linked(TypeKind::ObjectLiteral { members });
                self.push_type(id);
            }
        }
        Ok(())
    }

    /// Build the member one mapped-type iteration produced, or drop it
    fn mapped_member(&mut self, key: NodeId, value: NodeId, modifier: u8) -> Option<NodeId> {
        // A primitive key domain emits an index signature.
        if matches!(
            self.arena().kind(key),
            TypeKind::String | TypeKind::Number { .. } | TypeKind::Symbol
        ) {
            let index = self.arena_mut().deep_clone(key);
            return Some(
                self.arena_mut()
                    .alloc_linked(TypeKind::IndexSignature { index, ty: value }),
            );
        }
        // `never` values drop their key.
        if self.arena().kind(value).is_never() {
            return None;
        }
        let member = if matches!(self.arena().kind(value), TypeKind::PropertySignature { .. }) {
            value
        } else {
            let name = match self.arena().kind(key) {
                TypeKind::Literal { value } => value.to_display_string(),
                other => other.name().to_string(),
            };
            self.arena_mut().alloc_linked(TypeKind::PropertySignature {
                name,
                ty: value,
                optional: false,
                readonly: false,
                description: None,
            })
        };
        if let TypeKind::PropertySignature {
            optional, readonly, ..
        } = &mut self.arena_mut().get_mut(member).kind
        {
            if modifier & mapped_modifier::OPTIONAL != 0 {
                *optional = true;
            }
            if modifier & mapped_modifier::REMOVE_OPTIONAL != 0 {
                *optional = false;
            }
            if modifier & mapped_modifier::READONLY != 0 {
                *readonly = true;
            }
            if modifier & mapped_modifier::REMOVE_READONLY != 0 {
                *readonly = false;
            }
        }
        Some(member)
    }

    // =========================================================
    // Template literals
    // =========================================================

    pub(crate) fn op_template_literal(&mut self) -> ReflectResult<()> {
        let parts = self.pop_frame_types()?;
        // Expand unions so the product of all alternatives is produced.
        let expansions: Vec<Vec<NodeId>> = parts
            .iter()
            .map(|&p| match self.arena().kind(p) {
                TypeKind::Union { types } => types.clone(),
                _ => vec![p],
            })
            .collect();

        let mut results: Vec<NodeId> = Vec::new();
        if expansions.iter().all(|e| !e.is_empty()) {
            let mut combination = vec![0usize; expansions.len()];
            'product: loop {
                let chosen: Vec<NodeId> = combination
                    .iter()
                    .enumerate()
                    .map(|(i, &j)| expansions[i][j])
                    .collect();
                let built = self.build_template(&chosen);
                results.push(built);

                // Advance the mixed-radix counter; done when it wraps.
                let mut i = combination.len();
                while i > 0 {
                    i -= 1;
                    combination[i] += 1;
                    if combination[i] < expansions[i].len() {
                        continue 'product;
                    }
                    combination[i] = 0;
                }
                break;
            }
        }

        let flat = flatten_union_types(self.arena(), &results);
        let id = unbox_union(self.arena_mut(), flat);
        self.push_type(id);
        Ok(())
    }

    /// Build one template alternative: adjacent literals merge by string
    /// concatenation; a lone unconstrained `string` collapses the whole
    /// template to `string`
    fn build_template(&mut self, parts: &[NodeId]) -> NodeId {
        let mut out: Vec<NodeId> = Vec::new();
        let mut pending = String::new();
        let mut has_pending = false;
        for &part in parts {
            match self.arena().kind(part).clone() {
                TypeKind::Literal { value } => {
                    pending.push_str(&value.to_display_string());
                    has_pending = true;
                }
                _ => {
                    if has_pending {
                        let lit = self.arena_mut().alloc(TypeKind::Literal {
                            value: LiteralValue::String(std::mem::take(&mut pending)),
                        });
                        out.push(lit);
                        has_pending = false;
                    }
                    out.push(part);
                }
            }
        }
        if has_pending {
            let lit = self.arena_mut().alloc(TypeKind::Literal {
                value: LiteralValue::String(pending),
            });
            out.push(lit);
        }

        if out.is_empty() {
            return self.arena_mut().alloc(TypeKind::Literal {
                value: LiteralValue::String(String::new()),
            });
        }
        if out.len() == 1 {
            let single = out[0];
            if self.arena().kind(single).is_literal()
                || matches!(self.arena().kind(single), TypeKind::String)
            {
                return single;
            }
        }
        self.arena_mut()
            .alloc_linked(TypeKind::TemplateLiteral { parts: out })
    }

    // =========================================================
    // Index access, keyof, typeof, widen
    // =========================================================

    pub(crate) fn op_index_access(&mut self) -> ReflectResult<()> {
        let index = self.pop_type()?;
        let container = self.pop_type()?;
        let resolved = index_access(self.arena_mut(), container, index);
        // Hand out a copy so parenting the result does not disturb the
        // container's own member graph.
        let result = self.arena_mut().deep_clone(resolved);
        self.arena_mut().get_mut(result).index_access_origin =
            Some(IndexAccessOrigin { container, index });
        self.push_type(result);
        Ok(())
    }

    pub(crate) fn op_keyof(&mut self) -> ReflectResult<()> {
        let ty = self.pop_type()?;
        let keys = keyof_members(self.arena_mut(), ty);
        let flat = flatten_union_types(self.arena(), &keys);
        let id = unbox_union(self.arena_mut(), flat);
        self.push_type(id);
        Ok(())
    }

    pub(crate) fn op_typeof(&mut self) -> ReflectResult<()> {
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
        let id = self.infer_value(&value)?;
        self.push_type(id);
        Ok(())
    }

    pub(crate) fn op_widen(&mut self) -> ReflectResult<()> {
        let ty = self.pop_type()?;
        let widened = widen_literal(self.arena_mut(), ty);
        self.push_type(widened);
        Ok(())
    }
}
