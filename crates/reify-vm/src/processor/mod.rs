//! The reflection processor: a stack-based VM executing type programs
//!
//! Execution runs a single dispatch loop over a chain of programs. When an
//! opcode resolves another carrier (a referenced class, an inlined alias),
//! the handler pushes the nested program and the loop switches to it; the
//! handler has already pushed the nested program's pre-allocated result node
//! onto its own stack, so patching that node in place on completion makes
//! every early reference correct — including cycles.

mod expressions;
mod members;
mod program;
mod references;

use std::rc::Rc;

use log::{debug, trace};
use rustc_hash::FxHashMap;

use reify_types::{
    narrow_original_literal, same_type, AnnotationValue, ClassRef, HostId, HostPayload, NodeId,
    TypeArena, TypeDisplay, TypeDecoratorRegistry, TypeKind, ANNOTATION_VALIDATION,
};

use crate::error::{ReflectError, ReflectResult};
use crate::host::{DecoratorTarget, ReflectTarget, Value};
use crate::opcode::Op;
use crate::packed::Packed;

pub(crate) use program::{Frame, Program, StackEntry, TypeLoop};

/// How `reflect` should treat the carrier's result cache
#[derive(Debug, Clone, Copy, Default)]
pub struct ReflectOptions {
    /// Reuse (and populate) the interned result for non-generic resolutions
    pub reuse_cached: bool,
}

/// What to reflect: a bare carrier or a host artefact carrying one
#[derive(Clone)]
pub enum ReflectSource {
    /// A packed program
    Packed(Rc<Packed>),
    /// A host class or function
    Target(Rc<dyn ReflectTarget>),
}

impl From<Rc<Packed>> for ReflectSource {
    fn from(packed: Rc<Packed>) -> Self {
        ReflectSource::Packed(packed)
    }
}

impl From<Rc<dyn ReflectTarget>> for ReflectSource {
    fn from(target: Rc<dyn ReflectTarget>) -> Self {
        ReflectSource::Target(target)
    }
}

impl From<Rc<crate::host::HostClass>> for ReflectSource {
    fn from(class: Rc<crate::host::HostClass>) -> Self {
        ReflectSource::Target(class)
    }
}

impl From<Rc<crate::host::HostFunction>> for ReflectSource {
    fn from(function: Rc<crate::host::HostFunction>) -> Self {
        ReflectSource::Target(function)
    }
}

/// Registry interning host handles behind opaque ids
#[derive(Default)]
struct HostRegistry {
    by_addr: FxHashMap<usize, HostId>,
    handles: FxHashMap<HostId, Rc<dyn ReflectTarget>>,
    next: u64,
}

impl HostRegistry {
    fn intern(&mut self, target: &Rc<dyn ReflectTarget>) -> HostId {
        let addr = Rc::as_ptr(target) as *const () as usize;
        if let Some(&id) = self.by_addr.get(&addr) {
            return id;
        }
        let id = HostId(self.next);
        self.next += 1;
        self.by_addr.insert(addr, id);
        self.handles.insert(id, target.clone());
        id
    }

    fn get(&self, id: HostId) -> Option<&Rc<dyn ReflectTarget>> {
        self.handles.get(&id)
    }
}

/// The reflection VM
///
/// Strictly single-threaded and reentrant through the program chain only;
/// construct one per test, or use the process-wide instance behind
/// [`crate::with_processor`].
pub struct Processor {
    arena: TypeArena,
    programs: Vec<Program>,
    cache: FxHashMap<usize, NodeId>,
    hosts: HostRegistry,
    type_decorators: TypeDecoratorRegistry,
}

impl Default for Processor {
    fn default() -> Self {
        Processor::new()
    }
}

impl Processor {
    /// A fresh processor with the standard decorator registry
    pub fn new() -> Processor {
        Processor {
            arena: TypeArena::new(),
            programs: Vec::new(),
            cache: FxHashMap::default(),
            hosts: HostRegistry::default(),
            type_decorators: TypeDecoratorRegistry::default(),
        }
    }

    /// The arena holding every node this processor produced
    pub fn arena(&self) -> &TypeArena {
        &self.arena
    }

    /// Mutable access to the arena
    pub fn arena_mut(&mut self) -> &mut TypeArena {
        &mut self.arena
    }

    /// Replace the type-decorator registry
    pub fn set_type_decorators(&mut self, registry: TypeDecoratorRegistry) {
        self.type_decorators = registry;
    }

    pub(crate) fn type_decorators_clone(&self) -> TypeDecoratorRegistry {
        self.type_decorators.clone()
    }

    /// Render a resolved type for humans
    pub fn display(&self, id: NodeId) -> TypeDisplay<'_> {
        self.arena.display(id)
    }

    /// Look up a host handle interned during resolution
    pub fn host(&self, id: HostId) -> Option<Rc<dyn ReflectTarget>> {
        self.hosts.get(id).cloned()
    }

    /// Intern a host handle behind an opaque id
    pub(crate) fn intern_host(&mut self, target: &Rc<dyn ReflectTarget>) -> HostId {
        self.hosts.intern(target)
    }

    // =========================================================
    // Entry points
    // =========================================================

    /// Resolve the type graph of `source` instantiated with `inputs`
    pub fn reflect(
        &mut self,
        source: impl Into<ReflectSource>,
        inputs: &[NodeId],
        options: ReflectOptions,
    ) -> ReflectResult<NodeId> {
        let (packed, object) = match source.into() {
            ReflectSource::Packed(p) => (p, None),
            ReflectSource::Target(t) => {
                let p = t.type_program().ok_or(ReflectError::MissingTypeProgram)?;
                (p, Some(t))
            }
        };
        let base = self.programs.len();
        let root = self.enqueue(packed, object, inputs.to_vec(), options.reuse_cached)?;
        self.run(base)?;
        Ok(root)
    }

    /// Resolve with result-cache reuse enabled
    pub fn resolve_runtime_type(
        &mut self,
        source: impl Into<ReflectSource>,
        inputs: &[NodeId],
    ) -> ReflectResult<NodeId> {
        self.reflect(source, inputs, ReflectOptions { reuse_cached: true })
    }

    /// Synthesize a type graph for an arbitrary runtime value
    pub fn type_infer(&mut self, value: &Value) -> ReflectResult<NodeId> {
        let base = self.programs.len();
        let root = self.infer_value(value)?;
        self.run(base)?;
        Ok(root)
    }

    // =========================================================
    // Program chain management
    // =========================================================

    /// Queue a program for execution, or short-circuit through the caches
    ///
    /// Returns the node the final result will live in. When the carrier is
    /// already running on the active chain with the same inputs, a fresh
    /// placeholder is handed out instead and patched when that outer program
    /// completes.
    pub(crate) fn enqueue(
        &mut self,
        packed: Rc<Packed>,
        object: Option<Rc<dyn ReflectTarget>>,
        inputs: Vec<NodeId>,
        reuse_cached: bool,
    ) -> ReflectResult<NodeId> {
        let addr = Rc::as_ptr(&packed) as *const () as usize;
        if reuse_cached && inputs.is_empty() {
            if let Some(&cached) = self.cache.get(&addr) {
                debug!("reflect cache hit for carrier {:#x}", addr);
                return Ok(cached);
            }
        }

        for i in (0..self.programs.len()).rev() {
            let prog = &self.programs[i];
            if Rc::ptr_eq(&prog.packed, &packed)
                && same_inputs(&self.arena, &prog.inputs, &inputs)
            {
                trace!("cycle on active carrier {:#x}, handing out placeholder", addr);
                let placeholder = self.arena.alloc(TypeKind::Unknown);
                self.programs[i].result_types.push(placeholder);
                return Ok(placeholder);
            }
        }

        let ops = packed.ops()?;
        let result_type = self.arena.alloc(TypeKind::Unknown);
        let cache_on_complete = reuse_cached && inputs.is_empty();
        trace!(
            "queue program {:#x} ({} ops, {} inputs)",
            addr,
            ops.len(),
            inputs.len()
        );
        self.programs.push(Program::new(
            packed,
            ops,
            inputs,
            result_type,
            object,
            cache_on_complete,
        ));
        Ok(result_type)
    }

    /// Run queued programs until the chain shrinks back to `base`
    fn run(&mut self, base: usize) -> ReflectResult<()> {
        let result = self.run_inner(base);
        if result.is_err() {
            // Fail fast: the resolution is unrecoverable, discard it whole.
            self.programs.truncate(base);
        }
        result
    }

    fn run_inner(&mut self, base: usize) -> ReflectResult<()> {
        while self.programs.len() > base {
            let prog = self.programs.last().expect("len checked above");
            if prog.pc >= prog.end {
                self.finish_program()?;
                continue;
            }
            let byte = prog.ops[prog.pc];
            let op = Op::from_u8(byte).ok_or(ReflectError::InvalidOpcode(byte))?;
            self.cur().pc += 1;
            self.step(op)?;
        }
        Ok(())
    }

    /// Dispatch a single opcode
    fn step(&mut self, op: Op) -> ReflectResult<()> {
        match op {
            // =========================================================
            // Primitives
            // =========================================================
            Op::Never => self.push_fresh(TypeKind::Never),
            Op::Any => self.push_fresh(TypeKind::Any),
            Op::Unknown => self.push_fresh(TypeKind::Unknown),
            Op::Void => self.push_fresh(TypeKind::Void),
            Op::Object => self.push_fresh(TypeKind::Object),
            Op::String => self.push_fresh(TypeKind::String),
            Op::Number => self.push_fresh(TypeKind::Number { brand: None }),
            Op::Boolean => self.push_fresh(TypeKind::Boolean),
            Op::Bigint => self.push_fresh(TypeKind::Bigint),
            Op::Symbol => self.push_fresh(TypeKind::Symbol),
            Op::Null => self.push_fresh(TypeKind::Null),
            Op::Undefined => self.push_fresh(TypeKind::Undefined),
            Op::Regexp => self.push_fresh(TypeKind::Regexp),

            // =========================================================
            // Built-in classes
            // =========================================================
            Op::Date
            | Op::Int8Array
            | Op::Uint8Array
            | Op::Uint8ClampedArray
            | Op::Int16Array
            | Op::Uint16Array
            | Op::Int32Array
            | Op::Uint32Array
            | Op::Float32Array
            | Op::Float64Array
            | Op::BigInt64Array
            | Op::BigUint64Array
            | Op::ArrayBuffer => self.op_builtin_class(op),

            // =========================================================
            // Literals, templates & containers
            // =========================================================
            Op::Literal => self.op_literal()?,
            Op::NumberBrand => self.op_number_brand()?,
            Op::TemplateLiteral => self.op_template_literal()?,
            Op::Array => self.op_array()?,
            Op::Tuple => self.op_tuple()?,
            Op::TupleMember => self.op_tuple_member(None)?,
            Op::NamedTupleMember => {
                let slot = self.eat_param()?;
                let name = self.pool_str(slot)?;
                self.op_tuple_member(Some(name))?;
            }
            Op::Rest => self.op_rest()?,
            Op::Set => self.op_set()?,
            Op::Map => self.op_map()?,
            Op::Promise => self.op_promise()?,

            // =========================================================
            // Members & modifiers
            // =========================================================
            Op::Property => self.op_property(false)?,
            Op::PropertySignature => self.op_property(true)?,
            Op::Method => self.op_method(false)?,
            Op::MethodSignature => self.op_method(true)?,
            Op::Parameter => self.op_parameter()?,
            Op::Optional | Op::Readonly | Op::Public | Op::Protected | Op::Private
            | Op::Abstract => self.op_modifier(op)?,
            Op::DefaultValue => self.op_default_value()?,
            Op::Description => self.op_description()?,
            Op::IndexSignature => self.op_index_signature()?,
            Op::ObjectLiteral => self.op_object_literal()?,

            // =========================================================
            // Aggregates
            // =========================================================
            Op::Class => self.op_class()?,
            Op::ClassExtends => self.op_class_extends()?,
            Op::ClassReference => self.op_class_reference()?,
            Op::Enum => self.op_enum()?,
            Op::EnumMember => self.op_enum_member()?,
            Op::Union => self.op_union()?,
            Op::Intersection => self.op_intersection()?,
            Op::Function => self.op_function()?,

            // =========================================================
            // Variables, arguments & inference
            // =========================================================
            Op::TypeParameter => self.op_type_parameter(false)?,
            Op::TypeParameterDefault => self.op_type_parameter(true)?,
            Op::Var => self.op_var(),
            Op::Loads => self.op_loads()?,
            Op::Arg => self.op_arg()?,
            Op::Infer => self.op_infer()?,

            // =========================================================
            // Type expressions
            // =========================================================
            Op::Extends => self.op_extends()?,
            Op::Condition => self.op_condition()?,
            Op::JumpCondition => self.op_jump_condition()?,
            Op::Distribute => self.op_distribute()?,
            Op::MappedType => self.op_mapped_type()?,
            Op::IndexAccess => self.op_index_access()?,
            Op::Keyof => self.op_keyof()?,
            Op::Typeof => self.op_typeof()?,
            Op::Widen => self.op_widen()?,

            // =========================================================
            // Frames, control flow & cross-program calls
            // =========================================================
            Op::Frame => self.op_frame(),
            Op::MoveFrame => self.op_move_frame()?,
            Op::Jump => {
                let target = self.eat_param()?;
                self.cur().pc = target;
            }
            Op::Call => {
                let target = self.eat_param()?;
                self.call(target, 1);
            }
            Op::Return => self.op_return()?,
            Op::Inline => self.op_inline()?,
            Op::InlineCall => self.op_inline_call()?,
        }
        Ok(())
    }

    /// Complete the innermost program: narrow the result, patch the
    /// pre-allocated node and every handed-out placeholder, apply deferred
    /// class decorators, intern the result when eligible
    fn finish_program(&mut self) -> ReflectResult<()> {
        let mut prog = self.programs.pop().expect("finishing an active program");
        let result = match prog.stack.pop() {
            Some(StackEntry::Type(id)) => id,
            Some(StackEntry::Address(_)) => {
                return Err(ReflectError::UnexpectedStackEntry { pc: prog.pc })
            }
            None => self.arena.alloc(TypeKind::Never),
        };
        let narrowed = narrow_original_literal(&mut self.arena, result);

        if let Some(object) = prog.object.take() {
            self.attach_host(narrowed, &object);
        }

        // Extras first: the primary result is patched last so the shared
        // children end up parented onto it.
        for &extra in &prog.result_types {
            self.arena.patch(extra, narrowed);
        }
        self.arena.patch(prog.result_type, narrowed);

        if prog.cache_on_complete {
            let addr = Rc::as_ptr(&prog.packed) as *const () as usize;
            self.cache.insert(addr, prog.result_type);
            trace!("interned result for carrier {:#x}", addr);
        }
        Ok(())
    }

    /// Patch the class placeholder with the host reference, name the node,
    /// and apply the host's deferred decorator records
    fn attach_host(&mut self, node: NodeId, object: &Rc<dyn ReflectTarget>) {
        let host_id = self.hosts.intern(object);
        if let TypeKind::Class { class, .. } = &mut self.arena.get_mut(node).kind {
            if *class == ClassRef::Placeholder {
                *class = ClassRef::Host(host_id);
            }
        }
        if self.arena.get(node).type_name.is_none() {
            self.arena.get_mut(node).type_name = object.name().map(str::to_string);
        }
        if let TypeKind::Function { name, .. } = &mut self.arena.get_mut(node).kind {
            if name.is_none() {
                *name = object.name().map(str::to_string);
            }
        }

        for record in object.decorators().to_vec() {
            self.apply_decorator(node, &record.property, record.target, &record.validator);
        }
    }

    /// Route one decorator record to the property or parameter it targets
    fn apply_decorator(
        &mut self,
        node: NodeId,
        property: &str,
        target: DecoratorTarget,
        validator: &Value,
    ) {
        let Some(member) = reify_types::get_member(&self.arena, node, property) else {
            return;
        };
        let annotated = match target {
            DecoratorTarget::Property => member,
            DecoratorTarget::Parameter(index) => {
                let parameters = match self.arena.kind(member) {
                    TypeKind::Method { parameters, .. }
                    | TypeKind::MethodSignature { parameters, .. } => parameters.clone(),
                    _ => return,
                };
                match parameters.get(index) {
                    Some(&p) => p,
                    None => return,
                }
            }
        };
        self.arena
            .get_mut(annotated)
            .annotations
            .entry(ANNOTATION_VALIDATION.to_string())
            .or_default()
            .push(AnnotationValue::Value(HostPayload::new(validator.clone())));
    }

    // =========================================================
    // Calling convention
    // =========================================================

    pub(crate) fn cur(&mut self) -> &mut Program {
        self.programs.last_mut().expect("an active program")
    }

    fn push_fresh(&mut self, kind: TypeKind) {
        let id = self.arena.alloc(kind);
        self.push_type(id);
    }

    pub(crate) fn push_type(&mut self, id: NodeId) {
        self.cur().stack.push(StackEntry::Type(id));
    }

    pub(crate) fn pop_type(&mut self) -> ReflectResult<NodeId> {
        let pc = self.cur().pc;
        match self.cur().stack.pop() {
            Some(StackEntry::Type(id)) => Ok(id),
            Some(StackEntry::Address(_)) => Err(ReflectError::UnexpectedStackEntry { pc }),
            None => Err(ReflectError::StackUnderflow { pc }),
        }
    }

    /// Read the next in-line parameter from the op stream
    pub(crate) fn eat_param(&mut self) -> ReflectResult<usize> {
        let prog = self.cur();
        if prog.pc >= prog.ops.len() {
            return Err(ReflectError::TruncatedProgram { pc: prog.pc });
        }
        let value = prog.ops[prog.pc] as usize;
        prog.pc += 1;
        Ok(value)
    }

    /// Push the return address and a fresh frame, then jump
    ///
    /// The return address is `pc - 1 + jump_back` with the pc already past
    /// this op's parameters; `jump_back` of `-1`/`-2` makes `return` land on
    /// the calling opcode again, which is how `distribute` and `mappedType`
    /// loop.
    pub(crate) fn call(&mut self, target: usize, jump_back: i32) {
        let prog = self.cur();
        let address = (prog.pc as i64 - 1 + jump_back as i64) as usize;
        prog.stack.push(StackEntry::Address(address));
        let start = prog.stack.len();
        prog.frames.push(Frame::at(start));
        prog.pc = target;
        trace!("call -> {} (return to {})", target, address);
    }

    fn op_return(&mut self) -> ReflectResult<()> {
        let value = self.pop_type()?;
        let prog = self.cur();
        if prog.frames.len() < 2 {
            return Err(ReflectError::StackUnderflow { pc: prog.pc });
        }
        let frame = prog.frames.pop().expect("length checked");
        let address_slot = frame.start.checked_sub(1).ok_or(ReflectError::StackUnderflow {
            pc: prog.pc,
        })?;
        let StackEntry::Address(address) = prog.stack[address_slot] else {
            return Err(ReflectError::UnexpectedStackEntry { pc: prog.pc });
        };
        prog.stack.truncate(address_slot);
        prog.stack.push(StackEntry::Type(value));
        prog.pc = address;
        trace!("return -> {}", address);
        Ok(())
    }

    pub(crate) fn op_frame(&mut self) {
        let prog = self.cur();
        let start = prog.stack.len();
        prog.frames.push(Frame::at(start));
    }

    fn op_move_frame(&mut self) -> ReflectResult<()> {
        let value = self.pop_type()?;
        self.drop_frame();
        self.push_type(value);
        Ok(())
    }

    /// Discard the innermost frame and everything it pushed
    pub(crate) fn drop_frame(&mut self) {
        let prog = self.cur();
        if prog.frames.len() > 1 {
            let frame = prog.frames.pop().expect("length checked");
            prog.stack.truncate(frame.start);
        } else {
            let start = prog.frames[0].start;
            prog.stack.truncate(start);
        }
    }

    /// Pop the innermost frame, yielding the values it produced (local
    /// variable slots excluded)
    pub(crate) fn pop_frame_types(&mut self) -> ReflectResult<Vec<NodeId>> {
        let pc = self.cur().pc;
        let prog = self.cur();
        let (start, variables) = {
            let frame = prog.frame();
            (frame.start, frame.variables)
        };
        let values = prog.stack.split_off((start + variables).min(prog.stack.len()));
        prog.stack.truncate(start);
        if prog.frames.len() > 1 {
            prog.frames.pop();
        } else {
            let root = &mut prog.frames[0];
            root.start = 0;
            root.variables = 0;
            root.distributive_loop = None;
            root.mapped_type = None;
        }
        values
            .into_iter()
            .map(|entry| match entry {
                StackEntry::Type(id) => Ok(id),
                StackEntry::Address(_) => Err(ReflectError::UnexpectedStackEntry { pc }),
            })
            .collect()
    }

    // =========================================================
    // Pool access
    // =========================================================

    pub(crate) fn pool_entry(&mut self, slot: usize) -> ReflectResult<crate::packed::PoolEntry> {
        let packed = self.cur().packed.clone();
        Ok(packed.entry(slot)?.clone())
    }

    /// Read a member name from the pool (numbers format as their spelling)
    pub(crate) fn pool_str(&mut self, slot: usize) -> ReflectResult<String> {
        use crate::packed::PoolEntry;
        match self.pool_entry(slot)? {
            PoolEntry::String(s) => Ok(s),
            PoolEntry::Number(n) => Ok(reify_types::format_number(n)),
            other => Err(ReflectError::UnexpectedPoolEntry {
                slot,
                found: other.kind_name(),
                expected: "string",
            }),
        }
    }
}

/// Structural equality of two input lists
fn same_inputs(arena: &TypeArena, a: &[NodeId], b: &[NodeId]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(&x, &y)| same_type(arena, x, y))
}
