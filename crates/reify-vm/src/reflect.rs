//! Process-wide entry points
//!
//! The processor is strictly single-threaded; one instance per thread backs
//! the free functions here. Tests that need isolation construct their own
//! [`Processor`] instead — global access is a convenience, not a
//! requirement.

use std::cell::RefCell;

use reify_types::NodeId;

use crate::error::ReflectResult;
use crate::host::Value;
use crate::processor::{Processor, ReflectOptions, ReflectSource};

thread_local! {
    static PROCESSOR: RefCell<Processor> = RefCell::new(Processor::new());
}

/// Run `f` against this thread's processor
///
/// The returned `NodeId`s stay valid for the lifetime of the thread's
/// processor; read them through the arena inside the closure.
pub fn with_processor<R>(f: impl FnOnce(&mut Processor) -> R) -> R {
    PROCESSOR.with(|p| f(&mut p.borrow_mut()))
}

/// Resolve the type graph of `source` instantiated with `inputs`
pub fn reflect(
    source: impl Into<ReflectSource>,
    inputs: &[NodeId],
    options: ReflectOptions,
) -> ReflectResult<NodeId> {
    with_processor(|p| p.reflect(source, inputs, options))
}

/// Resolve with result-cache reuse enabled
pub fn resolve_runtime_type(
    source: impl Into<ReflectSource>,
    inputs: &[NodeId],
) -> ReflectResult<NodeId> {
    with_processor(|p| p.resolve_runtime_type(source, inputs))
}

/// Synthesize a type graph for an arbitrary runtime value
pub fn type_infer(value: &Value) -> ReflectResult<NodeId> {
    with_processor(|p| p.type_infer(value))
}
