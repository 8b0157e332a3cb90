//! reify reflection VM
//!
//! A runtime type reflection virtual machine: a stack-based bytecode
//! interpreter that reconstructs, at program execution time, the structural
//! type graph a host program was written against. Types arrive as compact
//! [`packed::Packed`] programs attached to values; the
//! [`processor::Processor`] executes them lazily into arena-allocated type
//! graphs, handling generics, conditional and mapped types, distributive
//! unions, inference variables, template literals, intersections and
//! recursive references.
//!
//! # Example
//!
//! ```rust
//! use reify_vm::{Op, Packed, PoolEntry, Processor, ReflectOptions};
//!
//! // union { string, literal "abc" }
//! let packed = Packed::new(
//!     vec![PoolEntry::String("abc".into())],
//!     &[Op::String as u8, Op::Literal as u8, 0, Op::Union as u8],
//! )
//! .unwrap();
//!
//! let mut processor = Processor::new();
//! let ty = processor
//!     .reflect(packed, &[], ReflectOptions::default())
//!     .unwrap();
//! assert_eq!(format!("{}", processor.display(ty)), "string | \"abc\"");
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod host;
mod infer;
pub mod opcode;
pub mod packed;
pub mod processor;
mod reflect;

pub use error::{ReflectError, ReflectResult};
pub use host::{
    DecoratorRecord, DecoratorTarget, HostClass, HostFunction, ReflectTarget, Value,
};
pub use opcode::{mapped_modifier, Op};
pub use packed::{
    decode_ops, encode_ops, pack, unpack, ClassThunk, Packed, PackedThunk, PoolEntry,
    ProgramParts, ValueThunk,
};
pub use processor::{Processor, ReflectOptions, ReflectSource};
pub use reflect::{reflect, resolve_runtime_type, type_infer, with_processor};
