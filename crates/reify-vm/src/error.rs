//! Reflection VM errors
//!
//! Failures are fail-fast and unrecoverable within a resolution: the
//! processor discards the active program chain and propagates.

use thiserror::Error;

/// Errors raised while resolving a type program
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReflectError {
    /// `reflect` was called on an object that carries no type program
    #[error("Object carries no type program")]
    MissingTypeProgram,

    /// A `classReference` thunk resolved to nothing
    #[error("Class reference thunk returned no class (pool slot {slot})")]
    UnresolvedClassThunk {
        /// Constant pool slot of the failing thunk
        slot: usize,
    },

    /// The operand stack was popped while empty — an encoder/VM contract
    /// violation
    #[error("Stack underflow at op {pc}")]
    StackUnderflow {
        /// Program counter of the faulting opcode
        pc: usize,
    },

    /// The op stream contained a byte outside the instruction set
    #[error("Invalid opcode: {0}")]
    InvalidOpcode(u8),

    /// The op stream ended in the middle of an instruction
    #[error("Op stream truncated at {pc}")]
    TruncatedProgram {
        /// Program counter past the end
        pc: usize,
    },

    /// An encoded character is outside the valid code point range
    #[error("Invalid op code point: {0:?}")]
    InvalidCodePoint(char),

    /// An op byte cannot be encoded in the valid code point range
    #[error("Op byte {0} exceeds the encodable range")]
    UnencodableOp(u8),

    /// A parameter referenced a constant pool slot that does not exist
    #[error("Invalid constant pool slot: {0}")]
    InvalidPoolSlot(usize),

    /// A constant pool slot held the wrong kind of entry for the opcode
    #[error("Pool slot {slot} holds {found}, expected {expected}")]
    UnexpectedPoolEntry {
        /// The offending slot
        slot: usize,
        /// What the slot held
        found: &'static str,
        /// What the opcode needed
        expected: &'static str,
    },

    /// `inline` accepts a `Packed`, a thunk, or the self-reference marker
    /// `0`; any other integer is rejected
    #[error("Invalid program pointer {0} in inline slot")]
    InvalidProgramPointer(i64),

    /// A stack slot held a return address where a type was expected (or the
    /// reverse) — an encoder/VM contract violation
    #[error("Unexpected stack entry at op {pc}")]
    UnexpectedStackEntry {
        /// Program counter of the faulting opcode
        pc: usize,
    },
}

/// Result alias for reflection operations
pub type ReflectResult<T> = Result<T, ReflectError>;
