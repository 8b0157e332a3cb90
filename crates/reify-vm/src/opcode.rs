//! Opcodes of the type reflection VM
//!
//! Every opcode is a single byte; parameters follow in-line in the op
//! stream as further bytes. The whole range stays below 120 so an op byte
//! plus the codec offset of 33 is always a printable code point.
//!
//! Opcodes are organized into categories:
//! - 0..=27: primitive and built-in type builders
//! - 28..=36: literals, templates, containers
//! - 37..=51: structural members and modifiers
//! - 52..=59: aggregates (classes, enums, unions, functions)
//! - 60..=65: variables, arguments, inference slots
//! - 66..=74: type expressions (conditionals, mapped types, index access)
//! - 75..=81: frames, control flow, cross-program calls

/// Bytecode opcode enumeration
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    // ===== Primitives & built-ins (0..=27) =====
    /// Push `never`
    Never = 0,
    /// Push `any`
    Any = 1,
    /// Push `unknown`
    Unknown = 2,
    /// Push `void`
    Void = 3,
    /// Push the `object` primitive
    Object = 4,
    /// Push `string`
    String = 5,
    /// Push `number`
    Number = 6,
    /// Push `boolean`
    Boolean = 7,
    /// Push `bigint`
    Bigint = 8,
    /// Push `symbol`
    Symbol = 9,
    /// Push `null`
    Null = 10,
    /// Push `undefined`
    Undefined = 11,
    /// Push a literal from the pool (operand: pool slot)
    Literal = 12,
    /// Push a branded `number` (operand: brand code)
    NumberBrand = 13,
    /// Push `RegExp`
    Regexp = 14,
    /// Push the `Date` class
    Date = 15,
    /// Push the `Int8Array` class
    Int8Array = 16,
    /// Push the `Uint8Array` class
    Uint8Array = 17,
    /// Push the `Uint8ClampedArray` class
    Uint8ClampedArray = 18,
    /// Push the `Int16Array` class
    Int16Array = 19,
    /// Push the `Uint16Array` class
    Uint16Array = 20,
    /// Push the `Int32Array` class
    Int32Array = 21,
    /// Push the `Uint32Array` class
    Uint32Array = 22,
    /// Push the `Float32Array` class
    Float32Array = 23,
    /// Push the `Float64Array` class
    Float64Array = 24,
    /// Push the `BigInt64Array` class
    BigInt64Array = 25,
    /// Push the `BigUint64Array` class
    BigUint64Array = 26,
    /// Push the `ArrayBuffer` class
    ArrayBuffer = 27,

    // ===== Literals, templates & containers (28..=36) =====
    /// Pop the frame's parts and push the normalized template literal
    TemplateLiteral = 28,
    /// Wrap the top of stack as `T[]`
    Array = 29,
    /// Pop the frame and push a tuple of its members
    Tuple = 30,
    /// Wrap the top of stack as an unnamed tuple member
    TupleMember = 31,
    /// Wrap the top of stack as a named tuple member (operand: pool slot)
    NamedTupleMember = 32,
    /// Wrap the top of stack as `...T`
    Rest = 33,
    /// Pop the element type and push `Set<T>`
    Set = 34,
    /// Pop value then key and push `Map<K, V>`
    Map = 35,
    /// Pop the resolved type and push `Promise<T>`
    Promise = 36,

    // ===== Members & modifiers (37..=51) =====
    /// Pop a type and push a class property (operand: name pool slot)
    Property = 37,
    /// Pop a type and push a property signature (operand: name pool slot)
    PropertySignature = 38,
    /// Pop the frame (params + return) and push a method (operand: name slot)
    Method = 39,
    /// Pop the frame and push a method signature (operand: name slot)
    MethodSignature = 40,
    /// Pop a type and push a parameter (operand: name pool slot)
    Parameter = 41,
    /// Mark the top of stack optional
    Optional = 42,
    /// Mark the top of stack readonly
    Readonly = 43,
    /// Set top-of-stack visibility to public
    Public = 44,
    /// Set top-of-stack visibility to protected
    Protected = 45,
    /// Set top-of-stack visibility to private
    Private = 46,
    /// Mark the top of stack abstract
    Abstract = 47,
    /// Attach a default value thunk to the top of stack (operand: pool slot)
    DefaultValue = 48,
    /// Attach a description to the top of stack (operand: pool slot)
    Description = 49,
    /// Pop type then index and push an index signature
    IndexSignature = 50,
    /// Pop the frame and push an object literal of its members
    ObjectLiteral = 51,

    // ===== Aggregates (52..=59) =====
    /// Pop the frame and push a class built from its members
    Class = 52,
    /// Pop N types and attach as super-class type arguments (operand: N)
    ClassExtends = 53,
    /// Resolve a host class and reflect it (operand: thunk pool slot)
    ClassReference = 54,
    /// Pop the frame of enum members and push the enumeration
    Enum = 55,
    /// Push an enum member (operand: name pool slot)
    EnumMember = 56,
    /// Pop the frame and push the normalized union of its types
    Union = 57,
    /// Pop the frame and push the collapsed intersection of its types
    Intersection = 58,
    /// Pop the frame (params + return) and push a function (operand: name slot)
    Function = 59,

    // ===== Variables, arguments & inference (60..=65) =====
    /// Read the next instantiation input or push a sentinel (operand: name slot)
    TypeParameter = 60,
    /// Like `TypeParameter` but pops a default used when no input was given
    /// (operand: name slot)
    TypeParameterDefault = 61,
    /// Reserve a local variable slot, initialized to `never`
    Var = 62,
    /// Push a variable from a lexical ancestor frame (operands: frame
    /// distance, slot)
    Loads = 63,
    /// Push a call argument located below the current frame (operand: N)
    Arg = 64,
    /// Push an inference slot bound to a frame variable (operands: frame
    /// distance, slot)
    Infer = 65,

    // ===== Type expressions (66..=74) =====
    /// Pop right then left, push `literal(left extends right)`
    Extends = 66,
    /// Pop else, then, condition; pop the frame; push the taken branch
    Condition = 67,
    /// Pop the condition and call the then- or else-program (operands: then
    /// address, else address)
    JumpCondition = 68,
    /// Distribute a conditional over a union (operand: body address)
    Distribute = 69,
    /// Evaluate `{[K in U]: ...}` (operands: body address, modifier bits)
    MappedType = 70,
    /// Pop index then container and push `container[index]`
    IndexAccess = 71,
    /// Pop a type and push the union of its member-name literals
    Keyof = 72,
    /// Infer a type from a host value thunk (operand: thunk pool slot)
    Typeof = 73,
    /// Replace a top-of-stack literal with its widened primitive
    Widen = 74,

    // ===== Frames, control flow & cross-program calls (75..=81) =====
    /// Open a new frame at the current stack pointer
    Frame = 75,
    /// Pop a value, discard the frame, re-push the value
    MoveFrame = 76,
    /// Unconditional jump (operand: address)
    Jump = 77,
    /// Call a subroutine (operand: address)
    Call = 78,
    /// Return from a subroutine to the stacked return address
    Return = 79,
    /// Push the type of another packed program (operand: pool slot)
    Inline = 80,
    /// Instantiate another packed program with popped arguments (operands:
    /// pool slot, argument count)
    InlineCall = 81,
}

impl Op {
    /// Decode an op byte
    pub fn from_u8(byte: u8) -> Option<Op> {
        Some(match byte {
            0 => Op::Never,
            1 => Op::Any,
            2 => Op::Unknown,
            3 => Op::Void,
            4 => Op::Object,
            5 => Op::String,
            6 => Op::Number,
            7 => Op::Boolean,
            8 => Op::Bigint,
            9 => Op::Symbol,
            10 => Op::Null,
            11 => Op::Undefined,
            12 => Op::Literal,
            13 => Op::NumberBrand,
            14 => Op::Regexp,
            15 => Op::Date,
            16 => Op::Int8Array,
            17 => Op::Uint8Array,
            18 => Op::Uint8ClampedArray,
            19 => Op::Int16Array,
            20 => Op::Uint16Array,
            21 => Op::Int32Array,
            22 => Op::Uint32Array,
            23 => Op::Float32Array,
            24 => Op::Float64Array,
            25 => Op::BigInt64Array,
            26 => Op::BigUint64Array,
            27 => Op::ArrayBuffer,
            28 => Op::TemplateLiteral,
            29 => Op::Array,
            30 => Op::Tuple,
            31 => Op::TupleMember,
            32 => Op::NamedTupleMember,
            33 => Op::Rest,
            34 => Op::Set,
            35 => Op::Map,
            36 => Op::Promise,
            37 => Op::Property,
            38 => Op::PropertySignature,
            39 => Op::Method,
            40 => Op::MethodSignature,
            41 => Op::Parameter,
            42 => Op::Optional,
            43 => Op::Readonly,
            44 => Op::Public,
            45 => Op::Protected,
            46 => Op::Private,
            47 => Op::Abstract,
            48 => Op::DefaultValue,
            49 => Op::Description,
            50 => Op::IndexSignature,
            51 => Op::ObjectLiteral,
            52 => Op::Class,
            53 => Op::ClassExtends,
            54 => Op::ClassReference,
            55 => Op::Enum,
            56 => Op::EnumMember,
            57 => Op::Union,
            58 => Op::Intersection,
            59 => Op::Function,
            60 => Op::TypeParameter,
            61 => Op::TypeParameterDefault,
            62 => Op::Var,
            63 => Op::Loads,
            64 => Op::Arg,
            65 => Op::Infer,
            66 => Op::Extends,
            67 => Op::Condition,
            68 => Op::JumpCondition,
            69 => Op::Distribute,
            70 => Op::MappedType,
            71 => Op::IndexAccess,
            72 => Op::Keyof,
            73 => Op::Typeof,
            74 => Op::Widen,
            75 => Op::Frame,
            76 => Op::MoveFrame,
            77 => Op::Jump,
            78 => Op::Call,
            79 => Op::Return,
            80 => Op::Inline,
            81 => Op::InlineCall,
            _ => return None,
        })
    }

    /// Number of in-line parameters following the opcode
    pub fn parameter_count(self) -> usize {
        match self {
            Op::Literal
            | Op::NumberBrand
            | Op::NamedTupleMember
            | Op::Property
            | Op::PropertySignature
            | Op::Method
            | Op::MethodSignature
            | Op::Parameter
            | Op::DefaultValue
            | Op::Description
            | Op::ClassExtends
            | Op::ClassReference
            | Op::EnumMember
            | Op::Function
            | Op::TypeParameter
            | Op::TypeParameterDefault
            | Op::Arg
            | Op::Distribute
            | Op::Typeof
            | Op::Jump
            | Op::Call
            | Op::Inline => 1,
            Op::Loads | Op::Infer | Op::JumpCondition | Op::MappedType | Op::InlineCall => 2,
            _ => 0,
        }
    }
}

/// Mapped type modifier bits (the second `MappedType` parameter)
pub mod mapped_modifier {
    /// Add `?`
    pub const OPTIONAL: u8 = 1 << 0;
    /// Remove `?`
    pub const REMOVE_OPTIONAL: u8 = 1 << 1;
    /// Add `readonly`
    pub const READONLY: u8 = 1 << 2;
    /// Remove `readonly`
    pub const REMOVE_READONLY: u8 = 1 << 3;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8_roundtrip() {
        for byte in 0..=Op::InlineCall as u8 {
            let op = Op::from_u8(byte).expect("dense discriminants");
            assert_eq!(op as u8, byte);
        }
        assert!(Op::from_u8(Op::InlineCall as u8 + 1).is_none());
        assert!(Op::from_u8(200).is_none());
    }

    #[test]
    fn test_parameter_counts() {
        assert_eq!(Op::String.parameter_count(), 0);
        assert_eq!(Op::Literal.parameter_count(), 1);
        assert_eq!(Op::Loads.parameter_count(), 2);
        assert_eq!(Op::MappedType.parameter_count(), 2);
        assert_eq!(Op::InlineCall.parameter_count(), 2);
    }

    #[test]
    fn test_ops_stay_in_codec_range() {
        // Op byte + 33 must remain a printable, single-byte-safe code point.
        assert!((Op::InlineCall as u8) < 120);
    }
}
