//! The packed program format and its codec
//!
//! A [`Packed`] carrier is an ordered sequence whose last element is a
//! string of encoded opcodes: each character's code point minus 33 is one op
//! byte. All preceding elements form the initial stack (constant pool):
//! names, literal payloads, thunks to host classes, nested programs. The
//! decoded op vector is memoized on the carrier the first time it is needed.

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{ReflectError, ReflectResult};
use crate::host::{ReflectTarget, Value};

/// Offset between an op byte and its encoded code point
pub const CODE_POINT_OFFSET: u32 = 33;

/// Highest encodable op byte; keeps every code point printable
pub const MAX_OP_BYTE: u8 = 120;

/// A deferred resolution of a host class (breaks declaration cycles)
pub type ClassThunk = Rc<dyn Fn() -> Option<Rc<dyn ReflectTarget>>>;

/// A deferred host value (default values, `typeof` subjects)
pub type ValueThunk = Rc<dyn Fn() -> Value>;

/// A deferred packed program (forward-referenced type aliases)
pub type PackedThunk = Rc<dyn Fn() -> Rc<Packed>>;

/// One constant pool entry of a packed program
#[derive(Clone)]
pub enum PoolEntry {
    /// A name or string literal payload
    String(String),
    /// A number literal payload, or the `inline` self-reference marker `0`
    Number(f64),
    /// A boolean literal payload
    Boolean(bool),
    /// A bigint literal payload
    BigInt(String),
    /// A regular expression literal payload
    Regex(String),
    /// A nested packed program
    Packed(Rc<Packed>),
    /// A thunk resolving to a nested packed program
    PackedThunk(PackedThunk),
    /// A thunk resolving to a host class
    ClassThunk(ClassThunk),
    /// A thunk resolving to a host value
    ValueThunk(ValueThunk),
}

impl PoolEntry {
    /// Human-readable entry kind for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            PoolEntry::String(_) => "string",
            PoolEntry::Number(_) => "number",
            PoolEntry::Boolean(_) => "boolean",
            PoolEntry::BigInt(_) => "bigint",
            PoolEntry::Regex(_) => "regex",
            PoolEntry::Packed(_) => "packed",
            PoolEntry::PackedThunk(_) => "packed thunk",
            PoolEntry::ClassThunk(_) => "class thunk",
            PoolEntry::ValueThunk(_) => "value thunk",
        }
    }
}

impl fmt::Debug for PoolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolEntry::String(s) => write!(f, "{:?}", s),
            PoolEntry::Number(n) => write!(f, "{}", n),
            PoolEntry::Boolean(b) => write!(f, "{}", b),
            PoolEntry::BigInt(s) => write!(f, "{}n", s),
            PoolEntry::Regex(s) => write!(f, "/{}/", s),
            PoolEntry::Packed(_) => write!(f, "<packed>"),
            PoolEntry::PackedThunk(_) => write!(f, "<packed thunk>"),
            PoolEntry::ClassThunk(_) => write!(f, "<class thunk>"),
            PoolEntry::ValueThunk(_) => write!(f, "<value thunk>"),
        }
    }
}

impl PartialEq for PoolEntry {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PoolEntry::String(a), PoolEntry::String(b)) => a == b,
            (PoolEntry::Number(a), PoolEntry::Number(b)) => a == b,
            (PoolEntry::Boolean(a), PoolEntry::Boolean(b)) => a == b,
            (PoolEntry::BigInt(a), PoolEntry::BigInt(b)) => a == b,
            (PoolEntry::Regex(a), PoolEntry::Regex(b)) => a == b,
            (PoolEntry::Packed(a), PoolEntry::Packed(b)) => Rc::ptr_eq(a, b),
            (PoolEntry::PackedThunk(a), PoolEntry::PackedThunk(b)) => Rc::ptr_eq(a, b),
            (PoolEntry::ClassThunk(a), PoolEntry::ClassThunk(b)) => Rc::ptr_eq(a, b),
            (PoolEntry::ValueThunk(a), PoolEntry::ValueThunk(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A packed type program: constant pool plus trailing encoded op string
pub struct Packed {
    stack: Vec<PoolEntry>,
    code: String,
    ops_cache: OnceCell<Rc<Vec<u8>>>,
}

impl Packed {
    /// Build a carrier from a pool and raw op bytes, encoding the op string
    pub fn new(stack: Vec<PoolEntry>, ops: &[u8]) -> ReflectResult<Rc<Packed>> {
        Ok(Rc::new(Packed {
            stack,
            code: encode_ops(ops)?,
            ops_cache: OnceCell::new(),
        }))
    }

    /// Build a carrier from a pool and an already-encoded op string
    pub fn from_encoded(stack: Vec<PoolEntry>, code: impl Into<String>) -> Rc<Packed> {
        Rc::new(Packed {
            stack,
            code: code.into(),
            ops_cache: OnceCell::new(),
        })
    }

    /// The constant pool
    pub fn stack(&self) -> &[PoolEntry] {
        &self.stack
    }

    /// The encoded op string
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Decode the op vector, memoized on first use
    pub fn ops(&self) -> ReflectResult<Rc<Vec<u8>>> {
        if let Some(ops) = self.ops_cache.get() {
            return Ok(ops.clone());
        }
        let decoded = Rc::new(decode_ops(&self.code)?);
        // A concurrent fill cannot happen (single-threaded contract); a
        // repeated fill after an error is harmless.
        let _ = self.ops_cache.set(decoded.clone());
        Ok(decoded)
    }

    /// Read one constant pool entry
    pub fn entry(&self, slot: usize) -> ReflectResult<&PoolEntry> {
        self.stack
            .get(slot)
            .ok_or(ReflectError::InvalidPoolSlot(slot))
    }
}

impl fmt::Debug for Packed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packed")
            .field("stack", &self.stack)
            .field("code", &self.code)
            .finish()
    }
}

/// Encode op bytes into the compact trailing string
pub fn encode_ops(ops: &[u8]) -> ReflectResult<String> {
    let mut out = String::with_capacity(ops.len());
    for &op in ops {
        if op > MAX_OP_BYTE {
            return Err(ReflectError::UnencodableOp(op));
        }
        let cp = op as u32 + CODE_POINT_OFFSET;
        out.push(char::from_u32(cp).expect("offset keeps code points valid"));
    }
    Ok(out)
}

/// Decode the trailing string back into op bytes
pub fn decode_ops(code: &str) -> ReflectResult<Vec<u8>> {
    let mut out = Vec::with_capacity(code.len());
    for ch in code.chars() {
        let cp = ch as u32;
        if cp < CODE_POINT_OFFSET || cp > CODE_POINT_OFFSET + MAX_OP_BYTE as u32 {
            return Err(ReflectError::InvalidCodePoint(ch));
        }
        out.push((cp - CODE_POINT_OFFSET) as u8);
    }
    Ok(out)
}

/// The decoded halves of a packed program
#[derive(Debug)]
pub struct ProgramParts {
    /// The constant pool
    pub stack: Vec<PoolEntry>,
    /// The raw op bytes
    pub ops: Vec<u8>,
}

/// Assemble a carrier from decoded parts
pub fn pack(parts: ProgramParts) -> ReflectResult<Rc<Packed>> {
    Packed::new(parts.stack, &parts.ops)
}

/// Split a carrier into decoded parts
pub fn unpack(packed: &Packed) -> ReflectResult<ProgramParts> {
    Ok(ProgramParts {
        stack: packed.stack().to_vec(),
        ops: packed.ops()?.as_ref().clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::Op;

    #[test]
    fn test_codec_roundtrip() {
        let ops = vec![Op::String as u8, Op::Literal as u8, 0, Op::Union as u8];
        let encoded = encode_ops(&ops).unwrap();
        assert_eq!(decode_ops(&encoded).unwrap(), ops);
    }

    #[test]
    fn test_codec_covers_full_range() {
        let ops: Vec<u8> = (0..=MAX_OP_BYTE).collect();
        let encoded = encode_ops(&ops).unwrap();
        assert_eq!(decode_ops(&encoded).unwrap(), ops);
    }

    #[test]
    fn test_encode_rejects_out_of_range() {
        assert_eq!(
            encode_ops(&[MAX_OP_BYTE + 1]),
            Err(ReflectError::UnencodableOp(MAX_OP_BYTE + 1))
        );
    }

    #[test]
    fn test_decode_rejects_out_of_range() {
        assert_eq!(
            decode_ops(" "),
            Err(ReflectError::InvalidCodePoint(' '))
        );
        assert!(decode_ops("\u{1000}").is_err());
    }

    #[test]
    fn test_pack_unpack_roundtrip() {
        let parts = ProgramParts {
            stack: vec![
                PoolEntry::String("abc".into()),
                PoolEntry::Number(42.0),
            ],
            ops: vec![Op::String as u8, Op::Literal as u8, 0, Op::Union as u8],
        };
        let packed = pack(ProgramParts {
            stack: parts.stack.clone(),
            ops: parts.ops.clone(),
        })
        .unwrap();
        let back = unpack(&packed).unwrap();
        assert_eq!(back.stack, parts.stack);
        assert_eq!(back.ops, parts.ops);
    }

    #[test]
    fn test_ops_memoized() {
        let packed = Packed::new(vec![], &[Op::String as u8]).unwrap();
        let a = packed.ops().unwrap();
        let b = packed.ops().unwrap();
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_entry_bounds() {
        let packed = Packed::new(vec![PoolEntry::Number(1.0)], &[]).unwrap();
        assert!(packed.entry(0).is_ok());
        assert!(matches!(
            packed.entry(1),
            Err(ReflectError::InvalidPoolSlot(1))
        ));
    }
}
