//! Core type node definitions for the reify type system
//!
//! Type graphs are arena-allocated: every node lives in a [`TypeArena`] and is
//! addressed by a [`NodeId`]. Child references and the `parent` back-pointer
//! are ids, never owned boxes, so self-referential types (a class whose
//! property refers back to the class) are plain index cycles instead of
//! aliased pointers.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

/// Unique identifier for a type node in an arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Opaque identity of a host class or function
///
/// The VM mints these from host object identity and keeps the actual handles
/// in its own registry; the type model never needs to look through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostId(pub u64);

/// Built-in container classes the opcode set can instantiate directly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinClass {
    /// `Date`
    Date,
    /// `Set<T>`
    Set,
    /// `Map<K, V>`
    Map,
    /// `ArrayBuffer`
    ArrayBuffer,
    /// `Int8Array`
    Int8Array,
    /// `Uint8Array`
    Uint8Array,
    /// `Uint8ClampedArray`
    Uint8ClampedArray,
    /// `Int16Array`
    Int16Array,
    /// `Uint16Array`
    Uint16Array,
    /// `Int32Array`
    Int32Array,
    /// `Uint32Array`
    Uint32Array,
    /// `Float32Array`
    Float32Array,
    /// `Float64Array`
    Float64Array,
    /// `BigInt64Array`
    BigInt64Array,
    /// `BigUint64Array`
    BigUint64Array,
}

impl BuiltinClass {
    /// Canonical class name as spelled in source
    pub fn name(self) -> &'static str {
        match self {
            BuiltinClass::Date => "Date",
            BuiltinClass::Set => "Set",
            BuiltinClass::Map => "Map",
            BuiltinClass::ArrayBuffer => "ArrayBuffer",
            BuiltinClass::Int8Array => "Int8Array",
            BuiltinClass::Uint8Array => "Uint8Array",
            BuiltinClass::Uint8ClampedArray => "Uint8ClampedArray",
            BuiltinClass::Int16Array => "Int16Array",
            BuiltinClass::Uint16Array => "Uint16Array",
            BuiltinClass::Int32Array => "Int32Array",
            BuiltinClass::Uint32Array => "Uint32Array",
            BuiltinClass::Float32Array => "Float32Array",
            BuiltinClass::Float64Array => "Float64Array",
            BuiltinClass::BigInt64Array => "BigInt64Array",
            BuiltinClass::BigUint64Array => "BigUint64Array",
        }
    }
}

/// What a `class` node points at
///
/// A freshly built class node carries [`ClassRef::Placeholder`], meaning "the
/// class whose encoded program produced this node"; the VM overwrites it with
/// the host reference when the program terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassRef {
    /// Not yet patched to a host class
    Placeholder,
    /// A well-known built-in class
    Builtin(BuiltinClass),
    /// A host class registered with the VM
    Host(HostId),
}

/// Number type brands (`integer`, `int8`, `float32`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberBrand {
    /// Whole numbers
    Integer,
    /// 8-bit signed
    Int8,
    /// 16-bit signed
    Int16,
    /// 32-bit signed
    Int32,
    /// 8-bit unsigned
    Uint8,
    /// 16-bit unsigned
    Uint16,
    /// 32-bit unsigned
    Uint32,
    /// Any float
    Float,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
}

impl NumberBrand {
    /// Decode a brand from its opcode parameter
    pub fn from_u8(byte: u8) -> Option<NumberBrand> {
        Some(match byte {
            0 => NumberBrand::Integer,
            1 => NumberBrand::Int8,
            2 => NumberBrand::Int16,
            3 => NumberBrand::Int32,
            4 => NumberBrand::Uint8,
            5 => NumberBrand::Uint16,
            6 => NumberBrand::Uint32,
            7 => NumberBrand::Float,
            8 => NumberBrand::Float32,
            9 => NumberBrand::Float64,
            _ => return None,
        })
    }
}

/// Payload of a `literal` type
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// String literal: `"abc"`
    String(String),
    /// Number literal: `42`
    Number(f64),
    /// Boolean literal: `true`
    Boolean(bool),
    /// BigInt literal, kept as its decimal spelling
    BigInt(String),
    /// Regular expression literal, kept as its source text
    Regex(String),
}

impl LiteralValue {
    /// Truthiness as the conditional opcodes see it
    pub fn is_truthy(&self) -> bool {
        match self {
            LiteralValue::String(s) => !s.is_empty(),
            LiteralValue::Number(n) => *n != 0.0,
            LiteralValue::Boolean(b) => *b,
            LiteralValue::BigInt(s) => s != "0",
            LiteralValue::Regex(_) => true,
        }
    }

    /// The literal rendered as a string, as template literal merging does it
    pub fn to_display_string(&self) -> String {
        match self {
            LiteralValue::String(s) => s.clone(),
            LiteralValue::Number(n) => format_number(*n),
            LiteralValue::Boolean(b) => b.to_string(),
            LiteralValue::BigInt(s) => s.clone(),
            LiteralValue::Regex(s) => s.clone(),
        }
    }
}

/// Render a number the way the host language prints it (no trailing `.0`)
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// The value of an enum member after defaults are evaluated
#[derive(Debug, Clone, PartialEq)]
pub enum EnumValue {
    /// Numeric member
    Number(f64),
    /// String member
    String(String),
    /// Member without a resolvable value
    Undefined,
}

/// Member visibility on classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Default visibility
    Public,
    /// Visible to subclasses
    Protected,
    /// Visible to the declaring class only
    Private,
}

/// An opaque host value carried on a type node (default values, annotation
/// payloads). The type model never interprets these; the VM downcasts.
#[derive(Clone)]
pub struct HostPayload(pub Rc<dyn Any>);

impl HostPayload {
    /// Wrap a host value
    pub fn new<T: Any>(value: T) -> Self {
        HostPayload(Rc::new(value))
    }

    /// Downcast to a concrete host value type
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for HostPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<host value>")
    }
}

/// A single annotation payload: either a type node or an opaque host value
#[derive(Debug, Clone)]
pub enum AnnotationValue {
    /// Payload expressed as a type (decorator object-literal members)
    Type(NodeId),
    /// Payload expressed as a host value (validator functions, defaults)
    Value(HostPayload),
}

/// Annotation map: annotation symbol to its ordered payloads
pub type Annotations = FxHashMap<String, Vec<AnnotationValue>>;

/// Annotation symbol used when intersection aggregates attach to a dominant
/// primitive
pub const ANNOTATION_DEFAULT: &str = "default";

/// Annotation symbol collecting validator functions from class decorators
pub const ANNOTATION_VALIDATION: &str = "validation";

/// Where an index-access result came from, kept for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexAccessOrigin {
    /// The container type that was indexed
    pub container: NodeId,
    /// The index type
    pub index: NodeId,
}

/// The tagged variant of a type node
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// Bottom type
    Never,
    /// Dynamic type, assignable both ways
    Any,
    /// Top type
    Unknown,
    /// Absence of a value (function returns)
    Void,
    /// The `object` primitive (any non-primitive value)
    Object,
    /// `null`
    Null,
    /// `undefined`
    Undefined,
    /// `string`
    String,
    /// `number`, optionally branded (`integer`, `int8`, ...)
    Number {
        /// Brand restricting the numeric domain
        brand: Option<NumberBrand>,
    },
    /// `boolean`
    Boolean,
    /// `bigint`
    Bigint,
    /// `symbol`
    Symbol,
    /// `RegExp`
    Regexp,
    /// A literal type: `"abc"`, `42`, `true`
    Literal {
        /// The literal payload
        value: LiteralValue,
    },
    /// A template literal: `` `a${string}` `` — parts are literals and
    /// unconstrained primitives
    TemplateLiteral {
        /// Ordered parts
        parts: Vec<NodeId>,
    },
    /// `T[]`
    Array {
        /// Element type
        element: NodeId,
    },
    /// `[T1, T2, ...]` — members are `TupleMember` nodes
    Tuple {
        /// Tuple members
        members: Vec<NodeId>,
    },
    /// One slot of a tuple
    TupleMember {
        /// The member type
        member: NodeId,
        /// Optional label: `[name: string]`
        name: Option<String>,
        /// `[x?: string]`
        optional: bool,
    },
    /// `...T` inside a tuple or parameter list
    Rest {
        /// The spread type
        ty: NodeId,
    },
    /// `{ a: string }` — members are signatures and index signatures
    ObjectLiteral {
        /// Ordered members
        members: Vec<NodeId>,
    },
    /// A class instance type
    Class {
        /// The host class this node describes
        class: ClassRef,
        /// Properties, methods, index signatures
        members: Vec<NodeId>,
        /// Constructor parameters, when a constructor is declared
        arguments: Vec<NodeId>,
        /// Type arguments applied to the `extends` clause
        extends_arguments: Vec<NodeId>,
    },
    /// An enumeration: name/value map plus the distinct values
    Enum {
        /// Members in declaration order
        members: Vec<(String, EnumValue)>,
        /// The member values
        values: Vec<EnumValue>,
    },
    /// A single enum member before the enum is assembled
    EnumMember {
        /// Member name
        name: String,
        /// Explicit value, when a default was attached
        default: Option<EnumValue>,
    },
    /// A free function type
    Function {
        /// Function name, when known
        name: Option<String>,
        /// Parameter nodes
        parameters: Vec<NodeId>,
        /// Return type
        return_type: NodeId,
    },
    /// A class method
    Method {
        /// Method name
        name: String,
        /// Parameter nodes
        parameters: Vec<NodeId>,
        /// Return type
        return_type: NodeId,
        /// Member visibility
        visibility: Visibility,
        /// `abstract` methods have no body
        is_abstract: bool,
    },
    /// A method signature on an object literal or interface
    MethodSignature {
        /// Method name
        name: String,
        /// Parameter nodes
        parameters: Vec<NodeId>,
        /// Return type
        return_type: NodeId,
        /// `m?(): void`
        optional: bool,
    },
    /// A class property
    Property {
        /// Property name
        name: String,
        /// Property type
        ty: NodeId,
        /// `p?: T`
        optional: bool,
        /// `readonly p: T`
        readonly: bool,
        /// Member visibility
        visibility: Visibility,
        /// `abstract` properties have no initializer
        is_abstract: bool,
        /// Default value, when the declaration had an initializer
        default: Option<HostPayload>,
        /// Doc text attached by the encoder
        description: Option<String>,
    },
    /// A property signature on an object literal or interface
    PropertySignature {
        /// Property name
        name: String,
        /// Property type
        ty: NodeId,
        /// `p?: T`
        optional: bool,
        /// `readonly p: T`
        readonly: bool,
        /// Doc text attached by the encoder
        description: Option<String>,
    },
    /// `[key: string]: T`
    IndexSignature {
        /// The key domain (`string`, `number`, `symbol`)
        index: NodeId,
        /// The value type
        ty: NodeId,
    },
    /// A function or method parameter
    Parameter {
        /// Parameter name
        name: String,
        /// Parameter type
        ty: NodeId,
        /// `p?: T`
        optional: bool,
        /// `readonly p: T` (constructor promotion)
        readonly: bool,
        /// Present for constructor-promoted properties
        visibility: Option<Visibility>,
        /// Default value thunk result
        default: Option<HostPayload>,
    },
    /// `A | B`
    Union {
        /// Members, flattened and pairwise distinct
        types: Vec<NodeId>,
    },
    /// `A & B`
    Intersection {
        /// Members after decorator extraction
        types: Vec<NodeId>,
    },
    /// `Promise<T>`
    Promise {
        /// The resolved type
        ty: NodeId,
    },
    /// An unbound generic type parameter left in place
    TypeParameter {
        /// Parameter name
        name: String,
    },
    /// An `infer X` slot inside an `extends` pattern; the extendability check
    /// writes the matched type back into frame `frame_offset`, slot `slot`
    Infer {
        /// Lexical frame distance at evaluation time
        frame_offset: u8,
        /// Variable slot inside that frame
        slot: u16,
    },
}

impl TypeKind {
    /// Kind tag name, used by `Display` and diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            TypeKind::Never => "never",
            TypeKind::Any => "any",
            TypeKind::Unknown => "unknown",
            TypeKind::Void => "void",
            TypeKind::Object => "object",
            TypeKind::Null => "null",
            TypeKind::Undefined => "undefined",
            TypeKind::String => "string",
            TypeKind::Number { .. } => "number",
            TypeKind::Boolean => "boolean",
            TypeKind::Bigint => "bigint",
            TypeKind::Symbol => "symbol",
            TypeKind::Regexp => "regexp",
            TypeKind::Literal { .. } => "literal",
            TypeKind::TemplateLiteral { .. } => "templateLiteral",
            TypeKind::Array { .. } => "array",
            TypeKind::Tuple { .. } => "tuple",
            TypeKind::TupleMember { .. } => "tupleMember",
            TypeKind::Rest { .. } => "rest",
            TypeKind::ObjectLiteral { .. } => "objectLiteral",
            TypeKind::Class { .. } => "class",
            TypeKind::Enum { .. } => "enum",
            TypeKind::EnumMember { .. } => "enumMember",
            TypeKind::Function { .. } => "function",
            TypeKind::Method { .. } => "method",
            TypeKind::MethodSignature { .. } => "methodSignature",
            TypeKind::Property { .. } => "property",
            TypeKind::PropertySignature { .. } => "propertySignature",
            TypeKind::IndexSignature { .. } => "indexSignature",
            TypeKind::Parameter { .. } => "parameter",
            TypeKind::Union { .. } => "union",
            TypeKind::Intersection { .. } => "intersection",
            TypeKind::Promise { .. } => "promise",
            TypeKind::TypeParameter { .. } => "typeParameter",
            TypeKind::Infer { .. } => "infer",
        }
    }

    /// Check if this kind is `never`
    pub fn is_never(&self) -> bool {
        matches!(self, TypeKind::Never)
    }

    /// Check if this kind is a union
    pub fn is_union(&self) -> bool {
        matches!(self, TypeKind::Union { .. })
    }

    /// Check if this kind is a literal
    pub fn is_literal(&self) -> bool {
        matches!(self, TypeKind::Literal { .. })
    }

    /// Check if this kind is a member of an object-like aggregate
    pub fn is_member(&self) -> bool {
        matches!(
            self,
            TypeKind::Property { .. }
                | TypeKind::PropertySignature { .. }
                | TypeKind::Method { .. }
                | TypeKind::MethodSignature { .. }
                | TypeKind::IndexSignature { .. }
        )
    }

    /// Name of a named member, when it has one
    pub fn member_name(&self) -> Option<&str> {
        match self {
            TypeKind::Property { name, .. }
            | TypeKind::PropertySignature { name, .. }
            | TypeKind::Method { name, .. }
            | TypeKind::MethodSignature { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The ids of the direct children of this kind, in stable order
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            TypeKind::TemplateLiteral { parts } => parts.clone(),
            TypeKind::Array { element } => vec![*element],
            TypeKind::Tuple { members } => members.clone(),
            TypeKind::TupleMember { member, .. } => vec![*member],
            TypeKind::Rest { ty } => vec![*ty],
            TypeKind::ObjectLiteral { members } => members.clone(),
            TypeKind::Class {
                members,
                arguments,
                extends_arguments,
                ..
            } => {
                let mut out = members.clone();
                out.extend(arguments.iter().copied());
                out.extend(extends_arguments.iter().copied());
                out
            }
            TypeKind::Function {
                parameters,
                return_type,
                ..
            }
            | TypeKind::Method {
                parameters,
                return_type,
                ..
            }
            | TypeKind::MethodSignature {
                parameters,
                return_type,
                ..
            } => {
                let mut out = parameters.clone();
                out.push(*return_type);
                out
            }
            TypeKind::Property { ty, .. }
            | TypeKind::PropertySignature { ty, .. }
            | TypeKind::Parameter { ty, .. } => vec![*ty],
            TypeKind::IndexSignature { index, ty } => vec![*index, *ty],
            TypeKind::Union { types } | TypeKind::Intersection { types } => types.clone(),
            TypeKind::Promise { ty } => vec![*ty],
            _ => Vec::new(),
        }
    }
}

/// A type node: the kind plus the cross-cutting fields every variant carries
#[derive(Debug, Clone)]
pub struct TypeNode {
    /// The tagged variant
    pub kind: TypeKind,
    /// Containing node, set on insertion into a container
    pub parent: Option<NodeId>,
    /// Annotation symbol to payloads
    pub annotations: Annotations,
    /// Decorator object-literals lifted out of intersections
    pub decorators: Vec<NodeId>,
    /// Alias or class name this node resolved from
    pub type_name: Option<String>,
    /// Type arguments this node was instantiated with
    pub type_arguments: Vec<NodeId>,
    /// Provenance of an indexed-access result
    pub index_access_origin: Option<IndexAccessOrigin>,
    /// When this node was widened from a literal, the original payload
    pub literal_origin: Option<LiteralValue>,
}

impl TypeNode {
    /// A bare node of the given kind with no metadata
    pub fn new(kind: TypeKind) -> Self {
        TypeNode {
            kind,
            parent: None,
            annotations: Annotations::default(),
            decorators: Vec::new(),
            type_name: None,
            type_arguments: Vec::new(),
            index_access_origin: None,
            literal_origin: None,
        }
    }
}

/// Arena owning every node of the type graphs a processor produces
#[derive(Debug, Default)]
pub struct TypeArena {
    nodes: Vec<TypeNode>,
}

impl TypeArena {
    /// Create an empty arena
    pub fn new() -> Self {
        TypeArena { nodes: Vec::new() }
    }

    /// Number of nodes allocated so far
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a node of the given kind
    pub fn alloc(&mut self, kind: TypeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(TypeNode::new(kind));
        id
    }

    /// Allocate a fully populated node
    pub fn alloc_node(&mut self, node: TypeNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Read a node
    pub fn get(&self, id: NodeId) -> &TypeNode {
        &self.nodes[id.0 as usize]
    }

    /// Mutate a node
    pub fn get_mut(&mut self, id: NodeId) -> &mut TypeNode {
        &mut self.nodes[id.0 as usize]
    }

    /// Shorthand for the node's kind
    pub fn kind(&self, id: NodeId) -> &TypeKind {
        &self.get(id).kind
    }

    /// Set the parent back-pointer of `child`
    pub fn set_parent(&mut self, child: NodeId, parent: NodeId) {
        self.get_mut(child).parent = Some(parent);
    }

    /// Parent every direct child of `parent` onto it
    pub fn link_children(&mut self, parent: NodeId) {
        for child in self.get(parent).kind.children() {
            self.set_parent(child, parent);
        }
    }

    /// Allocate a node and immediately parent its children onto it
    pub fn alloc_linked(&mut self, kind: TypeKind) -> NodeId {
        let id = self.alloc(kind);
        self.link_children(id);
        id
    }

    /// Overwrite `target` with the contents of `source`, preserving the
    /// parent `target` already has. This is the placeholder-patching
    /// primitive: a node handed out early is filled in place once the
    /// producing program completes.
    pub fn patch(&mut self, target: NodeId, source: NodeId) {
        if target == source {
            return;
        }
        let parent = self.get(target).parent;
        let type_name = self.get(target).type_name.clone();
        let type_arguments = self.get(target).type_arguments.clone();
        let mut node = self.get(source).clone();
        node.parent = parent;
        // Identity metadata set on the placeholder (by inlineCall) wins over
        // whatever the resolution carried.
        if type_name.is_some() {
            node.type_name = type_name;
        }
        if !type_arguments.is_empty() {
            node.type_arguments = type_arguments;
        }
        self.nodes[target.0 as usize] = node;
        self.link_children(target);
    }

    /// Deep structural clone of a subgraph, returning the new root.
    /// Cycles are preserved: revisiting a node reuses its copy.
    pub fn deep_clone(&mut self, root: NodeId) -> NodeId {
        let mut mapping: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        let cloned = self.deep_clone_inner(root, &mut mapping);
        self.get_mut(cloned).parent = None;
        cloned
    }

    fn deep_clone_inner(&mut self, id: NodeId, mapping: &mut FxHashMap<NodeId, NodeId>) -> NodeId {
        if let Some(&copy) = mapping.get(&id) {
            return copy;
        }
        let copy = self.alloc_node(self.get(id).clone());
        mapping.insert(id, copy);
        let children = self.get(copy).kind.children();
        let mut replaced = Vec::with_capacity(children.len());
        for child in children {
            replaced.push(self.deep_clone_inner(child, mapping));
        }
        self.replace_children(copy, &replaced);
        self.link_children(copy);
        copy
    }

    /// Rewrite the child slots of `id` with `new_children` (same order and
    /// arity as `TypeKind::children`)
    fn replace_children(&mut self, id: NodeId, new_children: &[NodeId]) {
        let mut it = new_children.iter().copied();
        let mut next = || it.next().expect("child arity preserved");
        match &mut self.nodes[id.0 as usize].kind {
            TypeKind::TemplateLiteral { parts } => {
                for p in parts.iter_mut() {
                    *p = next();
                }
            }
            TypeKind::Array { element } => *element = next(),
            TypeKind::Tuple { members } => {
                for m in members.iter_mut() {
                    *m = next();
                }
            }
            TypeKind::TupleMember { member, .. } => *member = next(),
            TypeKind::Rest { ty } => *ty = next(),
            TypeKind::ObjectLiteral { members } => {
                for m in members.iter_mut() {
                    *m = next();
                }
            }
            TypeKind::Class {
                members,
                arguments,
                extends_arguments,
                ..
            } => {
                for m in members.iter_mut() {
                    *m = next();
                }
                for a in arguments.iter_mut() {
                    *a = next();
                }
                for e in extends_arguments.iter_mut() {
                    *e = next();
                }
            }
            TypeKind::Function {
                parameters,
                return_type,
                ..
            }
            | TypeKind::Method {
                parameters,
                return_type,
                ..
            }
            | TypeKind::MethodSignature {
                parameters,
                return_type,
                ..
            } => {
                for p in parameters.iter_mut() {
                    *p = next();
                }
                *return_type = next();
            }
            TypeKind::Property { ty, .. }
            | TypeKind::PropertySignature { ty, .. }
            | TypeKind::Parameter { ty, .. } => *ty = next(),
            TypeKind::IndexSignature { index, ty } => {
                *index = next();
                *ty = next();
            }
            TypeKind::Union { types } | TypeKind::Intersection { types } => {
                for t in types.iter_mut() {
                    *t = next();
                }
            }
            TypeKind::Promise { ty } => *ty = next(),
            _ => {}
        }
    }

    /// Render a type for humans
    pub fn display(&self, id: NodeId) -> TypeDisplay<'_> {
        TypeDisplay { arena: self, id }
    }
}

/// Structural equality of two type graphs, cycle-safe
///
/// Compares kinds, payloads, names and flags; ignores parents, annotations
/// and diagnostic metadata. Cycles terminate because a node pair under
/// comparison is assumed equal while its children are compared.
pub fn same_type(arena: &TypeArena, a: NodeId, b: NodeId) -> bool {
    let mut visiting = FxHashSet::default();
    same_type_inner(arena, a, b, &mut visiting)
}

fn same_type_inner(
    arena: &TypeArena,
    a: NodeId,
    b: NodeId,
    visiting: &mut FxHashSet<(NodeId, NodeId)>,
) -> bool {
    if a == b {
        return true;
    }
    if !visiting.insert((a, b)) {
        return true;
    }
    let result = same_kind(arena, &arena.get(a).kind, &arena.get(b).kind, visiting);
    visiting.remove(&(a, b));
    result
}

fn same_children(
    arena: &TypeArena,
    a: &[NodeId],
    b: &[NodeId],
    visiting: &mut FxHashSet<(NodeId, NodeId)>,
) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(&x, &y)| same_type_inner(arena, x, y, visiting))
}

fn same_kind(
    arena: &TypeArena,
    a: &TypeKind,
    b: &TypeKind,
    visiting: &mut FxHashSet<(NodeId, NodeId)>,
) -> bool {
    use TypeKind::*;
    match (a, b) {
        (Never, Never)
        | (Any, Any)
        | (Unknown, Unknown)
        | (Void, Void)
        | (Object, Object)
        | (Null, Null)
        | (Undefined, Undefined)
        | (String, String)
        | (Boolean, Boolean)
        | (Bigint, Bigint)
        | (Symbol, Symbol)
        | (Regexp, Regexp) => true,
        (Number { brand: b1 }, Number { brand: b2 }) => b1 == b2,
        (Literal { value: v1 }, Literal { value: v2 }) => v1 == v2,
        (TemplateLiteral { parts: p1 }, TemplateLiteral { parts: p2 }) => {
            same_children(arena, p1, p2, visiting)
        }
        (Array { element: e1 }, Array { element: e2 }) => {
            same_type_inner(arena, *e1, *e2, visiting)
        }
        (Tuple { members: m1 }, Tuple { members: m2 }) => same_children(arena, m1, m2, visiting),
        (
            TupleMember {
                member: t1,
                name: n1,
                optional: o1,
            },
            TupleMember {
                member: t2,
                name: n2,
                optional: o2,
            },
        ) => n1 == n2 && o1 == o2 && same_type_inner(arena, *t1, *t2, visiting),
        (Rest { ty: t1 }, Rest { ty: t2 }) => same_type_inner(arena, *t1, *t2, visiting),
        (ObjectLiteral { members: m1 }, ObjectLiteral { members: m2 }) => {
            same_children(arena, m1, m2, visiting)
        }
        (
            Class {
                class: c1,
                members: m1,
                ..
            },
            Class {
                class: c2,
                members: m2,
                ..
            },
        ) => c1 == c2 && same_children(arena, m1, m2, visiting),
        (Enum { members: m1, .. }, Enum { members: m2, .. }) => m1 == m2,
        (
            EnumMember {
                name: n1,
                default: d1,
            },
            EnumMember {
                name: n2,
                default: d2,
            },
        ) => n1 == n2 && d1 == d2,
        (
            Function {
                parameters: p1,
                return_type: r1,
                ..
            },
            Function {
                parameters: p2,
                return_type: r2,
                ..
            },
        ) => {
            same_children(arena, p1, p2, visiting) && same_type_inner(arena, *r1, *r2, visiting)
        }
        (
            Method {
                name: n1,
                parameters: p1,
                return_type: r1,
                ..
            },
            Method {
                name: n2,
                parameters: p2,
                return_type: r2,
                ..
            },
        )
        | (
            MethodSignature {
                name: n1,
                parameters: p1,
                return_type: r1,
                ..
            },
            MethodSignature {
                name: n2,
                parameters: p2,
                return_type: r2,
                ..
            },
        ) => {
            n1 == n2
                && same_children(arena, p1, p2, visiting)
                && same_type_inner(arena, *r1, *r2, visiting)
        }
        (
            Property {
                name: n1,
                ty: t1,
                optional: o1,
                readonly: ro1,
                ..
            },
            Property {
                name: n2,
                ty: t2,
                optional: o2,
                readonly: ro2,
                ..
            },
        )
        | (
            PropertySignature {
                name: n1,
                ty: t1,
                optional: o1,
                readonly: ro1,
                ..
            },
            PropertySignature {
                name: n2,
                ty: t2,
                optional: o2,
                readonly: ro2,
                ..
            },
        ) => n1 == n2 && o1 == o2 && ro1 == ro2 && same_type_inner(arena, *t1, *t2, visiting),
        (
            IndexSignature {
                index: i1,
                ty: t1,
            },
            IndexSignature {
                index: i2,
                ty: t2,
            },
        ) => {
            same_type_inner(arena, *i1, *i2, visiting) && same_type_inner(arena, *t1, *t2, visiting)
        }
        (
            Parameter {
                name: n1,
                ty: t1,
                optional: o1,
                ..
            },
            Parameter {
                name: n2,
                ty: t2,
                optional: o2,
                ..
            },
        ) => n1 == n2 && o1 == o2 && same_type_inner(arena, *t1, *t2, visiting),
        (Union { types: t1 }, Union { types: t2 })
        | (Intersection { types: t1 }, Intersection { types: t2 }) => {
            same_children(arena, t1, t2, visiting)
        }
        (Promise { ty: t1 }, Promise { ty: t2 }) => same_type_inner(arena, *t1, *t2, visiting),
        (TypeParameter { name: n1 }, TypeParameter { name: n2 }) => n1 == n2,
        (
            Infer {
                frame_offset: f1,
                slot: s1,
            },
            Infer {
                frame_offset: f2,
                slot: s2,
            },
        ) => f1 == f2 && s1 == s2,
        _ => false,
    }
}

/// Borrowed display adapter for a node in an arena
pub struct TypeDisplay<'a> {
    arena: &'a TypeArena,
    id: NodeId,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut seen = FxHashSet::default();
        write_type(f, self.arena, self.id, &mut seen)
    }
}

fn write_type(
    f: &mut fmt::Formatter<'_>,
    arena: &TypeArena,
    id: NodeId,
    seen: &mut FxHashSet<NodeId>,
) -> fmt::Result {
    if !seen.insert(id) {
        // Recursive reference: fall back to the name, if any.
        if let Some(name) = &arena.get(id).type_name {
            return write!(f, "{}", name);
        }
        return write!(f, "...");
    }
    let result = write_type_inner(f, arena, id, seen);
    seen.remove(&id);
    result
}

fn write_list(
    f: &mut fmt::Formatter<'_>,
    arena: &TypeArena,
    ids: &[NodeId],
    sep: &str,
    seen: &mut FxHashSet<NodeId>,
) -> fmt::Result {
    for (i, &id) in ids.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write_type(f, arena, id, seen)?;
    }
    Ok(())
}

fn write_type_inner(
    f: &mut fmt::Formatter<'_>,
    arena: &TypeArena,
    id: NodeId,
    seen: &mut FxHashSet<NodeId>,
) -> fmt::Result {
    let node = arena.get(id);
    match &node.kind {
        TypeKind::Literal { value } => match value {
            LiteralValue::String(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other.to_display_string()),
        },
        TypeKind::TemplateLiteral { parts } => {
            write!(f, "`")?;
            for &part in parts {
                match &arena.get(part).kind {
                    TypeKind::Literal { value } => write!(f, "{}", value.to_display_string())?,
                    other => write!(f, "${{{}}}", other.name())?,
                }
            }
            write!(f, "`")
        }
        TypeKind::Array { element } => {
            write_type(f, arena, *element, seen)?;
            write!(f, "[]")
        }
        TypeKind::Tuple { members } => {
            write!(f, "[")?;
            write_list(f, arena, members, ", ", seen)?;
            write!(f, "]")
        }
        TypeKind::TupleMember {
            member,
            name,
            optional,
        } => {
            if let Some(name) = name {
                write!(f, "{}{}: ", name, if *optional { "?" } else { "" })?;
                write_type(f, arena, *member, seen)
            } else {
                write_type(f, arena, *member, seen)
            }
        }
        TypeKind::Rest { ty } => {
            write!(f, "...")?;
            write_type(f, arena, *ty, seen)
        }
        TypeKind::ObjectLiteral { members } => {
            write!(f, "{{")?;
            write_list(f, arena, members, "; ", seen)?;
            write!(f, "}}")
        }
        TypeKind::Class { class, .. } => {
            let name = node
                .type_name
                .as_deref()
                .or(match class {
                    ClassRef::Builtin(b) => Some(b.name()),
                    _ => None,
                })
                .unwrap_or("class");
            write!(f, "{}", name)?;
            if !node.type_arguments.is_empty() {
                write!(f, "<")?;
                write_list(f, arena, &node.type_arguments, ", ", seen)?;
                write!(f, ">")?;
            }
            Ok(())
        }
        TypeKind::Enum { members, .. } => {
            write!(f, "enum {{")?;
            for (i, (name, _)) in members.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", name)?;
            }
            write!(f, "}}")
        }
        TypeKind::EnumMember { name, .. } => write!(f, "{}", name),
        TypeKind::Function {
            parameters,
            return_type,
            ..
        }
        | TypeKind::Method {
            parameters,
            return_type,
            ..
        }
        | TypeKind::MethodSignature {
            parameters,
            return_type,
            ..
        } => {
            if let Some(name) = node.kind.member_name() {
                write!(f, "{}", name)?;
            }
            write!(f, "(")?;
            write_list(f, arena, parameters, ", ", seen)?;
            write!(f, ") => ")?;
            write_type(f, arena, *return_type, seen)
        }
        TypeKind::Property {
            name,
            ty,
            optional,
            readonly,
            ..
        }
        | TypeKind::PropertySignature {
            name,
            ty,
            optional,
            readonly,
            ..
        } => {
            if *readonly {
                write!(f, "readonly ")?;
            }
            write!(f, "{}{}: ", name, if *optional { "?" } else { "" })?;
            write_type(f, arena, *ty, seen)
        }
        TypeKind::IndexSignature { index, ty } => {
            write!(f, "[index: ")?;
            write_type(f, arena, *index, seen)?;
            write!(f, "]: ")?;
            write_type(f, arena, *ty, seen)
        }
        TypeKind::Parameter { name, ty, .. } => {
            write!(f, "{}: ", name)?;
            write_type(f, arena, *ty, seen)
        }
        TypeKind::Union { types } => write_list(f, arena, types, " | ", seen),
        TypeKind::Intersection { types } => write_list(f, arena, types, " & ", seen),
        TypeKind::Promise { ty } => {
            write!(f, "Promise<")?;
            write_type(f, arena, *ty, seen)?;
            write!(f, ">")
        }
        TypeKind::TypeParameter { name } => write!(f, "{}", name),
        TypeKind::Infer { .. } => write!(f, "infer"),
        other => write!(f, "{}", other.name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_parent_link() {
        let mut arena = TypeArena::new();
        let elem = arena.alloc(TypeKind::String);
        let arr = arena.alloc_linked(TypeKind::Array { element: elem });
        assert_eq!(arena.get(elem).parent, Some(arr));
        assert!(arena.get(arr).parent.is_none());
    }

    #[test]
    fn test_same_type_primitives_and_literals() {
        let mut arena = TypeArena::new();
        let s1 = arena.alloc(TypeKind::String);
        let s2 = arena.alloc(TypeKind::String);
        let n = arena.alloc(TypeKind::Number { brand: None });
        let l1 = arena.alloc(TypeKind::Literal {
            value: LiteralValue::String("a".into()),
        });
        let l2 = arena.alloc(TypeKind::Literal {
            value: LiteralValue::String("a".into()),
        });
        let l3 = arena.alloc(TypeKind::Literal {
            value: LiteralValue::String("b".into()),
        });
        assert!(same_type(&arena, s1, s2));
        assert!(!same_type(&arena, s1, n));
        assert!(same_type(&arena, l1, l2));
        assert!(!same_type(&arena, l1, l3));
    }

    #[test]
    fn test_same_type_cyclic() {
        // Two independently built `interface A { next: A }` graphs compare equal.
        let mut arena = TypeArena::new();
        let build = |arena: &mut TypeArena| {
            let obj = arena.alloc(TypeKind::ObjectLiteral { members: vec![] });
            let prop = arena.alloc(TypeKind::PropertySignature {
                name: "next".into(),
                ty: obj,
                optional: false,
                readonly: false,
                description: None,
            });
            arena.get_mut(obj).kind = TypeKind::ObjectLiteral {
                members: vec![prop],
            };
            arena.link_children(obj);
            obj
        };
        let a = build(&mut arena);
        let b = build(&mut arena);
        assert!(same_type(&arena, a, b));
    }

    #[test]
    fn test_patch_preserves_parent() {
        let mut arena = TypeArena::new();
        let container = arena.alloc(TypeKind::ObjectLiteral { members: vec![] });
        let placeholder = arena.alloc(TypeKind::Unknown);
        arena.set_parent(placeholder, container);
        let source = arena.alloc(TypeKind::String);
        arena.patch(placeholder, source);
        assert!(matches!(arena.kind(placeholder), TypeKind::String));
        assert_eq!(arena.get(placeholder).parent, Some(container));
    }

    #[test]
    fn test_deep_clone_preserves_cycles() {
        let mut arena = TypeArena::new();
        let obj = arena.alloc(TypeKind::ObjectLiteral { members: vec![] });
        let prop = arena.alloc(TypeKind::PropertySignature {
            name: "next".into(),
            ty: obj,
            optional: false,
            readonly: false,
            description: None,
        });
        arena.get_mut(obj).kind = TypeKind::ObjectLiteral {
            members: vec![prop],
        };
        arena.link_children(obj);

        let copy = arena.deep_clone(obj);
        assert_ne!(copy, obj);
        assert!(same_type(&arena, copy, obj));
        // The copied property points at the copied object, not the original.
        let TypeKind::ObjectLiteral { members } = arena.kind(copy) else {
            panic!("expected object literal");
        };
        let TypeKind::PropertySignature { ty, .. } = arena.kind(members[0]) else {
            panic!("expected property signature");
        };
        assert_eq!(*ty, copy);
    }

    #[test]
    fn test_display() {
        let mut arena = TypeArena::new();
        let s = arena.alloc(TypeKind::String);
        let l = arena.alloc(TypeKind::Literal {
            value: LiteralValue::Number(42.0),
        });
        let u = arena.alloc_linked(TypeKind::Union { types: vec![s, l] });
        assert_eq!(format!("{}", arena.display(u)), "string | 42");

        let elem = arena.alloc(TypeKind::Boolean);
        let arr = arena.alloc_linked(TypeKind::Array { element: elem });
        assert_eq!(format!("{}", arena.display(arr)), "boolean[]");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(-3.0), "-3");
    }
}
