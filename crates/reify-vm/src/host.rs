//! Host interop: opaque handles to classes and functions, runtime values
//!
//! The VM talks to the host program through a deliberately narrow trait: a
//! reflection target exposes its packed type program, its name, and its
//! deferred decorator records. Everything else the host may be stays opaque.

use std::fmt;
use std::rc::Rc;

use crate::packed::Packed;

/// A host artefact the VM can reflect: a class, a function, or anything
/// else that carries a packed type program
pub trait ReflectTarget {
    /// The packed type program attached to this artefact, if any
    fn type_program(&self) -> Option<Rc<Packed>>;

    /// The artefact's name, when it has one
    fn name(&self) -> Option<&str>;

    /// Deferred decorator records applied after the class program terminates
    fn decorators(&self) -> &[DecoratorRecord] {
        &[]
    }
}

/// What a decorator record targets on its class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoratorTarget {
    /// The named property itself
    Property,
    /// One parameter of the named method
    Parameter(usize),
}

/// A deferred decorator application captured on a host class
#[derive(Clone)]
pub struct DecoratorRecord {
    /// The member name the decorator was applied to
    pub property: String,
    /// Property or method-parameter target
    pub target: DecoratorTarget,
    /// The validator function to append to the `validation` annotation
    pub validator: Value,
}

impl fmt::Debug for DecoratorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoratorRecord")
            .field("property", &self.property)
            .field("target", &self.target)
            .finish()
    }
}

/// A plain host class handle
pub struct HostClass {
    name: String,
    program: Option<Rc<Packed>>,
    decorators: Vec<DecoratorRecord>,
}

impl HostClass {
    /// A class carrying a packed type program
    pub fn new(name: impl Into<String>, program: Rc<Packed>) -> Rc<HostClass> {
        Rc::new(HostClass {
            name: name.into(),
            program: Some(program),
            decorators: Vec::new(),
        })
    }

    /// A class without a type program (reflecting it fails)
    pub fn untyped(name: impl Into<String>) -> Rc<HostClass> {
        Rc::new(HostClass {
            name: name.into(),
            program: None,
            decorators: Vec::new(),
        })
    }

    /// A class with deferred decorator records
    pub fn with_decorators(
        name: impl Into<String>,
        program: Rc<Packed>,
        decorators: Vec<DecoratorRecord>,
    ) -> Rc<HostClass> {
        Rc::new(HostClass {
            name: name.into(),
            program: Some(program),
            decorators,
        })
    }
}

impl ReflectTarget for HostClass {
    fn type_program(&self) -> Option<Rc<Packed>> {
        self.program.clone()
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn decorators(&self) -> &[DecoratorRecord] {
        &self.decorators
    }
}

/// A plain host function handle
pub struct HostFunction {
    name: Option<String>,
    program: Option<Rc<Packed>>,
}

impl HostFunction {
    /// A function carrying a packed type program
    pub fn new(name: impl Into<String>, program: Rc<Packed>) -> Rc<HostFunction> {
        Rc::new(HostFunction {
            name: Some(name.into()),
            program: Some(program),
        })
    }

    /// A function with no attached program (inferred as `(...) => any`)
    pub fn untyped(name: impl Into<String>) -> Rc<HostFunction> {
        Rc::new(HostFunction {
            name: Some(name.into()),
            program: None,
        })
    }
}

impl ReflectTarget for HostFunction {
    fn type_program(&self) -> Option<Rc<Packed>> {
        self.program.clone()
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// A runtime value of the host program, as the value inferer sees it
#[derive(Clone)]
pub enum Value {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// A boolean
    Boolean(bool),
    /// A number
    Number(f64),
    /// A bigint, kept as its decimal spelling
    BigInt(String),
    /// A string
    String(String),
    /// A regular expression, kept as its source text
    Regex(String),
    /// A `Date`, as epoch milliseconds
    Date(f64),
    /// An array of values
    Array(Vec<Value>),
    /// A `Set` of values
    Set(Vec<Value>),
    /// A `Map` of key/value pairs
    Map(Vec<(Value, Value)>),
    /// A plain object with enumerable string keys
    Object(Vec<(String, Value)>),
    /// A function or class handle
    Function(Rc<dyn ReflectTarget>),
    /// An instance of a host class
    Instance {
        /// The constructing class
        class: Rc<dyn ReflectTarget>,
        /// Enumerable fields
        fields: Vec<(String, Value)>,
    },
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::BigInt(s) => write!(f, "{}n", s),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Regex(s) => write!(f, "/{}/", s),
            Value::Date(ms) => write!(f, "Date({})", ms),
            Value::Array(items) => f.debug_list().entries(items).finish(),
            Value::Set(items) => f.debug_set().entries(items).finish(),
            Value::Map(pairs) => f.debug_map().entries(pairs.iter().map(|(k, v)| (k, v))).finish(),
            Value::Object(fields) => f
                .debug_map()
                .entries(fields.iter().map(|(k, v)| (k, v)))
                .finish(),
            Value::Function(target) => {
                write!(f, "fn {}", target.name().unwrap_or("<anonymous>"))
            }
            Value::Instance { class, .. } => {
                write!(f, "instance of {}", class.name().unwrap_or("<anonymous>"))
            }
        }
    }
}
