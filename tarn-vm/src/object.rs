// tarn-vm - Bytecode compiler and virtual machine for the Tarn programming language
// Copyright (c) 2026 Tarn contributors. MIT licensed.

//! Core value type for Tarn.
//!
//! `Value` is the central enum representing all Tarn runtime values. Values
//! are cheap to clone: strings and callables are reference counted, and the
//! container types use persistent collections with structural sharing.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use im::{OrdMap, OrdSet, Vector};

use crate::compiler::Scope;
use crate::vm::RuntimeError;

/// Execution context threaded to every builtin invocation.
///
/// The host cancels a running program by calling [`Context::cancel`] from
/// another thread; builtins observe the flag and return an error value,
/// which aborts the dispatch loop.
#[derive(Clone, Debug, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
}

impl Context {
    /// Create a new, non-cancelled context.
    pub fn new() -> Self {
        Context::default()
    }

    /// Signal cancellation. Safe to call from any thread.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Check whether the context has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Returns an error value if the context has been cancelled.
    ///
    /// Builtins call this on entry: `if let Some(err) = ctx.guard() { return err; }`
    pub fn guard(&self) -> Option<Value> {
        if self.is_cancelled() {
            Some(Value::error("operation cancelled"))
        } else {
            None
        }
    }
}

/// Signature of a native function.
pub type BuiltinFn = dyn Fn(&Context, &[Value]) -> Value;

/// A native function callable from Tarn code.
///
/// Builtins never panic and never raise: failures are reported by returning
/// a [`Value::Error`], which the VM treats like any other runtime error.
#[derive(Clone)]
pub struct Builtin {
    name: Rc<str>,
    func: Rc<BuiltinFn>,
}

impl Builtin {
    /// Create a new builtin with the given name.
    pub fn new(name: impl Into<Rc<str>>, func: impl Fn(&Context, &[Value]) -> Value + 'static) -> Self {
        Builtin {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    /// The builtin's name, for display and error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the builtin.
    pub fn call(&self, ctx: &Context, args: &[Value]) -> Value {
        (self.func)(ctx, args)
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

/// A compiled function: parameters, pre-folded default values, and the
/// sealed compilation scope holding its bytecode and constants.
#[derive(Debug)]
pub struct CompiledFunction {
    /// Function name; empty for anonymous functions.
    pub name: Rc<str>,
    /// Parameter names in declaration order.
    pub params: Vec<Rc<str>>,
    /// Default value per parameter, `None` where the parameter is required.
    pub defaults: Vec<Option<Value>>,
    /// The sealed scope compiled from the function body.
    pub scope: Rc<Scope>,
}

impl CompiledFunction {
    /// Whether the function was declared with a name. Named functions get an
    /// extra local slot holding the function itself, enabling recursion.
    pub fn is_named(&self) -> bool {
        self.scope.is_named
    }

    /// The function's instruction stream.
    pub fn instructions(&self) -> &[u8] {
        &self.scope.instructions
    }
}

/// A compiled function bound to the cells of its free variables.
#[derive(Debug)]
pub struct Closure {
    pub function: Rc<CompiledFunction>,
    pub free: Vec<Cell>,
}

/// A heap slot holding one value, shared between the frame that declares a
/// captured variable and every closure capturing it.
#[derive(Clone, Debug)]
pub struct Cell(Rc<RefCell<Value>>);

impl Cell {
    /// Create a new cell containing the given value.
    pub fn new(value: Value) -> Self {
        Cell(Rc::new(RefCell::new(value)))
    }

    /// Read the cell's value.
    pub fn get(&self) -> Value {
        self.0.borrow().clone()
    }

    /// Replace the cell's value.
    pub fn set(&self, value: Value) {
        *self.0.borrow_mut() = value;
    }

    fn ptr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

/// A propagable failure produced by a builtin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorValue {
    pub message: String,
}

/// A named bag of exported values, used to group host functions.
#[derive(Debug)]
pub struct Module {
    pub name: Rc<str>,
    pub attrs: OrdMap<Rc<str>, Value>,
}

/// A Tarn runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    /// The nil value, representing nothing/absence.
    Nil,
    /// Boolean true or false.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// Immutable string.
    String(Rc<str>),
    /// Ordered sequence (persistent, structural sharing).
    List(Vector<Value>),
    /// String-keyed mapping (persistent, structural sharing).
    Map(OrdMap<Rc<str>, Value>),
    /// Unordered set (persistent, structural sharing).
    Set(OrdSet<Value>),
    /// Native function.
    Builtin(Builtin),
    /// Bytecode function without captured variables.
    Function(Rc<CompiledFunction>),
    /// Bytecode function bound to captured cells.
    Closure(Rc<Closure>),
    /// Shared mutable slot used for closure capture.
    Cell(Cell),
    /// Propagable failure.
    Error(Rc<ErrorValue>),
    /// Named collection of host values.
    Module(Rc<Module>),
}

impl Value {
    /// Create an integer value.
    #[inline]
    pub fn int(n: i64) -> Self {
        Value::Int(n)
    }

    /// Create a float value.
    #[inline]
    pub fn float(n: f64) -> Self {
        Value::Float(n)
    }

    /// Create a string value.
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Value::String(s.into())
    }

    /// Create a list from elements.
    pub fn list(elements: Vec<Value>) -> Self {
        Value::List(elements.into_iter().collect())
    }

    /// Create a map from key/value pairs.
    pub fn map(pairs: Vec<(Rc<str>, Value)>) -> Self {
        Value::Map(pairs.into_iter().collect())
    }

    /// Create a set from elements.
    pub fn set(elements: Vec<Value>) -> Self {
        Value::Set(elements.into_iter().collect())
    }

    /// Create a builtin function value.
    pub fn builtin(name: impl Into<Rc<str>>, func: impl Fn(&Context, &[Value]) -> Value + 'static) -> Self {
        Value::Builtin(Builtin::new(name, func))
    }

    /// Create an error value.
    pub fn error(message: impl Into<String>) -> Self {
        Value::Error(Rc::new(ErrorValue {
            message: message.into(),
        }))
    }

    /// Create a module value from its exported attributes.
    pub fn module(name: impl Into<Rc<str>>, attrs: Vec<(&str, Value)>) -> Self {
        Value::Module(Rc::new(Module {
            name: name.into(),
            attrs: attrs.into_iter().map(|(k, v)| (Rc::from(k), v)).collect(),
        }))
    }

    /// Check if this value is nil.
    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Check if this value is truthy. Nil, false, zero numbers, and empty
    /// strings/containers are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::Set(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Get the type name as a string.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Builtin(_) => "builtin",
            Value::Function(_) => "function",
            Value::Closure(_) => "function",
            Value::Cell(_) => "cell",
            Value::Error(_) => "error",
            Value::Module(_) => "module",
        }
    }

    /// Look up an attribute by name.
    ///
    /// Container and string values expose a small method set; modules expose
    /// their exported values. Returns `None` when the attribute is absent.
    pub fn attr(&self, name: &str) -> Option<Value> {
        match self {
            Value::String(s) => string_attr(s, name),
            Value::List(l) => list_attr(l, name),
            Value::Map(m) => map_attr(m, name),
            Value::Set(s) => set_attr(s, name),
            Value::Module(m) => m.attrs.get(name).cloned(),
            _ => None,
        }
    }

    /// Index the value: `self[index]`.
    pub fn get_item(&self, index: &Value) -> Result<Value, RuntimeError> {
        match self {
            Value::List(items) => {
                let i = subscript_index(index, items.len())?;
                Ok(items[i].clone())
            }
            Value::Map(map) => match index {
                Value::String(key) => map
                    .get(key)
                    .cloned()
                    .ok_or_else(|| RuntimeError::KeyNotFound(key.to_string())),
                other => Err(RuntimeError::type_error("string", other.type_name())),
            },
            Value::String(s) => {
                let chars: Vec<char> = s.chars().collect();
                let i = subscript_index(index, chars.len())?;
                Ok(Value::string(chars[i].to_string()))
            }
            other => Err(RuntimeError::NotAContainer(other.type_name().to_string())),
        }
    }

    /// Check whether the value contains the given element.
    pub fn contains(&self, element: &Value) -> Result<bool, RuntimeError> {
        match self {
            Value::List(items) => Ok(items.iter().any(|v| v == element)),
            Value::Set(set) => Ok(set.contains(element)),
            Value::Map(map) => match element {
                Value::String(key) => Ok(map.contains_key(key)),
                _ => Ok(false),
            },
            Value::String(s) => match element {
                Value::String(needle) => Ok(s.contains(needle.as_ref())),
                other => Err(RuntimeError::type_error("string", other.type_name())),
            },
            other => Err(RuntimeError::NotAContainer(other.type_name().to_string())),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Nil => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::String(_) => 4,
            Value::List(_) => 5,
            Value::Map(_) => 6,
            Value::Set(_) => 7,
            Value::Builtin(_) => 8,
            Value::Function(_) => 9,
            Value::Closure(_) => 10,
            Value::Cell(_) => 11,
            Value::Error(_) => 12,
            Value::Module(_) => 13,
        }
    }
}

/// Resolve an Int subscript against a sequence length, supporting negative
/// indices counted from the end.
fn subscript_index(index: &Value, length: usize) -> Result<usize, RuntimeError> {
    let i = match index {
        Value::Int(i) => *i,
        other => return Err(RuntimeError::type_error("int", other.type_name())),
    };
    let resolved = if i < 0 { i + length as i64 } else { i };
    if resolved < 0 || resolved as usize >= length {
        return Err(RuntimeError::IndexOutOfBounds { index: i, length });
    }
    Ok(resolved as usize)
}

fn arity_error(name: &str, expected: usize, got: usize) -> Value {
    Value::error(format!(
        "wrong number of arguments to {}: expected {}, got {}",
        name, expected, got
    ))
}

fn string_attr(s: &Rc<str>, name: &str) -> Option<Value> {
    let recv = Rc::clone(s);
    match name {
        "to_upper" => Some(Value::builtin("string.to_upper", move |_, args| {
            if !args.is_empty() {
                return arity_error("to_upper", 0, args.len());
            }
            Value::string(recv.to_uppercase())
        })),
        "to_lower" => Some(Value::builtin("string.to_lower", move |_, args| {
            if !args.is_empty() {
                return arity_error("to_lower", 0, args.len());
            }
            Value::string(recv.to_lowercase())
        })),
        "trim" => Some(Value::builtin("string.trim", move |_, args| {
            if !args.is_empty() {
                return arity_error("trim", 0, args.len());
            }
            Value::string(recv.trim().to_string())
        })),
        "contains" => Some(Value::builtin("string.contains", move |_, args| {
            match args {
                [Value::String(needle)] => Value::Bool(recv.contains(needle.as_ref())),
                [other] => Value::error(format!("contains expects a string, got {}", other.type_name())),
                _ => arity_error("contains", 1, args.len()),
            }
        })),
        "has_prefix" => Some(Value::builtin("string.has_prefix", move |_, args| {
            match args {
                [Value::String(prefix)] => Value::Bool(recv.starts_with(prefix.as_ref())),
                [other] => Value::error(format!("has_prefix expects a string, got {}", other.type_name())),
                _ => arity_error("has_prefix", 1, args.len()),
            }
        })),
        "has_suffix" => Some(Value::builtin("string.has_suffix", move |_, args| {
            match args {
                [Value::String(suffix)] => Value::Bool(recv.ends_with(suffix.as_ref())),
                [other] => Value::error(format!("has_suffix expects a string, got {}", other.type_name())),
                _ => arity_error("has_suffix", 1, args.len()),
            }
        })),
        "split" => Some(Value::builtin("string.split", move |_, args| {
            match args {
                [Value::String(sep)] => Value::list(
                    recv.split(sep.as_ref())
                        .map(|piece| Value::string(piece.to_string()))
                        .collect(),
                ),
                [other] => Value::error(format!("split expects a string, got {}", other.type_name())),
                _ => arity_error("split", 1, args.len()),
            }
        })),
        _ => None,
    }
}

fn list_attr(l: &Vector<Value>, name: &str) -> Option<Value> {
    let recv = l.clone();
    match name {
        "contains" => Some(Value::builtin("list.contains", move |_, args| {
            match args {
                [element] => Value::Bool(recv.iter().any(|v| v == element)),
                _ => arity_error("contains", 1, args.len()),
            }
        })),
        _ => None,
    }
}

fn map_attr(m: &OrdMap<Rc<str>, Value>, name: &str) -> Option<Value> {
    match name {
        "keys" => {
            let recv = m.clone();
            Some(Value::builtin("map.keys", move |_, args| {
                if !args.is_empty() {
                    return arity_error("keys", 0, args.len());
                }
                Value::list(recv.keys().map(|k| Value::String(Rc::clone(k))).collect())
            }))
        }
        "values" => {
            let recv = m.clone();
            Some(Value::builtin("map.values", move |_, args| {
                if !args.is_empty() {
                    return arity_error("values", 0, args.len());
                }
                Value::list(recv.values().cloned().collect())
            }))
        }
        "get" => {
            let recv = m.clone();
            Some(Value::builtin("map.get", move |_, args| match args {
                [Value::String(key)] => recv.get(key).cloned().unwrap_or(Value::Nil),
                [Value::String(key), default] => recv.get(key).cloned().unwrap_or_else(|| default.clone()),
                [other, ..] => Value::error(format!("get expects a string key, got {}", other.type_name())),
                _ => arity_error("get", 1, args.len()),
            }))
        }
        "contains" => {
            let recv = m.clone();
            Some(Value::builtin("map.contains", move |_, args| match args {
                [Value::String(key)] => Value::Bool(recv.contains_key(key)),
                [_] => Value::Bool(false),
                _ => arity_error("contains", 1, args.len()),
            }))
        }
        _ => None,
    }
}

fn set_attr(s: &OrdSet<Value>, name: &str) -> Option<Value> {
    let recv = s.clone();
    match name {
        "contains" => Some(Value::builtin("set.contains", move |_, args| {
            match args {
                [element] => Value::Bool(recv.contains(element)),
                _ => arity_error("contains", 1, args.len()),
            }
        })),
        _ => None,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Builtin(a), Value::Builtin(b)) => {
                std::ptr::eq(Rc::as_ptr(&a.func) as *const (), Rc::as_ptr(&b.func) as *const ())
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Cell(a), Value::Cell(b)) => a.ptr() == b.ptr(),
            (Value::Error(a), Value::Error(b)) => a.message == b.message,
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// Total order so values can key ordered sets. The order across types is by
// type rank and carries no language-level meaning; ordering comparisons in
// Tarn programs go through CompareOp, which is stricter.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.cmp(b),
            (Value::Set(a), Value::Set(b)) => a.cmp(b),
            (Value::Builtin(a), Value::Builtin(b)) => {
                (Rc::as_ptr(&a.func) as *const () as usize).cmp(&(Rc::as_ptr(&b.func) as *const () as usize))
            }
            (Value::Function(a), Value::Function(b)) => Rc::as_ptr(a).cmp(&Rc::as_ptr(b)),
            (Value::Closure(a), Value::Closure(b)) => Rc::as_ptr(a).cmp(&Rc::as_ptr(b)),
            (Value::Cell(a), Value::Cell(b)) => a.ptr().cmp(&b.ptr()),
            (Value::Error(a), Value::Error(b)) => a.message.cmp(&b.message),
            (Value::Module(a), Value::Module(b)) => Rc::as_ptr(a).cmp(&Rc::as_ptr(b)),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s.as_ref()),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", k.as_ref(), v)?;
                }
                write!(f, "}}")
            }
            Value::Set(set) => {
                write!(f, "{{")?;
                for (i, item) in set.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
            Value::Builtin(b) => write!(f, "<builtin {}>", b.name),
            Value::Function(func) => {
                if func.name.is_empty() {
                    write!(f, "<function>")
                } else {
                    write!(f, "<function {}>", func.name)
                }
            }
            Value::Closure(c) => {
                if c.function.name.is_empty() {
                    write!(f, "<function>")
                } else {
                    write!(f, "<function {}>", c.function.name)
                }
            }
            Value::Cell(c) => write!(f, "<cell {}>", c.get()),
            Value::Error(e) => write!(f, "<error: {}>", e.message),
            Value::Module(m) => write!(f, "<module {}>", m.name),
        }
    }
}
