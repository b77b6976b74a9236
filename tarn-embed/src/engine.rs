// tarn-embed - Embedding API for the Tarn programming language
// Copyright (c) 2026 Tarn contributors. MIT licensed.

//! The Engine struct - main entry point for embedding Tarn.

use std::fmt;
use std::path::Path;
use std::rc::Rc;

use tarn_syntax::ParseError;
use tarn_vm::compiler::{CompileError, Compiler, Options, Scope};
use tarn_vm::{Context, RuntimeError, Value, Vm};

use crate::builtins::{default_builtins, default_globals};

/// An error from any stage of the parse → compile → execute pipeline.
#[derive(Debug)]
pub enum Error {
    Parse(ParseError),
    Compile(CompileError),
    Runtime(RuntimeError),
    Io { path: String, message: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "{}", e),
            Error::Compile(e) => write!(f, "compile error: {}", e),
            Error::Runtime(e) => write!(f, "runtime error: {}", e),
            Error::Io { path, message } => write!(f, "error reading {:?}: {}", path, message),
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<CompileError> for Error {
    fn from(e: CompileError) -> Self {
        Error::Compile(e)
    }
}

impl From<RuntimeError> for Error {
    fn from(e: RuntimeError) -> Self {
        Error::Runtime(e)
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The Tarn scripting engine.
///
/// `Engine` compiles and runs source text, carrying globals and declared
/// names across `eval` calls so it can back a REPL.
///
/// # Thread Safety
///
/// **`Engine` is NOT thread-safe.** Values use `Rc` internally; create one
/// engine per thread. The cancellation [`Context`] returned by
/// [`Engine::context`] IS safe to share with other threads.
///
/// # Example
///
/// ```rust
/// use tarn_embed::Engine;
///
/// let mut engine = Engine::new();
/// engine.eval("var x = 40").unwrap();
/// let result = engine.eval("x + 2").unwrap();
/// assert_eq!(result.to_string(), "42");
/// ```
pub struct Engine {
    scope: Option<Rc<Scope>>,
    globals: Vec<Value>,
    builtins: Vec<(String, Value)>,
    modules: Vec<(String, Value)>,
    context: Context,
}

impl Engine {
    /// Create a new engine with the default builtins and host modules.
    pub fn new() -> Self {
        Engine {
            scope: None,
            globals: Vec::new(),
            builtins: default_builtins(),
            modules: default_globals(),
            context: Context::new(),
        }
    }

    /// Create a new engine without any builtins or modules. Useful for
    /// sandboxed environments providing their own function set.
    pub fn new_bare() -> Self {
        Engine {
            scope: None,
            globals: Vec::new(),
            builtins: Vec::new(),
            modules: Vec::new(),
            context: Context::new(),
        }
    }

    /// The engine's cancellation context. Hand a clone to another thread and
    /// call [`Context::cancel`] to abort a running program: the next builtin
    /// invocation observes the flag and the VM returns an error.
    pub fn context(&self) -> Context {
        self.context.clone()
    }

    /// Register a host function.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tarn_embed::{Engine, Value};
    ///
    /// let mut engine = Engine::new();
    /// engine
    ///     .register_builtin("double", |_ctx, args| match args {
    ///         [Value::Int(n)] => Value::Int(n * 2),
    ///         _ => Value::error("double expects one int"),
    ///     })
    ///     .unwrap();
    /// assert_eq!(engine.eval("double(21)").unwrap(), Value::Int(42));
    /// ```
    pub fn register_builtin(
        &mut self,
        name: &str,
        func: impl Fn(&Context, &[Value]) -> Value + 'static,
    ) -> Result<()> {
        let value = Value::builtin(name.to_string(), func);
        match &self.scope {
            // Already compiling against a live symbol table: insert there so
            // the next eval sees it.
            Some(scope) => {
                scope.symbols.insert_builtin(name, value)?;
            }
            None => self.builtins.push((name.to_string(), value)),
        }
        Ok(())
    }

    /// Evaluate source text, returning the value left on top of the stack
    /// (nil when the program leaves nothing).
    ///
    /// Globals persist between calls:
    ///
    /// ```rust
    /// use tarn_embed::Engine;
    ///
    /// let mut engine = Engine::new();
    /// engine.eval("var total = 0").unwrap();
    /// engine.eval("total += 40").unwrap();
    /// assert_eq!(engine.eval("total + 2").unwrap().to_string(), "42");
    /// ```
    pub fn eval(&mut self, source: &str) -> Result<Value> {
        let program = tarn_syntax::parse(source)?;

        let options = match &self.scope {
            Some(scope) => Options {
                scope: Some(scope.clone()),
                ..Options::default()
            },
            None => Options {
                name: "main".to_string(),
                builtins: self.builtins.clone(),
                globals: self.modules.clone(),
                scope: None,
            },
        };
        let start = self
            .scope
            .as_ref()
            .map(|scope| scope.instructions.len())
            .unwrap_or(0);

        let mut compiler = Compiler::new(options)?;
        let scope = compiler.compile(&program)?;

        let mut vm = Vm::new(scope.clone());
        vm.set_context(self.context.clone());
        if self.scope.is_some() {
            vm.restore_globals(std::mem::take(&mut self.globals));
        }

        let result = vm.run_from(start);
        let top = vm.top();
        self.globals = vm.into_globals();
        self.scope = Some(scope);
        result?;
        Ok(top.unwrap_or(Value::Nil))
    }

    /// Evaluate a file of Tarn source.
    pub fn eval_file(&mut self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| Error::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        self.eval(&source)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

/// Parse, compile, and execute a program, returning its final value.
///
/// ```rust
/// use tarn_embed::run;
///
/// assert_eq!(run("var x = 1 + 2 * 3; x").unwrap().to_string(), "7");
/// ```
pub fn run(source: &str) -> Result<Value> {
    Engine::new().eval(source)
}
