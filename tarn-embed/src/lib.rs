// tarn-embed - Embedding API for the Tarn programming language
// Copyright (c) 2026 Tarn contributors. MIT licensed.

//! # tarn-embed
//!
//! A high-level embedding API for the Tarn programming language.
//!
//! This crate wires the parser, compiler, and VM together behind an
//! [`Engine`] with persistent state, a one-shot [`run`] façade, and the
//! default builtin set.
//!
//! ## Quick Start
//!
//! ```rust
//! use tarn_embed::run;
//!
//! let result = run("func add(a, b) { return a + b }; add(40, 2)").unwrap();
//! println!("{}", result); // 42
//! ```
//!
//! ## Registering Host Functions
//!
//! ```rust
//! use tarn_embed::{Engine, Value};
//!
//! let mut engine = Engine::new();
//! engine
//!     .register_builtin("greet", |_ctx, args| match args {
//!         [Value::String(name)] => Value::string(format!("Hello, {}!", name)),
//!         _ => Value::string("Hello, World!"),
//!     })
//!     .unwrap();
//! let result = engine.eval("greet(\"Tarn\")").unwrap();
//! assert_eq!(result.to_string(), "\"Hello, Tarn!\"");
//! ```

mod builtins;
mod engine;

pub use builtins::{default_builtins, default_globals};
pub use engine::{Engine, Error, Result, run};

// Re-export core types for convenience
pub use tarn_syntax::{ParseError, Parser};
pub use tarn_vm::{CompileError, Context, RuntimeError, Value, Vm};
