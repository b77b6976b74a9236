// tarn-vm - Bytecode compiler and virtual machine for the Tarn programming language
// Copyright (c) 2026 Tarn contributors. MIT licensed.

//! Bytecode compiler and stack-based virtual machine for Tarn.
//!
//! The compiler walks the AST produced by `tarn-syntax` and emits fixed-width
//! bytecode into per-function compilation scopes; the VM interprets a sealed
//! scope with a bounded operand stack and call-frame stack.

pub mod compiler;
pub mod object;
pub mod opcode;
pub mod symbol;
pub mod vm;

pub use compiler::{CompileError, CompilationScope, Compiler, Options, Scope};
pub use object::{Builtin, Cell, Closure, CompiledFunction, Context, Module, Value};
pub use opcode::{BinaryOpKind, CompareOpKind, Opcode};
pub use symbol::{Resolution, ScopeClass, Symbol, SymbolTable};
pub use vm::{MAX_FRAME_DEPTH, MAX_STACK_DEPTH, RuntimeError, Vm};
