// tarn-vm - Bytecode compiler and virtual machine for the Tarn programming language
// Copyright (c) 2026 Tarn contributors. MIT licensed.

//! Call frames for the VM.

use std::rc::Rc;

use crate::compiler::Scope;
use crate::object::{Cell, Value};

/// A call frame: the activation record of one function call.
///
/// Locals are indexed by the symbol indices assigned at compile time; the
/// vector is sized to the callee scope's symbol count at call time. A local
/// slot captured by a closure holds a [`Cell`], which loads and stores
/// dereference transparently.
#[derive(Debug)]
pub struct Frame {
    /// Local variable slots.
    pub locals: Vec<Value>,
    /// Instruction offset in the caller to resume at on return.
    pub return_addr: usize,
    /// The scope whose instructions this frame executes.
    pub scope: Rc<Scope>,
    /// Free-variable cells of the running closure; empty otherwise.
    pub free: Vec<Cell>,
}

impl Frame {
    /// Create a new frame.
    pub fn new(scope: Rc<Scope>, locals: Vec<Value>, return_addr: usize, free: Vec<Cell>) -> Self {
        Frame {
            locals,
            return_addr,
            scope,
            free,
        }
    }
}
