// tarn-vm - Bytecode compiler and virtual machine for the Tarn programming language
// Copyright (c) 2026 Tarn contributors. MIT licensed.

//! Bytecode compiler: transforms the Tarn AST into compilation scopes.
//!
//! The compiler walks the AST once, maintaining a stack of scopes (one per
//! function body being compiled) and the symbol table of the innermost
//! block. Jumps are emitted with a placeholder operand and backpatched once
//! the target position is known.

mod scope;

use std::fmt;
use std::rc::Rc;

use tarn_syntax::ast::{
    AssignOp, Expr, FuncLiteral, InfixOp, PostfixOp, PrefixOp, Program, Stmt,
};

use crate::object::{CompiledFunction, Value};
use crate::opcode::{BinaryOpKind, CompareOpKind, Opcode};
use crate::symbol::{ScopeClass, Symbol, SymbolTable};

pub use scope::{CompilationScope, Loop, Scope};

use scope::PLACEHOLDER;

/// Error during compilation.
#[derive(Debug, Clone)]
pub enum CompileError {
    /// Reference to a name that is not in scope.
    UndefinedVariable(String),
    /// A name declared twice in the same block.
    Redeclared(String),
    /// `break` outside of a loop.
    BreakOutsideLoop,
    /// `continue` outside of a loop.
    ContinueOutsideLoop,
    /// `return` at module scope.
    ReturnOutsideFunction,
    /// Assignment to a builtin.
    InvalidAssignment(String),
    /// A parameter default that is not a literal.
    InvalidDefault(String),
    /// Constant pool overflow.
    TooManyConstants,
    /// Name table overflow.
    TooManyNames,
    /// Local variable index overflow.
    TooManyLocals,
    /// More than 255 call arguments.
    TooManyArguments,
    /// More container literal items than a build instruction can carry.
    TooManyItems,
    /// A jump delta beyond u16 reach.
    CodeTooLarge,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UndefinedVariable(name) => write!(f, "undefined variable: {}", name),
            CompileError::Redeclared(name) => write!(f, "variable already declared: {}", name),
            CompileError::BreakOutsideLoop => write!(f, "break outside of loop"),
            CompileError::ContinueOutsideLoop => write!(f, "continue outside of loop"),
            CompileError::ReturnOutsideFunction => write!(f, "return outside of function"),
            CompileError::InvalidAssignment(name) => {
                write!(f, "cannot assign to builtin: {}", name)
            }
            CompileError::InvalidDefault(name) => {
                write!(f, "default value for parameter {} must be a literal", name)
            }
            CompileError::TooManyConstants => write!(f, "too many constants in scope"),
            CompileError::TooManyNames => write!(f, "too many names in scope"),
            CompileError::TooManyLocals => write!(f, "too many local variables"),
            CompileError::TooManyArguments => write!(f, "too many arguments in call"),
            CompileError::TooManyItems => write!(f, "too many items in literal"),
            CompileError::CodeTooLarge => write!(f, "jump distance exceeds instruction reach"),
        }
    }
}

impl std::error::Error for CompileError {}

/// Result type for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Compiler configuration.
#[derive(Default)]
pub struct Options {
    /// Name for the main scope.
    pub name: String,
    /// Host functions, registered under the Builtin scope class in
    /// registration order.
    pub builtins: Vec<(String, Value)>,
    /// Pre-bound global values (host modules). The VM seeds its globals
    /// array from these.
    pub globals: Vec<(String, Value)>,
    /// A previously sealed main scope to extend (REPL re-use). When set,
    /// `builtins` and `globals` must be empty: they already live in the
    /// scope's symbol table.
    pub scope: Option<Rc<Scope>>,
}

/// The bytecode compiler.
pub struct Compiler {
    /// Scope stack; index 0 is the main scope, the last entry is the scope
    /// currently being compiled.
    scopes: Vec<CompilationScope>,
    /// Instruction offset in the main scope at construction time.
    start_pos: usize,
}

impl Compiler {
    /// Create a compiler from the given options.
    pub fn new(options: Options) -> Result<Self> {
        let main = match &options.scope {
            Some(scope) => CompilationScope::reopen(scope),
            None => {
                let name = if options.name.is_empty() {
                    "main".to_string()
                } else {
                    options.name.clone()
                };
                CompilationScope::new(Rc::from(name.as_str()), false, SymbolTable::new())
            }
        };
        let start_pos = main.position();
        let compiler = Compiler {
            scopes: vec![main],
            start_pos,
        };
        for (name, value) in options.builtins {
            compiler.scopes[0].symbols.insert_builtin(&name, value)?;
        }
        for (name, value) in options.globals {
            compiler.scopes[0]
                .symbols
                .insert_variable_with_value(&name, value)?;
        }
        Ok(compiler)
    }

    /// Compile a program into the main scope and return a sealed snapshot.
    ///
    /// May be called repeatedly; each call appends to the main scope's
    /// instruction buffer (see [`Compiler::new_instructions`]).
    pub fn compile(&mut self, program: &Program) -> Result<Rc<Scope>> {
        for statement in &program.statements {
            self.statement(statement)?;
        }
        let main = &self.scopes[0];
        Ok(Rc::new(Scope {
            name: main.name.clone(),
            is_named: main.is_named,
            symbols: main.symbols.clone(),
            instructions: main.instructions.clone(),
            constants: main.constants.clone(),
            names: main.names.clone(),
            children: main.children.clone(),
        }))
    }

    /// The scope currently being compiled.
    pub fn current_scope(&self) -> &CompilationScope {
        self.scopes.last().expect("scope stack is never empty")
    }

    /// The main scope's full instruction buffer.
    pub fn instructions(&self) -> &[u8] {
        &self.scopes[0].instructions
    }

    /// Instructions appended to the main scope since this compiler was
    /// constructed. A REPL runs only these after re-compiling.
    pub fn new_instructions(&self) -> &[u8] {
        &self.scopes[0].instructions[self.start_pos..]
    }

    /// Offset of the first instruction appended by this compiler.
    pub fn start_position(&self) -> usize {
        self.start_pos
    }

    fn current(&mut self) -> &mut CompilationScope {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    fn emit(&mut self, op: Opcode, operands: &[u16]) -> usize {
        self.current().emit(op, operands)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn statement(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Var { name, value } | Stmt::Const { name, value } => {
                self.expression(value)?;
                let symbol = self.current().symbols.insert_variable(name)?;
                self.emit_store(&symbol)
            }
            Stmt::Assign { name, op, value } => self.assign(name, *op, value),
            Stmt::Postfix { name, op } => self.postfix(name, *op),
            Stmt::Expr(expr) => self.expression(expr),
            Stmt::Block(statements) => self.block(statements),
            Stmt::If {
                condition,
                consequence,
                alternative,
            } => self.if_statement(condition, consequence, alternative.as_deref()),
            Stmt::For { body } => self.for_loop(body),
            Stmt::Break => {
                if self.current().loops.is_empty() {
                    return Err(CompileError::BreakOutsideLoop);
                }
                let position = self.emit(Opcode::JumpForward, &[PLACEHOLDER]);
                self.current()
                    .loops
                    .last_mut()
                    .expect("loop presence checked above")
                    .break_positions
                    .push(position);
                Ok(())
            }
            Stmt::Continue => {
                if self.current().loops.is_empty() {
                    return Err(CompileError::ContinueOutsideLoop);
                }
                let position = self.emit(Opcode::JumpBackward, &[PLACEHOLDER]);
                self.current()
                    .loops
                    .last_mut()
                    .expect("loop presence checked above")
                    .continue_positions
                    .push(position);
                Ok(())
            }
            Stmt::Return(value) => {
                if self.scopes.len() == 1 {
                    return Err(CompileError::ReturnOutsideFunction);
                }
                self.expression(value)?;
                self.emit(Opcode::ReturnValue, &[1]);
                Ok(())
            }
        }
    }

    fn assign(&mut self, name: &str, op: AssignOp, value: &Expr) -> Result<()> {
        let symbol = self
            .current()
            .symbols
            .lookup(name)
            .ok_or_else(|| CompileError::UndefinedVariable(name.to_string()))?;
        if symbol.scope == ScopeClass::Builtin {
            return Err(CompileError::InvalidAssignment(name.to_string()));
        }
        if op == AssignOp::Assign {
            self.expression(value)?;
            return self.emit_store(&symbol);
        }
        // Compound assignment: load, compute, store back.
        self.emit_load(&symbol);
        self.expression(value)?;
        let kind = match op {
            AssignOp::Add => BinaryOpKind::Add,
            AssignOp::Subtract => BinaryOpKind::Subtract,
            AssignOp::Multiply => BinaryOpKind::Multiply,
            AssignOp::Divide => BinaryOpKind::Divide,
            AssignOp::Assign => unreachable!("handled above"),
        };
        self.emit(Opcode::BinaryOp, &[kind as u16]);
        self.emit_store(&symbol)
    }

    fn postfix(&mut self, name: &str, op: PostfixOp) -> Result<()> {
        let symbol = self
            .current()
            .symbols
            .lookup(name)
            .ok_or_else(|| CompileError::UndefinedVariable(name.to_string()))?;
        if symbol.scope == ScopeClass::Builtin {
            return Err(CompileError::InvalidAssignment(name.to_string()));
        }
        self.emit_load(&symbol);
        let step = match op {
            PostfixOp::Increment => 1,
            PostfixOp::Decrement => -1,
        };
        let index = self.current().constant(Value::Int(step))?;
        self.emit(Opcode::LoadConst, &[index]);
        self.emit(Opcode::BinaryOp, &[BinaryOpKind::Add as u16]);
        self.emit_store(&symbol)
    }

    /// Compile statements inside a fresh block symbol scope. Entry and exit
    /// are balanced even when compilation fails partway.
    fn block(&mut self, statements: &[Stmt]) -> Result<()> {
        let current = self.current();
        current.symbols = current.symbols.new_block();
        let result = statements.iter().try_for_each(|s| self.statement(s));
        let current = self.current();
        current.symbols = current
            .symbols
            .parent()
            .expect("block symbol table always has a parent");
        result
    }

    fn if_statement(
        &mut self,
        condition: &Expr,
        consequence: &[Stmt],
        alternative: Option<&[Stmt]>,
    ) -> Result<()> {
        self.expression(condition)?;
        let jump_if_false = self.emit(Opcode::PopJumpForwardIfFalse, &[PLACEHOLDER]);
        self.block(consequence)?;
        if let Some(alternative) = alternative {
            // The consequence falls through past the alternative.
            let jump_forward = self.emit(Opcode::JumpForward, &[PLACEHOLDER]);
            self.patch_jump(jump_if_false)?;
            self.block(alternative)?;
            self.patch_jump(jump_forward)?;
        } else {
            self.patch_jump(jump_if_false)?;
        }
        Ok(())
    }

    fn for_loop(&mut self, body: &[Stmt]) -> Result<()> {
        let current = self.current();
        current.symbols = current.symbols.new_block();
        current.loops.push(Loop::default());
        let start = current.position();

        let result = body.iter().try_for_each(|s| self.statement(s));

        let loop_ctx = self
            .current()
            .loops
            .pop()
            .expect("loop stack entry pushed above");
        let exit = |compiler: &mut Compiler| {
            let current = compiler.current();
            current.symbols = current
                .symbols
                .parent()
                .expect("block symbol table always has a parent");
        };
        if let Err(e) = result {
            exit(self);
            return Err(e);
        }

        let back = self.delta_from(start)?;
        self.emit(Opcode::JumpBackward, &[back]);
        let nop = self.emit(Opcode::Nop, &[]);
        for position in loop_ctx.break_positions {
            let delta = to_delta(nop - position)?;
            self.current().change_operand(position, delta);
        }
        for position in loop_ctx.continue_positions {
            let delta = to_delta(position - start)?;
            self.current().change_operand(position, delta);
        }
        exit(self);
        Ok(())
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn expression(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Nil => {
                self.emit(Opcode::Nil, &[]);
                Ok(())
            }
            Expr::Bool(true) => {
                self.emit(Opcode::True, &[]);
                Ok(())
            }
            Expr::Bool(false) => {
                self.emit(Opcode::False, &[]);
                Ok(())
            }
            Expr::Int(n) => self.load_constant(Value::Int(*n)),
            Expr::Float(n) => self.load_constant(Value::Float(*n)),
            Expr::Str(s) => self.load_constant(Value::string(s.as_str())),
            Expr::Ident(name) => {
                let symbol = self
                    .current()
                    .symbols
                    .lookup(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.to_string()))?;
                self.emit_load(&symbol);
                Ok(())
            }
            Expr::Prefix { op, right } => {
                self.expression(right)?;
                match op {
                    PrefixOp::Not => self.emit(Opcode::UnaryNot, &[]),
                    PrefixOp::Negative => self.emit(Opcode::UnaryNegative, &[]),
                };
                Ok(())
            }
            Expr::Infix { op, left, right } => {
                self.expression(left)?;
                self.expression(right)?;
                if let Some(kind) = binary_kind(*op) {
                    self.emit(Opcode::BinaryOp, &[kind as u16]);
                } else if let Some(kind) = compare_kind(*op) {
                    self.emit(Opcode::CompareOp, &[kind as u16]);
                }
                Ok(())
            }
            Expr::In { left, right } => {
                self.expression(right)?;
                self.expression(left)?;
                self.emit(Opcode::ContainsOp, &[0]);
                Ok(())
            }
            Expr::Index { left, index } => {
                self.expression(left)?;
                self.expression(index)?;
                self.emit(Opcode::BinarySubscr, &[]);
                Ok(())
            }
            Expr::GetAttr { object, name } => {
                self.expression(object)?;
                let index = self.current().add_name(name)?;
                self.emit(Opcode::LoadAttr, &[index]);
                Ok(())
            }
            Expr::ObjectCall { object, name, args } => {
                self.expression(object)?;
                let index = self.current().add_name(name)?;
                self.emit(Opcode::LoadAttr, &[index]);
                self.call_args(args)
            }
            Expr::Call { function, args } => {
                self.expression(function)?;
                self.call_args(args)
            }
            Expr::Func(func) => self.function(func),
            Expr::List(items) => {
                for item in items {
                    self.expression(item)?;
                }
                let count = item_count(items.len())?;
                self.emit(Opcode::BuildList, &[count]);
                Ok(())
            }
            Expr::Map(pairs) => {
                for (key, value) in pairs {
                    self.expression(key)?;
                    self.expression(value)?;
                }
                let count = item_count(pairs.len())?;
                self.emit(Opcode::BuildMap, &[count]);
                Ok(())
            }
            Expr::Set(items) => {
                for item in items {
                    self.expression(item)?;
                }
                let count = item_count(items.len())?;
                self.emit(Opcode::BuildSet, &[count]);
                Ok(())
            }
        }
    }

    fn call_args(&mut self, args: &[Expr]) -> Result<()> {
        if args.len() > 255 {
            return Err(CompileError::TooManyArguments);
        }
        for arg in args {
            self.expression(arg)?;
        }
        self.emit(Opcode::Call, &[args.len() as u16]);
        Ok(())
    }

    /// Compile a function literal: a child scope is compiled for the body,
    /// sealed into a compiled function constant, and closure construction is
    /// synthesized when the body captured free variables.
    fn function(&mut self, func: &FuncLiteral) -> Result<()> {
        let name: Rc<str> = match &func.name {
            Some(name) => Rc::from(name.as_str()),
            None => Rc::from(""),
        };
        let is_named = func.name.is_some();

        let mut defaults = Vec::with_capacity(func.params.len());
        for (param, default) in func.params.iter().zip(&func.defaults) {
            match default {
                None => defaults.push(None),
                Some(expr) => match literal_value(expr) {
                    Some(value) => defaults.push(Some(value)),
                    None => return Err(CompileError::InvalidDefault(param.clone())),
                },
            }
        }

        let child_symbols = self.current().symbols.new_child();
        self.scopes
            .push(CompilationScope::new(name.clone(), is_named, child_symbols));

        let result = self.function_body(func);

        let func_scope = self.scopes.pop().expect("function scope pushed above");
        result?;
        let free = func_scope.symbols.free();
        let sealed = Rc::new(func_scope.seal());
        self.current().children.push(sealed.clone());

        let function = Value::Function(Rc::new(CompiledFunction {
            name: name.clone(),
            params: func.params.iter().map(|p| Rc::from(p.as_str())).collect(),
            defaults,
            scope: sealed,
        }));
        let const_index = self.current().constant(function)?;

        if free.is_empty() {
            self.emit(Opcode::LoadConst, &[const_index]);
        } else {
            for resolution in &free {
                self.emit(
                    Opcode::MakeCell,
                    &[resolution.symbol.index, (resolution.depth - 1) as u16],
                );
            }
            self.emit(Opcode::LoadClosure, &[const_index, free.len() as u16]);
        }

        if let Some(func_name) = &func.name {
            let symbol = self.current().symbols.insert_variable(func_name)?;
            self.emit_store(&symbol)?;
        }
        Ok(())
    }

    /// Compile parameter slots and the body inside the function scope
    /// currently on top of the stack.
    fn function_body(&mut self, func: &FuncLiteral) -> Result<()> {
        for param in &func.params {
            self.current().symbols.insert_variable(param)?;
        }
        // The function's own name lands in the slot after the parameters;
        // the VM writes the callee there so recursive references resolve.
        if let Some(func_name) = &func.name {
            self.current().symbols.insert_variable(func_name)?;
        }

        for statement in &func.body {
            self.statement(statement)?;
        }

        match func.body.last() {
            Some(Stmt::Return(_)) => {}
            // A named function definition stores its value; nothing is left
            // on the stack to return.
            Some(Stmt::Expr(Expr::Func(inner))) if inner.name.is_some() => {
                self.emit(Opcode::Nil, &[]);
                self.emit(Opcode::ReturnValue, &[1]);
            }
            Some(Stmt::Expr(_)) => {
                // The expression's value is already on the stack.
                self.emit(Opcode::ReturnValue, &[1]);
            }
            _ => {
                self.emit(Opcode::Nil, &[]);
                self.emit(Opcode::ReturnValue, &[1]);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn load_constant(&mut self, value: Value) -> Result<()> {
        let index = self.current().constant(value)?;
        self.emit(Opcode::LoadConst, &[index]);
        Ok(())
    }

    fn emit_load(&mut self, symbol: &Symbol) {
        match symbol.scope {
            ScopeClass::Global => self.emit(Opcode::LoadGlobal, &[symbol.index]),
            ScopeClass::Local => self.emit(Opcode::LoadFast, &[symbol.index]),
            ScopeClass::Free => self.emit(Opcode::LoadFree, &[symbol.index]),
            ScopeClass::Builtin => self.emit(Opcode::LoadBuiltin, &[symbol.index]),
        };
    }

    fn emit_store(&mut self, symbol: &Symbol) -> Result<()> {
        match symbol.scope {
            ScopeClass::Global => self.emit(Opcode::StoreGlobal, &[symbol.index]),
            ScopeClass::Local => self.emit(Opcode::StoreFast, &[symbol.index]),
            ScopeClass::Free => self.emit(Opcode::StoreFree, &[symbol.index]),
            ScopeClass::Builtin => {
                return Err(CompileError::InvalidAssignment(symbol.name.to_string()));
            }
        };
        Ok(())
    }

    /// Delta from `position` to the current instruction position.
    fn delta_from(&mut self, position: usize) -> Result<u16> {
        to_delta(self.current().position() - position)
    }

    /// Backpatch the jump at `position` to target the current position.
    fn patch_jump(&mut self, position: usize) -> Result<()> {
        let delta = self.delta_from(position)?;
        self.current().change_operand(position, delta);
        Ok(())
    }
}

fn to_delta(distance: usize) -> Result<u16> {
    u16::try_from(distance).map_err(|_| CompileError::CodeTooLarge)
}

fn item_count(len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| CompileError::TooManyItems)
}

fn binary_kind(op: InfixOp) -> Option<BinaryOpKind> {
    let kind = match op {
        InfixOp::Add => BinaryOpKind::Add,
        InfixOp::Subtract => BinaryOpKind::Subtract,
        InfixOp::Multiply => BinaryOpKind::Multiply,
        InfixOp::Divide => BinaryOpKind::Divide,
        InfixOp::Modulo => BinaryOpKind::Modulo,
        InfixOp::Power => BinaryOpKind::Power,
        InfixOp::BitAnd | InfixOp::And => BinaryOpKind::And,
        InfixOp::BitOr | InfixOp::Or => BinaryOpKind::Or,
        InfixOp::BitXor => BinaryOpKind::Xor,
        InfixOp::LShift => BinaryOpKind::LShift,
        InfixOp::RShift => BinaryOpKind::RShift,
        _ => return None,
    };
    Some(kind)
}

fn compare_kind(op: InfixOp) -> Option<CompareOpKind> {
    let kind = match op {
        InfixOp::Equal => CompareOpKind::Equal,
        InfixOp::NotEqual => CompareOpKind::NotEqual,
        InfixOp::LessThan => CompareOpKind::LessThan,
        InfixOp::LessThanOrEqual => CompareOpKind::LessThanOrEqual,
        InfixOp::GreaterThan => CompareOpKind::GreaterThan,
        InfixOp::GreaterThanOrEqual => CompareOpKind::GreaterThanOrEqual,
        _ => return None,
    };
    Some(kind)
}

/// Fold a literal expression to its runtime value. Used for parameter
/// defaults, which are restricted to literals.
fn literal_value(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Nil => Some(Value::Nil),
        Expr::Bool(b) => Some(Value::Bool(*b)),
        Expr::Int(n) => Some(Value::Int(*n)),
        Expr::Float(n) => Some(Value::Float(*n)),
        Expr::Str(s) => Some(Value::string(s.as_str())),
        Expr::Prefix {
            op: PrefixOp::Negative,
            right,
        } => match right.as_ref() {
            Expr::Int(n) => Some(Value::Int(n.wrapping_neg())),
            Expr::Float(n) => Some(Value::Float(-n)),
            _ => None,
        },
        _ => None,
    }
}
