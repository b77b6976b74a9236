// tarn-embed - Embedding API for the Tarn programming language
// Copyright (c) 2026 Tarn contributors. MIT licensed.

//! Default builtin functions and host modules.
//!
//! Builtins never panic: failures are reported as error values, which the VM
//! propagates as runtime errors. Every builtin observes the cancellation
//! context on entry.

use tarn_vm::{Context, Value};

/// The default builtin set registered by `Engine::new`.
pub fn default_builtins() -> Vec<(String, Value)> {
    vec![
        ("len".to_string(), Value::builtin("len", builtin_len)),
        ("type".to_string(), Value::builtin("type", builtin_type)),
        ("string".to_string(), Value::builtin("string", builtin_string)),
        ("print".to_string(), Value::builtin("print", builtin_print)),
        ("range".to_string(), Value::builtin("range", builtin_range)),
    ]
}

/// The default host modules, registered as pre-bound globals.
pub fn default_globals() -> Vec<(String, Value)> {
    vec![("math".to_string(), math_module())]
}

fn arity_error(name: &str, expected: &str, got: usize) -> Value {
    Value::error(format!(
        "wrong number of arguments to {}: expected {}, got {}",
        name, expected, got
    ))
}

fn builtin_len(ctx: &Context, args: &[Value]) -> Value {
    if let Some(err) = ctx.guard() {
        return err;
    }
    match args {
        [Value::String(s)] => Value::Int(s.chars().count() as i64),
        [Value::List(l)] => Value::Int(l.len() as i64),
        [Value::Map(m)] => Value::Int(m.len() as i64),
        [Value::Set(s)] => Value::Int(s.len() as i64),
        [other] => Value::error(format!("len() unsupported for {}", other.type_name())),
        _ => arity_error("len", "1", args.len()),
    }
}

fn builtin_type(ctx: &Context, args: &[Value]) -> Value {
    if let Some(err) = ctx.guard() {
        return err;
    }
    match args {
        [value] => Value::string(value.type_name()),
        _ => arity_error("type", "1", args.len()),
    }
}

fn builtin_string(ctx: &Context, args: &[Value]) -> Value {
    if let Some(err) = ctx.guard() {
        return err;
    }
    match args {
        [value] => Value::string(raw_display(value)),
        _ => arity_error("string", "1", args.len()),
    }
}

fn builtin_print(ctx: &Context, args: &[Value]) -> Value {
    if let Some(err) = ctx.guard() {
        return err;
    }
    let rendered: Vec<String> = args.iter().map(raw_display).collect();
    println!("{}", rendered.join(" "));
    Value::Nil
}

fn builtin_range(ctx: &Context, args: &[Value]) -> Value {
    if let Some(err) = ctx.guard() {
        return err;
    }
    let (start, stop) = match args {
        [Value::Int(stop)] => (0, *stop),
        [Value::Int(start), Value::Int(stop)] => (*start, *stop),
        [_] | [_, _] => return Value::error("range expects int arguments"),
        _ => return arity_error("range", "1 or 2", args.len()),
    };
    let mut items = Vec::new();
    let mut i = start;
    while i < stop {
        // A huge range should still notice cancellation promptly.
        if items.len() % 4096 == 0
            && let Some(err) = ctx.guard()
        {
            return err;
        }
        items.push(Value::Int(i));
        i += 1;
    }
    Value::list(items)
}

/// Strings render without quotes here, unlike their Display form.
fn raw_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string(),
        other => other.to_string(),
    }
}

fn math_module() -> Value {
    Value::module(
        "math",
        vec![
            ("pi", Value::Float(std::f64::consts::PI)),
            ("abs", Value::builtin("math.abs", math_abs)),
            ("sqrt", Value::builtin("math.sqrt", math_sqrt)),
            ("floor", Value::builtin("math.floor", math_floor)),
            ("ceil", Value::builtin("math.ceil", math_ceil)),
            ("min", Value::builtin("math.min", math_min)),
            ("max", Value::builtin("math.max", math_max)),
        ],
    )
}

fn math_abs(ctx: &Context, args: &[Value]) -> Value {
    if let Some(err) = ctx.guard() {
        return err;
    }
    match args {
        [Value::Int(n)] => Value::Int(n.wrapping_abs()),
        [Value::Float(n)] => Value::Float(n.abs()),
        [other] => Value::error(format!("math.abs expects a number, got {}", other.type_name())),
        _ => arity_error("math.abs", "1", args.len()),
    }
}

fn math_sqrt(ctx: &Context, args: &[Value]) -> Value {
    if let Some(err) = ctx.guard() {
        return err;
    }
    match args {
        [Value::Int(n)] => Value::Float((*n as f64).sqrt()),
        [Value::Float(n)] => Value::Float(n.sqrt()),
        [other] => Value::error(format!("math.sqrt expects a number, got {}", other.type_name())),
        _ => arity_error("math.sqrt", "1", args.len()),
    }
}

fn math_floor(ctx: &Context, args: &[Value]) -> Value {
    if let Some(err) = ctx.guard() {
        return err;
    }
    match args {
        [Value::Int(n)] => Value::Int(*n),
        [Value::Float(n)] => Value::Float(n.floor()),
        [other] => Value::error(format!("math.floor expects a number, got {}", other.type_name())),
        _ => arity_error("math.floor", "1", args.len()),
    }
}

fn math_ceil(ctx: &Context, args: &[Value]) -> Value {
    if let Some(err) = ctx.guard() {
        return err;
    }
    match args {
        [Value::Int(n)] => Value::Int(*n),
        [Value::Float(n)] => Value::Float(n.ceil()),
        [other] => Value::error(format!("math.ceil expects a number, got {}", other.type_name())),
        _ => arity_error("math.ceil", "1", args.len()),
    }
}

fn math_min(ctx: &Context, args: &[Value]) -> Value {
    if let Some(err) = ctx.guard() {
        return err;
    }
    math_pick(args, "math.min", |a, b| a <= b)
}

fn math_max(ctx: &Context, args: &[Value]) -> Value {
    if let Some(err) = ctx.guard() {
        return err;
    }
    math_pick(args, "math.max", |a, b| a >= b)
}

fn math_pick(args: &[Value], name: &str, keep_first: impl Fn(f64, f64) -> bool) -> Value {
    match args {
        [a @ Value::Int(x), b @ Value::Int(y)] => {
            if keep_first(*x as f64, *y as f64) {
                a.clone()
            } else {
                b.clone()
            }
        }
        [a, b] => {
            let (x, y) = match (number(a), number(b)) {
                (Some(x), Some(y)) => (x, y),
                _ => {
                    return Value::error(format!(
                        "{} expects numbers, got {} and {}",
                        name,
                        a.type_name(),
                        b.type_name()
                    ));
                }
            };
            if keep_first(x, y) { a.clone() } else { b.clone() }
        }
        _ => arity_error(name, "2", args.len()),
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(n) => Some(*n),
        _ => None,
    }
}
