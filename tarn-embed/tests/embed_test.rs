// tarn-embed - Engine integration tests
// Copyright (c) 2026 Tarn contributors. MIT licensed.

use tarn_embed::{Engine, Error, Value, run};

#[test]
fn test_run_facade() {
    assert_eq!(run("var x = 1 + 2 * 3; x").unwrap(), Value::Int(7));
    assert_eq!(
        run("func add(a, b) { return a + b }; add(40, 2)").unwrap(),
        Value::Int(42)
    );
}

#[test]
fn test_run_returns_nil_for_empty_program() {
    assert_eq!(run("").unwrap(), Value::Nil);
    assert_eq!(run("var x = 1").unwrap(), Value::Nil);
}

#[test]
fn test_state_persists_across_evals() {
    let mut engine = Engine::new();
    engine.eval("var total = 0").unwrap();
    engine.eval("total += 40").unwrap();
    engine.eval("func double(n) { return n * 2 }").unwrap();
    assert_eq!(engine.eval("double(total) + 4").unwrap(), Value::Int(84));
}

#[test]
fn test_error_kinds() {
    let mut engine = Engine::new();
    assert!(matches!(engine.eval("var = 1"), Err(Error::Parse(_))));
    assert!(matches!(engine.eval("missing"), Err(Error::Compile(_))));
    assert!(matches!(engine.eval("1 / 0"), Err(Error::Runtime(_))));
}

#[test]
fn test_engine_survives_failed_eval() {
    let mut engine = Engine::new();
    engine.eval("var x = 1").unwrap();
    assert!(engine.eval("1 / 0").is_err());
    assert_eq!(engine.eval("x + 1").unwrap(), Value::Int(2));
}

#[test]
fn test_default_builtins() {
    let mut engine = Engine::new();
    assert_eq!(engine.eval("len(\"hello\")").unwrap(), Value::Int(5));
    assert_eq!(engine.eval("len([1, 2, 3])").unwrap(), Value::Int(3));
    assert_eq!(engine.eval("type(1)").unwrap(), Value::string("int"));
    assert_eq!(engine.eval("type(type)").unwrap(), Value::string("builtin"));
    assert_eq!(engine.eval("string(42)").unwrap(), Value::string("42"));
    assert_eq!(engine.eval("string(\"s\")").unwrap(), Value::string("s"));
    assert_eq!(
        engine.eval("range(3)").unwrap(),
        Value::list(vec![Value::Int(0), Value::Int(1), Value::Int(2)])
    );
    assert_eq!(engine.eval("len(range(2, 7))").unwrap(), Value::Int(5));
}

#[test]
fn test_math_module() {
    let mut engine = Engine::new();
    assert_eq!(engine.eval("math.abs(-3)").unwrap(), Value::Int(3));
    assert_eq!(engine.eval("math.sqrt(16)").unwrap(), Value::Float(4.0));
    assert_eq!(engine.eval("math.min(3, 8)").unwrap(), Value::Int(3));
    assert_eq!(engine.eval("math.max(3, 8)").unwrap(), Value::Int(8));
    assert_eq!(engine.eval("math.floor(2.9)").unwrap(), Value::Float(2.0));
    assert_eq!(engine.eval("type(math)").unwrap(), Value::string("module"));
}

#[test]
fn test_builtin_error_surfaces_as_runtime_error() {
    let mut engine = Engine::new();
    let err = engine.eval("len(1)").unwrap_err();
    match err {
        Error::Runtime(e) => assert!(e.to_string().contains("len")),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_register_builtin() {
    let mut engine = Engine::new();
    engine
        .register_builtin("triple", |_ctx, args| match args {
            [Value::Int(n)] => Value::Int(n * 3),
            _ => Value::error("triple expects one int"),
        })
        .unwrap();
    assert_eq!(engine.eval("triple(14)").unwrap(), Value::Int(42));
}

#[test]
fn test_register_builtin_after_first_eval() {
    let mut engine = Engine::new();
    engine.eval("var x = 1").unwrap();
    engine
        .register_builtin("late", |_ctx, _args| Value::Int(99))
        .unwrap();
    assert_eq!(engine.eval("late()").unwrap(), Value::Int(99));
}

#[test]
fn test_bare_engine_has_no_builtins() {
    let mut engine = Engine::new_bare();
    assert!(matches!(engine.eval("len(\"x\")"), Err(Error::Compile(_))));
}

#[test]
fn test_cancellation() {
    let mut engine = Engine::new();
    engine.context().cancel();
    let err = engine.eval("len(\"abc\")").unwrap_err();
    match err {
        Error::Runtime(e) => assert!(e.to_string().contains("cancelled")),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_cancellation_from_another_thread() {
    let mut engine = Engine::new();
    let context = engine.context();
    let handle = std::thread::spawn(move || context.cancel());
    handle.join().unwrap();
    assert!(engine.eval("range(10)").is_err());
}

#[test]
fn test_eval_file_missing() {
    let mut engine = Engine::new();
    assert!(matches!(
        engine.eval_file("/no/such/file.tarn"),
        Err(Error::Io { .. })
    ));
}

#[test]
fn test_closures_via_engine() {
    let mut engine = Engine::new();
    engine
        .eval("func mk() { var n = 0; func inc() { n = n + 1; return n }; return inc }")
        .unwrap();
    engine.eval("var counter = mk()").unwrap();
    engine.eval("counter()").unwrap();
    assert_eq!(engine.eval("counter()").unwrap(), Value::Int(2));
}
