//! Context lifecycle: interpret, diagnostics, teardown, deferred release.

use skiff_embed::{
    ContextConfig, DiagnosticKind, InteropError, InterpretOutcome, ScriptContext,
};
use skiff_testvm::{StubEngine, Value};

#[test]
fn test_interpret_success() {
    let mut ctx = ScriptContext::new(StubEngine::new()).unwrap();
    let outcome = ctx.interpret("main", "1 + 1").unwrap();
    assert_eq!(outcome, InterpretOutcome::Success);
    assert_eq!(ctx.engine().stats.interprets, 1);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn test_initialization_failure() {
    match ScriptContext::new(StubEngine::failing()) {
        Err(InteropError::InitializationFailure(_)) => {}
        other => panic!("expected InitializationFailure, got {:?}", other.map(|_| ())),
    }
}

fn engine_with_bad_module() -> StubEngine {
    let mut engine = StubEngine::new();
    engine.on_interpret(|_engine, hooks, module, _source| {
        if module == "bad" {
            StubEngine::emit_diagnostic(hooks, DiagnosticKind::Compile, module, 2, "unexpected token");
            InterpretOutcome::CompileError
        } else {
            InterpretOutcome::Success
        }
    });
    engine
}

#[test]
fn test_compile_error_reported_as_result_code() {
    let mut ctx = ScriptContext::new(engine_with_bad_module()).unwrap();
    let outcome = ctx.interpret("bad", "!!").unwrap();
    assert_eq!(outcome, InterpretOutcome::CompileError);

    let diags = ctx.diagnostics();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, DiagnosticKind::Compile);
    assert_eq!(diags[0].module, "bad");
    assert_eq!(diags[0].line, 2);
}

#[test]
fn test_diagnostic_log_cleared_per_interpret() {
    let mut ctx = ScriptContext::new(engine_with_bad_module()).unwrap();
    ctx.interpret("bad", "!!").unwrap();
    assert!(!ctx.diagnostics().is_empty());

    ctx.interpret("main", "ok").unwrap();
    assert!(
        ctx.diagnostics().is_empty(),
        "log is cleared at the start of each interpret"
    );
}

#[test]
fn test_raise_on_failure_carries_diagnostics() {
    let config = ContextConfig::default().raise_on_failure(true);
    let mut ctx = ScriptContext::with_config(engine_with_bad_module(), config).unwrap();

    match ctx.interpret("bad", "!!") {
        Err(InteropError::InterpretFailure {
            kind,
            summary,
            diagnostics,
        }) => {
            assert_eq!(kind, skiff_embed::FailureKind::Compile);
            assert!(summary.contains("unexpected token"));
            assert_eq!(diagnostics.len(), 1);
        }
        other => panic!("expected InterpretFailure, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_release_forwards_to_engine_on_context_thread() {
    let mut engine = StubEngine::new();
    engine.define_variable("main", "obj", Value::Opaque(7));
    let mut ctx = ScriptContext::new(engine).unwrap();

    let handle = ctx.get_variable("main", "obj").unwrap();
    let raw = handle.ptr().raw();
    assert!(ctx.engine().is_rooted(handle.ptr()));

    assert!(ctx.release(&handle));
    assert!(!handle.is_valid());
    assert_eq!(ctx.engine().released(), &[raw]);
    assert!(!ctx.release(&handle), "double release is a no-op");
}

#[test]
fn test_offthread_release_is_deferred_until_next_boundary() {
    let mut engine = StubEngine::new();
    engine.define_variable("main", "obj", Value::Opaque(7));
    let mut ctx = ScriptContext::new(engine).unwrap();

    let handle = ctx.get_variable("main", "obj").unwrap();
    let raw = handle.ptr().raw();

    let pool = ctx.handle_pool();
    let cloned = handle.clone();
    std::thread::spawn(move || {
        assert!(pool.release(&cloned));
    })
    .join()
    .unwrap();

    assert!(!handle.is_valid(), "handle is invalid immediately");
    assert!(
        ctx.engine().released().is_empty(),
        "engine untouched by the foreign thread"
    );

    // The next boundary crossing drains the queue on the owning thread.
    ctx.interpret("main", "ok").unwrap();
    assert_eq!(ctx.engine().released(), &[raw]);
}

#[test]
fn test_teardown_invalidates_outstanding_handles() {
    let mut engine = StubEngine::new();
    engine.define_variable("main", "obj", Value::Opaque(7));
    let mut ctx = ScriptContext::new(engine).unwrap();

    let handle = ctx.get_variable("main", "obj").unwrap();
    let pool = ctx.handle_pool();
    assert_eq!(pool.active_count(), 1);

    drop(ctx);
    assert!(!handle.is_valid());
    assert_eq!(pool.active_count(), 0);
    assert!(
        pool.drain_pending().is_empty(),
        "teardown forwarded all engine releases"
    );
}

#[test]
fn test_pool_capacity_config() {
    let config = ContextConfig::default()
        .initial_pool_capacity(2)
        .max_pool_capacity(2);
    let mut engine = StubEngine::new();
    for i in 0..4 {
        engine.define_variable("main", &format!("v{}", i), Value::Opaque(100 + i));
    }
    let mut ctx = ScriptContext::with_config(engine, config).unwrap();

    let pool = ctx.handle_pool();
    assert_eq!(pool.pooled_count(), 2, "pre-warmed to the initial capacity");

    let handles: Vec<_> = (0..4)
        .map(|i| ctx.get_variable("main", &format!("v{}", i)).unwrap())
        .collect();
    for handle in &handles {
        ctx.release(handle);
    }
    assert_eq!(
        pool.pooled_count(),
        2,
        "cells beyond the cap are dropped, not pooled"
    );
}
