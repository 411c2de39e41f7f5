//! Foreign method/class binding: bind-time lookups and symbol install.

use std::cell::Cell;
use std::rc::Rc;

use skiff_embed::{ClassSymbols, InterpretOutcome, ScriptContext, Symbol};
use skiff_testvm::{StubEngine, Value};

#[test]
fn test_bound_method_gets_symbol_and_dispatches() {
    let mut engine = StubEngine::new();
    engine.define_variable("main", "counter", Value::Opaque(1));
    let bound = Rc::new(Cell::new(Symbol::NONE));

    let bound_out = Rc::clone(&bound);
    engine.on_interpret(move |engine, hooks, module, _source| {
        let symbol = hooks.bind_method(module, "Counter", false, "inc()");
        bound_out.set(symbol);
        engine.bind_foreign("counter.inc()", symbol);
        InterpretOutcome::Success
    });
    let mut ctx = ScriptContext::new(engine).unwrap();

    let hits = Rc::new(Cell::new(0u32));
    let hits_out = Rc::clone(&hits);
    ctx.bind_method("main", "Counter", false, "inc()", move |scope| {
        hits_out.set(hits_out.get() + 1);
        scope.set_return(f64::from(hits_out.get())).unwrap();
    });

    ctx.interpret("main", "class Counter { foreign inc() }").unwrap();
    assert!(!bound.get().is_none(), "bind-time lookup found the callback");

    let receiver = ctx.get_variable("main", "counter").unwrap();
    let target = ctx.make_call_handle("counter.inc()").unwrap();
    ctx.call(&receiver, &target, &[]).unwrap();
    ctx.call(&receiver, &target, &[]).unwrap();

    assert_eq!(hits.get(), 2);
    assert_eq!(ctx.get_return::<f64>().unwrap(), 2.0);
}

#[test]
fn test_unregistered_method_binds_to_symbol_zero() {
    let bound = Rc::new(Cell::new(Symbol::from_raw(7)));

    let mut engine = StubEngine::new();
    let bound_out = Rc::clone(&bound);
    engine.on_interpret(move |_engine, hooks, module, _source| {
        bound_out.set(hooks.bind_method(module, "Missing", false, "nope()"));
        InterpretOutcome::Success
    });
    let mut ctx = ScriptContext::new(engine).unwrap();

    ctx.interpret("main", "class Missing { foreign nope() }").unwrap();
    assert!(bound.get().is_none(), "unknown binding resolves to symbol 0");
}

#[test]
fn test_static_and_instance_bindings_are_distinct() {
    let symbols = Rc::new(Cell::new((Symbol::NONE, Symbol::NONE)));

    let mut engine = StubEngine::new();
    let symbols_out = Rc::clone(&symbols);
    engine.on_interpret(move |_engine, hooks, module, _source| {
        let stat = hooks.bind_method(module, "Math", true, "pi");
        let inst = hooks.bind_method(module, "Math", false, "pi");
        symbols_out.set((stat, inst));
        InterpretOutcome::Success
    });
    let mut ctx = ScriptContext::new(engine).unwrap();

    ctx.bind_method("main", "Math", true, "pi", |scope| {
        scope.set_return(3.14).unwrap();
    });

    ctx.interpret("main", "class Math { foreign static pi }").unwrap();
    let (stat, inst) = symbols.get();
    assert!(!stat.is_none(), "static binding registered");
    assert!(inst.is_none(), "instance lookup does not match a static binding");
}

#[test]
fn test_class_binding_with_finalizer() {
    let symbols = Rc::new(Cell::new(ClassSymbols {
        allocate: Symbol::NONE,
        finalize: Symbol::NONE,
    }));

    let mut engine = StubEngine::new();
    let symbols_out = Rc::clone(&symbols);
    engine.on_interpret(move |_engine, hooks, module, _source| {
        symbols_out.set(hooks.bind_class(module, "File"));
        InterpretOutcome::Success
    });
    let mut ctx = ScriptContext::new(engine).unwrap();

    ctx.bind_class_with_finalizer(
        "main",
        "File",
        |scope| {
            scope.set_return(0.0).unwrap();
        },
        |_scope| {},
    );

    ctx.interpret("main", "foreign class File {}").unwrap();
    let got = symbols.get();
    assert!(!got.allocate.is_none());
    assert!(!got.finalize.is_none());
    assert_ne!(got.allocate, got.finalize);
}

#[test]
fn test_class_binding_without_finalizer() {
    let symbols = Rc::new(Cell::new(ClassSymbols {
        allocate: Symbol::NONE,
        finalize: Symbol::NONE,
    }));

    let mut engine = StubEngine::new();
    let symbols_out = Rc::clone(&symbols);
    engine.on_interpret(move |_engine, hooks, module, _source| {
        symbols_out.set(hooks.bind_class(module, "File"));
        InterpretOutcome::Success
    });
    let mut ctx = ScriptContext::new(engine).unwrap();

    ctx.bind_class("main", "File", |scope| {
        scope.set_return(0.0).unwrap();
    });

    ctx.interpret("main", "foreign class File {}").unwrap();
    let got = symbols.get();
    assert!(!got.allocate.is_none());
    assert!(
        got.finalize.is_none(),
        "missing finalizer reported as symbol 0 so the engine skips it"
    );
}

#[test]
fn test_unregistered_class_binds_to_symbol_zero() {
    let symbols = Rc::new(Cell::new(ClassSymbols {
        allocate: Symbol::from_raw(7),
        finalize: Symbol::from_raw(7),
    }));

    let mut engine = StubEngine::new();
    let symbols_out = Rc::clone(&symbols);
    engine.on_interpret(move |_engine, hooks, module, _source| {
        symbols_out.set(hooks.bind_class(module, "Unknown"));
        InterpretOutcome::Success
    });
    let mut ctx = ScriptContext::new(engine).unwrap();

    ctx.interpret("main", "foreign class Unknown {}").unwrap();
    let got = symbols.get();
    assert!(got.allocate.is_none());
    assert!(got.finalize.is_none());
}

#[test]
fn test_contexts_have_disjoint_symbol_spaces() {
    fn context_with_binding(label: &'static str) -> (ScriptContext<StubEngine>, Rc<Cell<Symbol>>) {
        let bound = Rc::new(Cell::new(Symbol::NONE));
        let mut engine = StubEngine::new();
        let bound_out = Rc::clone(&bound);
        engine.on_interpret(move |engine, hooks, module, _source| {
            let symbol = hooks.bind_method(module, "Thing", false, label);
            bound_out.set(symbol);
            engine.bind_foreign(label, symbol);
            InterpretOutcome::Success
        });
        let mut ctx = ScriptContext::new(engine).unwrap();
        ctx.bind_method("main", "Thing", false, label, |_scope| {});
        (ctx, bound)
    }

    let (mut a, bound_a) = context_with_binding("first()");
    let (mut b, bound_b) = context_with_binding("second()");

    a.interpret("main", "class Thing { foreign first() }").unwrap();
    b.interpret("main", "class Thing { foreign second() }").unwrap();

    // Each context numbers its own table from 1; tearing one down leaves
    // the other fully functional.
    assert_eq!(bound_a.get(), bound_b.get());
    drop(a);

    b.engine_mut().define_variable("main", "thing", Value::Opaque(1));
    let receiver = b.get_variable("main", "thing").unwrap();
    let target = b.make_call_handle("second()").unwrap();
    assert_eq!(
        b.call(&receiver, &target, &[]).unwrap(),
        InterpretOutcome::Success
    );
}
