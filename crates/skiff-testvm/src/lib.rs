//! Scripted stub engine implementing [`EngineAbi`] for tests.
//!
//! `StubEngine` models the observable surface of a slot-based script
//! engine without interpreting anything: a slot register file, a heap of
//! rooted values addressed by `ForeignPtr`, call targets keyed by
//! signature, top-level variables, and a fiber stack that saves and
//! restores the slot file for reentrant calls.
//!
//! Behavior is scripted per test: [`on_interpret`](StubEngine::on_interpret)
//! installs the interpret handler, [`on_call`](StubEngine::on_call)
//! installs per-signature call behaviors, and
//! [`bind_foreign`](StubEngine::bind_foreign) routes a signature to a host
//! dispatch symbol. Misuse the real ABI would punish with undefined
//! behavior (typed read of a wrong slot, use of a released value) panics
//! loudly here instead.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use skiff_sdk::{
    Diagnostic, DiagnosticKind, EngineAbi, EngineHooks, FiberId, ForeignPtr, InterpretOutcome,
    SlotType, Symbol,
};

/// An engine-side value as the stub models it.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// The null value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(f64),
    /// A string/byte payload.
    Bytes(Vec<u8>),
    /// An opaque engine object, identified by an arbitrary test-chosen id.
    Opaque(u64),
}

impl Value {
    /// Convenience constructor for string payloads.
    pub fn string(s: &str) -> Value {
        Value::Bytes(s.as_bytes().to_vec())
    }
}

enum HeapEntry {
    Value(Value),
    CallTarget { signature: String },
}

/// Scripted behavior run when a call target with a given signature is
/// invoked. Receives the engine (slots hold receiver + arguments) and the
/// host hooks, and returns the result code.
pub type CallBehavior = Rc<dyn Fn(&mut StubEngine, &mut dyn EngineHooks) -> InterpretOutcome>;

/// Scripted behavior run for `interpret`.
pub type InterpretBehavior =
    Rc<dyn Fn(&mut StubEngine, &mut dyn EngineHooks, &str, &str) -> InterpretOutcome>;

/// Counters exposed for test assertions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// `interpret` invocations.
    pub interprets: usize,
    /// `call` invocations.
    pub calls: usize,
    /// Fibers pushed for reentrant calls.
    pub fibers_pushed: usize,
    /// Fibers resumed.
    pub fibers_resumed: usize,
}

/// In-memory stand-in for a foreign slot-based script engine.
pub struct StubEngine {
    slots: Vec<Value>,
    heap: FxHashMap<u64, HeapEntry>,
    next_ptr: u64,
    released: Vec<u64>,
    variables: FxHashMap<(String, String), Value>,
    behaviors: FxHashMap<String, CallBehavior>,
    foreign: FxHashMap<String, Symbol>,
    interpret_behavior: Option<InterpretBehavior>,
    fibers: Vec<Vec<Value>>,
    fail_start: bool,
    /// Invocation counters for assertions.
    pub stats: Stats,
}

impl Default for StubEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StubEngine {
    /// A fresh engine that starts successfully.
    pub fn new() -> Self {
        StubEngine {
            slots: Vec::new(),
            heap: FxHashMap::default(),
            next_ptr: 1,
            released: Vec::new(),
            variables: FxHashMap::default(),
            behaviors: FxHashMap::default(),
            foreign: FxHashMap::default(),
            interpret_behavior: None,
            fibers: Vec::new(),
            fail_start: false,
            stats: Stats::default(),
        }
    }

    /// An engine whose `start` fails, for initialization-error tests.
    pub fn failing() -> Self {
        StubEngine {
            fail_start: true,
            ..Self::new()
        }
    }

    // ========================================================================
    // Scripting surface
    // ========================================================================

    /// Install the interpret handler.
    pub fn on_interpret(
        &mut self,
        behavior: impl Fn(&mut StubEngine, &mut dyn EngineHooks, &str, &str) -> InterpretOutcome
            + 'static,
    ) {
        self.interpret_behavior = Some(Rc::new(behavior));
    }

    /// Install the behavior run when a call target with `signature` is
    /// invoked.
    pub fn on_call(
        &mut self,
        signature: &str,
        behavior: impl Fn(&mut StubEngine, &mut dyn EngineHooks) -> InterpretOutcome + 'static,
    ) {
        self.behaviors.insert(signature.to_string(), Rc::new(behavior));
    }

    /// Route `signature` to a host dispatch symbol, as a real engine does
    /// after a successful bind-time lookup. Invoking a matching call
    /// target dispatches the symbol and succeeds.
    pub fn bind_foreign(&mut self, signature: &str, symbol: Symbol) {
        self.foreign.insert(signature.to_string(), symbol);
    }

    /// Root a value on the stub heap, as if the engine handed it out.
    pub fn root_value(&mut self, value: Value) -> ForeignPtr {
        let id = self.next_ptr;
        self.next_ptr += 1;
        self.heap.insert(id, HeapEntry::Value(value));
        ForeignPtr::from_raw(id)
    }

    /// Define a top-level variable resolvable via `get_variable`.
    pub fn define_variable(&mut self, module: &str, name: &str, value: Value) {
        self.variables
            .insert((module.to_string(), name.to_string()), value);
    }

    /// Report a diagnostic through `hooks`, as engine callbacks do.
    pub fn emit_diagnostic(
        hooks: &mut dyn EngineHooks,
        kind: DiagnosticKind,
        module: &str,
        line: u32,
        message: &str,
    ) {
        hooks.diagnostic(Diagnostic {
            kind,
            module: module.to_string(),
            line,
            message: message.to_string(),
        });
    }

    // ========================================================================
    // Assertion surface
    // ========================================================================

    /// Raw pointers released so far, in release order.
    pub fn released(&self) -> &[u64] {
        &self.released
    }

    /// Whether `ptr` is still rooted on the stub heap.
    pub fn is_rooted(&self, ptr: ForeignPtr) -> bool {
        self.heap.contains_key(&ptr.raw())
    }

    /// Clone of the value in `slot`.
    pub fn slot_value(&self, slot: usize) -> Value {
        self.slots[slot].clone()
    }

    /// Current fiber nesting depth.
    pub fn fiber_depth(&self) -> usize {
        self.fibers.len()
    }

    fn heap_value(&self, ptr: ForeignPtr) -> Value {
        match self.heap.get(&ptr.raw()) {
            Some(HeapEntry::Value(value)) => value.clone(),
            Some(HeapEntry::CallTarget { .. }) => Value::Opaque(ptr.raw()),
            None => panic!("use of released engine value {}", ptr),
        }
    }

    fn slot(&self, slot: usize) -> &Value {
        self.slots
            .get(slot)
            .unwrap_or_else(|| panic!("slot {} out of range ({} slots)", slot, self.slots.len()))
    }
}

impl EngineAbi for StubEngine {
    fn start(&mut self) -> bool {
        !self.fail_start
    }

    fn interpret(
        &mut self,
        module: &str,
        source: &[u8],
        hooks: &mut dyn EngineHooks,
    ) -> InterpretOutcome {
        self.stats.interprets += 1;
        match self.interpret_behavior.clone() {
            Some(behavior) => {
                let source = String::from_utf8_lossy(source).into_owned();
                behavior(self, hooks, module, &source)
            }
            None => InterpretOutcome::Success,
        }
    }

    fn call(&mut self, target: ForeignPtr, hooks: &mut dyn EngineHooks) -> InterpretOutcome {
        self.stats.calls += 1;
        let signature = match self.heap.get(&target.raw()) {
            Some(HeapEntry::CallTarget { signature }) => signature.clone(),
            Some(HeapEntry::Value(_)) => panic!("call on a non-callable value {}", target),
            None => panic!("call through released target {}", target),
        };
        if let Some(behavior) = self.behaviors.get(&signature).cloned() {
            return behavior(self, hooks);
        }
        if let Some(&symbol) = self.foreign.get(&signature) {
            hooks.dispatch(symbol, self);
            return InterpretOutcome::Success;
        }
        Self::emit_diagnostic(
            hooks,
            DiagnosticKind::Runtime,
            "(stub)",
            0,
            &format!("no behavior for '{}'", signature),
        );
        InterpretOutcome::RuntimeError
    }

    fn make_call_target(&mut self, signature: &str) -> ForeignPtr {
        let id = self.next_ptr;
        self.next_ptr += 1;
        self.heap.insert(
            id,
            HeapEntry::CallTarget {
                signature: signature.to_string(),
            },
        );
        ForeignPtr::from_raw(id)
    }

    fn ensure_slots(&mut self, count: usize) {
        if self.slots.len() < count {
            self.slots.resize(count, Value::Null);
        }
    }

    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn slot_type(&self, slot: usize) -> SlotType {
        match self.slot(slot) {
            Value::Null => SlotType::Null,
            Value::Bool(_) => SlotType::Bool,
            Value::Number(_) => SlotType::Number,
            Value::Bytes(_) => SlotType::String,
            Value::Opaque(_) => SlotType::Opaque,
        }
    }

    fn get_slot_bool(&self, slot: usize) -> bool {
        match self.slot(slot) {
            Value::Bool(value) => *value,
            other => panic!("slot {} holds {:?}, not a bool", slot, other),
        }
    }

    fn get_slot_number(&self, slot: usize) -> f64 {
        match self.slot(slot) {
            Value::Number(value) => *value,
            other => panic!("slot {} holds {:?}, not a number", slot, other),
        }
    }

    fn get_slot_bytes(&self, slot: usize) -> &[u8] {
        match self.slot(slot) {
            Value::Bytes(value) => value,
            other => panic!("slot {} holds {:?}, not a string", slot, other),
        }
    }

    fn get_slot_value(&mut self, slot: usize) -> ForeignPtr {
        let value = self.slot(slot).clone();
        self.root_value(value)
    }

    fn set_slot_null(&mut self, slot: usize) {
        self.ensure_slots(slot + 1);
        self.slots[slot] = Value::Null;
    }

    fn set_slot_bool(&mut self, slot: usize, value: bool) {
        self.ensure_slots(slot + 1);
        self.slots[slot] = Value::Bool(value);
    }

    fn set_slot_number(&mut self, slot: usize, value: f64) {
        self.ensure_slots(slot + 1);
        self.slots[slot] = Value::Number(value);
    }

    fn set_slot_string(&mut self, slot: usize, value: &str) {
        self.set_slot_bytes(slot, value.as_bytes());
    }

    fn set_slot_bytes(&mut self, slot: usize, value: &[u8]) {
        self.ensure_slots(slot + 1);
        self.slots[slot] = Value::Bytes(value.to_vec());
    }

    fn set_slot_value(&mut self, slot: usize, value: ForeignPtr) {
        self.ensure_slots(slot + 1);
        self.slots[slot] = self.heap_value(value);
    }

    fn get_variable(&mut self, module: &str, name: &str, slot: usize) -> bool {
        let key = (module.to_string(), name.to_string());
        match self.variables.get(&key).cloned() {
            Some(value) => {
                self.ensure_slots(slot + 1);
                self.slots[slot] = value;
                true
            }
            None => false,
        }
    }

    fn release_value(&mut self, value: ForeignPtr) {
        if self.heap.remove(&value.raw()).is_none() {
            panic!("double release of engine value {}", value);
        }
        self.released.push(value.raw());
    }

    fn push_fiber(&mut self) -> FiberId {
        self.stats.fibers_pushed += 1;
        let saved = std::mem::take(&mut self.slots);
        self.fibers.push(saved);
        FiberId::from_raw(self.fibers.len() - 1)
    }

    fn resume_fiber(&mut self, fiber: FiberId) {
        assert_eq!(
            fiber.raw() + 1,
            self.fibers.len(),
            "fibers must resume in LIFO order"
        );
        self.stats.fibers_resumed += 1;
        self.slots = self.fibers.pop().expect("no fiber to resume");
    }
}
