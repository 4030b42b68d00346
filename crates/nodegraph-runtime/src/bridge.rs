//! By-name access to a live instance.
//!
//! A [`Bridge`] wraps either an interpreted graph instance or a compiled
//! instance implementing [`RuntimeAccessible`](nodegraph_exec::RuntimeAccessible).
//! Which one is decided once, when the bridge is created; every call after
//! that goes straight to the chosen path.
//!
//! Writes through one bridge (and its clones) are serialized, so
//! [`Bridge::compound_assign`] is a single read-modify-write from the caller's
//! point of view.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use nodegraph_core::ops::AssignOp;
use nodegraph_exec::eval::eval_binary;
use nodegraph_exec::{Interpreter, Object, ObjectRef, RuntimeError, Scheduler, TaskId, Value};

use crate::error::BridgeError;

#[derive(Clone)]
enum Access {
    Interpreted(Interpreter),
    Compiled,
}

/// Handle to a live instance with by-name member access.
#[derive(Clone)]
pub struct Bridge {
    type_name: Arc<str>,
    object: ObjectRef,
    access: Access,
    writes: Arc<Mutex<()>>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("type_name", &self.type_name)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

fn apply(op: AssignOp, current: &Value, operand: &Value) -> Result<Value, BridgeError> {
    match op.binary() {
        None => Ok(operand.clone()),
        Some(binary) => eval_binary(binary, current, operand).map_err(BridgeError::Fault),
    }
}

/// Strict identity of a stored value. Unlike `==`, floats compare by bits
/// and never equal an int.
fn unchanged(stored: &Value, read: &Value) -> bool {
    match (stored, read) {
        (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
        (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => false,
        _ => stored == read,
    }
}

impl Bridge {
    /// Wraps an instance. `interp` serves interpreted instances and is not
    /// used for compiled ones.
    pub fn new(interp: Interpreter, object: ObjectRef) -> Self {
        let (type_name, access) = match &*object.lock() {
            Object::Graph(state) => (state.ty.to_string(), Access::Interpreted(interp)),
            Object::Native(native) => (native.type_name().to_string(), Access::Compiled),
        };
        debug!(ty = %type_name, compiled = matches!(access, Access::Compiled), "bridge created");
        Bridge {
            type_name: type_name.into(),
            object,
            access,
            writes: Arc::new(Mutex::new(())),
        }
    }

    /// Full name of the instance's type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_compiled(&self) -> bool {
        matches!(self.access, Access::Compiled)
    }

    /// The instance as a runtime value.
    pub fn value(&self) -> Value {
        Value::Object(Arc::clone(&self.object))
    }

    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    fn compiled_mismatch(&self) -> BridgeError {
        BridgeError::Fault(RuntimeError::NotInvocable {
            target: self.type_name.to_string(),
        })
    }

    fn read(&self, name: &str) -> Result<Value, BridgeError> {
        match &self.access {
            Access::Interpreted(interp) => Ok(interp.get_member(&self.value(), name)?),
            Access::Compiled => match &*self.object.lock() {
                Object::Native(native) => Ok(native.get_member(name)?),
                Object::Graph(_) => Err(self.compiled_mismatch()),
            },
        }
    }

    fn write(&self, name: &str, value: Value) -> Result<(), BridgeError> {
        match &self.access {
            Access::Interpreted(interp) => Ok(interp.set_member(&self.value(), name, value)?),
            Access::Compiled => match &mut *self.object.lock() {
                Object::Native(native) => Ok(native.set_member(name, value)?),
                Object::Graph(_) => Err(self.compiled_mismatch()),
            },
        }
    }

    /// Reads a variable or property.
    pub fn get(&self, name: &str) -> Result<Value, BridgeError> {
        self.read(name)
    }

    /// Writes a variable or property.
    pub fn set(&self, name: &str, value: Value) -> Result<(), BridgeError> {
        let _writes = self.writes.lock();
        self.write(name, value)
    }

    /// Calls a function with positional arguments.
    pub fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Value, BridgeError> {
        match &self.access {
            Access::Interpreted(interp) => Ok(interp.invoke_member(&self.value(), name, args)?),
            Access::Compiled => match &mut *self.object.lock() {
                Object::Native(native) => Ok(native.invoke_member(name, args)?),
                Object::Graph(_) => Err(self.compiled_mismatch()),
            },
        }
    }

    /// `name op= operand`, returning the stored value.
    ///
    /// The operator is evaluated with no instance lock held, since formatting
    /// or type-checking an operand may lock the instance itself. A stored
    /// field of an interpreted instance is then written only if it still
    /// holds the value that was read, retrying otherwise, so writers going
    /// through other bridges over the same instance lose no updates.
    /// Accessor properties and compiled members run their read and write
    /// while holding the bridge's write lock.
    pub fn compound_assign(
        &self,
        name: &str,
        op: AssignOp,
        operand: Value,
    ) -> Result<Value, BridgeError> {
        let _writes = self.writes.lock();
        if let Access::Interpreted(_) = self.access {
            loop {
                let Some(current) = self.stored_field(name) else {
                    break;
                };
                let next = apply(op, &current, &operand)?;
                let mut object = self.object.lock();
                let Some(slot) = object.as_graph_mut().and_then(|g| g.fields.get_mut(name)) else {
                    break;
                };
                if unchanged(slot, &current) {
                    *slot = next.clone();
                    return Ok(next);
                }
                debug!(ty = %self.type_name, member = name, "field changed during compound assignment, retrying");
            }
        }
        let next = apply(op, &self.read(name)?, &operand)?;
        self.write(name, next.clone())?;
        Ok(next)
    }

    fn stored_field(&self, name: &str) -> Option<Value> {
        self.object
            .lock()
            .as_graph()
            .and_then(|g| g.fields.get(name))
            .cloned()
    }

    /// Invokes a cooperative function and schedules the resulting coroutine.
    pub fn start(
        &self,
        name: &str,
        args: Vec<Value>,
        scheduler: &mut Scheduler,
    ) -> Result<TaskId, BridgeError> {
        let coroutine = self.invoke(name, args)?;
        scheduler.start_value(coroutine).map_err(BridgeError::Fault)
    }
}
