use std::fmt;
use std::rc::Rc;

use crate::error::{SimError, SimResult};
use crate::sim::Sim;
use crate::trigger::Trigger;
use crate::value::Value;

/// Handle to one signal of a simulation.
#[derive(Clone)]
pub struct Signal {
    sim: Sim,
    handle: usize,
    name: Rc<str>,
    width: u32,
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .field("width", &self.width)
            .finish()
    }
}

impl Signal {
    pub(crate) fn new(sim: Sim, handle: usize, name: &str, width: u32) -> Self {
        Signal {
            sim,
            handle,
            name: Rc::from(name),
            width,
        }
    }

    pub fn handle(&self) -> usize {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn sim(&self) -> &Sim {
        &self.sim
    }

    pub fn value(&self) -> Value {
        self.sim.inner().kernel.borrow().value(self.handle)
    }

    pub fn u32(&self) -> u32 {
        self.value().u32()
    }

    pub fn is_high(&self) -> bool {
        self.value().is_high()
    }

    pub fn bin(&self) -> String {
        self.value().bin()
    }

    /// Stages `value`; readers see it after the next delta.
    pub fn set_value(&self, value: Value) -> SimResult<()> {
        self.sim
            .inner()
            .kernel
            .borrow_mut()
            .deposit(self.handle, value)
    }

    pub fn set(&self, val: u128) -> SimResult<()> {
        self.set_value(Value::from_u128(self.width, val).map_err(|e| self.rename(e))?)
    }

    pub fn set_hex(&self, val: &str) -> SimResult<()> {
        self.set_value(Value::from_hex(self.width, val).map_err(|e| self.rename(e))?)
    }

    pub fn clear(&self) -> SimResult<()> {
        self.set_value(Value::zero(self.width)?)
    }

    fn rename(&self, err: SimError) -> SimError {
        match err {
            SimError::WidthMismatch { width, needed, .. } => {
                SimError::WidthMismatch {
                    signal: self.name.to_string(),
                    width,
                    needed,
                }
            }
            other => other,
        }
    }

    // convenience functions to get edge triggers for this signal
    pub fn rising_edge(&self) -> Trigger {
        Trigger::rising_edge(self)
    }
    pub fn falling_edge(&self) -> Trigger {
        Trigger::falling_edge(self)
    }
    pub fn edge(&self) -> Trigger {
        Trigger::edge(self)
    }
}
