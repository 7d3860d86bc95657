//! Seam between the kernel and the device under test.
//!
//! A `Dut` only ever sees its ports: the kernel calls [`Dut::tick`] once per rising edge of
//! the port named by [`Dut::clock`], handing it the input values as they were *before* the
//! edge, and applies whatever the model drives onto its outputs in the same delta.

use std::collections::BTreeMap;

use crate::error::{SimError, SimResult};
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Driven by the testbench.
    Input,
    /// Driven by the device under test only.
    Output,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Port {
    pub name: String,
    pub width: u32,
    pub direction: Direction,
}

impl Port {
    pub fn input(name: &str, width: u32) -> Self {
        Port {
            name: name.to_string(),
            width,
            direction: Direction::Input,
        }
    }

    pub fn output(name: &str, width: u32) -> Self {
        Port {
            name: name.to_string(),
            width,
            direction: Direction::Output,
        }
    }
}

/// Pin table of the block-cipher core.
pub fn aes_core_ports() -> Vec<Port> {
    vec![
        Port::input("clk", 1),
        Port::input("rst", 1),
        Port::input("start", 1),
        Port::input("plaintext", 128),
        Port::input("userkey", 256),
        Port::output("busy", 1),
    ]
}

pub trait Dut {
    fn name(&self) -> &str;
    fn ports(&self) -> Vec<Port>;
    fn clock(&self) -> &str {
        "clk"
    }
    fn tick(&mut self, io: &mut DutIo<'_>) -> SimResult<()>;
}

impl<D: Dut + ?Sized> Dut for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }
    fn ports(&self) -> Vec<Port> {
        (**self).ports()
    }
    fn clock(&self) -> &str {
        (**self).clock()
    }
    fn tick(&mut self, io: &mut DutIo<'_>) -> SimResult<()> {
        (**self).tick(io)
    }
}

pub(crate) struct SignalSlot {
    pub(crate) name: String,
    pub(crate) width: u32,
    pub(crate) direction: Direction,
    pub(crate) value: Value,
}

pub struct DutIo<'a> {
    pub(crate) names: &'a BTreeMap<String, usize>,
    pub(crate) sampled: &'a [Value],
    pub(crate) slots: &'a [SignalSlot],
    // outputs land one delta after the edge that computed them
    pub(crate) staged: &'a mut Vec<(usize, Value)>,
}

impl<'a> DutIo<'a> {
    fn lookup(&self, name: &str) -> SimResult<usize> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| SimError::UnknownSignal(name.to_string()))
    }

    /// Value of `name` as sampled just before the clock edge.
    pub fn input(&self, name: &str) -> SimResult<Value> {
        Ok(self.sampled[self.lookup(name)?])
    }

    pub fn is_high(&self, name: &str) -> SimResult<bool> {
        Ok(self.input(name)?.is_high())
    }

    pub fn drive(&mut self, name: &str, value: Value) -> SimResult<()> {
        let handle = self.lookup(name)?;
        let slot = &self.slots[handle];
        if slot.direction != Direction::Output {
            return Err(SimError::UnknownSignal(format!("{} (not an output)", name)));
        }
        if value.width() > slot.width {
            return Err(SimError::WidthMismatch {
                signal: slot.name.clone(),
                width: slot.width,
                needed: value.width(),
            });
        }
        let value = Value::from_u256(slot.width, value.bits())?;
        self.staged.push((handle, value));
        Ok(())
    }

    pub fn drive_bit(&mut self, name: &str, high: bool) -> SimResult<()> {
        self.drive(name, Value::bit(high))
    }
}
