//! In-process event kernel: simulation time, signal storage, staged writes and delta
//! evaluation. Tasks never call into this directly; they go through `Sim`, `Signal` and
//! `Trigger`, which keep borrows of the kernel short.

use intmap::IntMap;
use std::collections::{BTreeMap, BTreeSet};

use crate::dut::{Direction, Dut, DutIo, Port, SignalSlot};
use crate::error::{SimError, SimResult};
use crate::trigger::EdgeKind;
use crate::value::Value;

#[derive(Debug, Hash, Clone, Copy, Eq, PartialEq)]
pub enum SimCallback {
    /// Absolute time in steps.
    Time(u64),
    Edge(usize),
    ReadWrite,
    ReadOnly,
}

enum CbKind {
    Time(u64),
    Edge(usize),
    ReadWrite,
    ReadOnly,
}

pub(crate) struct Kernel {
    time: u64,
    precision: i8,
    slots: Vec<SignalSlot>,
    names: BTreeMap<String, usize>,
    pending: Vec<(usize, Value)>,
    read_only: bool,
    finished: bool,
    cb_hdl_cnt: usize,
    cb_hdl_map: IntMap<CbKind>,
    time_set: BTreeSet<u64>,
    edge_watch: IntMap<usize>,
    rw: bool,
    ro: bool,
    dut: Option<(Box<dyn Dut>, usize)>,
}

impl Kernel {
    pub(crate) fn new(precision: i8) -> Self {
        Kernel {
            time: 0,
            precision,
            slots: Vec::new(),
            names: BTreeMap::new(),
            pending: Vec::new(),
            read_only: false,
            finished: false,
            cb_hdl_cnt: 0,
            cb_hdl_map: IntMap::new(),
            time_set: BTreeSet::new(),
            edge_watch: IntMap::new(),
            rw: false,
            ro: false,
            dut: None,
        }
    }

    pub(crate) fn declare(&mut self, port: &Port) -> SimResult<usize> {
        if self.names.contains_key(&port.name) {
            return Err(SimError::DuplicatePort(port.name.clone()));
        }
        let handle = self.slots.len();
        self.slots.push(SignalSlot {
            name: port.name.clone(),
            width: port.width,
            direction: port.direction,
            value: Value::zero(port.width)?,
        });
        self.names.insert(port.name.clone(), handle);
        log::trace!("declared {} ({} bits, {:?})", port.name, port.width, port.direction);
        Ok(handle)
    }

    pub(crate) fn attach(&mut self, dut: Box<dyn Dut>) -> SimResult<()> {
        for port in dut.ports() {
            self.declare(&port)?;
        }
        let clock = self.handle_by_name(dut.clock())?;
        log::debug!("attached {} clocked by {}", dut.name(), dut.clock());
        self.dut = Some((dut, clock));
        Ok(())
    }

    pub(crate) fn handle_by_name(&self, name: &str) -> SimResult<usize> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| SimError::UnknownSignal(name.to_string()))
    }

    pub(crate) fn port(&self, handle: usize) -> Port {
        let slot = &self.slots[handle];
        Port {
            name: slot.name.clone(),
            width: slot.width,
            direction: slot.direction,
        }
    }

    pub(crate) fn ports(&self) -> Vec<Port> {
        (0..self.slots.len()).map(|h| self.port(h)).collect()
    }

    pub(crate) fn value(&self, handle: usize) -> Value {
        self.slots[handle].value
    }

    /// Stages a write; it lands in the next delta of the current time step.
    pub(crate) fn deposit(&mut self, handle: usize, value: Value) -> SimResult<()> {
        let slot = &self.slots[handle];
        if slot.direction == Direction::Output {
            return Err(SimError::DrivenByDut(slot.name.clone()));
        }
        if self.read_only {
            return Err(SimError::WriteInReadOnly(slot.name.clone()));
        }
        let value = Value::from_u256(slot.width, value.bits()).map_err(|_| SimError::WidthMismatch {
            signal: slot.name.clone(),
            width: slot.width,
            needed: value.width(),
        })?;
        self.pending.push((handle, value));
        Ok(())
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Applies staged writes, ticks the DUT on a rising clock and returns every signal
    /// that changed in this delta, classified by edge. DUT outputs are staged for the next
    /// delta, so waiters on the clock edge run before they see the new outputs.
    pub(crate) fn eval_delta(&mut self) -> SimResult<Vec<(usize, EdgeKind)>> {
        let sampled: Vec<Value> = self.slots.iter().map(|s| s.value).collect();
        for (handle, value) in self.pending.drain(..) {
            self.slots[handle].value = value;
        }
        if let Some((dut, clock)) = self.dut.as_mut() {
            if sampled[*clock].is_zero() && self.slots[*clock].value.is_high() {
                let mut staged = Vec::new();
                let mut io = DutIo {
                    names: &self.names,
                    sampled: &sampled,
                    slots: &self.slots,
                    staged: &mut staged,
                };
                dut.tick(&mut io)?;
                self.pending.extend(staged);
            }
        }
        let mut changes = Vec::new();
        for (handle, (slot, before)) in self.slots.iter().zip(sampled.iter()).enumerate() {
            if slot.value != *before {
                let edge = match (before.is_zero(), slot.value.is_zero()) {
                    (true, false) => EdgeKind::Rising,
                    (false, true) => EdgeKind::Falling,
                    _ => EdgeKind::Any,
                };
                log::trace!("t={} {} -> {}", self.time, slot.name, slot.value);
                changes.push((handle, edge));
            }
        }
        Ok(changes)
    }

    pub(crate) fn is_watched(&self, handle: usize) -> bool {
        self.edge_watch.contains_key(handle as u64)
    }

    pub(crate) fn register_callback(&mut self, cb: SimCallback) -> usize {
        let cb_hdl = self.cb_hdl_cnt;
        self.cb_hdl_cnt += 1;
        let kind = match cb {
            SimCallback::Time(t_abs) => {
                self.time_set.insert(t_abs);
                CbKind::Time(t_abs)
            }
            SimCallback::Edge(sig_hdl) => {
                self.edge_watch.insert(sig_hdl as u64, cb_hdl);
                CbKind::Edge(sig_hdl)
            }
            SimCallback::ReadWrite => {
                self.rw = true;
                CbKind::ReadWrite
            }
            SimCallback::ReadOnly => {
                self.ro = true;
                CbKind::ReadOnly
            }
        };
        self.cb_hdl_map.insert(cb_hdl as u64, kind);
        cb_hdl
    }

    pub(crate) fn cancel_callback(&mut self, cb_hdl: usize) {
        match self.cb_hdl_map.remove(cb_hdl as u64) {
            Some(CbKind::Time(t_abs)) => {
                self.time_set.remove(&t_abs);
            }
            Some(CbKind::Edge(sig_hdl)) => {
                self.edge_watch.remove(sig_hdl as u64);
            }
            Some(CbKind::ReadWrite) => self.rw = false,
            Some(CbKind::ReadOnly) => self.ro = false,
            None => log::debug!("callback {} already gone", cb_hdl),
        }
    }

    pub(crate) fn next_time(&self) -> Option<u64> {
        self.time_set.iter().next().copied()
    }

    pub(crate) fn advance(&mut self, t_abs: u64) {
        self.time_set.remove(&t_abs);
        self.time = t_abs;
    }

    /// Clamps the clock to a deadline without firing anything.
    pub(crate) fn stop_at(&mut self, t_abs: u64) {
        self.time = t_abs;
    }

    pub(crate) fn take_rw(&mut self) -> bool {
        std::mem::take(&mut self.rw)
    }

    pub(crate) fn take_ro(&mut self) -> bool {
        std::mem::take(&mut self.ro)
    }

    pub(crate) fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub(crate) fn finish(&mut self) {
        self.finished = true;
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) fn clear_callbacks(&mut self) {
        self.cb_hdl_map = IntMap::new();
        self.time_set.clear();
        self.edge_watch = IntMap::new();
        self.rw = false;
        self.ro = false;
        self.pending.clear();
    }

    pub(crate) fn get_sim_time_steps(&self) -> u64 {
        self.time
    }

    pub(crate) fn get_sim_precision(&self) -> i8 {
        self.precision
    }

    pub(crate) fn get_sim_time(&self, unit: &str) -> SimResult<f64> {
        // does not preserve precision, only meant for reporting
        Ok(ldexp10(self.time as f64, self.precision - time_scale(unit)?))
    }

    pub(crate) fn get_sim_steps(&self, time: u64, unit: &str) -> SimResult<u64> {
        to_steps(time, unit, self.precision)
    }
}

pub(crate) fn to_steps(time: u64, unit: &str, precision: i8) -> SimResult<u64> {
    let exp = time_scale(unit)? - precision;
    if exp >= 0 {
        Ok(time * 10_u64.pow(exp as u32))
    } else {
        let div = 10_u64.pow((-exp) as u32);
        if time % div == 0 {
            Ok(time / div)
        } else {
            Err(SimError::TimeRounding {
                time,
                unit: unit.to_string(),
                precision,
            })
        }
    }
}

pub(crate) fn time_scale(unit: &str) -> SimResult<i8> {
    match unit {
        "fs" => Ok(-15),
        "ps" => Ok(-12),
        "ns" => Ok(-9),
        "us" => Ok(-6),
        "ms" => Ok(-3),
        "sec" => Ok(0),
        _ => Err(SimError::UnknownTimeUnit(unit.to_string())),
    }
}

pub(crate) fn ldexp10(frac: f64, exp: i8) -> f64 {
    // Like math.ldexp, but base 10
    if exp >= 0 {
        frac * 10_u64.pow(exp as u32) as f64
    } else {
        let div = 10_u64.pow(-exp as u32) as f64;
        frac / div
    }
}
