use futures::FutureExt;
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use crate::dut::{Dut, Port};
use crate::error::{SimError, SimResult};
use crate::executor::{self, Executor, JoinHandle};
use crate::kernel::{Kernel, SimCallback};
use crate::signal::Signal;
use crate::trigger::{self, TrigKind, Trigger, TriggerTable};

#[derive(Clone, Debug)]
pub struct SimConfig {
    /// Duration of one simulation step as a power of ten seconds.
    pub precision: i8,
    /// Environment-side liveness guard; `None` lets a stuck test run forever.
    pub deadline: Option<(u64, &'static str)>,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            precision: -12,
            deadline: None,
        }
    }
}

impl SimConfig {
    pub fn precision(mut self, precision: i8) -> Self {
        self.precision = precision;
        self
    }

    pub fn deadline(mut self, time: u64, unit: &'static str) -> Self {
        self.deadline = Some((time, unit));
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// `Sim::finish` was called.
    Finished,
    /// Nothing left to wait for.
    Idle,
    /// The configured deadline passed first.
    Deadline,
}

pub(crate) struct SimInner {
    pub(crate) kernel: RefCell<Kernel>,
    pub(crate) triggers: RefCell<TriggerTable>,
    pub(crate) executor: Executor,
    config: SimConfig,
}

/// Handle to one simulation. Clones share the same kernel; nothing is global, so
/// independent simulations can live side by side.
#[derive(Clone)]
pub struct Sim(Rc<SimInner>);

impl Sim {
    pub fn new(config: SimConfig) -> Self {
        Sim(Rc::new(SimInner {
            kernel: RefCell::new(Kernel::new(config.precision)),
            triggers: RefCell::new(TriggerTable::new()),
            executor: Executor::new(),
            config,
        }))
    }

    /// Builds a simulation with the ports of `dut` declared and the model attached.
    pub fn with_dut(config: SimConfig, dut: impl Dut + 'static) -> SimResult<Self> {
        let sim = Sim::new(config);
        sim.0.kernel.borrow_mut().attach(Box::new(dut))?;
        Ok(sim)
    }

    pub(crate) fn inner(&self) -> &SimInner {
        &self.0
    }

    /// Declares a testbench-owned signal (not connected to any model).
    pub fn declare(&self, name: &str, width: u32) -> SimResult<Signal> {
        let handle = self.0.kernel.borrow_mut().declare(&Port::input(name, width))?;
        Ok(Signal::new(self.clone(), handle, name, width))
    }

    pub fn signal(&self, name: &str) -> SimResult<Signal> {
        let port = {
            let kernel = self.0.kernel.borrow();
            let handle = kernel.handle_by_name(name)?;
            (handle, kernel.port(handle))
        };
        let (handle, port) = port;
        Ok(Signal::new(self.clone(), handle, &port.name, port.width))
    }

    pub fn ports(&self) -> Vec<Port> {
        self.0.kernel.borrow().ports()
    }

    /// Current time in steps.
    pub fn now(&self) -> u64 {
        self.0.kernel.borrow().get_sim_time_steps()
    }

    pub fn time_in(&self, unit: &str) -> SimResult<f64> {
        self.0.kernel.borrow().get_sim_time(unit)
    }

    pub fn steps(&self, time: u64, unit: &str) -> SimResult<u64> {
        self.0.kernel.borrow().get_sim_steps(time, unit)
    }

    pub fn precision(&self) -> i8 {
        self.0.kernel.borrow().get_sim_precision()
    }

    pub fn log(&self, msg: &str) {
        let t = self.time_in("ns").unwrap_or(f64::NAN);
        log::info!("{:>12.3}ns {}", t, msg);
    }

    pub fn timer(&self, time: u64, unit: &str) -> SimResult<Trigger> {
        Ok(self.timer_steps(self.steps(time, unit)?))
    }

    pub fn timer_steps(&self, steps: u64) -> Trigger {
        Trigger::new(self.clone(), TrigKind::Timer(steps))
    }

    pub fn read_write(&self) -> Trigger {
        Trigger::new(self.clone(), TrigKind::ReadWrite)
    }

    pub fn read_only(&self) -> Trigger {
        Trigger::new(self.clone(), TrigKind::ReadOnly)
    }

    pub fn fork<T: 'static>(
        &self,
        future: impl Future<Output = SimResult<T>> + 'static,
    ) -> JoinHandle<T> {
        self.spawn(future, "forked")
    }

    pub fn spawn<T: 'static>(
        &self,
        future: impl Future<Output = SimResult<T>> + 'static,
        name: &str,
    ) -> JoinHandle<T> {
        let (fut, join_rx) = executor::wrap(future);
        let id = self.0.executor.spawn(fut, name);
        JoinHandle::new(id, Rc::downgrade(&self.0), join_rx)
    }

    /// Stops the run loop after the current time step.
    pub fn finish(&self) {
        self.0.kernel.borrow_mut().finish();
    }

    /// Runs until finished, idle, or past the deadline.
    pub fn run(&self) -> SimResult<RunOutcome> {
        let deadline = match self.0.config.deadline {
            Some((time, unit)) => Some(self.steps(time, unit)?),
            None => None,
        };
        self.0.executor.run_once();
        self.settle()?;
        loop {
            if self.0.kernel.borrow().is_finished() {
                return Ok(RunOutcome::Finished);
            }
            let next = self.0.kernel.borrow().next_time();
            let t = match next {
                Some(t) => t,
                None => return Ok(RunOutcome::Idle),
            };
            if let Some(deadline) = deadline {
                if t > deadline {
                    self.0.kernel.borrow_mut().stop_at(deadline);
                    return Ok(RunOutcome::Deadline);
                }
            }
            self.0.kernel.borrow_mut().advance(t);
            trigger::react(self, &[(SimCallback::Time(t), None)]);
            self.settle()?;
        }
    }

    // delta cycles, then read-write, then read-only
    fn settle(&self) -> SimResult<()> {
        loop {
            while self.0.kernel.borrow().has_pending() {
                let events: Vec<(SimCallback, Option<_>)> = {
                    let mut kernel = self.0.kernel.borrow_mut();
                    kernel
                        .eval_delta()?
                        .into_iter()
                        .filter(|(handle, _)| kernel.is_watched(*handle))
                        .map(|(handle, edge)| (SimCallback::Edge(handle), Some(edge)))
                        .collect()
                };
                if !events.is_empty() {
                    trigger::react(self, &events);
                }
            }
            let rw = self.0.kernel.borrow_mut().take_rw();
            if !rw {
                break;
            }
            trigger::react(self, &[(SimCallback::ReadWrite, None)]);
        }
        let ro = self.0.kernel.borrow_mut().take_ro();
        if ro {
            self.0.kernel.borrow_mut().set_read_only(true);
            trigger::react(self, &[(SimCallback::ReadOnly, None)]);
            self.0.kernel.borrow_mut().set_read_only(false);
        }
        Ok(())
    }

    /// Runs `future` as the top-level task of this simulation and returns its result.
    /// The simulation ends as soon as the task does; forked helpers such as free-running
    /// clocks are torn down with it.
    pub fn block_on<T: 'static>(
        &self,
        future: impl Future<Output = SimResult<T>> + 'static,
    ) -> SimResult<T> {
        let sim = self.clone();
        let handle = self.spawn(
            async move {
                let result = future.await;
                sim.finish();
                result
            },
            "main",
        );
        let outcome = self.run();
        let now = self.now();
        self.tear_down();
        match outcome? {
            RunOutcome::Finished => handle.now_or_never().unwrap_or(Err(SimError::Cancelled)),
            RunOutcome::Idle => Err(SimError::Stalled(now)),
            RunOutcome::Deadline => Err(SimError::DeadlineExceeded(now)),
        }
    }

    /// Drops all tasks and pending callbacks.
    pub fn tear_down(&self) {
        self.0.executor.clear();
        self.0.triggers.borrow_mut().clear();
        self.0.kernel.borrow_mut().clear_callbacks();
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn forked_task_result_is_joined() {
        let sim = Sim::new(SimConfig::default().precision(-9));
        let sim2 = sim.clone();
        let result = sim
            .block_on(async move {
                let sim3 = sim2.clone();
                let child = sim2.fork(async move {
                    sim3.timer(15, "ns")?.await;
                    Ok(sim3.now() * 2)
                });
                child.await
            })
            .unwrap();
        assert_eq!(result, 30);
    }

    #[test]
    fn cancelled_task_joins_with_error() {
        let sim = Sim::new(SimConfig::default().precision(-9));
        let sim2 = sim.clone();
        let result = sim.block_on(async move {
            let sim3 = sim2.clone();
            let child = sim2.fork(async move {
                sim3.timer(100, "ns")?.await;
                Ok(())
            });
            sim2.timer(10, "ns")?.await;
            child.cancel();
            assert!(child.is_finished());
            child.await
        });
        assert!(matches!(result, Err(SimError::Cancelled)));
    }

    #[test]
    fn nothing_to_wait_for_is_a_stall() {
        let sim = Sim::new(SimConfig::default().precision(-9));
        let sig = sim.declare("never", 1).unwrap();
        let result = sim.block_on(async move {
            sig.rising_edge().await;
            Ok(())
        });
        assert!(matches!(result, Err(SimError::Stalled(0))));
    }

    #[test]
    fn deadline_stops_a_runaway_test() {
        let sim = Sim::new(SimConfig::default().precision(-9).deadline(1, "us"));
        let sim2 = sim.clone();
        let result = sim.block_on::<()>(async move {
            loop {
                sim2.timer(7, "ns")?.await;
            }
        });
        assert!(matches!(result, Err(SimError::DeadlineExceeded(1000))));
    }

    #[test]
    fn unknown_signal() {
        let sim = Sim::new(SimConfig::default());
        assert!(matches!(sim.signal("nope"), Err(SimError::UnknownSignal(_))));
    }
}
