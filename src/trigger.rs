use intmap::IntMap;
use std::cell::Cell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::kernel::SimCallback;
use crate::signal::Signal;
use crate::sim::Sim;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum EdgeKind {
    Any,
    Rising,
    Falling,
}

pub(crate) struct CallbackHandles {
    handle: Option<usize>,
    callbacks: VecDeque<TrigShared>,
}

impl CallbackHandles {
    fn empty() -> Self {
        CallbackHandles {
            handle: None,
            callbacks: VecDeque::new(),
        }
    }
}

/// Pending triggers of one simulation, keyed the way the kernel reports them.
pub(crate) struct TriggerTable {
    // key is signal handle
    edges: IntMap<CallbackHandles>,
    // key is absolute callback time
    timers: IntMap<CallbackHandles>,
    read_only: CallbackHandles,
    read_write: CallbackHandles,
}

impl TriggerTable {
    pub(crate) fn new() -> Self {
        TriggerTable {
            edges: IntMap::new(),
            timers: IntMap::new(),
            read_only: CallbackHandles::empty(),
            read_write: CallbackHandles::empty(),
        }
    }

    pub(crate) fn clear(&mut self) {
        *self = TriggerTable::new();
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TrigShared {
    waker: Waker,
    fired: Rc<Cell<bool>>,
    // rising/falling waiters share one edge callback per signal
    edge_kind: EdgeKind,
}

impl TrigShared {
    fn fire(self) {
        self.fired.set(true);
        self.waker.wake();
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TrigKind {
    Edge(usize, EdgeKind),
    Timer(u64),
    ReadWrite,
    ReadOnly,
}

/// One-shot wait on a simulation event. Awaiting a trigger twice waits twice; each
/// `Trigger` value only ever fires once.
pub struct Trigger {
    sim: Sim,
    kind: TrigKind,
    fired: Option<Rc<Cell<bool>>>,
}

impl Trigger {
    pub(crate) fn new(sim: Sim, kind: TrigKind) -> Self {
        Trigger {
            sim,
            kind,
            fired: None,
        }
    }

    pub fn edge_of(signal: &Signal, edge_kind: EdgeKind) -> Self {
        Trigger::new(signal.sim().clone(), TrigKind::Edge(signal.handle(), edge_kind))
    }
    pub fn edge(signal: &Signal) -> Self {
        Trigger::edge_of(signal, EdgeKind::Any)
    }
    pub fn rising_edge(signal: &Signal) -> Self {
        Trigger::edge_of(signal, EdgeKind::Rising)
    }
    pub fn falling_edge(signal: &Signal) -> Self {
        Trigger::edge_of(signal, EdgeKind::Falling)
    }

    fn register(&self, shared: TrigShared) {
        let inner = self.sim.inner();
        let mut table = inner.triggers.borrow_mut();
        match self.kind {
            TrigKind::ReadWrite => {
                table.read_write.callbacks.push_back(shared);
                if table.read_write.handle.is_none() {
                    let cb_hdl = inner.kernel.borrow_mut().register_callback(SimCallback::ReadWrite);
                    table.read_write.handle.replace(cb_hdl);
                }
            }
            TrigKind::ReadOnly => {
                table.read_only.callbacks.push_back(shared);
                if table.read_only.handle.is_none() {
                    let cb_hdl = inner.kernel.borrow_mut().register_callback(SimCallback::ReadOnly);
                    table.read_only.handle.replace(cb_hdl);
                }
            }
            TrigKind::Timer(steps) => {
                let abs_time = steps + inner.kernel.borrow().get_sim_time_steps();
                if let Some(callbacks) = table.timers.get_mut(abs_time) {
                    callbacks.callbacks.push_back(shared);
                } else {
                    let handle = inner
                        .kernel
                        .borrow_mut()
                        .register_callback(SimCallback::Time(abs_time));
                    let mut callbacks = VecDeque::new();
                    callbacks.push_back(shared);
                    table.timers.insert(
                        abs_time,
                        CallbackHandles {
                            handle: Some(handle),
                            callbacks,
                        },
                    );
                }
            }
            TrigKind::Edge(sig_hdl, _) => {
                if let Some(callbacks) = table.edges.get_mut(sig_hdl as u64) {
                    callbacks.callbacks.push_back(shared);
                } else {
                    let handle = inner
                        .kernel
                        .borrow_mut()
                        .register_callback(SimCallback::Edge(sig_hdl));
                    let mut callbacks = VecDeque::new();
                    callbacks.push_back(shared);
                    table.edges.insert(
                        sig_hdl as u64,
                        CallbackHandles {
                            handle: Some(handle),
                            callbacks,
                        },
                    );
                }
            }
        }
    }
}

impl Future for Trigger {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(fired) = &self.fired {
            // a wake from somewhere else must not complete the trigger early
            return if fired.get() {
                Poll::Ready(())
            } else {
                Poll::Pending
            };
        }
        if let TrigKind::Timer(0) = self.kind {
            return Poll::Ready(());
        }
        let fired = Rc::new(Cell::new(false));
        let edge_kind = match self.kind {
            TrigKind::Edge(_, edge_kind) => edge_kind,
            _ => EdgeKind::Any,
        };
        self.register(TrigShared {
            waker: cx.waker().clone(),
            fired: fired.clone(),
            edge_kind,
        });
        self.fired = Some(fired);
        Poll::Pending
    }
}

/// Fires every trigger waiting on `events` and runs the woken tasks. All events of one
/// delta are collected before anything runs, so a task that re-arms on a signal that changed
/// in the same delta waits for the next change.
pub(crate) fn react(sim: &Sim, events: &[(SimCallback, Option<EdgeKind>)]) {
    let inner = sim.inner();
    let mut vec_wake: Vec<TrigShared> = Vec::new();
    {
        let mut table = inner.triggers.borrow_mut();
        for (cb, edge) in events {
            match cb {
                SimCallback::ReadWrite => {
                    // callback is done now
                    if let Some(handle) = table.read_write.handle.take() {
                        inner.kernel.borrow_mut().cancel_callback(handle);
                    }
                    vec_wake.extend(std::mem::take(&mut table.read_write.callbacks));
                }
                SimCallback::ReadOnly => {
                    if let Some(handle) = table.read_only.handle.take() {
                        inner.kernel.borrow_mut().cancel_callback(handle);
                    }
                    vec_wake.extend(std::mem::take(&mut table.read_only.callbacks));
                }
                SimCallback::Time(t) => {
                    if let Some(callbacks) = table.timers.remove(*t) {
                        if let Some(handle) = callbacks.handle {
                            inner.kernel.borrow_mut().cancel_callback(handle);
                        }
                        vec_wake.extend(callbacks.callbacks);
                    } else {
                        log::debug!("timer callback at {} without waiters", t);
                    }
                }
                SimCallback::Edge(sig_hdl) => {
                    let edge = edge.unwrap_or(EdgeKind::Any);
                    if let Some(mut callbacks) = table.edges.remove(*sig_hdl as u64) {
                        let mut vec_resched: VecDeque<TrigShared> = VecDeque::new();
                        for trig in callbacks.callbacks.drain(..) {
                            if trig.edge_kind == EdgeKind::Any || trig.edge_kind == edge {
                                vec_wake.push(trig);
                            } else {
                                vec_resched.push_back(trig);
                            }
                        }
                        if vec_resched.is_empty() {
                            // no waiters left on this signal
                            if let Some(handle) = callbacks.handle {
                                inner.kernel.borrow_mut().cancel_callback(handle);
                            }
                        } else {
                            callbacks.callbacks = vec_resched;
                            table.edges.insert(*sig_hdl as u64, callbacks);
                        }
                    }
                }
            }
        }
    }

    if !vec_wake.is_empty() {
        log::trace!("waking {} trigger(s)", vec_wake.len());
        for shared in vec_wake {
            shared.fire();
        }
        // execute woken tasks
        inner.executor.run_once();
    }
}
