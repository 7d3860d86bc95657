use futures::future::{FutureExt, LocalBoxFuture};
use futures::task::{waker_ref, ArcWake, Context, Poll};
use futures_channel::oneshot;
use intmap::IntMap;
use queues::{IsQueue, Queue};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Weak;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{SimError, SimResult};
use crate::sim::SimInner;

// Wakers only carry the task id, so they stay Send + Sync while the futures they wake are
// local to the simulation thread.
struct TaskWaker {
    id: u64,
    ready: Arc<Mutex<Queue<u64>>>,
}

impl ArcWake for TaskWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        let mut queue = arc_self.ready.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = queue.add(arc_self.id);
    }
}

struct Task {
    future: Option<LocalBoxFuture<'static, ()>>,
    waker: Arc<TaskWaker>,
    name: String,
}

pub(crate) struct Executor {
    ready: Arc<Mutex<Queue<u64>>>,
    tasks: RefCell<IntMap<Task>>,
    next_id: Cell<u64>,
}

impl Executor {
    pub(crate) fn new() -> Self {
        Executor {
            ready: Arc::new(Mutex::new(Queue::new())),
            tasks: RefCell::new(IntMap::new()),
            next_id: Cell::new(0),
        }
    }

    fn ready_queue(&self) -> MutexGuard<'_, Queue<u64>> {
        self.ready.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn spawn(&self, fut: LocalBoxFuture<'static, ()>, name: &str) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let waker = Arc::new(TaskWaker {
            id,
            ready: self.ready.clone(),
        });
        self.tasks.borrow_mut().insert(
            id,
            Task {
                future: Some(fut),
                waker,
                name: name.to_string(),
            },
        );
        let _ = self.ready_queue().add(id);
        id
    }

    fn next_task(&self) -> Option<u64> {
        self.ready_queue().remove().ok()
    }

    /// Polls ready tasks until none is left.
    pub(crate) fn run_once(&self) {
        while let Some(id) = self.next_task() {
            self.process_task(id);
        }
    }

    fn process_task(&self, id: u64) {
        // take the future out so the task table is not borrowed while it runs
        let slot = {
            let mut tasks = self.tasks.borrow_mut();
            tasks
                .get_mut(id)
                .and_then(|t| t.future.take().map(|fut| (fut, t.waker.clone())))
        };
        let (mut fut, waker) = match slot {
            Some(slot) => slot,
            // cancelled, finished, or woken twice while running
            None => return,
        };
        let waker = waker_ref(&waker);
        let context = &mut Context::from_waker(&*waker);
        match fut.as_mut().poll(context) {
            Poll::Pending => {
                if let Some(task) = self.tasks.borrow_mut().get_mut(id) {
                    task.future = Some(fut);
                }
            }
            Poll::Ready(()) => {
                if let Some(task) = self.tasks.borrow_mut().remove(id) {
                    log::debug!("task {} ({}) done", id, task.name);
                }
            }
        }
    }

    pub(crate) fn cancel(&self, id: u64) {
        if let Some(task) = self.tasks.borrow_mut().remove(id) {
            log::debug!("task {} ({}) cancelled", id, task.name);
        }
    }

    pub(crate) fn is_alive(&self, id: u64) -> bool {
        self.tasks.borrow().contains_key(id)
    }

    /// Drops every task. Futures hold `Sim` handles, so this is what breaks the cycles.
    pub(crate) fn clear(&self) {
        let tasks = std::mem::replace(&mut *self.tasks.borrow_mut(), IntMap::new());
        drop(tasks);
        *self.ready_queue() = Queue::new();
    }
}

pub(crate) fn wrap<T: 'static>(
    future: impl Future<Output = SimResult<T>> + 'static,
) -> (LocalBoxFuture<'static, ()>, oneshot::Receiver<SimResult<T>>) {
    let (tx, rx) = oneshot::channel();
    let fut = async move {
        let result = future.await;
        let _ = tx.send(result);
    }
    .boxed_local();
    (fut, rx)
}

/// Resolves to the forked task's result, or `Cancelled` if the task was dropped first.
pub struct JoinHandle<T> {
    id: u64,
    sim: Weak<SimInner>,
    join_rx: oneshot::Receiver<SimResult<T>>,
}

impl<T> JoinHandle<T> {
    pub(crate) fn new(id: u64, sim: Weak<SimInner>, join_rx: oneshot::Receiver<SimResult<T>>) -> Self {
        JoinHandle { id, sim, join_rx }
    }

    pub fn cancel(&self) {
        if let Some(sim) = self.sim.upgrade() {
            sim.executor.cancel(self.id);
        }
    }

    pub fn is_finished(&self) -> bool {
        match self.sim.upgrade() {
            Some(sim) => !sim.executor.is_alive(self.id),
            None => true,
        }
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = SimResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.join_rx.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(SimError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}
