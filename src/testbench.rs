use crate::error::SimResult;
use crate::executor::JoinHandle;
use crate::signal::Signal;

/*
 * CLOCK
 */
#[derive(Clone, Debug)]
pub struct ClockGenerator {
    clk: Signal,
    period: u64,
    start_high: bool,
}

impl ClockGenerator {
    /// `period` is in simulation steps.
    pub fn new(clk: Signal, period: u64) -> Self {
        ClockGenerator {
            clk,
            period,
            start_high: true,
        }
    }

    /// Starting high puts the rising edges at 0, period, 2*period, ...
    pub fn start_high(mut self, start_high: bool) -> Self {
        self.start_high = start_high;
        self
    }

    pub fn start(self) -> ClockHandle {
        let sim = self.clk.sim().clone();
        let name = format!("clock({})", self.clk.name());
        let task = sim.spawn(clock(self.clk, self.period, self.start_high), &name);
        ClockHandle { task }
    }
}

/// Lifetime of a started clock. Dropping the handle leaves the clock running until the
/// simulation is torn down; `stop` ends it at the current instant.
pub struct ClockHandle {
    task: JoinHandle<()>,
}

impl ClockHandle {
    pub fn stop(self) {
        self.task.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

#[allow(unreachable_code)]
pub async fn clock(clk: Signal, period: u64, start_high: bool) -> SimResult<()> {
    let high_t = period / 2;
    let low_t = period - high_t;
    if period % 2 != 0 {
        log::warn!(
            "Clock period of {} steps not dividable by 2. High time will be {}; low time will be {}.",
            period,
            high_t,
            low_t
        );
    }
    let sim = clk.sim().clone();
    if start_high {
        loop {
            clk.set(1)?;
            sim.timer_steps(high_t).await;
            clk.set(0)?;
            sim.timer_steps(low_t).await;
        }
    } else {
        loop {
            clk.set(0)?;
            sim.timer_steps(low_t).await;
            clk.set(1)?;
            sim.timer_steps(high_t).await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    fn record_edges(sim: &Sim, sig: &Signal) -> Shared<Vec<(u64, bool)>> {
        let seen = Shared::new(Vec::new());
        let (sig, rec, sim2) = (sig.clone(), seen.clone(), sim.clone());
        sim.fork::<()>(async move {
            loop {
                sig.edge().await;
                rec.get_mut().push((sim2.now(), sig.is_high()));
            }
        });
        seen
    }

    #[test]
    fn starts_high_with_rising_edges_on_period_multiples() {
        let sim = Sim::new(SimConfig::default().precision(-9));
        let clk = sim.declare("clk", 1).unwrap();
        let seen = record_edges(&sim, &clk);
        let sim2 = sim.clone();
        sim.block_on(async move {
            let handle = ClockGenerator::new(clk, 10).start();
            sim2.timer(35, "ns")?.await;
            handle.stop();
            Ok(())
        })
        .unwrap();
        assert_eq!(
            *seen.get(),
            vec![(0, true), (5, false), (10, true), (15, false), (20, true), (25, false), (30, true)]
        );
    }

    #[test]
    fn odd_period_gives_longer_low_phase() {
        let sim = Sim::new(SimConfig::default().precision(-9));
        let clk = sim.declare("clk", 1).unwrap();
        let seen = record_edges(&sim, &clk);
        let sim2 = sim.clone();
        sim.block_on(async move {
            let _clock = ClockGenerator::new(clk, 7).start_high(false).start();
            sim2.timer(15, "ns")?.await;
            Ok(())
        })
        .unwrap();
        // low 4, high 3
        assert_eq!(*seen.get(), vec![(4, true), (7, false), (11, true), (14, false)]);
    }

    #[test]
    fn stopped_clock_holds_its_level() {
        let sim = Sim::new(SimConfig::default().precision(-9));
        let clk = sim.declare("clk", 1).unwrap();
        let sim2 = sim.clone();
        let clk2 = clk.clone();
        let level = sim
            .block_on(async move {
                let handle = ClockGenerator::new(clk2.clone(), 10).start();
                sim2.timer(12, "ns")?.await;
                assert!(handle.is_running());
                handle.stop();
                sim2.timer(50, "ns")?.await;
                Ok(clk2.is_high())
            })
            .unwrap();
        assert!(level);
    }
}
