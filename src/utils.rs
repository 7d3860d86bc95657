use rand as rnd;

use crate::error::SimResult;
use crate::signal::Signal;

/// Waits for `n_cycles` rising edges of `signal`.
pub async fn clock_cycles(signal: &Signal, n_cycles: u32) -> SimResult<()> {
    for _ in 0..n_cycles {
        signal.rising_edge().await;
    }
    Ok(())
}

#[inline]
pub fn rand() -> f32 {
    rnd::random::<f32>()
}

/// Uniform in `0..ceil`; `ceil` of zero yields zero.
#[inline]
pub fn rand_int(ceil: u32) -> u32 {
    if ceil == 0 {
        return 0;
    }
    rnd::random::<u32>() % ceil
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn rand_int_stays_below_ceiling() {
        for _ in 0..1000 {
            assert!(utils::rand_int(7) < 7);
        }
        assert_eq!(utils::rand_int(0), 0);
        let r = utils::rand();
        assert!((0.0..1.0).contains(&r));
    }

    #[test]
    fn clock_cycles_counts_rising_edges() {
        let sim = Sim::new(SimConfig::default().precision(-9));
        let clk = sim.declare("clk", 1).unwrap();
        let sim2 = sim.clone();
        let t = sim
            .block_on(async move {
                let _clock = ClockGenerator::new(clk.clone(), 10).start_high(false).start();
                utils::clock_cycles(&clk, 3).await?;
                Ok(sim2.now())
            })
            .unwrap();
        // rising edges at 5, 15, 25
        assert_eq!(t, 25);
    }
}
