//! The fixed driver scenario for the block-cipher core:
//! clock → reset → guard band → arm → busy rise → retract → busy fall → settle.

use ethnum::U256;
use std::fmt;

use crate::error::{SimError, SimResult};
use crate::kernel::{ldexp10, time_scale};
use crate::signal::Signal;
use crate::sim::Sim;
use crate::testbench::ClockGenerator;
use crate::value::Value;

pub const BLOCK_WIDTH: u32 = 128;
pub const KEY_WIDTH: u32 = 256;

pub const PLAINTEXT: U256 = U256::from_words(0, 0xe28336f5_9e6623df_d2c97f5f_7630f5a2);
pub const USERKEY: U256 = U256::from_words(
    0x6a84d95d_1bc483f1_d5cccca1_e12d2951,
    0xe5c7bcda_2ca8c9c6_01ecef2b_1cc7c433,
);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StimulusVector {
    pub block: Value,
    pub key: Value,
}

impl StimulusVector {
    /// Both operands must be non-zero: they are the only sign on the bus that start is high.
    pub fn new(block: U256, key: U256) -> SimResult<Self> {
        if block == U256::ZERO {
            return Err(SimError::ZeroOperand("block"));
        }
        if key == U256::ZERO {
            return Err(SimError::ZeroOperand("key"));
        }
        Ok(StimulusVector {
            block: Value::from_u256(BLOCK_WIDTH, block)?,
            key: Value::from_u256(KEY_WIDTH, key)?,
        })
    }

    pub fn reference() -> Self {
        StimulusVector {
            block: Value::truncated(BLOCK_WIDTH, PLAINTEXT),
            key: Value::truncated(KEY_WIDTH, USERKEY),
        }
    }
}

impl Default for StimulusVector {
    fn default() -> Self {
        StimulusVector::reference()
    }
}

#[derive(Clone, Debug)]
pub struct ScenarioConfig {
    pub clock_period: u64,
    pub time_unit: &'static str,
    pub clock_starts_high: bool,
    pub reset: ResetWindow,
    /// Periods between reset release and arming the stimulus.
    pub guard_cycles: u32,
    /// Periods between busy falling and the end of the scenario.
    pub settle_cycles: u32,
    pub stimulus: StimulusVector,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        ScenarioConfig {
            clock_period: 10,
            time_unit: "ns",
            clock_starts_high: true,
            reset: ResetWindow(2),
            guard_cycles: 2,
            settle_cycles: 4,
            stimulus: StimulusVector::reference(),
        }
    }
}

impl ScenarioConfig {
    pub fn clock_period(mut self, period: u64, unit: &'static str) -> Self {
        self.clock_period = period;
        self.time_unit = unit;
        self
    }

    pub fn stimulus(mut self, stimulus: StimulusVector) -> Self {
        self.stimulus = stimulus;
        self
    }

    pub fn clock_starts_high(mut self, start_high: bool) -> Self {
        self.clock_starts_high = start_high;
        self
    }
}

/// Number of clock periods reset stays asserted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResetWindow(pub u32);

/// Pins of the core as seen from the testbench.
#[derive(Clone, Debug)]
pub struct AesCorePins {
    pub clk: Signal,
    pub rst: Signal,
    pub start: Signal,
    pub plaintext: Signal,
    pub userkey: Signal,
    pub busy: Signal,
}

impl AesCorePins {
    pub fn bind(sim: &Sim) -> SimResult<Self> {
        Ok(AesCorePins {
            clk: sim.signal("clk")?,
            rst: sim.signal("rst")?,
            start: sim.signal("start")?,
            plaintext: sim.signal("plaintext")?,
            userkey: sim.signal("userkey")?,
            busy: sim.signal("busy")?,
        })
    }

    /// Clock low, reset asserted, everything else zero.
    pub fn init(&self) -> SimResult<()> {
        self.clk.set(0)?;
        self.rst.set(1)?;
        self.start.set(0)?;
        self.plaintext.clear()?;
        self.userkey.clear()
    }
}

pub struct ResetSequencer {
    rst: Signal,
    window: ResetWindow,
}

impl ResetSequencer {
    pub fn new(rst: Signal, window: ResetWindow) -> Self {
        ResetSequencer { rst, window }
    }

    /// Asserts reset now and releases it `window` periods later.
    pub async fn run(&self, period: u64) -> SimResult<()> {
        let sim = self.rst.sim().clone();
        self.rst.set(1)?;
        sim.timer_steps(period * u64::from(self.window.0)).await;
        self.rst.set(0)?;
        sim.log("reset released");
        Ok(())
    }
}

pub struct StimulusDriver {
    start: Signal,
    plaintext: Signal,
    userkey: Signal,
    vector: StimulusVector,
    armed: bool,
}

impl StimulusDriver {
    pub fn new(pins: &AesCorePins, vector: StimulusVector) -> Self {
        StimulusDriver {
            start: pins.start.clone(),
            plaintext: pins.plaintext.clone(),
            userkey: pins.userkey.clone(),
            vector,
            armed: false,
        }
    }

    /// start = 1 together with both operands, in one delta.
    pub fn arm(&mut self) -> SimResult<()> {
        if self.armed {
            return Err(SimError::AlreadyArmed);
        }
        self.start.set(1)?;
        self.plaintext.set_value(self.vector.block)?;
        self.userkey.set_value(self.vector.key)?;
        self.armed = true;
        self.start.sim().log(&format!(
            "armed: plaintext={} userkey={}",
            self.vector.block, self.vector.key
        ));
        Ok(())
    }

    /// start = 0 and operands zeroed, in one delta.
    pub fn retract(&mut self) -> SimResult<()> {
        if !self.armed {
            return Err(SimError::NotArmed);
        }
        self.start.set(0)?;
        self.plaintext.clear()?;
        self.userkey.clear()?;
        self.armed = false;
        self.start.sim().log("retracted");
        Ok(())
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

/// One-shot edge detectors on busy. Each wait only sees edges after it was called.
pub struct HandshakeMonitor {
    busy: Signal,
}

impl HandshakeMonitor {
    pub fn new(busy: Signal) -> Self {
        HandshakeMonitor { busy }
    }

    /// Resumes on the next busy 0 → 1 and returns the time in steps.
    pub async fn wait_busy_rise(&self) -> u64 {
        self.busy.rising_edge().await;
        self.busy.sim().now()
    }

    /// Resumes on the next busy 1 → 0 and returns the time in steps.
    pub async fn wait_busy_fall(&self) -> u64 {
        self.busy.falling_edge().await;
        self.busy.sim().now()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HandshakeState {
    Idle,
    Reset,
    Armed,
    Accepted,
    Completed,
    Settled,
}

impl HandshakeState {
    pub fn next(self) -> Option<HandshakeState> {
        match self {
            HandshakeState::Idle => Some(HandshakeState::Reset),
            HandshakeState::Reset => Some(HandshakeState::Armed),
            HandshakeState::Armed => Some(HandshakeState::Accepted),
            HandshakeState::Accepted => Some(HandshakeState::Completed),
            HandshakeState::Completed => Some(HandshakeState::Settled),
            HandshakeState::Settled => None,
        }
    }
}

/// Times (in steps) at which the scenario reached each state, plus the two stimulus
/// edges that don't have a state of their own.
#[derive(Clone, Debug)]
pub struct ScenarioReport {
    state: HandshakeState,
    transitions: Vec<(HandshakeState, u64)>,
    pub reset_released_at: Option<u64>,
    pub retracted_at: Option<u64>,
    pub period: u64,
    pub precision: i8,
}

impl ScenarioReport {
    pub fn new(period: u64, precision: i8) -> Self {
        ScenarioReport {
            state: HandshakeState::Idle,
            transitions: vec![(HandshakeState::Idle, 0)],
            reset_released_at: None,
            retracted_at: None,
            period,
            precision,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Moves to `to`; only the single forward step is allowed.
    pub fn advance(&mut self, to: HandshakeState, at: u64) -> SimResult<()> {
        if self.state.next() != Some(to) {
            return Err(SimError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        log::info!("handshake {:?} -> {:?} at step {}", self.state, to, at);
        self.state = to;
        self.transitions.push((to, at));
        Ok(())
    }

    pub fn entered(&self, state: HandshakeState) -> Option<u64> {
        self.transitions
            .iter()
            .find(|(s, _)| *s == state)
            .map(|(_, t)| *t)
    }

    pub fn transitions(&self) -> &[(HandshakeState, u64)] {
        &self.transitions
    }

    pub fn in_unit(&self, steps: u64, unit: &str) -> SimResult<f64> {
        Ok(ldexp10(
            steps as f64,
            self.precision - time_scale(unit)?,
        ))
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .transitions
            .iter()
            .skip(1)
            .map(|(s, t)| format!("{:?}@{}ns", s, ldexp10(*t as f64, self.precision + 9)))
            .collect();
        write!(f, "{}", names.join(" "))
    }
}

/// Runs the whole scenario against whatever core is attached to `sim`.
///
/// There is no timeout here: a core that never raises or drops busy blocks this future
/// forever, and it is up to the caller (see `SimConfig::deadline`) to give up.
pub async fn run_scenario(sim: Sim, config: ScenarioConfig) -> SimResult<ScenarioReport> {
    let pins = AesCorePins::bind(&sim)?;
    let period = sim.steps(config.clock_period, config.time_unit)?;
    let mut report = ScenarioReport::new(period, sim.precision());

    pins.init()?;
    let clock = ClockGenerator::new(pins.clk.clone(), period)
        .start_high(config.clock_starts_high)
        .start();

    report.advance(HandshakeState::Reset, sim.now())?;
    ResetSequencer::new(pins.rst.clone(), config.reset)
        .run(period)
        .await?;
    report.reset_released_at = Some(sim.now());

    sim.timer_steps(period * u64::from(config.guard_cycles)).await;
    let mut driver = StimulusDriver::new(&pins, config.stimulus);
    driver.arm()?;
    report.advance(HandshakeState::Armed, sim.now())?;

    let monitor = HandshakeMonitor::new(pins.busy.clone());
    let accepted_at = monitor.wait_busy_rise().await;
    report.advance(HandshakeState::Accepted, accepted_at)?;

    pins.clk.rising_edge().await;
    driver.retract()?;
    report.retracted_at = Some(sim.now());

    let completed_at = monitor.wait_busy_fall().await;
    report.advance(HandshakeState::Completed, completed_at)?;

    sim.timer_steps(period * u64::from(config.settle_cycles)).await;
    report.advance(HandshakeState::Settled, sim.now())?;
    clock.stop();
    sim.log(&format!("scenario done: {}", report));
    Ok(report)
}
