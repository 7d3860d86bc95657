pub use crate::busy_core::{Accepted, BusyCoreModel};
pub use crate::dut::{aes_core_ports, Direction, Dut, DutIo, Port};
pub use crate::error::{SimError, SimResult};
pub use crate::executor::JoinHandle;
pub use crate::runner::{all_passed, Runner, TestOutcome};
pub use crate::scenario::{
    run_scenario, AesCorePins, HandshakeMonitor, HandshakeState, ResetSequencer, ResetWindow,
    ScenarioConfig, ScenarioReport, StimulusDriver, StimulusVector, PLAINTEXT, USERKEY,
};
pub use crate::shared::Shared;
pub use crate::signal::Signal;
pub use crate::sim::{RunOutcome, Sim, SimConfig};
pub use crate::testbench::{ClockGenerator, ClockHandle};
pub use crate::trigger::{EdgeKind, TrigKind, Trigger};
pub use crate::utils;
pub use crate::value::Value;
pub use crate::{init_logging, run_with_model};
pub use ethnum::U256;
pub use futures::future::FutureExt;
