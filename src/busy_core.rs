//! Behavioural stand-in for the cipher core. It implements the busy handshake of the pin
//! contract and nothing else: no rounds, no key schedule, no output block.

use crate::dut::{aes_core_ports, Dut, DutIo, Port};
use crate::error::SimResult;
use crate::shared::Shared;
use crate::value::Value;

/// Operands sampled by the model when it accepted a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Accepted {
    pub block: Value,
    pub key: Value,
    /// Index of the rising clock edge (counted from the first) that accepted the request.
    pub cycle: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CoreState {
    Idle,
    Busy { remaining: u32 },
}

/// Goes busy on the first edge that samples `start` high while idle, stays busy for
/// `latency` cycles, then drops busy. Reset forces idle.
pub struct BusyCoreModel {
    latency: u32,
    state: CoreState,
    cycle: u64,
    journal: Shared<Vec<Accepted>>,
}

impl BusyCoreModel {
    pub fn new(latency: u32) -> Self {
        BusyCoreModel {
            latency: latency.max(1),
            state: CoreState::Idle,
            cycle: 0,
            journal: Shared::new(Vec::new()),
        }
    }

    /// Shared view of every accepted request; clone it before handing the model to a `Sim`.
    pub fn journal(&self) -> Shared<Vec<Accepted>> {
        self.journal.clone()
    }

    pub fn latency(&self) -> u32 {
        self.latency
    }
}

impl Dut for BusyCoreModel {
    fn name(&self) -> &str {
        "busy_core"
    }

    fn ports(&self) -> Vec<Port> {
        aes_core_ports()
    }

    fn tick(&mut self, io: &mut DutIo<'_>) -> SimResult<()> {
        let cycle = self.cycle;
        self.cycle += 1;
        if io.is_high("rst")? {
            self.state = CoreState::Idle;
            return io.drive_bit("busy", false);
        }
        self.state = match self.state {
            CoreState::Idle if io.is_high("start")? => {
                self.journal.get_mut().push(Accepted {
                    block: io.input("plaintext")?,
                    key: io.input("userkey")?,
                    cycle,
                });
                io.drive_bit("busy", true)?;
                CoreState::Busy {
                    remaining: self.latency,
                }
            }
            CoreState::Idle => CoreState::Idle,
            CoreState::Busy { remaining } if remaining <= 1 => {
                io.drive_bit("busy", false)?;
                CoreState::Idle
            }
            CoreState::Busy { remaining } => CoreState::Busy {
                remaining: remaining - 1,
            },
        };
        Ok(())
    }
}
