use cipherbench::prelude::*;

fn recorder(sim: &Sim, name: &str) -> Shared<Vec<(u64, U256)>> {
    let seen = Shared::new(Vec::new());
    let sig = sim.signal(name).unwrap();
    let (rec, sim2) = (seen.clone(), sim.clone());
    sim.fork::<()>(async move {
        loop {
            sig.edge().await;
            rec.get_mut().push((sim2.now(), sig.value().bits()));
        }
    });
    seen
}

fn bench(latency: u32) -> (Sim, Shared<Vec<Accepted>>) {
    init_logging();
    let model = BusyCoreModel::new(latency);
    let journal = model.journal();
    let sim = Sim::with_dut(SimConfig::default().precision(-9).deadline(10, "us"), model).unwrap();
    (sim, journal)
}

fn run(sim: &Sim, config: ScenarioConfig) -> SimResult<ScenarioReport> {
    sim.block_on(run_scenario(sim.clone(), config))
}

fn high(t: u64) -> (u64, U256) {
    (t, U256::ONE)
}

fn low(t: u64) -> (u64, U256) {
    (t, U256::ZERO)
}

#[test]
fn reference_scenario_timeline() {
    let (sim, journal) = bench(5);
    let rst = recorder(&sim, "rst");
    let start = recorder(&sim, "start");
    let plaintext = recorder(&sim, "plaintext");
    let userkey = recorder(&sim, "userkey");
    let busy = recorder(&sim, "busy");

    let report = run(&sim, ScenarioConfig::default()).unwrap();

    assert_eq!(*rst.get(), vec![high(0), low(20)]);
    assert_eq!(*start.get(), vec![high(40), low(60)]);
    assert_eq!(*plaintext.get(), vec![(40, PLAINTEXT), low(60)]);
    assert_eq!(*userkey.get(), vec![(40, USERKEY), low(60)]);
    assert_eq!(*busy.get(), vec![high(50), low(100)]);

    assert_eq!(report.reset_released_at, Some(20));
    assert_eq!(report.retracted_at, Some(60));
    assert_eq!(
        report.transitions(),
        &[
            (HandshakeState::Idle, 0),
            (HandshakeState::Reset, 0),
            (HandshakeState::Armed, 40),
            (HandshakeState::Accepted, 50),
            (HandshakeState::Completed, 100),
            (HandshakeState::Settled, 140),
        ]
    );
    assert_eq!(report.state(), HandshakeState::Settled);
    assert_eq!(sim.now(), 140);

    let journal = journal.get();
    assert_eq!(journal.len(), 1);
    assert_eq!(journal[0].block.bits(), PLAINTEXT);
    assert_eq!(journal[0].key.bits(), USERKEY);
    assert_eq!(journal[0].cycle, 5);
}

#[test]
fn operands_are_live_only_while_start_is_high() {
    let (sim, _) = bench(3);
    let start = recorder(&sim, "start");
    let plaintext = recorder(&sim, "plaintext");
    let userkey = recorder(&sim, "userkey");
    run(&sim, ScenarioConfig::default()).unwrap();

    let times = |rec: &Shared<Vec<(u64, U256)>>| rec.get().iter().map(|(t, _)| *t).collect::<Vec<_>>();
    assert_eq!(times(&start), times(&plaintext));
    assert_eq!(times(&start), times(&userkey));
    for ((_, s), (_, p)) in start.get().iter().zip(plaintext.get().iter()) {
        assert_eq!(*s == U256::ZERO, *p == U256::ZERO);
    }
}

#[test]
fn latency_sweep_keeps_the_timing_contract() {
    for _ in 0..8 {
        let latency = 1 + utils::rand_int(12);
        let (sim, journal) = bench(latency);
        let busy = recorder(&sim, "busy");
        let report = run(&sim, ScenarioConfig::default()).unwrap();

        let fall = 50 + 10 * u64::from(latency);
        assert_eq!(*busy.get(), vec![high(50), low(fall)], "latency {}", latency);
        assert_eq!(report.retracted_at, Some(60));
        assert!(report.entered(HandshakeState::Completed).unwrap() > report.entered(HandshakeState::Accepted).unwrap());
        assert_eq!(report.entered(HandshakeState::Settled), Some(fall + 40));
        // the retract lands before the core is idle again, so it accepts exactly once
        assert_eq!(journal.get().len(), 1);
    }
}

#[test]
fn single_cycle_core_completes_on_the_retract_edge() {
    // busy falls on the edge the driver retracts on; the fall still reaches the monitor
    let (sim, journal) = bench(1);
    let busy = recorder(&sim, "busy");
    let start = recorder(&sim, "start");
    let report = run(&sim, ScenarioConfig::default()).unwrap();
    assert_eq!(*busy.get(), vec![high(50), low(60)]);
    assert_eq!(*start.get(), vec![high(40), low(60)]);
    assert_eq!(report.retracted_at, Some(60));
    assert_eq!(report.entered(HandshakeState::Completed), Some(60));
    assert_eq!(report.entered(HandshakeState::Settled), Some(100));
    assert_eq!(journal.get().len(), 1);
}

#[test]
fn clock_starting_low_shifts_the_edges() {
    let (sim, _) = bench(5);
    let busy = recorder(&sim, "busy");
    let report = run(&sim, ScenarioConfig::default().clock_starts_high(false)).unwrap();
    assert_eq!(*busy.get(), vec![high(45), low(95)]);
    assert_eq!(report.retracted_at, Some(55));
    assert_eq!(report.entered(HandshakeState::Settled), Some(135));
}

#[test]
fn custom_stimulus_reaches_the_core() {
    let (sim, journal) = bench(2);
    let stimulus = StimulusVector::new(U256::from(0x0123_4567_u32), U256::MAX).unwrap();
    run(&sim, ScenarioConfig::default().stimulus(stimulus)).unwrap();
    let journal = journal.get();
    assert_eq!(journal[0].block.bits(), U256::from(0x0123_4567_u32));
    assert_eq!(journal[0].key.bits(), U256::MAX);
}

#[test]
fn slower_clock_scales_every_window() {
    let (sim, _) = bench(4);
    let report = run(&sim, ScenarioConfig::default().clock_period(20, "ns")).unwrap();
    assert_eq!(report.reset_released_at, Some(40));
    assert_eq!(report.entered(HandshakeState::Armed), Some(80));
    assert_eq!(report.entered(HandshakeState::Accepted), Some(100));
    assert_eq!(report.retracted_at, Some(120));
    assert_eq!(report.entered(HandshakeState::Completed), Some(180));
    assert_eq!(report.entered(HandshakeState::Settled), Some(260));
}

struct NeverBusy;

impl Dut for NeverBusy {
    fn name(&self) -> &str {
        "never_busy"
    }
    fn ports(&self) -> Vec<Port> {
        aes_core_ports()
    }
    fn tick(&mut self, _io: &mut DutIo<'_>) -> SimResult<()> {
        Ok(())
    }
}

#[test]
fn silent_core_hits_the_deadline_with_start_held() {
    let sim = Sim::with_dut(SimConfig::default().precision(-9).deadline(1, "us"), NeverBusy).unwrap();
    let start = recorder(&sim, "start");
    let result = run(&sim, ScenarioConfig::default());
    assert!(matches!(result, Err(SimError::DeadlineExceeded(1000))));
    assert_eq!(*start.get(), vec![high(40)]);
}

struct StuckBusy;

impl Dut for StuckBusy {
    fn name(&self) -> &str {
        "stuck_busy"
    }
    fn ports(&self) -> Vec<Port> {
        aes_core_ports()
    }
    fn tick(&mut self, io: &mut DutIo<'_>) -> SimResult<()> {
        if io.is_high("start")? {
            io.drive_bit("busy", true)?;
        }
        Ok(())
    }
}

#[test]
fn core_that_never_completes_hits_the_deadline() {
    let sim = Sim::with_dut(SimConfig::default().precision(-9).deadline(2, "us"), StuckBusy).unwrap();
    let start = recorder(&sim, "start");
    let result = run(&sim, ScenarioConfig::default());
    assert!(matches!(result, Err(SimError::DeadlineExceeded(2000))));
    // accepted and retracted, then stuck waiting for the fall
    assert_eq!(*start.get(), vec![high(40), low(60)]);
}

#[test]
fn testbench_cannot_drive_busy() {
    let (sim, _) = bench(1);
    let busy = sim.signal("busy").unwrap();
    assert!(matches!(busy.set(1), Err(SimError::DrivenByDut(name)) if name == "busy"));
}

#[test]
fn driver_arms_and_retracts_once() {
    let (sim, _) = bench(1);
    let pins = AesCorePins::bind(&sim).unwrap();
    let mut driver = StimulusDriver::new(&pins, StimulusVector::reference());
    assert!(matches!(driver.retract(), Err(SimError::NotArmed)));
    driver.arm().unwrap();
    assert!(driver.is_armed());
    assert!(matches!(driver.arm(), Err(SimError::AlreadyArmed)));
    driver.retract().unwrap();
    assert!(!driver.is_armed());
}

#[test]
fn simulations_are_independent() {
    let (a, journal_a) = bench(2);
    let (b, journal_b) = bench(7);
    run(&a, ScenarioConfig::default()).unwrap();
    run(&b, ScenarioConfig::default()).unwrap();
    assert_eq!(a.now(), 110);
    assert_eq!(b.now(), 160);
    assert_eq!(journal_a.get().len(), 1);
    assert_eq!(journal_b.get().len(), 1);
}
