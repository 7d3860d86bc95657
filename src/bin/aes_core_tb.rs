use cipherbench::prelude::*;

async fn reference_handshake(sim: Sim) -> SimResult<String> {
    let report = run_scenario(sim.clone(), ScenarioConfig::default()).await?;
    Ok(report.to_string())
}

async fn randomized_operands(sim: Sim) -> SimResult<String> {
    let block = U256::from(utils::rand_int(u32::MAX)) << 96u32 | U256::from(utils::rand_int(u32::MAX));
    let key = U256::from_words(PLAINTEXT.as_u128(), u128::from(utils::rand_int(u32::MAX)));
    let stimulus = StimulusVector::new(block, key)?;
    let report = run_scenario(sim.clone(), ScenarioConfig::default().stimulus(stimulus)).await?;
    Ok(format!("{} with {}", report, stimulus.block))
}

run_with_model!(BusyCoreModel::new(5), reference_handshake, randomized_operands);
