use chaos_lite_runner::prelude::*;

fn main() -> ChaosLiteResult<()> {
    let builder = ChaosDefinitionBuilder::new_with_init(env!("CARGO_PKG_NAME"))
        .with_latency_menu(&[200, 400, 800, 1200, 1600])
        .with_rtt_samples(12);

    run(builder)?;

    Ok(())
}
