use driftsweep_core::{SimConfig, Simulation};
use std::time::Instant;

fn main() {
    let num_drones = 16;
    let num_skimmers = 4;
    println!("Benchmarking with {} drones, {} skimmers", num_drones, num_skimmers);

    let config = SimConfig {
        num_drones,
        num_skimmers,
        num_clusters: 32,
        seed: 42,
        ..SimConfig::default()
    };

    let mut sim1 = Simulation::new(config.clone());
    let mut sim2 = Simulation::new(config);

    let steps = 2000;

    // Run WITHOUT metrics
    let start = Instant::now();
    for _ in 0..steps {
        sim1.step();
    }
    let duration_no_metrics = start.elapsed();
    println!("Time for {} steps WITHOUT metrics: {:?}", steps, duration_no_metrics);
    println!("Avg time per step (no metrics): {:?}", duration_no_metrics / steps as u32);

    // Run WITH metrics (every step)
    let start = Instant::now();
    sim2.run_experiment(steps, 1);
    let duration_metrics = start.elapsed();

    println!("Time for {} steps WITH metrics: {:?}", steps, duration_metrics);
    println!("Avg time per step (with metrics): {:?}", duration_metrics / steps as u32);

    let diff = duration_metrics.saturating_sub(duration_no_metrics);
    println!("Total metrics overhead: {:?}", diff);
    println!("Avg metrics overhead per step: {:?}", diff / steps as u32);
}
