use anyhow::Result;
use clap::Parser;
use driftsweep_core::{NavStrategy, PatternKind, SimConfig, Simulation};

/// Drone-assisted particle collection simulator.
#[derive(Parser)]
#[command(name = "driftsweep")]
struct Args {
    /// Flight pattern: lawnmower, orbit or adaptive.
    #[arg(long, default_value = "adaptive")]
    pattern: String,
    /// Skimmer navigation strategy: random, greedy or optimal.
    #[arg(long, default_value = "greedy")]
    strategy: String,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value_t = 200)]
    steps: usize,
    #[arg(long, default_value_t = 3)]
    drones: usize,
    #[arg(long, default_value_t = 10)]
    sample_every: usize,
    /// Emit the full run summary as JSON instead of progress lines.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = SimConfig {
        pattern: PatternKind::parse(&args.pattern)?,
        strategy: NavStrategy::parse(&args.strategy)?,
        num_drones: args.drones,
        seed: args.seed,
        ..SimConfig::default()
    };
    let mut sim = Simulation::try_new(config)?;

    if args.json {
        let summary = sim.try_run_experiment(args.steps, args.sample_every)?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    for i in 0..args.steps {
        let stats = sim.step();
        if i % 10 == 0 {
            println!(
                "Step {}: detected {:.2}, collected {:.3}",
                stats.step, stats.detected, stats.collected
            );
        }
    }
    println!();
    println!("Simulation complete!");
    println!("Total steps: {}", sim.step_index());
    println!("Total detected: {:.2}", sim.total_detected());
    println!("Total collected: {:.3}", sim.total_collected());
    Ok(())
}
