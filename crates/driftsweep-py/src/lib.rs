use driftsweep_core::{NavStrategy, PatternKind, SimConfig, Simulation};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

/// Minimal PyO3 module exposing driftsweep-core to the Python frontend.
#[pyfunction]
fn version() -> &'static str {
    "0.1.0"
}

/// Run a seeded simulation and return the sampled run summary as JSON.
#[pyfunction]
#[pyo3(signature = (pattern, strategy, seed, steps, sample_every = 10))]
fn run_summary_json(
    pattern: &str,
    strategy: &str,
    seed: u64,
    steps: usize,
    sample_every: usize,
) -> PyResult<String> {
    let config = SimConfig {
        pattern: PatternKind::parse(pattern).map_err(|e| PyValueError::new_err(e.to_string()))?,
        strategy: NavStrategy::parse(strategy).map_err(|e| PyValueError::new_err(e.to_string()))?,
        seed,
        ..SimConfig::default()
    };
    let mut sim =
        Simulation::try_new(config).map_err(|e| PyValueError::new_err(e.to_string()))?;
    let summary = sim
        .try_run_experiment(steps, sample_every)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    serde_json::to_string(&summary).map_err(|e| PyValueError::new_err(e.to_string()))
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(version, m)?)?;
    m.add_function(wrap_pyfunction!(run_summary_json, m)?)?;
    Ok(())
}
