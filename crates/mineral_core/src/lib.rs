//! The `mineral_core` crate is the stock-and-flow engine behind the battery
//! mineral life-cycle dashboards.
//!
//! Key components:
//! - **Equation Engine**: parser, compiler and bytecode VM for quantity equations.
//! - **Registry**: uniquely named stocks, flows and constants, compiled into an immutable model.
//! - **Evaluator / Solvers / Integrator**: per-step flow evaluation against a snapshot and
//!   forward Euler stepping over an annual horizon.
//! - **Time Series**: year-indexed output per stock and flow, plus diagnostics.
//! - **Scenario / Catalog**: validated configuration of the canonical mineral topology.

pub mod catalog;
pub mod depletion;
pub mod equation_engine;
pub mod error;
pub mod evaluator;
pub mod integrator;
pub mod registry;
pub mod scenario;
pub mod solvers;
pub mod timeseries;
pub mod traits;

pub use error::{Error, ModelError, ParseError, ScenarioError};
pub use integrator::{Diagnostic, Horizon, Simulation, SimulationRun};
pub use registry::{CompiledModel, ConstantDef, QuantityRegistry};
pub use scenario::ScenarioConfig;
pub use timeseries::{Series, TableRow, TimeSeriesStore, YearValue};

/// Runs one scenario from scratch: validate, build, compile, simulate.
pub fn run_scenario(config: &ScenarioConfig) -> Result<SimulationRun, Error> {
    config.run()
}
