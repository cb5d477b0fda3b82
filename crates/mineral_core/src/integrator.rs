//! Drives a compiled model across the horizon and collects the results.

use crate::error::ModelError;
use crate::registry::CompiledModel;
use crate::solvers::ForwardEuler;
use crate::timeseries::TimeSeriesStore;
use crate::traits::{StockFlowSystem, Steppable};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Annual step size.
pub const DT: f64 = 1.0;

/// Longest horizon a run accepts.
pub const MAX_HORIZON_YEARS: i32 = 1000;

/// Inclusive year range of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Horizon {
    pub start_year: i32,
    pub end_year: i32,
}

impl Horizon {
    pub fn new(start_year: i32, end_year: i32) -> Result<Self, ModelError> {
        let horizon = Self {
            start_year,
            end_year,
        };
        horizon.validate()?;
        Ok(horizon)
    }

    /// Years from start to end; `None` when empty, backwards, overflowing or
    /// longer than [`MAX_HORIZON_YEARS`].
    pub fn span(&self) -> Option<i32> {
        self.end_year
            .checked_sub(self.start_year)
            .filter(|span| (1..=MAX_HORIZON_YEARS).contains(span))
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        match self.span() {
            Some(_) => Ok(()),
            None => Err(ModelError::InvalidHorizon {
                start_year: self.start_year,
                end_year: self.end_year,
            }),
        }
    }

    /// Number of annual steps.
    pub fn steps(&self) -> usize {
        self.span()
            .and_then(|span| usize::try_from(span).ok())
            .unwrap_or(0)
    }
}

impl Default for Horizon {
    fn default() -> Self {
        Self {
            start_year: 2022,
            end_year: 2050,
        }
    }
}

/// Non-fatal findings surfaced alongside the output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    NegativeStock { stock: String, year: i32, value: f64 },
}

/// Output of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationRun {
    pub series: TimeSeriesStore,
    pub diagnostics: Vec<Diagnostic>,
}

impl SimulationRun {
    pub fn negative_stocks(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::NegativeStock { .. }))
    }
}

pub struct Simulation<'a> {
    model: &'a CompiledModel,
    horizon: Horizon,
}

impl<'a> Simulation<'a> {
    pub fn new(model: &'a CompiledModel, horizon: Horizon) -> Self {
        Self { model, horizon }
    }

    /// Runs from `start_year` to `end_year` inclusive.
    #[instrument(skip(self), fields(start = self.horizon.start_year, end = self.horizon.end_year))]
    pub fn run(&self) -> Result<SimulationRun, ModelError> {
        self.horizon.validate()?;

        let model = self.model;
        let mut stepper = ForwardEuler::new(model.stock_count(), model.flow_count());
        let mut series = TimeSeriesStore::new(
            self.horizon.start_year,
            self.horizon.end_year,
            model.stock_names(),
            model.flow_names(),
        );
        let mut diagnostics = Vec::new();
        let mut state = model.initial_values().to_vec();
        let mut year = self.horizon.start_year;

        series.record_stocks(year, &state);
        self.check_negative(year, &state, &mut diagnostics);

        while year < self.horizon.end_year {
            let step_year = year;
            stepper.step(model, &mut year, &mut state, DT)?;
            series.record_flows(step_year, stepper.last_flows());
            series.record_stocks(year, &state);
            self.check_negative(year, &state, &mut diagnostics);
            debug!(year, ?state, net = ?stepper.last_net_flows(), "step complete");
        }

        info!(
            steps = self.horizon.steps(),
            negative = diagnostics.len(),
            "simulation finished"
        );
        Ok(SimulationRun {
            series,
            diagnostics,
        })
    }

    fn check_negative(&self, year: i32, state: &[f64], diagnostics: &mut Vec<Diagnostic>) {
        for (name, &value) in self.model.stock_names().iter().zip(state) {
            if value < 0.0 {
                warn!(stock = %name, year, value, "stock went negative");
                diagnostics.push(Diagnostic::NegativeStock {
                    stock: name.clone(),
                    year,
                    value,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::QuantityRegistry;

    fn draining_tank(initial: f64, drain: f64) -> CompiledModel {
        let mut registry = QuantityRegistry::new();
        registry.declare_stock("tank", "-drain", initial).expect("stock");
        registry.declare_stock("drained", "drain", 0.0).expect("stock");
        registry.declare_flow("drain", "throughput").expect("flow");
        registry.declare_constant("throughput", drain).expect("constant");
        registry.compile().expect("model")
    }

    #[test]
    fn records_initial_values_and_every_year() {
        let model = draining_tank(10.0, 4.0);
        let run = Simulation::new(&model, Horizon::new(2022, 2024).expect("horizon"))
            .run()
            .expect("run");
        let tank = run.series.stock("tank").expect("tank");
        let years: Vec<i32> = tank.points.iter().map(|p| p.year).collect();
        assert_eq!(years, vec![2022, 2023, 2024]);
        assert_eq!(tank.values(), vec![10.0, 6.0, 2.0]);
        assert_eq!(run.series.flow("drain").expect("drain").values(), vec![4.0, 4.0]);
        assert!(run.diagnostics.is_empty());
    }

    #[test]
    fn negative_stocks_are_reported_not_clamped() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let model = draining_tank(5.0, 4.0);
        let run = Simulation::new(&model, Horizon::new(2022, 2025).expect("horizon"))
            .run()
            .expect("run should still complete");
        assert_eq!(
            run.series.stock("tank").expect("tank").values(),
            vec![5.0, 1.0, -3.0, -7.0]
        );
        let flagged: Vec<i32> = run
            .negative_stocks()
            .map(|d| match d {
                Diagnostic::NegativeStock { year, .. } => *year,
            })
            .collect();
        assert_eq!(flagged, vec![2024, 2025]);
    }

    #[test]
    fn rejects_empty_backwards_and_oversized_horizons() {
        assert_eq!(
            Horizon::new(2030, 2030),
            Err(ModelError::InvalidHorizon {
                start_year: 2030,
                end_year: 2030
            })
        );
        assert!(Horizon::new(2022, 2022 + MAX_HORIZON_YEARS).is_ok());
        assert!(Horizon::new(2022, 2023 + MAX_HORIZON_YEARS).is_err());
        let overflowing = Horizon {
            start_year: -2_000_000_000,
            end_year: 2_000_000_000,
        };
        assert_eq!(overflowing.span(), None);
        assert_eq!(overflowing.steps(), 0);

        let model = draining_tank(1.0, 1.0);
        assert!(Simulation::new(&model, overflowing).run().is_err());
        let backwards = Horizon {
            start_year: 2030,
            end_year: 2020,
        };
        assert!(Simulation::new(&model, backwards).run().is_err());
    }

    #[test]
    fn rerunning_reproduces_identical_output() {
        let model = draining_tank(100.0, 3.5);
        let horizon = Horizon::default();
        let first = Simulation::new(&model, horizon).run().expect("run");
        let second = Simulation::new(&model, horizon).run().expect("run");
        assert_eq!(first, second);
        assert_eq!(horizon.steps(), 28);
    }
}
