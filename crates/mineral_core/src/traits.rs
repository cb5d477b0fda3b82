use crate::error::ModelError;

/// A stock-and-flow system the steppers can advance.
pub trait StockFlowSystem {
    /// Number of stocks (the state dimension).
    fn stock_count(&self) -> usize;

    /// Number of flows evaluated each step.
    fn flow_count(&self) -> usize;

    /// Evaluates one step against an immutable stock snapshot.
    /// year: the step's year
    /// snapshot: stock values at the start of the step
    /// flows_out: buffer for every flow value
    /// net_out: buffer for every stock's net flow
    fn evaluate(
        &self,
        year: i32,
        snapshot: &[f64],
        flows_out: &mut [f64],
        net_out: &mut [f64],
    ) -> Result<(), ModelError>;
}

/// A trait for solvers that can step a system forward.
pub trait Steppable {
    /// Performs one step of size dt.
    /// year: current year (advanced after the step)
    /// state: current stock values (updated after the step)
    fn step(
        &mut self,
        system: &impl StockFlowSystem,
        year: &mut i32,
        state: &mut [f64],
        dt: f64,
    ) -> Result<(), ModelError>;
}
