use crate::error::ModelError;
use crate::traits::{StockFlowSystem, Steppable};

/// Explicit (forward) Euler stepper.
/// Every stock moves by `dt * net_flow` evaluated at the start of the step.
pub struct ForwardEuler {
    flows: Vec<f64>,
    net: Vec<f64>,
}

impl ForwardEuler {
    pub fn new(stock_count: usize, flow_count: usize) -> Self {
        Self {
            flows: vec![0.0; flow_count],
            net: vec![0.0; stock_count],
        }
    }

    /// Flow values of the most recent step.
    pub fn last_flows(&self) -> &[f64] {
        &self.flows
    }

    /// Net flows of the most recent step.
    pub fn last_net_flows(&self) -> &[f64] {
        &self.net
    }
}

impl Steppable for ForwardEuler {
    fn step(
        &mut self,
        system: &impl StockFlowSystem,
        year: &mut i32,
        state: &mut [f64],
        dt: f64,
    ) -> Result<(), ModelError> {
        // `state` is the snapshot: nothing is written until all flows are known.
        system.evaluate(*year, state, &mut self.flows, &mut self.net)?;

        for (value, net) in state.iter_mut().zip(&self.net) {
            *value += dt * net;
        }

        *year += 1;
        Ok(())
    }
}
