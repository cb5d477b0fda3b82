//! Per-step evaluation of flows and net flows.

use crate::equation_engine::VM;
use crate::error::ModelError;
use crate::registry::CompiledModel;
use crate::traits::StockFlowSystem;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    Pending,
    Resolving,
    Resolved,
}

/// Computes every flow for one step from an immutable stock snapshot.
///
/// Flows that reference other flows are resolved recursively; each flow is
/// executed at most once per step and later reads hit the memo.
#[derive(Debug, Clone)]
pub struct Evaluator {
    slots: Vec<Slot>,
    stack: Vec<f64>,
}

impl Evaluator {
    pub fn new(flow_count: usize) -> Self {
        Self {
            slots: vec![Slot::Pending; flow_count],
            stack: Vec::with_capacity(32),
        }
    }

    pub fn evaluate(
        &mut self,
        model: &CompiledModel,
        snapshot: &[f64],
        flows_out: &mut [f64],
    ) -> Result<(), ModelError> {
        if snapshot.len() != model.stock_names.len() {
            return Err(ModelError::SnapshotMismatch {
                expected: model.stock_names.len(),
                actual: snapshot.len(),
            });
        }
        if flows_out.len() != model.flow_code.len() {
            return Err(ModelError::FlowBufferMismatch {
                expected: model.flow_code.len(),
                actual: flows_out.len(),
            });
        }
        self.slots.clear();
        self.slots.resize(model.flow_code.len(), Slot::Pending);
        for idx in 0..model.flow_code.len() {
            self.resolve(model, snapshot, idx, flows_out)?;
        }
        Ok(())
    }

    fn resolve(
        &mut self,
        model: &CompiledModel,
        snapshot: &[f64],
        idx: usize,
        flows: &mut [f64],
    ) -> Result<(), ModelError> {
        match self.slots[idx] {
            Slot::Resolved => return Ok(()),
            // Compilation rejects cycles; reaching this means a corrupted model.
            Slot::Resolving => {
                return Err(ModelError::CyclicDependency(vec![model.flow_names[idx].clone()]))
            }
            Slot::Pending => {}
        }
        self.slots[idx] = Slot::Resolving;
        for &dep in &model.flow_deps[idx] {
            self.resolve(model, snapshot, dep, flows)?;
        }
        let value = VM::execute(
            &model.flow_code[idx],
            snapshot,
            flows,
            &model.constants,
            &mut self.stack,
        );
        flows[idx] = value;
        self.slots[idx] = Slot::Resolved;
        Ok(())
    }
}

/// Signed sum of flow values for every stock.
pub fn net_flows(model: &CompiledModel, flows: &[f64], out: &mut [f64]) {
    for (slot, net) in out.iter_mut().zip(&model.net_flows) {
        *slot = net.terms.iter().map(|&(idx, sign)| sign * flows[idx]).sum();
    }
}

impl StockFlowSystem for CompiledModel {
    fn stock_count(&self) -> usize {
        self.stock_names.len()
    }

    fn flow_count(&self) -> usize {
        self.flow_names.len()
    }

    fn evaluate(
        &self,
        _year: i32,
        snapshot: &[f64],
        flows_out: &mut [f64],
        net_out: &mut [f64],
    ) -> Result<(), ModelError> {
        self.scratch
            .borrow_mut()
            .evaluate(self, snapshot, flows_out)?;
        net_flows(self, flows_out, net_out);
        Ok(())
    }
}
