//! Reference data handed over by the dashboard's dataset loader.

use crate::scenario::{parse_label, to_js};
use anyhow::{anyhow, Result};
use js_sys::Float64Array;
use mineral_core::catalog::{Mineral, Outlook, ReferenceTable};
use wasm_bindgen::prelude::*;

/// Demand datasets label outlooks as "Stated policies", "Net zero 2050", ...
pub(crate) fn dataset_outlook(label: &str) -> Result<Outlook> {
    Outlook::from_dataset_label(label)
        .ok_or_else(|| anyhow!("Unknown dataset outlook '{label}'."))
}

pub(crate) fn demand_values(
    table: &ReferenceTable,
    outlook: &str,
    mineral: &str,
    start_year: i32,
    end_year: i32,
) -> Result<Vec<f64>> {
    let outlook: Outlook = parse_label("outlook", outlook)?;
    let mineral: Mineral = parse_label("mineral", mineral)?;
    let series = table.demand_series(outlook, mineral, start_year..=end_year)?;
    Ok(series.into_iter().map(|(_, kt)| kt).collect())
}

#[wasm_bindgen]
#[derive(Default)]
pub struct WasmReferenceTable {
    pub(crate) table: ReferenceTable,
}

#[wasm_bindgen]
impl WasmReferenceTable {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmReferenceTable {
        console_error_panic_hook::set_once();
        WasmReferenceTable::default()
    }

    pub fn insert_reserves(&mut self, mineral: &str, kilotons: f64) -> Result<(), JsValue> {
        let mineral: Mineral = parse_label("mineral", mineral).map_err(to_js)?;
        self.table.insert_reserves(mineral, kilotons);
        Ok(())
    }

    /// `outlook_label` is the dataset spelling, not the snake_case name.
    pub fn insert_demand(
        &mut self,
        outlook_label: &str,
        mineral: &str,
        year: i32,
        kilotons: f64,
    ) -> Result<(), JsValue> {
        let outlook = dataset_outlook(outlook_label).map_err(to_js)?;
        let mineral: Mineral = parse_label("mineral", mineral).map_err(to_js)?;
        self.table.insert_demand(outlook, mineral, year, kilotons);
        Ok(())
    }

    /// Demand (kt) for every year of `start_year..=end_year`; fails on a gap.
    pub fn demand_series(
        &self,
        outlook: &str,
        mineral: &str,
        start_year: i32,
        end_year: i32,
    ) -> Result<Float64Array, JsValue> {
        let values =
            demand_values(&self.table, outlook, mineral, start_year, end_year).map_err(to_js)?;
        Ok(Float64Array::from(values.as_slice()))
    }
}
