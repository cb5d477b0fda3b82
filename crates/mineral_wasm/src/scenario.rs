//! Scenario wrapper exposed to JavaScript and its pure-Rust helpers.

use crate::reference::WasmReferenceTable;
use anyhow::{anyhow, Context, Result};
use js_sys::Float64Array;
use mineral_core::catalog::{self, Mineral, Outlook, ReferenceTable, Selection};
use mineral_core::depletion;
use mineral_core::{ScenarioConfig, SimulationRun};
use serde::de::DeserializeOwned;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

pub(crate) fn to_js(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{err:#}"))
}

pub(crate) fn simulate(config: &ScenarioConfig) -> Result<SimulationRun> {
    config.run().context("scenario rejected")
}

pub(crate) fn run_json(text: &str) -> Result<String> {
    let config = ScenarioConfig::from_json(text)?;
    let run = simulate(&config)?;
    serde_json::to_string(&run).context("failed to serialize simulation run")
}

pub(crate) fn stock_values(run: &SimulationRun, name: &str) -> Result<Vec<f64>> {
    run.series
        .stock(name)
        .map(|series| series.values())
        .ok_or_else(|| anyhow!("Unknown stock '{name}'."))
}

pub(crate) fn parse_label<T: DeserializeOwned>(kind: &str, label: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(label.to_string()))
        .with_context(|| format!("Unknown {kind} '{label}'."))
}

pub(crate) fn selection(outlook: &str, mineral: &str) -> Result<Selection> {
    Ok(Selection {
        outlook: parse_label::<Outlook>("outlook", outlook)?,
        mineral: parse_label::<Mineral>("mineral", mineral)?,
    })
}

pub(crate) fn with_reserves(
    config: &ScenarioConfig,
    table: &ReferenceTable,
    outlook: &str,
    mineral: &str,
) -> Result<ScenarioConfig> {
    let selection = selection(outlook, mineral)?;
    let seeded = config.clone().with_reserves(table, selection)?;
    seeded.validate().context("seeded scenario rejected")?;
    Ok(seeded)
}

/// Runs a JSON scenario and returns the run as JSON.
#[wasm_bindgen(js_name = runScenarioJson)]
pub fn run_scenario_json(config_json: &str) -> Result<String, JsValue> {
    console_error_panic_hook::set_once();
    run_json(config_json).map_err(to_js)
}

#[wasm_bindgen(js_name = maxExtractionShare)]
pub fn max_extraction_share(outlook: &str, mineral: &str) -> Result<f64, JsValue> {
    let selection = selection(outlook, mineral).map_err(to_js)?;
    Ok(catalog::max_extraction_share(
        selection.outlook,
        selection.mineral,
    ))
}

/// Remaining reserves per year as `[{ year, value }]`.
#[wasm_bindgen(js_name = depletionTimeline)]
pub fn depletion_timeline(
    reserves: f64,
    annual_consumption: f64,
    growth_rate: f64,
    start_year: i32,
) -> Result<JsValue, JsValue> {
    let timeline =
        depletion::depletion_timeline(reserves, annual_consumption, growth_rate, start_year)
            .map_err(to_js)?;
    to_value(&timeline)
        .map_err(|err| JsValue::from_str(&format!("Failed to serialize timeline: {err}")))
}

#[wasm_bindgen]
pub struct WasmScenario {
    config: ScenarioConfig,
    run: Option<SimulationRun>,
}

#[wasm_bindgen]
impl WasmScenario {
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<WasmScenario, JsValue> {
        console_error_panic_hook::set_once();

        let config: ScenarioConfig = from_value(config)
            .map_err(|err| JsValue::from_str(&format!("Invalid scenario: {err}")))?;
        config
            .validate()
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        Ok(WasmScenario { config, run: None })
    }

    /// Re-runs from scratch; every call produces a fresh model.
    pub fn run(&mut self) -> Result<JsValue, JsValue> {
        let run = simulate(&self.config).map_err(to_js)?;
        let value = to_value(&run)
            .map_err(|err| JsValue::from_str(&format!("Failed to serialize run: {err}")))?;
        self.run = Some(run);
        Ok(value)
    }

    /// Replaces initial resources with the table's reserves for `mineral`
    /// and records the selection. Clears any previous run.
    pub fn seed_reserves(
        &mut self,
        table: &WasmReferenceTable,
        outlook: &str,
        mineral: &str,
    ) -> Result<(), JsValue> {
        let config = with_reserves(&self.config, &table.table, outlook, mineral).map_err(to_js)?;
        self.config = config;
        self.run = None;
        Ok(())
    }

    pub fn years(&self) -> Vec<i32> {
        (self.config.horizon.start_year..=self.config.horizon.end_year).collect()
    }

    pub fn stock_values(&self, name: &str) -> Result<Float64Array, JsValue> {
        let run = self
            .run
            .as_ref()
            .ok_or_else(|| JsValue::from_str("Scenario has not been run yet."))?;
        let values = stock_values(run, name).map_err(to_js)?;
        Ok(Float64Array::from(values.as_slice()))
    }

    pub fn table(&self) -> Result<JsValue, JsValue> {
        let run = self
            .run
            .as_ref()
            .ok_or_else(|| JsValue::from_str("Scenario has not been run yet."))?;
        to_value(&run.series.table())
            .map_err(|err| JsValue::from_str(&format!("Failed to serialize table: {err}")))
    }
}
