//! WASM bridge: scenario runs for the browser dashboard.

mod reference;
mod scenario;

pub use reference::WasmReferenceTable;
pub use scenario::{depletion_timeline, max_extraction_share, run_scenario_json, WasmScenario};
