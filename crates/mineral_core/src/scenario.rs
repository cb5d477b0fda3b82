//! Scenario configuration: one parameter set, validated, turned into the
//! canonical battery-mineral topology.
//!
//! Every dashboard variant is a choice of strategy here (derived or explicit
//! waste rate, eol rate or lifespan, fixed or reserve-derived mining, fixed or
//! rate-based new finds), not a separate model.

use crate::catalog::{max_extraction_share, ReferenceTable, Selection, MIN_EXTRACTION_SHARE};
use crate::error::{Error, ModelError, ScenarioError};
use crate::integrator::{Horizon, Simulation, SimulationRun};
use crate::registry::QuantityRegistry;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Names of the canonical quantities.
pub mod names {
    pub const RESOURCES: &str = "resources";
    pub const IN_USE_STOCK: &str = "in_use_stock";
    pub const BATTERIES: &str = "batteries";
    pub const GRID: &str = "grid";
    pub const WASTE: &str = "waste";

    pub const STOCKS: [&str; 5] = [RESOURCES, IN_USE_STOCK, BATTERIES, GRID, WASTE];

    pub const NEW_FINDS: &str = "new_finds";
    pub const MINING: &str = "mining";
    pub const BATTERY_PRODUCTION: &str = "battery_production";
    pub const BATTERY_RECYCLING: &str = "battery_recycling";
    pub const BATTERY_REPURPOSE: &str = "battery_repurpose";
    pub const BATTERY_WASTE: &str = "battery_waste";
    pub const GRID_RECYCLING: &str = "grid_recycling";
    pub const GRID_WASTE: &str = "grid_waste";

    pub const FLOWS: [&str; 8] = [
        NEW_FINDS,
        MINING,
        BATTERY_PRODUCTION,
        BATTERY_RECYCLING,
        BATTERY_REPURPOSE,
        BATTERY_WASTE,
        GRID_RECYCLING,
        GRID_WASTE,
    ];
}

// Tolerance on `recycling + repurpose <= 1` for slider-style decimal inputs.
const RATE_SUM_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "value", rename_all = "snake_case")]
pub enum WasteRate {
    /// `1 - recycling_rate - repurpose_rate`
    Derived,
    Explicit(f64),
}

/// Share of a stock reaching end of life each year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "value", rename_all = "snake_case")]
pub enum EolRate {
    Rate(f64),
    /// Mean service life in years; the rate is `1 / years`.
    Lifespan(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "value", rename_all = "snake_case")]
pub enum NewFinds {
    /// Constant kt/yr.
    Fixed(f64),
    /// Share of initial resources discovered per year.
    Rate(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "value", rename_all = "snake_case")]
pub enum Mining {
    /// Constant kt/yr.
    Fixed(f64),
    /// Share of initial resources extracted evenly over the horizon.
    ExtractionLimit(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialStocks {
    pub resources: f64,
    pub in_use_stock: f64,
    pub batteries: f64,
    pub grid: f64,
    pub waste: f64,
}

impl Default for InitialStocks {
    fn default() -> Self {
        Self {
            resources: 100_000.0,
            in_use_stock: 100.0,
            batteries: 1000.0,
            grid: 300.0,
            waste: 500.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub selection: Option<Selection>,
    pub horizon: Horizon,
    pub battery_recycling_rate: f64,
    pub battery_repurpose_rate: f64,
    pub battery_waste_rate: WasteRate,
    pub battery_eol: EolRate,
    pub grid_recycling_rate: f64,
    pub grid_eol: EolRate,
    pub new_finds: NewFinds,
    pub mining: Mining,
    /// kt/yr
    pub battery_production: f64,
    pub initial: InitialStocks,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            selection: None,
            horizon: Horizon::default(),
            battery_recycling_rate: 0.05,
            battery_repurpose_rate: 0.02,
            battery_waste_rate: WasteRate::Derived,
            battery_eol: EolRate::Rate(1.0),
            grid_recycling_rate: 0.05,
            grid_eol: EolRate::Rate(1.0),
            new_finds: NewFinds::Fixed(1000.0),
            mining: Mining::Fixed(3000.0),
            battery_production: 4000.0,
            initial: InitialStocks::default(),
        }
    }
}

fn check_rate(name: &'static str, value: f64) -> Result<(), ScenarioError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ScenarioError::RateOutOfRange { name, value });
    }
    Ok(())
}

fn check_amount(name: &'static str, value: f64) -> Result<(), ScenarioError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ScenarioError::NegativeValue { name, value });
    }
    Ok(())
}

fn check_eol(name: &'static str, eol: EolRate) -> Result<(), ScenarioError> {
    match eol {
        EolRate::Rate(rate) => check_rate(name, rate),
        EolRate::Lifespan(years) if !years.is_finite() || years < 1.0 => {
            Err(ScenarioError::InvalidLifespan { name, years })
        }
        EolRate::Lifespan(_) => Ok(()),
    }
}

impl ScenarioConfig {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("failed to parse scenario configuration")
    }

    /// Seeds initial resources with the reference reserves of a mineral.
    pub fn with_reserves(
        mut self,
        table: &ReferenceTable,
        selection: Selection,
    ) -> Result<Self, ScenarioError> {
        self.initial.resources = table.reserves(selection.mineral)?;
        self.selection = Some(selection);
        Ok(self)
    }

    /// Battery waste rate in effect for this configuration.
    ///
    /// The derived rate is floored at 0: rates summing to exactly 1 in decimal
    /// (0.8 + 0.2) leave a tiny negative remainder in binary floating point.
    pub fn effective_waste_rate(&self) -> f64 {
        match self.battery_waste_rate {
            WasteRate::Derived => {
                (1.0 - self.battery_recycling_rate - self.battery_repurpose_rate).max(0.0)
            }
            WasteRate::Explicit(rate) => rate,
        }
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        check_rate("battery_recycling_rate", self.battery_recycling_rate)?;
        check_rate("battery_repurpose_rate", self.battery_repurpose_rate)?;
        if self.battery_recycling_rate + self.battery_repurpose_rate > 1.0 + RATE_SUM_EPSILON {
            return Err(ScenarioError::RatesExceedUnity {
                recycling: self.battery_recycling_rate,
                repurpose: self.battery_repurpose_rate,
            });
        }
        if let WasteRate::Explicit(rate) = self.battery_waste_rate {
            check_rate("battery_waste_rate", rate)?;
        }
        check_rate("grid_recycling_rate", self.grid_recycling_rate)?;
        check_eol("battery_eol_rate", self.battery_eol)?;
        check_eol("grid_eol_rate", self.grid_eol)?;

        match self.new_finds {
            NewFinds::Fixed(kt) => check_amount("new_finds", kt)?,
            NewFinds::Rate(rate) => check_rate("new_finds_rate", rate)?,
        }
        match self.mining {
            Mining::Fixed(kt) => check_amount("mining", kt)?,
            Mining::ExtractionLimit(share) => match self.selection {
                Some(selection) => {
                    let max = max_extraction_share(selection.outlook, selection.mineral);
                    if !(MIN_EXTRACTION_SHARE..=max).contains(&share) {
                        return Err(ScenarioError::ExtractionShareOutOfRange {
                            mineral: selection.mineral.to_string(),
                            outlook: selection.outlook.to_string(),
                            share,
                            min: MIN_EXTRACTION_SHARE,
                            max,
                        });
                    }
                }
                None => check_rate("extraction_limit", share)?,
            },
        }
        check_amount("battery_production", self.battery_production)?;

        check_amount("initial resources", self.initial.resources)?;
        check_amount("initial in_use_stock", self.initial.in_use_stock)?;
        check_amount("initial batteries", self.initial.batteries)?;
        check_amount("initial grid", self.initial.grid)?;
        check_amount("initial waste", self.initial.waste)?;

        self.horizon_length()?;
        Ok(())
    }

    fn horizon_length(&self) -> Result<i32, ScenarioError> {
        self.horizon
            .span()
            .ok_or(ScenarioError::InvalidHorizon {
                start_year: self.horizon.start_year,
                end_year: self.horizon.end_year,
            })
    }

    /// Validates, then declares the canonical topology with this
    /// configuration's strategies.
    pub fn build_registry(&self) -> Result<QuantityRegistry, Error> {
        use names::*;

        self.validate()?;
        let mut r = QuantityRegistry::new();

        r.declare_stock(RESOURCES, "new_finds - mining", self.initial.resources)?;
        r.declare_stock(
            IN_USE_STOCK,
            "mining + battery_recycling + grid_recycling - battery_production",
            self.initial.in_use_stock,
        )?;
        r.declare_stock(
            BATTERIES,
            "battery_production - battery_recycling - battery_repurpose - battery_waste",
            self.initial.batteries,
        )?;
        r.declare_stock(
            GRID,
            "battery_repurpose - grid_recycling - grid_waste",
            self.initial.grid,
        )?;
        r.declare_stock(WASTE, "battery_waste + grid_waste", self.initial.waste)?;

        r.declare_constant("initial_resources", RESOURCES)?;
        r.declare_constant("horizon_length", f64::from(self.horizon_length()?))?;
        r.declare_constant("battery_recycling_rate", self.battery_recycling_rate)?;
        r.declare_constant("battery_repurpose_rate", self.battery_repurpose_rate)?;
        r.declare_constant("battery_waste_rate", self.effective_waste_rate())?;
        declare_eol(&mut r, "battery", self.battery_eol)?;
        r.declare_constant("grid_recycling_rate", self.grid_recycling_rate)?;
        declare_eol(&mut r, "grid", self.grid_eol)?;

        match self.new_finds {
            NewFinds::Fixed(kt) => {
                r.declare_constant("new_finds_throughput", kt)?;
                r.declare_flow(NEW_FINDS, "new_finds_throughput")?;
            }
            NewFinds::Rate(rate) => {
                r.declare_constant("new_finds_rate", rate)?;
                r.declare_flow(NEW_FINDS, "initial_resources * new_finds_rate")?;
            }
        }
        match self.mining {
            Mining::Fixed(kt) => r.declare_constant("mining_throughput", kt)?,
            Mining::ExtractionLimit(share) => {
                r.declare_constant("extraction_limit", share)?;
                r.declare_constant(
                    "mining_throughput",
                    "initial_resources * extraction_limit / horizon_length",
                )?;
            }
        }
        r.declare_flow(MINING, "mining_throughput")?;
        r.declare_constant("battery_production_throughput", self.battery_production)?;
        r.declare_flow(BATTERY_PRODUCTION, "battery_production_throughput")?;

        r.declare_flow(
            BATTERY_RECYCLING,
            "battery_recycling_rate * battery_eol_rate * batteries",
        )?;
        r.declare_flow(
            BATTERY_REPURPOSE,
            "battery_repurpose_rate * battery_eol_rate * batteries",
        )?;
        r.declare_flow(
            BATTERY_WASTE,
            "battery_waste_rate * battery_eol_rate * batteries",
        )?;
        r.declare_flow(GRID_RECYCLING, "grid_recycling_rate * grid_eol_rate * grid")?;
        r.declare_flow(GRID_WASTE, "(1 - grid_recycling_rate) * grid_eol_rate * grid")?;

        debug!(mining = ?self.mining, new_finds = ?self.new_finds, "scenario registry built");
        Ok(r)
    }

    /// Validate, build, compile and simulate in one go.
    pub fn run(&self) -> Result<SimulationRun, Error> {
        let model = self.build_registry()?.compile()?;
        Ok(Simulation::new(&model, self.horizon).run()?)
    }
}

fn declare_eol(r: &mut QuantityRegistry, prefix: &str, eol: EolRate) -> Result<(), ModelError> {
    let rate_name = format!("{prefix}_eol_rate");
    match eol {
        EolRate::Rate(rate) => r.declare_constant(&rate_name, rate),
        EolRate::Lifespan(years) => {
            let lifespan_name = format!("{prefix}_lifespan");
            r.declare_constant(&lifespan_name, years)?;
            r.declare_constant(&rate_name, format!("1 / {lifespan_name}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::names::*;
    use super::*;
    use crate::catalog::{Mineral, Outlook};
    use crate::timeseries::TimeSeriesStore;

    const TOL: f64 = 1e-9;

    fn zero_rates(start_year: i32, end_year: i32) -> ScenarioConfig {
        ScenarioConfig {
            horizon: Horizon {
                start_year,
                end_year,
            },
            battery_recycling_rate: 0.0,
            battery_repurpose_rate: 0.0,
            battery_waste_rate: WasteRate::Explicit(0.0),
            battery_eol: EolRate::Rate(0.0),
            grid_recycling_rate: 0.0,
            ..ScenarioConfig::default()
        }
    }

    fn dashboard_like() -> ScenarioConfig {
        ScenarioConfig {
            selection: Some(Selection {
                mineral: Mineral::Lithium,
                outlook: Outlook::AnnouncedPledges,
            }),
            battery_recycling_rate: 0.3,
            battery_repurpose_rate: 0.3,
            battery_eol: EolRate::Lifespan(10.0),
            grid_recycling_rate: 0.3,
            grid_eol: EolRate::Lifespan(12.0),
            new_finds: NewFinds::Rate(0.05),
            mining: Mining::ExtractionLimit(0.3),
            ..ScenarioConfig::default()
        }
    }

    fn at(series: &TimeSeriesStore, name: &str, year: i32) -> f64 {
        series
            .value(name, year)
            .unwrap_or_else(|| panic!("missing {name} at {year}"))
    }

    #[test]
    fn concrete_battery_accumulation() {
        let config = ScenarioConfig {
            initial: InitialStocks {
                batteries: 1000.0,
                ..InitialStocks::default()
            },
            battery_production: 4000.0,
            ..zero_rates(2022, 2024)
        };
        let run = config.run().expect("scenario should run");
        let batteries = run.series.stock(BATTERIES).expect("batteries");
        let years: Vec<i32> = batteries.points.iter().map(|p| p.year).collect();
        assert_eq!(years, vec![2022, 2023, 2024]);
        assert_eq!(batteries.values(), vec![1000.0, 5000.0, 9000.0]);
    }

    #[test]
    fn zero_rate_scenario_grows_batteries_linearly() {
        let config = ScenarioConfig {
            battery_waste_rate: WasteRate::Derived,
            ..zero_rates(2022, 2050)
        };
        let run = config.run().expect("run");
        let expected = config.initial.batteries + 28.0 * config.battery_production;
        let actual = run.series.final_value(BATTERIES).expect("batteries");
        assert!((actual - expected).abs() < TOL);
    }

    #[test]
    fn initial_values_match_configuration() {
        let config = dashboard_like();
        let run = config.run().expect("run");
        let start = config.horizon.start_year;
        assert_eq!(at(&run.series, RESOURCES, start), config.initial.resources);
        assert_eq!(at(&run.series, IN_USE_STOCK, start), config.initial.in_use_stock);
        assert_eq!(at(&run.series, BATTERIES, start), config.initial.batteries);
        assert_eq!(at(&run.series, GRID, start), config.initial.grid);
        assert_eq!(at(&run.series, WASTE, start), config.initial.waste);
    }

    #[test]
    fn every_stock_balances_at_every_step() {
        for config in [ScenarioConfig::default(), dashboard_like()] {
            let run = config.run().expect("run");
            let s = &run.series;
            let Horizon {
                start_year,
                end_year,
            } = config.horizon;
            for t in start_year..end_year {
                let flow = |name: &str| at(s, name, t);
                let delta = |name: &str| at(s, name, t + 1) - at(s, name, t);
                let balances = [
                    (RESOURCES, flow(NEW_FINDS) - flow(MINING)),
                    (
                        IN_USE_STOCK,
                        flow(MINING) + flow(BATTERY_RECYCLING) + flow(GRID_RECYCLING)
                            - flow(BATTERY_PRODUCTION),
                    ),
                    (
                        BATTERIES,
                        flow(BATTERY_PRODUCTION)
                            - flow(BATTERY_RECYCLING)
                            - flow(BATTERY_REPURPOSE)
                            - flow(BATTERY_WASTE),
                    ),
                    (
                        GRID,
                        flow(BATTERY_REPURPOSE) - flow(GRID_RECYCLING) - flow(GRID_WASTE),
                    ),
                    (WASTE, flow(BATTERY_WASTE) + flow(GRID_WASTE)),
                ];
                for (stock, expected) in balances {
                    let scale = at(s, stock, t).abs().max(1.0);
                    assert!(
                        (delta(stock) - expected).abs() <= TOL * scale,
                        "{stock} out of balance at {t}"
                    );
                }
            }
        }
    }

    #[test]
    fn waste_never_decreases() {
        for config in [ScenarioConfig::default(), dashboard_like(), zero_rates(2022, 2030)] {
            let run = config.run().expect("run");
            let waste = run.series.stock(WASTE).expect("waste").values();
            assert!(waste.windows(2).all(|w| w[1] >= w[0]));
        }
    }

    #[test]
    fn waste_never_decreases_when_rates_sum_to_one() {
        for (recycling, repurpose) in [(0.8, 0.2), (0.9, 0.1), (0.7, 0.3)] {
            let config = ScenarioConfig {
                battery_recycling_rate: recycling,
                battery_repurpose_rate: repurpose,
                grid_recycling_rate: 1.0,
                initial: InitialStocks {
                    batteries: 1e6,
                    grid: 0.0,
                    ..InitialStocks::default()
                },
                horizon: Horizon {
                    start_year: 2022,
                    end_year: 2025,
                },
                ..ScenarioConfig::default()
            };
            assert!(config.validate().is_ok());
            let waste_rate = config.effective_waste_rate();
            assert!((0.0..1e-12).contains(&waste_rate), "got {waste_rate}");

            let run = config.run().expect("run");
            let battery_waste = run.series.flow(BATTERY_WASTE).expect("battery waste");
            assert!(battery_waste.values().iter().all(|&v| v >= 0.0));
            let waste = run.series.stock(WASTE).expect("waste").values();
            assert!(
                waste.windows(2).all(|w| w[1] >= w[0]),
                "waste decreased for {recycling} + {repurpose}: {waste:?}"
            );
        }
    }

    #[test]
    fn wide_horizons_are_rejected_without_overflow() {
        let config = zero_rates(-2_000_000_000, 2_000_000_000);
        assert_eq!(
            config.validate(),
            Err(ScenarioError::InvalidHorizon {
                start_year: -2_000_000_000,
                end_year: 2_000_000_000
            })
        );
        assert!(matches!(
            config.build_registry(),
            Err(Error::Scenario(ScenarioError::InvalidHorizon { .. }))
        ));
        assert!(config.run().is_err());

        let too_long = zero_rates(2022, 2022 + crate::integrator::MAX_HORIZON_YEARS + 1);
        assert!(too_long.validate().is_err());
    }

    #[test]
    fn identical_configuration_gives_identical_output() {
        let config = dashboard_like();
        let first = config.run().expect("run");
        let second = config.run().expect("run");
        assert_eq!(
            serde_json::to_string(&first).expect("serialize"),
            serde_json::to_string(&second).expect("serialize")
        );
    }

    #[test]
    fn flows_follow_rate_equations() {
        let config = dashboard_like();
        let run = config.run().expect("run");
        let t = config.horizon.start_year;
        let batteries = config.initial.batteries;
        let grid = config.initial.grid;
        assert!((at(&run.series, BATTERY_RECYCLING, t) - 0.3 * 0.1 * batteries).abs() < TOL);
        assert!((at(&run.series, BATTERY_WASTE, t) - 0.4 * 0.1 * batteries).abs() < TOL);
        assert!((at(&run.series, GRID_WASTE, t) - 0.7 * grid / 12.0).abs() < TOL);
        assert!((at(&run.series, NEW_FINDS, t) - 5000.0).abs() < TOL);
        // 100000 kt * 0.3 over 28 years.
        assert!((at(&run.series, MINING, t) - 30_000.0 / 28.0).abs() < TOL);
    }

    #[test]
    fn rejects_rates_summing_above_one_before_running() {
        let config = ScenarioConfig {
            battery_recycling_rate: 0.7,
            battery_repurpose_rate: 0.4,
            ..ScenarioConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ScenarioError::RatesExceedUnity {
                recycling: 0.7,
                repurpose: 0.4
            })
        );
        assert!(matches!(
            config.run(),
            Err(Error::Scenario(ScenarioError::RatesExceedUnity { .. }))
        ));
        let boundary = ScenarioConfig {
            battery_recycling_rate: 0.7,
            battery_repurpose_rate: 0.3,
            ..ScenarioConfig::default()
        };
        assert!(boundary.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_parameters() {
        let bad_rate = ScenarioConfig {
            grid_recycling_rate: 1.5,
            ..ScenarioConfig::default()
        };
        assert!(matches!(
            bad_rate.validate(),
            Err(ScenarioError::RateOutOfRange {
                name: "grid_recycling_rate",
                ..
            })
        ));

        let negative = ScenarioConfig {
            battery_production: -1.0,
            ..ScenarioConfig::default()
        };
        assert!(matches!(
            negative.validate(),
            Err(ScenarioError::NegativeValue { .. })
        ));

        let short_life = ScenarioConfig {
            grid_eol: EolRate::Lifespan(0.5),
            ..ScenarioConfig::default()
        };
        assert!(matches!(
            short_life.validate(),
            Err(ScenarioError::InvalidLifespan { .. })
        ));

        let backwards = zero_rates(2050, 2022);
        assert!(matches!(
            backwards.validate(),
            Err(ScenarioError::InvalidHorizon { .. })
        ));

        let nan = ScenarioConfig {
            battery_recycling_rate: f64::NAN,
            ..ScenarioConfig::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn extraction_share_is_capped_by_selection() {
        let config = ScenarioConfig {
            selection: Some(Selection {
                mineral: Mineral::Nickel,
                outlook: Outlook::StatedPolicies,
            }),
            mining: Mining::ExtractionLimit(0.5),
            ..ScenarioConfig::default()
        };
        match config.validate() {
            Err(ScenarioError::ExtractionShareOutOfRange { max, .. }) => assert_eq!(max, 0.35),
            other => panic!("expected extraction cap error, got {other:?}"),
        }
    }

    #[test]
    fn depletion_is_reported_not_fatal() {
        let config = ScenarioConfig {
            initial: InitialStocks {
                resources: 5000.0,
                ..InitialStocks::default()
            },
            new_finds: NewFinds::Fixed(0.0),
            battery_production: 2000.0,
            horizon: Horizon {
                start_year: 2022,
                end_year: 2026,
            },
            ..ScenarioConfig::default()
        };
        let run = config.run().expect("depletion must not abort the run");
        assert_eq!(
            run.series.stock(RESOURCES).expect("resources").values(),
            vec![5000.0, 2000.0, -1000.0, -4000.0, -7000.0]
        );
        assert_eq!(run.negative_stocks().count(), 3);
    }

    #[test]
    fn reserves_seed_initial_resources() {
        let mut table = ReferenceTable::new();
        table.insert_reserves(Mineral::Lithium, 26_000.0);
        let selection = Selection {
            mineral: Mineral::Lithium,
            outlook: Outlook::NetZero2050,
        };
        let config = ScenarioConfig::default()
            .with_reserves(&table, selection)
            .expect("lithium reserves present");
        assert_eq!(config.initial.resources, 26_000.0);
        assert_eq!(config.selection, Some(selection));

        let missing = ScenarioConfig::default().with_reserves(
            &table,
            Selection {
                mineral: Mineral::Cobalt,
                outlook: Outlook::NetZero2050,
            },
        );
        assert!(matches!(missing, Err(ScenarioError::MissingReference(_))));
    }

    #[test]
    fn loads_partial_json_with_defaults() {
        let config = ScenarioConfig::from_json(
            r#"{
                "battery_recycling_rate": 0.4,
                "battery_eol": { "strategy": "lifespan", "value": 8 },
                "mining": { "strategy": "extraction_limit", "value": 0.2 },
                "selection": { "mineral": "cobalt", "outlook": "net_zero2050" },
                "horizon": { "start_year": 2025, "end_year": 2040 }
            }"#,
        )
        .expect("config should parse");
        assert_eq!(config.battery_recycling_rate, 0.4);
        assert_eq!(config.battery_eol, EolRate::Lifespan(8.0));
        assert_eq!(config.mining, Mining::ExtractionLimit(0.2));
        assert_eq!(config.battery_repurpose_rate, 0.02);
        assert_eq!(config.initial, InitialStocks::default());
        assert_eq!(config.horizon.end_year, 2040);
        assert!(config.validate().is_ok());

        assert!(ScenarioConfig::from_json("{ \"battery_eol\": 3 }").is_err());
    }

    #[test]
    fn derived_waste_rate_completes_the_split() {
        let config = dashboard_like();
        assert!((config.effective_waste_rate() - 0.4).abs() < 1e-12);
        let model = config
            .build_registry()
            .expect("registry")
            .compile()
            .expect("model");
        assert!((model.constant("battery_waste_rate").expect("waste rate") - 0.4).abs() < 1e-12);
        assert_eq!(model.constant("battery_eol_rate"), Some(0.1));
        assert_eq!(model.stock_names(), &STOCKS.map(String::from));
        assert_eq!(model.flow_names().len(), FLOWS.len());
    }
}
