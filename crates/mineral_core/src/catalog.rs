//! Minerals, outlook scenarios and reference data lookups.

use crate::error::ScenarioError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mineral {
    Lithium,
    Cobalt,
    Nickel,
}

impl Mineral {
    pub const ALL: [Mineral; 3] = [Mineral::Lithium, Mineral::Cobalt, Mineral::Nickel];

    pub fn name(self) -> &'static str {
        match self {
            Mineral::Lithium => "Lithium",
            Mineral::Cobalt => "Cobalt",
            Mineral::Nickel => "Nickel",
        }
    }
}

impl fmt::Display for Mineral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Clean energy deployment outlook (WEO 2022 / ETP 2023 scenarios).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outlook {
    StatedPolicies,
    AnnouncedPledges,
    NetZero2050,
}

impl Outlook {
    pub const ALL: [Outlook; 3] = [
        Outlook::StatedPolicies,
        Outlook::AnnouncedPledges,
        Outlook::NetZero2050,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            Outlook::StatedPolicies => "Stated Policies",
            Outlook::AnnouncedPledges => "Announced Pledges",
            Outlook::NetZero2050 => "Net Zero 2050",
        }
    }

    /// Label used by the demand datasets.
    pub fn dataset_label(self) -> &'static str {
        match self {
            Outlook::StatedPolicies => "Stated policies",
            Outlook::AnnouncedPledges => "Announced pledges",
            Outlook::NetZero2050 => "Net zero 2050",
        }
    }

    pub fn from_dataset_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.dataset_label() == label)
    }
}

impl fmt::Display for Outlook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Lowest extraction share a scenario may select.
pub const MIN_EXTRACTION_SHARE: f64 = 0.1;

/// Largest share of reserves that may be extracted over the horizon.
pub fn max_extraction_share(outlook: Outlook, mineral: Mineral) -> f64 {
    match (outlook, mineral) {
        (Outlook::StatedPolicies, Mineral::Nickel) => 0.35,
        (Outlook::StatedPolicies, Mineral::Cobalt) => 0.40,
        (Outlook::StatedPolicies, Mineral::Lithium) => 0.75,
        (_, Mineral::Nickel) => 0.50,
        (_, Mineral::Cobalt) => 0.55,
        (_, Mineral::Lithium) => 0.85,
    }
}

/// The mineral/outlook pair a scenario is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub mineral: Mineral,
    pub outlook: Outlook,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            mineral: Mineral::Lithium,
            outlook: Outlook::StatedPolicies,
        }
    }
}

/// In-memory reserves and demand figures (kt), filled by an external loader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceTable {
    reserves: BTreeMap<Mineral, f64>,
    demand: BTreeMap<(Outlook, Mineral, i32), f64>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_reserves(&mut self, mineral: Mineral, kilotons: f64) {
        self.reserves.insert(mineral, kilotons);
    }

    pub fn insert_demand(&mut self, outlook: Outlook, mineral: Mineral, year: i32, kilotons: f64) {
        self.demand.insert((outlook, mineral, year), kilotons);
    }

    pub fn reserves(&self, mineral: Mineral) -> Result<f64, ScenarioError> {
        self.reserves
            .get(&mineral)
            .copied()
            .ok_or_else(|| ScenarioError::MissingReference(format!("{mineral} reserves")))
    }

    pub fn demand(&self, outlook: Outlook, mineral: Mineral, year: i32) -> Result<f64, ScenarioError> {
        self.demand
            .get(&(outlook, mineral, year))
            .copied()
            .ok_or_else(|| {
                ScenarioError::MissingReference(format!("{mineral} demand in {year} ({outlook})"))
            })
    }

    /// Demand per year over an inclusive range; fails on the first gap.
    pub fn demand_series(
        &self,
        outlook: Outlook,
        mineral: Mineral,
        years: std::ops::RangeInclusive<i32>,
    ) -> Result<Vec<(i32, f64)>, ScenarioError> {
        years
            .map(|year| self.demand(outlook, mineral, year).map(|d| (year, d)))
            .collect()
    }
}
