//! Year-indexed output of a simulation run.

use crate::integrator::MAX_HORIZON_YEARS;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearValue {
    pub year: i32,
    pub value: f64,
}

/// Ordered sequence of values for one quantity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub points: Vec<YearValue>,
}

impl Series {
    fn new(name: &str, capacity: usize) -> Self {
        Self {
            name: name.to_string(),
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn value_at(&self, year: i32) -> Option<f64> {
        let first = self.points.first()?.year;
        let offset = usize::try_from(year.checked_sub(first)?).ok()?;
        self.points.get(offset).map(|p| p.value)
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn last(&self) -> Option<YearValue> {
        self.points.last().copied()
    }
}

/// One row of the year-keyed table handed to charting/export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub year: i32,
    pub values: BTreeMap<String, f64>,
}

/// Stock series cover every year of the horizon; flow series cover every step
/// year (the rate applied from that year to the next).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesStore {
    start_year: i32,
    end_year: i32,
    stocks: Vec<Series>,
    flows: Vec<Series>,
}

impl TimeSeriesStore {
    pub fn new(
        start_year: i32,
        end_year: i32,
        stock_names: &[String],
        flow_names: &[String],
    ) -> Self {
        let years = end_year
            .checked_sub(start_year)
            .and_then(|span| usize::try_from(span).ok())
            .unwrap_or(0)
            .min(MAX_HORIZON_YEARS as usize)
            + 1;
        Self {
            start_year,
            end_year,
            stocks: stock_names.iter().map(|n| Series::new(n, years)).collect(),
            flows: flow_names.iter().map(|n| Series::new(n, years)).collect(),
        }
    }

    /// Appends one value per stock, in declaration order.
    pub(crate) fn record_stocks(&mut self, year: i32, values: &[f64]) {
        for (series, &value) in self.stocks.iter_mut().zip(values) {
            series.points.push(YearValue { year, value });
        }
    }

    pub(crate) fn record_flows(&mut self, year: i32, values: &[f64]) {
        for (series, &value) in self.flows.iter_mut().zip(values) {
            series.points.push(YearValue { year, value });
        }
    }

    pub fn years(&self) -> RangeInclusive<i32> {
        self.start_year..=self.end_year
    }

    pub fn stocks(&self) -> &[Series] {
        &self.stocks
    }

    pub fn flows(&self) -> &[Series] {
        &self.flows
    }

    pub fn stock(&self, name: &str) -> Option<&Series> {
        self.stocks.iter().find(|s| s.name == name)
    }

    pub fn flow(&self, name: &str) -> Option<&Series> {
        self.flows.iter().find(|s| s.name == name)
    }

    /// Value of a stock or flow in a given year.
    pub fn value(&self, name: &str, year: i32) -> Option<f64> {
        self.stock(name)
            .or_else(|| self.flow(name))
            .and_then(|series| series.value_at(year))
    }

    pub fn final_value(&self, stock: &str) -> Option<f64> {
        self.stock(stock)?.last().map(|p| p.value)
    }

    /// Stock values as rows keyed by year.
    pub fn table(&self) -> Vec<TableRow> {
        self.years()
            .map(|year| TableRow {
                year,
                values: self
                    .stocks
                    .iter()
                    .filter_map(|s| s.value_at(year).map(|v| (s.name.clone(), v)))
                    .collect(),
            })
            .collect()
    }
}
