//! Remaining-reserve curve under geometrically growing consumption.

use crate::timeseries::YearValue;
use anyhow::{bail, Result};

/// Exhaustion later than this is treated as a configuration mistake.
pub const MAX_DEPLETION_YEARS: usize = 1000;

/// Reserves left at the end of each year, starting with `reserves` at
/// `start_year`. Consumption grows by `growth_rate` before each year's
/// withdrawal. Reported values are clamped at 0 and the curve ends at the first
/// year they reach it.
pub fn depletion_timeline(
    reserves: f64,
    annual_consumption: f64,
    growth_rate: f64,
    start_year: i32,
) -> Result<Vec<YearValue>> {
    if !reserves.is_finite() || reserves < 0.0 {
        bail!("Reserves must be finite and non-negative.");
    }
    if !annual_consumption.is_finite() || annual_consumption <= 0.0 {
        bail!("Annual consumption must be positive.");
    }
    if !growth_rate.is_finite() || growth_rate <= -1.0 {
        bail!("Consumption growth rate must be greater than -1.");
    }

    let mut remaining = reserves;
    let mut consumption = annual_consumption;
    let mut year = start_year;
    let mut timeline = vec![YearValue {
        year,
        value: remaining,
    }];

    while remaining > 0.0 {
        if timeline.len() > MAX_DEPLETION_YEARS {
            bail!(
                "Reserves are not exhausted within {} years.",
                MAX_DEPLETION_YEARS
            );
        }
        year = match year.checked_add(1) {
            Some(next) => next,
            None => bail!("Depletion timeline runs past the last representable year."),
        };
        consumption *= 1.0 + growth_rate;
        remaining -= consumption;
        timeline.push(YearValue {
            year,
            value: remaining.max(0.0),
        });
    }

    Ok(timeline)
}
