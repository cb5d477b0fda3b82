//! Error types shared across the engine.

use thiserror::Error;

/// Failure to turn equation text into an expression tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedCharacter { ch: char, offset: usize },
    #[error("malformed number '{0}'")]
    MalformedNumber(String),
    #[error("unexpected token {0}")]
    UnexpectedToken(String),
    #[error("unexpected end of equation")]
    UnexpectedEnd,
    #[error("expected ')'")]
    UnclosedParen,
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("trailing input after expression: {0}")]
    TrailingInput(String),
}

/// Errors raised while declaring, compiling or running a model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("quantity '{0}' is declared more than once")]
    DuplicateName(String),
    #[error("equation of '{quantity}' is invalid: {source}")]
    Parse {
        quantity: String,
        #[source]
        source: ParseError,
    },
    #[error("equation of '{quantity}' references unknown quantity '{reference}'")]
    UnknownReference { quantity: String, reference: String },
    #[error("constant '{constant}' cannot depend on flow '{flow}'")]
    FlowInConstant { constant: String, flow: String },
    #[error("net-flow equation of stock '{stock}' is not a signed sum of flows: {reason}")]
    InvalidNetFlow { stock: String, reason: String },
    #[error("cyclic dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),
    #[error("snapshot has {actual} stock values, model declares {expected}")]
    SnapshotMismatch { expected: usize, actual: usize },
    #[error("flow buffer has {actual} slots, model declares {expected} flows")]
    FlowBufferMismatch { expected: usize, actual: usize },
    #[error("horizon {start_year}..{end_year} must span between 1 and {max} years", max = crate::integrator::MAX_HORIZON_YEARS)]
    InvalidHorizon { start_year: i32, end_year: i32 },
}

/// Rejections of a scenario configuration before any simulation step runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScenarioError {
    #[error("{name} must lie in [0, 1], got {value}")]
    RateOutOfRange { name: &'static str, value: f64 },
    #[error(
        "battery recycling rate ({recycling}) plus repurpose rate ({repurpose}) exceeds 1"
    )]
    RatesExceedUnity { recycling: f64, repurpose: f64 },
    #[error("{name} must be finite and non-negative, got {value}")]
    NegativeValue { name: &'static str, value: f64 },
    #[error("{name} lifespan must be at least one year, got {years}")]
    InvalidLifespan { name: &'static str, years: f64 },
    #[error("horizon {start_year}..{end_year} must span between 1 and {max} years", max = crate::integrator::MAX_HORIZON_YEARS)]
    InvalidHorizon { start_year: i32, end_year: i32 },
    #[error("extraction share {share} for {mineral} under {outlook} must lie in [{min}, {max}]")]
    ExtractionShareOutOfRange {
        mineral: String,
        outlook: String,
        share: f64,
        min: f64,
        max: f64,
    },
    #[error("no reference data for {0}")]
    MissingReference(String),
}

/// Top-level error of a scenario run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
