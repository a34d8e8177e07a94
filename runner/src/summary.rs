
use crate::{
    inputs::{MicrostructureInput, PorosityInput, SimulationInput, SingleBeadInput},
    study::SimulationType,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Melt pool measurements, one entry per time step
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct MeltPool {
    pub width: Vec<f64>,
    pub depth: Vec<f64>,
    pub length: Vec<f64>,
    pub reference_width: Vec<f64>,
    pub reference_depth: Vec<f64>,
}

/// median that skips NaN entries, NaN for an empty series
pub fn median(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();

    if sorted.is_empty() {
        return f64::NAN;
    }

    sorted.sort_by(f64::total_cmp);
    let middle = sorted.len() / 2;

    if sorted.len() % 2 == 0 {
        (sorted[middle - 1] + sorted[middle]) / 2.0
    } else {
        sorted[middle]
    }
}

/// ratio that is undefined for a non positive denominator
pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator > 0.0).then(|| numerator / denominator)
}

impl MeltPool {
    pub fn median_width(&self) -> f64 {
        median(&self.width)
    }

    pub fn median_depth(&self) -> f64 {
        median(&self.depth)
    }

    pub fn median_length(&self) -> f64 {
        median(&self.length)
    }

    pub fn median_reference_width(&self) -> f64 {
        median(&self.reference_width)
    }

    pub fn median_reference_depth(&self) -> f64 {
        median(&self.reference_depth)
    }

    pub fn length_over_width(&self) -> Option<f64> {
        ratio(self.median_length(), self.median_width())
    }

    pub fn reference_depth_over_width(&self) -> Option<f64> {
        ratio(self.median_reference_depth(), self.median_reference_width())
    }
}

/// One grain of a circle equivalence table, diameter in microns
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct CircleEquivalence {
    pub area_fraction: f64,
    pub diameter: f64,
}

/// Area fraction weighted sum of the grain diameters of a plane.
///
/// The fractions are not normalized, a table whose fractions do not add up to one yields a
/// scaled value.
pub fn average_grain_size(table: &[CircleEquivalence]) -> f64 {
    table
        .iter()
        .map(|grain| grain.diameter * grain.area_fraction)
        .sum()
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct SingleBeadSummary {
    pub input: SingleBeadInput,
    pub melt_pool: MeltPool,
    #[serde(default)]
    pub logs: String,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct PorositySummary {
    pub input: PorosityInput,
    pub relative_density: f64,
    #[serde(default)]
    pub logs: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct MicrostructureSummary {
    pub input: MicrostructureInput,
    pub xy_circle_equivalence: Vec<CircleEquivalence>,
    pub xz_circle_equivalence: Vec<CircleEquivalence>,
    pub yz_circle_equivalence: Vec<CircleEquivalence>,
    #[serde(default)]
    pub logs: String,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl MicrostructureSummary {
    pub fn xy_average_grain_size(&self) -> f64 {
        average_grain_size(&self.xy_circle_equivalence)
    }

    pub fn xz_average_grain_size(&self) -> f64 {
        average_grain_size(&self.xz_circle_equivalence)
    }

    pub fn yz_average_grain_size(&self) -> f64 {
        average_grain_size(&self.yz_circle_equivalence)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Summary {
    SingleBead(SingleBeadSummary),
    Porosity(PorositySummary),
    Microstructure(MicrostructureSummary),
}

impl Summary {
    pub fn id(&self) -> &str {
        match self {
            Self::SingleBead(summary) => &summary.input.id,
            Self::Porosity(summary) => &summary.input.id,
            Self::Microstructure(summary) => &summary.input.id,
        }
    }

    pub fn kind(&self) -> SimulationType {
        match self {
            Self::SingleBead(_) => SimulationType::SingleBead,
            Self::Porosity(_) => SimulationType::Porosity,
            Self::Microstructure(_) => SimulationType::Microstructure,
        }
    }

    /// directory holding downloaded artefacts of the simulation
    pub fn output_dir(&self) -> Option<&Path> {
        match self {
            Self::SingleBead(summary) => summary.output_dir.as_deref(),
            Self::Porosity(_) => None,
            Self::Microstructure(summary) => summary.output_dir.as_deref(),
        }
    }

    pub fn input(&self) -> SimulationInput {
        match self {
            Self::SingleBead(summary) => summary.input.clone().into(),
            Self::Porosity(summary) => summary.input.clone().into(),
            Self::Microstructure(summary) => summary.input.clone().into(),
        }
    }
}

/// Failed simulation, carries the input it was started with
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct SimulationError {
    pub input: SimulationInput,
    pub message: String,
    #[serde(default)]
    pub logs: String,
}

impl SimulationError {
    pub fn new(input: SimulationInput, message: impl Into<String>, logs: impl Into<String>) -> Self {
        Self {
            input,
            message: message.into(),
            logs: logs.into(),
        }
    }
}

/// Terminal result of one submitted simulation
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Summary(Summary),
    Error(SimulationError),
}

impl Outcome {
    pub fn id(&self) -> &str {
        match self {
            Self::Summary(summary) => summary.id(),
            Self::Error(error) => error.input.id(),
        }
    }

    pub fn kind(&self) -> SimulationType {
        match self {
            Self::Summary(summary) => summary.kind(),
            Self::Error(error) => error.input.kind(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}
