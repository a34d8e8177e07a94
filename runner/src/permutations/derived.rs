use serde::{Deserialize, Serialize};

/// Decimals kept for build rates, drops floating point noise of the product
const BUILD_RATE_PRECISION: i32 = 16;

/// Volume processed per second, `scan_speed * layer_thickness * hatch_spacing`.
///
/// Single bead tracks have no hatch spacing, their build rate is an area rate.
pub fn build_rate(scan_speed: f64, layer_thickness: f64, hatch_spacing: Option<f64>) -> f64 {
    let rate = scan_speed * layer_thickness * hatch_spacing.unwrap_or(1.0);
    let scale = 10f64.powi(BUILD_RATE_PRECISION);

    (rate * scale).round() / scale
}

/// Laser power divided by the build rate, NaN for a zero build rate
pub fn energy_density(
    laser_power: f64,
    scan_speed: f64,
    layer_thickness: f64,
    hatch_spacing: Option<f64>,
) -> f64 {
    let rate = build_rate(scan_speed, layer_thickness, hatch_spacing);

    if rate == 0.0 {
        f64::NAN
    } else {
        laser_power / rate
    }
}

/// Closed interval filter for a derived quantity, a missing side is unbounded
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Bounds {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Bounds {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn is_bounded(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    /// NaN only passes when neither side is set
    pub fn admits(&self, value: f64) -> bool {
        if value.is_nan() {
            return !self.is_bounded();
        }

        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}
