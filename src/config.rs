//! Analysis settings.
//!
//! Settings come from an optional TOML file and are then overridden by CLI
//! flags. Every field has a default so an empty file is a valid config:
//!
//! ```toml
//! buffers = [0, 30, 60, 90, 120]
//! selected_buffer = 60
//! cascade_edges = [100, 500, 1000]
//! scope = "connect"
//!
//! [histogram]
//! clip_min = -500
//! clip_max = 1000
//! bin_width = 25
//!
//! [impact]
//! mean_daily_price = 120.0
//! rental_days = 1.5
//! loss_rate = 0.6
//! ```

use crate::error::{AnalysisError, Result};
use crate::model::CheckinType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_BUFFER_STEP: i64 = 15;
pub const DEFAULT_BUFFER_MAX: i64 = 180;
pub const DEFAULT_SELECTED_BUFFER: i64 = 60;
pub const DEFAULT_CASCADE_EDGES: [i64; 3] = [100, 500, 1000];
/// One year. Larger buffers would hide every slot and overflow timestamp math.
pub const MAX_BUFFER_MINUTES: i64 = 525_600;

/// Reject negative or oversized buffers before anything is computed.
pub fn validate_buffer(minutes: i64) -> Result<i64> {
    if !(0..=MAX_BUFFER_MINUTES).contains(&minutes) {
        return Err(AnalysisError::InvalidBuffer(minutes));
    }
    Ok(minutes)
}

/// Which rentals an analysis looks at, by checkin type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    All,
    Mobile,
    Connect,
    Paper,
}

impl Scope {
    pub fn admits(&self, checkin_type: CheckinType) -> bool {
        match self {
            Scope::All => true,
            Scope::Mobile => checkin_type == CheckinType::Mobile,
            Scope::Connect => checkin_type == CheckinType::Connect,
            Scope::Paper => checkin_type == CheckinType::Paper,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scope::All => "all",
            Scope::Mobile => "mobile",
            Scope::Connect => "connect",
            Scope::Paper => "paper",
        };
        f.write_str(s)
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Scope::All),
            other => other.parse::<CheckinType>().map(|t| match t {
                CheckinType::Mobile => Scope::Mobile,
                CheckinType::Connect => Scope::Connect,
                CheckinType::Paper => Scope::Paper,
            }),
        }
    }
}

/// Sorted, de-duplicated, non-negative buffer values to evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BufferSweep(Vec<i64>);

impl BufferSweep {
    pub fn new<I: IntoIterator<Item = i64>>(values: I) -> Result<Self> {
        let mut values = values
            .into_iter()
            .map(validate_buffer)
            .collect::<Result<Vec<_>>>()?;
        if values.is_empty() {
            return Err(AnalysisError::config("buffer sweep is empty"));
        }
        values.sort_unstable();
        values.dedup();
        Ok(Self(values))
    }

    /// `0, step, 2*step, ...` up to and including `max`.
    pub fn stepped(step: i64, max: i64) -> Result<Self> {
        validate_buffer(max)?;
        if step <= 0 {
            return Err(AnalysisError::config(format!(
                "buffer step must be positive, got {}",
                step
            )));
        }
        Self::new((0..=max).step_by(step as usize))
    }

    pub fn values(&self) -> &[i64] {
        &self.0
    }
}

impl Default for BufferSweep {
    fn default() -> Self {
        Self((0..=DEFAULT_BUFFER_MAX).step_by(DEFAULT_BUFFER_STEP as usize).collect())
    }
}

/// Bounds and bin width for the delay histogram (minutes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramConfig {
    pub clip_min: i64,
    pub clip_max: i64,
    pub bin_width: i64,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            clip_min: -500,
            clip_max: 1000,
            bin_width: 25,
        }
    }
}

impl HistogramConfig {
    pub fn validate(&self) -> Result<()> {
        if self.clip_min >= self.clip_max {
            return Err(AnalysisError::config(format!(
                "histogram clip_min ({}) must be below clip_max ({})",
                self.clip_min, self.clip_max
            )));
        }
        if self.bin_width <= 0 {
            return Err(AnalysisError::config("histogram bin_width must be positive"));
        }
        Ok(())
    }
}

/// Business assumptions used to price the selected buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactAssumptions {
    /// Mean price of one rental day
    pub mean_daily_price: f64,
    /// Mean rental duration in days
    #[serde(default = "default_rental_days")]
    pub rental_days: f64,
    /// Share of masked rentals that turn into lost revenue (0..=1)
    #[serde(default = "default_loss_rate")]
    pub loss_rate: f64,
}

fn default_rental_days() -> f64 {
    1.5
}

fn default_loss_rate() -> f64 {
    0.6
}

impl ImpactAssumptions {
    pub fn new(mean_daily_price: f64) -> Self {
        Self {
            mean_daily_price,
            rental_days: default_rental_days(),
            loss_rate: default_loss_rate(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.mean_daily_price.is_finite() || self.mean_daily_price < 0.0 {
            return Err(AnalysisError::config("mean_daily_price must be >= 0"));
        }
        if !self.rental_days.is_finite() || self.rental_days <= 0.0 {
            return Err(AnalysisError::config("rental_days must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.loss_rate) {
            return Err(AnalysisError::config("loss_rate must be within 0..=1"));
        }
        Ok(())
    }
}

/// Everything that parameterizes one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Buffer values (minutes) swept for the ROI curve
    pub buffers: Vec<i64>,
    /// Buffer used for per-link flags and the business impact
    pub selected_buffer: i64,
    /// Upper edges of the cascade buckets on previous lateness (minutes)
    pub cascade_edges: Vec<i64>,
    pub histogram: HistogramConfig,
    pub scope: Scope,
    pub impact: Option<ImpactAssumptions>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            buffers: BufferSweep::default().values().to_vec(),
            selected_buffer: DEFAULT_SELECTED_BUFFER,
            cascade_edges: DEFAULT_CASCADE_EDGES.to_vec(),
            histogram: HistogramConfig::default(),
            scope: Scope::All,
            impact: None,
        }
    }
}

impl AnalysisConfig {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| AnalysisError::io(path, e))?;
        let config: AnalysisConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn sweep(&self) -> Result<BufferSweep> {
        BufferSweep::new(self.buffers.iter().copied())
    }

    /// Check every knob. Called before any computation.
    pub fn validate(&self) -> Result<()> {
        self.sweep()?;
        validate_buffer(self.selected_buffer)?;
        if self.cascade_edges.is_empty() {
            return Err(AnalysisError::config("cascade_edges is empty"));
        }
        if self.cascade_edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AnalysisError::config(format!(
                "cascade_edges must be strictly increasing: {:?}",
                self.cascade_edges
            )));
        }
        self.histogram.validate()?;
        if let Some(ref impact) = self.impact {
            impact.validate()?;
        }
        Ok(())
    }
}
