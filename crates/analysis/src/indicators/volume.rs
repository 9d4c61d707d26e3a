//! Volume classification.

use serde::{Deserialize, Serialize};

use super::moving_average::sma;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeLabel {
    High,
    Normal,
    Low,
    /// The series carries no volume (typical for spot forex feeds).
    NoData,
}

/// Current volume against its rolling average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeRatio {
    pub current: f64,
    pub average: f64,
    pub ratio: f64,
    pub label: VolumeLabel,
}

/// Compare the last volume to its `period` SMA. High above 1.5x, low below
/// 0.5x. Non-finite and negative volumes are skipped. Returns `None` when the
/// series has no volume at all.
pub fn volume_ratio(volumes: &[f64], period: usize) -> Option<VolumeRatio> {
    let volumes: Vec<f64> = volumes
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .collect();
    let total: f64 = volumes.iter().sum();
    if volumes.is_empty() || total <= 0.0 {
        return None;
    }

    let averages = sma(&volumes, period);
    let current = *volumes.last()?;
    let average = *averages.last()?;
    let ratio = if average > 0.0 { current / average } else { 1.0 };
    let label = if current > average * 1.5 {
        VolumeLabel::High
    } else if current < average * 0.5 {
        VolumeLabel::Low
    } else {
        VolumeLabel::Normal
    };

    Some(VolumeRatio {
        current,
        average,
        ratio,
        label,
    })
}
