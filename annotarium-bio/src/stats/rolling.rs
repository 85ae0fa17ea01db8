//! Rolling length statistics

use serde::{Deserialize, Serialize};

/// Streaming min/max/mean accumulator; never stores the observations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunningStats {
    count: u64,
    min: u64,
    max: u64,
    sum: u128,
}

impl RunningStats {
    pub fn add(&mut self, value: u64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += u128::from(value);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn finalize(&self) -> LengthStats {
        LengthStats {
            count: self.count,
            min: self.min,
            max: self.max,
            mean: if self.count == 0 {
                0.0
            } else {
                self.sum as f64 / self.count as f64
            },
        }
    }
}

/// Serialized length statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LengthStats {
    pub count: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [10, 2, 7] {
            stats.add(v);
        }
        let out = stats.finalize();
        assert_eq!(out.count, 3);
        assert_eq!(out.min, 2);
        assert_eq!(out.max, 10);
        assert!((out.mean - 19.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_stats() {
        let out = RunningStats::default().finalize();
        assert_eq!(out.count, 0);
        assert_eq!(out.min, 0);
        assert_eq!(out.max, 0);
        assert_eq!(out.mean, 0.0);
    }
}
