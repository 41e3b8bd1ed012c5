use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CostError {
    #[error("invalid input: {field} must be finite and non-negative (got {value})")]
    InvalidInput { field: &'static str, value: f64 },
}

/// Projected charge for one render. Shown once at the gate, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostEstimate {
    duration_secs: f64,
    rate_per_sec: f64,
    total: f64,
}

impl CostEstimate {
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn rate_per_sec(&self) -> f64 {
        self.rate_per_sec
    }

    pub fn total(&self) -> f64 {
        self.total
    }
}

impl fmt::Display for CostEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1}s x ${:.3}/s = ${:.2}",
            self.duration_secs, self.rate_per_sec, self.total
        )
    }
}

pub fn estimate(duration_secs: f64, rate_per_sec: f64) -> Result<CostEstimate, CostError> {
    check("duration", duration_secs)?;
    check("rate", rate_per_sec)?;
    Ok(CostEstimate {
        duration_secs,
        rate_per_sec,
        total: duration_secs * rate_per_sec,
    })
}

fn check(field: &'static str, value: f64) -> Result<(), CostError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(CostError::InvalidInput { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_seconds_at_default_rate() {
        let cost = estimate(30.0, 0.056).unwrap();
        assert!((cost.total() - 1.68).abs() < 1e-9);
        assert_eq!(cost.to_string(), "30.0s x $0.056/s = $1.68");
    }

    #[test]
    fn total_is_exact_product() {
        for (d, r) in [(0.0, 0.056), (12.5, 0.0), (271.3, 0.056), (1e6, 3.5)] {
            assert_eq!(estimate(d, r).unwrap().total(), d * r);
        }
    }

    #[test]
    fn rejects_negative_and_non_finite() {
        for bad in [-1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                estimate(bad, 0.056),
                Err(CostError::InvalidInput { field: "duration", .. })
            ));
            assert!(matches!(
                estimate(10.0, bad),
                Err(CostError::InvalidInput { field: "rate", .. })
            ));
        }
    }
}
