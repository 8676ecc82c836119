//! The cost-query interpretation and projection engine: period resolution,
//! tabular result parsing, monthly breakdown derivation, and the
//! orchestrator tying them together.

pub mod breakdown;
pub mod parser;
pub mod period;
pub mod service;

/// Round to 2 fraction digits. Applied once, at aggregation boundaries.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::round2;

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.006), 1.01);
        assert_eq!(round2(1.004), 1.0);
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(round2(0.0), 0.0);
    }
}
