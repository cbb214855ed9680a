/// Outcome of evaluating one declared dimension value against its reference
/// distribution.
#[derive(Debug, Clone, PartialEq)]
pub enum CorrectionDecision {
    /// Value is consistent with the reference distribution; leave it alone.
    InRange,
    /// Value is an outlier with enough corroborating observations; replace
    /// it with the consensus value.
    Correct { consensus: f64 },
    /// Value is an outlier but the evidence is too thin to auto-correct;
    /// flag for manual review instead.
    NeedsReview,
}

/// Two-stage detect/repair policy for vessel dimensions.
///
/// Detection: interquartile-range fence over the dimension values of vessels
/// sharing the declared type classification. Repair: median of the
/// non-outlier observations, applied only when at least `min_evidence`
/// corroborating observations exist.
#[derive(Debug, Clone)]
pub struct DimensionPolicy {
    /// IQR fence multiplier (1.5 = the conventional Tukey fence).
    pub deviation_threshold: f64,
    /// Minimum number of non-outlier observations required to auto-correct.
    pub min_evidence: usize,
}

impl DimensionPolicy {
    pub fn new(deviation_threshold: f64, min_evidence: usize) -> Self {
        Self {
            deviation_threshold,
            min_evidence: min_evidence.max(1),
        }
    }

    /// Evaluate a declared value against the reference sample (which may
    /// include the declared value itself).
    pub fn evaluate(&self, declared: f64, samples: &[f64]) -> CorrectionDecision {
        // Quartiles are meaningless on a handful of points; without a usable
        // distribution nothing can be flagged.
        if samples.len() < 4 {
            return CorrectionDecision::InRange;
        }

        let mut sorted: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.len() < 4 {
            return CorrectionDecision::InRange;
        }
        sorted.sort_by(|a, b| a.partial_cmp(b).expect("finite values compare"));

        let q1 = percentile(&sorted, 0.25);
        let q3 = percentile(&sorted, 0.75);
        let iqr = q3 - q1;
        let lower = q1 - self.deviation_threshold * iqr;
        let upper = q3 + self.deviation_threshold * iqr;

        if declared >= lower && declared <= upper {
            return CorrectionDecision::InRange;
        }

        let non_outliers: Vec<f64> = sorted
            .iter()
            .copied()
            .filter(|v| *v >= lower && *v <= upper)
            .collect();

        if non_outliers.len() < self.min_evidence {
            return CorrectionDecision::NeedsReview;
        }

        CorrectionDecision::Correct {
            consensus: median(&non_outliers),
        }
    }
}

/// Linear-interpolation percentile over an already sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
}

fn median(sorted: &[f64]) -> f64 {
    percentile(sorted, 0.5)
}
