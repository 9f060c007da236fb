//! Small descriptive statistics helpers.

/// Arithmetic mean. Empty input gives 0.0.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation. Empty input gives 0.0.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values
        .iter()
        .map(|&v| {
            let diff = v - m;
            diff * diff
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

/// Median; the average of the two middle values for even counts.
pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 0 {
        let mid = n / 2;
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Percentile of already sorted values, with linear interpolation.
pub fn percentile(sorted: &[f64], percentile: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted[0];
    }

    let index = (percentile / 100.0) * (n - 1) as f64;
    let lower_idx = index.floor() as usize;
    let upper_idx = index.ceil() as usize;

    if lower_idx == upper_idx {
        sorted[lower_idx]
    } else {
        let frac = index.fract();
        sorted[lower_idx] + (sorted[upper_idx] - sorted[lower_idx]) * frac
    }
}
