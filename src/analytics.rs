//! Windowed analytics over value sequences
//!
//! Small numeric helpers for rolling statistics on query results. All
//! functions return `None` on degenerate input (empty slice, zero window,
//! window longer than the data, alpha outside `[0, 1]`).

/// Simple moving average with a fixed window
///
/// Returns one value per full window: `values.len() - window + 1` outputs.
pub fn moving_average(values: &[f64], window: usize) -> Option<Vec<f64>> {
    if window == 0 || values.len() < window {
        return None;
    }

    let mut out = Vec::with_capacity(values.len() - window + 1);
    let mut sum: f64 = values[..window].iter().sum();
    out.push(sum / window as f64);

    for i in window..values.len() {
        sum += values[i] - values[i - window];
        out.push(sum / window as f64);
    }

    Some(out)
}

/// Exponential moving average
///
/// `ema[0] = values[0]`, then `ema[i] = alpha * values[i] + (1 - alpha) * ema[i-1]`.
pub fn exponential_moving_average(values: &[f64], alpha: f64) -> Option<Vec<f64>> {
    if values.is_empty() || !(0.0..=1.0).contains(&alpha) {
        return None;
    }

    let mut out = Vec::with_capacity(values.len());
    out.push(values[0]);

    for &value in &values[1..] {
        let prev = out[out.len() - 1];
        out.push(alpha * value + (1.0 - alpha) * prev);
    }

    Some(out)
}

/// Rolling population standard deviation with a fixed window
///
/// Returns one value per full window, like [`moving_average`].
pub fn rolling_std_dev(values: &[f64], window: usize) -> Option<Vec<f64>> {
    if window == 0 || values.len() < window {
        return None;
    }

    let mut out = Vec::with_capacity(values.len() - window + 1);
    for slice in values.windows(window) {
        let mean = slice.iter().sum::<f64>() / window as f64;
        let variance = slice.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / window as f64;
        out.push(variance.sqrt());
    }

    Some(out)
}
