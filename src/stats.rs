//! Small descriptive statistics helpers shared by the derivation engines.
//!
//! All functions take already-filtered (non-null) samples and return `None`
//! rather than NaN when a statistic is undefined.

pub fn mean(values: &[f64]) -> Option<f64> {
  if values.is_empty() {
    return None;
  }
  Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divisor N)
pub fn population_std(values: &[f64]) -> Option<f64> {
  let m = mean(values)?;
  let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
  Some(var.sqrt())
}

/// Sample standard deviation (divisor N - 1); undefined below two values
pub fn sample_std(values: &[f64]) -> Option<f64> {
  if values.len() < 2 {
    return None;
  }
  let m = mean(values)?;
  let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
  Some(var.sqrt())
}

pub fn min(values: &[f64]) -> Option<f64> {
  values.iter().copied().reduce(f64::min)
}

pub fn max(values: &[f64]) -> Option<f64> {
  values.iter().copied().reduce(f64::max)
}

/// Pearson correlation of paired samples; `None` when either side has zero variance
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
  if xs.len() != ys.len() || xs.len() < 2 {
    return None;
  }
  let mx = mean(xs)?;
  let my = mean(ys)?;

  let mut cov = 0.0;
  let mut vx = 0.0;
  let mut vy = 0.0;
  for (x, y) in xs.iter().zip(ys) {
    cov += (x - mx) * (y - my);
    vx += (x - mx).powi(2);
    vy += (y - my).powi(2);
  }

  if vx <= 0.0 || vy <= 0.0 {
    return None;
  }
  Some(cov / (vx.sqrt() * vy.sqrt()))
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
  let factor = 10f64.powi(decimals);
  (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::assert_approx_eq;

  #[test]
  fn test_population_vs_sample_std() {
    let values = [2.0, 4.0, 6.0];
    assert_approx_eq!(population_std(&values).unwrap(), 1.63299, 1e-4);
    assert_approx_eq!(sample_std(&values).unwrap(), 2.0, 1e-9);
    assert_eq!(sample_std(&[5.0]), None);
    assert_eq!(population_std(&[]), None);
  }

  #[test]
  fn test_pearson_perfect_and_degenerate() {
    let xs = [1.0, 2.0, 3.0, 4.0];
    assert_approx_eq!(pearson(&xs, &[2.0, 4.0, 6.0, 8.0]).unwrap(), 1.0, 1e-9);
    assert_approx_eq!(pearson(&xs, &[8.0, 6.0, 4.0, 2.0]).unwrap(), -1.0, 1e-9);
    assert_eq!(pearson(&xs, &[3.0, 3.0, 3.0, 3.0]), None);
    assert_eq!(pearson(&xs, &[1.0]), None);
  }

  #[test]
  fn test_min_max_round() {
    assert_eq!(min(&[3.0, 1.5, 2.0]), Some(1.5));
    assert_eq!(max(&[3.0, 1.5, 2.0]), Some(3.0));
    assert_eq!(max(&[]), None);
    assert_eq!(round_to(7.456, 2), 7.46);
    assert_eq!(round_to(449.6, 0), 450.0);
  }
}
