use crate::types::Statistic;

/// Statistic list with `count` first when missing; unchanged when present
pub fn ensure_count(statistics: &[Statistic]) -> Vec<Statistic> {
    if statistics.contains(&Statistic::Count) {
        statistics.to_vec()
    } else {
        let mut out = Vec::with_capacity(statistics.len() + 1);
        out.push(Statistic::Count);
        out.extend_from_slice(statistics);
        out
    }
}

/// Linear-interpolated percentile of sorted values; `None` when empty
fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    match sorted.len() {
        0 => None,
        1 => Some(sorted[0]),
        len => {
            let rank = q / 100.0 * (len - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
        }
    }
}

fn mean(sorted: &[f64]) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    Some(sorted.iter().sum::<f64>() / sorted.len() as f64)
}

/// Compute `stat` over sorted valid values; `masked` is the number of masked pixels in the
/// zone. Value statistics over an empty set are `None`.
pub fn compute_statistic(stat: Statistic, sorted: &[f64], masked: usize) -> Option<f64> {
    match stat {
        Statistic::Count => Some(sorted.len() as f64),
        Statistic::Nodata => Some(masked as f64),
        Statistic::Min => sorted.first().copied(),
        Statistic::Max => sorted.last().copied(),
        Statistic::Sum => (!sorted.is_empty()).then(|| sorted.iter().sum()),
        Statistic::Mean => mean(sorted),
        Statistic::Std => mean(sorted).map(|m| {
            let squares: f64 = sorted.iter().map(|v| (v - m).powi(2)).sum();
            (squares / sorted.len() as f64).sqrt()
        }),
        Statistic::Median => percentile(sorted, 50.0),
        Statistic::Range => Some(sorted.last()? - sorted.first()?),
        Statistic::Percentile(q) => percentile(sorted, q as f64),
    }
}
