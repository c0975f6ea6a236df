use std::time::Duration;

/// Round-trip statistics for a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub transmitted: usize,
    pub received: usize,
    pub loss_percent: f64,
    pub min: Duration,
    pub avg: Duration,
    pub max: Duration,
    /// Population standard deviation of the samples around `avg`.
    pub mdev: Duration,
}

impl Statistics {
    /// Summarize `samples`, the RTTs of every matched reply, out of
    /// `transmitted` probes. All durations are zero when nothing was received.
    pub fn compute(samples: &[Duration], transmitted: usize) -> Self {
        let received = samples.len();
        let loss_percent = if transmitted == 0 {
            0f64
        } else {
            100f64 * transmitted.saturating_sub(received) as f64 / transmitted as f64
        };

        if samples.is_empty() {
            return Statistics {
                transmitted,
                received,
                loss_percent,
                min: Duration::ZERO,
                avg: Duration::ZERO,
                max: Duration::ZERO,
                mdev: Duration::ZERO,
            };
        }

        let min = samples.iter().copied().min().unwrap_or_default();
        let max = samples.iter().copied().max().unwrap_or_default();
        let avg = samples.iter().sum::<Duration>() / received as u32;
        let mean = avg.as_secs_f64();
        let variance = samples
            .iter()
            .map(|s| (s.as_secs_f64() - mean).powi(2))
            .sum::<f64>()
            / received as f64;

        Statistics {
            transmitted,
            received,
            loss_percent,
            min,
            avg,
            max,
            mdev: Duration::from_secs_f64(variance.sqrt()),
        }
    }
}
