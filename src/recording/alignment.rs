// Latency compensation for recorded takes
//
// The offset a take is placed at splits the difference between the transport
// time at arm (expected) and the time observed when capture truly began
// (actual). Both values jitter independently; half the measured latency is an
// empirical compromise kept as is.

/// Expected vs. observed capture start (seconds on the shared timeline)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyMeasurement {
    pub expected: f64,
    pub actual: f64,
}

impl LatencyMeasurement {
    pub fn new(expected: f64, actual: f64) -> Self {
        Self { expected, actual }
    }

    /// Measured capture latency
    pub fn latency(&self) -> f64 {
        self.actual - self.expected
    }

    /// Offset the take is aligned to: `expected + latency / 2`
    pub fn compensated_offset(&self) -> f64 {
        compensated_offset(self.expected, self.actual)
    }
}

pub fn compensated_offset(expected: f64, actual: f64) -> f64 {
    expected + (actual - expected) / 2.0
}

/// Silence frames to prepend for an offset; negative offsets pad nothing
pub fn padding_frames(offset_seconds: f64, sample_rate: u32) -> usize {
    if !offset_seconds.is_finite() || offset_seconds <= 0.0 {
        return 0;
    }
    (offset_seconds * sample_rate as f64).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_half_latency_compensation() {
        let m = LatencyMeasurement::new(4.0, 4.02);
        assert_relative_eq!(m.latency(), 0.02, epsilon = 1e-12);
        assert_relative_eq!(m.compensated_offset(), 4.01, epsilon = 1e-12);
    }

    #[test]
    fn test_padding_frames() {
        assert_eq!(padding_frames(4.01, 48000), 192_480);
        assert_eq!(padding_frames(0.5, 44100), 22_050);
        assert_eq!(padding_frames(-0.2, 48000), 0);
        assert_eq!(padding_frames(f64::NAN, 48000), 0);
    }
}
