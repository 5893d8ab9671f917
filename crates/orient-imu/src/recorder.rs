use crate::error::FilterError;
use crate::median::MedianFilter;
use crate::quat;
use crate::types::Sample;
use glam::DQuat;

/// One sensor's in-progress capture.
///
/// Each incoming reading is median-filtered per component and then folded
/// into a curve that aims for one point every `step` milliseconds. Readings
/// arriving faster than the step replace the pending last point; with
/// interpolation enabled, gaps of one step or more are filled with linearly
/// interpolated points.
///
/// [`Recorder::finish`] consumes the recorder, closing it.
pub struct Recorder {
    id: String,
    step: i64,
    interpolate: bool,
    /// One filter per component, in `w, x, y, z` order.
    filters: [MedianFilter<f64>; 4],
    data: Vec<Sample>,
}

impl Recorder {
    pub fn new(
        id: impl Into<String>,
        step: i64,
        interpolate: bool,
        median_window: usize,
    ) -> Result<Self, FilterError> {
        Ok(Self {
            id: id.into(),
            step,
            interpolate,
            filters: [
                MedianFilter::real(median_window)?,
                MedianFilter::real(median_window)?,
                MedianFilter::real(median_window)?,
                MedianFilter::real(median_window)?,
            ],
            data: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn step(&self) -> i64 {
        self.step
    }

    pub fn interpolates(&self) -> bool {
        self.interpolate
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Feed one calibrated reading.
    pub fn add(&mut self, timestamp: i64, q: DQuat) {
        let filtered = DQuat::from_xyzw(
            self.filters[1].sample(q.x),
            self.filters[2].sample(q.y),
            self.filters[3].sample(q.z),
            self.filters[0].sample(q.w),
        );
        let sample = Sample::new(timestamp, filtered);

        // Two points are needed before an interval exists.
        if self.data.len() < 2 {
            self.data.push(sample);
            return;
        }

        let last = self.data.len() - 1;
        let prev = self.data[last];
        let mut anchor = self.data[last - 1];
        let mut dt = (prev.timestamp() - anchor.timestamp()) as f64;
        let step = self.step as f64;

        if dt < step {
            self.data[last] = sample;
        } else if !self.interpolate {
            self.data.push(sample);
        } else {
            while dt >= step {
                anchor = Sample::new(
                    anchor.timestamp() + self.step,
                    quat::lerp(anchor.quaternion(), prev.quaternion(), step / dt),
                );
                let at = self.data.len() - 1;
                self.data.insert(at, anchor);
                dt = (prev.timestamp() - anchor.timestamp()) as f64;
            }
            let at = self.data.len() - 1;
            self.data[at] = sample;
        }
    }

    /// Snapshot of the curve so far.
    pub fn data(&self) -> Vec<Sample> {
        self.data.clone()
    }

    /// Close the recorder and hand over its curve.
    pub fn finish(self) -> Vec<Sample> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn timestamps(data: &[Sample]) -> Vec<i64> {
        data.iter().map(Sample::timestamp).collect()
    }

    fn around_x(x: f64) -> DQuat {
        DQuat::from_xyzw(x, 0.0, 0.0, 1.0)
    }

    #[test]
    fn first_two_samples_are_kept() {
        let mut rec = Recorder::new("r", 16, false, 3).unwrap();
        assert!(rec.is_empty());
        rec.add(0, DQuat::IDENTITY);
        rec.add(3, DQuat::IDENTITY);
        assert_eq!(timestamps(&rec.data()), vec![0, 3]);
    }

    #[test]
    fn burst_replaces_pending_point() {
        let mut rec = Recorder::new("r", 16, false, 3).unwrap();
        rec.add(0, DQuat::IDENTITY);
        rec.add(10, DQuat::IDENTITY);
        rec.add(30, DQuat::IDENTITY);
        assert_eq!(timestamps(&rec.data()), vec![0, 30]);
    }

    #[test]
    fn wide_gap_appends_without_interpolation() {
        let mut rec = Recorder::new("r", 10, false, 3).unwrap();
        for ts in [0, 10, 35, 36] {
            rec.add(ts, DQuat::IDENTITY);
        }
        // The gap is measured between the last two stored points, so once
        // 35 lands after a full step, 36 is appended as well.
        assert_eq!(timestamps(&rec.data()), vec![0, 10, 35, 36]);
    }

    #[test]
    fn interpolation_fills_steps() {
        let mut rec = Recorder::new("r", 10, true, 3).unwrap();
        // Constant input keeps the median filters transparent.
        for ts in [0, 10, 10, 30, 40] {
            rec.add(ts, DQuat::IDENTITY);
        }
        assert_eq!(timestamps(&rec.data()), vec![0, 10, 20, 30, 40]);
    }

    #[test]
    fn interpolated_points_are_linear() {
        let mut rec = Recorder::new("r", 10, true, 3).unwrap();
        // Monotonic input: the 3-window median lags by one sample.
        rec.add(0, around_x(0.0));
        rec.add(10, around_x(0.0));
        rec.add(10, around_x(0.4)); // filtered to 0.0
        rec.add(30, around_x(0.4)); // filtered to 0.4, replaces the pending point
        rec.add(40, around_x(0.4)); // fills 20 and 30

        let data = rec.data();
        assert_eq!(timestamps(&data), vec![0, 10, 20, 30, 40]);
        assert_abs_diff_eq!(data[2].quaternion().x, 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(data[3].quaternion().x, 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(data[4].quaternion().x, 0.4, epsilon = 1e-12);
        assert_eq!(data[2].quaternion().w, 1.0);
    }

    #[test]
    fn components_are_median_filtered() {
        let mut rec = Recorder::new("r", 1, false, 3).unwrap();
        rec.add(0, around_x(0.1));
        rec.add(1, around_x(0.2));
        rec.add(2, around_x(9.0));
        let data = rec.finish();
        assert_eq!(data.len(), 3);
        assert_eq!(data[2].quaternion().x, 0.2);
    }

    #[test]
    fn rejects_invalid_window() {
        assert!(Recorder::new("r", 16, false, 1).is_err());
    }
}
