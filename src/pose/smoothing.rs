//! Exponential smoothing
//!
//! Each update moves the smoothed value a fixed fraction of the way toward
//! the target: `s = s + (t - s) * factor`. The first update after creation
//! or a reset takes the target as-is.

use glam::Vec3;

/// Values that can be linearly interpolated
pub trait Lerp: Copy {
    fn lerp_to(self, target: Self, t: f32) -> Self;
}

impl Lerp for f32 {
    fn lerp_to(self, target: Self, t: f32) -> Self {
        self + (target - self) * t
    }
}

impl Lerp for Vec3 {
    fn lerp_to(self, target: Self, t: f32) -> Self {
        self.lerp(target, t)
    }
}

#[derive(Debug, Clone)]
pub struct ExponentialSmoother<T> {
    factor: f32,
    value: Option<T>,
}

impl<T: Lerp> ExponentialSmoother<T> {
    /// `factor` is clamped into (0, 1]; NaN falls back to 1.0 (no smoothing).
    pub fn new(factor: f32) -> Self {
        let factor = if factor.is_nan() {
            1.0
        } else {
            factor.clamp(f32::EPSILON, 1.0)
        };

        Self {
            factor,
            value: None,
        }
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    /// Feed one target and return the new smoothed value
    pub fn update(&mut self, target: T) -> T {
        let next = match self.value {
            Some(current) => current.lerp_to(target, self.factor),
            None => target,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<T> {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_update_snaps() {
        let mut s = ExponentialSmoother::new(0.3);
        assert_eq!(s.update(5.0f32), 5.0);
    }

    #[test]
    fn test_lerp_step() {
        let mut s = ExponentialSmoother::new(0.3);
        s.update(0.0f32);
        assert!((s.update(10.0) - 3.0).abs() < 1e-6);
        assert!((s.update(10.0) - 5.1).abs() < 1e-5);
    }

    #[test]
    fn test_vec3() {
        let mut s = ExponentialSmoother::new(0.5);
        s.update(Vec3::ZERO);
        let v = s.update(Vec3::new(2.0, -2.0, 4.0));
        assert!(v.abs_diff_eq(Vec3::new(1.0, -1.0, 2.0), 1e-6));
    }

    #[test]
    fn test_factor_clamped() {
        assert_eq!(ExponentialSmoother::<f32>::new(3.0).factor(), 1.0);
        assert!(ExponentialSmoother::<f32>::new(-1.0).factor() > 0.0);
        assert_eq!(ExponentialSmoother::<f32>::new(f32::NAN).factor(), 1.0);
    }

    #[test]
    fn test_reset() {
        let mut s = ExponentialSmoother::new(0.1);
        s.update(1.0f32);
        s.reset();
        assert!(s.value().is_none());
        assert_eq!(s.update(7.0), 7.0);
    }
}
