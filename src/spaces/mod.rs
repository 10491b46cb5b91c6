//! Action space for the two wheel-acceleration commands.

pub mod interop;
pub mod space;

use rand::Rng;
use rand::distributions::{Distribution, Uniform};

pub use space::Space;

/// A simple Box-like space with element type `T` and fixed compile-time length `N`.
/// Uses per-dimension inclusive lower/upper bounds for validation and sampling.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxSpace<T: Copy + PartialOrd, const N: usize> {
    low: [T; N],
    high: [T; N],
}

impl<T: Copy + PartialOrd, const N: usize> BoxSpace<T, N> {
    pub fn new(low: [T; N], high: [T; N]) -> Self {
        for i in 0..N {
            assert!(low[i] <= high[i], "low[{i}] > high[{i}]");
        }
        Self { low, high }
    }

    pub fn low(&self) -> &[T; N] { &self.low }
    pub fn high(&self) -> &[T; N] { &self.high }

    /// Clamp each dimension into `[low, high]`.
    /// Values that compare with neither bound (NaN) become the lower bound.
    pub fn clip(&self, elem: [T; N]) -> [T; N] {
        let mut out = elem;
        for i in 0..N {
            let v = elem[i];
            out[i] = if v >= self.low[i] && v <= self.high[i] {
                v
            } else if v > self.high[i] {
                self.high[i]
            } else {
                self.low[i]
            };
        }
        out
    }
}

impl BoxSpace<f32, 2> {
    /// The `[-1, 1]²` wheel-acceleration command box.
    pub fn wheel_commands() -> Self { Self::new([-1.0, -1.0], [1.0, 1.0]) }

    /// Clamp a wheel command; NaN is treated as "no acceleration".
    pub fn clip_command(&self, command: [f32; 2]) -> [f32; 2] {
        let sanitized = command.map(|v| if v.is_nan() { 0.0 } else { v });
        self.clip(sanitized)
    }
}

impl<T, const N: usize> Space for BoxSpace<T, N>
where
    T: Copy + PartialOrd + rand::distributions::uniform::SampleUniform,
{
    type Element = [T; N];

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Self::Element {
        let mut arr = self.low;
        for i in 0..N {
            let dist = Uniform::new_inclusive(self.low[i], self.high[i]);
            arr[i] = dist.sample(rng);
        }
        arr
    }

    fn contains(&self, elem: &Self::Element) -> bool {
        (0..N).all(|i| self.low[i] <= elem[i] && elem[i] <= self.high[i])
    }
}
