use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};

use crate::Float;

mod named;

pub use named::Named;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb<T = u8>(pub T, pub T, pub T);

impl<T: Float> Rgb<T> {
    /// Sum of absolute channel differences.
    pub fn l1_distance(&self, other: &Self) -> T {
        (self.0 - other.0).abs() + (self.1 - other.1).abs() + (self.2 - other.2).abs()
    }

    pub fn average(&self) -> T {
        (self.0 + self.1 + self.2) / T::THREE
    }
}

pub trait AsRgb<T> {
    fn as_rgb(&self) -> Rgb<T>;
}

/// Keeps the 0..=255 channel range, only the scalar type changes.
impl<S: Float> AsRgb<S> for Rgb
where
    u8: AsPrimitive<S>,
{
    fn as_rgb(&self) -> Rgb<S> {
        Rgb(self.0.as_(), self.1.as_(), self.2.as_())
    }
}
