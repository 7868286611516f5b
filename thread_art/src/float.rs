use std::{
    fmt::{Debug, Display},
    iter::Sum,
    ops::{AddAssign, DivAssign, MulAssign, SubAssign},
};

use num_traits::{ConstOne, ConstZero};

pub trait Float:
    'static
    + Debug
    + Display
    + Default
    + Sync
    + Send
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + Sum
    + num_traits::Float
    + num_traits::NumCast
    + ConstZero
    + ConstOne
{
    const HALF: Self;
    const INFINITY: Self;
    const TWO: Self;
    const THREE: Self;
    const PI: Self;
    const TWO_FIVE_FIVE: Self;
    const MIDPOINT: Self;
    /// Target intensity below which a pixel counts as dark for the run bonus.
    const DARK_THRESHOLD: Self;
    /// Residual above which a pixel still counts as in demand for the run bonus.
    const DEMAND_THRESHOLD: Self;
}

impl Float for f32 {
    const HALF: Self = 0.5;
    const INFINITY: Self = f32::INFINITY;
    const TWO: Self = 2.0;
    const THREE: Self = 3.0;
    const PI: Self = core::f32::consts::PI;
    const TWO_FIVE_FIVE: Self = 255.0;
    const MIDPOINT: Self = 127.5;
    const DARK_THRESHOLD: Self = 96.0;
    const DEMAND_THRESHOLD: Self = 128.0;
}

impl Float for f64 {
    const HALF: Self = 0.5;
    const INFINITY: Self = f64::INFINITY;
    const TWO: Self = 2.0;
    const THREE: Self = 3.0;
    const PI: Self = core::f64::consts::PI;
    const TWO_FIVE_FIVE: Self = 255.0;
    const MIDPOINT: Self = 127.5;
    const DARK_THRESHOLD: Self = 96.0;
    const DEMAND_THRESHOLD: Self = 128.0;
}
