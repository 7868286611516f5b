use crate::{color::Rgb, geometry::Point, image::Image, line_cache::Line, Float, Grid};

/// Per pixel ink demand left to satisfy.
///
/// Values live in `0..=255`. `target` keeps the contrast adjusted intensity the demand was
/// derived from (dark means "wants ink") and never changes.
#[derive(Clone, Debug)]
pub struct ResidualField<S> {
    values: Vec<S>,
    target: Vec<S>,
    grid: Grid,
}

impl<S: Float> ResidualField<S> {
    /// Demand from the inverted channel average of the image.
    pub fn grayscale(image: &Image<S>, contrast: S) -> Self {
        Self::from_intensity(*image.grid(), image.pixels().iter().map(Rgb::average), contrast)
    }

    /// Demand from the closeness of every pixel to `color`, the L1 distance scaled to `0..=255`.
    pub fn color(image: &Image<S>, color: &Rgb<S>, contrast: S) -> Self {
        Self::from_intensity(
            *image.grid(),
            image
                .pixels()
                .iter()
                .map(|pixel| pixel.l1_distance(color) / S::THREE),
            contrast,
        )
    }

    fn from_intensity(grid: Grid, intensity: impl Iterator<Item = S>, contrast: S) -> Self {
        let target: Vec<S> = intensity
            .enumerate()
            .map(|(idx, value)| {
                if grid.in_circle(grid.point_of(idx)) {
                    clamp((value - S::MIDPOINT) * contrast + S::MIDPOINT)
                } else {
                    S::TWO_FIVE_FIVE
                }
            })
            .collect();
        Self {
            values: target.iter().map(|&value| S::TWO_FIVE_FIVE - value).collect(),
            target,
            grid,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn values(&self) -> &[S] {
        &self.values
    }

    pub fn target(&self) -> &[S] {
        &self.target
    }

    pub fn get(&self, point: Point<usize>) -> Option<S> {
        self.grid.index_of(point).map(|idx| self.values[idx])
    }

    /// Normalized error score of `line` against the current demand.
    pub fn score(&self, line: &Line) -> S {
        score_line(line.indexes(), &self.target, |idx| self.values[idx])
    }

    /// Removes `weight` of demand along `line`. The only way the field changes.
    pub fn commit(&mut self, line: &Line, weight: S) {
        for &idx in line.indexes() {
            let value = &mut self.values[idx];
            *value = clamp(*value - weight);
        }
    }
}

#[inline]
pub(crate) fn clamp<S: Float>(value: S) -> S {
    value.max(S::ZERO).min(S::TWO_FIVE_FIVE)
}

/// Sum of the positive residual along `indexes` plus the run bonus, divided by the pixel count.
///
/// Consecutive pixels that are dark in `target` and still in high demand form a streak, every
/// streak longer than one pixel adds its squared length once it breaks.
pub fn score_line<S: Float>(indexes: &[usize], target: &[S], residual: impl Fn(usize) -> S) -> S {
    if indexes.is_empty() {
        return -S::INFINITY;
    }
    let mut sum = S::ZERO;
    let mut streak = 0usize;
    let mut bonus = 0usize;
    for &idx in indexes {
        let value = residual(idx);
        sum += value.max(S::ZERO);
        if target[idx] < S::DARK_THRESHOLD && value > S::DEMAND_THRESHOLD {
            streak += 1;
        } else {
            if streak > 1 {
                bonus += streak * streak;
            }
            streak = 0;
        }
    }
    if streak > 1 {
        bonus += streak * streak;
    }
    let bonus: S = num_traits::cast(bonus).unwrap_or(S::INFINITY);
    let count: S = num_traits::cast(indexes.len()).unwrap_or(S::ONE);
    (sum + bonus) / count
}
