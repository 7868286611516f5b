use serde::{Deserialize, Serialize};

use crate::geometry::Point;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T = usize> {
    pub height: T,
    pub width: T,
}

impl<T> Grid<T> {
    pub fn new(height: T, width: T) -> Self {
        Self { height, width }
    }
}

impl Grid {
    /// A square grid of side `side`.
    pub fn square(side: usize) -> Self {
        Self::new(side, side)
    }

    pub fn is_square(&self) -> bool {
        self.width == self.height
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index_of(&self, point: Point<usize>) -> Option<usize> {
        if point.x < self.width && point.y < self.height {
            Some(point.y * self.width + point.x)
        } else {
            None
        }
    }

    /// Same as [`Grid::index_of`] for signed coordinates, negative ones fall outside.
    pub fn index_of_signed(&self, point: Point<isize>) -> Option<usize> {
        point.cast::<usize>().and_then(|point| self.index_of(point))
    }

    pub fn point_of(&self, index: usize) -> Point<usize> {
        Point {
            x: index % self.width,
            y: index / self.width,
        }
    }

    /// Whether `point` lies inside the circle inscribed in the grid.
    pub fn in_circle(&self, point: Point<usize>) -> bool {
        let center = self.width as f64 / 2.0;
        let radius_sq = center * center;
        let dx = point.x as f64 - center;
        let dy = point.y as f64 - self.height as f64 / 2.0;
        dx * dx + dy * dy <= radius_sq
    }
}
