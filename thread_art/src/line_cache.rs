use std::{iter::FusedIterator, slice};

use bresenham::Bresenham;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::{
    geometry::Point,
    grid::Grid,
    pin_distancer::{self, PinDistancer},
    pins::PinLayout,
    verboser::{Message, Verboser},
};

/// Integer line rasterization between two pixels, both endpoints included.
pub fn rasterize(start: Point<isize>, end: Point<isize>) -> Vec<Point<isize>> {
    let mut points: Vec<_> = Bresenham::new((start.x, start.y), (end.x, end.y))
        .map(|(x, y)| Point { x, y })
        .collect();
    points.push(end);
    points
}

/// One rasterized chord, stored from the lower pin to the higher one.
#[derive(Clone, Debug)]
pub struct Line {
    small: usize,
    big: usize,
    points: Vec<Point<usize>>,
    indexes: Vec<usize>,
}

impl Line {
    fn bake(grid: &Grid, layout: &PinLayout, small: usize, big: usize) -> Self {
        let start = layout.pins()[small].position.as_::<isize>();
        let end = layout.pins()[big].position.as_::<isize>();
        let (points, indexes) = rasterize(start, end)
            .into_iter()
            .filter_map(|point| {
                grid.index_of_signed(point)
                    .map(|index| (Point::new(point.x as usize, point.y as usize), index))
            })
            .unzip();
        Self {
            small,
            big,
            points,
            indexes,
        }
    }

    pub fn pins(&self) -> (usize, usize) {
        (self.small, self.big)
    }

    pub fn points(&self) -> &[Point<usize>] {
        &self.points
    }

    /// Flat pixel indexes of the line, in the same order as [`Line::points`].
    pub fn indexes(&self) -> &[usize] {
        &self.indexes
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

/// A cached line seen from one of its ends.
#[derive(Clone, Copy, Debug)]
pub struct LineRef<'a> {
    line: &'a Line,
    reversed: bool,
}

impl<'a> LineRef<'a> {
    pub fn line(&self) -> &'a Line {
        self.line
    }

    pub fn from(&self) -> usize {
        if self.reversed {
            self.line.big
        } else {
            self.line.small
        }
    }

    pub fn points(&self) -> Points<'a> {
        Points {
            inner: self.line.points.iter(),
            reversed: self.reversed,
        }
    }

    pub fn indexes(&self) -> &'a [usize] {
        &self.line.indexes
    }
}

pub struct Points<'a> {
    inner: slice::Iter<'a, Point<usize>>,
    reversed: bool,
}

impl Iterator for Points<'_> {
    type Item = Point<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.reversed {
            self.inner.next_back().copied()
        } else {
            self.inner.next().copied()
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Points<'_> {}

impl FusedIterator for Points<'_> {}

/// Every joinable pin pair rasterized once and addressable from either end.
///
/// Read only once baked, shared by every search strategy of a run.
#[derive(Clone, Debug)]
pub struct LineCache {
    distancer: PinDistancer,
    grid: Grid,
    lines: Vec<Line>,
    slots: Vec<Option<usize>>,
}

impl LineCache {
    pub fn bake(
        layout: &PinLayout,
        min_distance: usize,
        verboser: &mut impl Verboser,
    ) -> Result<Self, Error> {
        let distancer = PinDistancer::new(layout.len(), min_distance)?;
        let grid = Grid::square(layout.side());
        let count = layout.len();
        verboser.verbose(Message::Baking(0, count));
        let lines: Vec<Line> = (0..count)
            .into_par_iter()
            .flat_map_iter(|big| {
                (0..big)
                    .filter(move |&small| distancer.is_valid(big, small))
                    .map(move |small| Line::bake(&grid, layout, small, big))
            })
            .collect();
        let mut slots = vec![None; distancer.slot_count()];
        for (idx, line) in lines.iter().enumerate() {
            slots[distancer.slot(line.small, line.big)] = Some(idx);
        }
        verboser.verbose(Message::Baking(count, count));
        log::debug!(
            "baked {} lines for {} pins, minimum distance {}",
            lines.len(),
            count,
            distancer.min()
        );
        Ok(Self {
            distancer,
            grid,
            lines,
            slots,
        })
    }

    pub fn distancer(&self) -> &PinDistancer {
        &self.distancer
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn pin_count(&self) -> usize {
        self.distancer.count()
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Dense index of the line joining `a` and `b`, `None` when the pair is not joinable.
    pub fn line_index(&self, a: usize, b: usize) -> Option<usize> {
        if a >= self.pin_count() || b >= self.pin_count() || !self.distancer.is_valid(a, b) {
            return None;
        }
        self.slots[self.distancer.slot(a, b)]
    }

    pub fn get(&self, from: usize, to: usize) -> Option<LineRef<'_>> {
        self.line_index(from, to).map(|idx| LineRef {
            line: &self.lines[idx],
            reversed: from > to,
        })
    }

    /// Like [`LineCache::get`] for pairs already known to be joinable.
    ///
    /// # Panics
    ///
    /// When the pair was never cached. Search strategies validate adjacency before asking, so
    /// a miss here means a broken genotype, not bad input.
    pub fn expect(&self, from: usize, to: usize) -> LineRef<'_> {
        match self.get(from, to) {
            Some(line) => line,
            None => panic!("no cached line between pins {from} and {to}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Distancer(#[from] pin_distancer::Error),
}
