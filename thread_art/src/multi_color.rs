use std::collections::HashMap;

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};

use crate::{
    algorithm::{Error, Segment, Termination},
    cancel::Cancel,
    color::{AsRgb, Named},
    config::Config,
    greedy::Step,
    image::Image,
    line_cache::LineCache,
    pins::PinLayout,
    residual::ResidualField,
    verboser::{Message, Verboser},
    Float,
};
use num_traits::AsPrimitive;

/// One residual field per target color, all on the canvas of `image`.
pub fn color_fields<S: Float>(
    image: &Image<S>,
    colors: &[Named],
    contrast: S,
) -> Vec<ResidualField<S>>
where
    u8: AsPrimitive<S>,
{
    colors
        .iter()
        .map(|color| ResidualField::color(image, &color.value.as_rgb(), contrast))
        .collect()
}

#[derive(Clone, Copy, Debug)]
struct Choice<S> {
    line: usize,
    color: usize,
    score: S,
}

impl<S: Float> Choice<S> {
    /// Higher score wins, ties go to the lower line then the lower color.
    fn best(self, other: Self) -> Self {
        let earlier = (other.line, other.color) < (self.line, self.color);
        if other.score > self.score || (other.score == self.score && earlier) {
            other
        } else {
            self
        }
    }
}

/// Picks the best undrawn (line, color) pair anywhere on the canvas, never reusing a line.
pub struct Router<'a, S> {
    cache: &'a LineCache,
    fields: Vec<ResidualField<S>>,
    drawn: Vec<bool>,
    segments: Vec<Segment>,
    termination: Option<Termination>,
    line_weight: S,
    end_threshold: S,
    max_lines: Option<usize>,
}

impl<'a, S: Float> Router<'a, S> {
    pub fn new(
        cache: &'a LineCache,
        fields: Vec<ResidualField<S>>,
        config: &Config<S>,
    ) -> Result<Self, Error> {
        if fields.is_empty() {
            return Err(Error::Config(crate::config::Error::EmptyPalette));
        }
        if fields.iter().any(|field| *field.grid() != cache.grid()) {
            return Err(Error::GridMismatch);
        }
        Ok(Self {
            cache,
            fields,
            drawn: vec![false; cache.lines().len()],
            segments: Vec::new(),
            termination: None,
            line_weight: config.line_weight,
            end_threshold: config.end_threshold,
            max_lines: config.max_lines,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn cancel(&mut self) {
        if self.termination.is_none() {
            self.termination = Some(Termination::Cancelled);
        }
    }

    fn evaluate(&self) -> Option<Choice<S>> {
        let colors = self.fields.len();
        (0..self.cache.lines().len())
            .into_par_iter()
            .filter(|&line| !self.drawn[line])
            .flat_map_iter(|line| {
                let cached = &self.cache.lines()[line];
                (0..colors).map(move |color| Choice {
                    line,
                    color,
                    score: self.fields[color].score(cached),
                })
            })
            .reduce_with(Choice::best)
    }

    pub fn step(&mut self) -> Step {
        if let Some(termination) = self.termination {
            return Step::Finished(termination);
        }
        let best = match self.max_lines {
            Some(max) if self.segments.len() >= max => None,
            _ => Some(self.evaluate()),
        };
        let termination = match best {
            None => Termination::LineBudget,
            Some(None) => Termination::Exhausted,
            Some(Some(best)) if best.score < self.end_threshold => Termination::BelowThreshold,
            Some(Some(best)) => {
                let line = &self.cache.lines()[best.line];
                self.fields[best.color].commit(line, self.line_weight);
                self.drawn[best.line] = true;
                let (from, to) = line.pins();
                let segment = Segment::new(from, to, Some(best.color));
                self.segments.push(segment);
                return Step::Committed(segment);
            }
        };
        self.termination = Some(termination);
        Step::Finished(termination)
    }

    pub fn run(
        mut self,
        layout: &PinLayout,
        progress_interval: usize,
        verboser: &mut impl Verboser,
        cancel: &Cancel,
    ) -> RouterResult<S> {
        let termination = loop {
            if cancel.is_cancelled() {
                self.cancel();
            }
            match self.step() {
                Step::Committed(_) => {
                    if self.segments.len() % progress_interval.max(1) == 0 {
                        verboser.verbose(Message::Computing(self.segments.len()));
                    }
                }
                Step::Finished(termination) => break termination,
            }
        };
        log::info!(
            "router finished after {} lines: {:?}",
            self.segments.len(),
            termination
        );
        let paths = order_segments(&self.segments, self.fields.len(), layout, verboser);
        RouterResult {
            segments: self.segments,
            paths,
            fields: self.fields,
            termination,
        }
    }
}

pub struct RouterResult<S> {
    /// Segments in commit order.
    pub segments: Vec<Segment>,
    pub paths: Vec<ColorPaths>,
    pub fields: Vec<ResidualField<S>>,
    pub termination: Termination,
}

/// Continuous pin walks of one color. A new polyline means lifting the thread.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPaths {
    pub color: usize,
    pub polylines: Vec<Vec<usize>>,
}

impl ColorPaths {
    pub fn segment_count(&self) -> usize {
        self.polylines
            .iter()
            .map(|polyline| polyline.len().saturating_sub(1))
            .sum()
    }

    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        self.polylines.iter().flat_map(move |polyline| {
            polyline
                .windows(2)
                .map(move |pair| Segment::new(pair[0], pair[1], Some(self.color)))
        })
    }
}

/// Groups segments by color and stitches every group into as few polylines as it can.
pub fn order_segments(
    segments: &[Segment],
    colors: usize,
    layout: &PinLayout,
    verboser: &mut impl Verboser,
) -> Vec<ColorPaths> {
    (0..colors)
        .map(|color| {
            verboser.verbose(Message::Ordering(color));
            let group: Vec<_> = segments
                .iter()
                .filter(|segment| segment.color.unwrap_or(0) == color)
                .map(|segment| (segment.pin_from, segment.pin_to))
                .collect();
            ColorPaths {
                color,
                polylines: stitch(&group, layout),
            }
        })
        .collect()
}

fn stitch(group: &[(usize, usize)], layout: &PinLayout) -> Vec<Vec<usize>> {
    let mut by_pin: HashMap<usize, Vec<usize>> = HashMap::new();
    for (idx, &(a, b)) in group.iter().enumerate() {
        by_pin.entry(a).or_default().push(idx);
        by_pin.entry(b).or_default().push(idx);
    }
    let other = |idx: usize, pin: usize| {
        let (a, b) = group[idx];
        if a == pin {
            b
        } else {
            a
        }
    };

    let mut used = vec![false; group.len()];
    let mut remaining = group.len();
    let mut polylines = Vec::new();
    let mut start = group.first().map(|&(a, _)| (0, a));
    while let Some((first, pin)) = start {
        let mut polyline = vec![pin];
        let mut next = Some(first);
        let mut end = pin;
        while let Some(idx) = next {
            used[idx] = true;
            remaining -= 1;
            end = other(idx, end);
            polyline.push(end);
            next = by_pin
                .get(&end)
                .and_then(|touching| touching.iter().copied().find(|&idx| !used[idx]));
        }
        polylines.push(polyline);

        start = None;
        if remaining > 0 {
            let mut nearest = f64::INFINITY;
            for (idx, &(a, b)) in group.iter().enumerate() {
                if used[idx] {
                    continue;
                }
                for pin in [a, b] {
                    let distance = layout.distance(end, pin);
                    if distance < nearest {
                        nearest = distance;
                        start = Some((idx, pin));
                    }
                }
            }
        }
    }
    polylines
}
