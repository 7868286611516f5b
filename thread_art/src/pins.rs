use num_traits::{AsPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::{
    geometry::Point,
    verboser::{Message, Verboser},
    Float,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pin {
    pub index: usize,
    pub position: Point<usize>,
}

/// Pins evenly spaced on the circle inscribed in a square canvas.
#[derive(Clone, Debug)]
pub struct PinLayout {
    pins: Vec<Pin>,
    side: usize,
}

impl PinLayout {
    /// Places `pin_count` pins at angle `2π·i/n`, radius `side/2 - 0.5`, centred on the canvas.
    /// Coordinates are floored onto the pixel grid.
    pub fn circle<S: Float>(
        side: usize,
        pin_count: usize,
        verboser: &mut impl Verboser,
    ) -> Result<Self, Error>
    where
        usize: AsPrimitive<S>,
    {
        if side == 0 {
            return Err(Error::EmptyCanvas);
        }
        if pin_count == 0 {
            return Err(Error::NoPins);
        }
        let center: S = side.as_() * S::HALF;
        let radius = center - S::HALF;
        let pins = (0..pin_count)
            .map(|index| {
                verboser.verbose(Message::PlacingPin(index));
                let theta = S::TWO * S::PI * index.as_() / pin_count.as_();
                let position = Point {
                    x: center + radius * theta.cos(),
                    y: center + radius * theta.sin(),
                }
                .floor();
                Pin {
                    index,
                    position: Point {
                        x: position.x.to_usize().unwrap_or(0),
                        y: position.y.to_usize().unwrap_or(0),
                    },
                }
            })
            .collect();
        Ok(Self { pins, side })
    }

    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn position(&self, pin: usize) -> Option<Point<usize>> {
        self.pins.get(pin).map(|pin| pin.position)
    }

    /// Euclidean distance between two pins, used to join polylines.
    pub fn distance(&self, a: usize, b: usize) -> f64 {
        match (self.position(a), self.position(b)) {
            (Some(a), Some(b)) => a.as_::<f64>().distance(&b.as_()),
            _ => f64::INFINITY,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("The canvas side must be greater than zero")]
    EmptyCanvas,
    #[error("At least one pin is required")]
    NoPins,
}
