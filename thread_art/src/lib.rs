pub mod geometry {
    pub mod point;

    pub use point::Point;
}

mod algorithm;
pub mod cancel;
pub mod color;
pub mod config;
mod float;
pub mod greedy;
pub mod grid;
pub mod image;
pub mod line_cache;
pub mod multi_color;
pub mod pin_distancer;
pub mod pins;
pub mod population;
pub mod recent_pins;
pub mod residual;
pub mod verboser;

pub use algorithm::*;
pub use cancel::Cancel;
pub use config::{Config, Strategy};
pub use float::Float;
pub use grid::Grid;
pub use image::Image;
pub use line_cache::LineCache;
pub use pins::PinLayout;
pub use residual::ResidualField;
