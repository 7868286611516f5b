use crate::{color::Rgb, geometry::Point, Float, Grid};
use image::{DynamicImage, RgbImage, RgbaImage};
use num_traits::AsPrimitive;
use std::ops::Deref;

#[derive(Clone, Debug)]
pub struct PixelData<T> {
    pixels: Vec<T>,
    grid: Grid,
}

impl<T> PixelData<T> {
    pub fn new(mut builder: impl FnMut(Point<usize>) -> T, grid: Grid) -> Self {
        let mut pixels = Vec::with_capacity(grid.len());
        for y in 0..grid.height {
            for x in 0..grid.width {
                pixels.push(builder(Point { x, y }));
            }
        }
        Self { pixels, grid }
    }

    pub fn pixels(&self) -> &[T] {
        &self.pixels
    }

    pub fn get(&self, point: Point<usize>) -> Option<&T> {
        self.grid
            .index_of(point)
            .and_then(|index| self.pixels.get(index))
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }
}

impl<T> Deref for PixelData<T> {
    type Target = Grid;

    fn deref(&self) -> &Self::Target {
        &self.grid
    }
}

/// Decoded source image. Channels keep the 0..=255 range.
pub type Image<T> = PixelData<Rgb<T>>;

impl<T: Float> Image<T>
where
    u8: AsPrimitive<T>,
{
    /// Builds an image from an interleaved RGB (`channels == 3`) or RGBA (`channels == 4`)
    /// buffer of a square of side `side`. Alpha is ignored.
    pub fn from_raw(side: usize, channels: usize, data: &[u8]) -> Result<Self, Error> {
        if side == 0 {
            return Err(Error::Empty);
        }
        if channels != 3 && channels != 4 {
            return Err(Error::Channels(channels));
        }
        let expected = side.checked_mul(side).and_then(|area| area.checked_mul(channels));
        if expected != Some(data.len()) {
            return Err(Error::BufferSize {
                side,
                channels,
                found: data.len(),
            });
        }
        Ok(Self {
            pixels: data
                .chunks_exact(channels)
                .map(|pixel| Rgb(pixel[0].as_(), pixel[1].as_(), pixel[2].as_()))
                .collect(),
            grid: Grid::square(side),
        })
    }

    /// Fails unless the image is a non empty square, the only canvas the engine accepts.
    pub fn check_square(&self) -> Result<usize, Error> {
        if self.grid.is_empty() {
            Err(Error::Empty)
        } else if !self.grid.is_square() {
            Err(Error::NotSquare {
                width: self.grid.width,
                height: self.grid.height,
            })
        } else {
            Ok(self.grid.width)
        }
    }
}

impl<T: Float> From<&RgbImage> for Image<T>
where
    u8: AsPrimitive<T>,
{
    fn from(value: &RgbImage) -> Self {
        Self {
            pixels: value
                .pixels()
                .map(|pixel| Rgb(pixel.0[0].as_(), pixel.0[1].as_(), pixel.0[2].as_()))
                .collect(),
            grid: Grid {
                height: value.height() as usize,
                width: value.width() as usize,
            },
        }
    }
}

impl<T: Float> From<&RgbaImage> for Image<T>
where
    u8: AsPrimitive<T>,
{
    fn from(value: &RgbaImage) -> Self {
        Self {
            pixels: value
                .pixels()
                .map(|pixel| Rgb(pixel.0[0].as_(), pixel.0[1].as_(), pixel.0[2].as_()))
                .collect(),
            grid: Grid {
                height: value.height() as usize,
                width: value.width() as usize,
            },
        }
    }
}

impl<T: Float> From<&DynamicImage> for Image<T>
where
    u8: AsPrimitive<T>,
{
    fn from(value: &DynamicImage) -> Self {
        Self::from(&value.to_rgb8())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("The image has no pixels")]
    Empty,
    #[error("The image must be square, found {width}x{height}")]
    NotSquare { width: usize, height: usize },
    #[error("Expected 3 (RGB) or 4 (RGBA) channels, found {0}")]
    Channels(usize),
    #[error("Pixel buffer holds {found} bytes, which is not a {side}x{side} image of {channels} channels")]
    BufferSize {
        side: usize,
        channels: usize,
        found: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_rgba_drops_alpha() {
        let data = [10, 20, 30, 255, 40, 50, 60, 0, 1, 2, 3, 4, 5, 6, 7, 8];
        let image = Image::<f32>::from_raw(2, 4, &data).unwrap();
        assert_eq!(image.pixels()[1], Rgb(40.0, 50.0, 60.0));
        assert_eq!(image.check_square().unwrap(), 2);
    }

    #[test]
    fn raw_buffer_size_is_checked() {
        assert!(matches!(
            Image::<f32>::from_raw(2, 3, &[0; 11]),
            Err(Error::BufferSize { side: 2, found: 11, .. })
        ));
        assert!(matches!(
            Image::<f32>::from_raw(usize::MAX / 2, 4, &[0; 16]),
            Err(Error::BufferSize { found: 16, .. })
        ));
        assert!(matches!(Image::<f32>::from_raw(0, 3, &[]), Err(Error::Empty)));
    }

    #[test]
    fn rectangular_images_are_rejected() {
        let image = Image::<f64>::from(&RgbImage::new(4, 3));
        assert!(matches!(image.check_square(), Err(Error::NotSquare { .. })));
    }
}
