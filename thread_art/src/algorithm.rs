use crate::{
    cancel::Cancel,
    color::{AsRgb, Named, Rgb},
    config::{self, Config, Strategy},
    geometry::Point,
    greedy::Greedy,
    image::{self, Image},
    line_cache::{self, rasterize, LineCache},
    multi_color::{color_fields, ColorPaths, Router},
    pins::{self, PinLayout},
    population::Population,
    residual::ResidualField,
    verboser::Verboser,
    Float, Grid,
};
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};

/// One committed chord, optionally tagged with the index of its target color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    pub pin_from: usize,
    pub pin_to: usize,
    pub color: Option<usize>,
}

impl Segment {
    pub fn new(pin_from: usize, pin_to: usize, color: Option<usize>) -> Self {
        Self {
            pin_from,
            pin_to,
            color,
        }
    }

    /// Consecutive pairs of a pin walk.
    pub fn from_sequence(sequence: &[usize], color: Option<usize>) -> Vec<Self> {
        sequence
            .windows(2)
            .map(|pair| Self::new(pair[0], pair[1], color))
            .collect()
    }
}

/// Why a search strategy stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// The best candidate scored below the end threshold.
    BelowThreshold,
    LineBudget,
    /// No eligible candidate was left.
    Exhausted,
    /// Too many generations without a better individual.
    Stagnated,
    GenerationBudget,
    Cancelled,
}

/// Builds the pin layout and the line cache for `image`, then runs the strategy `config` asks for.
///
/// Several target colors always go through the [`Router`]. A single one runs the greedy walk or
/// the population search.
pub fn compute<S: Float>(
    image: &Image<S>,
    config: &Config<S>,
    verboser: &mut impl Verboser,
    cancel: &Cancel,
) -> Result<Computation<S>, Error>
where
    usize: AsPrimitive<S>,
    u8: AsPrimitive<S>,
{
    config.validate()?;
    let side = image.check_square()?;
    let layout = PinLayout::circle::<S>(side, config.pin_count, verboser)?;
    let cache = LineCache::bake(&layout, config.min_distance, verboser)?;
    compute_baked(image, &layout, &cache, config, verboser, cancel)
}

/// Like [`compute`] with a layout and cache baked beforehand, so several runs can share them.
pub fn compute_baked<S: Float>(
    image: &Image<S>,
    layout: &PinLayout,
    cache: &LineCache,
    config: &Config<S>,
    verboser: &mut impl Verboser,
    cancel: &Cancel,
) -> Result<Computation<S>, Error>
where
    u8: AsPrimitive<S>,
{
    config.validate()?;
    let side = image.check_square()?;
    if side != layout.side() || cache.grid() != Grid::square(side) {
        return Err(Error::SideMismatch {
            image: side,
            cache: cache.grid().width,
        });
    }
    if layout.len() != config.pin_count
        || cache.pin_count() != config.pin_count
        || cache.distancer().min() != config.min_distance.max(1)
    {
        return Err(Error::CacheMismatch);
    }

    let colors = config.target_colors.clone();
    if colors.len() > 1 {
        log::debug!("routing {} colors over {} lines", colors.len(), cache.lines().len());
        let fields = color_fields(image, &colors, config.contrast);
        let result = Router::new(cache, fields, config)?.run(
            layout,
            config.progress_interval,
            verboser,
            cancel,
        );
        return Ok(Computation {
            layout: layout.clone(),
            colors,
            segments: result.segments,
            sequence: None,
            paths: result.paths,
            residuals: result.fields,
            fitness: None,
            termination: result.termination,
        });
    }

    let field = single_field(image, &colors[0], config.contrast);
    let (sequence, residual, fitness, termination) = match config.strategy {
        Strategy::Greedy => {
            log::debug!("greedy walk over {} pins", layout.len());
            let result =
                Greedy::new(cache, field, config)?.run(config.progress_interval, verboser, cancel);
            (result.sequence, result.residual, None, result.termination)
        }
        Strategy::Genetic => {
            log::debug!("evolving {} individuals", config.population_size);
            let result = Population::new(cache, &field, config)?.run(verboser, cancel);
            let mut residual = field.clone();
            for pair in result.best.genes().windows(2) {
                residual.commit(cache.expect(pair[0], pair[1]).line(), config.line_weight);
            }
            let fitness = result.best.fitness();
            (
                result.best.genes().to_vec(),
                residual,
                Some(fitness),
                result.termination,
            )
        }
    };
    let polylines = if sequence.len() > 1 {
        vec![sequence.clone()]
    } else {
        Vec::new()
    };
    Ok(Computation {
        layout: layout.clone(),
        colors,
        segments: Segment::from_sequence(&sequence, None),
        sequence: Some(sequence),
        paths: vec![ColorPaths {
            color: 0,
            polylines,
        }],
        residuals: vec![residual],
        fitness,
        termination,
    })
}

fn single_field<S: Float>(image: &Image<S>, color: &Named, contrast: S) -> ResidualField<S>
where
    u8: AsPrimitive<S>,
{
    if color.value == Rgb(0, 0, 0) {
        ResidualField::grayscale(image, contrast)
    } else {
        ResidualField::color(image, &color.value.as_rgb(), contrast)
    }
}

/// Result of a finished (or cancelled) run, with everything needed to render it.
pub struct Computation<S> {
    layout: PinLayout,
    colors: Vec<Named>,
    segments: Vec<Segment>,
    sequence: Option<Vec<usize>>,
    paths: Vec<ColorPaths>,
    residuals: Vec<ResidualField<S>>,
    fitness: Option<S>,
    termination: Termination,
}

impl<S: Float> Computation<S> {
    pub fn layout(&self) -> &PinLayout {
        &self.layout
    }

    pub fn colors(&self) -> &[Named] {
        &self.colors
    }

    /// Segments in commit order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Pin walk of the single color strategies.
    pub fn sequence(&self) -> Option<&[usize]> {
        self.sequence.as_deref()
    }

    /// Drawable polylines, one entry per color.
    pub fn paths(&self) -> &[ColorPaths] {
        &self.paths
    }

    /// Residual demand left after the run, one field per color.
    pub fn residuals(&self) -> &[ResidualField<S>] {
        &self.residuals
    }

    /// Fitness of the best individual, population search only.
    pub fn fitness(&self) -> Option<S> {
        self.fitness
    }

    pub fn termination(&self) -> Termination {
        self.termination
    }

    /// Segments in drawing order: color by color, polyline by polyline.
    pub fn ordered_segments(&self) -> impl Iterator<Item = Segment> + '_ {
        self.paths.iter().flat_map(|path| path.segments())
    }

    fn color_of(&self, segment: &Segment) -> Rgb {
        self.colors
            .get(segment.color.unwrap_or(0))
            .map(|color| color.value)
            .unwrap_or(Rgb(0, 0, 0))
    }

    fn color_name(&self, color: usize) -> &str {
        self.colors
            .get(color)
            .map(|color| color.name.as_str())
            .unwrap_or("?")
    }

    pub fn build_svg(&self, line_thickness: f32) -> svg::Document {
        let side = self.layout.side();
        let mut doc = svg::Document::new()
            .set("viewBox", (0, 0, side, side))
            .add(
                svg::node::element::Rectangle::new()
                    .set("width", side)
                    .set("height", side)
                    .set("fill", "white"),
            );
        for pin in self.layout.pins() {
            doc = doc.add(
                svg::node::element::Circle::new()
                    .set("cx", format!("{:.1}", pin.position.x as f32 + 0.5))
                    .set("cy", format!("{:.1}", pin.position.y as f32 + 0.5))
                    .set("r", format!("{:.4}", line_thickness))
                    .set("fill", "gray"),
            );
        }

        for segment in self.ordered_segments() {
            let (Some(start), Some(end)) = (
                self.layout.position(segment.pin_from),
                self.layout.position(segment.pin_to),
            ) else {
                continue;
            };
            let color = self.color_of(&segment);
            doc = doc.add(
                svg::node::element::Line::new()
                    .set("x1", format!("{:.1}", start.x as f32 + 0.5))
                    .set("y1", format!("{:.1}", start.y as f32 + 0.5))
                    .set("x2", format!("{:.1}", end.x as f32 + 0.5))
                    .set("y2", format!("{:.1}", end.y as f32 + 0.5))
                    .set("stroke", format!("rgb({}, {}, {})", color.0, color.1, color.2))
                    .set("stroke-width", format!("{:.4}", line_thickness))
                    .set("opacity", 1),
            );
        }
        doc
    }

    /// Raster preview, every pin cell blown up to `scale`×`scale` pixels.
    pub fn build_rgb(&self, scale: usize) -> Result<::image::RgbImage, Error> {
        let scale = scale.max(1);
        let too_big = || Error::PreviewSize {
            side: self.layout.side(),
            scale,
        };
        let side = self.layout.side().checked_mul(scale).ok_or_else(too_big)?;
        let dim = u32::try_from(side).map_err(|_| too_big())?;
        let mut canvas = ::image::RgbImage::from_pixel(dim, dim, ::image::Rgb([255, 255, 255]));
        let offset = scale / 2;
        let scaled = |pin| {
            self.layout.position(pin).map(|point| {
                (point * scale + Point::new(offset, offset)).as_::<isize>()
            })
        };

        for segment in self.ordered_segments() {
            let (Some(start), Some(end)) = (scaled(segment.pin_from), scaled(segment.pin_to)) else {
                continue;
            };
            let color = self.color_of(&segment);
            for point in rasterize(start, end) {
                if point.x >= 0 && point.y >= 0 && (point.x as u32) < dim && (point.y as u32) < dim {
                    canvas.put_pixel(
                        point.x as u32,
                        point.y as u32,
                        ::image::Rgb([color.0, color.1, color.2]),
                    );
                }
            }
        }
        Ok(canvas)
    }

    /// One `<color> <from> -> <to>` line per step, a blank line wherever the thread is lifted.
    pub fn build_instructions(&self) -> String {
        let mut instructions = String::new();
        for path in &self.paths {
            let name = self.color_name(path.color);
            for polyline in &path.polylines {
                instructions.extend(
                    polyline
                        .windows(2)
                        .map(|pair| format!("{} {} -> {}\n", name, pair[0], pair[1])),
                );
                instructions.push('\n');
            }
        }
        instructions
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Image(#[from] image::Error),
    #[error(transparent)]
    Pins(#[from] pins::Error),
    #[error(transparent)]
    LineCache(#[from] line_cache::Error),
    #[error(transparent)]
    Config(#[from] config::Error),
    #[error("The residual field and the line cache cover different canvases")]
    GridMismatch,
    #[error("The image side {image} does not match the {cache} pixels the lines were baked for")]
    SideMismatch { image: usize, cache: usize },
    #[error("The baked lines were built for another pin count or minimum distance")]
    CacheMismatch,
    #[error("A {side} pixel canvas scaled by {scale} does not fit in a preview image")]
    PreviewSize { side: usize, scale: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verboser::Silent;
    use ::image::RgbImage;

    fn disc(side: u32) -> Image<f32> {
        let center = side as f32 / 2.0;
        Image::from(&RgbImage::from_fn(side, side, |x, y| {
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            if (dx * dx + dy * dy).sqrt() < center / 2.0 {
                ::image::Rgb([10, 10, 10])
            } else {
                ::image::Rgb([245, 245, 245])
            }
        }))
    }

    fn small_config() -> Config<f32> {
        Config {
            pin_count: 24,
            min_distance: 3,
            max_lines: Some(30),
            recent_pin_window: 4,
            ..Default::default()
        }
    }

    #[test]
    fn greedy_run_fills_every_output() {
        let computation = compute(&disc(48), &small_config(), &mut Silent, &Cancel::new()).unwrap();
        let sequence = computation.sequence().unwrap();
        assert_eq!(sequence[0], 0);
        assert_eq!(computation.segments().len(), sequence.len() - 1);
        assert!(computation.segments().len() <= 30);
        assert_eq!(computation.paths().len(), 1);
        assert_eq!(computation.paths()[0].segment_count(), computation.segments().len());
        assert_eq!(computation.residuals().len(), 1);
        assert!(computation.fitness().is_none());

        let instructions = computation.build_instructions();
        let steps = instructions.lines().filter(|line| !line.is_empty()).count();
        assert_eq!(steps, computation.segments().len());
        assert!(instructions.starts_with("Black 0 -> "));

        let svg = computation.build_svg(0.5).to_string();
        assert_eq!(svg.matches("<line").count(), computation.segments().len());
        assert_eq!(svg.matches("<circle").count(), 24);

        let preview = computation.build_rgb(3).unwrap();
        assert_eq!(preview.dimensions(), (144, 144));
        assert!(preview.pixels().any(|pixel| pixel.0 == [0, 0, 0]));
    }

    #[test]
    fn genetic_run_reports_fitness() {
        let config = Config {
            strategy: Strategy::Genetic,
            population_size: 6,
            genotype_length: 12,
            max_generations: Some(3),
            seed: Some(11),
            ..small_config()
        };
        let computation = compute(&disc(40), &config, &mut Silent, &Cancel::new()).unwrap();
        assert_eq!(computation.sequence().unwrap().len(), 12);
        assert_eq!(computation.segments().len(), 11);
        assert!(computation.fitness().is_some());
        assert!(matches!(
            computation.termination(),
            Termination::GenerationBudget | Termination::Stagnated
        ));
    }

    #[test]
    fn several_colors_route() {
        let config = Config {
            target_colors: vec![Named::black(), Named::new("Red", Rgb(255, 0, 0))],
            ..small_config()
        };
        let computation = compute(&disc(40), &config, &mut Silent, &Cancel::new()).unwrap();
        assert!(computation.sequence().is_none());
        assert_eq!(computation.termination(), Termination::LineBudget);
        assert_eq!(computation.segments().len(), 30);
        assert_eq!(computation.paths().len(), 2);
        let routed: usize = computation.paths().iter().map(ColorPaths::segment_count).sum();
        assert_eq!(routed, 30);
        assert_eq!(computation.ordered_segments().count(), 30);
    }

    #[test]
    fn rejects_bad_input_before_computing() {
        let wide = Image::<f32>::from(&RgbImage::new(40, 30));
        assert!(matches!(
            compute(&wide, &small_config(), &mut Silent, &Cancel::new()),
            Err(Error::Image(image::Error::NotSquare { .. }))
        ));

        let config = Config {
            target_colors: Vec::new(),
            ..small_config()
        };
        assert!(matches!(
            compute(&disc(40), &config, &mut Silent, &Cancel::new()),
            Err(Error::Config(config::Error::EmptyPalette))
        ));
    }

    #[test]
    fn baked_cache_must_match_the_image() {
        let config = small_config();
        let layout = PinLayout::circle::<f32>(40, 24, &mut Silent).unwrap();
        let cache = LineCache::bake(&layout, 3, &mut Silent).unwrap();
        assert!(matches!(
            compute_baked(&disc(48), &layout, &cache, &config, &mut Silent, &Cancel::new()),
            Err(Error::SideMismatch { image: 48, cache: 40 })
        ));
        let other = Config {
            min_distance: 4,
            ..small_config()
        };
        assert!(matches!(
            compute_baked(&disc(40), &layout, &cache, &other, &mut Silent, &Cancel::new()),
            Err(Error::CacheMismatch)
        ));
        compute_baked(&disc(40), &layout, &cache, &config, &mut Silent, &Cancel::new()).unwrap();
    }

    #[test]
    fn cancelled_runs_keep_their_prefix() {
        let cancel = Cancel::new();
        cancel.cancel();
        let computation = compute(&disc(40), &small_config(), &mut Silent, &cancel).unwrap();
        assert_eq!(computation.termination(), Termination::Cancelled);
        assert_eq!(computation.sequence(), Some(&[0][..]));
        assert!(computation.build_instructions().is_empty());
    }
}
