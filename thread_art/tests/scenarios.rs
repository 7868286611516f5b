use image::RgbImage;
use rand::{rngs::SmallRng, SeedableRng};
use thread_art::{
    color::{Named, Rgb},
    compute,
    geometry::Point,
    multi_color::color_fields,
    population::Model,
    verboser::Silent,
    Cancel, Config, Image, LineCache, PinLayout, ResidualField, Termination,
};

fn solid(side: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(side, side, image::Rgb([value, value, value]))
}

#[test]
fn mid_gray_with_a_high_threshold_commits_nothing() {
    let image = Image::<f64>::from(&solid(100, 128));
    let config = Config {
        pin_count: 8,
        min_distance: 2,
        end_threshold: 1_000_000.0,
        ..Default::default()
    };
    let computation = compute(&image, &config, &mut Silent, &Cancel::new()).unwrap();
    assert_eq!(computation.sequence(), Some(&[0][..]));
    assert!(computation.segments().is_empty());
    assert_eq!(computation.termination(), Termination::BelowThreshold);
}

#[test]
fn a_single_dark_pixel_gets_a_line_through_it() {
    let mut pixels = solid(100, 255);
    pixels.put_pixel(50, 50, image::Rgb([0, 0, 0]));
    let image = Image::<f64>::from(&pixels);
    let config = Config {
        pin_count: 64,
        min_distance: 2,
        line_weight: 1.0,
        end_threshold: 0.0,
        max_lines: Some(5),
        ..Default::default()
    };
    let computation = compute(&image, &config, &mut Silent, &Cancel::new()).unwrap();
    let layout = computation.layout();
    let cache = LineCache::bake(layout, config.min_distance, &mut Silent).unwrap();
    let center = Point::new(50, 50);
    assert!(computation.segments().iter().any(|segment| {
        cache
            .expect(segment.pin_from, segment.pin_to)
            .points()
            .any(|point| point == center)
    }));
}

#[test]
fn far_apart_colors_stay_in_their_own_region() {
    let side = 60;
    let pixels = RgbImage::from_fn(side, side, |x, _| {
        if x < side / 2 {
            image::Rgb([255, 0, 0])
        } else {
            image::Rgb([0, 0, 255])
        }
    });
    let image = Image::<f64>::from(&pixels);
    let colors = vec![
        Named::new("Red", Rgb(255, 0, 0)),
        Named::new("Blue", Rgb(0, 0, 255)),
    ];
    let config = Config {
        pin_count: 36,
        min_distance: 4,
        max_lines: Some(40),
        target_colors: colors.clone(),
        ..Default::default()
    };
    let computation = compute(&image, &config, &mut Silent, &Cancel::new()).unwrap();
    let cache = LineCache::bake(computation.layout(), config.min_distance, &mut Silent).unwrap();
    let fields: Vec<ResidualField<f64>> = color_fields(&image, &colors, config.contrast);

    let average = |color: usize, field: &ResidualField<f64>| {
        let scores: Vec<f64> = computation
            .segments()
            .iter()
            .filter(|segment| segment.color == Some(color))
            .map(|segment| field.score(cache.expect(segment.pin_from, segment.pin_to).line()))
            .collect();
        assert!(!scores.is_empty(), "color {color} drew nothing");
        scores.iter().sum::<f64>() / scores.len() as f64
    };
    assert!(average(0, &fields[0]) > average(0, &fields[1]));
    assert!(average(1, &fields[1]) > average(1, &fields[0]));
}

#[test]
fn crossing_identical_parents_is_idempotent() {
    let layout = PinLayout::circle::<f32>(50, 40, &mut Silent).unwrap();
    let cache = LineCache::bake(&layout, 5, &mut Silent).unwrap();
    let image = Image::<f32>::from(&RgbImage::from_fn(50, 50, |x, y| {
        image::Rgb([(x * 5) as u8, (y * 5) as u8, 128])
    }));
    let field = ResidualField::grayscale(&image, 1.2);
    let model = Model::new(&cache, &field, 15.0, 60);
    let mut rng = SmallRng::seed_from_u64(3);
    for _ in 0..5 {
        let parent = model.random_genes(&mut rng);
        assert_eq!(model.crossover(&parent, &parent, &mut rng), parent);
    }
}

#[test]
fn greedy_runs_are_deterministic_and_bounded() {
    let pixels = RgbImage::from_fn(80, 80, |x, y| {
        let v = ((x as i32 - 40).abs() * 6 + (y as i32 % 9) * 4).min(255) as u8;
        image::Rgb([v, v, v])
    });
    let image = Image::<f32>::from(&pixels);
    let config = Config {
        pin_count: 48,
        min_distance: 6,
        max_lines: Some(60),
        ..Default::default()
    };
    let first = compute(&image, &config, &mut Silent, &Cancel::new()).unwrap();
    let second = compute(&image, &config, &mut Silent, &Cancel::new()).unwrap();
    assert_eq!(first.sequence(), second.sequence());
    assert!(first.segments().len() <= 60);
    for residual in first.residuals() {
        assert!(residual.values().iter().all(|&value| (0.0..=255.0).contains(&value)));
    }
}
