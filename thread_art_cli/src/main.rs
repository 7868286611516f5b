use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    process::ExitCode,
    str::FromStr,
};

use clap::{Parser, ValueEnum};
use num_traits::AsPrimitive;
use palette::Srgb;
use serde::de::DeserializeOwned;
use thiserror::Error;
use thread_art::{
    color::{Named, Rgb},
    compute,
    verboser::LogVerboser,
    Cancel, Config, Float, Image, Strategy,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Input file path.
    #[arg()]
    input: PathBuf,

    /// JSON file with a full or partial configuration. Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of pins around the circle.
    #[arg(short = 'n', long)]
    pins: Option<usize>,

    /// Side in pixels of the square the image is cropped and scaled to.
    #[arg(short, long, default_value_t = 500)]
    resolution: u32,

    /// Precision of calculations (Single/Double).
    #[arg(short, long, default_value_t = Precision::Single)]
    precision: Precision,

    #[arg(short, long)]
    strategy: Option<StrategyArg>,

    /// Minimum pin count between linked pins.
    #[arg(long)]
    min_distance: Option<usize>,

    /// Ink removed by every line.
    #[arg(short, long)]
    weight: Option<f32>,

    /// Stop once the best line scores below this value.
    #[arg(short, long)]
    threshold: Option<f32>,

    #[arg(short = 'l', long)]
    max_lines: Option<usize>,

    /// Run without a line budget, the threshold alone stops the walk.
    #[arg(long, conflicts_with = "max_lines")]
    unbounded: bool,

    /// Recently visited pins the greedy walk may not return to.
    #[arg(long)]
    window: Option<usize>,

    #[arg(long)]
    contrast: Option<f32>,

    #[arg(long)]
    population: Option<usize>,

    #[arg(long)]
    elitism: Option<f32>,

    #[arg(long)]
    mutation_rate: Option<f32>,

    /// Generations without improvement before the search stops.
    #[arg(long)]
    patience: Option<usize>,

    #[arg(long)]
    generations: Option<usize>,

    #[arg(long)]
    tournament: Option<usize>,

    /// Genes of every individual.
    #[arg(long)]
    genes: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Thread colors as "name", "name:#RRGGBB" or "name:r,g,b". Several colors route segments
    /// per color.
    #[arg(long, short)]
    colors: Vec<NamedColor>,

    /// Output directory, `output/` next to the input by default.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stroke width of the SVG lines.
    #[arg(long, default_value_t = 0.5)]
    thickness: f32,

    /// Pixels per canvas pixel in the PNG preview.
    #[arg(long, default_value_t = 15)]
    scale: usize,
}

#[derive(Debug, Clone)]
struct NamedColor {
    name: String,
    color: Srgb<u8>,
}

impl From<&NamedColor> for Named {
    fn from(value: &NamedColor) -> Self {
        Named::new(
            value.name.as_str(),
            Rgb(value.color.red, value.color.green, value.color.blue),
        )
    }
}

impl FromStr for NamedColor {
    type Err = NamedColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "name", "name:r,g,b" or "name:#FFFFFF"
        let parts: Vec<&str> = s.split(':').collect();
        match parts.len() {
            1 => palette::named::from_str(&parts[0].to_lowercase())
                .map(|color| Self {
                    name: parts[0].to_string(),
                    color,
                })
                .ok_or_else(|| NamedColorParseError::UnknownName(parts[0].to_string())),
            2 => {
                let color_str = parts[1];
                if let Some(color) = parse_hex_color(color_str)? {
                    Ok(NamedColor {
                        name: parts[0].to_string(),
                        color,
                    })
                } else {
                    let rgb: Vec<&str> = color_str.split(',').collect();
                    if rgb.len() != 3 {
                        return Err(NamedColorParseError::InvalidRgb);
                    }
                    let channel = |value: &str| {
                        value
                            .trim()
                            .parse::<u8>()
                            .map_err(|_| NamedColorParseError::InvalidRgb)
                    };
                    Ok(NamedColor {
                        name: parts[0].to_string(),
                        color: Srgb::new(channel(rgb[0])?, channel(rgb[1])?, channel(rgb[2])?),
                    })
                }
            }
            _ => Err(NamedColorParseError::InvalidFormat),
        }
    }
}

/// `Ok(None)` when `s` does not look like a hex color, so the caller can try other forms.
fn parse_hex_color(s: &str) -> Result<Option<Srgb<u8>>, NamedColorParseError> {
    let s = s.trim();
    let (digits, prefixed) = match s.strip_prefix('#').or_else(|| s.strip_prefix("0x")) {
        Some(digits) => (digits, true),
        None => (s, false),
    };
    let is_hex = digits.bytes().all(|byte| byte.is_ascii_hexdigit());
    if !is_hex || !matches!(digits.len(), 3 | 6) {
        return if prefixed {
            Err(NamedColorParseError::InvalidHex)
        } else {
            Ok(None)
        };
    }

    // only ascii digits from here, byte slicing is safe
    let channel = |digits: &str| {
        u8::from_str_radix(digits, 16).map_err(|_| NamedColorParseError::InvalidHex)
    };
    Ok(Some(if digits.len() == 6 {
        Srgb::new(
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
        )
    } else {
        Srgb::new(
            channel(&digits[0..1].repeat(2))?,
            channel(&digits[1..2].repeat(2))?,
            channel(&digits[2..3].repeat(2))?,
        )
    }))
}

#[derive(Debug, Error)]
enum NamedColorParseError {
    #[error("Invalid format. Use 'name', 'name:#RRGGBB' or 'name:r,g,b'")]
    InvalidFormat,
    #[error("Invalid RGB format. Use three comma separated values between 0 and 255.")]
    InvalidRgb,
    #[error("Invalid hexadecimal format. Use #RRGGBB, 0xRRGGBB or RRGGBB.")]
    InvalidHex,
    #[error("Color '{0}' is not a known color name")]
    UnknownName(String),
}

#[derive(Clone, Copy, Debug)]
enum Precision {
    Single,
    Double,
}

impl ValueEnum for Precision {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Single, Self::Double]
    }

    fn to_possible_value<'a>(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::Single => clap::builder::PossibleValue::new("Single")
                .alias("single")
                .alias("f32"),
            Self::Double => clap::builder::PossibleValue::new("Double")
                .alias("double")
                .alias("f64"),
        })
    }
}

impl std::fmt::Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => f.write_str("Single"),
            Self::Double => f.write_str("Double"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum StrategyArg {
    Greedy,
    Genetic,
}

impl ValueEnum for StrategyArg {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Greedy, Self::Genetic]
    }

    fn to_possible_value<'a>(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::Greedy => clap::builder::PossibleValue::new("Greedy").alias("greedy"),
            Self::Genetic => clap::builder::PossibleValue::new("Genetic")
                .alias("genetic")
                .alias("ga"),
        })
    }
}

impl From<StrategyArg> for Strategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Greedy => Strategy::Greedy,
            StrategyArg::Genetic => Strategy::Genetic,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("Failed reading {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed writing {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Compute(#[from] thread_art::Error),
    #[error("Invalid input file name {0}")]
    FileName(PathBuf),
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let result = match args.precision {
        Precision::Single => with_precision::<f32>(&args),
        Precision::Double => with_precision::<f64>(&args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn build_config<S: Float>(args: &Args) -> Result<Config<S>, CliError>
where
    f32: AsPrimitive<S>,
    Config<S>: DeserializeOwned,
{
    let mut config: Config<S> = match &args.config {
        Some(path) => {
            let file = File::open(path).map_err(|source| CliError::Read {
                path: path.clone(),
                source,
            })?;
            serde_json::from_reader(BufReader::new(file))?
        }
        None => Config::default(),
    };

    let overrides = [
        (args.pins, &mut config.pin_count),
        (args.min_distance, &mut config.min_distance),
        (args.window, &mut config.recent_pin_window),
        (args.population, &mut config.population_size),
        (args.patience, &mut config.max_generations_without_improvement),
        (args.tournament, &mut config.tournament_size),
        (args.genes, &mut config.genotype_length),
    ];
    for (value, field) in overrides {
        if let Some(value) = value {
            *field = value;
        }
    }
    let scalars = [
        (args.weight, &mut config.line_weight),
        (args.threshold, &mut config.end_threshold),
        (args.contrast, &mut config.contrast),
        (args.elitism, &mut config.elitism_fraction),
        (args.mutation_rate, &mut config.mutation_rate),
    ];
    for (value, field) in scalars {
        if let Some(value) = value {
            *field = value.as_();
        }
    }

    if args.unbounded {
        config.max_lines = None;
    } else if args.max_lines.is_some() {
        config.max_lines = args.max_lines;
    }
    if args.generations.is_some() {
        config.max_generations = args.generations;
    }
    if let Some(strategy) = args.strategy {
        config.strategy = strategy.into();
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if !args.colors.is_empty() {
        config.target_colors = args.colors.iter().map(Named::from).collect();
    }
    Ok(config)
}

fn with_precision<S: Float>(args: &Args) -> Result<(), CliError>
where
    f32: AsPrimitive<S>,
    usize: AsPrimitive<S>,
    u8: AsPrimitive<S>,
    Config<S>: DeserializeOwned,
{
    let config = build_config::<S>(args)?;
    let source = image::open(&args.input)?.resize_to_fill(
        args.resolution,
        args.resolution,
        image::imageops::FilterType::Lanczos3,
    );
    let image = Image::<S>::from(&source);
    log::info!(
        "{} pins, {} colors, {:?} strategy on a {}px canvas",
        config.pin_count,
        config.target_colors.len(),
        config.strategy,
        args.resolution
    );

    let computation = compute(&image, &config, &mut LogVerboser, &Cancel::new())?;
    log::info!(
        "{} lines drawn, stopped by {:?}",
        computation.segments().len(),
        computation.termination()
    );

    let file_name = args
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| CliError::FileName(args.input.clone()))?;
    let out_folder = match &args.output {
        Some(folder) => folder.clone(),
        None => args
            .input
            .parent()
            .unwrap_or(Path::new("."))
            .join("output"),
    };
    std::fs::create_dir_all(&out_folder).map_err(|source| CliError::Write {
        path: out_folder.clone(),
        source,
    })?;

    let svg_path = out_folder.join(format!("{file_name}.svg"));
    svg::save(&svg_path, &computation.build_svg(args.thickness)).map_err(|source| {
        CliError::Write {
            path: svg_path.clone(),
            source,
        }
    })?;
    let png_path = out_folder.join(format!("{file_name}.png"));
    computation.build_rgb(args.scale)?.save(&png_path)?;
    let txt_path = out_folder.join(format!("{file_name}.txt"));
    std::fs::write(&txt_path, computation.build_instructions()).map_err(|source| {
        CliError::Write {
            path: txt_path.clone(),
            source,
        }
    })?;
    log::info!("results written to {}", out_folder.display());
    Ok(())
}
