use serde::{Deserialize, Serialize};

use crate::{color::Named, pin_distancer, Float};

/// Search strategy for single color runs. Several target colors always use the router.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    Greedy,
    Genetic,
}

/// Every knob of a run, shared read only by all the components.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "S: Float + Deserialize<'de>"))]
pub struct Config<S> {
    pub pin_count: usize,
    /// Minimum circular index separation between two linked pins.
    pub min_distance: usize,
    /// Demand removed from every pixel a committed line crosses.
    pub line_weight: S,
    /// Searches stop once the best score falls below this value.
    pub end_threshold: S,
    pub max_lines: Option<usize>,
    /// Recently visited pins the greedy walk may not return to.
    pub recent_pin_window: usize,
    /// Contrast stretch factor applied around the intensity midpoint.
    pub contrast: S,
    pub strategy: Strategy,

    pub population_size: usize,
    /// Share of the population copied unchanged into the next generation.
    pub elitism_fraction: S,
    /// Per gene mutation probability.
    pub mutation_rate: S,
    pub max_generations_without_improvement: usize,
    pub max_generations: Option<usize>,
    pub tournament_size: usize,
    pub genotype_length: usize,

    pub target_colors: Vec<Named>,
    pub seed: Option<u64>,
    /// Commits between two progress reports.
    pub progress_interval: usize,
}

fn lit<S: Float>(value: f64) -> S {
    num_traits::cast(value).unwrap_or(S::ZERO)
}

impl<S: Float> Default for Config<S> {
    fn default() -> Self {
        Self {
            pin_count: 288,
            min_distance: 20,
            line_weight: lit(15.0),
            end_threshold: S::ZERO,
            max_lines: Some(4000),
            recent_pin_window: 20,
            contrast: lit(1.2),
            strategy: Strategy::Greedy,
            population_size: 40,
            elitism_fraction: lit(0.1),
            mutation_rate: lit(0.01),
            max_generations_without_improvement: 20,
            max_generations: Some(500),
            tournament_size: 3,
            genotype_length: 1000,
            target_colors: vec![Named::black()],
            seed: None,
            progress_interval: 100,
        }
    }
}

impl<S: Float> Config<S> {
    /// Rejects every configuration no strategy could run with, before any buffer is built.
    pub fn validate(&self) -> Result<(), Error> {
        pin_distancer::PinDistancer::new(self.pin_count, self.min_distance)?;
        if !(self.line_weight > S::ZERO) {
            return Err(Error::LineWeight);
        }
        if !(self.contrast > S::ZERO) {
            return Err(Error::Contrast);
        }
        if self.target_colors.is_empty() {
            return Err(Error::EmptyPalette);
        }
        if self.progress_interval == 0 {
            return Err(Error::ProgressInterval);
        }
        if self.target_colors.len() == 1 {
            match self.strategy {
                Strategy::Genetic => self.validate_population()?,
                Strategy::Greedy if self.max_lines.is_none() && !(self.end_threshold > S::ZERO) => {
                    return Err(Error::Unbounded)
                }
                Strategy::Greedy => {}
            }
        }
        Ok(())
    }

    fn validate_population(&self) -> Result<(), Error> {
        if self.population_size == 0 {
            return Err(Error::Population);
        }
        if self.tournament_size == 0 {
            return Err(Error::Tournament);
        }
        if self.genotype_length < 2 {
            return Err(Error::GenotypeLength);
        }
        if !(self.elitism_fraction >= S::ZERO && self.elitism_fraction <= S::ONE) {
            return Err(Error::Fraction("elitism_fraction"));
        }
        if !(self.mutation_rate >= S::ZERO && self.mutation_rate <= S::ONE) {
            return Err(Error::Fraction("mutation_rate"));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    PinDistance(#[from] pin_distancer::Error),
    #[error("The line weight must be greater than zero")]
    LineWeight,
    #[error("The contrast factor must be greater than zero")]
    Contrast,
    #[error("At least one target color is required")]
    EmptyPalette,
    #[error("The progress interval must be greater than zero")]
    ProgressInterval,
    #[error("The population must hold at least one individual")]
    Population,
    #[error("The tournament size must be greater than zero")]
    Tournament,
    #[error("A genotype needs at least two genes")]
    GenotypeLength,
    #[error("{0} must be within 0 and 1")]
    Fraction(&'static str),
    #[error("A greedy walk without line budget needs an end threshold greater than zero")]
    Unbounded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::<f32>::default().validate().unwrap();
        let genetic = Config::<f64> {
            strategy: Strategy::Genetic,
            ..Default::default()
        };
        genetic.validate().unwrap();
    }

    #[test]
    fn input_errors_fail_fast() {
        let config = Config::<f32> {
            pin_count: 30,
            min_distance: 20,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::PinDistance(_))));

        let config = Config::<f32> {
            target_colors: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::EmptyPalette)));

        let config = Config::<f32> {
            strategy: Strategy::Genetic,
            mutation_rate: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Fraction("mutation_rate"))));
    }

    #[test]
    fn greedy_needs_a_stop_condition() {
        let config = Config::<f64> {
            max_lines: None,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Unbounded)));

        let config = Config::<f64> {
            max_lines: None,
            end_threshold: 2.0,
            ..Default::default()
        };
        config.validate().unwrap();

        // the router runs out of lines on its own
        let config = Config::<f64> {
            max_lines: None,
            target_colors: vec![Named::black(), Named::new("Red", crate::color::Rgb(255, 0, 0))],
            ..Default::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn reads_partial_json() {
        let config: Config<f32> =
            serde_json::from_str(r#"{ "pin_count": 120, "strategy": "genetic", "seed": 7 }"#)
                .unwrap();
        assert_eq!(config.pin_count, 120);
        assert_eq!(config.strategy, Strategy::Genetic);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.min_distance, 20);
    }
}
