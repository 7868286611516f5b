use std::cmp::Ordering;

use rand::{rngs::SmallRng, Rng, SeedableRng};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::{
    algorithm::{Error, Segment, Termination},
    cancel::Cancel,
    config::Config,
    line_cache::LineCache,
    residual::{self, ResidualField},
    verboser::{Message, Verboser},
    Float,
};

/// A full pin sequence with its rendered ink and fitness.
#[derive(Clone, Debug)]
pub struct Individual<S> {
    genes: Vec<usize>,
    ink: Vec<S>,
    fitness: S,
}

impl<S: Float> Individual<S> {
    pub fn genes(&self) -> &[usize] {
        &self.genes
    }

    /// Accumulated, unclamped ink per pixel.
    pub fn ink(&self) -> &[S] {
        &self.ink
    }

    pub fn fitness(&self) -> S {
        self.fitness
    }

    pub fn segments(&self) -> Vec<Segment> {
        Segment::from_sequence(&self.genes, None)
    }
}

/// Rendering and scoring of genotypes against one demand field.
#[derive(Clone, Copy)]
pub struct Model<'a, S> {
    cache: &'a LineCache,
    demand: &'a [S],
    target: &'a [S],
    line_weight: S,
    length: usize,
}

impl<'a, S: Float> Model<'a, S> {
    pub fn new(
        cache: &'a LineCache,
        field: &'a ResidualField<S>,
        line_weight: S,
        length: usize,
    ) -> Self {
        Self {
            cache,
            demand: field.values(),
            target: field.target(),
            line_weight,
            length,
        }
    }

    fn pin_count(&self) -> usize {
        self.cache.pin_count()
    }

    /// A random neighbour of `pin` respecting the minimum distance.
    fn random_step(&self, pin: usize, rng: &mut impl Rng) -> usize {
        let min = self.cache.distancer().min();
        (pin + rng.gen_range(min..=self.pin_count() - min)) % self.pin_count()
    }

    pub fn random_genes(&self, rng: &mut impl Rng) -> Vec<usize> {
        let mut genes = Vec::with_capacity(self.length);
        let mut pin = rng.gen_range(0..self.pin_count());
        genes.push(pin);
        while genes.len() < self.length {
            pin = self.random_step(pin, rng);
            genes.push(pin);
        }
        genes
    }

    fn draw(&self, ink: &mut [S], from: usize, to: usize, weight: S) {
        for &idx in self.cache.expect(from, to).indexes() {
            ink[idx] += weight;
        }
    }

    /// Ink laid by `genes` on a blank canvas.
    pub fn render(&self, genes: &[usize]) -> Vec<S> {
        let mut ink = vec![S::ZERO; self.demand.len()];
        for pair in genes.windows(2) {
            self.draw(&mut ink, pair[0], pair[1], self.line_weight);
        }
        ink
    }

    /// Negated total absolute difference between demand and the clamped ink.
    pub fn fitness(&self, ink: &[S]) -> S {
        -self
            .demand
            .iter()
            .zip(ink)
            .map(|(&demand, &ink)| (demand - residual::clamp(ink)).abs())
            .sum::<S>()
    }

    pub fn evaluate(&self, genes: Vec<usize>) -> Individual<S> {
        let ink = self.render(&genes);
        Individual {
            fitness: self.fitness(&ink),
            genes,
            ink,
        }
    }

    /// Walks the union of both parents' edges, consuming every edge it crosses.
    ///
    /// When the walk is stuck on a pin without unused edges it jumps to a random pin at a
    /// valid distance. Identical parents give back the same genes.
    pub fn crossover(&self, a: &[usize], b: &[usize], rng: &mut impl Rng) -> Vec<usize> {
        if a == b {
            return a.to_vec();
        }
        let mut adjacency = vec![Vec::new(); self.pin_count()];
        for pair in a.windows(2).chain(b.windows(2)) {
            adjacency[pair[0]].push(pair[1]);
            adjacency[pair[1]].push(pair[0]);
        }
        let mut current = a.first().copied().unwrap_or(0);
        let mut child = Vec::with_capacity(self.length);
        child.push(current);
        while child.len() < self.length {
            let next = if adjacency[current].is_empty() {
                self.random_step(current, rng)
            } else {
                let choice = rng.gen_range(0..adjacency[current].len());
                let next = adjacency[current].swap_remove(choice);
                if let Some(back) = adjacency[next].iter().position(|&pin| pin == current) {
                    adjacency[next].swap_remove(back);
                }
                next
            };
            child.push(next);
            current = next;
        }
        child
    }

    /// Replaces genes, with probability `rate` each, by the pin that best serves the demand
    /// left between its two neighbours.
    pub fn mutate(&self, individual: &mut Individual<S>, rate: S, rng: &mut impl Rng) {
        let distancer = self.cache.distancer();
        let rate = rate.to_f64().unwrap_or(0.0);
        let mut changed = false;
        for idx in 0..individual.genes.len() {
            if !rng.gen_bool(rate.clamp(0.0, 1.0)) {
                continue;
            }
            let gene = individual.genes[idx];
            let left = idx.checked_sub(1).map(|left| individual.genes[left]);
            let right = individual.genes.get(idx + 1).copied();
            for neighbour in left.into_iter().chain(right) {
                self.draw(&mut individual.ink, neighbour, gene, -self.line_weight);
            }

            let ink = &individual.ink;
            let left_over = |pixel: usize| self.demand[pixel] - residual::clamp(ink[pixel]);
            let mut best = (gene, -S::INFINITY);
            for pin in 0..self.pin_count() {
                if left.is_some_and(|left| !distancer.is_valid(left, pin))
                    || right.is_some_and(|right| !distancer.is_valid(pin, right))
                {
                    continue;
                }
                let score = left
                    .into_iter()
                    .chain(right)
                    .map(|neighbour| {
                        residual::score_line(
                            self.cache.expect(neighbour, pin).indexes(),
                            self.target,
                            left_over,
                        )
                    })
                    .sum::<S>();
                if score > best.1 {
                    best = (pin, score);
                }
            }

            let pin = best.0;
            for neighbour in left.into_iter().chain(right) {
                self.draw(&mut individual.ink, neighbour, pin, self.line_weight);
            }
            changed |= pin != gene;
            individual.genes[idx] = pin;
        }
        if changed {
            individual.fitness = self.fitness(&individual.ink);
        }
    }
}

fn by_fitness<S: Float>(a: &Individual<S>, b: &Individual<S>) -> Ordering {
    b.fitness.partial_cmp(&a.fitness).unwrap_or(Ordering::Equal)
}

/// Best of `size` individuals drawn uniformly with replacement.
fn tournament<'p, S: Float>(
    individuals: &'p [Individual<S>],
    size: usize,
    rng: &mut impl Rng,
) -> &'p Individual<S> {
    let mut best = &individuals[rng.gen_range(0..individuals.len())];
    for _ in 1..size {
        let challenger = &individuals[rng.gen_range(0..individuals.len())];
        if challenger.fitness > best.fitness {
            best = challenger;
        }
    }
    best
}

/// Outcome of a single [`Population::step`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GenerationStep<S> {
    Evolved { generation: usize, best_fitness: S },
    Finished(Termination),
}

/// Generational search over whole pin sequences.
pub struct Population<'a, S> {
    model: Model<'a, S>,
    individuals: Vec<Individual<S>>,
    best: Individual<S>,
    rng: SmallRng,
    generation: usize,
    stale: usize,
    termination: Option<Termination>,
    elites: usize,
    tournament_size: usize,
    mutation_rate: S,
    max_stale: usize,
    max_generations: Option<usize>,
}

impl<'a, S: Float> Population<'a, S> {
    pub fn new(
        cache: &'a LineCache,
        field: &'a ResidualField<S>,
        config: &Config<S>,
    ) -> Result<Self, Error> {
        if *field.grid() != cache.grid() {
            return Err(Error::GridMismatch);
        }
        let model = Model::new(cache, field, config.line_weight, config.genotype_length);
        let mut rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let size = config.population_size.max(1);
        let genes: Vec<_> = (0..size).map(|_| model.random_genes(&mut rng)).collect();
        let mut individuals: Vec<_> = genes
            .into_par_iter()
            .map(|genes| model.evaluate(genes))
            .collect();
        individuals.sort_by(by_fitness);
        let fraction = config.elitism_fraction.to_f64().unwrap_or(0.0);
        let elites = ((size as f64 * fraction).ceil() as usize).clamp(1, size);
        log::debug!("population of {size} ready, keeping {elites} elites per generation");
        Ok(Self {
            model,
            best: individuals[0].clone(),
            individuals,
            rng,
            generation: 0,
            stale: 0,
            termination: None,
            elites,
            tournament_size: config.tournament_size.max(1),
            mutation_rate: config.mutation_rate,
            max_stale: config.max_generations_without_improvement,
            max_generations: config.max_generations,
        })
    }

    pub fn individuals(&self) -> &[Individual<S>] {
        &self.individuals
    }

    /// Best individual ever seen.
    pub fn best(&self) -> &Individual<S> {
        &self.best
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn cancel(&mut self) {
        if self.termination.is_none() {
            self.termination = Some(Termination::Cancelled);
        }
    }

    /// Breeds one generation.
    pub fn step(&mut self) -> GenerationStep<S> {
        if let Some(termination) = self.termination {
            return GenerationStep::Finished(termination);
        }
        if self.max_generations.is_some_and(|max| self.generation >= max) {
            self.termination = Some(Termination::GenerationBudget);
            return GenerationStep::Finished(Termination::GenerationBudget);
        }

        let size = self.individuals.len();
        let bred: Vec<(Vec<usize>, u64)> = (self.elites..size)
            .map(|_| {
                let a = tournament(&self.individuals, self.tournament_size, &mut self.rng);
                let b = tournament(&self.individuals, self.tournament_size, &mut self.rng);
                let genes = self.model.crossover(&a.genes, &b.genes, &mut self.rng);
                (genes, self.rng.gen())
            })
            .collect();
        let model = self.model;
        let rate = self.mutation_rate;
        let children: Vec<_> = bred
            .into_par_iter()
            .map(|(genes, seed)| {
                let mut child = model.evaluate(genes);
                model.mutate(&mut child, rate, &mut SmallRng::seed_from_u64(seed));
                child
            })
            .collect();
        self.individuals.truncate(self.elites);
        self.individuals.extend(children);
        self.individuals.sort_by(by_fitness);
        self.generation += 1;

        let leader = &self.individuals[0];
        if leader.fitness > self.best.fitness {
            self.best = leader.clone();
            self.stale = 0;
        } else {
            self.stale += 1;
            if self.stale >= self.max_stale {
                self.termination = Some(Termination::Stagnated);
            }
        }
        GenerationStep::Evolved {
            generation: self.generation,
            best_fitness: self.best.fitness,
        }
    }

    /// Evolves until stagnation, the generation budget or cancellation.
    pub fn run(mut self, verboser: &mut impl Verboser, cancel: &Cancel) -> PopulationResult<S> {
        let termination = loop {
            if cancel.is_cancelled() {
                self.cancel();
            }
            match self.step() {
                GenerationStep::Evolved {
                    generation,
                    best_fitness,
                } => verboser.verbose(Message::Generation {
                    generation,
                    best_fitness: best_fitness.to_f64().unwrap_or(f64::NAN),
                }),
                GenerationStep::Finished(termination) => break termination,
            }
        };
        log::info!(
            "population search finished after {} generations: {:?}",
            self.generation,
            termination
        );
        PopulationResult {
            best: self.best,
            generations: self.generation,
            termination,
        }
    }
}

pub struct PopulationResult<S> {
    pub best: Individual<S>,
    pub generations: usize,
    pub termination: Termination,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{image::Image, pins::PinLayout, verboser::Silent};
    use image::RgbImage;

    fn setup(side: u32, pins: usize, distance: usize) -> (LineCache, ResidualField<f64>) {
        let image = RgbImage::from_fn(side, side, |x, _| {
            if x < side / 2 {
                image::Rgb([20, 20, 20])
            } else {
                image::Rgb([230, 230, 230])
            }
        });
        let layout = PinLayout::circle::<f64>(side as usize, pins, &mut Silent).unwrap();
        let cache = LineCache::bake(&layout, distance, &mut Silent).unwrap();
        (cache, ResidualField::grayscale(&Image::from(&image), 1.2))
    }

    fn config() -> Config<f64> {
        Config {
            pin_count: 24,
            min_distance: 3,
            population_size: 12,
            genotype_length: 20,
            mutation_rate: 0.05,
            max_generations: Some(15),
            max_generations_without_improvement: 100,
            seed: Some(7),
            ..Default::default()
        }
    }

    fn is_valid(cache: &LineCache, genes: &[usize]) -> bool {
        genes
            .windows(2)
            .all(|pair| cache.distancer().is_valid(pair[0], pair[1]))
    }

    #[test]
    fn random_genes_respect_distance() {
        let (cache, field) = setup(48, 24, 3);
        let model = Model::new(&cache, &field, 15.0, 50);
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..20 {
            let genes = model.random_genes(&mut rng);
            assert_eq!(genes.len(), 50);
            assert!(is_valid(&cache, &genes));
        }
    }

    #[test]
    fn crossover_of_identical_parents_is_identity() {
        let (cache, field) = setup(48, 24, 3);
        let model = Model::new(&cache, &field, 15.0, 30);
        let mut rng = SmallRng::seed_from_u64(2);
        let parent = model.random_genes(&mut rng);
        assert_eq!(model.crossover(&parent, &parent, &mut rng), parent);
    }

    #[test]
    fn crossover_children_are_valid_paths() {
        let (cache, field) = setup(48, 24, 3);
        let model = Model::new(&cache, &field, 15.0, 30);
        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..20 {
            let a = model.random_genes(&mut rng);
            let b = model.random_genes(&mut rng);
            let child = model.crossover(&a, &b, &mut rng);
            assert_eq!(child.len(), 30);
            assert_eq!(child[0], a[0]);
            assert!(is_valid(&cache, &child));
        }
    }

    #[test]
    fn mutation_keeps_ink_in_sync() {
        let (cache, field) = setup(48, 24, 3);
        let model = Model::new(&cache, &field, 15.0, 25);
        let mut rng = SmallRng::seed_from_u64(4);
        let mut individual = model.evaluate(model.random_genes(&mut rng));
        model.mutate(&mut individual, 1.0, &mut rng);
        assert!(is_valid(&cache, individual.genes()));
        assert_eq!(individual.ink(), model.render(individual.genes()).as_slice());
        assert_eq!(individual.fitness(), model.fitness(individual.ink()));
    }

    #[test]
    fn fitness_prefers_matching_ink() {
        let (cache, field) = setup(48, 24, 3);
        let model = Model::new(&cache, &field, 15.0, 2);
        let blank = vec![0.0; field.values().len()];
        let exact: Vec<f64> = field.values().to_vec();
        assert_eq!(model.fitness(&exact), 0.0);
        assert!(model.fitness(&blank) < 0.0);
    }

    #[test]
    fn best_fitness_never_decreases() {
        let (cache, field) = setup(48, 24, 3);
        let mut population = Population::new(&cache, &field, &config()).unwrap();
        let mut last = population.individuals()[0].fitness();
        while let GenerationStep::Evolved { best_fitness, .. } = population.step() {
            let leader = population.individuals()[0].fitness();
            assert!(leader >= last, "{leader} < {last}");
            assert!(best_fitness >= leader);
            last = leader;
        }
        assert_eq!(population.generation(), 15);
    }

    #[test]
    fn fixed_seed_is_reproducible() {
        let (cache, field) = setup(40, 24, 3);
        let run = || {
            Population::new(&cache, &field, &config())
                .unwrap()
                .run(&mut Silent, &Cancel::new())
        };
        let (first, second) = (run(), run());
        assert_eq!(first.best.genes(), second.best.genes());
        assert_eq!(first.generations, second.generations);
    }

    #[test]
    fn cancellation_keeps_best_so_far() {
        let (cache, field) = setup(40, 24, 3);
        let config = Config {
            max_generations: Some(50),
            ..config()
        };
        let population = Population::new(&cache, &field, &config).unwrap();
        let initial = population.best().fitness();
        let cancel = Cancel::new();
        let mut seen = 0;
        let mut verboser = |message: Message| {
            if let Message::Generation { generation, .. } = message {
                seen = generation;
                if generation >= 4 {
                    cancel.cancel();
                }
            }
        };
        let result = population.run(&mut verboser, &cancel);
        assert_eq!(result.termination, Termination::Cancelled);
        assert_eq!(result.generations, 4);
        assert_eq!(seen, 4);
        assert_eq!(result.best.genes().len(), 20);
        assert!(result.best.fitness() >= initial);
    }

    #[test]
    fn stagnation_stops_the_search() {
        let (cache, field) = setup(40, 24, 3);
        let config = Config {
            max_generations: None,
            max_generations_without_improvement: 2,
            mutation_rate: 0.0,
            ..config()
        };
        let result = Population::new(&cache, &field, &config)
            .unwrap()
            .run(&mut Silent, &Cancel::new());
        assert!(matches!(
            result.termination,
            Termination::Stagnated | Termination::GenerationBudget
        ));
    }
}
