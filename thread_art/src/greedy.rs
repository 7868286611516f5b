use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};

use crate::{
    algorithm::{Error, Segment, Termination},
    cancel::Cancel,
    config::Config,
    line_cache::LineCache,
    recent_pins::RecentPins,
    residual::ResidualField,
    verboser::{Message, Verboser},
    Float,
};

#[derive(Clone, Copy, Debug, PartialEq)]
struct Candidate<S> {
    pin: usize,
    order: usize,
    score: S,
}

impl<S: Float> Candidate<S> {
    /// Higher score wins, ties go to the candidate evaluated first.
    fn best(self, other: Self) -> Self {
        if other.score > self.score || (other.score == self.score && other.order < self.order) {
            other
        } else {
            self
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Phase<S> {
    Select,
    Evaluate,
    TermCheck(Option<Candidate<S>>),
    Commit(Candidate<S>),
    Terminal(Termination),
}

/// Outcome of a single [`Greedy::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Committed(Segment),
    Finished(Termination),
}

/// Walks pin to pin, always taking the line that removes most residual demand.
pub struct Greedy<'a, S> {
    cache: &'a LineCache,
    residual: ResidualField<S>,
    recent: RecentPins,
    sequence: Vec<usize>,
    current: usize,
    phase: Phase<S>,
    line_weight: S,
    end_threshold: S,
    max_lines: Option<usize>,
}

impl<'a, S: Float> Greedy<'a, S> {
    pub fn new(
        cache: &'a LineCache,
        residual: ResidualField<S>,
        config: &Config<S>,
    ) -> Result<Self, Error> {
        if *residual.grid() != cache.grid() {
            return Err(Error::GridMismatch);
        }
        Ok(Self {
            cache,
            residual,
            recent: RecentPins::new(cache.pin_count(), config.recent_pin_window),
            sequence: vec![0],
            current: 0,
            phase: Phase::Select,
            line_weight: config.line_weight,
            end_threshold: config.end_threshold,
            max_lines: config.max_lines,
        })
    }

    pub fn sequence(&self) -> &[usize] {
        &self.sequence
    }

    pub fn residual(&self) -> &ResidualField<S> {
        &self.residual
    }

    pub fn lines(&self) -> usize {
        self.sequence.len() - 1
    }

    pub fn termination(&self) -> Option<Termination> {
        match self.phase {
            Phase::Terminal(termination) => Some(termination),
            _ => None,
        }
    }

    /// Stops the walk, keeping every committed line.
    pub fn cancel(&mut self) {
        if self.termination().is_none() {
            self.phase = Phase::Terminal(Termination::Cancelled);
        }
    }

    /// Advances the state machine up to the next commit or to the terminal state.
    pub fn step(&mut self) -> Step {
        loop {
            self.phase = match self.phase {
                Phase::Select => Phase::Evaluate,
                Phase::Evaluate => Phase::TermCheck(self.evaluate()),
                Phase::TermCheck(best) => match best {
                    _ if self.max_lines.is_some_and(|max| self.lines() >= max) => {
                        Phase::Terminal(Termination::LineBudget)
                    }
                    None => Phase::Terminal(Termination::Exhausted),
                    Some(best) if best.score < self.end_threshold => {
                        Phase::Terminal(Termination::BelowThreshold)
                    }
                    Some(best) => Phase::Commit(best),
                },
                Phase::Commit(best) => {
                    let segment = self.commit(best.pin);
                    self.phase = Phase::Select;
                    return Step::Committed(segment);
                }
                Phase::Terminal(termination) => return Step::Finished(termination),
            }
        }
    }

    fn evaluate(&self) -> Option<Candidate<S>> {
        let candidates: Vec<usize> = self
            .cache
            .distancer()
            .reachable(self.current)
            .filter(|&pin| !self.recent.contains(pin))
            .collect();
        candidates
            .par_iter()
            .enumerate()
            .map(|(order, &pin)| Candidate {
                pin,
                order,
                score: self
                    .residual
                    .score(self.cache.expect(self.current, pin).line()),
            })
            .reduce_with(Candidate::best)
    }

    fn commit(&mut self, pin: usize) -> Segment {
        let line = self.cache.expect(self.current, pin);
        self.residual.commit(line.line(), self.line_weight);
        self.recent.push(pin);
        self.sequence.push(pin);
        let segment = Segment::new(self.current, pin, None);
        self.current = pin;
        segment
    }

    /// Steps until a terminal state, reporting progress and polling `cancel` after every commit.
    pub fn run(
        mut self,
        progress_interval: usize,
        verboser: &mut impl Verboser,
        cancel: &Cancel,
    ) -> GreedyResult<S> {
        let termination = loop {
            if cancel.is_cancelled() {
                self.cancel();
            }
            match self.step() {
                Step::Committed(_) => {
                    if self.lines() % progress_interval.max(1) == 0 {
                        verboser.verbose(Message::Computing(self.lines()));
                    }
                }
                Step::Finished(termination) => break termination,
            }
        };
        log::info!(
            "greedy walk finished after {} lines: {:?}",
            self.lines(),
            termination
        );
        GreedyResult {
            sequence: self.sequence,
            residual: self.residual,
            termination,
        }
    }
}

pub struct GreedyResult<S> {
    pub sequence: Vec<usize>,
    pub residual: ResidualField<S>,
    pub termination: Termination,
}

impl<S> GreedyResult<S> {
    pub fn segments(&self) -> Vec<Segment> {
        Segment::from_sequence(&self.sequence, None)
    }
}
