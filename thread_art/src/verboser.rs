#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    PlacingPin(usize),
    Baking(usize, usize),
    /// Lines committed so far.
    Computing(usize),
    Generation {
        generation: usize,
        best_fitness: f64,
    },
    Ordering(usize),
}

pub trait Verboser {
    fn verbose(&mut self, message: Message);
}

pub struct Silent;

impl Verboser for Silent {
    fn verbose(&mut self, _: Message) {}
}

/// Forwards every message to the `log` facade.
pub struct LogVerboser;

impl Verboser for LogVerboser {
    fn verbose(&mut self, message: Message) {
        match message {
            Message::PlacingPin(idx) => log::trace!("placing pin {idx}"),
            Message::Baking(done, total) => log::debug!("baking lines {done}/{total}"),
            Message::Computing(lines) => log::info!("computing, {lines} lines committed"),
            Message::Generation {
                generation,
                best_fitness,
            } => log::info!("generation {generation}, best fitness {best_fitness:.1}"),
            Message::Ordering(color) => log::debug!("ordering segments of color {color}"),
        }
    }
}

impl<F: FnMut(Message)> Verboser for F {
    fn verbose(&mut self, message: Message) {
        self(message)
    }
}
