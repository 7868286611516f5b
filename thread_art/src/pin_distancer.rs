use thiserror::Error;

/// Decides which pin pairs may be joined by a line.
///
/// Two pins are joinable when their circular index separation is at least `min`, which also
/// rules out zero length lines.
#[derive(Clone, Copy, Debug)]
pub struct PinDistancer {
    count: usize,
    min: usize,
}

impl PinDistancer {
    pub fn new(count: usize, distance: usize) -> Result<Self, Error> {
        if count < 2 * distance || count < 2 {
            Err(Error { count, distance })
        } else {
            Ok(Self {
                count,
                min: distance.max(1),
            })
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn separation(&self, a: usize, b: usize) -> usize {
        let diff = a.abs_diff(b);
        diff.min(self.count - diff)
    }

    // NOTE: indices are not bound checked.
    pub fn is_valid(&self, a: usize, b: usize) -> bool {
        a != b && self.separation(a, b) >= self.min
    }

    /// Pins reachable from `pin`, walking clockwise from the nearest allowed offset.
    pub fn reachable(&self, pin: usize) -> impl Iterator<Item = usize> + '_ {
        (self.min..=self.count - self.min)
            .map(move |offset| (pin + offset) % self.count)
            .filter(move |&other| other != pin)
    }

    /// Slot of the unordered pair in a flattened lower triangular matrix.
    pub fn slot(&self, a: usize, b: usize) -> usize {
        let (big, small) = if a > b { (a, b) } else { (b, a) };
        big * (big - 1) / 2 + small
    }

    pub fn slot_count(&self) -> usize {
        self.count * (self.count - 1) / 2
    }
}

#[derive(Debug, Error)]
#[error("{count} pins can not keep a minimum distance of {distance} between linked pins")]
pub struct Error {
    pub count: usize,
    pub distance: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separation_wraps_around_the_circle() {
        let distancer = PinDistancer::new(10, 3).unwrap();
        assert_eq!(distancer.separation(0, 9), 1);
        assert_eq!(distancer.separation(2, 7), 5);
        assert!(!distancer.is_valid(0, 8));
        assert!(distancer.is_valid(0, 3));
        assert!(distancer.is_valid(0, 7));
        assert!(!distancer.is_valid(4, 4));
    }

    #[test]
    fn reachable_matches_validity() {
        let distancer = PinDistancer::new(12, 4).unwrap();
        for pin in 0..12 {
            let reachable: Vec<_> = distancer.reachable(pin).collect();
            let expected: Vec<_> = (0..12).filter(|&o| distancer.is_valid(pin, o)).collect();
            let mut sorted = reachable.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, expected);
            assert_eq!(reachable.len(), expected.len());
        }
    }

    #[test]
    fn slots_are_symmetric_and_unique() {
        let distancer = PinDistancer::new(9, 1).unwrap();
        let mut seen = vec![false; distancer.slot_count()];
        for a in 0..9 {
            for b in 0..a {
                let slot = distancer.slot(a, b);
                assert_eq!(slot, distancer.slot(b, a));
                assert!(!seen[slot]);
                seen[slot] = true;
            }
        }
        assert!(seen.into_iter().all(|s| s));
    }

    #[test]
    fn too_few_pins_is_an_error() {
        assert!(PinDistancer::new(39, 20).is_err());
        assert!(PinDistancer::new(40, 20).is_ok());
        assert!(PinDistancer::new(1, 0).is_err());
    }
}
