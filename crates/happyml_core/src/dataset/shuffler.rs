//! Fisher-Yates index permutation, held externally so co-indexed datasets
//! (e.g. a given-dataset and its paired label-dataset) can share one
//! shuffle order (spec §4.C).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct Shuffler {
    order: Vec<usize>,
}

impl Shuffler {
    /// Identity order `[0, n)`; call [`Shuffler::shuffle`] to permute it.
    pub fn identity(n: usize) -> Self {
        Self {
            order: (0..n).collect(),
        }
    }

    pub fn shuffle(&mut self, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = self.order.len();
        for i in (1..n).rev() {
            let j = rng.gen_range(0..=i);
            self.order.swap(i, j);
        }
    }

    pub fn lookup(&self, cursor: usize) -> usize {
        self.order[cursor]
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_ordered() {
        let s = Shuffler::identity(5);
        for i in 0..5 {
            assert_eq!(s.lookup(i), i);
        }
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut s = Shuffler::identity(20);
        s.shuffle(7);
        let mut seen: Vec<usize> = (0..20).map(|i| s.lookup(i)).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn shuffle_is_deterministic_per_seed() {
        let mut a = Shuffler::identity(10);
        a.shuffle(42);
        let mut b = Shuffler::identity(10);
        b.shuffle(42);
        for i in 0..10 {
            assert_eq!(a.lookup(i), b.lookup(i));
        }
    }
}
