use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::VecDeque;

/// Every random draw the experiment makes goes through this trait.
pub trait RandomSource {
    /// A uniformly random permutation of `0..n`.
    fn permutation(&mut self, n: usize) -> Vec<usize>;

    /// `k` distinct indices from `0..n`, in draw order.
    fn subset(&mut self, n: usize, k: usize) -> Vec<usize>;

    /// Uniform sample in `[0, 1)`.
    fn uniform(&mut self) -> f64;
}

/// Returns `items` reordered by one permutation draw.
pub fn shuffle<R, T>(rng: &mut R, items: Vec<T>) -> Vec<T>
where
    R: RandomSource + ?Sized,
{
    let order = rng.permutation(items.len());
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|i| slots.get_mut(i).and_then(Option::take))
        .collect()
}

/// `RandomSource` backed by any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngSource<R>(pub R);

impl<R: Rng> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self(rng)
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn permutation(&mut self, n: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut self.0);
        order
    }

    fn subset(&mut self, n: usize, k: usize) -> Vec<usize> {
        rand::seq::index::sample(&mut self.0, n, k.min(n)).into_vec()
    }

    fn uniform(&mut self) -> f64 {
        self.0.random::<f64>()
    }
}

/// Deterministic source for tests.
///
/// Permutations are identity unless queued, subsets take the first `k`
/// indices, and uniforms replay the queued values in a cycle (0.0 when
/// nothing was queued).
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    permutations: VecDeque<Vec<usize>>,
    uniforms: Vec<f64>,
    cursor: usize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_uniforms(uniforms: Vec<f64>) -> Self {
        Self {
            uniforms,
            ..Self::default()
        }
    }

    /// Queues a permutation for the next `permutation` call of matching length.
    pub fn push_permutation(&mut self, order: Vec<usize>) {
        self.permutations.push_back(order);
    }
}

impl RandomSource for ScriptedSource {
    fn permutation(&mut self, n: usize) -> Vec<usize> {
        match self.permutations.front() {
            Some(order) if order.len() == n => self.permutations.pop_front().unwrap_or_default(),
            _ => (0..n).collect(),
        }
    }

    fn subset(&mut self, n: usize, k: usize) -> Vec<usize> {
        (0..k.min(n)).collect()
    }

    fn uniform(&mut self) -> f64 {
        if self.uniforms.is_empty() {
            return 0.0;
        }
        let u = self.uniforms[self.cursor % self.uniforms.len()];
        self.cursor += 1;
        u
    }
}
