//! Mixed-radix enumeration over the cartesian product of the search axes.

use std::collections::HashSet;

use bt_types::{TuneError, TuneResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

/// Past this many bits of state-space size the 64-bit index arithmetic is no
/// longer exact.
const MAX_STATE_SPACE_LOG2: f64 = 64.0;

/// Above this sampled fraction, rejection sampling re-draws too often;
/// shuffling the full index range is cheaper.
const SHUFFLE_DENSITY_THRESHOLD: f64 = 0.7;

/// Walks the cartesian product of N finite sets by treating the position as
/// a mixed-radix number, most-significant digit at position 0.
///
/// Freshly constructed, the enumerator sits one step *before* the first
/// tuple: every digit is at its maximum while `state` already holds the
/// first element of each set, so `advance(1)` carries through to all-zero
/// digits and emits the lexicographically smallest tuple.
#[derive(Debug, Clone)]
pub struct MixedRadixEnumerator<T> {
    sets: Vec<Vec<T>>,
    digits: Vec<usize>,
    state: Vec<T>,
    total: u64,
}

impl<T: Clone> MixedRadixEnumerator<T> {
    pub fn new(sets: Vec<Vec<T>>) -> TuneResult<Self> {
        let mut log2_total = 0.0f64;
        let mut total = 1u64;
        for (position, set) in sets.iter().enumerate() {
            if set.is_empty() {
                return Err(TuneError::Config(format!(
                    "empty set of values at axis {position}"
                )));
            }
            log2_total += (set.len() as f64).log2();
            if log2_total >= MAX_STATE_SPACE_LOG2 {
                return Err(TuneError::Config(
                    "search space size exceeds the addressable 64-bit range".to_string(),
                ));
            }
            total = total.checked_mul(set.len() as u64).ok_or_else(|| {
                TuneError::Config(
                    "search space size exceeds the addressable 64-bit range".to_string(),
                )
            })?;
        }

        let digits = sets.iter().map(|set| set.len() - 1).collect();
        let state = sets.iter().map(|set| set[0].clone()).collect();
        Ok(Self {
            sets,
            digits,
            state,
            total,
        })
    }

    /// Number of tuples in the full product.
    pub fn total_count(&self) -> u64 {
        self.total
    }

    /// The tuple at the current index.
    pub fn state(&self) -> &[T] {
        &self.state
    }

    /// Adds `offset` to the mixed-radix index, carrying from the fastest
    /// position (N-1) toward position 0, and returns the tuple at the new
    /// index. Only positions whose digit changed are re-materialized.
    pub fn advance(&mut self, offset: u64) -> &[T] {
        let mut carry = u128::from(offset);
        for position in (0..self.digits.len()).rev() {
            if carry == 0 {
                break;
            }
            let base = self.sets[position].len() as u128;
            let sum = self.digits[position] as u128 + carry;
            let digit = (sum % base) as usize;
            carry = sum / base;
            if digit != self.digits[position] {
                self.digits[position] = digit;
                self.state[position] = self.sets[position][digit].clone();
            }
        }
        // A carry surviving past position 0 wraps around; callers cap the
        // advanced distance at total_count().
        &self.state
    }
}

/// Emits every tuple of the product exactly once, in lexicographic order on
/// the index tuple.
#[derive(Debug, Clone)]
pub struct ExhaustiveIterator<T> {
    enumerator: MixedRadixEnumerator<T>,
    emitted: u64,
}

impl<T: Clone> ExhaustiveIterator<T> {
    pub fn new(sets: Vec<Vec<T>>) -> TuneResult<Self> {
        Ok(Self {
            enumerator: MixedRadixEnumerator::new(sets)?,
            emitted: 0,
        })
    }

    pub fn total_count(&self) -> u64 {
        self.enumerator.total_count()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&[T]> {
        if self.emitted == self.enumerator.total_count() {
            return None;
        }
        self.emitted += 1;
        Some(self.enumerator.advance(1))
    }
}

/// Emits K tuples drawn from the product, replayed in ascending index order.
///
/// Target indices are chosen up front (1-based, so an index equals the
/// number of single steps from the enumerator's initial sentinel state),
/// sorted, and converted into consecutive deltas; each `next()` then costs
/// one mixed-radix advance instead of a random seek.
#[derive(Debug, Clone)]
pub struct SampledIterator<T> {
    enumerator: MixedRadixEnumerator<T>,
    offsets: Vec<u64>,
    cursor: usize,
}

impl<T: Clone> SampledIterator<T> {
    pub fn new(
        sets: Vec<Vec<T>>,
        num_tries: u32,
        allow_repeat: bool,
        rng: &mut StdRng,
    ) -> TuneResult<Self> {
        if num_tries == 0 {
            return Err(TuneError::Config(
                "number of tries for randomized search must be positive".to_string(),
            ));
        }
        let enumerator = MixedRadixEnumerator::new(sets)?;
        let total = enumerator.total_count();

        let mut count = u64::from(num_tries);
        if !allow_repeat && count > total {
            count = total;
        }

        let mut indices: Vec<u64>;
        if !allow_repeat && count as f64 / total as f64 > SHUFFLE_DENSITY_THRESHOLD {
            indices = (1..=total).collect();
            indices.shuffle(rng);
            indices.truncate(count as usize);
        } else {
            let mut seen = HashSet::new();
            indices = Vec::with_capacity(count as usize);
            while (indices.len() as u64) < count {
                let index = rng.gen_range(1..=total);
                if allow_repeat || seen.insert(index) {
                    indices.push(index);
                }
            }
        }
        indices.sort_unstable();

        let mut previous = 0u64;
        let offsets = indices
            .into_iter()
            .map(|index| {
                let delta = index - previous;
                previous = index;
                delta
            })
            .collect();

        Ok(Self {
            enumerator,
            offsets,
            cursor: 0,
        })
    }

    /// Number of tuples this iterator will emit.
    pub fn total_count(&self) -> u64 {
        self.offsets.len() as u64
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&[T]> {
        let delta = *self.offsets.get(self.cursor)?;
        self.cursor += 1;
        Some(self.enumerator.advance(delta))
    }
}

/// Either traversal strategy, so the driver treats them uniformly.
#[derive(Debug)]
pub enum CandidateIterator<T> {
    Exhaustive(ExhaustiveIterator<T>),
    Sampled(SampledIterator<T>),
}

impl<T: Clone> CandidateIterator<T> {
    pub fn total_count(&self) -> u64 {
        match self {
            Self::Exhaustive(iterator) => iterator.total_count(),
            Self::Sampled(iterator) => iterator.total_count(),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&[T]> {
        match self {
            Self::Exhaustive(iterator) => iterator.next(),
            Self::Sampled(iterator) => iterator.next(),
        }
    }
}
