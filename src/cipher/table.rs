//! Seed-derived substitution tables.
//!
//! A table is a deterministic function of `(alphabet, seed)`. Construction folds a ring of the
//! alphabet once per seed character (plus a fixed salt), then reads the ring at an offset derived
//! from the seed. Tables are memoized for the lifetime of the process.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::{debug, warn};

/// ASCII `'0'..='z'`, 75 symbols, no duplicates.
pub const DEFAULT_ALPHABET: &str =
    "0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstuvwxyz";

const SALT: &str = "750qwERty";
const SOURCE: &str = "cipher::table";

static TABLES: Lazy<DashMap<(String, String), Arc<CipherTable>>> = Lazy::new(DashMap::new);

/// Forward and inverse character substitution for one `(alphabet, seed)` pair.
#[derive(Clone, PartialEq, Eq)]
pub struct CipherTable {
    alphabet: Vec<char>,
    forward: HashMap<char, char>,
    inverse: HashMap<char, char>,
    permutation: bool,
}

impl CipherTable {
    /// Build a table from scratch. Prefer [`CipherTable::memoized`] outside tests.
    ///
    /// Seed characters outside the alphabet contribute nothing to the offset and leave the ring
    /// unchanged.
    pub fn build(alphabet: &str, seed: &str) -> Self {
        let symbols: Vec<char> = alphabet.chars().collect();
        let n = symbols.len();
        if n == 0 {
            return Self {
                alphabet: symbols,
                forward: HashMap::new(),
                inverse: HashMap::new(),
                permutation: true,
            };
        }

        let shift = seed
            .chars()
            .filter_map(|c| symbols.iter().position(|symbol| *symbol == c))
            .fold(0usize, |acc, index| (acc + index) % n);

        let mut ring = symbols.clone();
        for c in seed.chars().chain(SALT.chars()) {
            match ring.iter().position(|symbol| *symbol == c) {
                Some(position) if position > 0 => {
                    let mut folded = ring.split_off(position);
                    folded.extend(ring.iter().rev());
                    ring = folded;
                }
                _ => {}
            }
        }

        let mut forward = HashMap::with_capacity(n);
        for (k, symbol) in symbols.iter().enumerate() {
            forward.insert(*symbol, ring[(shift + k) % n]);
        }

        let mut inverse = HashMap::with_capacity(n);
        for symbol in &symbols {
            if let Some(image) = forward.get(symbol) {
                inverse.entry(*image).or_insert(*symbol);
            }
        }

        let distinct: HashSet<&char> = symbols.iter().collect();
        let permutation = distinct.len() == n && inverse.len() == n;

        Self {
            alphabet: symbols,
            forward,
            inverse,
            permutation,
        }
    }

    /// The process-wide table for `(alphabet, seed)`, built on first use.
    ///
    /// Concurrent first callers may each build a table; the first one stored wins and the others are
    /// dropped. All of them are identical.
    pub fn memoized(alphabet: &str, seed: &str) -> Arc<Self> {
        let memo_key = (alphabet.to_string(), seed.to_string());
        if let Some(table) = TABLES.get(&memo_key) {
            return Arc::clone(table.value());
        }

        let built = Arc::new(Self::build(alphabet, seed));
        if !built.permutation {
            warn!(
                target = SOURCE,
                op = "memoized",
                alphabet_len = built.alphabet.len(),
                mapped = built.inverse.len(),
                result = "lossy",
                "Cipher alphabet does not yield a permutation; deciphering may be ambiguous"
            );
        }
        debug!(
            target = SOURCE,
            op = "memoized",
            alphabet_len = built.alphabet.len(),
            result = "built",
            "Cipher table constructed"
        );

        Arc::clone(TABLES.entry(memo_key).or_insert(built).value())
    }

    /// Memoized table over [`DEFAULT_ALPHABET`].
    pub fn for_seed(seed: &str) -> Arc<Self> {
        Self::memoized(DEFAULT_ALPHABET, seed)
    }

    pub fn forward(&self, c: char) -> Option<char> {
        self.forward.get(&c).copied()
    }

    pub fn inverse(&self, c: char) -> Option<char> {
        self.inverse.get(&c).copied()
    }

    /// True when every alphabet symbol maps to a distinct symbol.
    pub fn is_permutation(&self) -> bool {
        self.permutation
    }

    pub fn alphabet(&self) -> impl Iterator<Item = char> + '_ {
        self.alphabet.iter().copied()
    }

    /// Images of the alphabet, in alphabet order.
    pub fn images(&self) -> String {
        self.alphabet
            .iter()
            .filter_map(|symbol| self.forward.get(symbol))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

impl std::fmt::Debug for CipherTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherTable")
            .field("alphabet_len", &self.alphabet.len())
            .field("permutation", &self.permutation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_alphabet_is_ascii_zero_to_z() {
        let expected: String = ('0'..='z').collect();
        assert_eq!(DEFAULT_ALPHABET, expected);
        assert_eq!(DEFAULT_ALPHABET.chars().count(), 75);
    }

    #[test]
    fn reference_seed_table() {
        let table = CipherTable::build(DEFAULT_ALPHABET, "seed123");
        insta::assert_snapshot!(
            table.images(),
            @r"ijklmnop543621789:;<=>?@ABCDEsedcba`_^]\[ZYXWVUTSRzrqFGHIJKLMNOPQwvutyx0fgh"
        );
        assert!(table.is_permutation());
    }

    #[test]
    fn empty_seed_still_folds_salt() {
        let table = CipherTable::build(DEFAULT_ALPHABET, "");
        assert_eq!(
            table.images(),
            r"yxwQPONMLKJIHGFEsr54321789:;<=>?@ABCDqponmlkjihgfedcba`_^]\[ZYXWVUTSRz60vut"
        );
    }

    #[test]
    fn construction_is_deterministic() {
        let a = CipherTable::build(DEFAULT_ALPHABET, "s3cr3t-Seed");
        let b = CipherTable::build(DEFAULT_ALPHABET, "s3cr3t-Seed");
        assert_eq!(a, b);
        assert_ne!(a, CipherTable::build(DEFAULT_ALPHABET, "s3cr3t-Seee"));
    }

    #[test]
    fn every_default_table_is_a_permutation() {
        for seed in ["", "a", "seed123", "~~~ out of alphabet ~~~", "zzzzzzzzzzzzzzzz"] {
            let table = CipherTable::build(DEFAULT_ALPHABET, seed);
            assert!(table.is_permutation(), "seed {seed:?}");
            assert_eq!(table.len(), 75);
            for c in table.alphabet() {
                let image = table.forward(c).expect("mapped");
                assert_eq!(table.inverse(image), Some(c));
            }
        }
    }

    #[test]
    fn memoized_returns_shared_table() {
        let first = CipherTable::memoized(DEFAULT_ALPHABET, "memo-seed");
        let second = CipherTable::for_seed("memo-seed");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, CipherTable::build(DEFAULT_ALPHABET, "memo-seed"));
    }

    #[test]
    fn concurrent_first_use_converges() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| CipherTable::memoized("abcdefgh", "race-seed")))
            .collect();
        let tables: Vec<Arc<CipherTable>> = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread"))
            .collect();
        for table in &tables[1..] {
            assert_eq!(**table, *tables[0]);
        }
    }

    #[test]
    fn duplicate_alphabet_is_flagged() {
        let table = CipherTable::build("aabc", "b");
        assert!(!table.is_permutation());
    }

    #[test]
    fn empty_alphabet_maps_nothing() {
        let table = CipherTable::build("", "seed");
        assert!(table.is_empty());
        assert_eq!(table.forward('a'), None);
    }
}
