//! Seeded random generation of TPC-C field values.
//!
//! Every population phase and every benchmark worker owns exactly one [`TpccRng`]. Given the same
//! seed, a generator always yields the same sequence of draws, which is what makes a load
//! reproducible bit for bit.

use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};

const A_STRING_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const N_STRING_ALPHABET: &[u8] = b"0123456789";

/// Syllables that make up a customer surname. See 4.3.2.3.
const SYLLABLES: [&str; 10] = [
    "BAR", "OUGHT", "ABLE", "PRI", "PRES", "ESE", "ANTI", "CALLY", "ATION", "EING",
];

/// Number of distinct surnames, one per three-digit number.
pub const NUM_SURNAMES: u64 = 1000;

/// NURand constant `C` used for surnames while loading.
pub const C_LAST_LOAD: u64 = 157;

/// NURand constant `C` for customer ids.
pub const C_ID: u64 = 259;

/// NURand constant `C` for item ids.
pub const C_OL_I_ID: u64 = 7911;

const ORIGINAL: &str = "ORIGINAL";

/// Base of the per-worker seed, combined with the worker's identity.
const WORKER_SEED_BASE: u64 = 0xdeadbeef;

#[derive(Debug, Clone)]
pub struct TpccRng {
    rng: SmallRng,
}

impl TpccRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// The generator of a benchmark worker. Distinct workers draw uncorrelated sequences.
    pub fn for_worker(worker_id: usize) -> Self {
        Self::new(WORKER_SEED_BASE.wrapping_add(worker_id as u64))
    }

    /// A raw 64-bit draw.
    pub fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    /// Returns a number within `[lo, hi]` inclusive. See 2.1.4.
    pub fn uniform_int(&mut self, lo: u64, hi: u64) -> u64 {
        debug_assert!(lo <= hi, "empty range [{}, {}]", lo, hi);
        self.rng.random_range(lo..=hi)
    }

    /// Returns a random alphanumeric string of exactly `len` characters.
    pub fn bounded_string(&mut self, len: usize) -> String {
        self.string_from(A_STRING_ALPHABET, len)
    }

    /// Returns a random string of exactly `len` decimal digits.
    pub fn bounded_digit_string(&mut self, len: usize) -> String {
        self.string_from(N_STRING_ALPHABET, len)
    }

    /// Returns a random alphanumeric string whose length is drawn from `[min_len, max_len]`.
    pub fn rand_string_len(&mut self, min_len: usize, max_len: usize) -> String {
        let len = self.uniform_int(min_len as u64, max_len as u64) as usize;
        self.bounded_string(len)
    }

    fn string_from(&mut self, alphabet: &[u8], len: usize) -> String {
        (0..len)
            .map(|_| alphabet[self.rng.random_range(0..alphabet.len())] as char)
            .collect()
    }

    /// Non-uniform random number within `[x, y]`. See 2.1.6.
    pub fn nurand(&mut self, a: u64, x: u64, y: u64, c: u64) -> u64 {
        (((self.uniform_int(0, a) | self.uniform_int(x, y)) + c) % (y - x + 1)) + x
    }

    /// A surname drawn with the load-time skew.
    pub fn skewed_surname(&mut self) -> String {
        Self::surname(self.nurand(255, 0, NUM_SURNAMES - 1, C_LAST_LOAD))
    }

    /// The surname for ordinal `index`. The first thousand ordinals cover every surname once.
    pub fn unique_surname_by_index(index: u64) -> String {
        Self::surname(index % NUM_SURNAMES)
    }

    /// Builds the surname of a number in `[0, 999]` from the syllables of its three digits.
    pub fn surname(n: u64) -> String {
        debug_assert!(n < NUM_SURNAMES);
        let mut s = String::with_capacity(15);
        s.push_str(SYLLABLES[(n / 100) as usize]);
        s.push_str(SYLLABLES[(n / 10 % 10) as usize]);
        s.push_str(SYLLABLES[(n % 10) as usize]);
        s
    }

    /// Recovers the ordinal of a surname produced by [`TpccRng::surname`].
    pub fn surname_ordinal(surname: &str) -> Option<u64> {
        let mut rest = surname;
        let mut n = 0;
        for _ in 0..3 {
            let (i, syl) = SYLLABLES
                .iter()
                .enumerate()
                .find(|(_, syl)| rest.starts_with(*syl))?;
            n = n * 10 + i as u64;
            rest = &rest[syl.len()..];
        }
        rest.is_empty().then_some(n)
    }

    /// A string with length in `[min_len, max_len]` that contains "ORIGINAL" 10% of the time. See
    /// 4.3.3.1.
    pub fn original_string(&mut self, min_len: usize, max_len: usize) -> String {
        let len = self.uniform_int(min_len as u64, max_len as u64) as usize;
        if self.uniform_int(1, 100) > 10 {
            return self.bounded_string(len);
        }
        let start = self.uniform_int(2, (len - ORIGINAL.len()) as u64) as usize;
        let mut s = self.bounded_string(start);
        s.push_str(ORIGINAL);
        let rest = self.bounded_string(len - start - ORIGINAL.len());
        s.push_str(&rest);
        debug_assert_eq!(s.len(), len);
        s
    }

    /// A random "zip code": four digits followed by "11111". See 4.3.2.7.
    pub fn zip(&mut self) -> String {
        let mut s = self.bounded_digit_string(4);
        s.push_str("11111");
        s
    }

    /// A random tax rate in `[0.0000, 0.2000]`. See 2.1.5.
    pub fn tax(&mut self) -> f64 {
        self.uniform_int(0, 2000) as f64 / 10000.0
    }
}
