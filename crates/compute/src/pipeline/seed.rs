use rand::rngs::StdRng;
use rand::SeedableRng;

/// Derive a stable per-job seed from the run seed and a key path.
///
/// FNV-1a over the parts (separated so `["ab", "c"]` and `["a", "bc"]`
/// differ), mixed with the base seed. Independent of scheduling order and
/// of the platform's hasher.
pub fn derive_seed(base: u64, parts: &[&str]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325 ^ base;
    for part in parts {
        for b in part.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        h ^= 0xff;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

/// A generator seeded from [`derive_seed`].
pub fn rng_for(base: u64, parts: &[&str]) -> StdRng {
    StdRng::seed_from_u64(derive_seed(base, parts))
}
