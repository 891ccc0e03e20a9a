use sha1::{Digest, Sha1};

use crate::constants::scoring::{JITTER_PREFIX_BYTES, JITTER_SALT};

/// Hash `salt ++ value` and fold the digest prefix into a big-endian `u32`.
pub fn stable_hash_prefix(salt: &str, value: &str) -> u32 {
    let mut hasher = Sha1::new();
    hasher.update(salt.as_bytes());
    hasher.update(value.as_bytes());
    let digest = hasher.finalize();
    let mut prefix = [0u8; JITTER_PREFIX_BYTES];
    prefix.copy_from_slice(&digest[..JITTER_PREFIX_BYTES]);
    u32::from_be_bytes(prefix)
}

/// Deterministic pseudo-random value in `[-0.5, 0.5]` for `value` under `salt`.
pub fn stable_noise_with_salt(salt: &str, value: &str) -> f64 {
    f64::from(stable_hash_prefix(salt, value)) / f64::from(u32::MAX) - 0.5
}

/// Jitter for a record id under the crate-wide salt.
pub fn stable_noise(value: &str) -> f64 {
    stable_noise_with_salt(JITTER_SALT, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_is_bit_identical_across_calls() {
        let first = stable_noise("00sHx");
        let second = stable_noise("00sHx");
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn noise_stays_in_half_unit_band() {
        for idx in 0..512 {
            let value = stable_noise(&format!("puzzle_{idx}"));
            assert!((-0.5..=0.5).contains(&value), "{value} out of band");
        }
    }

    #[test]
    fn salt_changes_noise() {
        let a = stable_noise_with_salt("sel_v1", "00sJ9");
        let b = stable_noise_with_salt("sel_v2", "00sJ9");
        assert_ne!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn prefix_reads_digest_big_endian() {
        // sha1("abc") = a9993e36...
        assert_eq!(stable_hash_prefix("", "abc"), 0xa999_3e36);
        assert_eq!(stable_hash_prefix("a", "bc"), 0xa999_3e36);
    }
}
