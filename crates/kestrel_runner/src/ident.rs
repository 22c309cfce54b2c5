//! Suite and runner identifier generation.

use rand::Rng;

const ID_LENGTH: usize = 14;
const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generates a 14-character base-36 identifier.
///
/// Uniqueness is probabilistic (~70 bits of entropy); the coordinator never
/// relies on more than collision-unlikelihood within one run.
pub fn generate_id() -> String {
    let mut rng = rand::rng();
    (0..ID_LENGTH)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}
