//! Benchmark utilities.

use bytes::Bytes;
use rand::Rng;

/// Generate random value data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate `count` distinct keys.
pub fn generate_keys(count: usize) -> Vec<Bytes> {
    (0..count)
        .map(|i| Bytes::from(format!("key-{i:08}")))
        .collect()
}

/// Generate key/value pairs with the specified payload size.
pub fn generate_pairs(count: usize, payload_size: usize) -> Vec<(Bytes, Bytes)> {
    generate_keys(count)
        .into_iter()
        .map(|key| (key, Bytes::from(random_data(payload_size))))
        .collect()
}
