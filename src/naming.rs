use rand::Rng;

/// Random string of `length` decimal digits, each uniform in 0-9.
///
/// Uniqueness is not checked here; callers creating files retry on collision.
pub fn generate(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}
