use rand::{Rng, rng};

/// A source of 128 random bits.
///
/// This abstraction allows you to plug in the thread-local CSPRNG or a mocked
/// random source in tests.
///
/// # Example
/// ```
/// use cloudtrace_core::RandSource;
///
/// struct FixedRand;
/// impl RandSource for FixedRand {
///     fn rand(&self) -> u128 {
///         1234
///     }
/// }
///
/// let rng = FixedRand;
/// assert_eq!(rng.rand(), 1234);
/// ```
pub trait RandSource {
    /// Returns 128 random bits.
    fn rand(&self) -> u128;
}

/// A `RandSource` that uses the thread-local RNG (`rand::rng()`).
///
/// The RNG is cryptographically secure (ChaCha-based) and reseeded
/// periodically. This type does **not** store the RNG; it reaches for the
/// calling thread's generator on every call, so it is a zero-sized, `Send` and
/// `Sync` handle that can be cloned freely into request handlers.
#[derive(Default, Clone, Copy, Debug)]
pub struct ThreadRandom;

impl RandSource for ThreadRandom {
    fn rand(&self) -> u128 {
        rng().random()
    }
}
