use super::{RandSource, ThreadRandom};
use core::{fmt, str::FromStr};
use serde::{Deserialize, Serialize};
use uuid::{Builder, Uuid};

/// A request identifier: a v4 UUID, displayed in canonical hyphenated form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Length of the canonical textual form.
    pub const TEXT_LEN: usize = 36;

    /// Builds an identifier from raw random bits, overwriting the version
    /// nibble with 4 and the variant with RFC 4122.
    pub const fn from_random_bits(bits: u128) -> Self {
        Self(Builder::from_random_bytes(bits.to_be_bytes()).into_uuid())
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.to_string()
    }
}

/// Mints [`RequestId`]s from a [`RandSource`].
///
/// Generation is stateless and infallible; uniqueness is enforced by the store,
/// not here.
#[derive(Clone, Debug, Default)]
pub struct RequestIdGenerator<R = ThreadRandom> {
    rand: R,
}

impl<R> RequestIdGenerator<R>
where
    R: RandSource,
{
    pub const fn new(rand: R) -> Self {
        Self { rand }
    }

    pub fn next_id(&self) -> RequestId {
        RequestId::from_random_bits(self.rand.rand())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashSet;
    use uuid::{Variant, Version};

    struct SeqRand(Cell<u128>);

    impl RandSource for SeqRand {
        fn rand(&self) -> u128 {
            let n = self.0.get();
            self.0.set(n + 1);
            n
        }
    }

    #[test]
    fn ids_are_canonical_v4() {
        let generator = RequestIdGenerator::<ThreadRandom>::default();
        for _ in 0..256 {
            let id = generator.next_id();
            let text = id.to_string();

            assert_eq!(text.len(), RequestId::TEXT_LEN);
            assert_eq!(text, text.to_lowercase());

            let parsed = Uuid::parse_str(&text).unwrap();
            assert_eq!(parsed.get_version(), Some(Version::Random));
            assert_eq!(parsed.get_variant(), Variant::RFC4122);
        }
    }

    #[test]
    fn thread_random_ids_are_unique() {
        let generator = RequestIdGenerator::new(ThreadRandom);
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(generator.next_id()), "duplicate request id");
        }
    }

    #[test]
    fn version_bits_are_forced() {
        let id = RequestId::from_random_bits(u128::MAX);
        assert_eq!(id.to_string(), "ffffffff-ffff-4fff-bfff-ffffffffffff");

        let id = RequestId::from_random_bits(0);
        assert_eq!(id.to_string(), "00000000-0000-4000-8000-000000000000");
    }

    #[test]
    fn generator_uses_its_source() {
        let generator = RequestIdGenerator::new(SeqRand(Cell::new(41)));
        let a = generator.next_id();
        let b = generator.next_id();

        assert_eq!(a, RequestId::from_random_bits(41));
        assert_eq!(b, RequestId::from_random_bits(42));
        assert_ne!(a, b);
    }

    #[test]
    fn display_parses_back() {
        let id = RequestIdGenerator::new(ThreadRandom).next_id();
        let parsed: RequestId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);

        assert!("not-a-uuid".parse::<RequestId>().is_err());
    }

    #[test]
    fn serializes_as_string() {
        let id = RequestId::from_random_bits(0);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-4000-8000-000000000000\"");
    }
}
