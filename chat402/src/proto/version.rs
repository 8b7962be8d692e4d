//! The `x402Version` marker.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A protocol version pinned at compile time.
///
/// Serializes as a bare integer. Deserializing any other number fails, so a
/// payload claiming `x402Version: 2` never reaches verification.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Version<const N: u8>;

impl<const N: u8> Version<N> {
    /// The numeric value of this protocol version.
    pub const VALUE: u8 = N;
}

impl<const N: u8> std::fmt::Display for Version<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{N}")
    }
}

impl<const N: u8> Serialize for Version<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(N)
    }
}

impl<'de, const N: u8> Deserialize<'de> for Version<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = u8::deserialize(deserializer)?;
        if v == N {
            Ok(Self)
        } else {
            Err(serde::de::Error::custom(format!(
                "unsupported x402Version {v}, expected {N}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_pinned_version_decodes() {
        assert!(serde_json::from_str::<Version<1>>("1").is_ok());
        assert!(serde_json::from_str::<Version<1>>("2").is_err());
        assert!(serde_json::from_str::<Version<1>>("\"1\"").is_err());
        assert_eq!(serde_json::to_string(&Version::<1>).unwrap(), "1");
    }
}
