//! SHA-256 fingerprints of serializable values.
//!
//! Used to tag sweep results with the configuration that produced them and
//! to compare summaries for byte-identity.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Hex SHA-256 of the value's canonical JSON
///
/// The value is routed through `serde_json::Value`, whose object map keeps
/// keys sorted, so field order never changes the fingerprint.
pub fn fingerprint<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_value(value)?;
    let json = serde_json::to_vec(&canonical)?;

    let mut hasher = Sha256::new();
    hasher.update(&json);
    let result = hasher.finalize();

    Ok(format!("{:x}", result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        a: u64,
        b: f64,
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let one = fingerprint(&Sample { a: 1, b: 0.5 }).unwrap();
        let two = fingerprint(&Sample { a: 1, b: 0.5 }).unwrap();
        assert_eq!(one, two);
        assert_eq!(one.len(), 64);
    }

    #[derive(Serialize)]
    struct Reordered {
        b: f64,
        a: u64,
    }

    #[test]
    fn test_fingerprint_ignores_field_order() {
        let one = fingerprint(&Sample { a: 1, b: 0.5 }).unwrap();
        let two = fingerprint(&Reordered { b: 0.5, a: 1 }).unwrap();
        assert_eq!(one, two);
    }

    #[test]
    fn test_fingerprint_differs_on_change() {
        let one = fingerprint(&Sample { a: 1, b: 0.5 }).unwrap();
        let two = fingerprint(&Sample { a: 2, b: 0.5 }).unwrap();
        assert_ne!(one, two);
    }
}
