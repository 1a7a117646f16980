// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed error conditions callers may want to branch on.
//!
//! Everything else is propagated as `anyhow::Error`; these can be recovered
//! with `err.downcast_ref::<IndexNotFoundError>()`.

use thiserror::Error;

/// No index exists for the requested location or collection.
#[derive(Debug, Error)]
#[error("Index not found at {index_path} (collection '{collection}'). Run 'codefind index' first.")]
pub struct IndexNotFoundError {
    pub index_path: String,
    pub collection: String,
}

/// The configuration does not match what the collection was built with.
#[derive(Debug, Error)]
#[error(
    "Collection '{collection}' was indexed with {field} = '{indexed}' but the configuration \
     says '{configured}'. Re-index with 'codefind index --clear' or restore the setting."
)]
pub struct ConfigMismatchError {
    pub collection: String,
    pub field: &'static str,
    pub indexed: String,
    pub configured: String,
}

/// Fusion weight outside `[0, 1]`.
#[derive(Debug, Error)]
#[error("alpha must be within [0, 1], got {0}")]
pub struct InvalidAlphaError(pub f32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_not_found_mentions_remediation() {
        let err = IndexNotFoundError {
            index_path: "/tmp/repo/.codefind".into(),
            collection: "codebase".into(),
        };
        let message = err.to_string();
        assert!(message.contains("/tmp/repo/.codefind"));
        assert!(message.contains("codefind index"));
    }

    #[test]
    fn downcast_through_anyhow() {
        let err: anyhow::Error = InvalidAlphaError(1.5).into();
        assert!(err.downcast_ref::<InvalidAlphaError>().is_some());
    }
}
