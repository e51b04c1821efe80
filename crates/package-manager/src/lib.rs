//! Ordered, short-circuiting evaluation of a verified quote against a manifest
//! package definition.

use manifest::Package;
use trust_root::{QuoteVerificationError, VerifiedQuote};

/// Evaluate `quote` against `package`'s declared measurement policy.
///
/// Rules run in order and stop at the first failure, mirroring the single-field
/// checks a real attestation verifier runs one after another rather than
/// collecting every mismatch at once — the first lie in a quote is reason enough
/// to reject it.
pub fn verify(quote: &VerifiedQuote, package: &Package) -> Result<(), QuoteVerificationError> {
    if package.debug {
        return Ok(());
    }

    if let Some(expected) = package.unique_id {
        if quote.unique_id() != &expected {
            return Err(QuoteVerificationError::mismatch(
                "UniqueId",
                hex::encode(expected),
                hex::encode(quote.unique_id()),
            ));
        }
    }

    if let Some(expected) = package.signer_id {
        if quote.signer_id() != &expected {
            return Err(QuoteVerificationError::mismatch(
                "SignerId",
                hex::encode(expected),
                hex::encode(quote.signer_id()),
            ));
        }
    }

    if package.product_id != 0 && quote.product_id() != package.product_id {
        return Err(QuoteVerificationError::mismatch(
            "ProductId",
            package.product_id.to_string(),
            quote.product_id().to_string(),
        ));
    }

    if package.security_version != 0 && quote.security_version() < package.security_version {
        return Err(QuoteVerificationError::mismatch(
            "SecurityVersion",
            format!(">= {}", package.security_version),
            quote.security_version().to_string(),
        ));
    }

    if !package.accepted_tcb_statuses.is_empty() {
        let status = format!("{:?}", quote.tcb_status());
        if !package.accepted_tcb_statuses.iter().any(|s| s == &status) {
            return Err(QuoteVerificationError::mismatch(
                "TcbStatus",
                package.accepted_tcb_statuses.join("|"),
                status,
            ));
        }
    }

    tracing::debug!(unique_id = %hex::encode(quote.unique_id()), "package verification passed");
    Ok(())
}
