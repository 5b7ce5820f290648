use crate::storage::ArtifactLocator;

/// The result of verifying a contribution.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Verification {
    valid: bool,
}

impl Verification {
    #[inline]
    pub fn new(valid: bool) -> Self {
        Self { valid }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

/// A core structure for verification of contributions.
///
/// Implementations wrap the proof library of the ceremony. The coordinator
/// never inspects contribution bytes itself.
pub trait Verifier: Send + Sync {
    /// Returns the name of the verification scheme.
    fn name(&self) -> String;

    /// Returns `true` if the verification scheme is safe for use in production.
    fn is_secure(&self) -> bool;

    /// Verifies the given contribution against the artifacts found by `artifacts`.
    ///
    /// An error means the verifier could not run, not that the contribution is invalid.
    fn verify(&self, contribution: &[u8], artifacts: &dyn ArtifactLocator) -> anyhow::Result<Verification>;
}
