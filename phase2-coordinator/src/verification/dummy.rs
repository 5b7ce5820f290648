use crate::{storage::ArtifactLocator, verification::{Verification, Verifier}};

/// A dummy verifier that accepts every non-empty contribution.
pub struct Dummy;

impl Verifier for Dummy {
    /// Returns the name of the verification scheme.
    fn name(&self) -> String {
        Self::warning();
        "DummyVerificationScheme".to_string()
    }

    /// Returns `true` if the verification scheme is safe for use in production.
    fn is_secure(&self) -> bool {
        Self::warning();
        false
    }

    /// Returns a valid verification for any non-empty contribution.
    fn verify(&self, contribution: &[u8], _artifacts: &dyn ArtifactLocator) -> anyhow::Result<Verification> {
        Self::warning();
        Ok(Verification::new(!contribution.is_empty()))
    }
}

impl Dummy {
    /// Outputs an explicit message that the verification scheme should not be used.
    fn warning() {
        #[cfg(not(test))]
        {
            tracing::trace!("A DUMMY VERIFICATION SCHEME METHOD IS CURRENTLY BEING USED");
            tracing::warn!("DUMMY VERIFICATION SCHEME IS NOT SAFE FOR USE IN PRODUCTION");
            tracing::error!("ATTEMPTING TO USE INSECURE VERIFICATION SCHEME IN CEREMONY");
        }
    }
}
