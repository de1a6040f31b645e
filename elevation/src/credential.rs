use crate::ElevationError;
use rand::Rng;
use rand::distr::Alphanumeric;
use zeroize::Zeroizing;

/// Environment variable that carries the secret into the privileged child.
/// It is only ever set on the child's `Command`.
pub const CREDENTIAL_ENV_VAR: &str = "REMOTEHAND_CREDENTIAL";

const GENERATED_LEN: usize = 12;

/// Secret applied to the remote tool. Wiped on drop and never formatted.
pub struct Credential(Zeroizing<String>);

impl Credential {
    /// Rejects empty secrets so the child never configures a blank password.
    pub fn new(secret: impl Into<String>) -> Result<Self, ElevationError> {
        let secret = Zeroizing::new(secret.into());
        if secret.trim().is_empty() {
            return Err(ElevationError::CredentialMissing);
        }
        Ok(Self(secret))
    }

    /// One-time alphanumeric secret for a fresh remote-access session.
    pub fn generate() -> Self {
        let secret: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(GENERATED_LEN)
            .map(char::from)
            .collect();
        Self(Zeroizing::new(secret))
    }

    pub fn from_env() -> Result<Self, ElevationError> {
        match std::env::var(CREDENTIAL_ENV_VAR) {
            Ok(secret) => Self::new(secret),
            Err(_) => Err(ElevationError::CredentialMissing),
        }
    }

    pub fn expose_secret(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn debug_output_never_contains_secret() {
        let credential = Credential::new("hunter2").expect("credential");
        let rendered = format!("{credential:?}");
        assert_eq!(rendered, "Credential(<redacted>)");
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn blank_secret_fails_closed() {
        assert!(matches!(
            Credential::new("   "),
            Err(ElevationError::CredentialMissing)
        ));
    }

    #[test]
    fn generated_secrets_are_alphanumeric_and_distinct() {
        let first = Credential::generate();
        let second = Credential::generate();
        assert_eq!(first.expose_secret().len(), GENERATED_LEN);
        assert!(
            first
                .expose_secret()
                .chars()
                .all(|c| c.is_ascii_alphanumeric())
        );
        assert_ne!(first.expose_secret(), second.expose_secret());
    }
}
