//! Credential resolution
//!
//! Each stage asks for its own credential, scoped by [`StageKind`], instead
//! of every remote operation sharing one ambient secret. Where secrets live
//! is up to the resolver implementation.

use hoist_core::domain::run::StageKind;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{Result, StageError};

/// Credential handed to a stage's transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// No credential (e.g. fetching a public repository)
    None,
    /// Use whatever the ambient ssh-agent offers
    Agent,
    /// Private key file
    SshKey { path: PathBuf },
}

impl Credential {
    /// Parses `agent`, `none` or a key file path
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "" | "none" => Ok(Credential::None),
            "agent" => Ok(Credential::Agent),
            path => {
                let path = PathBuf::from(path);
                if !path.is_file() {
                    return Err(StageError::Credential(format!(
                        "key file {} does not exist",
                        path.display()
                    )));
                }
                Ok(Credential::SshKey { path })
            }
        }
    }

    /// Fails unless this credential can authenticate a remote shell
    pub fn require_remote(&self, scope: StageKind, credential_id: &str) -> Result<()> {
        match self {
            Credential::None => Err(StageError::Credential(format!(
                "no credential '{credential_id}' available for the {scope} stage"
            ))),
            Credential::Agent | Credential::SshKey { .. } => Ok(()),
        }
    }
}

/// Resolves the credential a stage should use
pub trait CredentialResolver: Send + Sync {
    /// Returns [`Credential::None`] when nothing is configured for the scope
    fn resolve(&self, scope: StageKind, credential_id: &str) -> Result<Credential>;
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves credentials from environment variables
///
/// For credential id `deploy-key` and the transfer stage, the lookup order is
/// `HOIST_CREDENTIAL_DEPLOY_KEY_TRANSFER`, then `HOIST_CREDENTIAL_DEPLOY_KEY`.
/// Values are `agent`, `none` or a key file path.
pub struct EnvCredentialResolver {
    lookup: Lookup,
}

impl EnvCredentialResolver {
    pub fn new() -> Self {
        Self::with_lookup(|key| std::env::var(key).ok())
    }

    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Box::new(lookup),
        }
    }

    fn variable_name(credential_id: &str, scope: Option<StageKind>) -> String {
        let id: String = credential_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        match scope {
            Some(scope) => format!("HOIST_CREDENTIAL_{id}_{}", scope.as_str().to_uppercase()),
            None => format!("HOIST_CREDENTIAL_{id}"),
        }
    }
}

impl Default for EnvCredentialResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialResolver for EnvCredentialResolver {
    fn resolve(&self, scope: StageKind, credential_id: &str) -> Result<Credential> {
        let scoped = Self::variable_name(credential_id, Some(scope));
        let shared = Self::variable_name(credential_id, None);

        match (self.lookup)(&scoped).or_else(|| (self.lookup)(&shared)) {
            Some(raw) => Credential::parse(&raw),
            None => Ok(Credential::None),
        }
    }
}

/// Resolves credentials from key files in a directory
///
/// Looks for `<dir>/<id>.<stage>` first, then `<dir>/<id>`.
pub struct DirectoryCredentialResolver {
    dir: PathBuf,
}

impl DirectoryCredentialResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn key_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(StageError::Credential(format!(
                "invalid credential id '{name}'"
            )));
        }
        Ok(self.dir.join(name))
    }
}

impl CredentialResolver for DirectoryCredentialResolver {
    fn resolve(&self, scope: StageKind, credential_id: &str) -> Result<Credential> {
        let scoped = self.key_path(&format!("{credential_id}.{}", scope.as_str()))?;
        let shared = self.key_path(credential_id)?;

        for path in [scoped, shared] {
            if path.is_file() {
                return Ok(Credential::SshKey { path });
            }
        }
        Ok(Credential::None)
    }
}

/// Fixed credential table
///
/// Scoped entries win over entries registered for every stage.
#[derive(Default)]
pub struct StaticCredentialResolver {
    entries: HashMap<(String, Option<StageKind>), Credential>,
}

impl StaticCredentialResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a credential for every stage
    pub fn with(mut self, credential_id: impl Into<String>, credential: Credential) -> Self {
        self.entries.insert((credential_id.into(), None), credential);
        self
    }

    /// Registers a credential for a single stage
    pub fn with_scoped(
        mut self,
        credential_id: impl Into<String>,
        scope: StageKind,
        credential: Credential,
    ) -> Self {
        self.entries
            .insert((credential_id.into(), Some(scope)), credential);
        self
    }
}

impl CredentialResolver for StaticCredentialResolver {
    fn resolve(&self, scope: StageKind, credential_id: &str) -> Result<Credential> {
        let id = credential_id.to_string();
        Ok(self
            .entries
            .get(&(id.clone(), Some(scope)))
            .or_else(|| self.entries.get(&(id, None)))
            .cloned()
            .unwrap_or(Credential::None))
    }
}
