use std::path::PathBuf;
use std::sync::Arc;

use tether_capability::Credentials;
use tether_config::ProviderConfig;

use crate::error::CredentialError;
use crate::profile::ProfileSet;
use crate::source::CredentialSource;

/// Environment variable lookup. Injected so resolution can be exercised
/// without touching the process environment.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Lookup against the real process environment. Empty values count as unset.
pub fn process_env() -> EnvLookup {
  Arc::new(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
}

/// One link of the credential chain.
pub trait CredentialProvider: Send + Sync {
  fn name(&self) -> &'static str;

  /// Yield a complete key pair, or `None` to defer to the next provider.
  fn provide(&self) -> Result<Option<(Credentials, CredentialSource)>, CredentialError>;
}

/// Credentials written directly into the configuration.
pub struct StaticProvider {
  access_key: String,
  secret_key: String,
  token: String,
}

impl StaticProvider {
  pub fn new(config: &ProviderConfig) -> Self {
    Self {
      access_key: config.access_key.clone(),
      secret_key: config.secret_key.clone(),
      token: config.token.clone(),
    }
  }
}

impl CredentialProvider for StaticProvider {
  fn name(&self) -> &'static str {
    "static"
  }

  fn provide(&self) -> Result<Option<(Credentials, CredentialSource)>, CredentialError> {
    if self.access_key.is_empty() || self.secret_key.is_empty() {
      return Ok(None);
    }

    let credentials = Credentials::new(
      &self.access_key,
      &self.secret_key,
      Some(self.token.clone()),
    );
    Ok(Some((
      credentials.clone(),
      CredentialSource::Static(credentials),
    )))
  }
}

/// `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`.
pub struct EnvironmentProvider {
  env: EnvLookup,
}

impl EnvironmentProvider {
  pub fn new(env: EnvLookup) -> Self {
    Self { env }
  }

  fn first(&self, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| (self.env)(key))
  }
}

impl CredentialProvider for EnvironmentProvider {
  fn name(&self) -> &'static str {
    "environment"
  }

  fn provide(&self) -> Result<Option<(Credentials, CredentialSource)>, CredentialError> {
    let access_key = self.first(&["AWS_ACCESS_KEY_ID", "AWS_ACCESS_KEY"]);
    let secret_key = self.first(&["AWS_SECRET_ACCESS_KEY", "AWS_SECRET_KEY"]);

    let (Some(access_key), Some(secret_key)) = (access_key, secret_key) else {
      return Ok(None);
    };

    let token = self.first(&["AWS_SESSION_TOKEN"]);
    Ok(Some((
      Credentials::new(access_key, secret_key, token),
      CredentialSource::Environment,
    )))
  }
}

/// A named profile in the shared credentials file.
pub struct SharedProfileProvider {
  file: PathBuf,
  profile: String,
}

impl SharedProfileProvider {
  pub fn new(file: impl Into<PathBuf>, profile: impl Into<String>) -> Self {
    Self {
      file: file.into(),
      profile: profile.into(),
    }
  }
}

impl CredentialProvider for SharedProfileProvider {
  fn name(&self) -> &'static str {
    "shared-profile"
  }

  fn provide(&self) -> Result<Option<(Credentials, CredentialSource)>, CredentialError> {
    let contents = match std::fs::read_to_string(&self.file) {
      Ok(contents) => contents,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
      Err(e) => {
        return Err(CredentialError::configuration(format!(
          "failed to read shared credentials file {}: {e}",
          self.file.display()
        )));
      }
    };

    let profiles = ProfileSet::parse(&contents);
    let access_key = profiles.get(&self.profile, "aws_access_key_id");
    let secret_key = profiles.get(&self.profile, "aws_secret_access_key");

    let (Some(access_key), Some(secret_key)) = (access_key, secret_key) else {
      return Ok(None);
    };

    let token = profiles
      .get(&self.profile, "aws_session_token")
      .map(str::to_string);
    Ok(Some((
      Credentials::new(access_key, secret_key, token),
      CredentialSource::SharedProfile {
        profile: self.profile.clone(),
        file: self.file.clone(),
      },
    )))
  }
}

/// Providers in priority order.
pub struct CredentialChain {
  providers: Vec<Box<dyn CredentialProvider>>,
}

impl CredentialChain {
  pub fn new(providers: Vec<Box<dyn CredentialProvider>>) -> Self {
    Self { providers }
  }

  /// Ask each provider in turn; the first complete key pair wins.
  pub fn provide(&self) -> Result<(Credentials, CredentialSource), CredentialError> {
    for provider in &self.providers {
      if let Some(found) = provider.provide()? {
        return Ok(found);
      }
      tracing::debug!(provider = provider.name(), "credential provider yielded nothing");
    }

    Err(CredentialError::configuration(
      "no credential source available",
    ))
  }
}
