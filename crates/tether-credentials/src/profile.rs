//! Shared credentials file parsing.
//!
//! The file is INI-shaped:
//!
//! ```text
//! [default]
//! aws_access_key_id = AKID...
//! aws_secret_access_key = ...
//!
//! [profile deploy]
//! aws_access_key_id = ...
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Profiles read from a shared credentials file, keyed by profile name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSet {
  profiles: HashMap<String, HashMap<String, String>>,
}

impl ProfileSet {
  pub fn parse(contents: &str) -> Self {
    let mut profiles: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current: Option<String> = None;

    for line in contents.lines() {
      let line = line.trim();
      if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
        continue;
      }

      if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
        let header = header.trim();
        let name = header.strip_prefix("profile ").unwrap_or(header).trim();
        profiles.entry(name.to_string()).or_default();
        current = Some(name.to_string());
        continue;
      }

      // Lines outside any section are ignored.
      let (Some(profile), Some((key, value))) = (&current, line.split_once('=')) else {
        continue;
      };

      profiles
        .entry(profile.clone())
        .or_default()
        .insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    Self { profiles }
  }

  pub fn get(&self, profile: &str, key: &str) -> Option<&str> {
    self
      .profiles
      .get(profile)
      .and_then(|p| p.get(key))
      .map(String::as_str)
      .filter(|v| !v.is_empty())
  }

  pub fn contains(&self, profile: &str) -> bool {
    self.profiles.contains_key(profile)
  }
}

/// Expand a leading `~` against `home`.
pub fn expand_home(path: &str, home: Option<&Path>) -> PathBuf {
  match (path.strip_prefix('~'), home) {
    (Some(""), Some(home)) => home.to_path_buf(),
    (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
    _ => PathBuf::from(path),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const FILE: &str = r#"
# comment
[default]
aws_access_key_id = AKIDDEFAULT
aws_secret_access_key = default-secret

[profile deploy]
AWS_ACCESS_KEY_ID=AKIDDEPLOY
aws_secret_access_key = deploy-secret
aws_session_token = deploy-token

[empty]
aws_access_key_id =
"#;

  #[test]
  fn test_parse_profiles() {
    let set = ProfileSet::parse(FILE);

    assert_eq!(set.get("default", "aws_access_key_id"), Some("AKIDDEFAULT"));
    assert_eq!(set.get("deploy", "aws_access_key_id"), Some("AKIDDEPLOY"));
    assert_eq!(set.get("deploy", "aws_session_token"), Some("deploy-token"));
    assert!(set.contains("empty"));
    assert_eq!(set.get("empty", "aws_access_key_id"), None);
    assert!(!set.contains("missing"));
  }

  #[test]
  fn test_expand_home() {
    let home = Path::new("/home/op");

    assert_eq!(
      expand_home("~/.aws/credentials", Some(home)),
      PathBuf::from("/home/op/.aws/credentials")
    );
    assert_eq!(expand_home("~", Some(home)), PathBuf::from("/home/op"));
    assert_eq!(
      expand_home("/etc/aws/credentials", Some(home)),
      PathBuf::from("/etc/aws/credentials")
    );
    assert_eq!(expand_home("~/x", None), PathBuf::from("~/x"));
  }
}
