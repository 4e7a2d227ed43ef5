//! GitHub credentials.
//!
//! The auth file holds a single line `<github_user>:<github_api_token>`.
//! Only the file is read; creating and protecting it is up to the user.

use anyhow::{bail, Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

// Keeps the token out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read credentials from `path`, expanding a leading `~/`.
    pub fn load(path: &Path) -> Result<Self> {
        let path = expand_home(path);
        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read auth file {}. Create it with the single line \
                 `<github_user>:<github_api_key>` and restrict its permissions.",
                path.display()
            )
        })?;
        Self::parse(&content).with_context(|| format!("Invalid auth file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let line = content.trim();
        let Some((username, token)) = line.split_once(':') else {
            bail!("expected `<user>:<token>`");
        };
        let (username, token) = (username.trim(), token.trim());
        if username.is_empty() || token.is_empty() {
            bail!("user and token must both be non-empty");
        }
        Ok(Self {
            username: username.to_string(),
            token: token.to_string(),
        })
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_whitespace() {
        let creds = Credentials::parse("  octo:ghp_secret \n").unwrap();
        assert_eq!(creds.username, "octo");
        assert_eq!(creds.token, "ghp_secret");
    }

    #[test]
    fn test_parse_rejects_missing_separator() {
        assert!(Credentials::parse("octo").is_err());
        assert!(Credentials::parse(":token").is_err());
        assert!(Credentials::parse("octo:").is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let creds = Credentials::parse("octo:ghp_secret").unwrap();
        let shown = format!("{creds:?}");
        assert!(shown.contains("octo"));
        assert!(!shown.contains("ghp_secret"));
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("API_AUTH");
        std::fs::write(&path, "octo:ghp_secret\n").unwrap();
        let creds = Credentials::load(&path).unwrap();
        assert_eq!(creds.username, "octo");
    }

    #[test]
    fn test_expand_home_leaves_absolute_paths() {
        let p = Path::new("/etc/gitbored/API_AUTH");
        assert_eq!(expand_home(p), p.to_path_buf());
    }
}
