use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use cfrm_document::VerifyOptions;

/// Settings read from `--config`. Every key is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub output: OutputConfig,
    pub verify: VerifyConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Pretty-print JSON output.
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    pub exhaustive_limit: usize,
    pub sampled_permutations: usize,
    pub split_deliveries: bool,
    pub seed: u64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        let options = VerifyOptions::default();
        Self {
            exhaustive_limit: options.exhaustive_limit,
            sampled_permutations: options.sampled_permutations,
            split_deliveries: options.split_deliveries,
            seed: options.seed,
        }
    }
}

impl CliConfig {
    /// Load from `path`, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn verify_options(&self) -> VerifyOptions {
        VerifyOptions {
            exhaustive_limit: self.verify.exhaustive_limit,
            sampled_permutations: self.verify.sampled_permutations,
            split_deliveries: self.verify.split_deliveries,
            seed: self.verify.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config() {
        let c = CliConfig::default();
        assert!(c.output.pretty);
        assert_eq!(c.verify.exhaustive_limit, 7);
        assert_eq!(c.verify.sampled_permutations, 256);
        assert!(c.verify.split_deliveries);
        assert_eq!(c.verify_options(), VerifyOptions::default());
    }

    #[test]
    fn no_path_gives_defaults() {
        assert_eq!(CliConfig::load(None).unwrap(), CliConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[output]\npretty = false\n\n[verify]\nexhaustive_limit = 4").unwrap();

        let c = CliConfig::load(Some(file.path())).unwrap();
        assert!(!c.output.pretty);
        assert_eq!(c.verify.exhaustive_limit, 4);
        assert_eq!(c.verify.sampled_permutations, 256);
        assert!(c.verify.split_deliveries);
    }

    #[test]
    fn invalid_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[verify]\nexhaustive_limit = \"many\"").unwrap();
        let err = CliConfig::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().starts_with("parsing config"));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = CliConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().starts_with("reading config"));
    }
}
