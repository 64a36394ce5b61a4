//! Per-invocation configuration merge.
//!
//! The process environment is captured once at startup and never mutated.
//! Each run layers the runtime override file, the job's defaults and the
//! caller's overrides on top of that snapshot to produce the mapping the
//! environment gate validates and the argument template binds against.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, trace};

use crate::jobs::job_descriptor::JobDescriptor;

pub type EnvMap = HashMap<String, String>;

#[derive(Debug, Error)]
pub enum EnvSourceError {
    #[error("cannot read override file {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed override file {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

/// Immutable base layers shared by every run in this process.
#[derive(Debug, Clone, Default)]
pub struct RunEnvironment {
    process: EnvMap,
    override_file: Option<PathBuf>,
}

impl RunEnvironment {
    #[must_use]
    pub const fn new(process: EnvMap, override_file: Option<PathBuf>) -> Self {
        Self {
            process,
            override_file,
        }
    }

    /// Snapshots the current process environment. Non-UTF-8 entries are dropped.
    #[must_use]
    pub fn from_process(override_file: Option<PathBuf>) -> Self {
        let process = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self::new(process, override_file)
    }

    #[must_use]
    pub fn override_file(&self) -> Option<&Path> {
        self.override_file.as_deref()
    }

    /// Builds the mapping for one invocation of `descriptor`.
    ///
    /// Priority, lowest first: process snapshot, override file, job defaults
    /// (only filling absent or empty keys), caller overrides.
    pub fn merge(
        &self,
        descriptor: &JobDescriptor,
        overrides: &EnvMap,
    ) -> Result<EnvMap, EnvSourceError> {
        let mut merged = self.process.clone();

        if let Some(path) = &self.override_file {
            match read_override_file(path)? {
                Some(values) => {
                    debug!(
                        "📄 Applying {} override(s) from {}",
                        values.len(),
                        path.display()
                    );
                    merged.extend(values);
                }
                None => debug!("📄 No override file at {}, skipping", path.display()),
            }
        }

        for (key, value) in descriptor.defaulted_env {
            let absent = merged.get(*key).is_none_or(|v| v.trim().is_empty());
            if absent {
                trace!("Defaulting {} for job '{}'", key, descriptor.name);
                merged.insert((*key).to_string(), (*value).to_string());
            }
        }

        merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

        Ok(merged)
    }
}

/// Reads `KEY=value` pairs from an override file.
///
/// Returns `Ok(None)` when the file does not exist.
pub fn read_override_file(path: &Path) -> Result<Option<Vec<(String, String)>>, EnvSourceError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(EnvSourceError::Unreadable {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    parse_override_contents(&contents)
        .map(Some)
        .map_err(|source| EnvSourceError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}

/// Parses dotenv-style assignments, also accepting `export -p` output.
///
/// Quoting, escapes and `${VAR}` substitution follow `dotenvy`. Exported names
/// without a value (`declare -x OLDPWD`) carry nothing and are skipped.
fn parse_override_contents(contents: &str) -> Result<Vec<(String, String)>, dotenvy::Error> {
    let normalized: String = contents
        .lines()
        .filter_map(strip_declare)
        .flat_map(|line| [line, "\n"])
        .collect();

    dotenvy::from_read_iter(normalized.as_bytes()).collect()
}

fn strip_declare(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let Some(rest) = trimmed
        .strip_prefix("declare -x ")
        .or_else(|| trimmed.strip_prefix("export "))
    else {
        return Some(line);
    };

    rest.contains('=').then_some(rest.trim_start())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{job_descriptor::JobArgument, run_lock::LockMode};
    use std::io::Write;

    const DESCRIPTOR: JobDescriptor = JobDescriptor {
        name: "sample",
        command: "sample_command",
        required_env: &["A"],
        defaulted_env: &[("REGION", "nyc3"), ("DAYS", "7")],
        lock_mode: LockMode::NonBlocking,
        arguments: &[JobArgument::Flag("--json")],
        requires_database: false,
        schedule: "* * * * *",
    };

    fn env(pairs: &[(&str, &str)]) -> EnvMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_parse_accepts_shell_export_forms() {
        let parsed = parse_override_contents(
            "# exported by init\n\nexport A=1\ndeclare -x B=\"two words\"\nC='3'\nD=\n",
        )
        .unwrap();

        assert_eq!(
            parsed,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "two words".to_string()),
                ("C".to_string(), "3".to_string()),
                ("D".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_parse_skips_exported_names_without_value() {
        let parsed =
            parse_override_contents("declare -x OLDPWD\ndeclare -x A=\"1\"\nexport HOSTTYPE\n")
                .unwrap();
        assert_eq!(parsed, vec![("A".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_parse_unescapes_double_quoted_values() {
        let parsed = parse_override_contents("declare -x B=\"say \\\"hi\\\"\"\n").unwrap();
        assert_eq!(parsed, vec![("B".to_string(), "say \"hi\"".to_string())]);
    }

    #[test]
    fn test_parse_keeps_equals_inside_value() {
        let parsed = parse_override_contents("DATABASE_URL=sqlite:////data/x.db?mode=rw").unwrap();
        assert_eq!(parsed[0].1, "sqlite:////data/x.db?mode=rw");
    }

    #[test]
    fn test_parse_rejects_line_without_assignment() {
        assert!(parse_override_contents("A=1\nnot an assignment\n").is_err());
    }

    #[test]
    fn test_missing_override_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_override_file(&dir.path().join(".env.runtime")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_merge_priority() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env.runtime");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "A=from_file").unwrap();
        writeln!(file, "DAYS=").unwrap();

        let base = RunEnvironment::new(env(&[("A", "from_process"), ("B", "b")]), Some(path));
        let merged = base
            .merge(&DESCRIPTOR, &env(&[("B", "from_override")]))
            .unwrap();

        assert_eq!(merged["A"], "from_file");
        assert_eq!(merged["B"], "from_override");
        assert_eq!(merged["REGION"], "nyc3");
        // Empty values count as absent for defaulting.
        assert_eq!(merged["DAYS"], "7");
    }

    #[test]
    fn test_defaults_do_not_replace_present_values() {
        let base = RunEnvironment::new(env(&[("REGION", "fra1")]), None);
        let merged = base.merge(&DESCRIPTOR, &EnvMap::new()).unwrap();
        assert_eq!(merged["REGION"], "fra1");
    }

    #[test]
    fn test_malformed_override_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env.runtime");
        fs::write(&path, "not an assignment\n").unwrap();

        let base = RunEnvironment::new(EnvMap::new(), Some(path));
        let err = base.merge(&DESCRIPTOR, &EnvMap::new()).unwrap_err();
        assert!(matches!(err, EnvSourceError::Malformed { .. }));
    }
}
