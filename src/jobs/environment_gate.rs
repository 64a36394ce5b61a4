use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required environment: {}", keys.join(", "))]
pub struct MissingEnvError {
    pub keys: Vec<String>,
}

/// Validates that every required key resolves to a non-empty value.
///
/// All missing keys are collected, in the order they are required, so an
/// operator can fix them in one pass. On success the mapping is handed back
/// untouched.
pub fn check(
    required_env: &[&str],
    env: HashMap<String, String>,
) -> Result<HashMap<String, String>, MissingEnvError> {
    let mut missing: Vec<String> = Vec::new();

    for key in required_env {
        let present = env.get(*key).is_some_and(|v| !v.trim().is_empty());
        if !present && !missing.iter().any(|m| m == key) {
            missing.push((*key).to_string());
        }
    }

    if missing.is_empty() {
        Ok(env)
    } else {
        Err(MissingEnvError { keys: missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 4] = ["DATABASE_URL", "SPACES_KEY", "SPACES_SECRET", "SPACES_BUCKET"];

    fn full_env() -> HashMap<String, String> {
        REQUIRED
            .iter()
            .map(|k| ((*k).to_string(), format!("{k}-value")))
            .collect()
    }

    #[test]
    fn test_passes_env_through_unchanged() {
        let mut env = full_env();
        env.insert("EXTRA".to_string(), "x".to_string());

        let checked = check(&REQUIRED, env.clone()).unwrap();
        assert_eq!(checked, env);
    }

    #[test]
    fn test_reports_exactly_the_removed_subset_in_order() {
        for mask in 0u32..(1 << REQUIRED.len()) {
            let mut env = full_env();
            let mut expected = Vec::new();
            for (index, key) in REQUIRED.iter().enumerate() {
                if mask & (1 << index) != 0 {
                    env.remove(*key);
                    expected.push((*key).to_string());
                }
            }

            match check(&REQUIRED, env) {
                Ok(_) => assert!(expected.is_empty(), "mask {mask:#b} should fail"),
                Err(e) => assert_eq!(e.keys, expected, "mask {mask:#b}"),
            }
        }
    }

    #[test]
    fn test_empty_and_blank_values_count_as_missing() {
        let mut env = full_env();
        env.insert("SPACES_KEY".to_string(), String::new());
        env.insert("SPACES_BUCKET".to_string(), "   ".to_string());

        let err = check(&REQUIRED, env).unwrap_err();
        assert_eq!(err.keys, vec!["SPACES_KEY", "SPACES_BUCKET"]);
        assert_eq!(
            err.to_string(),
            "missing required environment: SPACES_KEY, SPACES_BUCKET"
        );
    }

    #[test]
    fn test_duplicate_required_keys_are_reported_once() {
        let err = check(&["A", "B", "A"], HashMap::new()).unwrap_err();
        assert_eq!(err.keys, vec!["A", "B"]);
    }
}
