//! Build environment snapshot
//!
//! The orchestrator never reads process environment variables directly; it
//! receives a [`BuildEnv`] captured once at startup.

use std::env;

/// Default parallelism when the processor count cannot be determined
const DEFAULT_JOBS: usize = 4;

/// Environment-derived inputs to a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEnv {
    /// Running under CI (`CI`): build failures become fatal
    pub ci: bool,
    /// Architecture override flags (`ARCHFLAGS`, e.g. `-arch arm64`)
    pub arch_flags: Option<String>,
    /// Running from an MSYS shell (`MSYSTEM`): script paths need POSIX form
    pub msys: bool,
    /// Available processors, used for `make -j`
    pub jobs: usize,
}

impl Default for BuildEnv {
    fn default() -> Self {
        Self {
            ci: false,
            arch_flags: None,
            msys: false,
            jobs: DEFAULT_JOBS,
        }
    }
}

impl BuildEnv {
    /// Capture the current process environment
    pub fn from_env() -> Self {
        let jobs = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(DEFAULT_JOBS);
        Self::from_lookup(|key| env::var(key).ok(), jobs)
    }

    /// Build a snapshot from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F, jobs: usize) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let arch_flags = lookup("ARCHFLAGS")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self {
            ci: lookup("CI").is_some_and(|v| is_truthy(&v)),
            arch_flags,
            msys: lookup("MSYSTEM").is_some_and(|v| !v.trim().is_empty()),
            jobs: jobs.max(1),
        }
    }

    /// First architecture named by `-arch <name>` in the override flags
    pub fn requested_arch(&self) -> Option<&str> {
        let flags = self.arch_flags.as_deref()?;
        let mut words = flags.split_whitespace();
        while let Some(word) = words.next() {
            if word == "-arch" {
                return words.next();
            }
        }
        None
    }
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(vars: &[(&str, &str)]) -> BuildEnv {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BuildEnv::from_lookup(|key| map.get(key).cloned(), 8)
    }

    #[test]
    fn test_ci_flag() {
        assert!(env_of(&[("CI", "true")]).ci);
        assert!(env_of(&[("CI", "1")]).ci);
        assert!(!env_of(&[("CI", "false")]).ci);
        assert!(!env_of(&[("CI", "0")]).ci);
        assert!(!env_of(&[("CI", "")]).ci);
        assert!(!env_of(&[]).ci);
    }

    #[test]
    fn test_requested_arch() {
        let env = env_of(&[("ARCHFLAGS", "-arch arm64")]);
        assert_eq!(env.requested_arch(), Some("arm64"));

        let env = env_of(&[("ARCHFLAGS", "-arch x86_64 -arch arm64")]);
        assert_eq!(env.requested_arch(), Some("x86_64"));

        let env = env_of(&[("ARCHFLAGS", "  ")]);
        assert_eq!(env.arch_flags, None);
        assert_eq!(env.requested_arch(), None);
    }

    #[test]
    fn test_msys_and_jobs() {
        let env = env_of(&[("MSYSTEM", "MINGW64")]);
        assert!(env.msys);
        assert_eq!(env.jobs, 8);

        let env = BuildEnv::from_lookup(|_| None, 0);
        assert_eq!(env.jobs, 1);
        assert!(!env.msys);
    }
}
