use std::collections::HashMap;
use std::env as stdenv;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Mutable, user-level view of the process environment used by the interpreter.
///
/// The environment contains:
/// - `vars`: the variables `setenv`/`getenv`/`unset` work on and that
///   external commands receive.
/// - `current_dir`: the working directory every relative path is resolved
///   against.
///
/// Built-ins never touch the process-global working directory or variables;
/// this context is the only state they mutate.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        Self { vars, current_dir }
    }

    /// An environment with no variables, rooted at `dir`.
    pub fn isolated(dir: impl Into<PathBuf>) -> Self {
        Self {
            vars: HashMap::new(),
            current_dir: dir.into(),
        }
    }

    /// Get the value of an environment variable.
    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set or override an environment variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    pub fn remove_var(&mut self, key: &str) {
        self.vars.remove(key);
    }

    /// Resolve `path` against the current directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.current_dir.join(path)
    }
}

/// Handle to an [`Environment`] shared by the foreground loop and every
/// background task.
///
/// Cloning the handle shares the environment. A panic inside a built-in does
/// not lock everyone else out: a poisoned lock is recovered.
#[derive(Debug, Clone, Default)]
pub struct SharedEnvironment(Arc<Mutex<Environment>>);

impl SharedEnvironment {
    pub fn new(env: Environment) -> Self {
        Self(Arc::new(Mutex::new(env)))
    }

    pub fn lock(&self) -> MutexGuard<'_, Environment> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the environment as it is right now.
    pub fn snapshot(&self) -> Environment {
        self.lock().clone()
    }

    /// Applies the changes that turned `before` into `after`. Entries nobody
    /// touched keep whatever value other tasks gave them meanwhile.
    pub fn commit(&self, before: &Environment, after: Environment) {
        let mut env = self.lock();
        if after.current_dir != before.current_dir {
            env.current_dir = after.current_dir;
        }
        for key in before.vars.keys() {
            if !after.vars.contains_key(key) {
                env.vars.remove(key);
            }
        }
        for (key, value) in after.vars {
            if before.vars.get(&key) != Some(&value) {
                env.vars.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_applies_only_what_changed() {
        let shared = SharedEnvironment::new(Environment::isolated("/start"));
        shared.lock().set_var("KEEP", "1");
        shared.lock().set_var("DROP", "1");

        let before = shared.snapshot();
        let mut after = before.clone();
        after.current_dir = PathBuf::from("/moved");
        after.set_var("NEW", "2");
        after.remove_var("DROP");

        // Another task changes a variable the first one never touched.
        shared.lock().set_var("KEEP", "changed elsewhere");

        shared.commit(&before, after);
        let env = shared.lock();
        assert_eq!(env.current_dir, PathBuf::from("/moved"));
        assert_eq!(env.get_var("NEW"), Some("2"));
        assert_eq!(env.get_var("DROP"), None);
        assert_eq!(env.get_var("KEEP"), Some("changed elsewhere"));
    }

    #[test]
    fn test_env_set_get_and_remove_var() {
        let mut env = Environment::isolated("/");

        // initially absent
        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);

        env.set_var("KEY", "VALUE");
        assert_eq!(env.get_var("KEY"), Some("VALUE"));

        env.remove_var("KEY");
        assert_eq!(env.get_var("KEY"), None);
    }

    #[test]
    fn test_env_reads_from_process_env() {
        let env = Environment::new();
        assert!(env.get_var("PATH").is_some());
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let env = Environment::isolated("/tmp/work");
        assert_eq!(env.resolve("a.txt"), PathBuf::from("/tmp/work/a.txt"));
        assert_eq!(env.resolve("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn test_shared_environment_is_shared_between_clones() {
        let shared = SharedEnvironment::new(Environment::isolated("/"));
        let other = shared.clone();
        other.lock().set_var("FOO", "bar");
        assert_eq!(shared.lock().get_var("FOO"), Some("bar"));

        let snapshot = shared.snapshot();
        shared.lock().remove_var("FOO");
        assert_eq!(snapshot.get_var("FOO"), Some("bar"));
    }
}
