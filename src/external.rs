use crate::command::{CommandFactory, ExecutableCommand, Invocation, Output};
use crate::interpreter::Factory;
use crate::lexer::Word;
use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::process::{ExitStatus, Stdio};

/// Command that is not a builtin.
pub struct ExternalCommand {
    name: String,
    args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(name: String, args: Vec<String>) -> Self {
        Self { name, args }
    }
}

impl CommandFactory for Factory<ExternalCommand> {
    /// Always matches: whatever no built-in claimed is handed to the loader,
    /// with quotes removed from its arguments.
    fn try_create(&self, name: &str, args: &[Word]) -> Option<Box<dyn ExecutableCommand>> {
        Some(Box::new(ExternalCommand::new(
            name.to_string(),
            args.iter().map(|w| w.text().to_string()).collect(),
        )))
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(self: Box<Self>, invocation: Invocation<'_>) -> Result<Output> {
        // A child can run for as long as it likes; it never holds the lock.
        let env = invocation.env.snapshot();
        let search_paths = env.get_var("PATH").unwrap_or_default();
        let program = find_command_path(
            OsStr::new(search_paths),
            &env.current_dir,
            Path::new(&self.name),
        )
        .ok_or_else(|| anyhow::anyhow!("command not found: {}", self.name))?;

        let stdin = match invocation.stdin {
            Some(stdin) => stdin.stdio(),
            None => Stdio::inherit(),
        };
        let stdout = if invocation.capture {
            Stdio::piped()
        } else {
            Stdio::inherit()
        };

        tracing::debug!(program = %program.display(), args = ?self.args, "spawning external command");
        let child = std::process::Command::new(&program)
            .args(&self.args)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(Stdio::inherit())
            .env_clear()
            .envs(&env.vars)
            .current_dir(&env.current_dir)
            .spawn()
            .with_context(|| format!("{}: failed to start", self.name))?;

        let output = child
            .wait_with_output()
            .with_context(|| format!("{}: failed to wait", self.name))?;
        if !output.status.success() {
            let code = match output.status.code() {
                Some(x) => x,
                None => terminated_by_signal(output.status),
            };
            anyhow::bail!("{}: exit status {}", self.name, code);
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect())
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it is a file.
/// - Relative with several components (`bin/sh`, `./foo`): resolved against
///   `current_dir`, returned if it is a file.
/// - Single path component (no separators): search each directory in `search_paths` (PATH)
///   and return the first match.
/// - Empty path: returns `None`.
pub fn find_command_path(search_paths: &OsStr, current_dir: &Path, path: &Path) -> Option<PathBuf> {
    if path.is_absolute() {
        return find_by_path(path);
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        (None, _) => None,
        (Some(Component::Normal(name)), None) => find_in_path(search_paths, name),
        _ => find_by_path(&current_dir.join(path)),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths).find_map(|dir| find_by_path(&dir.join(cmd)))
}

fn find_by_path(path: &Path) -> Option<PathBuf> {
    if path.is_file() { Some(path.to_path_buf()) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{Environment, SharedEnvironment};
    use std::fs::{self, File};

    #[cfg(unix)]
    fn osstr(s: &str) -> &OsStr {
        OsStr::new(s)
    }

    #[cfg(unix)]
    fn run(env: &SharedEnvironment, name: &str, args: &[&str], capture: bool) -> Result<Output> {
        let cmd = ExternalCommand::new(
            name.to_string(),
            args.iter().map(|s| s.to_string()).collect(),
        );
        Box::new(cmd).execute(Invocation { stdin: None, capture, env })
    }

    #[cfg(unix)]
    fn system_env(dir: &Path) -> SharedEnvironment {
        let mut env = Environment::isolated(dir);
        env.set_var("PATH", "/usr/bin:/bin");
        SharedEnvironment::new(env)
    }

    #[test]
    #[cfg(unix)]
    fn absolute_existing_true() {
        let path = Path::new("/bin/sh");
        let found = find_command_path(osstr("/bin"), Path::new("/"), path);
        assert_eq!(found.as_deref(), Some(path));
    }

    #[test]
    #[cfg(unix)]
    fn absolute_nonexisting() {
        let res = find_command_path(osstr("/bin"), Path::new("/"), Path::new("/bin/nonexisting"));
        assert!(res.is_none());
    }

    #[test]
    #[cfg(unix)]
    fn single_component_found_in_path() {
        let found = find_command_path(osstr("/nowhere:/bin"), Path::new("/"), Path::new("sh"))
            .expect("Expected to find 'sh' in /bin via PATH search");
        assert_eq!(found, PathBuf::from("/bin/sh"));
    }

    #[test]
    #[cfg(unix)]
    fn single_component_not_found_in_path() {
        let res = find_command_path(osstr("/bin"), Path::new("/"), Path::new("nonexisting"));
        assert!(res.is_none());
    }

    #[test]
    #[cfg(unix)]
    fn relative_paths_resolve_against_current_dir() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        fs::create_dir_all(tmp.path().join("bin")).expect("create bin dir");
        File::create(tmp.path().join("bin").join("tool")).expect("touch bin/tool");
        File::create(tmp.path().join("foo")).expect("touch foo");

        let found = find_command_path(osstr("/does/not/matter"), tmp.path(), Path::new("bin/tool"));
        assert_eq!(found, Some(tmp.path().join("bin/tool")));

        let found = find_command_path(osstr("/bin"), tmp.path(), Path::new("./foo"));
        assert_eq!(found, Some(tmp.path().join("./foo")));
    }

    #[test]
    #[cfg(unix)]
    fn empty_path_is_none() {
        let res = find_command_path(osstr("/bin"), Path::new("/"), Path::new(""));
        assert!(res.is_none(), "Empty path should not resolve to anything");
    }

    #[test]
    #[cfg(unix)]
    fn captured_output_becomes_lines() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let env = system_env(tmp.path());
        let out = run(&env, "sh", &["-c", "echo one; echo two"], true).unwrap();
        assert_eq!(out, vec!["one", "two"]);
    }

    #[test]
    #[cfg(unix)]
    fn child_sees_context_dir_and_vars() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let env = system_env(tmp.path());
        env.lock().set_var("MINISH_TEST_VAR", "visible");
        let out = run(&env, "sh", &["-c", "echo $MINISH_TEST_VAR; pwd -P"], true).unwrap();
        assert_eq!(out[0], "visible");
        assert_eq!(PathBuf::from(&out[1]), fs::canonicalize(tmp.path()).unwrap());
    }

    #[test]
    #[cfg(unix)]
    fn non_zero_exit_is_an_error() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let env = system_env(tmp.path());
        let err = run(&env, "sh", &["-c", "exit 3"], false).unwrap_err();
        assert_eq!(err.to_string(), "sh: exit status 3");
    }

    #[test]
    #[cfg(unix)]
    fn unknown_command_is_an_error() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let env = system_env(tmp.path());
        let err = run(&env, "definitely-not-a-command-xyz", &[], false).unwrap_err();
        assert!(err.to_string().contains("command not found"));
    }
}
