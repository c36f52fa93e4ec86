//! Filesystem-backed [`System`].

use anyhow::Context;
use declarative::{
    DestStateEntry, Error, LazyContents, LazyLinkname, Permissions, Result, System,
};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::config::Config;
use crate::runner::ScriptRunner;
use crate::state::PersistentState;

/// Applies changes to the real filesystem.
///
/// Scripts run through a [`ScriptRunner`]; bucket reads and writes go to a
/// [`PersistentState`]. Modes are written exactly as requested, so targets
/// should already carry the umask (see [`Config::mask`]).
#[derive(Debug)]
pub struct RealSystem {
    state: PersistentState,
    runner: ScriptRunner,
}

impl RealSystem {
    /// Build a system from configuration, opening the state file it names
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let state = PersistentState::open(config.state_path()?)?;

        let mut runner = ScriptRunner::new().with_working_dir(config.script_working_dir()?);
        if let Some(interpreter) = &config.interpreter {
            runner = runner.with_interpreter(interpreter.clone());
        }

        Ok(Self::new(state, runner))
    }

    pub fn new(state: PersistentState, runner: ScriptRunner) -> Self {
        Self { state, runner }
    }

    pub fn state(&self) -> &PersistentState {
        &self.state
    }
}

impl System for RealSystem {
    fn read_dest_state(&self, path: &Path) -> Result<DestStateEntry> {
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(DestStateEntry::absent(path));
            }
            Err(e) => return Err(Error::io("stat", path, e)),
        };

        let file_type = metadata.file_type();
        if file_type.is_dir() {
            Ok(DestStateEntry::dir(path, mode(&metadata)))
        } else if file_type.is_symlink() {
            let target = path.to_path_buf();
            let linkname = LazyLinkname::new(move || {
                let link = fs::read_link(&target)
                    .with_context(|| format!("Failed to read link {}", target.display()))?;
                link.into_os_string()
                    .into_string()
                    .map_err(|raw| anyhow::anyhow!("link target is not UTF-8: {raw:?}"))
            });
            Ok(DestStateEntry::symlink(path, linkname))
        } else if file_type.is_file() {
            let target = path.to_path_buf();
            let contents = LazyContents::new(move || {
                fs::read(&target).with_context(|| format!("Failed to read {}", target.display()))
            });
            Ok(DestStateEntry::file(path, mode(&metadata), contents))
        } else {
            Err(Error::io(
                "stat",
                path,
                io::Error::new(io::ErrorKind::Unsupported, "unsupported file type"),
            ))
        }
    }

    /// Write to a temp file beside `path` and rename it into place, so a
    /// read-only destination can still be replaced and readers never see a
    /// partial file.
    fn write_file(&self, path: &Path, contents: &[u8], perm: Permissions) -> Result<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut file = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| Error::io("write", path, e))?;
        file.write_all(contents)
            .map_err(|e| Error::io("write", path, e))?;
        set_mode(file.path(), perm).map_err(|e| Error::io("chmod", path, e))?;
        file.persist(path)
            .map_err(|e| Error::io("write", path, e.error))?;
        Ok(())
    }

    fn chmod(&self, path: &Path, perm: Permissions) -> Result<()> {
        set_mode(path, perm).map_err(|e| Error::io("chmod", path, e))
    }

    fn mkdir(&self, path: &Path, perm: Permissions) -> Result<()> {
        create_dir(path, perm).map_err(|e| Error::io("mkdir", path, e))
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        let result = match fs::symlink_metadata(path) {
            Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path),
            Ok(_) => fs::remove_file(path),
            Err(e) => Err(e),
        };
        match result {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(Error::io("remove", path, e)),
            _ => Ok(()),
        }
    }

    fn write_symlink(&self, linkname: &str, path: &Path) -> Result<()> {
        symlink(linkname, path).map_err(|e| Error::io("symlink", path, e))
    }

    fn run_script(&self, name: &str, contents: &[u8]) -> Result<()> {
        log::info!("Running script {name}");
        self.runner.run(name, contents).map_err(|e| Error::Script {
            name: name.to_string(),
            reason: format!("{e:#}"),
        })
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        self.state
            .get(bucket, key)
            .map(|value| value.map(String::into_bytes))
            .map_err(|e| Error::State(format!("{e:#}")))
    }

    fn set(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()> {
        let value = std::str::from_utf8(value)
            .map_err(|e| Error::State(format!("value for {bucket}/{key} is not UTF-8: {e}")))?;
        self.state
            .set(bucket, key, value)
            .map_err(|e| Error::State(format!("{e:#}")))
    }
}

#[cfg(unix)]
fn mode(metadata: &fs::Metadata) -> Permissions {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode(metadata: &fs::Metadata) -> Permissions {
    if metadata.permissions().readonly() {
        0o555
    } else {
        0o777
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, perm: Permissions) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(perm))
}

#[cfg(not(unix))]
fn set_mode(path: &Path, perm: Permissions) -> io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(perm & 0o200 == 0);
    fs::set_permissions(path, permissions)
}

#[cfg(unix)]
fn create_dir(path: &Path, perm: Permissions) -> io::Result<()> {
    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
    fs::DirBuilder::new().mode(perm).create(path)?;
    // DirBuilder's mode is filtered by the process umask
    fs::set_permissions(path, fs::Permissions::from_mode(perm))
}

#[cfg(not(unix))]
fn create_dir(path: &Path, _perm: Permissions) -> io::Result<()> {
    fs::create_dir(path)
}

#[cfg(unix)]
fn symlink(linkname: &str, path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(linkname, path)
}

#[cfg(not(unix))]
fn symlink(_linkname: &str, _path: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are only supported on unix",
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use declarative::{
        ApplyResult, EntryKind, SCRIPT_ONCE_STATE_BUCKET, ScriptOnceState, TargetStateEntry,
        script_once_key, sha256,
    };
    use tempfile::TempDir;

    fn system(temp: &TempDir) -> RealSystem {
        let state = PersistentState::open(temp.path().join("state").join("state.toml")).unwrap();
        let runner = ScriptRunner::new()
            .with_interpreter("/bin/sh")
            .with_working_dir(temp.path());
        RealSystem::new(state, runner)
    }

    /// Apply `target` to `path`, then check it converged
    fn converge(sys: &RealSystem, target: &TargetStateEntry, path: &Path) -> ApplyResult {
        let dest = sys.read_dest_state(path).unwrap();
        let result = target.apply(sys, &dest).unwrap();
        let after = sys.read_dest_state(path).unwrap();
        assert!(target.equal(&after).unwrap(), "{path:?} did not converge");
        result
    }

    #[test]
    fn test_read_dest_state_kinds() {
        let temp = TempDir::new().unwrap();
        let sys = system(&temp);
        let root = temp.path();

        fs::create_dir(root.join("dir")).unwrap();
        fs::write(root.join("file"), "hello").unwrap();
        std::os::unix::fs::symlink("file", root.join("link")).unwrap();

        assert_eq!(
            sys.read_dest_state(&root.join("missing")).unwrap().kind(),
            EntryKind::Absent
        );
        assert_eq!(
            sys.read_dest_state(&root.join("dir")).unwrap().kind(),
            EntryKind::Dir
        );

        let file = sys.read_dest_state(&root.join("file")).unwrap();
        assert_eq!(file.kind(), EntryKind::File);
        assert_eq!(file.contents_sha256().unwrap(), Some(sha256(b"hello")));

        let link = sys.read_dest_state(&root.join("link")).unwrap();
        assert_eq!(link.kind(), EntryKind::Symlink);
        assert_eq!(link.linkname().unwrap(), Some("file"));
    }

    #[test]
    fn test_file_contents_are_lazy() {
        let temp = TempDir::new().unwrap();
        let sys = system(&temp);
        let path = temp.path().join("file");
        fs::write(&path, "before").unwrap();

        let dest = sys.read_dest_state(&path).unwrap();
        fs::write(&path, "after").unwrap();
        assert_eq!(dest.contents_sha256().unwrap(), Some(sha256(b"after")));
    }

    #[test]
    fn test_converge_file_from_each_kind() {
        let temp = TempDir::new().unwrap();
        let sys = system(&temp);
        let target = TargetStateEntry::file(LazyContents::from_bytes("content\n"), 0o644);

        let absent = temp.path().join("absent");
        assert_eq!(converge(&sys, &target, &absent), ApplyResult::Created);

        let dir = temp.path().join("dir");
        fs::create_dir_all(dir.join("child")).unwrap();
        assert_eq!(converge(&sys, &target, &dir), ApplyResult::Modified);

        let link = temp.path().join("link");
        std::os::unix::fs::symlink("absent", &link).unwrap();
        assert_eq!(converge(&sys, &target, &link), ApplyResult::Modified);
        assert!(!fs::symlink_metadata(&link).unwrap().file_type().is_symlink());

        assert_eq!(converge(&sys, &target, &absent), ApplyResult::NoChange);
    }

    #[test]
    fn test_file_permissions_only() {
        let temp = TempDir::new().unwrap();
        let sys = system(&temp);
        let path = temp.path().join("tool");
        fs::write(&path, "#!/bin/sh\n").unwrap();
        set_mode(&path, 0o644).unwrap();

        let target = TargetStateEntry::file(LazyContents::from_bytes("#!/bin/sh\n"), 0o755);
        assert_eq!(
            converge(&sys, &target, &path),
            ApplyResult::PermissionsChanged
        );
        assert_eq!(mode(&fs::metadata(&path).unwrap()), 0o755);
    }

    #[test]
    fn test_group_writable_modes_settle() {
        let temp = TempDir::new().unwrap();
        let sys = system(&temp);
        let path = temp.path().join("shared");
        let target = TargetStateEntry::file(LazyContents::from_bytes("x"), 0o775);

        assert_eq!(converge(&sys, &target, &path), ApplyResult::Created);
        for _ in 0..2 {
            assert_eq!(converge(&sys, &target, &path), ApplyResult::NoChange);
        }
        assert_eq!(mode(&fs::metadata(&path).unwrap()), 0o775);

        let dir_path = temp.path().join("group");
        let dir = TargetStateEntry::dir(0o777, false);
        assert_eq!(converge(&sys, &dir, &dir_path), ApplyResult::Created);
        assert_eq!(converge(&sys, &dir, &dir_path), ApplyResult::NoChange);
    }

    #[test]
    fn test_masked_target_settles() {
        let temp = TempDir::new().unwrap();
        let sys = system(&temp);
        let config = Config::default();
        let path = temp.path().join("masked");
        let target = TargetStateEntry::file(LazyContents::from_bytes("x"), config.mask(0o666));

        assert_eq!(converge(&sys, &target, &path), ApplyResult::Created);
        assert_eq!(converge(&sys, &target, &path), ApplyResult::NoChange);
        assert_eq!(mode(&fs::metadata(&path).unwrap()), 0o644);
    }

    #[test]
    fn test_read_only_file_is_replaced() {
        let temp = TempDir::new().unwrap();
        let sys = system(&temp);
        let path = temp.path().join("netrc");

        let old = TargetStateEntry::file(LazyContents::from_bytes("old\n"), 0o444);
        assert_eq!(converge(&sys, &old, &path), ApplyResult::Created);

        let new = TargetStateEntry::file(LazyContents::from_bytes("new\n"), 0o444);
        assert_eq!(converge(&sys, &new, &path), ApplyResult::Modified);
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
        assert_eq!(mode(&fs::metadata(&path).unwrap()), 0o444);
    }

    #[test]
    fn test_write_file_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let sys = system(&temp);
        let dir = temp.path().join("out");
        fs::create_dir(&dir).unwrap();

        sys.write_file(&dir.join("a"), b"1", 0o600).unwrap();
        sys.write_file(&dir.join("a"), b"2", 0o600).unwrap();

        let names: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn test_converge_dir_and_symlink() {
        let temp = TempDir::new().unwrap();
        let sys = system(&temp);

        let dir_path = temp.path().join("config");
        fs::write(&dir_path, "was a file").unwrap();
        let dir = TargetStateEntry::dir(0o700, false);
        assert_eq!(converge(&sys, &dir, &dir_path), ApplyResult::Modified);
        assert_eq!(converge(&sys, &dir, &dir_path), ApplyResult::NoChange);

        let link_path = temp.path().join("link");
        std::os::unix::fs::symlink("old", &link_path).unwrap();
        let link = TargetStateEntry::symlink(LazyLinkname::from_string("config"));
        assert_eq!(converge(&sys, &link, &link_path), ApplyResult::Modified);
        assert_eq!(fs::read_link(&link_path).unwrap(), Path::new("config"));
    }

    #[test]
    fn test_converge_absent_removes_tree() {
        let temp = TempDir::new().unwrap();
        let sys = system(&temp);
        let path = temp.path().join("tree");
        fs::create_dir_all(path.join("a").join("b")).unwrap();
        fs::write(path.join("a").join("b").join("f"), "x").unwrap();

        assert_eq!(
            converge(&sys, &TargetStateEntry::Absent, &path),
            ApplyResult::Removed
        );
        assert!(!path.exists());
    }

    #[test]
    fn test_remove_all_missing_is_ok() {
        let temp = TempDir::new().unwrap();
        let sys = system(&temp);
        sys.remove_all(&temp.path().join("nothing")).unwrap();
    }

    #[test]
    fn test_mkdir_existing_fails() {
        let temp = TempDir::new().unwrap();
        let sys = system(&temp);
        let err = sys.mkdir(temp.path(), 0o755).unwrap_err();
        assert!(matches!(err, Error::Io { op: "mkdir", .. }));
    }

    #[test]
    fn test_once_script_runs_once() {
        let temp = TempDir::new().unwrap();
        let sys = system(&temp);
        let body = "echo run >> runs.txt\n";
        let script = TargetStateEntry::script("install.sh", LazyContents::from_bytes(body), true);
        let dest = DestStateEntry::absent(temp.path().join("install.sh"));

        assert_eq!(script.apply(&sys, &dest).unwrap(), ApplyResult::Ran);
        assert!(matches!(
            script.apply(&sys, &dest).unwrap(),
            ApplyResult::Skipped { .. }
        ));

        let runs = fs::read_to_string(temp.path().join("runs.txt")).unwrap();
        assert_eq!(runs.lines().count(), 1);

        let key = script_once_key("install.sh", &sha256(body.as_bytes()));
        let value = sys.get(SCRIPT_ONCE_STATE_BUCKET, &key).unwrap().unwrap();
        let record = ScriptOnceState::from_json(&value).unwrap();
        assert_eq!(record.name, "install.sh");

        // The ledger survives a fresh system on the same state file
        let reopened = system(&temp);
        assert!(matches!(
            script.apply(&reopened, &dest).unwrap(),
            ApplyResult::Skipped { .. }
        ));
    }

    #[test]
    fn test_once_script_seen_by_system_opened_earlier() {
        let temp = TempDir::new().unwrap();
        let first = system(&temp);
        let second = system(&temp);
        let body = LazyContents::from_bytes("echo x >> init.txt\n");
        let script = TargetStateEntry::script("init.sh", body, true);
        let dest = DestStateEntry::absent(temp.path().join("init.sh"));

        assert_eq!(script.apply(&first, &dest).unwrap(), ApplyResult::Ran);
        assert!(matches!(
            script.apply(&second, &dest).unwrap(),
            ApplyResult::Skipped { .. }
        ));
        let runs = fs::read_to_string(temp.path().join("init.txt")).unwrap();
        assert_eq!(runs.lines().count(), 1);
    }

    #[test]
    fn test_failing_script_is_not_recorded() {
        let temp = TempDir::new().unwrap();
        let sys = system(&temp);
        let script = TargetStateEntry::script("bad.sh", LazyContents::from_bytes("exit 1\n"), true);
        let dest = DestStateEntry::absent(temp.path().join("bad.sh"));

        let err = script.apply(&sys, &dest).unwrap_err();
        assert!(matches!(err, Error::Script { ref name, .. } if name == "bad.sh"));
        assert!(sys.state().keys(SCRIPT_ONCE_STATE_BUCKET).unwrap().is_empty());
    }

    #[test]
    fn test_from_config() {
        let temp = TempDir::new().unwrap();
        let config = Config {
            state_file: Some(temp.path().join("s.toml").to_string_lossy().into_owned()),
            script_dir: Some(temp.path().to_string_lossy().into_owned()),
            interpreter: Some("/bin/sh".to_string()),
            umask: 0o077,
        };
        let sys = RealSystem::from_config(&config).unwrap();
        sys.set("b", "k", b"v").unwrap();
        assert!(temp.path().join("s.toml").exists());

        sys.run_script("where.sh", b"pwd > where.txt\n").unwrap();
        assert!(temp.path().join("where.txt").exists());
    }
}
