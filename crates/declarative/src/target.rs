//! Target state: what a path should hold
//!
//! A [`TargetStateEntry`] knows how to compare itself with a
//! [`DestStateEntry`] for the same path ([`TargetStateEntry::equal`]) and how
//! to make the destination match ([`TargetStateEntry::apply`]) with as few
//! mutations as possible. Neither recurses: applying a directory only
//! touches the directory itself.

use crate::dest::DestStateEntry;
use crate::error::{Error, Result};
use crate::lazy::{LazyContents, LazyLinkname, Sha256Sum, is_blank};
use crate::once::{SCRIPT_ONCE_STATE_BUCKET, ScriptOnceState, script_once_key};
use crate::system::System;
use crate::types::{ApplyResult, EntryKind, Permissions};
use chrono::Utc;

/// The desired state of one path
#[derive(Debug)]
pub enum TargetStateEntry {
    /// The path should not exist
    Absent,
    Dir(TargetStateDir),
    File(TargetStateFile),
    Symlink(TargetStateSymlink),
    Script(TargetStateScript),
}

/// A directory with the given mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetStateDir {
    pub perm: Permissions,
    /// Entries in the directory that are not in the target state should be
    /// removed. Enforced by whoever walks the tree, not by this entry.
    pub exact: bool,
}

/// A regular file with lazily loaded contents
#[derive(Debug)]
pub struct TargetStateFile {
    contents: LazyContents,
    perm: Permissions,
}

/// A symlink with a lazily resolved target
#[derive(Debug)]
pub struct TargetStateSymlink {
    linkname: LazyLinkname,
}

/// A script to run, optionally at most once per distinct contents
#[derive(Debug)]
pub struct TargetStateScript {
    name: String,
    contents: LazyContents,
    once: bool,
}

impl TargetStateEntry {
    pub fn dir(perm: Permissions, exact: bool) -> Self {
        Self::Dir(TargetStateDir { perm, exact })
    }

    pub fn file(contents: LazyContents, perm: Permissions) -> Self {
        Self::File(TargetStateFile::new(contents, perm))
    }

    pub fn symlink(linkname: LazyLinkname) -> Self {
        Self::Symlink(TargetStateSymlink::new(linkname))
    }

    pub fn script(name: impl Into<String>, contents: LazyContents, once: bool) -> Self {
        Self::Script(TargetStateScript::new(name, contents, once))
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Absent => EntryKind::Absent,
            Self::Dir(_) => EntryKind::Dir,
            Self::File(_) => EntryKind::File,
            Self::Symlink(_) => EntryKind::Symlink,
            Self::Script(_) => EntryKind::Script,
        }
    }

    /// Make `dest` match this entry.
    pub fn apply(&self, system: &dyn System, dest: &DestStateEntry) -> Result<ApplyResult> {
        match self {
            Self::Absent => apply_absent(system, dest),
            Self::Dir(dir) => dir.apply(system, dest),
            Self::File(file) => file.apply(system, dest),
            Self::Symlink(symlink) => symlink.apply(system, dest),
            Self::Script(script) => script.apply(system, dest),
        }
    }

    /// Whether `dest` already matches this entry.
    pub fn equal(&self, dest: &DestStateEntry) -> Result<bool> {
        match self {
            Self::Absent => Ok(dest.is_absent()),
            Self::Dir(dir) => Ok(dir.equal(dest)),
            Self::File(file) => file.equal(dest),
            Self::Symlink(symlink) => symlink.equal(dest),
            // Whether a script needs to run is not a property of the
            // destination; once-scripts are tracked in the state store.
            Self::Script(_) => Ok(true),
        }
    }

    /// Load whatever this entry loads lazily, surfacing errors early.
    pub fn evaluate(&self) -> Result<()> {
        match self {
            Self::Absent | Self::Dir(_) => Ok(()),
            Self::File(file) => file.contents.contents_sha256().map(drop),
            Self::Symlink(symlink) => symlink.linkname().map(drop),
            Self::Script(script) => script.contents.contents_sha256().map(drop),
        }
    }
}

fn apply_absent(system: &dyn System, dest: &DestStateEntry) -> Result<ApplyResult> {
    match dest {
        DestStateEntry::Absent { .. } => Ok(ApplyResult::NoChange),
        DestStateEntry::Dir { path, .. }
        | DestStateEntry::File { path, .. }
        | DestStateEntry::Symlink { path, .. } => {
            system.remove_all(path)?;
            Ok(ApplyResult::Removed)
        }
    }
}

/// `Created` when nothing was there before, `Modified` otherwise.
fn replaced(dest: &DestStateEntry) -> ApplyResult {
    if dest.is_absent() {
        ApplyResult::Created
    } else {
        ApplyResult::Modified
    }
}

impl TargetStateDir {
    pub fn equal(&self, dest: &DestStateEntry) -> bool {
        matches!(dest, DestStateEntry::Dir { perm, .. } if *perm == self.perm)
    }

    pub fn apply(&self, system: &dyn System, dest: &DestStateEntry) -> Result<ApplyResult> {
        match dest {
            DestStateEntry::Dir { perm, .. } if *perm == self.perm => Ok(ApplyResult::NoChange),
            DestStateEntry::Dir { path, .. } => {
                system.chmod(path, self.perm)?;
                Ok(ApplyResult::PermissionsChanged)
            }
            DestStateEntry::Absent { .. }
            | DestStateEntry::File { .. }
            | DestStateEntry::Symlink { .. } => {
                dest.remove(system)?;
                system.mkdir(dest.path(), self.perm)?;
                Ok(replaced(dest))
            }
        }
    }
}

impl TargetStateFile {
    pub fn new(contents: LazyContents, perm: Permissions) -> Self {
        Self { contents, perm }
    }

    pub fn perm(&self) -> Permissions {
        self.perm
    }

    pub fn contents(&self) -> Result<&[u8]> {
        self.contents.contents()
    }

    pub fn contents_sha256(&self) -> Result<Sha256Sum> {
        self.contents.contents_sha256()
    }

    /// Files are compared by mode and by content checksum, never byte by byte.
    pub fn equal(&self, dest: &DestStateEntry) -> Result<bool> {
        match dest {
            DestStateEntry::File { perm, contents, .. } => {
                if *perm != self.perm {
                    return Ok(false);
                }
                let dest_sha256 = contents.contents_sha256()?;
                Ok(dest_sha256 == self.contents_sha256()?)
            }
            DestStateEntry::Absent { .. }
            | DestStateEntry::Dir { .. }
            | DestStateEntry::Symlink { .. } => Ok(false),
        }
    }

    pub fn apply(&self, system: &dyn System, dest: &DestStateEntry) -> Result<ApplyResult> {
        match dest {
            DestStateEntry::File {
                path,
                perm,
                contents,
            } => {
                let dest_sha256 = contents.contents_sha256()?;
                if dest_sha256 == self.contents_sha256()? {
                    if *perm == self.perm {
                        return Ok(ApplyResult::NoChange);
                    }
                    system.chmod(path, self.perm)?;
                    return Ok(ApplyResult::PermissionsChanged);
                }
                // A regular file is overwritten in place.
            }
            DestStateEntry::Absent { .. }
            | DestStateEntry::Dir { .. }
            | DestStateEntry::Symlink { .. } => dest.remove(system)?,
        }
        system.write_file(dest.path(), self.contents()?, self.perm)?;
        Ok(replaced(dest))
    }
}

impl TargetStateSymlink {
    pub fn new(linkname: LazyLinkname) -> Self {
        Self { linkname }
    }

    pub fn linkname(&self) -> Result<&str> {
        self.linkname.linkname()
    }

    /// Link targets are compared as plain strings, without normalization.
    pub fn equal(&self, dest: &DestStateEntry) -> Result<bool> {
        match dest {
            DestStateEntry::Symlink { linkname, .. } => {
                let dest_linkname = linkname.linkname()?;
                Ok(dest_linkname == self.linkname()?)
            }
            DestStateEntry::Absent { .. }
            | DestStateEntry::Dir { .. }
            | DestStateEntry::File { .. } => Ok(false),
        }
    }

    pub fn apply(&self, system: &dyn System, dest: &DestStateEntry) -> Result<ApplyResult> {
        if let DestStateEntry::Symlink { linkname, .. } = dest
            && linkname.linkname()? == self.linkname()?
        {
            return Ok(ApplyResult::NoChange);
        }
        let linkname = self.linkname()?;
        dest.remove(system)?;
        system.write_symlink(linkname, dest.path())?;
        Ok(replaced(dest))
    }
}

impl TargetStateScript {
    pub fn new(name: impl Into<String>, contents: LazyContents, once: bool) -> Self {
        Self {
            name: name.into(),
            contents,
            once,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn once(&self) -> bool {
        self.once
    }

    pub fn contents(&self) -> Result<&[u8]> {
        self.contents.contents()
    }

    /// Run the script unless it is a once-script that has already run with
    /// these exact contents. The destination is not consulted.
    pub fn apply(&self, system: &dyn System, _dest: &DestStateEntry) -> Result<ApplyResult> {
        let mut pending_record = None;
        if self.once {
            let key = script_once_key(&self.name, &self.contents.contents_sha256()?);
            if system.get(SCRIPT_ONCE_STATE_BUCKET, &key)?.is_some() {
                log::debug!("script {} already ran, skipping", self.name);
                return Ok(ApplyResult::Skipped {
                    reason: "already run".to_string(),
                });
            }
            pending_record = Some((key, Utc::now()));
        }

        let contents = self.contents()?;
        if is_blank(contents) {
            log::debug!("script {} is empty, skipping", self.name);
            return Ok(ApplyResult::Skipped {
                reason: "empty script".to_string(),
            });
        }

        system.run_script(&self.name, contents)?;

        if let Some((key, executed_at)) = pending_record {
            let record = ScriptOnceState {
                name: self.name.clone(),
                executed_at,
            };
            record
                .to_json()
                .and_then(|value| system.set(SCRIPT_ONCE_STATE_BUCKET, &key, &value))
                .map_err(|source| Error::Ledger {
                    name: self.name.clone(),
                    source: Box::new(source),
                })?;
        }
        Ok(ApplyResult::Ran)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::lazy::sha256;
    use crate::memory::{Call, MemorySystem, Op};
    use std::path::Path;

    const HOME: &str = "/home/user";

    fn path(name: &str) -> std::path::PathBuf {
        Path::new(HOME).join(name)
    }

    fn dest(system: &MemorySystem, name: &str) -> DestStateEntry {
        system.read_dest_state(&path(name)).unwrap()
    }

    fn file(contents: &str, perm: Permissions) -> TargetStateEntry {
        TargetStateEntry::file(LazyContents::from_bytes(contents), perm)
    }

    fn symlink(linkname: &str) -> TargetStateEntry {
        TargetStateEntry::symlink(LazyLinkname::from_string(linkname))
    }

    fn script(name: &str, contents: &str, once: bool) -> TargetStateEntry {
        TargetStateEntry::script(name, LazyContents::from_bytes(contents), once)
    }

    /// Seed a destination of every kind at `name`.
    fn seeded_systems(name: &str) -> Vec<MemorySystem> {
        let absent = MemorySystem::new();
        let dir = MemorySystem::new();
        dir.add_dir(path(name), 0o700);
        dir.add_file(path(name).join("child"), 0o644, "x");
        let file = MemorySystem::new();
        file.add_file(path(name), 0o600, "old contents");
        let link = MemorySystem::new();
        link.add_symlink(path(name), "/old/target");
        vec![absent, dir, file, link]
    }

    /// Apply, then re-read the destination: it must now be equal and a
    /// second apply must not change anything.
    fn assert_converges(target: &TargetStateEntry) {
        for system in seeded_systems(".entry") {
            target.apply(&system, &dest(&system, ".entry")).unwrap();
            let after = dest(&system, ".entry");
            assert!(target.equal(&after).unwrap(), "{target:?} vs {after:?}");

            system.clear_calls();
            assert_eq!(target.apply(&system, &after).unwrap(), ApplyResult::NoChange);
            assert!(system.mutations().is_empty());
        }
    }

    #[test]
    fn test_every_kind_converges_from_every_kind() {
        assert_converges(&TargetStateEntry::Absent);
        assert_converges(&TargetStateEntry::dir(0o755, false));
        assert_converges(&file("export PATH=$HOME/bin:$PATH\n", 0o644));
        assert_converges(&symlink("/etc/passwd"));
    }

    #[test]
    fn test_equal_implies_no_mutation() {
        let targets = [
            TargetStateEntry::Absent,
            TargetStateEntry::dir(0o700, true),
            file("old contents", 0o600),
            symlink("/old/target"),
        ];
        for target in &targets {
            for system in seeded_systems(".entry") {
                let current = dest(&system, ".entry");
                if target.equal(&current).unwrap() {
                    system.clear_calls();
                    target.apply(&system, &current).unwrap();
                    assert!(system.mutations().is_empty(), "{target:?} mutated");
                }
            }
        }
    }

    #[test]
    fn test_absent() {
        let system = MemorySystem::new();
        system.add_file(path(".old"), 0o644, "stale");
        let target = TargetStateEntry::Absent;

        assert!(!target.equal(&dest(&system, ".old")).unwrap());
        let result = target.apply(&system, &dest(&system, ".old")).unwrap();
        assert_eq!(result, ApplyResult::Removed);
        assert_eq!(system.mutations(), vec![Call::RemoveAll(path(".old"))]);
        assert!(target.equal(&dest(&system, ".old")).unwrap());
        assert!(target.evaluate().is_ok());
    }

    #[test]
    fn test_dir_chmod_only() {
        let system = MemorySystem::new();
        system.add_dir(path(".ssh"), 0o755);
        system.add_file(path(".ssh/config"), 0o600, "Host *");
        let target = TargetStateEntry::dir(0o700, false);

        assert!(!target.equal(&dest(&system, ".ssh")).unwrap());
        let result = target.apply(&system, &dest(&system, ".ssh")).unwrap();
        assert_eq!(result, ApplyResult::PermissionsChanged);
        assert_eq!(
            system.mutations(),
            vec![Call::Chmod {
                path: path(".ssh"),
                perm: 0o700
            }]
        );
        assert!(system.exists(path(".ssh/config")));
    }

    #[test]
    fn test_dir_replaces_file() {
        let system = MemorySystem::new();
        system.add_file(path(".config"), 0o644, "not a dir");
        let target = TargetStateEntry::dir(0o755, false);

        let result = target.apply(&system, &dest(&system, ".config")).unwrap();
        assert_eq!(result, ApplyResult::Modified);
        assert_eq!(
            system.mutations(),
            vec![
                Call::RemoveAll(path(".config")),
                Call::Mkdir {
                    path: path(".config"),
                    perm: 0o755
                }
            ]
        );
    }

    #[test]
    fn test_dir_create_from_absent_does_not_remove() {
        let system = MemorySystem::new();
        let result = TargetStateEntry::dir(0o755, false)
            .apply(&system, &dest(&system, "bin"))
            .unwrap();
        assert_eq!(result, ApplyResult::Created);
        assert_eq!(
            system.mutations(),
            vec![Call::Mkdir {
                path: path("bin"),
                perm: 0o755
            }]
        );
    }

    #[test]
    fn test_dir_mkdir_failure_propagates() {
        let system = MemorySystem::new();
        system.fail_on(Op::Mkdir);
        let err = TargetStateEntry::dir(0o755, false)
            .apply(&system, &dest(&system, "bin"))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Filesystem);
    }

    #[test]
    fn test_dir_equal_ignores_children() {
        let system = MemorySystem::new();
        system.add_dir(path(".local"), 0o755);
        system.add_file(path(".local/extra"), 0o644, "not in target");
        assert!(
            TargetStateEntry::dir(0o755, true)
                .equal(&dest(&system, ".local"))
                .unwrap()
        );
    }

    #[test]
    fn test_file_permissions_only() {
        let system = MemorySystem::new();
        system.add_file(path(".netrc"), 0o644, "machine example.com");
        let target = file("machine example.com", 0o600);

        assert!(!target.equal(&dest(&system, ".netrc")).unwrap());
        let result = target.apply(&system, &dest(&system, ".netrc")).unwrap();
        assert_eq!(result, ApplyResult::PermissionsChanged);
        assert_eq!(
            system.mutations(),
            vec![Call::Chmod {
                path: path(".netrc"),
                perm: 0o600
            }]
        );
    }

    #[test]
    fn test_file_contents_differ() {
        let system = MemorySystem::new();
        system.add_file(path(".gitconfig"), 0o644, "[user]\n\tname = old\n");
        let target = file("[user]\n\tname = new\n", 0o644);

        let result = target.apply(&system, &dest(&system, ".gitconfig")).unwrap();
        assert_eq!(result, ApplyResult::Modified);
        assert_eq!(
            system.mutations(),
            vec![Call::WriteFile {
                path: path(".gitconfig"),
                contents: b"[user]\n\tname = new\n".to_vec(),
                perm: 0o644
            }]
        );
    }

    #[test]
    fn test_file_replaces_symlink() {
        let system = MemorySystem::new();
        system.add_symlink(path(".vimrc"), "dotfiles/vimrc");
        let target = file("set nocompatible", 0o644);

        target.apply(&system, &dest(&system, ".vimrc")).unwrap();
        assert_eq!(system.mutations()[0], Call::RemoveAll(path(".vimrc")));
        assert_eq!(
            system.contents(path(".vimrc")),
            Some(b"set nocompatible".to_vec())
        );
    }

    #[test]
    fn test_file_write_failure_leaves_destination_removed() {
        let system = MemorySystem::new();
        system.add_dir(path(".tmux.conf"), 0o755);
        system.fail_on(Op::WriteFile);
        let err = file("set -g mouse on", 0o644)
            .apply(&system, &dest(&system, ".tmux.conf"))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Filesystem);
        assert!(!system.exists(path(".tmux.conf")));
    }

    #[test]
    fn test_file_equal_uses_known_checksum() {
        let system = MemorySystem::new();
        let current = DestStateEntry::file(
            path(".profile"),
            0o644,
            LazyContents::new(|| panic!("destination contents should not be read"))
                .with_sha256(sha256(b"umask 022")),
        );
        let target = file("umask 022", 0o644);
        assert!(target.equal(&current).unwrap());
        assert_eq!(target.apply(&system, &current).unwrap(), ApplyResult::NoChange);
    }

    #[test]
    fn test_file_contents_error_surfaces() {
        let system = MemorySystem::new();
        let target = TargetStateEntry::file(
            LazyContents::new(|| anyhow::bail!("undefined variable .email")),
            0o644,
        );
        assert_eq!(
            target.evaluate().unwrap_err().category(),
            ErrorCategory::Contents
        );
        system.add_file(path(".gitconfig"), 0o644, "x");
        assert!(target.equal(&dest(&system, ".gitconfig")).is_err());
        assert!(target.apply(&system, &dest(&system, ".gitconfig")).is_err());
        assert!(system.mutations().is_empty());
    }

    #[test]
    fn test_symlink_retarget() {
        let system = MemorySystem::new();
        system.add_symlink(path(".passwd"), "/old/target");
        let target = symlink("/etc/passwd");

        assert!(!target.equal(&dest(&system, ".passwd")).unwrap());
        let result = target.apply(&system, &dest(&system, ".passwd")).unwrap();
        assert_eq!(result, ApplyResult::Modified);
        assert_eq!(
            system.mutations(),
            vec![
                Call::RemoveAll(path(".passwd")),
                Call::WriteSymlink {
                    linkname: "/etc/passwd".into(),
                    path: path(".passwd")
                }
            ]
        );
        assert!(target.equal(&dest(&system, ".passwd")).unwrap());
    }

    #[test]
    fn test_symlink_compares_strings_exactly() {
        let system = MemorySystem::new();
        system.add_symlink(path(".bashrc"), "/etc//bashrc");
        assert!(!symlink("/etc/bashrc").equal(&dest(&system, ".bashrc")).unwrap());
    }

    #[test]
    fn test_symlink_linkname_error_surfaces() {
        let system = MemorySystem::new();
        system.add_symlink(path(".bashrc"), "/etc/bashrc");
        let target =
            TargetStateEntry::symlink(LazyLinkname::new(|| anyhow::bail!("bad template")));
        assert!(target.evaluate().is_err());
        assert!(target.equal(&dest(&system, ".bashrc")).is_err());
        assert!(target.apply(&system, &dest(&system, ".bashrc")).is_err());
        assert!(system.mutations().is_empty());
    }

    #[test]
    fn test_script_equal_is_always_true() {
        let system = MemorySystem::new();
        system.add_file(path("run_setup.sh"), 0o755, "anything");
        let target = script("setup", "echo hi", false);
        assert!(target.equal(&dest(&system, "run_setup.sh")).unwrap());
        assert!(target.equal(&dest(&system, "missing")).unwrap());
    }

    #[test]
    fn test_script_runs_every_time_without_once() {
        let system = MemorySystem::new();
        let target = script("update", "brew update", false);
        for _ in 0..2 {
            let result = target.apply(&system, &dest(&system, "update")).unwrap();
            assert_eq!(result, ApplyResult::Ran);
        }
        assert_eq!(system.scripts_run(), vec!["update", "update"]);
        assert!(
            system
                .calls()
                .iter()
                .all(|call| !matches!(call, Call::Get { .. } | Call::Set { .. }))
        );
    }

    #[test]
    fn test_once_script_runs_once() {
        let system = MemorySystem::new();
        let target = script("setup", "echo hi", true);
        let key = format!("setup:{}", hex::encode(sha256(b"echo hi")));

        assert_eq!(
            target.apply(&system, &dest(&system, "setup")).unwrap(),
            ApplyResult::Ran
        );
        let record = ScriptOnceState::from_json(
            &system.value(SCRIPT_ONCE_STATE_BUCKET, &key).unwrap(),
        )
        .unwrap();
        assert_eq!(record.name, "setup");

        system.clear_calls();
        let again = script("setup", "echo hi", true);
        assert_eq!(
            again.apply(&system, &dest(&system, "setup")).unwrap(),
            ApplyResult::Skipped {
                reason: "already run".into()
            }
        );
        assert!(system.mutations().is_empty());
        assert_eq!(
            system.calls(),
            vec![Call::Get {
                bucket: SCRIPT_ONCE_STATE_BUCKET.into(),
                key
            }]
        );
    }

    #[test]
    fn test_once_script_reruns_when_contents_change() {
        let system = MemorySystem::new();
        script("setup", "echo hi", true)
            .apply(&system, &dest(&system, "setup"))
            .unwrap();
        script("setup", "echo hello", true)
            .apply(&system, &dest(&system, "setup"))
            .unwrap();
        assert_eq!(system.scripts_run(), vec!["setup", "setup"]);
    }

    #[test]
    fn test_once_script_same_contents_different_name() {
        let system = MemorySystem::new();
        script("a", "echo hi", true)
            .apply(&system, &dest(&system, "a"))
            .unwrap();
        script("b", "echo hi", true)
            .apply(&system, &dest(&system, "b"))
            .unwrap();
        assert_eq!(system.scripts_run(), vec!["a", "b"]);
    }

    #[test]
    fn test_blank_script_is_skipped_and_not_recorded() {
        let system = MemorySystem::new();
        let target = script("blank", "   \n\t", true);
        assert_eq!(
            target.apply(&system, &dest(&system, "blank")).unwrap(),
            ApplyResult::Skipped {
                reason: "empty script".into()
            }
        );
        assert!(system.scripts_run().is_empty());
        assert!(system.mutations().is_empty());
    }

    #[test]
    fn test_failed_once_script_is_not_recorded() {
        let system = MemorySystem::new();
        system.fail_on(Op::RunScript);
        let err = script("setup", "exit 1", true)
            .apply(&system, &dest(&system, "setup"))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Script);
        assert!(
            system
                .calls()
                .iter()
                .all(|call| !matches!(call, Call::Set { .. }))
        );
    }

    #[test]
    fn test_ledger_failure_after_run_is_reported() {
        let system = MemorySystem::new();
        system.fail_on(Op::Set);
        let err = script("setup", "echo hi", true)
            .apply(&system, &dest(&system, "setup"))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Ledger);
        assert_eq!(system.scripts_run(), vec!["setup"]);
    }

    #[test]
    fn test_ledger_read_failure_prevents_run() {
        let system = MemorySystem::new();
        system.fail_on(Op::Get);
        assert!(
            script("setup", "echo hi", true)
                .apply(&system, &dest(&system, "setup"))
                .is_err()
        );
        assert!(system.scripts_run().is_empty());
    }

    #[test]
    fn test_script_evaluate_surfaces_read_error() {
        let target = TargetStateEntry::script(
            "setup",
            LazyContents::new(|| anyhow::bail!("permission denied")),
            false,
        );
        assert_eq!(
            target.evaluate().unwrap_err().category(),
            ErrorCategory::Contents
        );
    }
}
