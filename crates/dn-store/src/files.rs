//! Credential file storage.
//!
//! Each record's credential lives in one hex-encoded file under a fixed
//! root. The file is named by the record's stable id when one exists;
//! older nodes named it by username, and that legacy path is still
//! consulted on load and cleaned up on store. Companion files share the
//! credential path with a suffix: `.state` (account state), `.policy`
//! (record policy text) and `.history` (salted-SHA1 reuse history).

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use dn_crypto::CredentialBlob;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::state::{AccountState, STATE_LEN};

/// Most salted-SHA1 history entries ever retained, regardless of policy.
pub const HISTORY_CAP: usize = 15;

/// A credential record as loaded from disk.
#[derive(Debug)]
pub struct LoadedCredential {
    /// The decoded credential record.
    pub blob: CredentialBlob,
    /// Credential file modification time, unix seconds.
    pub mod_time: i64,
    /// Companion account state (synthesized when absent).
    pub state: AccountState,
    /// The state bytes as loaded; rewrite only when the final state
    /// differs from this snapshot.
    pub state_snapshot: [u8; STATE_LEN],
    /// True when the record was found under the legacy username path.
    pub from_legacy_path: bool,
}

/// File-backed credential store rooted at one directory.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    root: PathBuf,
}

impl CredentialStore {
    /// Creates a store over `root`. The directory is created lazily on the
    /// first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn validated(name: &str) -> Result<&str, StoreError> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0')
        {
            return Err(StoreError::Corrupt("record name"));
        }
        Ok(name)
    }

    fn current_path(&self, record_id: &str) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(Self::validated(record_id)?))
    }

    fn legacy_path(&self, username: &str) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(Self::validated(username)?))
    }

    /// Loads the credential and companion state for a record.
    ///
    /// The stable-id file is preferred; the legacy username-named file is a
    /// fallback. A missing state file is synthesized with `now` as the
    /// creation and password-modification time.
    ///
    /// ## Errors
    ///
    /// [`StoreError::NotFound`] when neither file exists; callers on
    /// password-establishment paths tolerate that. [`StoreError::Corrupt`]
    /// for undecodable content.
    pub fn load(
        &self,
        username: &str,
        record_id: &str,
        now: i64,
    ) -> Result<LoadedCredential, StoreError> {
        let current = self.current_path(record_id)?;
        let (path, from_legacy_path) = if current.is_file() {
            (current, false)
        } else {
            let legacy = self.legacy_path(username)?;
            if legacy.is_file() {
                debug!(record_id, "credential found under legacy path");
                (legacy, true)
            } else {
                return Err(StoreError::NotFound);
            }
        };

        let text = fs::read_to_string(&path)?;
        let raw = hex::decode(text.trim()).map_err(|_| StoreError::Corrupt("hex content"))?;
        let blob = CredentialBlob::from_bytes(raw)
            .map_err(|_| StoreError::Corrupt("record length"))?;

        let mod_time = fs::metadata(&path)?
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_secs() as i64);

        let state_path = companion(&path, "state");
        let (state, state_snapshot) = match fs::read(&state_path) {
            Ok(bytes) => {
                let state = AccountState::from_bytes(&bytes)?;
                (state, state.to_bytes())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let state = AccountState::new(now);
                (state, state.to_bytes())
            }
            Err(err) => return Err(err.into()),
        };

        Ok(LoadedCredential {
            blob,
            mod_time,
            state,
            state_snapshot,
            from_legacy_path,
        })
    }

    /// Writes a credential record, removing any stale legacy-path file.
    ///
    /// The containing directory is created owner-only; the file mode is
    /// restricted to owner read/write.
    ///
    /// ## Errors
    ///
    /// Propagates filesystem failures; legacy-file cleanup failures are
    /// swallowed.
    pub fn store(
        &self,
        username: &str,
        record_id: &str,
        blob: &CredentialBlob,
    ) -> Result<(), StoreError> {
        let current = self.current_path(record_id)?;

        if record_id != username {
            if let Ok(legacy) = self.legacy_path(username) {
                if legacy.is_file() {
                    if let Err(err) = zero_and_remove(&legacy) {
                        warn!(record_id, error = %err, "stale legacy credential not removed");
                    }
                }
            }
        }

        self.ensure_root()?;
        write_private(&current, hex::encode(blob.as_bytes()).as_bytes())?;
        debug!(record_id, len = blob.len(), "credential stored");
        Ok(())
    }

    /// Best-effort zero-then-unlink of the credential and its companions.
    ///
    /// Record deletion must never be blocked by credential cleanup, so
    /// every failure here is swallowed.
    pub fn remove(&self, username: &str, record_id: &str, also_legacy: bool) {
        let mut paths = Vec::new();
        if let Ok(current) = self.current_path(record_id) {
            paths.push(current);
        }
        if also_legacy && record_id != username {
            if let Ok(legacy) = self.legacy_path(username) {
                paths.push(legacy);
            }
        }
        for base in paths {
            for path in [
                base.clone(),
                companion(&base, "state"),
                companion(&base, "policy"),
                companion(&base, "history"),
            ] {
                if path.is_file() {
                    if let Err(err) = zero_and_remove(&path) {
                        warn!(record_id, error = %err, "credential cleanup failure ignored");
                    }
                }
            }
        }
    }

    /// Writes the companion account-state file.
    ///
    /// ## Errors
    ///
    /// Propagates filesystem failures.
    pub fn store_state(&self, record_id: &str, state: &AccountState) -> Result<(), StoreError> {
        let path = companion(&self.current_path(record_id)?, "state");
        self.ensure_root()?;
        write_private(&path, &state.to_bytes())?;
        Ok(())
    }

    /// Reads the companion account-state file.
    ///
    /// ## Errors
    ///
    /// [`StoreError::NotFound`] when absent.
    pub fn load_state(&self, record_id: &str) -> Result<AccountState, StoreError> {
        let path = companion(&self.current_path(record_id)?, "state");
        match fs::read(&path) {
            Ok(bytes) => AccountState::from_bytes(&bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    /// Reads the record policy text, if any.
    ///
    /// ## Errors
    ///
    /// Propagates filesystem failures other than absence.
    pub fn load_policy(&self, record_id: &str) -> Result<Option<String>, StoreError> {
        let path = companion(&self.current_path(record_id)?, "policy");
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text.trim().to_string())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes the record policy text.
    ///
    /// ## Errors
    ///
    /// Propagates filesystem failures.
    pub fn store_policy(&self, record_id: &str, policy: &str) -> Result<(), StoreError> {
        let path = companion(&self.current_path(record_id)?, "policy");
        self.ensure_root()?;
        write_private(&path, policy.trim().as_bytes())?;
        Ok(())
    }

    /// Reads the salted-SHA1 reuse history, most recent first.
    ///
    /// Unparsable lines are skipped; a missing file is an empty history.
    ///
    /// ## Errors
    ///
    /// Propagates filesystem failures other than absence.
    pub fn load_history(&self, record_id: &str) -> Result<Vec<[u8; 24]>, StoreError> {
        let path = companion(&self.current_path(record_id)?, "history");
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut entries = Vec::new();
        for line in text.lines() {
            if let Ok(raw) = hex::decode(line.trim()) {
                if let Ok(entry) = <[u8; 24]>::try_from(raw.as_slice()) {
                    entries.push(entry);
                }
            }
        }
        Ok(entries)
    }

    /// Prepends a salted-SHA1 entry to the reuse history.
    ///
    /// `cap` bounds the retained entries and is itself bounded by
    /// [`HISTORY_CAP`].
    ///
    /// ## Errors
    ///
    /// Propagates filesystem failures.
    pub fn push_history(
        &self,
        record_id: &str,
        entry: [u8; 24],
        cap: usize,
    ) -> Result<(), StoreError> {
        let mut entries = self.load_history(record_id)?;
        entries.insert(0, entry);
        entries.truncate(cap.min(HISTORY_CAP));

        let text: String = entries
            .iter()
            .map(|e| format!("{}\n", hex::encode(e)))
            .collect();
        let path = companion(&self.current_path(record_id)?, "history");
        self.ensure_root()?;
        write_private(&path, text.as_bytes())?;
        Ok(())
    }

    fn ensure_root(&self) -> Result<(), StoreError> {
        if self.root.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(&self.root)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            fs::set_permissions(&self.root, fs::Permissions::from_mode(0o700))?;
        }
        Ok(())
    }
}

fn companion(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    base.with_file_name(name)
}

/// Creates or truncates `path` owner-read/write and writes `content`.
fn write_private(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt as _;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(content)?;
    #[cfg(unix)]
    {
        // An existing file keeps its old mode; clamp it regardless.
        use std::os::unix::fs::PermissionsExt as _;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

/// Overwrites a file with zeros, then unlinks it.
fn zero_and_remove(path: &Path) -> Result<(), std::io::Error> {
    if let Ok(meta) = fs::metadata(path) {
        let len = usize::try_from(meta.len()).unwrap_or(0);
        if len > 0 {
            if let Ok(mut file) = fs::OpenOptions::new().write(true).open(path) {
                let _ = file.write_all(&vec![0u8; len]);
                let _ = file.flush();
            }
        }
    }
    fs::remove_file(path)
}
