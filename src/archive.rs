//! Jet container access: entry snapshot, password validation and discovery,
//! entry enumeration and reading.
//!
//! A jet container is an ordinary ZIP whose entries may be protected with
//! the legacy ZipCrypto stream cipher. Whether a given container is
//! encrypted at all varies per product and per release, so every operation
//! here tolerates all three states: unencrypted, encrypted with a known
//! password, and encrypted with a password still to be discovered.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use zip::result::ZipError;

use crate::error::{JetError, JetResult};
use crate::passwords::PasswordSource;
use crate::settings::{JetSettings, DEFAULT_PROBE_ENTRIES};

/// Which entries [`JetArchive::list_entries`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    All,
    Files,
    Directories,
}

/// How a product family maps logical directories onto archive entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetConvention {
    /// Real directory entries mark directories.
    DirectoryTree,
    /// Flat layout where suffixed data files stand in for directories.
    FlatFile,
}

/// Suffix that marks a logical directory under the flat-file convention.
const FLAT_DIR_SUFFIX: &str = ".json";

/// One entry of the container's directory listing, snapshotted at open time.
#[derive(Debug, Clone)]
pub struct JetEntry {
    index: usize,
    /// Forward-slash separated, no leading `./` or `/`, no trailing `/`.
    pub path: String,
    pub is_dir: bool,
    pub encrypted: bool,
    pub size: u64,
}

/// An opened jet container plus its current password, if any.
///
/// `Some("")` means the container was confirmed unencrypted. A password,
/// once validated, stays on the handle for its whole lifetime so repeated
/// reads never re-run discovery.
pub struct JetArchive {
    path: PathBuf,
    password: Option<String>,
    probe_entries: usize,
    zip: zip::ZipArchive<File>,
    entries: Vec<JetEntry>,
}

impl JetArchive {
    /// Open a container and snapshot its directory listing.
    ///
    /// Listing the entries needs no password; only entry contents are
    /// protected by the cipher.
    pub fn open(path: impl AsRef<Path>) -> JetResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mut zip = zip::ZipArchive::new(file)?;

        let mut entries = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            let entry = zip.by_index_raw(index)?;
            entries.push(JetEntry {
                index,
                path: normalize_entry_path(entry.name()),
                is_dir: entry.is_dir(),
                encrypted: entry.encrypted(),
                size: entry.size(),
            });
        }

        Ok(Self {
            path,
            password: None,
            probe_entries: DEFAULT_PROBE_ENTRIES,
            zip,
            entries,
        })
    }

    /// Open a container with the probe count taken from the given settings.
    pub fn open_with_settings(path: impl AsRef<Path>, settings: &JetSettings) -> JetResult<Self> {
        Ok(Self::open(path)?.with_probe_entries(settings.probe_entries))
    }

    /// Override how many entries a validation attempt extracts (minimum 1).
    pub fn with_probe_entries(mut self, count: usize) -> Self {
        self.probe_entries = count.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current password: `None` until one is discovered or supplied,
    /// `Some("")` for a confirmed-unencrypted container.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Supply a password directly, bypassing discovery.
    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = Some(password.into());
    }

    /// Entry snapshot taken at open time, in container-native order.
    pub fn entries(&self) -> &[JetEntry] {
        &self.entries
    }

    /// Whether any entry is protected by the cipher.
    pub fn is_encrypted(&self) -> bool {
        self.entries.iter().any(|entry| entry.encrypted)
    }

    /// Check a single candidate password by trial extraction.
    ///
    /// The empty password is correct only for a genuinely unencrypted
    /// container. A non-empty candidate is checked by decrypting the first
    /// few file entries into a fresh scratch directory; the first explicit
    /// wrong-password signal or CRC failure rejects it. Extracting the whole
    /// archive per candidate would be far too slow for a list of dozens,
    /// so only a short prefix is checked. An archive whose entries are all
    /// directory placeholders never exercises the cipher and is reported
    /// incorrect (indeterminate).
    pub fn is_password_correct(&mut self, password: &str) -> bool {
        if password.is_empty() {
            return !self.is_encrypted();
        }

        let file_count = self.entries.iter().filter(|entry| !entry.is_dir).count();
        let required = self.probe_entries.min(file_count);
        if required == 0 {
            return false;
        }

        // Fresh per call: concurrent validations of different archives can
        // never observe each other's scratch files, and the directory is
        // removed on every exit path when it drops.
        let scratch = match tempfile::Builder::new().prefix("jetkey-probe-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                log::warn!("could not create scratch directory: {e}");
                return false;
            }
        };

        let mut decoded = 0usize;
        for index in 0..self.zip.len() {
            if decoded >= required {
                break;
            }
            let mut entry = match self.zip.by_index_decrypt(index, password.as_bytes()) {
                Ok(entry) => entry,
                Err(_) => return false,
            };
            if entry.is_dir() {
                continue;
            }
            let dest = scratch.path().join(format!("probe-{index}"));
            let mut out = match File::create(&dest) {
                Ok(file) => file,
                Err(_) => return false,
            };
            // ZipCrypto's header check accepts 1 in 256 wrong passwords;
            // the CRC mismatch surfaces here as a read error instead.
            if io::copy(&mut entry, &mut out).is_err() {
                return false;
            }
            decoded += 1;
        }

        decoded >= required
    }

    /// Find a working password for this container, caching it on success.
    ///
    /// The empty password is tried first, so an unencrypted container never
    /// consults the candidate list. Candidates are then tried in list order,
    /// trimmed of trailing newline characters; the first match wins. `None`
    /// means the list was exhausted, which is an absence rather than an
    /// error: the archive stays enumerable and a password can still be
    /// supplied explicitly.
    pub fn find_password(&mut self, source: &PasswordSource) -> Option<String> {
        if self.is_password_correct("") {
            log::debug!("{} is not encrypted", self.path.display());
            self.password = Some(String::new());
            return Some(String::new());
        }

        for candidate in source.candidates(false) {
            let candidate = candidate.trim_end_matches(['\n', '\r']);
            if self.is_password_correct(candidate) {
                log::info!("found a working password for {}", self.path.display());
                self.password = Some(candidate.to_string());
                return Some(candidate.to_string());
            }
        }

        log::warn!("password list exhausted for {}", self.path.display());
        None
    }

    /// Enumerate entry paths under `base_path`.
    ///
    /// Entries come back in container-native order, deduplicated, unsorted;
    /// callers wanting a display order sort themselves. With an empty
    /// `base_path` the listing is rooted at the container root. Matching is
    /// against the deepest occurrence of `base_path`'s last segment, so a
    /// caller can pass either a bare directory name or a full prefix, and an
    /// entry nested under a repeated name is scoped to its actual parent.
    /// Non-recursive mode keeps only entries exactly one segment deeper.
    ///
    /// Under [`TargetConvention::FlatFile`], `.json` entries are the logical
    /// directories regardless of the container's directory flags.
    pub fn list_entries(
        &self,
        kind: EntryKind,
        recursive: bool,
        base_path: &str,
        convention: TargetConvention,
    ) -> Vec<String> {
        let base = base_path.replace('\\', "/");
        let base = base.trim_matches('/');
        let base_last = base.rsplit('/').next().unwrap_or("");

        let mut seen: HashSet<&str> = HashSet::new();
        let mut listing = Vec::new();

        for entry in &self.entries {
            if entry.path.is_empty() {
                continue;
            }
            let segments: Vec<&str> = entry.path.split('/').collect();

            let in_scope = if base.is_empty() {
                recursive || segments.len() == 1
            } else {
                match segments.iter().rposition(|segment| *segment == base_last) {
                    Some(idx) if segments.len() > idx + 1 => {
                        recursive || segments.len() == idx + 2
                    }
                    _ => false,
                }
            };
            if !in_scope {
                continue;
            }

            let logical_dir = match convention {
                TargetConvention::DirectoryTree => entry.is_dir,
                TargetConvention::FlatFile => entry.path.ends_with(FLAT_DIR_SUFFIX),
            };
            let wanted = match kind {
                EntryKind::All => true,
                EntryKind::Files => !logical_dir,
                EntryKind::Directories => logical_dir,
            };
            if !wanted {
                continue;
            }

            if seen.insert(entry.path.as_str()) {
                listing.push(entry.path.clone());
            }
        }

        listing
    }

    /// Read one entry fully and decode it to text.
    ///
    /// The entry is matched by substring against normalized names. The open
    /// is attempted without a password first (the unencrypted case), then
    /// with the archive's known password, and finally after running
    /// discovery; a successfully discovered password is cached on the
    /// handle so the next read skips discovery entirely. A known password
    /// that is rejected as wrong triggers re-discovery; any other decode
    /// failure propagates as-is.
    pub fn read_entry(&mut self, source: &PasswordSource, entry_path: &str) -> JetResult<String> {
        let wanted = normalize_entry_path(entry_path);
        if wanted.is_empty() {
            return Err(JetError::EntryNotFound(entry_path.to_string()));
        }
        let index = self
            .entries
            .iter()
            .find(|entry| !entry.is_dir && entry.path.contains(&wanted))
            .map(|entry| entry.index)
            .ok_or_else(|| JetError::EntryNotFound(entry_path.to_string()))?;

        if let Ok(text) = self.read_index(index, None) {
            return Ok(text);
        }

        if let Some(known) = self.password.clone() {
            if !known.is_empty() {
                match self.read_index(index, Some(&known)) {
                    Ok(text) => return Ok(text),
                    // InvalidPassword is the stale-password signal; an I/O
                    // error is the CRC signature of a falsely accepted one.
                    // Other archive errors mean the entry itself is bad and
                    // no amount of re-discovery can decode it.
                    Err(JetError::Archive(ZipError::InvalidPassword)) | Err(JetError::Io(_)) => {
                        log::warn!(
                            "current password no longer decodes {}, re-running discovery",
                            self.path.display()
                        );
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let found = self.find_password(source).ok_or(JetError::PasswordUnknown)?;
        if found.is_empty() {
            self.read_index(index, None)
        } else {
            self.read_index(index, Some(&found))
        }
    }

    fn read_index(&mut self, index: usize, password: Option<&str>) -> JetResult<String> {
        let mut entry = match password {
            Some(password) => self.zip.by_index_decrypt(index, password.as_bytes())?,
            None => self.zip.by_index(index)?,
        };
        let mut raw = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut raw)?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

/// Unify separators, strip any leading root prefix, drop a trailing slash.
fn normalize_entry_path(name: &str) -> String {
    let unified = name.replace('\\', "/");
    unified
        .trim_start_matches("./")
        .trim_start_matches('/')
        .trim_end_matches('/')
        .to_string()
}
