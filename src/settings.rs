use std::path::{Path, PathBuf};

/// Raw-text document the content owner rotates new passwords into.
pub const DEFAULT_PASSWORD_LIST_URL: &str =
    "https://raw.githubusercontent.com/TDToolbox/BTDToolbox-2019_LiveFIles/master/BTD%20Battles%20Passwords";

/// Default number of entries probed per password validation attempt.
pub const DEFAULT_PROBE_ENTRIES: usize = 2;

/// Explicit engine configuration.
///
/// Every `PasswordSource` and every archive gets its settings passed in;
/// there is no process-wide state, so two archives configured differently
/// never interfere with each other.
#[derive(Debug, Clone)]
pub struct JetSettings {
    /// Where the remote candidate list lives.
    pub password_list_url: String,
    /// File the last successfully fetched list is persisted to.
    pub cache_path: PathBuf,
    /// How many entries a validation attempt extracts before declaring a
    /// candidate correct.
    pub probe_entries: usize,
}

impl JetSettings {
    pub fn new(cache_path: impl AsRef<Path>) -> Self {
        Self {
            password_list_url: DEFAULT_PASSWORD_LIST_URL.to_string(),
            cache_path: cache_path.as_ref().to_path_buf(),
            probe_entries: DEFAULT_PROBE_ENTRIES,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.password_list_url = url.into();
        self
    }

    pub fn with_probe_entries(mut self, count: usize) -> Self {
        self.probe_entries = count.max(1);
        self
    }
}
