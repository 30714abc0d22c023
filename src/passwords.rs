//! Candidate password list management: remote fetch, local cache, cleanup.
//!
//! The remote document is a human-maintained text file where each rotation
//! adds a line like `[2019-04-02] - v22.1 - Q%_{6#Px]]`. Only lines carrying
//! the `[` marker are password lines; the token is whatever follows the last
//! `-`, with embedded whitespace stripped.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{JetError, JetResult};
use crate::settings::JetSettings;

const FETCH_TIMEOUT_SECS: u64 = 15;
const USER_AGENT: &str = concat!("jetkey/", env!("CARGO_PKG_VERSION"));

/// Notification fired once per [`PasswordSource::candidates`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordEvent {
    /// A non-empty candidate list was obtained (from cache or remote).
    ListAcquired { count: usize },
    /// No candidates could be obtained at all.
    ListUnavailable { reason: String },
}

type EventHook = Box<dyn Fn(&PasswordEvent) + Send + Sync>;

/// Obtains the ordered candidate password list, preferring the local cache
/// and falling back to (or refreshing from) the remote document.
pub struct PasswordSource {
    url: String,
    cache_path: PathBuf,
    hook: Option<EventHook>,
}

impl PasswordSource {
    pub fn new(settings: &JetSettings) -> Self {
        Self {
            url: settings.password_list_url.clone(),
            cache_path: settings.cache_path.clone(),
            hook: None,
        }
    }

    /// Install an observer for list-acquired / list-unavailable events.
    pub fn on_event(mut self, hook: impl Fn(&PasswordEvent) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Ordered candidate list, newest remote rotations first.
    ///
    /// Without `force_refresh` an existing cache file wins. Otherwise the
    /// remote document is fetched, parsed, and persisted over the cache; on
    /// fetch failure the stale cache is used if present, else the list is
    /// empty. Never fails hard: an unreachable list is a recoverable
    /// condition that surfaces later as "password unknown".
    pub fn candidates(&self, force_refresh: bool) -> Vec<String> {
        if !force_refresh {
            if let Some(cached) = self.load_cache() {
                log::debug!("using cached password list ({} candidates)", cached.len());
                self.emit_result(&cached, "password cache file is empty");
                return cached;
            }
        }

        match self.fetch_remote() {
            Ok(list) => {
                if let Err(e) = self.save_cache(&list) {
                    log::warn!("failed to persist password cache: {e}");
                }
                self.emit_result(&list, "remote list contained no password lines");
                list
            }
            Err(e) => {
                log::warn!("remote password list fetch failed: {e}");
                if let Some(cached) = self.load_cache() {
                    self.emit_result(&cached, "password cache file is empty");
                    return cached;
                }
                self.emit(&PasswordEvent::ListUnavailable {
                    reason: e.to_string(),
                });
                Vec::new()
            }
        }
    }

    fn emit(&self, event: &PasswordEvent) {
        if let Some(hook) = &self.hook {
            hook(event);
        }
    }

    fn emit_result(&self, list: &[String], empty_reason: &str) {
        if list.is_empty() {
            self.emit(&PasswordEvent::ListUnavailable {
                reason: empty_reason.to_string(),
            });
        } else {
            self.emit(&PasswordEvent::ListAcquired { count: list.len() });
        }
    }

    fn fetch_remote(&self) -> JetResult<Vec<String>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| JetError::ResourceUnavailable(e.to_string()))?;

        let text = client
            .get(&self.url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(|e| JetError::ResourceUnavailable(e.to_string()))?;

        Ok(parse_remote_list(&text))
    }

    fn load_cache(&self) -> Option<Vec<String>> {
        let text = fs::read_to_string(&self.cache_path).ok()?;
        Some(
            text.lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Fully replaces the cache file via a sibling-then-rename, so a
    /// concurrent reader never observes a partial write.
    fn save_cache(&self, passwords: &[String]) -> JetResult<()> {
        if let Some(parent) = self.cache_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let staging = self.cache_path.with_extension("tmp");
        let mut body = passwords.join("\n");
        body.push('\n');
        fs::write(&staging, body)?;
        fs::rename(&staging, &self.cache_path)?;
        Ok(())
    }
}

/// Extract password tokens from the remote document.
///
/// The document appends newer rotations at the bottom, so lines are scanned
/// in reverse to put the newest password first in trial order. The leading
/// header line is never a candidate.
pub(crate) fn parse_remote_list(text: &str) -> Vec<String> {
    let mut passwords = Vec::new();
    for line in text.lines().skip(1).collect::<Vec<_>>().into_iter().rev() {
        if !line.contains('[') {
            continue;
        }
        let token: String = line
            .rsplit('-')
            .next()
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if !token.is_empty() {
            passwords.push(token);
        }
    }
    passwords
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    // Connection refused / blocked immediately; nothing listens on port 9.
    const DEAD_URL: &str = "http://127.0.0.1:9/passwords";

    fn source_with(dir: &TempDir, url: &str) -> PasswordSource {
        let settings = JetSettings::new(dir.path().join("passwords.txt")).with_url(url);
        PasswordSource::new(&settings)
    }

    #[test]
    fn test_parse_remote_list_newest_first() {
        let text = "BTD Battles jet passwords\n\
                    [2019-01-10] - v1.0 - alpha one\n\
                    some commentary line\n\
                    [2019-03-22] - v2.0 - beta2\n\
                    [2019-06-05] - v3.1 - gamma-three\n";

        let passwords = parse_remote_list(text);
        assert_eq!(passwords, vec!["three", "beta2", "alphaone"]);
    }

    #[test]
    fn test_parse_remote_list_skips_header_even_with_marker() {
        let text = "[header] - looks - likeapassword\n[2020-01-01] - v4 - real";
        let passwords = parse_remote_list(text);
        assert_eq!(passwords, vec!["real"]);
    }

    #[test]
    fn test_parse_remote_list_empty_document() {
        assert!(parse_remote_list("").is_empty());
        assert!(parse_remote_list("just a header\nno markers here").is_empty());
    }

    #[test]
    fn test_candidates_prefers_cache_over_remote() {
        let dir = TempDir::new().unwrap();
        let source = source_with(&dir, DEAD_URL);
        fs::write(dir.path().join("passwords.txt"), "one\n\ntwo\n").unwrap();

        // Fetch from the dead URL would fail; the cache must win without it.
        let candidates = source.candidates(false);
        assert_eq!(candidates, vec!["one", "two"]);
    }

    #[test]
    fn test_candidates_falls_back_to_cache_on_fetch_failure() {
        let dir = TempDir::new().unwrap();
        let source = source_with(&dir, DEAD_URL);
        fs::write(dir.path().join("passwords.txt"), "p1\np2\n").unwrap();

        let candidates = source.candidates(true);
        assert_eq!(candidates, vec!["p1", "p2"]);
    }

    #[test]
    fn test_candidates_empty_when_no_cache_and_no_remote() {
        let dir = TempDir::new().unwrap();
        let events: Arc<Mutex<Vec<PasswordEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let source = source_with(&dir, DEAD_URL).on_event(move |event| {
            sink.lock().unwrap().push(event.clone());
        });

        let candidates = source.candidates(false);
        assert!(candidates.is_empty());

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], PasswordEvent::ListUnavailable { .. }));
    }

    #[test]
    fn test_acquired_event_carries_count() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("passwords.txt"), "a\nb\nc\n").unwrap();
        let events: Arc<Mutex<Vec<PasswordEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let source = source_with(&dir, DEAD_URL).on_event(move |event| {
            sink.lock().unwrap().push(event.clone());
        });

        source.candidates(false);

        let events = events.lock().unwrap();
        assert_eq!(events.as_slice(), &[PasswordEvent::ListAcquired { count: 3 }]);
    }

    #[test]
    fn test_save_cache_fully_replaces_previous_list() {
        let dir = TempDir::new().unwrap();
        let source = source_with(&dir, DEAD_URL);
        let cache = dir.path().join("passwords.txt");

        fs::write(&cache, "stale1\nstale2\nstale3\n").unwrap();
        source
            .save_cache(&["fresh".to_string()])
            .expect("cache write should succeed");

        let written = fs::read_to_string(&cache).unwrap();
        assert_eq!(written, "fresh\n");
        // No staging file left behind.
        assert!(!cache.with_extension("tmp").exists());
    }

    #[test]
    fn test_save_cache_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("settings").join("passwords.txt");
        let settings = JetSettings::new(&nested).with_url(DEAD_URL);
        let source = PasswordSource::new(&settings);

        source
            .save_cache(&["p".to_string()])
            .expect("cache write should succeed");
        assert_eq!(fs::read_to_string(&nested).unwrap(), "p\n");
    }
}
