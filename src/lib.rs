//! Password discovery and entry access for jet game-asset containers.
//!
//! Jet containers are plain ZIP archives that some products protect with the
//! legacy ZipCrypto cipher under a rotating, unpublished password. This crate
//! opens such a container, figures out whether it is encrypted at all,
//! discovers the password from a remote (or locally cached) candidate list,
//! enumerates entries under per-product filtering conventions, and decodes
//! entry contents to text.
//!
//! ```no_run
//! use jetkey::{JetArchive, JetSettings, PasswordSource};
//!
//! # fn main() -> jetkey::JetResult<()> {
//! let settings = JetSettings::new("passwords.txt");
//! let source = PasswordSource::new(&settings);
//!
//! let mut archive = JetArchive::open("BTDBattles.jet")?;
//! let text = archive.read_entry(&source, "Assets/JSON/towers.json")?;
//! println!("{text}");
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod error;
pub mod passwords;
pub mod settings;
pub mod worker;

pub use archive::{EntryKind, JetArchive, JetEntry, TargetConvention};
pub use error::{JetError, JetResult};
pub use passwords::{PasswordEvent, PasswordSource};
pub use settings::{JetSettings, DEFAULT_PASSWORD_LIST_URL, DEFAULT_PROBE_ENTRIES};
pub use worker::{QueueEvent, WorkQueue};
