//! # SortOfRemote NG – Password Manager Interchange
//!
//! Converts between the internal encrypted resource/folder model and the
//! formats other password managers read and write:
//!
//! - **CSV dialects** – header-scored detection across KeePass, KeePassXC,
//!   LastPass, 1Password, Chromium, Bitwarden, Firefox, Safari, Dashlane,
//!   NordPass and LogMeOnce exports, plus a writer for each
//! - **KDBX 4** – group/entry tree walk with TOTP extraction, and an
//!   Argon2id-protected writer
//! - **Folder paths** – escaping grammar for names containing `/` and a
//!   flat, depth-addressed folder arena
//! - **Resource types** – capability-based classification against the
//!   server catalogue (v4 and v5 metadata)
//! - **Pipelines** – import and export runs with per-item error capture,
//!   chunked bulk writes and depth-ordered folder creation

pub mod interchange;
