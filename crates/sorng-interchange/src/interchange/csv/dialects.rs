//! Vendor CSV dialect table.
//!
//! Each dialect is a list of `(column header, field)` pairs. The same
//! table drives header detection, row parsing, and export.

use crate::interchange::types::CsvDialect;

/// What a CSV column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Username,
    Uri,
    Password,
    Description,
    FolderPath,
    /// `otpauth://` URI, or a bare base32 secret on import.
    TotpUri,
    /// Bare base32 secret.
    TotpSecret,
    /// KeePass icon id.
    Icon,
    /// Ignored on import, written with this value on export.
    Fixed(&'static str),
    /// Ignored on import, left empty on export.
    Ignored,
}

/// One vendor dialect.
#[derive(Debug)]
pub struct DialectSpec {
    pub dialect: CsvDialect,
    pub columns: &'static [(&'static str, Field)],
    /// Top-level group name the vendor prepends to every folder path.
    pub root_group: Option<&'static str>,
}

impl DialectSpec {
    /// Number of this dialect's column names present in `headers`.
    /// Matching is exact and case-sensitive.
    pub fn score(&self, headers: &[String]) -> usize {
        self.columns
            .iter()
            .filter(|(name, _)| headers.iter().any(|h| h == name))
            .count()
    }

    pub fn header(&self) -> Vec<&'static str> {
        self.columns.iter().map(|(name, _)| *name).collect()
    }

    pub fn has_field(&self, field: Field) -> bool {
        self.columns.iter().any(|(_, f)| *f == field)
    }
}

use Field::*;

/// Registered dialects, in detection tie-break order.
pub static DIALECTS: [DialectSpec; 11] = [
    DialectSpec {
        dialect: CsvDialect::Kdbx,
        columns: &[
            ("Title", Name),
            ("Username", Username),
            ("URL", Uri),
            ("Password", Password),
            ("Notes", Description),
            ("Group", FolderPath),
            ("TOTP", TotpUri),
        ],
        root_group: None,
    },
    DialectSpec {
        dialect: CsvDialect::KeepassXc,
        columns: &[
            ("Group", FolderPath),
            ("Title", Name),
            ("Username", Username),
            ("Password", Password),
            ("URL", Uri),
            ("Notes", Description),
            ("TOTP", TotpUri),
            ("Icon", Icon),
            ("Last Modified", Ignored),
            ("Created", Ignored),
        ],
        root_group: Some("Root"),
    },
    DialectSpec {
        dialect: CsvDialect::LastPass,
        columns: &[
            ("url", Uri),
            ("username", Username),
            ("password", Password),
            ("totp", TotpUri),
            ("extra", Description),
            ("name", Name),
            ("grouping", FolderPath),
            ("fav", Fixed("0")),
        ],
        root_group: None,
    },
    DialectSpec {
        dialect: CsvDialect::OnePassword,
        columns: &[
            ("Title", Name),
            ("Website", Uri),
            ("Username", Username),
            ("Password", Password),
            ("One-time password", TotpUri),
            ("Notes", Description),
        ],
        root_group: None,
    },
    DialectSpec {
        dialect: CsvDialect::Chromium,
        columns: &[
            ("name", Name),
            ("url", Uri),
            ("username", Username),
            ("password", Password),
            ("note", Description),
        ],
        root_group: None,
    },
    DialectSpec {
        dialect: CsvDialect::Bitwarden,
        columns: &[
            ("folder", FolderPath),
            ("favorite", Ignored),
            ("type", Fixed("login")),
            ("name", Name),
            ("notes", Description),
            ("fields", Ignored),
            ("reprompt", Fixed("0")),
            ("login_uri", Uri),
            ("login_username", Username),
            ("login_password", Password),
            ("login_totp", TotpUri),
        ],
        root_group: None,
    },
    DialectSpec {
        dialect: CsvDialect::Mozilla,
        columns: &[
            ("url", Uri),
            ("username", Username),
            ("password", Password),
            ("httpRealm", Ignored),
            ("formActionOrigin", Ignored),
            ("guid", Ignored),
            ("timeCreated", Ignored),
            ("timeLastUsed", Ignored),
            ("timePasswordChanged", Ignored),
        ],
        root_group: None,
    },
    DialectSpec {
        dialect: CsvDialect::Safari,
        columns: &[
            ("Title", Name),
            ("URL", Uri),
            ("Username", Username),
            ("Password", Password),
            ("Notes", Description),
            ("OTPAuth", TotpUri),
        ],
        root_group: None,
    },
    DialectSpec {
        dialect: CsvDialect::Dashlane,
        columns: &[
            ("username", Username),
            ("username2", Ignored),
            ("username3", Ignored),
            ("title", Name),
            ("password", Password),
            ("note", Description),
            ("url", Uri),
            ("category", FolderPath),
            ("otpSecret", TotpSecret),
        ],
        root_group: None,
    },
    DialectSpec {
        dialect: CsvDialect::NordPass,
        columns: &[
            ("name", Name),
            ("url", Uri),
            ("additional_urls", Ignored),
            ("username", Username),
            ("password", Password),
            ("note", Description),
            ("folder", FolderPath),
            ("type", Fixed("password")),
        ],
        root_group: None,
    },
    DialectSpec {
        dialect: CsvDialect::LogMeOnce,
        columns: &[
            ("name", Name),
            ("url", Uri),
            ("note", Description),
            ("group", FolderPath),
            ("username", Username),
            ("password", Password),
        ],
        root_group: None,
    },
];

/// Table entry for `dialect`.
pub fn spec_for(dialect: CsvDialect) -> &'static DialectSpec {
    DIALECTS
        .iter()
        .find(|d| d.dialect == dialect)
        .unwrap_or(&DIALECTS[0])
}
