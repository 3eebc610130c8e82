//! TOTP configuration carried by external resources.
//!
//! Importers meet TOTP in several shapes: an `otpauth://` key URI, a bare
//! base32 secret, KeePass 2.47+ `TimeOtp-*` fields, and the older
//! `TOTP Seed` / `TOTP Settings` pair. All of them normalise to
//! [`ExternalTotp`].

use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::{limits, InterchangeError, InterchangeResult};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Algorithm
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// HMAC hash used to compute codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TotpAlgorithm {
    #[serde(rename = "SHA1")]
    Sha1,
    #[serde(rename = "SHA256")]
    Sha256,
    #[serde(rename = "SHA512")]
    Sha512,
}

impl Default for TotpAlgorithm {
    fn default() -> Self {
        Self::Sha1
    }
}

impl fmt::Display for TotpAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri_name())
    }
}

impl TotpAlgorithm {
    /// Parse `SHA1`, `sha-256`, `HMAC-SHA-512` and similar spellings.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        let normalised: String = s
            .to_uppercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalised.strip_prefix("HMAC").unwrap_or(&normalised) {
            "SHA1" => Some(Self::Sha1),
            "SHA256" => Some(Self::Sha256),
            "SHA512" => Some(Self::Sha512),
            _ => None,
        }
    }

    pub fn uri_name(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }

    /// Spelling used by the KeePass `TimeOtp-Algorithm` field.
    pub fn keepass_name(&self) -> &'static str {
        match self {
            Self::Sha1 => "HMAC-SHA-1",
            Self::Sha256 => "HMAC-SHA-256",
            Self::Sha512 => "HMAC-SHA-512",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ExternalTotp
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const DEFAULT_PERIOD: u32 = 30;
pub const DEFAULT_DIGITS: u32 = 6;

/// KeePass 2.47+ TOTP field names.
pub const KEEPASS_SECRET_BASE32: &str = "TimeOtp-Secret-Base32";
pub const KEEPASS_ALGORITHM: &str = "TimeOtp-Algorithm";
pub const KEEPASS_LENGTH: &str = "TimeOtp-Length";
pub const KEEPASS_PERIOD: &str = "TimeOtp-Period";
/// KeePassXC key URI field.
pub const KEEPASSXC_OTP: &str = "otp";
/// Legacy KeeTrayTOTP fields.
pub const LEGACY_SEED: &str = "TOTP Seed";
pub const LEGACY_SETTINGS: &str = "TOTP Settings";

/// Time-based one-time password configuration.
///
/// Serialises to the `totp` object of a structured secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTotp {
    pub secret_key: String,
    pub period: u32,
    pub digits: u32,
    pub algorithm: TotpAlgorithm,
}

impl fmt::Debug for ExternalTotp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalTotp")
            .field("secret_key", &"***")
            .field("period", &self.period)
            .field("digits", &self.digits)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

impl ExternalTotp {
    /// Build and validate a configuration from a raw base32 secret.
    pub fn new(
        secret_key: &str,
        period: u32,
        digits: u32,
        algorithm: TotpAlgorithm,
    ) -> InterchangeResult<Self> {
        let totp = Self {
            secret_key: normalise_secret(secret_key),
            period,
            digits,
            algorithm,
        };
        totp.validate()?;
        Ok(totp)
    }

    /// Bare base32 secret with default parameters.
    pub fn from_secret(secret_key: &str) -> InterchangeResult<Self> {
        Self::new(
            secret_key,
            DEFAULT_PERIOD,
            DEFAULT_DIGITS,
            TotpAlgorithm::Sha1,
        )
    }

    /// Parse an `otpauth://totp/...` key URI.
    pub fn from_otpauth_url(uri: &str) -> InterchangeResult<Self> {
        let url = url::Url::parse(uri.trim())
            .map_err(|e| InterchangeError::validation(format!("Invalid TOTP URI: {}", e)))?;

        if url.scheme() != "otpauth" {
            return Err(InterchangeError::validation(format!(
                "Expected scheme 'otpauth', got '{}'",
                url.scheme()
            )));
        }
        if url.host_str() != Some("totp") {
            return Err(InterchangeError::validation(format!(
                "Unsupported OTP type: {:?}",
                url.host_str()
            )));
        }

        let mut secret = None;
        let mut algorithm = TotpAlgorithm::Sha1;
        let mut digits = DEFAULT_DIGITS;
        let mut period = DEFAULT_PERIOD;

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "secret" => secret = Some(value.to_string()),
                "algorithm" => {
                    algorithm = TotpAlgorithm::from_str_loose(&value).ok_or_else(|| {
                        InterchangeError::validation(format!(
                            "Unsupported TOTP algorithm: {}",
                            value
                        ))
                    })?
                }
                "digits" => digits = parse_number(&value, "digits")?,
                "period" => period = parse_number(&value, "period")?,
                _ => {}
            }
        }

        let secret = secret
            .ok_or_else(|| InterchangeError::validation("TOTP URI is missing 'secret'"))?;
        Self::new(&secret, period, digits, algorithm)
    }

    /// Accept either a key URI or a bare base32 secret.
    pub fn from_uri_or_secret(value: &str) -> InterchangeResult<Self> {
        let value = value.trim();
        if value.to_lowercase().starts_with("otpauth://") {
            Self::from_otpauth_url(value)
        } else {
            Self::from_secret(value)
        }
    }

    /// Extract TOTP from KeePass entry fields.
    ///
    /// Returns `Ok(None)` when the entry carries no TOTP at all.
    pub fn from_keepass_fields<'a, F>(get: F) -> InterchangeResult<Option<Self>>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        if let Some(uri) = get(KEEPASSXC_OTP).filter(|v| !v.trim().is_empty()) {
            return Self::from_uri_or_secret(uri).map(Some);
        }

        if let Some(secret) = get(KEEPASS_SECRET_BASE32).filter(|v| !v.trim().is_empty()) {
            let algorithm = match get(KEEPASS_ALGORITHM) {
                Some(a) => TotpAlgorithm::from_str_loose(a).ok_or_else(|| {
                    InterchangeError::validation(format!("Unsupported TOTP algorithm: {}", a))
                })?,
                None => TotpAlgorithm::Sha1,
            };
            let digits = match get(KEEPASS_LENGTH) {
                Some(d) => parse_number(d, "digits")?,
                None => DEFAULT_DIGITS,
            };
            let period = match get(KEEPASS_PERIOD) {
                Some(p) => parse_number(p, "period")?,
                None => DEFAULT_PERIOD,
            };
            return Self::new(secret, period, digits, algorithm).map(Some);
        }

        if let Some(seed) = get(LEGACY_SEED).filter(|v| !v.trim().is_empty()) {
            let mut period = DEFAULT_PERIOD;
            let mut digits = DEFAULT_DIGITS;
            // "<period>;<digits>"
            if let Some(settings) = get(LEGACY_SETTINGS) {
                let mut parts = settings.split(';');
                if let Some(p) = parts.next().filter(|p| !p.trim().is_empty()) {
                    period = parse_number(p, "period")?;
                }
                if let Some(d) = parts.next() {
                    if let Ok(d) = d.trim().parse::<u32>() {
                        digits = d;
                    }
                }
            }
            return Self::new(seed, period, digits, TotpAlgorithm::Sha1).map(Some);
        }

        Ok(None)
    }

    /// Build an `otpauth://totp/` key URI.
    pub fn to_otpauth_url(&self, label: &str, issuer: Option<&str>) -> String {
        let label = match issuer {
            Some(iss) if !iss.is_empty() => format!("{}:{}", iss, label),
            _ => label.to_string(),
        };
        let mut url = match url::Url::parse("otpauth://totp/") {
            Ok(u) => u,
            Err(_) => return String::new(),
        };
        url.set_path(&label);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("secret", &self.secret_key);
            if let Some(iss) = issuer.filter(|i| !i.is_empty()) {
                query.append_pair("issuer", iss);
            }
            query.append_pair("algorithm", self.algorithm.uri_name());
            query.append_pair("digits", &self.digits.to_string());
            query.append_pair("period", &self.period.to_string());
        }
        url.to_string()
    }

    pub fn validate(&self) -> InterchangeResult<()> {
        if self.secret_key.is_empty() {
            return Err(InterchangeError::validation("TOTP secret is empty"));
        }
        if self.secret_key.chars().count() > limits::TOTP_SECRET_MAX {
            return Err(InterchangeError::validation(format!(
                "TOTP secret exceeds {} characters",
                limits::TOTP_SECRET_MAX
            )));
        }
        if !self
            .secret_key
            .chars()
            .all(|c| c.is_ascii_uppercase() || ('2'..='7').contains(&c) || c == '=')
        {
            return Err(InterchangeError::validation("TOTP secret is not valid base32"));
        }
        if !(6..=8).contains(&self.digits) {
            return Err(InterchangeError::validation(format!(
                "TOTP digits must be between 6 and 8, got {}",
                self.digits
            )));
        }
        if self.period == 0 {
            return Err(InterchangeError::validation("TOTP period must be positive"));
        }
        Ok(())
    }
}

/// Upper-case and strip whitespace and dashes from a base32 secret.
fn normalise_secret(secret: &str) -> String {
    secret
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect::<String>()
        .to_uppercase()
}

fn parse_number(value: &str, what: &str) -> InterchangeResult<u32> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| InterchangeError::validation(format!("Invalid TOTP {}: {}", what, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_algorithm_loose_parse() {
        assert_eq!(TotpAlgorithm::from_str_loose("sha1"), Some(TotpAlgorithm::Sha1));
        assert_eq!(
            TotpAlgorithm::from_str_loose("HMAC-SHA-256"),
            Some(TotpAlgorithm::Sha256)
        );
        assert_eq!(
            TotpAlgorithm::from_str_loose("SHA-512"),
            Some(TotpAlgorithm::Sha512)
        );
        assert_eq!(TotpAlgorithm::from_str_loose("md5"), None);
    }

    #[test]
    fn test_from_secret_normalises() {
        let totp = ExternalTotp::from_secret("jbsw y3dp-ehpk 3pxp").unwrap();
        assert_eq!(totp.secret_key, "JBSWY3DPEHPK3PXP");
        assert_eq!(totp.period, 30);
        assert_eq!(totp.digits, 6);
    }

    #[test]
    fn test_rejects_non_base32() {
        let err = ExternalTotp::from_secret("not base32!").unwrap_err();
        assert_eq!(err.kind, crate::interchange::types::InterchangeErrorKind::Validation);
    }

    #[test]
    fn test_parse_otpauth_url() {
        let totp = ExternalTotp::from_otpauth_url(
            "otpauth://totp/ACME:alice?secret=JBSWY3DPEHPK3PXP&algorithm=SHA256&digits=8&period=60",
        )
        .unwrap();
        assert_eq!(totp.secret_key, "JBSWY3DPEHPK3PXP");
        assert_eq!(totp.algorithm, TotpAlgorithm::Sha256);
        assert_eq!(totp.digits, 8);
        assert_eq!(totp.period, 60);
    }

    #[test]
    fn test_otpauth_url_requires_secret() {
        assert!(ExternalTotp::from_otpauth_url("otpauth://totp/x?digits=6").is_err());
        assert!(ExternalTotp::from_otpauth_url("otpauth://hotp/x?secret=JBSWY3DP").is_err());
    }

    #[test]
    fn test_otpauth_url_roundtrip() {
        let totp = ExternalTotp::new("JBSWY3DPEHPK3PXP", 45, 7, TotpAlgorithm::Sha512).unwrap();
        let uri = totp.to_otpauth_url("my account", Some("Example Co"));
        assert!(uri.starts_with("otpauth://totp/"));
        assert_eq!(ExternalTotp::from_otpauth_url(&uri).unwrap(), totp);
    }

    #[test]
    fn test_keepass_timeotp_fields() {
        let mut fields = HashMap::new();
        fields.insert(KEEPASS_SECRET_BASE32, "JBSWY3DPEHPK3PXP");
        fields.insert(KEEPASS_ALGORITHM, "HMAC-SHA-256");
        fields.insert(KEEPASS_LENGTH, "8");
        fields.insert(KEEPASS_PERIOD, "60");
        let totp = ExternalTotp::from_keepass_fields(|k| fields.get(k).copied())
            .unwrap()
            .unwrap();
        assert_eq!(totp.algorithm, TotpAlgorithm::Sha256);
        assert_eq!(totp.digits, 8);
        assert_eq!(totp.period, 60);
    }

    #[test]
    fn test_keepass_legacy_fields() {
        let mut fields = HashMap::new();
        fields.insert(LEGACY_SEED, "JBSWY3DPEHPK3PXP");
        fields.insert(LEGACY_SETTINGS, "60;8");
        let totp = ExternalTotp::from_keepass_fields(|k| fields.get(k).copied())
            .unwrap()
            .unwrap();
        assert_eq!(totp.period, 60);
        assert_eq!(totp.digits, 8);
    }

    #[test]
    fn test_keepass_no_totp() {
        let fields: HashMap<&str, &str> = HashMap::new();
        assert!(ExternalTotp::from_keepass_fields(|k| fields.get(k).copied())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_serialize_secret_shape() {
        let totp = ExternalTotp::from_secret("JBSWY3DPEHPK3PXP").unwrap();
        let json = serde_json::to_value(&totp).unwrap();
        assert_eq!(json["secret_key"], "JBSWY3DPEHPK3PXP");
        assert_eq!(json["algorithm"], "SHA1");
        assert_eq!(json["period"], 30);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let totp = ExternalTotp::from_secret("JBSWY3DPEHPK3PXP").unwrap();
        assert!(!format!("{:?}", totp).contains("JBSWY3DP"));
    }
}
