//! Package identity and version validation.
//!
//! Versions follow the NuGet shape: one to four dot-separated numeric parts,
//! an optional `-prerelease` label and optional `+metadata`. Anything else is
//! a malformed request, reported as [`RequestError`].

use std::fmt;

/// A malformed caller request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("malformed version '{input}': {reason}")]
    MalformedVersion { input: String, reason: String },

    #[error("malformed package identity '{input}': {reason}")]
    MalformedIdentity { input: String, reason: String },
}

/// A validated package version. Keeps the original text for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageVersion {
    original: String,
    parts: Vec<u64>,
    prerelease: Option<String>,
}

impl PackageVersion {
    pub fn parse(input: &str) -> Result<Self, RequestError> {
        let malformed = |reason: &str| RequestError::MalformedVersion {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(malformed("empty version"));
        }

        let without_metadata = match trimmed.split_once('+') {
            Some((head, meta)) => {
                if meta.is_empty() {
                    return Err(malformed("empty build metadata"));
                }
                head
            }
            None => trimmed,
        };

        let (release, prerelease) = match without_metadata.split_once('-') {
            Some((head, label)) => {
                if label.is_empty()
                    || !label
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
                {
                    return Err(malformed("invalid prerelease label"));
                }
                (head, Some(label.to_string()))
            }
            None => (without_metadata, None),
        };

        let mut parts = Vec::new();
        for piece in release.split('.') {
            if piece.is_empty() || !piece.chars().all(|c| c.is_ascii_digit()) {
                return Err(malformed("version parts must be numeric"));
            }
            let value = piece
                .parse::<u64>()
                .map_err(|_| malformed("version part out of range"))?;
            parts.push(value);
        }
        if parts.is_empty() || parts.len() > 4 {
            return Err(malformed("expected one to four version parts"));
        }

        Ok(PackageVersion {
            original: trimmed.to_string(),
            parts,
            prerelease,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }

    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

/// Package id plus version, e.g. `Acme.Widgets@2.1.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageIdentity {
    pub id: String,
    pub version: PackageVersion,
}

impl PackageIdentity {
    pub fn new(id: &str, version: &str) -> Result<Self, RequestError> {
        validate_id(id)?;
        Ok(PackageIdentity {
            id: id.to_string(),
            version: PackageVersion::parse(version)?,
        })
    }

    /// Parse the `Id@Version` form.
    pub fn parse(input: &str) -> Result<Self, RequestError> {
        let (id, version) =
            input
                .split_once('@')
                .ok_or_else(|| RequestError::MalformedIdentity {
                    input: input.to_string(),
                    reason: "expected <id>@<version>".to_string(),
                })?;
        PackageIdentity::new(id, version)
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

fn validate_id(id: &str) -> Result<(), RequestError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(RequestError::MalformedIdentity {
            input: id.to_string(),
            reason: "package ids use letters, digits, '.', '_' and '-'".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_nuget_version_shapes() {
        for v in ["1", "1.2", "1.2.3", "1.2.3.4", "2.0.0-beta.1", "3.1.0+sha.abc"] {
            assert!(PackageVersion::parse(v).is_ok(), "{} should parse", v);
        }
        assert!(PackageVersion::parse("2.0.0-rc1").unwrap().is_prerelease());
    }

    #[test]
    fn rejects_malformed_versions() {
        for v in ["", "1.2.3.4.5", "1..2", "v1.0", "1.0-", "1.0+", "1.x"] {
            assert!(
                matches!(
                    PackageVersion::parse(v),
                    Err(RequestError::MalformedVersion { .. })
                ),
                "{:?} should be rejected",
                v
            );
        }
    }

    #[test]
    fn identity_parses_id_at_version() {
        let identity = PackageIdentity::parse("Acme.Widgets@2.1.0").unwrap();
        assert_eq!(identity.id, "Acme.Widgets");
        assert_eq!(identity.version.as_str(), "2.1.0");
        assert_eq!(identity.to_string(), "Acme.Widgets@2.1.0");

        assert!(matches!(
            PackageIdentity::parse("Acme.Widgets"),
            Err(RequestError::MalformedIdentity { .. })
        ));
        assert!(matches!(
            PackageIdentity::parse("Acme Widgets@1.0"),
            Err(RequestError::MalformedIdentity { .. })
        ));
    }
}
