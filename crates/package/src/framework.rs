//! Target framework parsing and nearest-compatible variant selection.
//!
//! Variant folder names (`net8.0`, `netstandard2.0`, `net48`,
//! `net6.0-android31.0`) are parsed into a [`Framework`]. Compatibility is a
//! partial order over framework families, never a raw version comparison
//! across families.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

/// Framework family, in ascending sort order for variant listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FrameworkFamily {
    NetFramework,
    NetStandard,
    NetCoreApp,
    /// Binaries placed directly under `lib/`.
    Any,
    /// A folder name that does not parse. Matches only itself.
    Opaque,
}

/// Dotted version, up to four parts, zero padded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameworkVersion(pub [u32; 4]);

impl FrameworkVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        FrameworkVersion([major, minor, 0, 0])
    }

    fn parse_dotted(text: &str) -> Option<Self> {
        let mut parts = [0u32; 4];
        let mut count = 0;
        for piece in text.split('.') {
            if count == 4 || piece.is_empty() || !piece.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            parts[count] = piece.parse().ok()?;
            count += 1;
        }
        Some(FrameworkVersion(parts))
    }

    /// `net462` style: one digit per part.
    fn parse_compact(text: &str) -> Option<Self> {
        if text.is_empty() || text.len() > 4 || !text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let mut parts = [0u32; 4];
        for (i, b) in text.bytes().enumerate() {
            parts[i] = u32::from(b - b'0');
        }
        Some(FrameworkVersion(parts))
    }

    fn major(&self) -> u32 {
        self.0[0]
    }
}

impl fmt::Display for FrameworkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{}.{}", a, b)?;
        if c != 0 || d != 0 {
            write!(f, ".{}", c)?;
        }
        if d != 0 {
            write!(f, ".{}", d)?;
        }
        Ok(())
    }
}

/// A parsed variant folder name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Framework {
    pub family: FrameworkFamily,
    pub version: FrameworkVersion,
    pub platform: Option<String>,
    pub platform_version: FrameworkVersion,
    folder: String,
}

impl Framework {
    /// The pseudo-variant for binaries directly under `lib/`.
    pub const ANY: &'static str = "any";

    /// Parse a folder name. Never fails: unparsable names become
    /// [`FrameworkFamily::Opaque`].
    pub fn parse(folder: &str) -> Self {
        let folder = folder.trim().to_ascii_lowercase();
        parse_known(&folder).unwrap_or_else(|| Framework {
            family: if folder == Self::ANY {
                FrameworkFamily::Any
            } else {
                FrameworkFamily::Opaque
            },
            version: FrameworkVersion::default(),
            platform: None,
            platform_version: FrameworkVersion::default(),
            folder,
        })
    }

    pub fn any() -> Self {
        Framework::parse(Self::ANY)
    }

    /// The folder name, lower-cased.
    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn is_opaque(&self) -> bool {
        self.family == FrameworkFamily::Opaque
    }

    /// Highest netstandard version a target of this framework accepts.
    fn max_netstandard(&self) -> Option<FrameworkVersion> {
        let v = self.version;
        match self.family {
            FrameworkFamily::NetStandard => Some(v),
            FrameworkFamily::NetFramework => {
                if v >= FrameworkVersion([4, 6, 1, 0]) {
                    Some(FrameworkVersion::new(2, 0))
                } else if v >= FrameworkVersion::new(4, 6) {
                    Some(FrameworkVersion::new(1, 3))
                } else if v >= FrameworkVersion([4, 5, 1, 0]) {
                    Some(FrameworkVersion::new(1, 2))
                } else if v >= FrameworkVersion::new(4, 5) {
                    Some(FrameworkVersion::new(1, 1))
                } else {
                    None
                }
            }
            FrameworkFamily::NetCoreApp => match v.major() {
                0 | 1 => Some(FrameworkVersion::new(1, 6)),
                2 => Some(FrameworkVersion::new(2, 0)),
                _ => Some(FrameworkVersion::new(2, 1)),
            },
            FrameworkFamily::Any | FrameworkFamily::Opaque => None,
        }
    }

    /// Whether a project targeting `self` can consume `candidate`.
    pub fn accepts(&self, candidate: &Framework) -> bool {
        match candidate.family {
            FrameworkFamily::Any => return true,
            FrameworkFamily::Opaque => return self.folder == candidate.folder,
            _ => {}
        }
        if let Some(platform) = &candidate.platform {
            if self.platform.as_ref() != Some(platform)
                || candidate.platform_version > self.platform_version
            {
                return false;
            }
        }
        match (self.family, candidate.family) {
            (FrameworkFamily::NetFramework, FrameworkFamily::NetFramework)
            | (FrameworkFamily::NetCoreApp, FrameworkFamily::NetCoreApp)
            | (FrameworkFamily::NetStandard, FrameworkFamily::NetStandard) => {
                candidate.version <= self.version
            }
            (FrameworkFamily::NetFramework | FrameworkFamily::NetCoreApp, FrameworkFamily::NetStandard) => self
                .max_netstandard()
                .is_some_and(|max| candidate.version <= max),
            _ => false,
        }
    }

    /// Ranking of an accepted candidate; greater is nearer.
    fn nearness(&self, candidate: &Framework) -> (u8, FrameworkVersion, bool, FrameworkVersion) {
        let family_rank = match candidate.family {
            FrameworkFamily::Opaque => 4,
            f if f == self.family => 3,
            FrameworkFamily::NetStandard => 2,
            FrameworkFamily::Any => 1,
            _ => 0,
        };
        (
            family_rank,
            candidate.version,
            candidate.platform.is_some(),
            candidate.platform_version,
        )
    }

    /// Preference when no target is requested.
    fn inference_rank(&self) -> (u8, FrameworkVersion, bool) {
        let family_rank = match self.family {
            FrameworkFamily::NetCoreApp => 5,
            FrameworkFamily::NetStandard => 4,
            FrameworkFamily::NetFramework => 3,
            FrameworkFamily::Any => 2,
            FrameworkFamily::Opaque => 1,
        };
        (family_rank, self.version, self.platform.is_none())
    }
}

fn parse_known(folder: &str) -> Option<Framework> {
    let (head, platform_part) = match folder.split_once('-') {
        Some((head, platform)) => (head, Some(platform)),
        None => (folder, None),
    };

    let (family, version) = if let Some(rest) = head.strip_prefix("netstandard") {
        (FrameworkFamily::NetStandard, FrameworkVersion::parse_dotted(rest)?)
    } else if let Some(rest) = head.strip_prefix("netcoreapp") {
        (FrameworkFamily::NetCoreApp, FrameworkVersion::parse_dotted(rest)?)
    } else if let Some(rest) = head.strip_prefix("net") {
        if rest.contains('.') {
            let version = FrameworkVersion::parse_dotted(rest)?;
            if version.major() >= 5 {
                (FrameworkFamily::NetCoreApp, version)
            } else {
                (FrameworkFamily::NetFramework, version)
            }
        } else {
            (FrameworkFamily::NetFramework, FrameworkVersion::parse_compact(rest)?)
        }
    } else {
        return None;
    };

    // Platform suffixes only exist on net5.0+.
    let (platform, platform_version) = match platform_part {
        None => (None, FrameworkVersion::default()),
        Some(_) if family != FrameworkFamily::NetCoreApp || version.major() < 5 => return None,
        Some(text) => {
            let split = text
                .find(|c: char| c.is_ascii_digit())
                .unwrap_or(text.len());
            let (name, digits) = text.split_at(split);
            if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphabetic()) {
                return None;
            }
            let platform_version = if digits.is_empty() {
                default_platform_version(name)
            } else {
                FrameworkVersion::parse_dotted(digits)?
            };
            (Some(name.to_string()), platform_version)
        }
    };

    Some(Framework {
        family,
        version,
        platform,
        platform_version,
        folder: folder.to_string(),
    })
}

/// Version implied by a bare platform name: `net5.0-windows` means
/// `net5.0-windows7.0`.
fn default_platform_version(platform: &str) -> FrameworkVersion {
    match platform {
        "windows" => FrameworkVersion::new(7, 0),
        _ => FrameworkVersion::default(),
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.folder)
    }
}

impl Ord for Framework {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.family, self.version, &self.platform, self.platform_version, &self.folder).cmp(&(
            other.family,
            other.version,
            &other.platform,
            other.platform_version,
            &other.folder,
        ))
    }
}

impl PartialOrd for Framework {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The nearest variant of `available` that `target` can consume.
pub fn select_nearest<'a>(target: &Framework, available: &'a [Framework]) -> Option<&'a Framework> {
    available
        .iter()
        .filter(|candidate| target.accepts(candidate))
        .max_by(|a, b| {
            target
                .nearness(a)
                .cmp(&target.nearness(b))
                .then_with(|| b.cmp(a))
        })
}

/// The target assumed when the caller requests none: the most preferred
/// variant the package ships.
pub fn infer_target(available: &[Framework]) -> Option<&Framework> {
    available.iter().max_by(|a, b| {
        a.inference_rank()
            .cmp(&b.inference_rank())
            .then_with(|| b.cmp(a))
    })
}

/// Outcome of variant selection. `selected == None` is a failure; the
/// sorted `available` list is reported alongside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantSelection {
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
    pub available: Vec<String>,
}

impl VariantSelection {
    /// Select for an explicit or inferred target. An empty `available` list
    /// yields no target and no selection.
    pub fn resolve(requested: Option<&str>, available: &[Framework]) -> Self {
        let mut sorted = available.to_vec();
        sorted.sort();
        sorted.dedup();

        let target = match requested {
            Some(text) => Some(Framework::parse(text)),
            None => infer_target(&sorted).cloned(),
        };
        let selected = target
            .as_ref()
            .and_then(|t| select_nearest(t, &sorted))
            .map(|f| f.folder().to_string());

        VariantSelection {
            target: target.map(|t| t.folder().to_string()).unwrap_or_default(),
            selected,
            available: sorted.iter().map(|f| f.folder().to_string()).collect(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.selected.is_some()
    }
}
