//! The `.nuspec` manifest at the package root.
//!
//! Only identity and the declared dependency groups are read. Dependencies
//! are reported as declared; nothing here resolves them.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;

use crate::archive::PackageArchive;
use crate::error::PackageError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NuspecManifest {
    pub id: String,
    pub version: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependency_groups: Vec<DependencyGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_framework: Option<String>,
    pub dependencies: Vec<Dependency>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl NuspecManifest {
    /// Read the manifest of a package. `Ok(None)` when the package has no
    /// root-level `.nuspec` entry.
    pub fn from_archive<A: PackageArchive + ?Sized>(
        archive: &mut A,
    ) -> Result<Option<Self>, PackageError> {
        let Some(name) = archive
            .entries()
            .into_iter()
            .find(|n| !n.contains('/') && n.to_ascii_lowercase().ends_with(".nuspec"))
        else {
            return Ok(None);
        };
        let bytes = archive.read_entry(&name)?;
        let text = String::from_utf8_lossy(&bytes);
        Self::parse(text.trim_start_matches('\u{feff}')).map(Some)
    }

    pub fn parse(xml: &str) -> Result<Self, PackageError> {
        let mut reader = Reader::from_str(xml);
        let mut manifest = NuspecManifest::default();
        // Local names of the open elements.
        let mut path: Vec<Vec<u8>> = Vec::new();
        // Dependencies declared directly under <dependencies>.
        let mut ungrouped = DependencyGroup::default();

        loop {
            let event = reader.read_event().map_err(|e| {
                PackageError::Manifest(format!("at byte {}: {}", reader.error_position(), e))
            })?;
            match event {
                Event::Start(e) => {
                    manifest.element(&e, &path, &mut ungrouped)?;
                    path.push(e.local_name().as_ref().to_vec());
                }
                Event::Empty(e) => manifest.element(&e, &path, &mut ungrouped)?,
                Event::Text(t) => {
                    let field = match path_tail(&path).as_slice() {
                        [.., b"metadata", b"id"] => &mut manifest.id,
                        [.., b"metadata", b"version"] => &mut manifest.version,
                        _ => continue,
                    };
                    let text = t
                        .unescape()
                        .map_err(|e| PackageError::Manifest(e.to_string()))?;
                    field.push_str(text.trim());
                }
                Event::End(_) => {
                    path.pop();
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !ungrouped.dependencies.is_empty() {
            manifest.dependency_groups.insert(0, ungrouped);
        }
        if manifest.id.is_empty() {
            return Err(PackageError::Manifest("missing <id>".to_string()));
        }
        Ok(manifest)
    }

    fn element(
        &mut self,
        e: &BytesStart<'_>,
        parents: &[Vec<u8>],
        ungrouped: &mut DependencyGroup,
    ) -> Result<(), PackageError> {
        match (e.local_name().as_ref(), path_tail(parents).as_slice()) {
            (b"group", [.., b"dependencies"]) => {
                self.dependency_groups.push(DependencyGroup {
                    target_framework: attr(e, "targetFramework")?,
                    dependencies: Vec::new(),
                });
            }
            (b"dependency", [.., b"dependencies", b"group"]) => {
                let dependency = dependency(e)?;
                if let Some(group) = self.dependency_groups.last_mut() {
                    group.dependencies.push(dependency);
                }
            }
            (b"dependency", [.., b"dependencies"]) => {
                ungrouped.dependencies.push(dependency(e)?);
            }
            _ => {}
        }
        Ok(())
    }
}

fn path_tail(path: &[Vec<u8>]) -> Vec<&[u8]> {
    path.iter().map(Vec::as_slice).collect()
}

fn dependency(e: &BytesStart<'_>) -> Result<Dependency, PackageError> {
    Ok(Dependency {
        id: attr(e, "id")?.unwrap_or_default(),
        version: attr(e, "version")?,
    })
}

fn attr(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, PackageError> {
    match e
        .try_get_attribute(name)
        .map_err(|e| PackageError::Manifest(e.to_string()))?
    {
        Some(a) => Ok(Some(
            a.unescape_value()
                .map_err(|e| PackageError::Manifest(e.to_string()))?
                .into_owned(),
        )),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryPackage;

    const NUSPEC: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd">
  <metadata>
    <id>Acme.Widgets</id>
    <version>2.1.0</version>
    <authors>Acme</authors>
    <dependencies>
      <group targetFramework=".NETStandard2.0">
        <dependency id="System.Memory" version="4.5.5" exclude="Build" />
      </group>
      <group targetFramework="net8.0" />
    </dependencies>
  </metadata>
</package>"#;

    #[test]
    fn reads_identity_and_groups() {
        let manifest = NuspecManifest::parse(NUSPEC).unwrap();
        assert_eq!(manifest.id, "Acme.Widgets");
        assert_eq!(manifest.version, "2.1.0");
        assert_eq!(manifest.dependency_groups.len(), 2);
        assert_eq!(
            manifest.dependency_groups[0].target_framework.as_deref(),
            Some(".NETStandard2.0")
        );
        assert_eq!(
            manifest.dependency_groups[0].dependencies,
            vec![Dependency {
                id: "System.Memory".to_string(),
                version: Some("4.5.5".to_string()),
            }]
        );
        assert!(manifest.dependency_groups[1].dependencies.is_empty());
    }

    #[test]
    fn flat_dependencies_form_an_untargeted_group() {
        let xml = r#"<package><metadata><id>A</id><version>1.0</version>
            <dependencies><dependency id="B"/></dependencies></metadata></package>"#;
        let manifest = NuspecManifest::parse(xml).unwrap();
        assert_eq!(manifest.dependency_groups.len(), 1);
        assert_eq!(manifest.dependency_groups[0].target_framework, None);
        assert_eq!(manifest.dependency_groups[0].dependencies[0].version, None);
    }

    #[test]
    fn missing_id_is_malformed() {
        let err = NuspecManifest::parse("<package><metadata/></package>").unwrap_err();
        assert!(matches!(err, PackageError::Manifest(_)));
        assert!(matches!(
            NuspecManifest::parse("<package><metadata>"),
            Err(PackageError::Manifest(_))
        ));
    }

    #[test]
    fn located_at_package_root() {
        let mut package = MemoryPackage::new()
            .with("lib/net8.0/Nested.nuspec", "<package/>")
            .with("Acme.Widgets.nuspec", NUSPEC);
        let manifest = NuspecManifest::from_archive(&mut package).unwrap().unwrap();
        assert_eq!(manifest.id, "Acme.Widgets");

        let mut bare = MemoryPackage::new().with("lib/net8.0/A.dll", "MZ");
        assert_eq!(NuspecManifest::from_archive(&mut bare).unwrap(), None);
    }
}
