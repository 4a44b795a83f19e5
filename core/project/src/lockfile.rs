//! `lumina.lock.json` schema and package-spec resolution.
//!
//! A bare import spec (`pkg`, `pkg/sub`) resolves through the lockfile's
//! `packages` table: each entry's `lumina` field is either a single source
//! path or a map from export subpath to source path. Every failure mode has
//! its own stable diagnostic code so hosts can act on them individually.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const LOCKFILE_NAME: &str = "lumina.lock.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lockfile {
    #[serde(rename = "lockfileVersion")]
    pub lockfile_version: u32,
    #[serde(default)]
    pub packages: FxHashMap<String, PackageEntry>,
}

impl Lockfile {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageEntry {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub resolved: Option<String>,
    #[serde(default)]
    pub lumina: Option<LuminaField>,
}

/// The `lumina` field: one entry source, or a subpath-to-source map for
/// packages exposing several modules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LuminaField {
    Path(String),
    Subpaths(FxHashMap<String, String>),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("{LOCKFILE_NAME} not found; cannot resolve package import `{spec}`")]
    LockfileMissing { spec: String },
    #[error("package `{package}` is not present in {LOCKFILE_NAME}")]
    UnknownPackage { package: String },
    #[error("package `{package}` has no `lumina` field in {LOCKFILE_NAME}")]
    NoLuminaField { package: String },
    #[error("package `{package}` does not export subpath `{subpath}`")]
    NoSubpath { package: String, subpath: String },
}

impl ResolveError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        use lumina_sema::codes;
        match self {
            ResolveError::LockfileMissing { .. } => codes::PKG_004,
            ResolveError::UnknownPackage { .. } => codes::PKG_001,
            ResolveError::NoLuminaField { .. } => codes::PKG_002,
            ResolveError::NoSubpath { .. } => codes::PKG_003,
        }
    }
}

/// Resolves a bare import spec against the lockfile, producing the source
/// path its code is loaded from.
pub fn resolve_package(lockfile: Option<&Lockfile>, spec: &str) -> Result<String, ResolveError> {
    let Some(lockfile) = lockfile else {
        return Err(ResolveError::LockfileMissing { spec: spec.to_string() });
    };
    let (package, subpath) = match spec.split_once('/') {
        Some((package, subpath)) => (package, Some(subpath)),
        None => (spec, None),
    };
    let entry = lockfile
        .packages
        .get(package)
        .ok_or_else(|| ResolveError::UnknownPackage { package: package.to_string() })?;
    let lumina = entry
        .lumina
        .as_ref()
        .ok_or_else(|| ResolveError::NoLuminaField { package: package.to_string() })?;
    match (lumina, subpath) {
        (LuminaField::Path(path), None) => Ok(path.clone()),
        (LuminaField::Subpaths(map), subpath) => {
            let key = subpath.unwrap_or(".");
            map.get(key).cloned().ok_or_else(|| ResolveError::NoSubpath {
                package: package.to_string(),
                subpath: key.to_string(),
            })
        }
        (LuminaField::Path(_), Some(subpath)) => Err(ResolveError::NoSubpath {
            package: package.to_string(),
            subpath: subpath.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_sema::codes;

    fn lockfile(json: &str) -> Lockfile {
        Lockfile::parse(json).unwrap()
    }

    #[test]
    fn missing_lockfile_is_pkg_004_and_names_the_file() {
        let err = resolve_package(None, "pkg").unwrap_err();
        assert_eq!(err.code(), codes::PKG_004);
        assert!(err.to_string().contains("lumina.lock.json not found"));
    }

    #[test]
    fn unknown_package_is_pkg_001() {
        let lf = lockfile(r#"{"lockfileVersion":1,"packages":{}}"#);
        let err = resolve_package(Some(&lf), "pkg").unwrap_err();
        assert_eq!(err.code(), codes::PKG_001);
    }

    #[test]
    fn missing_lumina_field_is_pkg_002() {
        let lf = lockfile(r#"{"lockfileVersion":1,"packages":{"pkg":{"version":"1.0.0"}}}"#);
        let err = resolve_package(Some(&lf), "pkg").unwrap_err();
        assert_eq!(err.code(), codes::PKG_002);
    }

    #[test]
    fn missing_subpath_is_pkg_003() {
        let lf = lockfile(
            r#"{"lockfileVersion":1,"packages":{"pkg":{"lumina":{".":"pkg/index.lm"}}}}"#,
        );
        let err = resolve_package(Some(&lf), "pkg/extra").unwrap_err();
        assert_eq!(err.code(), codes::PKG_003);
    }

    #[test]
    fn string_lumina_field_resolves_root_import() {
        let lf = lockfile(r#"{"lockfileVersion":1,"packages":{"pkg":{"lumina":"pkg/index.lm"}}}"#);
        assert_eq!(resolve_package(Some(&lf), "pkg").unwrap(), "pkg/index.lm");
    }

    #[test]
    fn subpath_map_resolves_subpath_import() {
        let lf = lockfile(
            r#"{"lockfileVersion":1,"packages":{"pkg":{"lumina":{".":"pkg/index.lm","sub":"pkg/sub.lm"}}}}"#,
        );
        assert_eq!(resolve_package(Some(&lf), "pkg/sub").unwrap(), "pkg/sub.lm");
    }
}
