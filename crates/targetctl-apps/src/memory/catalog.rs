//! Bundle catalog for the simulated backend
//!
//! Maps host paths to the bundle metadata an installer would read from the
//! bundle itself. Catalog files look like:
//!
//! ```toml
//! [[bundles]]
//! path = "/builds/Example.ipa"
//! bundle_id = "com.example.app"
//! bundle_name = "Example"
//! install_type = "developer"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use targetctl_core::prelude::*;
use targetctl_core::InstallType;

/// Metadata for one installable bundle
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Bundle {
    /// Host path the bundle is installed from
    pub path: String,
    pub bundle_id: String,
    pub bundle_name: String,
    #[serde(default)]
    pub install_type: InstallType,
}

impl Bundle {
    pub fn new(
        path: impl Into<String>,
        bundle_id: impl Into<String>,
        bundle_name: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            bundle_id: bundle_id.into(),
            bundle_name: bundle_name.into(),
            install_type: InstallType::default(),
        }
    }

    pub fn with_install_type(mut self, install_type: InstallType) -> Self {
        self.install_type = install_type;
        self
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct CatalogFile {
    #[serde(default)]
    bundles: Vec<Bundle>,
}

/// Known bundles, keyed by host path
#[derive(Debug, Clone, Default)]
pub struct BundleCatalog {
    bundles: BTreeMap<String, Bundle>,
}

impl BundleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bundle (builder pattern); a later bundle at the same path wins
    pub fn with_bundle(mut self, bundle: Bundle) -> Self {
        self.insert(bundle);
        self
    }

    pub fn insert(&mut self, bundle: Bundle) {
        self.bundles.insert(bundle.path.clone(), bundle);
    }

    pub fn lookup(&self, path: &str) -> Option<&Bundle> {
        self.bundles.get(path)
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)
            .map_err(|e| Error::config(format!("Invalid bundle catalog: {}", e)))?;
        Ok(file
            .bundles
            .into_iter()
            .fold(Self::new(), |catalog, bundle| catalog.with_bundle(bundle)))
    }

    /// Load a catalog file
    ///
    /// Unlike settings, a missing or malformed catalog is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read bundle catalog {:?}", path))?;
        let catalog = Self::from_toml_str(&content)?;
        debug!("Loaded {} bundles from {:?}", catalog.len(), path);
        Ok(catalog)
    }
}
