use crate::builtin::BUILTIN_MANIFESTS;
use crate::manifest::{parse_manifest_str, Manifest, ManifestError};
use crate::resources::{validate_mem_str, ResourceError};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid manifest with empty name")]
    EmptyName,
    #[error("{name}: invalid manifest CPU resource ({cpus})")]
    InvalidCpus { name: String, cpus: u8 },
    #[error("{name}: invalid manifest memory resource ({memory}): {source}")]
    InvalidMemory {
        name: String,
        memory: String,
        #[source]
        source: ResourceError,
    },
    #[error("{0}: manifest already present")]
    Duplicate(String),
    #[error("{name}: {source}")]
    Manifest {
        name: String,
        #[source]
        source: ManifestError,
    },
}

/// Name-indexed set of manifests, owned by the caller.
#[derive(Debug, Clone, Default)]
pub struct ManifestRegistry {
    manifests: BTreeMap<String, Manifest>,
}

impl ManifestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every manifest from [`BUILTIN_MANIFESTS`].
    pub fn with_builtin() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for builtin in BUILTIN_MANIFESTS {
            let manifest =
                parse_manifest_str(builtin.source).map_err(|source| RegistryError::Manifest {
                    name: builtin.name.to_owned(),
                    source,
                })?;
            registry.register(manifest)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, manifest: Manifest) -> Result<(), RegistryError> {
        if manifest.name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let name = manifest.name.clone();

        if manifest.resources.cpus < 1 {
            return Err(RegistryError::InvalidCpus {
                name,
                cpus: manifest.resources.cpus,
            });
        }
        if let Err(source) = validate_mem_str(&manifest.resources.memory) {
            return Err(RegistryError::InvalidMemory {
                name,
                memory: manifest.resources.memory,
                source,
            });
        }
        if let Err(source) = manifest.file_mappings() {
            return Err(RegistryError::Manifest { name, source });
        }
        if self.manifests.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }

        self.manifests.insert(name, manifest);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Manifest> {
        self.manifests.get(name)
    }

    /// Manifests in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Manifest> {
        self.manifests.values()
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{BuilderKind, Inventory};
    use crate::resources::Resources;

    fn manifest(name: &str) -> Manifest {
        Manifest {
            name: name.to_owned(),
            description: "test".to_owned(),
            init: format!("example.com/{name}/uinit"),
            builder: BuilderKind::CombinedBinary,
            inventory: Inventory::default(),
            resources: Resources::default(),
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut reg = ManifestRegistry::new();
        reg.register(manifest("alpha")).unwrap();
        assert_eq!(reg.lookup("alpha").unwrap().name, "alpha");
        assert!(reg.lookup("beta").is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut reg = ManifestRegistry::new();
        reg.register(manifest("alpha")).unwrap();
        let err = reg.register(manifest("alpha")).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(ref n) if n == "alpha"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn empty_name_rejected() {
        let mut reg = ManifestRegistry::new();
        assert!(matches!(
            reg.register(manifest("")),
            Err(RegistryError::EmptyName)
        ));
    }

    #[test]
    fn zero_cpus_rejected() {
        let mut reg = ManifestRegistry::new();
        let mut m = manifest("nocpu");
        m.resources.cpus = 0;
        assert!(matches!(
            reg.register(m),
            Err(RegistryError::InvalidCpus { cpus: 0, .. })
        ));
    }

    #[test]
    fn bad_memory_rejected() {
        let mut reg = ManifestRegistry::new();
        let mut m = manifest("badmem");
        m.resources.memory = "512MB".to_owned();
        let err = reg.register(m).unwrap_err();
        assert!(err.to_string().contains("512MB"));
    }

    #[test]
    fn bad_file_mapping_rejected() {
        let mut reg = ManifestRegistry::new();
        let mut m = manifest("badfile");
        m.inventory.files.push(":/nowhere".to_owned());
        assert!(matches!(
            reg.register(m),
            Err(RegistryError::Manifest { .. })
        ));
    }

    #[test]
    fn iter_is_name_ordered() {
        let mut reg = ManifestRegistry::new();
        for name in ["zeta", "alpha", "mu"] {
            reg.register(manifest(name)).unwrap();
        }
        let names: Vec<&str> = reg.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mu", "zeta"]);
    }

    #[test]
    fn builtin_registry_loads() {
        let reg = ManifestRegistry::with_builtin().unwrap();
        assert_eq!(reg.len(), BUILTIN_MANIFESTS.len());
        assert!(reg.lookup("example").is_some());
    }
}
