//! Manifest definitions, manifest registry, and VM resource encoding for rapidos.
//!
//! This crate defines the schema layer: TOML manifest parsing (`Manifest`),
//! builder strategy selection (`BuilderKind`), the explicit `ManifestRegistry`
//! populated from built-in manifests, and the `Resources` codec that persists
//! CPU/memory/network settings as extended attributes on a cut image.

pub mod builtin;
pub mod manifest;
pub mod registry;
pub mod resources;

pub use builtin::{builtin_manifests, BuiltinManifest, BUILTIN_MANIFESTS};
pub use manifest::{
    parse_manifest_file, parse_manifest_str, BuilderKind, FileMapping, Inventory, Manifest,
    ManifestError,
};
pub use registry::{ManifestRegistry, RegistryError};
pub use resources::{
    pack_mem_cpu, unpack_mem_cpu, validate_mem_str, ResourceError, Resources, DEFAULT_CPUS,
    DEFAULT_MEMORY, XATTR_NETWORKLESS, XATTR_RESOURCES,
};
