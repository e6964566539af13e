//! Per-ecosystem manifest readers: turn a local file's declared direct
//! dependencies into the same [`graph::Dag`] shape a registry crawl
//! produces, either shallow (no resolver) or expanded into the full
//! transitive closure (resolver attached).

mod parser;
mod parsers;

pub use parser::{ManifestParser, ManifestResult};
pub use parsers::{
    CargoTomlManifest, ComposerManifest, GemfileManifest, GoModManifest, PackageJsonManifest,
    PipfileManifest, PomXmlManifest, PyprojectManifest, RequirementsTxtManifest,
};
