mod cargo_toml;
mod composer;
mod gemfile;
mod gomod;
mod package_json;
mod pipfile;
mod pom_xml;
mod pyproject;
mod requirements_txt;

pub use cargo_toml::CargoTomlManifest;
pub use composer::ComposerManifest;
pub use gemfile::GemfileManifest;
pub use gomod::GoModManifest;
pub use package_json::PackageJsonManifest;
pub use pipfile::PipfileManifest;
pub use pom_xml::PomXmlManifest;
pub use pyproject::PyprojectManifest;
pub use requirements_txt::RequirementsTxtManifest;
