//! Static dispatch table: given an ecosystem name (or alias) or a manifest
//! filename, produce the matching [`Resolver`] and [`ManifestParser`].
//!
//! A [`Language`] is a descriptor value, not a trait object — every
//! ecosystem wires together one [`registry::Fetcher`] implementation and
//! zero or more [`ManifestParser`] implementations behind the same two
//! function pointers, so adding an ecosystem means adding one [`Language`]
//! constant to [`LanguageRegistry::with_defaults`], not a new trait impl.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use depgraph_cache::Cache;
use crawler::{Crawler, Resolver};
use manifest::{
    CargoTomlManifest, ComposerManifest, GemfileManifest, GoModManifest, ManifestParser,
    PackageJsonManifest, PipfileManifest, PomXmlManifest, PyprojectManifest,
    RequirementsTxtManifest,
};
use registry::{
    CratesIoFetcher, Fetcher, GoProxyFetcher, MavenFetcher, NpmFetcher, PackagistFetcher,
    PypiFetcher, RubyGemsFetcher,
};

type FetcherFactory = fn(Arc<dyn Cache>, Duration) -> Arc<dyn Fetcher>;
type ManifestFactory =
    fn(&str, Option<Arc<dyn Resolver>>) -> Option<Arc<dyn ManifestParser>>;

/// Static descriptor wiring one ecosystem's registry fetcher and manifest
/// parsers together.
pub struct Language {
    /// Canonical registry id, e.g. `"pypi"`.
    pub name: &'static str,
    /// Same as `name`; kept distinct for descriptors whose default registry
    /// differs from their display name (none currently do, but downstream
    /// code should read this rather than `name` when building a resolver).
    pub default_registry: &'static str,
    /// Manifest filenames this language recognizes, in the order `manifest`
    /// should try them.
    pub manifest_filenames: &'static [&'static str],
    /// Optional name-normalization hook applied before a resolver call,
    /// e.g. PyPI's PEP 503 form.
    pub normalize_name: Option<fn(&str) -> String>,
    fetcher_factory: FetcherFactory,
    manifest_factory: ManifestFactory,
}

impl Language {
    /// Build a [`Resolver`] backed by this language's [`registry::Fetcher`].
    pub fn resolver(&self, cache: Arc<dyn Cache>, ttl: Duration) -> Arc<dyn Resolver> {
        Arc::new(Crawler::new((self.fetcher_factory)(cache, ttl)))
    }

    /// Build the [`ManifestParser`] matching `name_or_filename`, optionally
    /// wired to `resolver` for transitive expansion. `None` if this
    /// language doesn't recognize the name.
    pub fn manifest(
        &self,
        name_or_filename: &str,
        resolver: Option<Arc<dyn Resolver>>,
    ) -> Option<Arc<dyn ManifestParser>> {
        (self.manifest_factory)(name_or_filename, resolver)
    }

    /// True if this language has at least one manifest dialect.
    pub fn has_manifests(&self) -> bool {
        !self.manifest_filenames.is_empty()
    }

    /// Apply [`Language::normalize_name`] if set, otherwise return `name`
    /// unchanged.
    pub fn normalize(&self, name: &str) -> String {
        match self.normalize_name {
            Some(f) => f(name),
            None => name.to_string(),
        }
    }
}

fn pypi_manifest_factory(
    name_or_filename: &str,
    resolver: Option<Arc<dyn Resolver>>,
) -> Option<Arc<dyn ManifestParser>> {
    match name_or_filename {
        "pyproject.toml" | "pyproject" => Some(Arc::new(PyprojectManifest::new(resolver))),
        "requirements.txt" | "requirements" => {
            Some(Arc::new(RequirementsTxtManifest::new(resolver)))
        }
        "Pipfile" | "pipfile" => Some(Arc::new(PipfileManifest::new(resolver))),
        _ => None,
    }
}

fn npm_manifest_factory(
    name_or_filename: &str,
    resolver: Option<Arc<dyn Resolver>>,
) -> Option<Arc<dyn ManifestParser>> {
    match name_or_filename {
        "package.json" | "npm" => Some(Arc::new(PackageJsonManifest::new(resolver))),
        _ => None,
    }
}

fn cargo_manifest_factory(
    name_or_filename: &str,
    resolver: Option<Arc<dyn Resolver>>,
) -> Option<Arc<dyn ManifestParser>> {
    match name_or_filename {
        "Cargo.toml" | "cargo" => Some(Arc::new(CargoTomlManifest::new(resolver))),
        _ => None,
    }
}

fn rubygems_manifest_factory(
    name_or_filename: &str,
    resolver: Option<Arc<dyn Resolver>>,
) -> Option<Arc<dyn ManifestParser>> {
    match name_or_filename {
        "Gemfile" | "rubygems" => Some(Arc::new(GemfileManifest::new(resolver))),
        _ => None,
    }
}

fn packagist_manifest_factory(
    name_or_filename: &str,
    resolver: Option<Arc<dyn Resolver>>,
) -> Option<Arc<dyn ManifestParser>> {
    match name_or_filename {
        "composer.json" | "composer" => Some(Arc::new(ComposerManifest::new(resolver))),
        _ => None,
    }
}

fn maven_manifest_factory(
    name_or_filename: &str,
    resolver: Option<Arc<dyn Resolver>>,
) -> Option<Arc<dyn ManifestParser>> {
    match name_or_filename {
        "pom.xml" | "maven" => Some(Arc::new(PomXmlManifest::new(resolver))),
        _ => None,
    }
}

fn go_manifest_factory(
    name_or_filename: &str,
    resolver: Option<Arc<dyn Resolver>>,
) -> Option<Arc<dyn ManifestParser>> {
    match name_or_filename {
        "go.mod" | "go" => Some(Arc::new(GoModManifest::new(resolver))),
        _ => None,
    }
}

const PYPI: Language = Language {
    name: "pypi",
    default_registry: "pypi",
    manifest_filenames: &["pyproject.toml", "requirements.txt", "Pipfile"],
    normalize_name: Some(http_adapter::normalize::normalize_pkg_name),
    fetcher_factory: |cache, ttl| Arc::new(PypiFetcher::new(cache, ttl)),
    manifest_factory: pypi_manifest_factory,
};

const NPM: Language = Language {
    name: "npm",
    default_registry: "npm",
    manifest_filenames: &["package.json"],
    normalize_name: None,
    fetcher_factory: |cache, ttl| Arc::new(NpmFetcher::new(cache, ttl)),
    manifest_factory: npm_manifest_factory,
};

const CRATES_IO: Language = Language {
    name: "crates.io",
    default_registry: "crates.io",
    manifest_filenames: &["Cargo.toml"],
    normalize_name: None,
    fetcher_factory: |cache, ttl| Arc::new(CratesIoFetcher::new(cache, ttl)),
    manifest_factory: cargo_manifest_factory,
};

const RUBYGEMS: Language = Language {
    name: "rubygems",
    default_registry: "rubygems",
    manifest_filenames: &["Gemfile"],
    normalize_name: None,
    fetcher_factory: |cache, ttl| Arc::new(RubyGemsFetcher::new(cache, ttl)),
    manifest_factory: rubygems_manifest_factory,
};

const PACKAGIST: Language = Language {
    name: "packagist",
    default_registry: "packagist",
    manifest_filenames: &["composer.json"],
    normalize_name: None,
    fetcher_factory: |cache, ttl| Arc::new(PackagistFetcher::new(cache, ttl)),
    manifest_factory: packagist_manifest_factory,
};

const MAVEN: Language = Language {
    name: "maven",
    default_registry: "maven",
    manifest_filenames: &["pom.xml"],
    normalize_name: None,
    fetcher_factory: |cache, ttl| Arc::new(MavenFetcher::new(cache, ttl)),
    manifest_factory: maven_manifest_factory,
};

const GO: Language = Language {
    name: "go",
    default_registry: "go",
    manifest_filenames: &["go.mod"],
    normalize_name: None,
    fetcher_factory: |cache, ttl| Arc::new(GoProxyFetcher::new(cache, ttl)),
    manifest_factory: go_manifest_factory,
};

/// The dispatch table: every [`Language`] this crate knows about, looked up
/// by registry name/alias or by manifest filename.
pub struct LanguageRegistry {
    languages: Vec<&'static Language>,
    aliases: HashMap<&'static str, &'static Language>,
    by_filename: HashMap<&'static str, &'static Language>,
}

impl LanguageRegistry {
    /// Build the registry with all seven built-in ecosystems.
    pub fn with_defaults() -> Self {
        let languages: Vec<&'static Language> =
            vec![&PYPI, &NPM, &CRATES_IO, &RUBYGEMS, &PACKAGIST, &MAVEN, &GO];

        let mut aliases = HashMap::new();
        aliases.insert("pypi", &PYPI);
        aliases.insert("python", &PYPI);
        aliases.insert("pip", &PYPI);
        aliases.insert("npm", &NPM);
        aliases.insert("node", &NPM);
        aliases.insert("javascript", &NPM);
        aliases.insert("crates.io", &CRATES_IO);
        aliases.insert("cargo", &CRATES_IO);
        aliases.insert("rust", &CRATES_IO);
        aliases.insert("rubygems", &RUBYGEMS);
        aliases.insert("ruby", &RUBYGEMS);
        aliases.insert("gem", &RUBYGEMS);
        aliases.insert("packagist", &PACKAGIST);
        aliases.insert("composer", &PACKAGIST);
        aliases.insert("php", &PACKAGIST);
        aliases.insert("maven", &MAVEN);
        aliases.insert("java", &MAVEN);
        aliases.insert("go", &GO);
        aliases.insert("golang", &GO);

        let mut by_filename = HashMap::new();
        for lang in &languages {
            for filename in lang.manifest_filenames {
                by_filename.insert(*filename, *lang);
            }
        }

        LanguageRegistry {
            languages,
            aliases,
            by_filename,
        }
    }

    /// Look up a [`Language`] by its canonical name or a known alias.
    /// Case-insensitive.
    pub fn by_name(&self, name: &str) -> Option<&'static Language> {
        let lower = name.to_lowercase();
        self.aliases.get(lower.as_str()).copied()
    }

    /// Look up a [`Language`] by a manifest's basename.
    pub fn by_manifest_filename(&self, filename: &str) -> Option<&'static Language> {
        self.by_filename.get(filename).copied()
    }

    /// Every registered language, in a stable order.
    pub fn languages(&self) -> &[&'static Language] {
        &self.languages
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_aliases_case_insensitively() {
        let registry = LanguageRegistry::with_defaults();
        assert_eq!(registry.by_name("PyPI").unwrap().name, "pypi");
        assert_eq!(registry.by_name("python").unwrap().name, "pypi");
        assert!(registry.by_name("cobol").is_none());
    }

    #[test]
    fn resolves_manifest_filenames_to_the_right_language() {
        let registry = LanguageRegistry::with_defaults();
        assert_eq!(
            registry.by_manifest_filename("go.mod").unwrap().name,
            "go"
        );
        assert_eq!(
            registry.by_manifest_filename("package.json").unwrap().name,
            "npm"
        );
        assert!(registry.by_manifest_filename("unknown.file").is_none());
    }

    #[test]
    fn pypi_normalizes_names_others_pass_through() {
        let registry = LanguageRegistry::with_defaults();
        let pypi = registry.by_name("pypi").unwrap();
        assert_eq!(pypi.normalize("FastAPI"), "fastapi");

        let npm = registry.by_name("npm").unwrap();
        assert_eq!(npm.normalize("Left-Pad"), "Left-Pad");
    }

    #[test]
    fn builds_a_manifest_parser_for_a_known_filename() {
        let registry = LanguageRegistry::with_defaults();
        let go = registry.by_name("go").unwrap();
        assert!(go.manifest("go.mod", None).is_some());
        assert!(go.manifest("Cargo.toml", None).is_none());
    }
}
