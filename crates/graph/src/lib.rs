//! Data model shared by every layer above the registry fetchers: the
//! [`Package`] a fetcher returns, the [`Dag`] of [`Node`]s and [`Edge`]s a
//! crawl assembles, and the [`Options`] that configure a crawl.

mod dag;
mod options;
mod package;

pub use dag::{Dag, Edge, Node, NodeKind, PROJECT_ROOT_ID};
pub use options::{MetadataProvider, Options, PackageRef};
pub use package::Package;
