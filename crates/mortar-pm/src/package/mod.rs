// Package model
//
// Immutable descriptors for packages, the links between them, and version
// aliases. Everything the solver needs to know about a package lives here;
// download/installation metadata belongs to the surrounding tooling.

mod alias;
mod link;
#[allow(clippy::module_inception)]
mod package;

pub use alias::{parse_inline_alias, AliasPackage};
pub use link::{Link, LinkKind};
pub use package::Package;

pub use mortar_semver::Stability;
