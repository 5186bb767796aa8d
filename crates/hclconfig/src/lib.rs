//! # hclconfig - resource addressing and dynamic schemas for hcl configuration
//!
//! ## Introduction for developers
//!
//! Read this to understand how `hclconfig` works internally.
//!
//! ### HCL Terms
//!
//! Quick introduction to terms used to describe elements of HCL documents.
//!
//! In hcl terms...
//! - a file gets parsed as a `body`
//! - ...which is just a list of `structures`
//! - ...where there are two kinds:
//!   - `attribute`: a "key = value" pair
//!   - or `block`:
//!     - 1 `identifier`
//!     - followed by 0 or more `labels`
//!     - and a `body` enclosed in `{` and `}`
//!
//! A configuration is made of resource blocks:
//! ```hcl
//! variable "image" {
//!   default = "nginx"
//! }
//!
//! resource "container" "app" {
//!   image = variable.image
//!
//!   network {
//!     name = "main"
//!   }
//! }
//!
//! output "network" {
//!   value = resource.container.app.network[0].name
//! }
//! ```
//!
//! ### Loading files
//!
//! An `.hcl` document is parsed as a `body` ([hcl_edit::structure::Body]). We use [hcl_documents::HclDocuments] to
//! store all (root) Attributes and Blocks of all documents and track their original source path, so problems can
//! be reported against the file they came from.
//!
//! ### Resources
//!
//! see [hcl_documents::HclDocuments::resources]
//!
//! Each root block becomes a [resource::Resource] with a [value::Value] body. Resource kinds registered in a
//! [registry::Registry] are decoded into their template [types::Type], everything else stays an untyped object.
//! Bare references such as `variable.image` are not evaluated here, they are recorded as pending
//! [resource::Reference]s and filled in by [resource::ResourceSet::apply_references] once their source is complete.
//!
//! ### Addressing
//!
//! References are [fqrn::Fqrn]s: module path, kind, name and an attribute path. The resource part selects an
//! entry of the [resource::ResourceSet], the attribute part is a [path::Path] handed to the
//! [lookup::Navigator], which walks structs, objects and arrays (aggregating over collections where needed).
//!
//! | **reference**                                  | **resource**              | **attribute**    |
//! |------------------------------------------------|---------------------------|------------------|
//! | `variable.image`                               | `variable.image`          |                  |
//! | `resource.container.app.network[0].name`       | `resource.container.app`  | `network.0.name` |
//! | `module.db.resource.container.main.network.*`  | `module.db.resource.container.main` | `network.*` |
//!
//! ### Dynamic schemas
//!
//! Resource kinds owned by another process are exchanged as [schema::SchemaNode] trees. The receiving side
//! reconstructs an equivalent [types::Type] ([schema::reconstruct]), decodes configuration into it and hands the
//! result back as a json document, which the owner turns into its concrete type ([schema::exchange]).
//!
pub mod fqrn;
pub mod hcl_documents;
pub mod lookup;
pub mod path;
pub mod registry;
pub mod resource;
pub mod schema;
pub mod types;
pub mod value;
mod visit;
