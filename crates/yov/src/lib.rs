//! # yov - yaml overlays
//!
//! Patch yaml documents with other yaml documents. Overlays describe *where* they apply with
//! annotations in comments and *what* they change with plain yaml.
//!
//! ## Introduction for developers
//!
//! Read this to understand how `yov` works internally.
//!
//! ### Example
//!
//! Base:
//! ```yaml
//! kind: Deployment
//! spec:
//!   containers:
//!   - name: web
//!     image: web-v1
//!   - name: sidecar
//!     image: proxy-v1
//! ```
//!
//! Overlay:
//! ```yaml
//! #@overlay/match by=overlay.subset({"kind": "Deployment"})
//! ---
//! spec:
//!   containers:
//!   #@overlay/match by="name"
//!   - name: sidecar
//!     image: proxy-v2
//! ```
//!
//! ### Loading files
//!
//! see [load]
//!
//! Yaml text becomes a tree of [node::Node]s: a document set holding documents, holding maps,
//! arrays and scalars. Every node knows its [position::Position] (`file:line`) so errors can
//! point at the offending input. Comments are attached to the nodes starting on their line;
//! comments starting with `#@` are parsed into [annotation::Annotations] (see
//! [annotation::syntax]).
//!
//! ### Matching
//!
//! see [matching::ItemMatch]
//!
//! For each overlay item we need the base items it targets. The `overlay/match` annotation
//! names a [predicate::Predicate] (`by=...`) that is called with the index of a base item, the
//! base item's value and the overlay item's value. A string `by="name"` is short for
//! `by=overlay.map_key("name")`.
//!
//! The number of matches is checked against the expected cardinality ([expects]): exactly one
//! unless `expects=...` or `missing_ok=True` say otherwise.
//!
//! ### Applying overlays
//!
//! see [overlay::apply]
//!
//! Overlay documents are matched against base documents, then their contents are merged
//! recursively: map items by key, array items by their `overlay/match` annotation.
//! `overlay/replace`, `overlay/remove` and `overlay/append` change what happens to the match.
//!
//! ### Output
//!
//! Nodes are reduced to [value::Fragment]s which in turn get serialized via [serde] ([render]).
//!
pub mod annotation;
pub mod expects;
pub mod load;
pub mod matching;
pub mod node;
pub mod overlay;
pub mod position;
pub mod predicate;
pub mod render;
pub mod value;
