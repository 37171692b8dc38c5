//! Template reference index and resolution.
//!
//! Templates are parsed and their references extracted into an
//! [`IndexStore`]; a [`Resolver`] answers go-to-definition, find-usages and
//! inheritance queries over it. [`Engine`] bundles both behind one
//! thread-safe handle:
//!
//! ```
//! use twls_semantic::{Engine, TemplateNames};
//! use twls_source::{ByteOffset, TemplateId};
//!
//! let engine = Engine::new(TemplateNames::new());
//! engine.index(TemplateId::new("b.twig"), "{% block content %}{% endblock %}");
//! engine.index(TemplateId::new("a.twig"), r#"{% extends "b.twig" %}"#);
//!
//! let chain = engine.inheritance_chain(&TemplateId::new("a.twig"));
//! assert_eq!(chain.templates, [TemplateId::new("b.twig")]);
//!
//! let target = engine.resolve_definition(&TemplateId::new("a.twig"), ByteOffset::new(13));
//! assert_eq!(target.map(|l| l.template), Some(TemplateId::new("b.twig")));
//! ```

mod cancel;
pub mod diagnostics;
mod engine;
pub mod jsonpath;
mod names;
mod record;
pub mod references;
mod resolver;
mod snapshot;
mod store;

pub use cancel::CancellationToken;
pub use cancel::Cancelled;
pub use diagnostics::Diagnostic;
pub use engine::Engine;
pub use engine::FileChange;
pub use jsonpath::JsonPath;
pub use jsonpath::JsonPathError;
pub use names::TemplateNames;
pub use record::content_hash;
pub use record::TemplateRecord;
pub use references::extract;
pub use references::Reference;
pub use references::ReferenceKind;
pub use references::TargetName;
pub use resolver::InheritanceChain;
pub use resolver::Location;
pub use resolver::Parent;
pub use resolver::Resolver;
pub use snapshot::IndexSnapshot;
pub use snapshot::TemplateSnapshot;
pub use snapshot::SNAPSHOT_VERSION;
pub use store::IndexStore;
