//! Translation of declarative ADC declarations into appliance config objects.
//!
//! A declaration describes the desired state of an application delivery
//! controller as tenants, applications and typed objects (pools, monitors,
//! TLS profiles, virtual services and so on). An executor applying that
//! state needs the opposite: a flat, ordered list of imperative config
//! objects, each a command, an absolute path and a property map. This crate
//! performs that translation. It is pure: it never mutates the declaration,
//! never talks to a device, and produces the same output for the same input.
//!
//! # Architecture
//!
//! ## Foundations
//!
//! - [`error`]: Per-item translation errors
//! - [`version`]: Lenient version comparison and the feature matrix
//! - [`context`]: Target facts: version, provisioned modules, inventory
//! - [`naming`]: Path building, route domains, content-hash names
//! - [`normalize`]: Value normalisation and property aliases
//!
//! ## Translation
//!
//! - [`resolver`]: Pointer resolution (`use`, `bigip`) with cycle guard
//! - [`registry`]: The closed set of supported classes and their translators
//! - [`translators`]: One translator per class family
//!   - Tenant/application containers, service discovery
//!   - Pools, nodes, monitors, profiles, TLS, certificates
//!   - Services (virtual servers) with implied profiles and redirects
//!   - Security, firewall and GSLB objects
//! - [`engine`]: Whole-declaration walk with per-item failure isolation
//! - [`postprocess`]: Profile link merging, duplicate collapse, path updates
//!
//! ## Reporting
//!
//! - [`report`]: Terminal-friendly colored output
//!
//! # Workflow
//!
//! 1. **Parse** the declaration with `decl_core::parse_file`
//! 2. **Describe** the target with a [`Context`]
//! 3. **Translate** with [`translate_declaration`]
//! 4. **Write** the [`TranslationResult`](decl_core::TranslationResult) for
//!    the executor
//!
//! # Examples
//!
//! ```ignore
//! use adc_translate::context::{Context, EmptyInventory};
//! use adc_translate::translate_declaration;
//! use adc_translate::version::Version;
//! use decl_core::parse_file;
//!
//! let decl = parse_file("declaration.json".as_ref())?;
//! let ctx = Context::new(Version::parse("16.1"), &EmptyInventory).with_modules(["ltm", "asm"]);
//! let outcome = translate_declaration(&ctx, &decl);
//! println!("{} config objects", outcome.result.configs.len());
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod naming;
pub mod normalize;
pub mod postprocess;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod translators;
pub mod version;

pub use context::{Context, EmptyInventory, InventoryReader, StaticInventory};
pub use engine::{translate_declaration, ItemFailure, Outcome};
pub use error::TranslateError;
pub use registry::ObjectKind;
