//! Business-aware terminology substitution for localization resources.
//!
//! A [`TermCatalog`] lists sensitive phrases and, for each business type, the
//! wording that should replace them. The pipeline is:
//!
//! 1. Flatten a resource [`Tree`] into [`TranslationEntry`] values.
//! 2. Plan substitutions with [`SubstitutionPlanner`], producing a reviewable
//!    [`ChangeSet`]. Overlapping phrases are arbitrated longest-first and
//!    substitution is a single pass, so replacements never chain.
//! 3. Review the change set (approve, reject or override each record).
//! 4. Apply it with [`Applier`], one output tree per business type.
//!
//! [`MergeEngine`] combines several trees (for example one per language) and
//! reports disagreements as conflicts instead of picking a winner.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use termshift::{
//!     Applier, ApplyMode, BusinessVariant, SourceKind, SubstitutionPlanner, Term, TermCatalog,
//!     Tree,
//! };
//!
//! let catalog = TermCatalog::new(
//!     ["enterprise"],
//!     [Term::new("學生", "身份"), Term::new("大學生", "身份")],
//!     [
//!         BusinessVariant::new("學生", "enterprise", "人員"),
//!         BusinessVariant::new("大學生", "enterprise", "資深員工"),
//!     ],
//! )
//! .unwrap();
//!
//! let tree = Tree::from_json(&json!({"title": "大學生活動"})).unwrap();
//! let mut changes = SubstitutionPlanner::new(&catalog)
//!     .plan(&tree.entries(SourceKind::Json), catalog.business_types());
//! changes.approve_all_proposed();
//!
//! let output = Applier::new(&tree)
//!     .apply_one(&changes, "enterprise", ApplyMode::Full)
//!     .unwrap();
//! assert_eq!(output.to_json(), json!({"title": "資深員工活動"}));
//! ```

pub mod apply;
pub mod catalog;
pub mod changeset;
pub mod entry;
pub mod error;
pub mod index;
pub mod loader;
pub mod matcher;
pub mod merge;
pub mod planner;
pub mod tree;

pub use apply::{Applier, ApplyMode};
pub use catalog::{BusinessVariant, ReplacementMap, Term, TermCatalog};
pub use changeset::{ChangeKey, ChangeRecord, ChangeSet, ChangeStatus};
pub use entry::{SourceKind, TranslationEntry};
pub use error::{ApplyError, CatalogError, LoadError, MergeError, ReviewError, TreeError};
pub use matcher::{MatchOutcome, MatchResult, Matcher, Occurrence, Substitution};
pub use merge::{Conflict, MergeEngine, MergeOutcome, Slot};
pub use planner::SubstitutionPlanner;
pub use tree::{KeyPath, Node, Tree};
