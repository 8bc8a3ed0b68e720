//! Lexical scope analysis for a JavaScript front end.
//!
//! Given an AST that a parser walks, this crate builds a tree of scopes,
//! declares the variables each scope owns, resolves every free identifier
//! reference to a binding in an enclosing scope (or to a dynamic/global
//! fallback), and finally decides the storage class of each variable — stack
//! slot, heap context slot, parameter slot, dynamic lookup, or global object
//! property — so that a code generator can emit loads and stores.
//!
//! The parser drives the builder API on [`ScopeTree`] while it walks its
//! input ([`ScopeTree::new_scope`], the `declare_*` family,
//! [`ScopeTree::add_unresolved`], …) and finishes with
//! [`ScopeTree::analyze`], which runs the pipeline:
//!
//! 1. propagate usage flags (direct `eval`, asm.js) through the tree,
//! 2. resolve every unresolved [`resolve::VariableProxy`],
//! 3. allocate storage bottom-up,
//! 4. produce a serialized [`scope_info::ScopeInfo`] per scope that needs one.
//!
//! All scopes, variables, proxies, and declarations live in a single
//! [`ScopeTree`] arena and reference each other by id; dropping the tree
//! frees the whole graph at once. Interned identifier names compare by
//! [`intern::NameId`] identity.

pub mod allocate;
pub mod declare;
pub mod intern;
pub mod map;
pub mod print;
pub mod resolve;
pub mod scope;
pub mod scope_info;
pub mod snapshot;
pub mod variable;

pub use allocate::AnalyzeInfo;
pub use declare::Declaration;
pub use declare::DeclarationId;
pub use declare::DeclarationKind;
pub use declare::DeclaredVariable;
pub use declare::RedeclarationError;
pub use intern::NameId;
pub use intern::NameInterner;
pub use resolve::ProxyId;
pub use resolve::VariableProxy;
pub use scope::Scope;
pub use scope::ScopeId;
pub use scope::ScopeTree;
pub use scope::ScopeType;
pub use scope_info::ContextFrame;
pub use scope_info::DeserializationMode;
pub use scope_info::ScopeInfo;
pub use snapshot::Snapshot;
pub use variable::InitializationFlag;
pub use variable::MaybeAssignedFlag;
pub use variable::Variable;
pub use variable::VariableId;
pub use variable::VariableKind;
pub use variable::VariableLocation;
pub use variable::VariableMode;

use serde::Deserialize;
use serde::Serialize;

/// Number of slots reserved at the start of every heap-resident context frame
/// for the frame header. Context-allocated variables are numbered from here.
pub const MIN_CONTEXT_SLOTS: u32 = 4;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum LanguageMode {
  Sloppy,
  Strict,
}

impl LanguageMode {
  pub fn is_sloppy(self) -> bool {
    self == LanguageMode::Sloppy
  }

  pub fn is_strict(self) -> bool {
    self == LanguageMode::Strict
  }
}

/// The kind of function a declaration scope was created for. Influences the
/// receiver binding, the default function variables, and scope printing.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum FunctionKind {
  #[default]
  NormalFunction,
  ArrowFunction,
  GeneratorFunction,
  AsyncFunction,
  ConciseMethod,
  AccessorFunction,
  BaseConstructor,
  DerivedConstructor,
  Module,
}

impl FunctionKind {
  pub fn is_arrow_function(self) -> bool {
    self == FunctionKind::ArrowFunction
  }

  pub fn is_generator_function(self) -> bool {
    self == FunctionKind::GeneratorFunction
  }

  pub fn is_async_function(self) -> bool {
    self == FunctionKind::AsyncFunction
  }

  pub fn is_concise_method(self) -> bool {
    self == FunctionKind::ConciseMethod
  }

  pub fn is_accessor_function(self) -> bool {
    self == FunctionKind::AccessorFunction
  }

  pub fn is_class_constructor(self) -> bool {
    matches!(
      self,
      FunctionKind::BaseConstructor | FunctionKind::DerivedConstructor
    )
  }

  /// Constructors of derived classes must run `super()` before `this` is
  /// usable, so their receiver binding needs initialization.
  pub fn is_derived_constructor(self) -> bool {
    self == FunctionKind::DerivedConstructor
  }
}
