//! Declaration operations.
//!
//! The parser calls these while it builds the AST: parameters, locals, the
//! receiver, the default function variables, dynamic globals, and the main
//! entry [`ScopeTree::declare_variable`], which implements `var` hoisting,
//! the sloppy-direct-eval `var` pollution path, and redeclaration checking
//! (with the one web-compat exception for sloppy-mode block-level function
//! statements).

use crate::intern::NameId;
use crate::intern::NameInterner;
use crate::resolve::ProxyId;
use crate::scope::ScopeId;
use crate::scope::ScopeTree;
use crate::scope::SloppyBlockFunction;
use crate::variable::InitializationFlag;
use crate::variable::MaybeAssignedFlag;
use crate::variable::VariableId;
use crate::variable::VariableKind;
use crate::variable::VariableLocation;
use crate::variable::VariableMode;
use crate::FunctionKind;
use diagnostics::Diagnostic;
use diagnostics::FileId;
use diagnostics::Label;
use diagnostics::Span;
use diagnostics::TextRange;
use std::error::Error;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeclarationId(u32);

impl DeclarationId {
  pub fn index(self) -> usize {
    self.0 as usize
  }

  pub fn raw(self) -> u32 {
    self.0
  }

  pub const fn from_raw(raw: u32) -> Self {
    DeclarationId(raw)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclarationKind {
  Normal,
  Function(FunctionKind),
}

/// A declaration node handed over by the parser: the proxy naming the
/// declared binding plus the scope the declaration syntactically appeared
/// in (which, for hoisted `var`s, is not the scope that ends up owning the
/// variable).
#[derive(Clone, Copy, Debug)]
pub struct Declaration {
  pub proxy: ProxyId,
  pub scope: ScopeId,
  pub kind: DeclarationKind,
}

/// Successful outcome of [`ScopeTree::declare_variable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeclaredVariable {
  pub variable: VariableId,
  /// Set when the declaration re-declared a sloppy-mode block-level function
  /// statement, which is permitted for web compatibility.
  pub sloppy_block_function_redefinition: bool,
}

/// A name was re-declared in the same scope and at least one of the two
/// bindings is lexical.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedeclarationError {
  pub name: String,
  pub position: Option<u32>,
}

impl RedeclarationError {
  pub const CODE: &'static str = "BIND0001";

  pub fn to_diagnostic(&self, file: FileId) -> Diagnostic {
    let start = self.position.unwrap_or(0);
    let range = TextRange::new(start, start + self.name.len() as u32);
    Diagnostic::error(
      Self::CODE,
      format!("Identifier `{}` has already been declared", self.name),
      Span::new(file, range),
    )
  }
}

impl fmt::Display for RedeclarationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "identifier `{}` has already been declared", self.name)
  }
}

impl Error for RedeclarationError {}

impl ScopeTree {
  pub fn new_declaration(
    &mut self,
    proxy: ProxyId,
    scope: ScopeId,
    kind: DeclarationKind,
  ) -> DeclarationId {
    let id = DeclarationId(self.declarations.len() as u32);
    self.declarations.push(Declaration { proxy, scope, kind });
    id
  }

  pub fn declaration(&self, id: DeclarationId) -> &Declaration {
    &self.declarations[id.index()]
  }

  /// Declares the receiver binding. Derived-class constructors get a `const`
  /// that needs initialization (`this` is unusable until `super()` ran);
  /// everything else gets an initialized `var`.
  pub fn declare_this(&mut self, scope: ScopeId) {
    debug_assert!(!self.scope(scope).already_resolved);
    debug_assert!(self.scope(scope).has_this_declaration());
    let derived = self
      .decl_data(scope)
      .expect("scopes with a this declaration are declaration scopes")
      .function_kind
      .is_derived_constructor();
    let (mode, init) = if derived {
      (VariableMode::Const, InitializationFlag::NeedsInitialization)
    } else {
      (VariableMode::Var, InitializationFlag::CreatedInitialized)
    };
    let var = self.declare_in_scope(
      scope,
      NameInterner::THIS,
      mode,
      VariableKind::This,
      init,
      MaybeAssignedFlag::NotAssigned,
    );
    self.decl_data_mut(scope).expect("checked above").receiver = Some(var);
  }

  /// Declares `arguments`, `.new.target`, and (for concise methods, class
  /// constructors, and accessors) `.this_function` on a non-arrow function
  /// scope. Unused ones are dropped again during allocation.
  pub fn declare_default_function_variables(&mut self, scope: ScopeId) {
    debug_assert!(self.scope(scope).is_function_scope());
    debug_assert!(!self.scope(scope).is_arrow_scope());
    let arguments = self.declare_in_scope(
      scope,
      NameInterner::ARGUMENTS,
      VariableMode::Var,
      VariableKind::Arguments,
      InitializationFlag::CreatedInitialized,
      MaybeAssignedFlag::NotAssigned,
    );
    let new_target = self.declare_in_scope(
      scope,
      NameInterner::NEW_TARGET,
      VariableMode::Const,
      VariableKind::Normal,
      InitializationFlag::CreatedInitialized,
      MaybeAssignedFlag::NotAssigned,
    );
    let kind = self
      .decl_data(scope)
      .expect("function scopes are declaration scopes")
      .function_kind;
    let this_function = if kind.is_concise_method() || kind.is_class_constructor() || kind.is_accessor_function()
    {
      Some(self.declare_in_scope(
        scope,
        NameInterner::THIS_FUNCTION,
        VariableMode::Const,
        VariableKind::Normal,
        InitializationFlag::CreatedInitialized,
        MaybeAssignedFlag::NotAssigned,
      ))
    } else {
      None
    };
    let decl = self.decl_data_mut(scope).expect("checked above");
    decl.arguments = Some(arguments);
    decl.new_target = Some(new_target);
    decl.this_function = this_function;
  }

  /// Declares the self binding of a named function expression. It shadows
  /// parameters but lives beside the variable map, so it is looked up
  /// separately during resolution.
  pub fn declare_function_var(&mut self, scope: ScopeId, name: NameId) -> VariableId {
    debug_assert!(self.scope(scope).is_function_scope());
    debug_assert!(self
      .decl_data(scope)
      .is_some_and(|d| d.function_var.is_none()));
    let mode = if self.scope(scope).language_mode.is_strict() {
      VariableMode::Const
    } else {
      VariableMode::ConstLegacy
    };
    let var = self.new_variable(
      Some(scope),
      name,
      mode,
      VariableKind::Normal,
      InitializationFlag::CreatedInitialized,
      MaybeAssignedFlag::NotAssigned,
    );
    self
      .decl_data_mut(scope)
      .expect("function scopes are declaration scopes")
      .function_var = Some(var);
    var
  }

  /// Declares a formal parameter. Returns the variable and whether the name
  /// duplicates an earlier parameter.
  pub fn declare_parameter(
    &mut self,
    scope: ScopeId,
    name: NameId,
    mode: VariableMode,
    is_optional: bool,
    is_rest: bool,
  ) -> (VariableId, bool) {
    debug_assert!(!self.scope(scope).already_resolved);
    debug_assert!(self.scope(scope).is_function_scope());
    debug_assert!(!self.decl_data(scope).expect("function scope").has_rest);
    debug_assert!(!is_optional || !is_rest);

    let mut is_duplicate = false;
    let var = if mode == VariableMode::Temporary {
      self.new_temporary(scope, name)
    } else {
      let var = self.declare_in_scope(
        scope,
        name,
        mode,
        VariableKind::Normal,
        InitializationFlag::CreatedInitialized,
        MaybeAssignedFlag::NotAssigned,
      );
      is_duplicate = self
        .decl_data(scope)
        .expect("function scope")
        .params
        .contains(&var);
      var
    };

    let decl = self.decl_data_mut(scope).expect("function scope");
    if !is_optional && !is_rest && decl.arity == decl.params.len() {
      decl.arity += 1;
    }
    decl.has_rest = is_rest;
    decl.params.push(var);
    if name == NameInterner::ARGUMENTS {
      decl.has_arguments_parameter = true;
    }
    (var, is_duplicate)
  }

  /// Declares a `var`/`let`/`const` local in `scope`.
  pub fn declare_local(
    &mut self,
    scope: ScopeId,
    name: NameId,
    mode: VariableMode,
    init: InitializationFlag,
    kind: VariableKind,
    maybe_assigned: MaybeAssignedFlag,
  ) -> VariableId {
    debug_assert!(!self.scope(scope).already_resolved);
    debug_assert!(mode.is_declared());
    self.declare_in_scope(scope, name, mode, kind, init, maybe_assigned)
  }

  /// Declares a free reference that will live as a property of the global
  /// object. Only legal at script scope.
  pub fn declare_dynamic_global(
    &mut self,
    scope: ScopeId,
    name: NameId,
    kind: VariableKind,
  ) -> VariableId {
    debug_assert!(self.scope(scope).is_script_scope());
    self.declare_in_map_only(
      scope,
      Some(scope),
      name,
      VariableMode::DynamicGlobal,
      kind,
      InitializationFlag::CreatedInitialized,
      MaybeAssignedFlag::NotAssigned,
    )
  }

  /// Creates a fresh temporary in the enclosing closure scope. Temporaries
  /// get stack slots and never appear in a variable map.
  pub fn new_temporary(&mut self, scope: ScopeId, name: NameId) -> VariableId {
    let closure = self.get_closure_scope(scope);
    let var = self.new_variable(
      Some(closure),
      name,
      VariableMode::Temporary,
      VariableKind::Normal,
      InitializationFlag::CreatedInitialized,
      MaybeAssignedFlag::NotAssigned,
    );
    self.scope_mut(closure).locals.push(var);
    var
  }

  /// Records a hoistable sloppy-mode block-level function statement on the
  /// enclosing declaration scope.
  pub fn declare_sloppy_block_function(
    &mut self,
    declaration_scope: ScopeId,
    name: NameId,
    function: SloppyBlockFunction,
  ) {
    self
      .decl_data_mut(declaration_scope)
      .expect("sloppy block functions hoist into a declaration scope")
      .sloppy_block_functions
      .entry(name)
      .or_default()
      .push(function);
  }

  /// The main declaration entry used by the parser for statement-level
  /// declarations.
  pub fn declare_variable(
    &mut self,
    scope: ScopeId,
    declaration: DeclarationId,
    mode: VariableMode,
    init: InitializationFlag,
    allow_harmony_restrictive_generators: bool,
  ) -> Result<DeclaredVariable, RedeclarationError> {
    debug_assert!(mode.is_declared() && mode != VariableMode::ConstLegacy);
    debug_assert!(!self.scope(scope).already_resolved);

    // `var` hoists to the innermost declaration scope.
    if mode == VariableMode::Var && !self.scope(scope).is_declaration_scope() {
      let target = self.get_declaration_scope(scope);
      return self.declare_variable(
        target,
        declaration,
        mode,
        init,
        allow_harmony_restrictive_generators,
      );
    }
    debug_assert!(!self.scope(scope).is_catch_scope());
    debug_assert!(!self.scope(scope).is_with_scope());
    debug_assert!(
      self.scope(scope).is_declaration_scope()
        || (mode.is_lexical() && self.scope(scope).is_block_scope())
    );

    let decl = *self.declaration(declaration);
    let proxy = decl.proxy;
    let name = self.proxy(proxy).name;
    let function_kind = match decl.kind {
      DeclarationKind::Function(kind) => Some(kind),
      DeclarationKind::Normal => None,
    };

    let mut redefinition = false;
    let var;
    if self.scope(scope).is_eval_scope()
      && self.scope(scope).language_mode.is_sloppy()
      && mode == VariableMode::Var
    {
      // A var binding in a sloppy direct eval pollutes the enclosing scope
      // at runtime. Bind the proxy to a lookup variable so a dynamic
      // declaration is emitted instead of a slot access.
      var = self.new_variable(
        Some(scope),
        name,
        mode,
        VariableKind::Normal,
        init,
        MaybeAssignedFlag::NotAssigned,
      );
      self.variable_mut(var).allocate_to(VariableLocation::Lookup);
    } else if let Some(existing) = self.lookup_local(scope, name) {
      if mode.is_lexical() || self.variable(existing).mode.is_lexical() {
        // Sloppy-mode block functions may redeclare an existing block
        // function of the same name; everything else is an early error.
        let duplicate_allowed = self.scope(scope).language_mode.is_sloppy()
          && self.variable(existing).is_function()
          && function_kind.is_some_and(|kind| {
            let map = &self
              .decl_data(self.get_declaration_scope(scope))
              .expect("declaration scope")
              .sloppy_block_functions;
            map.contains_key(&name)
              && !kind.is_async_function()
              && !(allow_harmony_restrictive_generators && kind.is_generator_function())
          });
        if duplicate_allowed {
          redefinition = true;
          var = existing;
        } else {
          return Err(RedeclarationError {
            name: self.names.name(name).to_string(),
            position: self.proxy(proxy).position,
          });
        }
      } else {
        // var on top of var: the earlier binding may now be written twice.
        debug_assert!(mode == VariableMode::Var);
        self.variable_mut(existing).set_maybe_assigned();
        var = existing;
      }
    } else {
      let kind = if function_kind.is_some() {
        VariableKind::Function
      } else {
        VariableKind::Normal
      };
      var = self.declare_in_scope(scope, name, mode, kind, init, MaybeAssignedFlag::NotAssigned);
    }

    // Every declaration keeps its node; the code generator decides later
    // which ones need code.
    self.scope_mut(scope).decls.push(declaration);
    self.bind_proxy(proxy, var);
    Ok(DeclaredVariable {
      variable: var,
      sloppy_block_function_redefinition: redefinition,
    })
  }

  /// Walks the declarations of `scope` looking for a `var` binding that
  /// crosses a lexical binding of the same name somewhere between its
  /// syntactic scope and its hoisting target. Returns the first offender.
  pub fn check_conflicting_var_declarations(&self, scope: ScopeId) -> Option<DeclarationId> {
    for &decl_id in &self.scope(scope).decls {
      let decl = self.declaration(decl_id);
      let var = self
        .proxy(decl.proxy)
        .binding
        .expect("declared proxies are bound");
      let mode = self.variable(var).mode;
      // Lexical-vs-lexical conflicts in one scope were already rejected by
      // declare_variable; only block-scope declarations and vars can still
      // conflict across scopes.
      if mode.is_lexical() && !self.scope(scope).is_block_scope() {
        continue;
      }
      let name = self.proxy(decl.proxy).name;
      let mut current = decl.scope;
      if mode.is_lexical() {
        match self.scope(current).outer {
          Some(outer) => current = outer,
          None => continue,
        }
      }
      loop {
        if let Some(other) = self.scope(current).variables.lookup(name) {
          if self.variable(other).mode.is_lexical() {
            return Some(decl_id);
          }
        }
        if self.scope(current).is_declaration_scope() {
          break;
        }
        current = self
          .scope(current)
          .outer
          .expect("the chain ends at a declaration scope");
      }
    }
    None
  }

  /// The dual of [`check_conflicting_var_declarations`], used when `var`
  /// names are about to be introduced into a surrounding block scope (e.g.
  /// by a sloppy direct eval): reports the declaration of any lexical
  /// binding in `scope` that one of `names` would collide with.
  ///
  /// [`check_conflicting_var_declarations`]: ScopeTree::check_conflicting_var_declarations
  pub fn check_lex_declarations_conflicting_with(
    &self,
    scope: ScopeId,
    names: &[NameId],
  ) -> Option<DeclarationId> {
    debug_assert!(self.scope(scope).is_block_scope());
    for &name in names {
      let Some(var) = self.scope(scope).variables.lookup(name) else {
        continue;
      };
      debug_assert!(self.variable(var).mode.is_lexical());
      for &decl_id in &self.scope(scope).decls {
        if self.proxy(self.declaration(decl_id).proxy).name == name {
          return Some(decl_id);
        }
      }
    }
    None
  }

  /// Builds the diagnostic for a conflict reported by
  /// [`ScopeTree::check_conflicting_var_declarations`].
  pub fn conflict_diagnostic(&self, file: FileId, declaration: DeclarationId) -> Diagnostic {
    let proxy = self.proxy(self.declaration(declaration).proxy);
    let name = self.names.name(proxy.name);
    let start = proxy.position.unwrap_or(0);
    let range = TextRange::new(start, start + name.len() as u32);
    let mut diagnostic = Diagnostic::error(
      "BIND0002",
      format!("Conflicting lexical and var declarations for `{name}`"),
      Span::new(file, range),
    );
    diagnostic.push_label(Label::primary(
      Span::new(file, range),
      "hoisted past a lexical binding of the same name",
    ));
    diagnostic
  }
}
