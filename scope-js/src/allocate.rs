//! Storage allocation.
//!
//! Runs after resolution, bottom-up: children settle their slot counts
//! before their parents. Two questions are asked per variable — must it be
//! allocated at all ([`ScopeTree::must_allocate`] is false for unused
//! variables and global object properties), and must it live in the
//! heap-resident context rather than on the stack (captured by a closure,
//! reachable by an inner `eval`, catch-bound, or explicitly forced).

use crate::intern::NameInterner;
use crate::scope::ScopeId;
use crate::scope::ScopeTree;
use crate::scope_info::ScopeInfo;
use crate::variable::MaybeAssignedFlag;
use crate::variable::VariableId;
use crate::variable::VariableLocation;
use crate::variable::VariableMode;
use crate::LanguageMode;
use crate::MIN_CONTEXT_SLOTS;
use std::rc::Rc;
use tracing::debug;
use tracing::debug_span;

/// Per-task analysis parameters.
#[derive(Clone, Copy, Debug)]
pub struct AnalyzeInfo {
  pub script_scope: ScopeId,
  /// Native (bootstrap) scripts must resolve every reference statically;
  /// reaching the global object there is a programming error.
  pub native_script: bool,
}

impl ScopeTree {
  /// Runs the full analysis pipeline on `scope`: flag propagation,
  /// resolution, storage allocation, and scope-info creation. `scope` must
  /// be the top of the analyzed region: the script scope itself, a scope
  /// directly under it, or a scope whose outer chain was already resolved
  /// (deserialized for lazy compilation).
  pub fn analyze(&mut self, scope: ScopeId, info: &AnalyzeInfo) {
    self.analyze_impl(scope, info, false);
  }

  /// Like [`analyze`], but creates scope info for every scope so that the
  /// debugger can inspect frames without contexts.
  ///
  /// [`analyze`]: ScopeTree::analyze
  pub fn analyze_for_debugger(&mut self, scope: ScopeId, info: &AnalyzeInfo) {
    self.analyze_impl(scope, info, true);
  }

  fn analyze_impl(&mut self, scope: ScopeId, info: &AnalyzeInfo, for_debugger: bool) {
    debug_assert!(self.scope(scope).is_declaration_scope());
    debug_assert!(!self.scope(scope).already_resolved);
    #[cfg(debug_assertions)]
    {
      let s = self.scope(scope);
      let top_level_or_resumed = s.is_script_scope()
        || s.outer.is_some_and(|outer| {
          let o = self.scope(outer);
          o.is_script_scope() || o.already_resolved
        });
      debug_assert!(top_level_or_resumed, "analysis starts at a compilation boundary");
    }

    {
      let _span = debug_span!("propagate_scope_info").entered();
      self.propagate_scope_info(scope);
    }
    {
      let _span = debug_span!("resolve_variables").entered();
      self.resolve_variables_recursively(info, scope);
    }
    {
      let _span = debug_span!("allocate_variables").entered();
      self.allocate_variables_recursively(scope);
    }
    {
      let _span = debug_span!("allocate_scope_infos").entered();
      self.allocate_scope_infos_recursively(scope, for_debugger);
    }
    debug!(
      scopes = self.scope_count(),
      variables = self.variables.len(),
      "scope analysis complete"
    );
  }

  /// Bubbles eval usage into `inner_scope_calls_eval` (a scope's own direct
  /// eval counts: it can reach every binding of the scope) and marks inner
  /// functions of asm modules. Idempotent.
  pub(crate) fn propagate_scope_info(&mut self, scope: ScopeId) {
    let is_asm_module = self.scope(scope).is_asm_module();
    let mut inner_calls_eval = false;
    let mut child = self.scope(scope).inner;
    while let Some(c) = child {
      self.propagate_scope_info(c);
      if is_asm_module && self.scope(c).is_function_scope() {
        self.decl_data_mut(c).expect("function scope").asm_function = true;
      }
      let cs = self.scope(c);
      if cs.scope_calls_eval || cs.inner_scope_calls_eval {
        inner_calls_eval = true;
      }
      child = cs.sibling;
    }
    if inner_calls_eval || self.scope(scope).scope_calls_eval {
      self.scope_mut(scope).inner_scope_calls_eval = true;
    }
  }

  /// Whether `var` needs storage at all. As a side effect, a visible name
  /// reachable by an inner eval (or living in a catch or script scope) is
  /// marked used, and maybe-assigned when an eval could write it.
  pub(crate) fn must_allocate(&mut self, scope: ScopeId, var: VariableId) -> bool {
    let (inner_eval, special_scope) = {
      let s = self.scope(scope);
      (
        s.inner_scope_calls_eval,
        s.inner_scope_calls_eval || s.is_catch_scope() || s.is_script_scope(),
      )
    };
    let global_object_property = self.is_global_object_property(var);
    let v = self.variable_mut(var);
    if (v.is_this() || v.name != NameInterner::EMPTY) && special_scope {
      v.is_used = true;
      if inner_eval {
        v.maybe_assigned = MaybeAssignedFlag::MaybeAssigned;
      }
    }
    debug_assert!(!v.forced_context_allocation || v.is_used);
    !global_object_property && v.is_used
  }

  /// Whether an allocated `var` must live in the scope's context rather
  /// than on the stack.
  pub(crate) fn must_allocate_in_context(&self, scope: ScopeId, var: VariableId) -> bool {
    let s = self.scope(scope);
    if s.force_context_allocation {
      return true;
    }
    let v = self.variable(var);
    if v.mode == VariableMode::Temporary {
      return false;
    }
    if s.is_catch_scope() {
      return true;
    }
    if s.is_script_scope() && v.mode.is_lexical() {
      return true;
    }
    v.forced_context_allocation || s.inner_scope_calls_eval
  }

  /// Block-scoped stack locals share the enclosing declaration scope's
  /// frame.
  pub(crate) fn allocate_stack_slot(&mut self, scope: ScopeId, var: VariableId) {
    if self.scope(scope).is_block_scope() {
      let outer = self.scope(scope).outer.expect("block scope has an outer scope");
      let target = self.get_declaration_scope(outer);
      self.allocate_stack_slot(target, var);
    } else {
      let slot = self.scope(scope).num_stack_slots;
      self.variable_mut(var).allocate_to(VariableLocation::Local(slot));
      self.scope_mut(scope).num_stack_slots += 1;
    }
  }

  pub(crate) fn allocate_heap_slot(&mut self, scope: ScopeId, var: VariableId) {
    let slot = self.scope(scope).num_heap_slots;
    self.variable_mut(var).allocate_to(VariableLocation::Context(slot));
    self.scope_mut(scope).num_heap_slots += 1;
  }

  fn allocate_parameter_locals(&mut self, scope: ScopeId) {
    debug_assert!(self.scope(scope).is_function_scope());

    // `arguments` aliases the formal parameters in sloppy mode with simple
    // parameters, so using it forces every parameter into the context. A
    // parameter named `arguments` takes over the name instead, and an
    // unused arguments object is dropped so no code is generated for it.
    let mut uses_sloppy_arguments = false;
    if let Some(arguments) = self.decl_data(scope).expect("function scope").arguments {
      let has_arguments_parameter = self
        .decl_data(scope)
        .expect("function scope")
        .has_arguments_parameter;
      if self.must_allocate(scope, arguments) && !has_arguments_parameter {
        uses_sloppy_arguments = self.scope(scope).language_mode == LanguageMode::Sloppy
          && self.has_simple_parameters(scope);
      } else {
        self.decl_data_mut(scope).expect("function scope").arguments = None;
      }
    } else {
      debug_assert!(self.scope(scope).is_arrow_scope());
    }

    // A duplicated parameter name must end up with the highest index that
    // uses it, so iteration runs from the last parameter down.
    for i in (0..self.num_parameters(scope)).rev() {
      let var = self.decl_data(scope).expect("function scope").params[i];
      debug_assert_eq!(self.variable(var).scope, Some(scope));
      if uses_sloppy_arguments {
        // The arguments object exposes the parameter, so it is observable
        // even without a direct reference.
        let v = self.variable_mut(var);
        v.set_is_used();
        v.force_context_allocation();
      }
      self.allocate_parameter(scope, var, i as i32);
    }
  }

  fn allocate_parameter(&mut self, scope: ScopeId, var: VariableId, index: i32) {
    if !self.must_allocate(scope, var) {
      return;
    }
    if self.must_allocate_in_context(scope, var) {
      let location = self.variable(var).location;
      debug_assert!(location.is_unallocated() || location.is_context_slot());
      if location.is_unallocated() {
        self.allocate_heap_slot(scope, var);
      }
    } else {
      let location = self.variable(var).location;
      debug_assert!(location.is_unallocated() || location.is_parameter());
      if location.is_unallocated() {
        self
          .variable_mut(var)
          .allocate_to(VariableLocation::Parameter(index));
      }
    }
  }

  fn allocate_receiver(&mut self, scope: ScopeId) {
    if !self.scope(scope).has_this_declaration() {
      return;
    }
    let receiver = self
      .decl_data(scope)
      .expect("declaration scope")
      .receiver
      .expect("the receiver is declared before allocation");
    debug_assert_eq!(self.variable(receiver).scope, Some(scope));
    self.allocate_parameter(scope, receiver, -1);
  }

  fn allocate_non_parameter_local(&mut self, scope: ScopeId, var: VariableId) {
    debug_assert_eq!(self.variable(var).scope, Some(scope));
    if !self.variable(var).location.is_unallocated() || !self.must_allocate(scope, var) {
      return;
    }
    if self.must_allocate_in_context(scope, var) {
      self.allocate_heap_slot(scope, var);
    } else {
      self.allocate_stack_slot(scope, var);
    }
  }

  fn allocate_non_parameter_locals_and_declared_globals(&mut self, scope: ScopeId) {
    let locals = self.scope(scope).locals.clone();
    for var in locals {
      self.allocate_non_parameter_local(scope, var);
    }
    if self.scope(scope).is_declaration_scope() {
      self.allocate_declaration_locals(scope);
    }
  }

  fn allocate_declaration_locals(&mut self, scope: ScopeId) {
    // The function self binding comes after everything else: when it lands
    // in the context it must occupy the last slot, which is where the
    // serialized scope info layout expects it.
    if let Some(function_var) = self.decl_data(scope).expect("declaration scope").function_var {
      self.allocate_non_parameter_local(scope, function_var);
    }

    #[cfg(debug_assertions)]
    if let Some(rest) = self.rest_parameter(scope) {
      debug_assert!(
        !self.must_allocate(scope, rest) || !self.variable(rest).location.is_unallocated()
      );
    }

    // Unused implicit bindings are dropped so the code generator does not
    // materialize them.
    if let Some(new_target) = self.decl_data(scope).expect("declaration scope").new_target {
      if !self.must_allocate(scope, new_target) {
        self.decl_data_mut(scope).expect("declaration scope").new_target = None;
      }
    }
    if let Some(this_function) = self
      .decl_data(scope)
      .expect("declaration scope")
      .this_function
    {
      if !self.must_allocate(scope, this_function) {
        self
          .decl_data_mut(scope)
          .expect("declaration scope")
          .this_function = None;
      }
    }
  }

  /// Module storage: every regular export gets its own slot in declaration
  /// order; regular imports all share the placeholder index `-1` (they read
  /// through the module record of the exporting module).
  fn allocate_module_variables(&mut self, scope: ScopeId) {
    let module = self
      .decl_data(scope)
      .expect("module scope")
      .module
      .clone()
      .expect("module scopes carry a module descriptor");
    for name in module.regular_imports {
      let var = self
        .scope(scope)
        .variables
        .lookup(name)
        .expect("module imports are declared");
      self
        .variable_mut(var)
        .allocate_to(VariableLocation::Module(-1));
    }
    for (index, name) in module.regular_exports.into_iter().enumerate() {
      let var = self
        .scope(scope)
        .variables
        .lookup(name)
        .expect("module exports are declared");
      self
        .variable_mut(var)
        .allocate_to(VariableLocation::Module(index as i32));
    }
  }

  pub(crate) fn allocate_variables_recursively(&mut self, scope: ScopeId) {
    debug_assert!(!self.scope(scope).already_resolved);
    debug_assert_eq!(self.scope(scope).num_stack_slots, 0);

    // Children first: their slot counts do not depend on the parent.
    let mut child = self.scope(scope).inner;
    while let Some(c) = child {
      self.allocate_variables_recursively(c);
      child = self.scope(c).sibling;
    }

    debug_assert_eq!(self.scope(scope).num_heap_slots, MIN_CONTEXT_SLOTS);

    // Parameters must be allocated first.
    if self.scope(scope).is_declaration_scope() {
      if self.scope(scope).is_module_scope() {
        self.allocate_module_variables(scope);
      } else if self.scope(scope).is_function_scope() {
        self.allocate_parameter_locals(scope);
      }
      self.allocate_receiver(scope);
    }
    self.allocate_non_parameter_locals_and_declared_globals(scope);

    // With scopes, module scopes, and sloppy-eval-calling function or
    // var-block scopes need a context even when nothing was allocated into
    // it; everything else gets its header slots back.
    let must_have_context = {
      let s = self.scope(scope);
      s.is_with_scope()
        || s.is_module_scope()
        || (s.is_function_scope() && s.calls_sloppy_eval())
        || (s.is_block_scope() && s.is_declaration_scope() && s.calls_sloppy_eval())
    };
    if self.scope(scope).num_heap_slots == MIN_CONTEXT_SLOTS && !must_have_context {
      self.scope_mut(scope).num_heap_slots = 0;
    }
    debug_assert!(
      self.scope(scope).num_heap_slots == 0
        || self.scope(scope).num_heap_slots >= MIN_CONTEXT_SLOTS
    );

    // The scope is frozen from here on.
    self.scope_mut(scope).already_resolved = true;
  }

  fn needs_scope_info(&self, scope: ScopeId) -> bool {
    let s = self.scope(scope);
    s.needs_context()
      || s.is_script_scope()
      || s.is_function_scope()
      || s.is_eval_scope()
      || s.is_module_scope()
  }

  pub(crate) fn allocate_scope_infos_recursively(&mut self, scope: ScopeId, for_debugger: bool) {
    debug_assert!(self.scope(scope).scope_info.is_none());
    if for_debugger || self.needs_scope_info(scope) {
      let info = ScopeInfo::for_scope(self, scope);
      self.scope_mut(scope).scope_info = Some(Rc::new(info));
    }
    let mut child = self.scope(scope).inner;
    while let Some(c) = child {
      self.allocate_scope_infos_recursively(c, for_debugger);
      child = self.scope(c).sibling;
    }
  }
}
