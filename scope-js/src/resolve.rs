//! Name resolution.
//!
//! Every free identifier reference the parser sees becomes a
//! [`VariableProxy`] on the unresolved list of its scope. Resolution walks
//! the scope chain for each proxy and binds it to a variable — either a
//! statically known binding, or a dynamic non-local when `with`, sloppy
//! `eval`, or debug-evaluate make the answer unknowable at compile time.

use crate::allocate::AnalyzeInfo;
use crate::intern::NameId;
use crate::scope::ScopeId;
use crate::scope::ScopeTree;
use crate::variable::InitializationFlag;
use crate::variable::MaybeAssignedFlag;
use crate::variable::VariableId;
use crate::variable::VariableKind;
use crate::variable::VariableMode;
use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProxyId(u32);

impl ProxyId {
  pub fn index(self) -> usize {
    self.0 as usize
  }

  pub fn raw(self) -> u32 {
    self.0
  }

  pub const fn from_raw(raw: u32) -> Self {
    ProxyId(raw)
  }
}

/// A use of a name, awaiting (or carrying) its binding.
#[derive(Clone, Copy, Debug)]
pub struct VariableProxy {
  pub name: NameId,
  /// Whether this use is an assignment target.
  pub is_assigned: bool,
  pub position: Option<u32>,
  pub binding: Option<VariableId>,
  /// Intrusive link for the owning scope's unresolved list.
  pub next_unresolved: Option<ProxyId>,
}

impl VariableProxy {
  pub fn is_resolved(&self) -> bool {
    self.binding.is_some()
  }
}

impl ScopeTree {
  pub fn new_proxy(&mut self, name: NameId, position: Option<u32>) -> ProxyId {
    let id = ProxyId(self.proxies.len() as u32);
    self.proxies.push(VariableProxy {
      name,
      is_assigned: false,
      position,
      binding: None,
      next_unresolved: None,
    });
    id
  }

  pub fn proxy(&self, id: ProxyId) -> &VariableProxy {
    &self.proxies[id.index()]
  }

  pub fn mark_proxy_assigned(&mut self, id: ProxyId) {
    self.proxies[id.index()].is_assigned = true;
  }

  /// Binds `proxy` to `var`; a bound variable counts as used.
  pub(crate) fn bind_proxy(&mut self, proxy: ProxyId, var: VariableId) {
    debug_assert!(self.proxies[proxy.index()].binding.is_none());
    self.proxies[proxy.index()].binding = Some(var);
    self.variable_mut(var).set_is_used();
  }

  /// Prepends `proxy` to the unresolved list of `scope`.
  pub fn add_unresolved(&mut self, scope: ScopeId, proxy: ProxyId) {
    debug_assert!(!self.scope(scope).already_resolved);
    debug_assert!(!self.proxy(proxy).is_resolved());
    self.proxies[proxy.index()].next_unresolved = self.scope(scope).unresolved;
    self.scope_mut(scope).unresolved = Some(proxy);
  }

  /// Unlinks `proxy` from the unresolved list of `scope`. Idempotent: a
  /// second call returns false.
  pub fn remove_unresolved(&mut self, scope: ScopeId, proxy: ProxyId) -> bool {
    if self.scope(scope).unresolved == Some(proxy) {
      self.scopes[scope.index()].unresolved = self.proxy(proxy).next_unresolved;
      self.proxies[proxy.index()].next_unresolved = None;
      return true;
    }
    let mut current = self.scope(scope).unresolved;
    while let Some(c) = current {
      let next = self.proxy(c).next_unresolved;
      if next == Some(proxy) {
        self.proxies[c.index()].next_unresolved = self.proxy(proxy).next_unresolved;
        self.proxies[proxy.index()].next_unresolved = None;
        return true;
      }
      current = next;
    }
    false
  }

  /// Declares a fresh dynamic non-local in `scope`'s map (or returns the one
  /// a previous resolution already minted).
  fn non_local(&mut self, scope: ScopeId, name: NameId, mode: VariableMode) -> VariableId {
    debug_assert!(mode.is_dynamic());
    self.declare_in_map_only(
      scope,
      None,
      name,
      mode,
      VariableKind::Normal,
      InitializationFlag::CreatedInitialized,
      MaybeAssignedFlag::NotAssigned,
    )
  }

  /// Looks `name` up in `scope` itself: the variable map first, then — for
  /// scopes rebuilt from serialized scope info — the descriptor, which
  /// materializes a variable on demand.
  pub(crate) fn lookup_local(&mut self, scope: ScopeId, name: NameId) -> Option<VariableId> {
    if let Some(var) = self.scope(scope).variables.lookup(name) {
      return Some(var);
    }
    if self.scope(scope).scope_info.is_none() {
      return None;
    }
    self.lookup_in_scope_info(scope, name)
  }

  /// Checks the named-function-expression self binding, falling back to the
  /// serialized descriptor's function slot.
  fn lookup_function_var(&mut self, scope: ScopeId, name: NameId) -> Option<VariableId> {
    if let Some(function_var) = self.decl_data(scope).and_then(|d| d.function_var) {
      if self.variable(function_var).name == name {
        return Some(function_var);
      }
    }
    if self.scope(scope).scope_info.is_some() {
      return self.lookup_function_var_in_scope_info(scope, name);
    }
    None
  }

  /// The heart of resolution: finds the binding for `proxy` starting at
  /// `scope`, walking out to `outer_end` (exclusive; `None` walks the whole
  /// chain). With `declare_free`, a reference that escapes every scope is
  /// declared as a global-object property at the script scope; otherwise it
  /// stays unresolved and `None` is returned.
  pub(crate) fn lookup_recursive(
    &mut self,
    scope: ScopeId,
    proxy: ProxyId,
    declare_free: bool,
    outer_end: Option<ScopeId>,
  ) -> Option<VariableId> {
    debug_assert!(outer_end != Some(scope));
    let name = self.proxy(proxy).name;

    // Everything reached through a debug-evaluate scope is looked up
    // dynamically: such scopes have no trustworthy static picture of the
    // frame being inspected.
    if self.scope(scope).is_debug_evaluate_scope {
      if !declare_free {
        return None;
      }
      return Some(self.non_local(scope, name, VariableMode::Dynamic));
    }

    // A local binding wins even if this scope also calls eval: an
    // eval-introduced var would join the same binding.
    if let Some(var) = self.lookup_local(scope, name) {
      return Some(var);
    }

    if self.scope(scope).is_function_scope() {
      if let Some(var) = self.lookup_function_var(scope, name) {
        if self.scope(scope).calls_sloppy_eval() {
          return Some(self.non_local(scope, name, VariableMode::Dynamic));
        }
        return Some(var);
      }
    }

    if self.scope(scope).outer == outer_end {
      if !declare_free {
        return None;
      }
      debug_assert!(self.scope(scope).is_script_scope());
      return Some(self.declare_dynamic_global(scope, name, VariableKind::Normal));
    }

    let outer = self.scope(scope).outer.expect("outer_end is on the chain");
    let var = self.lookup_recursive(outer, proxy, declare_free, outer_end)?;

    // Crossing a function boundary captures the binding.
    if self.scope(scope).is_function_scope() && !self.variable(var).is_dynamic() {
      self.variable_mut(var).force_context_allocation();
    }

    // `this` cannot be shadowed by eval-introduced bindings or with scopes.
    if self.variable(var).is_this() {
      return Some(var);
    }

    if self.scope(scope).is_with_scope() {
      debug_assert!(!self.scope(scope).already_resolved);
      // The binding cannot be resolved statically, but the outer lookup was
      // still needed: an existing outer binding must survive in a context
      // slot in case the with object does not provide the property.
      if !self.variable(var).is_dynamic() && self.variable(var).location.is_unallocated() {
        let is_assigned = self.proxy(proxy).is_assigned;
        let v = self.variable_mut(var);
        v.set_is_used();
        v.force_context_allocation();
        if is_assigned {
          v.set_maybe_assigned();
        }
      }
      return Some(self.non_local(scope, name, VariableMode::Dynamic));
    }

    if self.scope(scope).calls_sloppy_eval() && self.scope(scope).is_declaration_scope() {
      // The eval may introduce a same-named var into this scope, so the
      // outer binding is only a candidate. Block and catch scopes cannot
      // host eval-introduced vars and are skipped.
      if self.is_global_object_property(var) {
        return Some(self.non_local(scope, name, VariableMode::DynamicGlobal));
      }
      if self.variable(var).is_dynamic() {
        return Some(var);
      }
      let invalidated = var;
      let dynamic_local = self.non_local(scope, name, VariableMode::DynamicLocal);
      self.variable_mut(dynamic_local).local_if_not_shadowed = Some(invalidated);
      return Some(dynamic_local);
    }

    Some(var)
  }

  pub(crate) fn resolve_variable(&mut self, info: &AnalyzeInfo, scope: ScopeId, proxy: ProxyId) {
    debug_assert!(self.scope(info.script_scope).is_script_scope());
    // Functions and consts may already have been bound by the parser.
    if self.proxy(proxy).is_resolved() {
      return;
    }
    let var = self
      .lookup_recursive(scope, proxy, true, None)
      .expect("free references resolve to a dynamic or global binding");
    self.resolve_to(info, proxy, var);
  }

  pub(crate) fn resolve_to(&mut self, info: &AnalyzeInfo, proxy: ProxyId, var: VariableId) {
    #[cfg(debug_assertions)]
    if info.native_script {
      // Native scripts must not touch the global object: every reference has
      // to bind locally or stay unallocated.
      assert!(
        !self.is_global_object_property(var),
        "unbound variable `{}` in native script",
        self.names.name(self.proxy(proxy).name)
      );
      use crate::variable::VariableLocation;
      assert!(matches!(
        self.variable(var).location,
        VariableLocation::Local(_)
          | VariableLocation::Context(_)
          | VariableLocation::Parameter(_)
          | VariableLocation::Unallocated
      ));
    }
    if self.proxy(proxy).is_assigned {
      self.variable_mut(var).set_maybe_assigned();
    }
    self.bind_proxy(proxy, var);
  }

  pub(crate) fn resolve_variables_recursively(&mut self, info: &AnalyzeInfo, scope: ScopeId) {
    let mut current = self.scope(scope).unresolved;
    while let Some(proxy) = current {
      let next = self.proxy(proxy).next_unresolved;
      self.resolve_variable(info, scope, proxy);
      current = next;
    }
    let mut child = self.scope(scope).inner;
    while let Some(c) = child {
      self.resolve_variables_recursively(info, c);
      child = self.scope(c).sibling;
    }
  }

  /// The lazy-parsing variant of resolution: binds what resolves within
  /// `max_outer`'s chain (when `info` is given; drops the binding otherwise)
  /// and pushes everything else onto `stack`, which is returned. The
  /// unresolved lists of the walked scopes are cleared.
  pub(crate) fn fetch_free_variables(
    &mut self,
    scope: ScopeId,
    max_outer: ScopeId,
    info: Option<&AnalyzeInfo>,
    mut stack: Option<ProxyId>,
  ) -> Option<ProxyId> {
    let outer_end = self.scope(max_outer).outer;
    let mut current = self.scope(scope).unresolved;
    while let Some(proxy) = current {
      let next = self.proxy(proxy).next_unresolved;
      if !self.proxy(proxy).is_resolved() {
        match self.lookup_recursive(scope, proxy, false, outer_end) {
          None => {
            self.proxies[proxy.index()].next_unresolved = stack;
            stack = Some(proxy);
          }
          Some(var) => {
            if let Some(info) = info {
              self.resolve_to(info, proxy, var);
            }
          }
        }
      }
      current = next;
    }
    self.scope_mut(scope).unresolved = None;

    let mut child = self.scope(scope).inner;
    while let Some(c) = child {
      stack = self.fetch_free_variables(c, max_outer, info, stack);
      child = self.scope(c).sibling;
    }
    stack
  }

  /// The set of names that stay free after resolving everything resolvable
  /// within `scope`.
  pub fn collect_non_locals(
    &mut self,
    scope: ScopeId,
    info: Option<&AnalyzeInfo>,
  ) -> BTreeSet<NameId> {
    let mut free = self.fetch_free_variables(scope, scope, info, None);
    let mut names = BTreeSet::new();
    while let Some(proxy) = free {
      names.insert(self.proxy(proxy).name);
      free = self.proxy(proxy).next_unresolved;
    }
    names
  }

  /// Promotes a pre-parsed scope to a full parse living in another arena:
  /// copies the still-free proxies and the usage flags over to `migrate_to`
  /// (the same scope, re-built in `target`), then detaches `scope` from its
  /// tree. Both scopes must be declaration scopes.
  pub fn analyze_partially(&mut self, scope: ScopeId, target: &mut ScopeTree, migrate_to: ScopeId) {
    debug_assert!(self.scope(scope).is_declaration_scope());
    debug_assert!(target.scope(migrate_to).is_declaration_scope());
    debug_assert!(!self
      .decl_data(scope)
      .expect("declaration scope")
      .force_eager_compilation);

    self.propagate_scope_info(scope);

    // Resolve what we can inside this scope; the outer scopes are
    // incomplete, so everything else migrates as a fresh unresolved proxy.
    let mut free = self.fetch_free_variables(scope, scope, None, None);
    while let Some(proxy) = free {
      debug_assert!(!self.proxy(proxy).is_resolved());
      let name = target
        .names_mut()
        .intern(self.names.name(self.proxy(proxy).name));
      let copy = target.new_proxy(name, self.proxy(proxy).position);
      if self.proxy(proxy).is_assigned {
        target.mark_proxy_assigned(copy);
      }
      target.add_unresolved(migrate_to, copy);
      free = self.proxy(proxy).next_unresolved;
    }

    if self.scope(scope).scope_calls_eval {
      target.record_eval_call(migrate_to);
    }
    if self.scope(scope).inner_scope_calls_eval {
      target.scope_mut(migrate_to).inner_scope_calls_eval = true;
    }
    if self
      .decl_data(scope)
      .expect("declaration scope")
      .uses_super_property
    {
      target.record_super_property_usage(migrate_to);
    }
    {
      let s = self.scope(scope);
      let t = target.scope_mut(migrate_to);
      t.start_position = s.start_position;
      t.end_position = s.end_position;
      t.language_mode = s.language_mode;
      t.force_context_allocation = s.force_context_allocation;
    }
    target
      .decl_data_mut(migrate_to)
      .expect("declaration scope")
      .arity = self.decl_data(scope).expect("declaration scope").arity;

    if let Some(outer) = self.scope(scope).outer {
      self.remove_inner_scope(outer, scope);
      self.scope_mut(scope).outer = None;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::intern::NameInterner;

  #[test]
  fn remove_unresolved_is_idempotent() {
    let mut tree = ScopeTree::new();
    let script = tree.new_script_scope();
    let a = tree.names_mut().intern("a");
    let b = tree.names_mut().intern("b");
    let pa = tree.new_proxy(a, None);
    let pb = tree.new_proxy(b, None);
    tree.add_unresolved(script, pa);
    tree.add_unresolved(script, pb);

    assert!(tree.remove_unresolved(script, pa));
    assert!(!tree.remove_unresolved(script, pa));
    assert_eq!(tree.scope(script).unresolved, Some(pb));
    assert!(tree.remove_unresolved(script, pb));
    assert_eq!(tree.scope(script).unresolved, None);
  }

  #[test]
  fn proxies_report_resolution() {
    let mut tree = ScopeTree::new();
    let script = tree.new_script_scope();
    let name = tree.names_mut().intern("value");
    let proxy = tree.new_proxy(name, Some(3));
    assert!(!tree.proxy(proxy).is_resolved());
    let var = tree.declare_local(
      script,
      name,
      crate::variable::VariableMode::Let,
      crate::variable::InitializationFlag::NeedsInitialization,
      VariableKind::Normal,
      MaybeAssignedFlag::NotAssigned,
    );
    tree.bind_proxy(proxy, var);
    assert!(tree.proxy(proxy).is_resolved());
    assert!(tree.variable(var).is_used);
  }

  #[test]
  fn non_local_reuses_the_existing_dynamic_binding() {
    let mut tree = ScopeTree::new();
    let script = tree.new_script_scope();
    let with = tree.new_scope(script, crate::scope::ScopeType::With);
    let name = tree.names_mut().intern("o");
    let first = tree.non_local(with, name, VariableMode::Dynamic);
    let second = tree.non_local(with, name, VariableMode::Dynamic);
    assert_eq!(first, second);
    assert_eq!(
      tree.variable(first).location,
      crate::variable::VariableLocation::Lookup
    );
    assert_eq!(tree.variable(first).scope, None);
    assert_eq!(tree.names.name(NameInterner::THIS), "this");
  }
}
