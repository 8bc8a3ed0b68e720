//! Scope-builder snapshots.
//!
//! While parsing arrow-function parameter lists and similar constructs, the
//! parser only finds out after the fact that a new function scope has to sit
//! between a scope and the children, locals, and unresolved references that
//! were added in the meantime. A [`Snapshot`] freezes the builder state at a
//! point; [`ScopeTree::reparent`] later moves everything that arrived after
//! that point under the newly created function scope.

use crate::resolve::ProxyId;
use crate::scope::ScopeId;
use crate::scope::ScopeTree;
use crate::variable::VariableMode;

/// Builder state captured at one point in scope construction.
#[derive(Clone, Copy, Debug)]
pub struct Snapshot {
  outer_scope: ScopeId,
  top_inner_scope: Option<ScopeId>,
  top_unresolved: Option<ProxyId>,
  top_local: usize,
  top_decl: usize,
}

impl Snapshot {
  pub fn outer_scope(&self) -> ScopeId {
    self.outer_scope
  }
}

impl ScopeTree {
  pub fn snapshot(&self, scope: ScopeId) -> Snapshot {
    let closure = self.get_closure_scope(scope);
    Snapshot {
      outer_scope: scope,
      top_inner_scope: self.scope(scope).inner,
      top_unresolved: self.scope(scope).unresolved,
      top_local: self.scope(closure).locals.len(),
      top_decl: self.scope(closure).decls.len(),
    }
  }

  /// Moves everything added to the snapshot's scope since the snapshot was
  /// taken under `new_parent`, which must be the most recently added child
  /// of that scope, freshly created and still empty. Must run before either
  /// side is resolved.
  pub fn reparent(&mut self, snapshot: &Snapshot, new_parent: ScopeId) {
    let outer = snapshot.outer_scope;
    debug_assert_eq!(self.scope(outer).inner, Some(new_parent));
    debug_assert_eq!(self.scope(new_parent).outer, Some(outer));
    debug_assert_eq!(self.get_closure_scope(new_parent), new_parent);
    debug_assert!(self.scope(new_parent).inner.is_none());
    debug_assert!(self.scope(new_parent).unresolved.is_none());
    debug_assert!(self.scope(new_parent).locals.is_empty());
    debug_assert!(!self.scope(new_parent).already_resolved);

    // Inner scopes created after the snapshot sit between new_parent and
    // the old top of the sibling list; they become new_parent's children.
    if self.scope(new_parent).sibling != snapshot.top_inner_scope {
      let mut last = self
        .scope(new_parent)
        .sibling
        .expect("scopes were added after the snapshot");
      loop {
        debug_assert_ne!(last, new_parent);
        self.scopes[last.index()].outer = Some(new_parent);
        let next = self.scope(last).sibling;
        if next == snapshot.top_inner_scope {
          break;
        }
        last = next.expect("the sibling chain ends at the snapshot top");
      }
      self.scopes[new_parent.index()].inner = self.scope(new_parent).sibling;
      self.scopes[last.index()].sibling = None;
      // Keep new_parent itself in the outer scope's child list.
      self.scopes[new_parent.index()].sibling = snapshot.top_inner_scope;
    }

    // Unresolved references added after the snapshot move along.
    if self.scope(outer).unresolved != snapshot.top_unresolved {
      let mut last = self
        .scope(outer)
        .unresolved
        .expect("proxies were added after the snapshot");
      while self.proxy(last).next_unresolved != snapshot.top_unresolved {
        last = self
          .proxy(last)
          .next_unresolved
          .expect("the unresolved chain ends at the snapshot top");
      }
      self.proxies[last.index()].next_unresolved = None;
      self.scopes[new_parent.index()].unresolved = self.scope(outer).unresolved;
      self.scopes[outer.index()].unresolved = snapshot.top_unresolved;
    }

    // Locals that landed in the old closure scope after the snapshot (only
    // temporaries and vars can have) migrate into new_parent; vars also
    // switch variable maps. This is the one place a variable changes owner.
    let outer_closure = self.get_closure_scope(outer);
    debug_assert_ne!(outer_closure, new_parent);
    let moved: Vec<_> = self.scope(outer_closure).locals[snapshot.top_local..].to_vec();
    for local in moved {
      let mode = self.variable(local).mode;
      debug_assert!(matches!(mode, VariableMode::Temporary | VariableMode::Var));
      debug_assert_eq!(self.variable(local).scope, Some(outer_closure));
      self.variable_mut(local).scope = Some(new_parent);
      self.scope_mut(new_parent).locals.push(local);
      if mode == VariableMode::Var {
        let name = self.variable(local).name;
        self.scope_mut(outer_closure).variables.remove(name);
        self.scope_mut(new_parent).variables.add(name, local);
      }
    }
    self
      .scope_mut(outer_closure)
      .locals
      .truncate(snapshot.top_local);
    self
      .scope_mut(outer_closure)
      .decls
      .truncate(snapshot.top_decl);
  }
}
