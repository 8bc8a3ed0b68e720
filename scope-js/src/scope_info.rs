//! Serialized scope descriptors.
//!
//! A [`ScopeInfo`] is the read-only picture of an analyzed scope that other
//! compilation stages (and later re-entries into the same function) consume:
//! which names live in context slots, with which modes and flags, where the
//! receiver and the function self binding sit, and how long the context is.
//! The analyzer emits one per scope that needs it at the end of analysis and
//! reads them back in [`ScopeTree::deserialize_scope_chain`] when a lazily
//! compiled (or debug-evaluated) function re-enters the pipeline.
//!
//! The bit layout of the persisted form belongs to the embedding runtime;
//! here the descriptor is a plain serde-able value, so any serde format is a
//! valid wire encoding.

use crate::intern::NameId;
use crate::scope::ScopeId;
use crate::scope::ScopeTree;
use crate::scope::ScopeType;
use crate::variable::InitializationFlag;
use crate::variable::MaybeAssignedFlag;
use crate::variable::VariableId;
use crate::variable::VariableKind;
use crate::variable::VariableLocation;
use crate::variable::VariableMode;
use crate::FunctionKind;
use crate::LanguageMode;
use crate::MIN_CONTEXT_SLOTS;
use serde::Deserialize;
use serde::Serialize;
use std::rc::Rc;

/// One context-allocated variable, at slot `MIN_CONTEXT_SLOTS + position`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextLocal {
  pub name: String,
  pub mode: VariableMode,
  pub initialization_flag: InitializationFlag,
  pub maybe_assigned: MaybeAssignedFlag,
}

/// The named-function-expression self binding, when context-allocated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionNameInfo {
  pub name: String,
  pub mode: VariableMode,
  pub slot: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScopeInfo {
  pub scope_type: ScopeType,
  pub language_mode: LanguageMode,
  pub is_declaration_scope: bool,
  pub function_kind: FunctionKind,
  pub calls_eval: bool,
  pub asm_module: bool,
  pub asm_function: bool,
  /// Total context slots including the frame header; 0 when the scope has
  /// no context.
  pub context_length: u32,
  pub context_locals: Vec<ContextLocal>,
  /// Context slot of the receiver, when `this` is context-allocated.
  pub receiver_slot: Option<u32>,
  pub function_name: Option<FunctionNameInfo>,
}

impl ScopeInfo {
  pub fn context_local_count(&self) -> u32 {
    self.context_locals.len() as u32
  }

  /// Finds `name` among the context locals; returns its slot and entry.
  pub fn context_slot_index(&self, name: &str) -> Option<(u32, &ContextLocal)> {
    self
      .context_locals
      .iter()
      .position(|local| local.name == name)
      .map(|i| (MIN_CONTEXT_SLOTS + i as u32, &self.context_locals[i]))
  }

  pub fn receiver_context_slot_index(&self) -> Option<u32> {
    self.receiver_slot
  }

  pub fn function_context_slot_index(&self, name: &str) -> Option<(u32, VariableMode)> {
    self
      .function_name
      .as_ref()
      .filter(|f| f.name == name)
      .map(|f| (f.slot, f.mode))
  }

  /// Captures the serialized picture of an allocated scope.
  pub fn for_scope(tree: &ScopeTree, scope: ScopeId) -> ScopeInfo {
    let s = tree.scope(scope);
    debug_assert!(s.already_resolved);

    let mut slots: Vec<(u32, VariableId)> = s
      .variables
      .iter()
      .filter_map(|(_, var)| match tree.variable(var).location {
        VariableLocation::Context(slot) => Some((slot, var)),
        _ => None,
      })
      .collect();
    slots.sort_by_key(|&(slot, _)| slot);

    let mut receiver_slot = None;
    let context_locals: Vec<ContextLocal> = slots
      .iter()
      .enumerate()
      .map(|(i, &(slot, var))| {
        debug_assert_eq!(slot, MIN_CONTEXT_SLOTS + i as u32);
        let v = tree.variable(var);
        if v.is_this() {
          receiver_slot = Some(slot);
        }
        ContextLocal {
          name: tree.names().name(v.name).to_string(),
          mode: v.mode,
          initialization_flag: v.initialization_flag,
          maybe_assigned: v.maybe_assigned,
        }
      })
      .collect();

    let function_name = s
      .decl
      .as_ref()
      .and_then(|d| d.function_var)
      .and_then(|f| {
        let v = tree.variable(f);
        match v.location {
          VariableLocation::Context(slot) => Some(FunctionNameInfo {
            name: tree.names().name(v.name).to_string(),
            mode: v.mode,
            slot,
          }),
          _ => None,
        }
      });

    ScopeInfo {
      scope_type: s.scope_type,
      language_mode: s.language_mode,
      is_declaration_scope: s.is_declaration_scope(),
      function_kind: s.decl.as_ref().map(|d| d.function_kind).unwrap_or_default(),
      calls_eval: s.scope_calls_eval,
      asm_module: s.decl.as_ref().is_some_and(|d| d.asm_module),
      asm_function: s.decl.as_ref().is_some_and(|d| d.asm_function),
      context_length: s.num_heap_slots,
      context_locals,
      receiver_slot,
      function_name,
    }
  }
}

/// Controls how much of the serialized state the deserializer materializes
/// immediately.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DeserializationMode {
  /// Only rebuild the scope nodes; variables are materialized lazily during
  /// resolution.
  ScopesOnly,
  /// Also materialize every context-local variable (and the function self
  /// binding) up front.
  OffHeap,
}

/// One frame of a runtime context chain, innermost first. The chain ends at
/// the native context, which is not represented.
#[derive(Clone, Debug)]
pub enum ContextFrame {
  /// A with context, or a debug-evaluate context (which resolves like a with
  /// scope but also short-circuits every lookup to a dynamic one).
  With { debug_evaluate: bool },
  /// The script context; its descriptor merges onto the existing script
  /// scope rather than creating a nested scope.
  Script { scope_info: Rc<ScopeInfo> },
  /// A function context. Eval scopes serialize as function scopes, so their
  /// frames arrive here too.
  Function { scope_info: Rc<ScopeInfo> },
  Block { scope_info: Rc<ScopeInfo> },
  Catch { name: String },
}

impl ScopeTree {
  /// Rebuilds the outer scope chain of a lazily compiled function from its
  /// runtime context chain, linking the outermost rebuilt scope under
  /// `script_scope`. Returns the innermost rebuilt scope (or `script_scope`
  /// when the chain is empty), which the parser uses as the outer scope of
  /// the function it is about to re-parse.
  pub fn deserialize_scope_chain(
    &mut self,
    contexts: &[ContextFrame],
    script_scope: ScopeId,
    mode: DeserializationMode,
  ) -> ScopeId {
    debug_assert!(self.scope(script_scope).is_script_scope());

    let mut current: Option<ScopeId> = None;
    let mut innermost: Option<ScopeId> = None;
    for (position, frame) in contexts.iter().enumerate() {
      let outer = match frame {
        ContextFrame::With { debug_evaluate } => self.new_with_root(*debug_evaluate),
        ContextFrame::Script { scope_info } => {
          // The outermost context with scope info; install it on the
          // existing script scope instead of nesting a second script scope.
          debug_assert_eq!(position, contexts.len() - 1);
          self.scope_mut(script_scope).scope_info = Some(scope_info.clone());
          break;
        }
        ContextFrame::Function { scope_info } => {
          debug_assert!(matches!(
            scope_info.scope_type,
            ScopeType::Function | ScopeType::Eval
          ));
          self.new_scope_from_info(ScopeType::Function, scope_info.clone(), true)
        }
        ContextFrame::Block { scope_info } => {
          debug_assert_eq!(scope_info.scope_type, ScopeType::Block);
          self.new_scope_from_info(
            ScopeType::Block,
            scope_info.clone(),
            scope_info.is_declaration_scope,
          )
        }
        ContextFrame::Catch { name } => {
          let name = self.names.intern(name.as_str());
          self.new_catch_scope(name)
        }
      };
      if let Some(inner) = current {
        self.add_inner_scope(outer, inner);
      }
      current = Some(outer);
      if mode == DeserializationMode::OffHeap {
        self.deserialize_scope_info(outer);
      }
      if innermost.is_none() {
        innermost = current;
      }
    }

    let Some(innermost) = innermost else {
      return script_scope;
    };
    let outermost = current.expect("an innermost scope implies a current scope");
    self.add_inner_scope(script_scope, outermost);
    self.propagate_scope_info(script_scope);
    innermost
  }

  /// Materializes every context local named by the scope's descriptor (plus
  /// the function self binding), then drops the descriptor: the scope is
  /// complete from here on.
  pub(crate) fn deserialize_scope_info(&mut self, scope: ScopeId) {
    let Some(info) = self.scope(scope).scope_info.clone() else {
      return;
    };

    for (i, local) in info.context_locals.iter().enumerate() {
      let name = self.names.intern(local.name.as_str());
      let slot = MIN_CONTEXT_SLOTS + i as u32;
      let kind = if info.receiver_slot == Some(slot) {
        VariableKind::This
      } else {
        VariableKind::Normal
      };
      let var = self.declare_in_map_only(
        scope,
        Some(scope),
        name,
        local.mode,
        kind,
        local.initialization_flag,
        local.maybe_assigned,
      );
      self
        .variable_mut(var)
        .allocate_to(VariableLocation::Context(slot));
    }

    if let Some(function) = &info.function_name {
      let name = self.names.intern(function.name.as_str());
      let var = self.declare_function_var(scope, name);
      debug_assert_eq!(self.variable(var).mode, function.mode);
      self
        .variable_mut(var)
        .allocate_to(VariableLocation::Context(function.slot));
    }

    self.scope_mut(scope).scope_info = None;
  }

  /// Materializes a single context local (or nothing) from the scope's
  /// descriptor during resolution.
  pub(crate) fn lookup_in_scope_info(
    &mut self,
    scope: ScopeId,
    name: NameId,
  ) -> Option<VariableId> {
    let info = self.scope(scope).scope_info.clone()?;
    let found = {
      let text = self.names.name(name);
      info
        .context_slot_index(text)
        .map(|(slot, local)| (slot, local.mode, local.initialization_flag, local.maybe_assigned))
    };
    let (slot, mode, initialization_flag, maybe_assigned) = found?;
    let kind = if info.receiver_slot == Some(slot) {
      VariableKind::This
    } else {
      VariableKind::Normal
    };
    let var = self.declare_in_map_only(
      scope,
      Some(scope),
      name,
      mode,
      kind,
      initialization_flag,
      maybe_assigned,
    );
    self
      .variable_mut(var)
      .allocate_to(VariableLocation::Context(slot));
    Some(var)
  }

  /// The function-slot lookup against the serialized descriptor,
  /// materializing the self binding on a hit.
  pub(crate) fn lookup_function_var_in_scope_info(
    &mut self,
    scope: ScopeId,
    name: NameId,
  ) -> Option<VariableId> {
    let info = self.scope(scope).scope_info.clone()?;
    let found = {
      let text = self.names.name(name);
      info.function_context_slot_index(text)
    };
    let (slot, mode) = found?;
    let var = self.declare_function_var(scope, name);
    debug_assert_eq!(self.variable(var).mode, mode);
    self
      .variable_mut(var)
      .allocate_to(VariableLocation::Context(slot));
    Some(var)
  }
}
