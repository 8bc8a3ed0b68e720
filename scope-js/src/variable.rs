//! Variable records: the named bindings owned by scopes.

use crate::intern::NameId;
use crate::scope::ScopeId;
use serde::Deserialize;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VariableId(u32);

impl VariableId {
  pub fn index(self) -> usize {
    self.0 as usize
  }

  pub fn raw(self) -> u32 {
    self.0
  }

  pub const fn from_raw(raw: u32) -> Self {
    VariableId(raw)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableMode {
  Var,
  Let,
  Const,
  ConstLegacy,
  Temporary,
  /// A binding that can only be found by a runtime lookup, with no hint
  /// about where it might live.
  Dynamic,
  /// A runtime lookup expected to land on the global object.
  DynamicGlobal,
  /// A runtime lookup that would hit a known local binding unless a sloppy
  /// `eval` shadowed it; the candidate is kept in `local_if_not_shadowed`.
  DynamicLocal,
}

impl VariableMode {
  pub fn is_dynamic(self) -> bool {
    matches!(
      self,
      VariableMode::Dynamic | VariableMode::DynamicGlobal | VariableMode::DynamicLocal
    )
  }

  pub fn is_lexical(self) -> bool {
    matches!(self, VariableMode::Let | VariableMode::Const)
  }

  /// Modes a source-level declaration can carry.
  pub fn is_declared(self) -> bool {
    matches!(
      self,
      VariableMode::Var | VariableMode::ConstLegacy | VariableMode::Let | VariableMode::Const
    )
  }

  pub fn as_str(self) -> &'static str {
    match self {
      VariableMode::Var => "VAR",
      VariableMode::Let => "LET",
      VariableMode::Const => "CONST",
      VariableMode::ConstLegacy => "CONST_LEGACY",
      VariableMode::Temporary => "TEMPORARY",
      VariableMode::Dynamic => "DYNAMIC",
      VariableMode::DynamicGlobal => "DYNAMIC_GLOBAL",
      VariableMode::DynamicLocal => "DYNAMIC_LOCAL",
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableKind {
  Normal,
  Function,
  This,
  Arguments,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitializationFlag {
  NeedsInitialization,
  CreatedInitialized,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaybeAssignedFlag {
  NotAssigned,
  MaybeAssigned,
}

/// Where a variable lives once allocation has decided. The payload is the
/// slot index; the receiver uses `Parameter(-1)`, regular module imports
/// share `Module(-1)` while each export gets a distinct non-negative index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableLocation {
  Unallocated,
  Parameter(i32),
  Local(u32),
  Context(u32),
  Global(u32),
  Lookup,
  Module(i32),
}

impl VariableLocation {
  pub fn is_unallocated(self) -> bool {
    self == VariableLocation::Unallocated
  }

  pub fn is_parameter(self) -> bool {
    matches!(self, VariableLocation::Parameter(_))
  }

  pub fn is_stack_local(self) -> bool {
    matches!(self, VariableLocation::Local(_))
  }

  pub fn is_context_slot(self) -> bool {
    matches!(self, VariableLocation::Context(_))
  }
}

#[derive(Clone, Debug)]
pub struct Variable {
  pub name: NameId,
  /// The owning scope. Dynamic non-locals minted during resolution have no
  /// owner. Changed at most once, by scope re-parenting.
  pub scope: Option<ScopeId>,
  pub mode: VariableMode,
  pub kind: VariableKind,
  pub initialization_flag: InitializationFlag,
  pub maybe_assigned: MaybeAssignedFlag,
  pub location: VariableLocation,
  pub is_used: bool,
  pub forced_context_allocation: bool,
  /// For `DynamicLocal` variables: the statically visible binding that a
  /// sloppy `eval` may or may not have shadowed.
  pub local_if_not_shadowed: Option<VariableId>,
}

impl Variable {
  pub(crate) fn new(
    scope: Option<ScopeId>,
    name: NameId,
    mode: VariableMode,
    kind: VariableKind,
    initialization_flag: InitializationFlag,
    maybe_assigned: MaybeAssignedFlag,
  ) -> Self {
    // Dynamic bindings can never be given a slot; pin them to LOOKUP up front.
    let location = if mode.is_dynamic() {
      VariableLocation::Lookup
    } else {
      VariableLocation::Unallocated
    };
    Self {
      name,
      scope,
      mode,
      kind,
      initialization_flag,
      maybe_assigned,
      location,
      is_used: false,
      forced_context_allocation: false,
      local_if_not_shadowed: None,
    }
  }

  /// The single location-writing operation: unallocated → terminal.
  /// Re-assigning the same location is a no-op (deserialization may see a
  /// variable twice).
  pub fn allocate_to(&mut self, location: VariableLocation) {
    debug_assert!(
      self.location.is_unallocated() || self.location == location,
      "variable location is written at most once ({:?} -> {:?})",
      self.location,
      location
    );
    self.location = location;
  }

  pub fn is_dynamic(&self) -> bool {
    self.mode.is_dynamic()
  }

  pub fn is_this(&self) -> bool {
    self.kind == VariableKind::This
  }

  pub fn is_function(&self) -> bool {
    self.kind == VariableKind::Function
  }

  pub fn is_arguments(&self) -> bool {
    self.kind == VariableKind::Arguments
  }

  pub fn set_is_used(&mut self) {
    self.is_used = true;
  }

  pub fn set_maybe_assigned(&mut self) {
    self.maybe_assigned = MaybeAssignedFlag::MaybeAssigned;
  }

  pub fn force_context_allocation(&mut self) {
    self.forced_context_allocation = true;
  }

  /// The slot index regardless of location flavor; `-1` where no meaningful
  /// index exists.
  pub fn index(&self) -> i32 {
    match self.location {
      VariableLocation::Unallocated | VariableLocation::Lookup => -1,
      VariableLocation::Parameter(i) | VariableLocation::Module(i) => i,
      VariableLocation::Local(i) | VariableLocation::Context(i) | VariableLocation::Global(i) => {
        i as i32
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::intern::NameInterner;

  #[test]
  fn dynamic_modes_are_pinned_to_lookup() {
    for mode in [
      VariableMode::Dynamic,
      VariableMode::DynamicGlobal,
      VariableMode::DynamicLocal,
    ] {
      let var = Variable::new(
        None,
        NameInterner::EMPTY,
        mode,
        VariableKind::Normal,
        InitializationFlag::CreatedInitialized,
        MaybeAssignedFlag::NotAssigned,
      );
      assert_eq!(var.location, VariableLocation::Lookup);
      assert_eq!(var.index(), -1);
    }
  }

  #[test]
  fn allocate_to_accepts_reassigning_the_same_slot() {
    let mut var = Variable::new(
      None,
      NameInterner::EMPTY,
      VariableMode::Let,
      VariableKind::Normal,
      InitializationFlag::NeedsInitialization,
      MaybeAssignedFlag::NotAssigned,
    );
    assert!(var.location.is_unallocated());
    var.allocate_to(VariableLocation::Context(4));
    var.allocate_to(VariableLocation::Context(4));
    assert_eq!(var.index(), 4);
  }
}
