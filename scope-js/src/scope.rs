//! The scope tree and its arena.
//!
//! [`ScopeTree`] is the zone of one analysis task: it owns every scope,
//! variable, variable proxy, and declaration node, and hands out ids into
//! its stores. The scope↔variable edges are conceptually cyclic, so ids
//! (rather than owning references) represent them; dropping the tree frees
//! the whole graph.
//!
//! A [`Scope`] carries the base node data. Scopes that can host `var`
//! declarations (script, function, module, eval, and `var`-hoisting blocks)
//! additionally carry a [`DeclarationData`], and module scopes a
//! [`ModuleData`] inside it; the `decl` box doubles as the
//! declaration-scope discriminant, so downcasts are `Option` accessors.
//! Child scopes form a singly linked list through `inner` (head, most
//! recently added first) and `sibling`.

use crate::declare::Declaration;
use crate::declare::DeclarationId;
use crate::intern::NameId;
use crate::intern::NameInterner;
use crate::map::VariableMap;
use crate::resolve::ProxyId;
use crate::resolve::VariableProxy;
use crate::scope_info::ScopeInfo;
use crate::variable::InitializationFlag;
use crate::variable::MaybeAssignedFlag;
use crate::variable::Variable;
use crate::variable::VariableId;
use crate::variable::VariableKind;
use crate::variable::VariableMode;
use crate::FunctionKind;
use crate::LanguageMode;
use crate::MIN_CONTEXT_SLOTS;
use ahash::HashMap;
use ahash::HashMapExt;
use serde::Deserialize;
use serde::Serialize;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
  pub fn index(self) -> usize {
    self.0 as usize
  }

  pub fn raw(self) -> u32 {
    self.0
  }

  pub const fn from_raw(raw: u32) -> Self {
    ScopeId(raw)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeType {
  Script,
  Function,
  Module,
  Block,
  Catch,
  With,
  Eval,
}

/// A hoistable sloppy-mode function statement recorded in the enclosing
/// declaration scope, keyed by name in [`DeclarationData::sloppy_block_functions`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SloppyBlockFunction {
  /// The block scope the function statement appeared in.
  pub scope: ScopeId,
  pub position: Option<u32>,
}

/// Regular (non-namespace) imports and exports of a module scope, in
/// declaration order.
#[derive(Clone, Debug, Default)]
pub struct ModuleData {
  pub regular_imports: Vec<NameId>,
  pub regular_exports: Vec<NameId>,
}

/// Extra state carried by declaration scopes.
#[derive(Clone, Debug)]
pub struct DeclarationData {
  pub function_kind: FunctionKind,
  /// Formal parameters in declaration order; a rest parameter is last.
  pub params: Vec<VariableId>,
  /// Number of leading non-optional, non-rest parameters.
  pub arity: usize,
  pub has_rest: bool,
  pub has_arguments_parameter: bool,
  pub has_simple_parameters: bool,
  pub asm_module: bool,
  pub asm_function: bool,
  pub uses_super_property: bool,
  pub force_eager_compilation: bool,
  /// The `this` binding.
  pub receiver: Option<VariableId>,
  pub new_target: Option<VariableId>,
  /// Named-function-expression self binding; looked up beside the variable
  /// map, never through it.
  pub function_var: Option<VariableId>,
  pub arguments: Option<VariableId>,
  pub this_function: Option<VariableId>,
  pub sloppy_block_functions: HashMap<NameId, Vec<SloppyBlockFunction>>,
  pub module: Option<ModuleData>,
}

impl DeclarationData {
  fn new(function_kind: FunctionKind) -> Self {
    Self {
      function_kind,
      params: Vec::new(),
      arity: 0,
      has_rest: false,
      has_arguments_parameter: false,
      has_simple_parameters: true,
      asm_module: false,
      asm_function: false,
      uses_super_property: false,
      force_eager_compilation: false,
      receiver: None,
      new_target: None,
      function_var: None,
      arguments: None,
      this_function: None,
      sloppy_block_functions: HashMap::new(),
      module: None,
    }
  }
}

#[derive(Clone, Debug)]
pub struct Scope {
  pub scope_type: ScopeType,
  pub outer: Option<ScopeId>,
  /// Head of the inner-scope list (most recently added child first).
  pub inner: Option<ScopeId>,
  pub sibling: Option<ScopeId>,
  pub variables: VariableMap,
  /// Variables that must receive a slot, in declaration order. A superset of
  /// the map's slot-allocatable values plus unnamed temporaries.
  pub locals: Vec<VariableId>,
  pub decls: Vec<DeclarationId>,
  /// Head of the unresolved-proxy list, linked through
  /// [`VariableProxy::next_unresolved`].
  pub unresolved: Option<ProxyId>,
  pub start_position: Option<u32>,
  pub end_position: Option<u32>,
  pub num_stack_slots: u32,
  pub num_heap_slots: u32,
  pub language_mode: LanguageMode,
  pub scope_calls_eval: bool,
  pub inner_scope_calls_eval: bool,
  pub force_context_allocation: bool,
  pub is_hidden: bool,
  pub is_debug_evaluate_scope: bool,
  /// Set once the scope is frozen: after allocation, or at construction for
  /// scopes rebuilt from serialized scope info.
  pub already_resolved: bool,
  pub scope_info: Option<Rc<ScopeInfo>>,
  pub decl: Option<Box<DeclarationData>>,
}

impl Scope {
  fn new(scope_type: ScopeType) -> Self {
    Self {
      scope_type,
      outer: None,
      inner: None,
      sibling: None,
      variables: VariableMap::new(),
      locals: Vec::new(),
      decls: Vec::new(),
      unresolved: None,
      start_position: None,
      end_position: None,
      num_stack_slots: 0,
      num_heap_slots: MIN_CONTEXT_SLOTS,
      language_mode: LanguageMode::Sloppy,
      scope_calls_eval: false,
      inner_scope_calls_eval: false,
      force_context_allocation: false,
      is_hidden: false,
      is_debug_evaluate_scope: false,
      already_resolved: false,
      scope_info: None,
      decl: None,
    }
  }

  pub fn is_script_scope(&self) -> bool {
    self.scope_type == ScopeType::Script
  }

  pub fn is_function_scope(&self) -> bool {
    self.scope_type == ScopeType::Function
  }

  pub fn is_module_scope(&self) -> bool {
    self.scope_type == ScopeType::Module
  }

  pub fn is_block_scope(&self) -> bool {
    self.scope_type == ScopeType::Block
  }

  pub fn is_catch_scope(&self) -> bool {
    self.scope_type == ScopeType::Catch
  }

  pub fn is_with_scope(&self) -> bool {
    self.scope_type == ScopeType::With
  }

  pub fn is_eval_scope(&self) -> bool {
    self.scope_type == ScopeType::Eval
  }

  pub fn is_declaration_scope(&self) -> bool {
    self.decl.is_some()
  }

  pub fn is_arrow_scope(&self) -> bool {
    self.is_function_scope()
      && self
        .decl
        .as_ref()
        .is_some_and(|d| d.function_kind.is_arrow_function())
  }

  /// Scopes whose activation carries a `this` binding of its own.
  pub fn has_this_declaration(&self) -> bool {
    (self.is_function_scope() && !self.is_arrow_scope()) || self.is_module_scope()
  }

  pub fn calls_eval(&self) -> bool {
    self.scope_calls_eval
  }

  pub fn calls_sloppy_eval(&self) -> bool {
    self.scope_calls_eval && self.language_mode.is_sloppy()
  }

  pub fn is_asm_module(&self) -> bool {
    self.is_function_scope() && self.decl.as_ref().is_some_and(|d| d.asm_module)
  }

  pub fn is_asm_function(&self) -> bool {
    self.is_function_scope() && self.decl.as_ref().is_some_and(|d| d.asm_function)
  }

  /// Whether this scope needs a heap-resident context at runtime. Only
  /// meaningful once allocation has run.
  pub fn needs_context(&self) -> bool {
    self.num_heap_slots > 0
  }
}

#[derive(Debug, Default)]
pub struct ScopeTree {
  pub(crate) names: NameInterner,
  pub(crate) scopes: Vec<Scope>,
  pub(crate) variables: Vec<Variable>,
  pub(crate) proxies: Vec<VariableProxy>,
  pub(crate) declarations: Vec<Declaration>,
}

impl ScopeTree {
  pub fn new() -> Self {
    Self {
      names: NameInterner::new(),
      scopes: Vec::new(),
      variables: Vec::new(),
      proxies: Vec::new(),
      declarations: Vec::new(),
    }
  }

  pub fn names(&self) -> &NameInterner {
    &self.names
  }

  pub fn names_mut(&mut self) -> &mut NameInterner {
    &mut self.names
  }

  pub fn scope(&self, id: ScopeId) -> &Scope {
    &self.scopes[id.index()]
  }

  pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
    &mut self.scopes[id.index()]
  }

  pub fn variable(&self, id: VariableId) -> &Variable {
    &self.variables[id.index()]
  }

  pub fn variable_mut(&mut self, id: VariableId) -> &mut Variable {
    &mut self.variables[id.index()]
  }

  pub fn scope_count(&self) -> usize {
    self.scopes.len()
  }

  pub fn decl_data(&self, scope: ScopeId) -> Option<&DeclarationData> {
    self.scope(scope).decl.as_deref()
  }

  pub fn decl_data_mut(&mut self, scope: ScopeId) -> Option<&mut DeclarationData> {
    self.scope_mut(scope).decl.as_deref_mut()
  }

  fn push_scope(&mut self, scope: Scope) -> ScopeId {
    let id = ScopeId(self.scopes.len() as u32);
    self.scopes.push(scope);
    id
  }

  // --- constructors --------------------------------------------------------

  /// The root of a scope tree. Declaration scope, sloppy until a directive
  /// says otherwise.
  pub fn new_script_scope(&mut self) -> ScopeId {
    let mut scope = Scope::new(ScopeType::Script);
    scope.decl = Some(Box::new(DeclarationData::new(FunctionKind::NormalFunction)));
    self.push_scope(scope)
  }

  /// A nested non-declaration scope: block, with, or catch. Inherits the
  /// language mode and the forced-context flag from `outer`.
  pub fn new_scope(&mut self, outer: ScopeId, scope_type: ScopeType) -> ScopeId {
    debug_assert!(matches!(
      scope_type,
      ScopeType::Block | ScopeType::With | ScopeType::Catch
    ));
    let mut scope = Scope::new(scope_type);
    scope.language_mode = self.scope(outer).language_mode;
    scope.force_context_allocation = self.scope(outer).force_context_allocation;
    let id = self.push_scope(scope);
    self.add_inner_scope(outer, id);
    id
  }

  /// A nested declaration scope: function, eval, or a `var`-hoisting block.
  /// Function scopes shield their contents from an outer forced-context flag.
  pub fn new_declaration_scope(
    &mut self,
    outer: ScopeId,
    scope_type: ScopeType,
    function_kind: FunctionKind,
  ) -> ScopeId {
    debug_assert!(matches!(
      scope_type,
      ScopeType::Function | ScopeType::Eval | ScopeType::Block
    ));
    let mut scope = Scope::new(scope_type);
    scope.language_mode = self.scope(outer).language_mode;
    if scope_type != ScopeType::Function {
      scope.force_context_allocation = self.scope(outer).force_context_allocation;
    }
    let mut decl = DeclarationData::new(function_kind);
    decl.asm_function = self.scope(outer).is_asm_module();
    scope.decl = Some(Box::new(decl));
    let id = self.push_scope(scope);
    self.add_inner_scope(outer, id);
    id
  }

  /// The module scope nested directly in the script scope. Strict, owns a
  /// module descriptor, and declares its receiver immediately.
  pub fn new_module_scope(&mut self, script_scope: ScopeId) -> ScopeId {
    debug_assert!(self.scope(script_scope).is_script_scope());
    let mut scope = Scope::new(ScopeType::Module);
    scope.language_mode = LanguageMode::Strict;
    let mut decl = DeclarationData::new(FunctionKind::Module);
    decl.module = Some(ModuleData::default());
    scope.decl = Some(Box::new(decl));
    let id = self.push_scope(scope);
    self.add_inner_scope(script_scope, id);
    self.declare_this(id);
    id
  }

  /// A with scope mirroring a deserialized with or debug-evaluate context.
  pub(crate) fn new_with_root(&mut self, debug_evaluate: bool) -> ScopeId {
    let mut scope = Scope::new(ScopeType::With);
    scope.already_resolved = true;
    scope.is_debug_evaluate_scope = debug_evaluate;
    self.push_scope(scope)
  }

  /// A scope rebuilt from serialized scope info.
  pub(crate) fn new_scope_from_info(
    &mut self,
    scope_type: ScopeType,
    info: Rc<ScopeInfo>,
    declaration: bool,
  ) -> ScopeId {
    debug_assert!(info.context_length >= MIN_CONTEXT_SLOTS);
    let mut scope = Scope::new(scope_type);
    scope.already_resolved = true;
    scope.language_mode = info.language_mode;
    scope.scope_calls_eval = info.calls_eval;
    scope.num_heap_slots = info.context_length;
    if declaration {
      let mut decl = DeclarationData::new(info.function_kind);
      decl.asm_module = info.asm_module;
      decl.asm_function = info.asm_function;
      scope.decl = Some(Box::new(decl));
    }
    scope.scope_info = Some(info);
    self.push_scope(scope)
  }

  /// A catch scope mirroring a deserialized catch context: the catch binding
  /// is declared up front and sits in the first context slot.
  pub(crate) fn new_catch_scope(&mut self, name: NameId) -> ScopeId {
    let mut scope = Scope::new(ScopeType::Catch);
    scope.already_resolved = true;
    let id = self.push_scope(scope);
    let var = self.declare_in_scope(
      id,
      name,
      VariableMode::Var,
      VariableKind::Normal,
      InitializationFlag::CreatedInitialized,
      MaybeAssignedFlag::NotAssigned,
    );
    self.allocate_heap_slot(id, var);
    id
  }

  // --- variable factories --------------------------------------------------

  pub(crate) fn new_variable(
    &mut self,
    scope: Option<ScopeId>,
    name: NameId,
    mode: VariableMode,
    kind: VariableKind,
    initialization_flag: InitializationFlag,
    maybe_assigned: MaybeAssignedFlag,
  ) -> VariableId {
    let id = VariableId::from_raw(self.variables.len() as u32);
    self
      .variables
      .push(Variable::new(scope, name, mode, kind, initialization_flag, maybe_assigned));
    id
  }

  /// Declare-or-return-existing in `scope`'s map; a newly created variable is
  /// also appended to the scope's slot-allocation list.
  pub(crate) fn declare_in_scope(
    &mut self,
    scope: ScopeId,
    name: NameId,
    mode: VariableMode,
    kind: VariableKind,
    initialization_flag: InitializationFlag,
    maybe_assigned: MaybeAssignedFlag,
  ) -> VariableId {
    if let Some(existing) = self.scope(scope).variables.lookup(name) {
      return existing;
    }
    let var = self.new_variable(Some(scope), name, mode, kind, initialization_flag, maybe_assigned);
    let s = self.scope_mut(scope);
    s.variables.add(name, var);
    s.locals.push(var);
    var
  }

  /// Declare-or-return-existing in the map only; used for dynamic non-locals,
  /// dynamic globals, and variables materialized from scope info, which never
  /// take part in slot allocation.
  pub(crate) fn declare_in_map_only(
    &mut self,
    scope: ScopeId,
    owner: Option<ScopeId>,
    name: NameId,
    mode: VariableMode,
    kind: VariableKind,
    initialization_flag: InitializationFlag,
    maybe_assigned: MaybeAssignedFlag,
  ) -> VariableId {
    if let Some(existing) = self.scope(scope).variables.lookup(name) {
      return existing;
    }
    let var = self.new_variable(owner, name, mode, kind, initialization_flag, maybe_assigned);
    self.scope_mut(scope).variables.add(name, var);
    var
  }

  /// A variable is a property of the global object (and so needs no slot)
  /// when it is a `var` at script scope or a dynamic-global anywhere.
  pub fn is_global_object_property(&self, var: VariableId) -> bool {
    let v = self.variable(var);
    match v.mode {
      VariableMode::DynamicGlobal => true,
      VariableMode::Var => v
        .scope
        .is_some_and(|s| self.scope(s).is_script_scope()),
      _ => false,
    }
  }

  // --- tree surgery --------------------------------------------------------

  pub(crate) fn add_inner_scope(&mut self, outer: ScopeId, inner: ScopeId) {
    self.scopes[inner.index()].sibling = self.scopes[outer.index()].inner;
    self.scopes[inner.index()].outer = Some(outer);
    self.scopes[outer.index()].inner = Some(inner);
  }

  pub(crate) fn remove_inner_scope(&mut self, outer: ScopeId, inner: ScopeId) -> bool {
    if self.scope(outer).inner == Some(inner) {
      self.scopes[outer.index()].inner = self.scope(inner).sibling;
      self.scopes[inner.index()].sibling = None;
      return true;
    }
    let mut current = self.scope(outer).inner;
    while let Some(c) = current {
      let next = self.scope(c).sibling;
      if next == Some(inner) {
        self.scopes[c.index()].sibling = self.scope(inner).sibling;
        self.scopes[inner.index()].sibling = None;
        return true;
      }
      current = next;
    }
    false
  }

  /// Re-hangs `scope` under `new_outer`. Only legal while both sides are
  /// still unresolved.
  pub fn replace_outer_scope(&mut self, scope: ScopeId, new_outer: ScopeId) {
    debug_assert!(!self.scope(scope).already_resolved);
    debug_assert!(!self.scope(new_outer).already_resolved);
    let old_outer = self.scope(scope).outer.expect("scope has an outer scope");
    debug_assert!(!self.scope(old_outer).already_resolved);
    self.remove_inner_scope(old_outer, scope);
    self.add_inner_scope(new_outer, scope);
  }

  /// Called when a block scope has just been fully built. An empty block
  /// scope (no bindings, and not a sloppy-eval-calling declaration block)
  /// dissolves into its outer scope: inner scopes are re-parented, the
  /// unresolved list is spliced onto the outer one, and `None` reports the
  /// removal. Otherwise the scope is kept and returned.
  pub fn finalize_block_scope(&mut self, scope: ScopeId) -> Option<ScopeId> {
    debug_assert!(self.scope(scope).is_block_scope());
    debug_assert!(!self.scope(scope).already_resolved);

    {
      let s = self.scope(scope);
      if !s.variables.is_empty() || (s.is_declaration_scope() && s.calls_sloppy_eval()) {
        return Some(scope);
      }
    }

    let outer = self.scope(scope).outer.expect("block scope has an outer scope");
    self.remove_inner_scope(outer, scope);

    if let Some(first) = self.scope(scope).inner {
      let mut last = first;
      self.scopes[first.index()].outer = Some(outer);
      while let Some(next) = self.scope(last).sibling {
        self.scopes[next.index()].outer = Some(outer);
        last = next;
      }
      self.scopes[last.index()].sibling = self.scope(outer).inner;
      self.scopes[outer.index()].inner = Some(first);
      self.scopes[scope.index()].inner = None;
    }

    if let Some(head) = self.scope(scope).unresolved {
      if self.scope(outer).unresolved.is_some() {
        let mut tail = head;
        while let Some(next) = self.proxies[tail.index()].next_unresolved {
          tail = next;
        }
        self.proxies[tail.index()].next_unresolved = self.scope(outer).unresolved;
      }
      self.scopes[outer.index()].unresolved = Some(head);
      self.scopes[scope.index()].unresolved = None;
    }

    self.propagate_usage_flags_to(scope, outer);
    // The dissolved block will never get a context.
    self.scopes[scope.index()].num_heap_slots = 0;
    None
  }

  pub fn propagate_usage_flags_to(&mut self, from: ScopeId, to: ScopeId) {
    debug_assert!(!self.scope(to).already_resolved);
    if self.scope(from).calls_eval() {
      self.record_eval_call(to);
    }
  }

  /// Records a direct call to `eval` observed in `scope`.
  pub fn record_eval_call(&mut self, scope: ScopeId) {
    self.scopes[scope.index()].scope_calls_eval = true;
  }

  // --- builder setters -----------------------------------------------------

  pub fn set_position(&mut self, scope: ScopeId, start: u32, end: u32) {
    let s = self.scope_mut(scope);
    s.start_position = Some(start);
    s.end_position = Some(end);
  }

  pub fn set_language_mode(&mut self, scope: ScopeId, mode: LanguageMode) {
    self.scope_mut(scope).language_mode = mode;
  }

  pub fn set_asm_module(&mut self, scope: ScopeId) {
    self
      .decl_data_mut(scope)
      .expect("asm modules are function scopes")
      .asm_module = true;
  }

  pub fn set_has_non_simple_parameters(&mut self, scope: ScopeId) {
    self
      .decl_data_mut(scope)
      .expect("parameters belong to declaration scopes")
      .has_simple_parameters = false;
  }

  pub fn record_super_property_usage(&mut self, scope: ScopeId) {
    self
      .decl_data_mut(scope)
      .expect("super usage is recorded on declaration scopes")
      .uses_super_property = true;
  }

  pub fn set_force_eager_compilation(&mut self, scope: ScopeId) {
    self
      .decl_data_mut(scope)
      .expect("eager compilation is forced on declaration scopes")
      .force_eager_compilation = true;
  }

  // --- chain queries -------------------------------------------------------

  /// The innermost scope that can host a `var` declaration.
  pub fn get_declaration_scope(&self, scope: ScopeId) -> ScopeId {
    let mut current = scope;
    while !self.scope(current).is_declaration_scope() {
      current = self
        .scope(current)
        .outer
        .expect("the script scope is a declaration scope");
    }
    current
  }

  /// The innermost enclosing declaration scope that is not a block scope.
  pub fn get_closure_scope(&self, scope: ScopeId) -> ScopeId {
    let mut current = scope;
    loop {
      let s = self.scope(current);
      if s.is_declaration_scope() && !s.is_block_scope() {
        return current;
      }
      current = s.outer.expect("the script scope is a closure scope");
    }
  }

  /// The scope whose activation provides `this`: skips arrow functions and
  /// everything that is neither a function nor the script scope.
  pub fn get_receiver_scope(&self, scope: ScopeId) -> ScopeId {
    let mut current = scope;
    loop {
      let s = self.scope(current);
      if s.is_script_scope() || (s.is_function_scope() && !s.is_arrow_scope()) {
        return current;
      }
      current = s.outer.expect("the chain ends at the script scope");
    }
  }

  /// Full-chain lookup, materializing from scope info where necessary.
  pub fn lookup(&mut self, scope: ScopeId, name: NameId) -> Option<VariableId> {
    let mut current = Some(scope);
    while let Some(s) = current {
      if let Some(var) = self.lookup_local(s, name) {
        return Some(var);
      }
      current = self.scope(s).outer;
    }
    None
  }

  /// Number of context-carrying scopes between `scope` (inclusive) and `to`
  /// (exclusive). `to` must be on the chain.
  pub fn context_chain_length(&self, scope: ScopeId, to: ScopeId) -> u32 {
    let mut n = 0;
    let mut current = scope;
    while current != to {
      if self.scope(current).needs_context() {
        n += 1;
      }
      current = self.scope(current).outer.expect("`to` is on the scope chain");
    }
    n
  }

  /// Depth (in context-carrying scopes) of the outermost scope on the chain
  /// that performs a sloppy direct eval; 0 when there is none.
  pub fn context_chain_length_until_outermost_sloppy_eval(&self, scope: ScopeId) -> u32 {
    let mut result = 0;
    let mut length = 0;
    let mut current = Some(scope);
    while let Some(s) = current {
      let data = self.scope(s);
      if data.needs_context() {
        length += 1;
        if data.calls_sloppy_eval() {
          result = length;
        }
      }
      current = data.outer;
    }
    result
  }

  pub fn max_nested_context_chain_length(&self, scope: ScopeId) -> u32 {
    let mut max = 0;
    let mut child = self.scope(scope).inner;
    while let Some(c) = child {
      max = max.max(self.max_nested_context_chain_length(c));
      child = self.scope(c).sibling;
    }
    if self.scope(scope).needs_context() {
      max += 1;
    }
    max
  }

  /// Formal parameter count, excluding a rest parameter.
  pub fn num_parameters(&self, scope: ScopeId) -> usize {
    match self.decl_data(scope) {
      Some(decl) if decl.has_rest => decl.params.len() - 1,
      Some(decl) => decl.params.len(),
      None => 0,
    }
  }

  pub fn rest_parameter(&self, scope: ScopeId) -> Option<VariableId> {
    let decl = self.decl_data(scope)?;
    if decl.has_rest {
      decl.params.last().copied()
    } else {
      None
    }
  }

  pub fn has_simple_parameters(&self, scope: ScopeId) -> bool {
    let closure = self.get_closure_scope(scope);
    let s = self.scope(closure);
    !s.is_function_scope()
      || s
        .decl
        .as_ref()
        .is_some_and(|d| d.has_simple_parameters)
  }

  /// Inside a block scope the set of block-scoped declarations is not known
  /// until the block is fully parsed, so nothing on such a chain may be
  /// parsed lazily.
  pub fn allows_lazy_parsing(&self, scope: ScopeId) -> bool {
    let mut current = Some(scope);
    while let Some(s) = current {
      if self.scope(s).is_block_scope() {
        return false;
      }
      current = self.scope(s).outer;
    }
    true
  }

  pub fn allows_lazy_compilation(&self, scope: ScopeId) -> bool {
    !self
      .decl_data(scope)
      .is_some_and(|d| d.force_eager_compilation)
  }

  pub fn allows_lazy_compilation_without_context(&self, scope: ScopeId) -> bool {
    if self.decl_data(scope).is_some_and(|d| d.force_eager_compilation) {
      return false;
    }
    let mut current = self.scope(scope).outer;
    while let Some(s) = current {
      if self.scope(s).needs_context() {
        return false;
      }
      current = self.scope(s).outer;
    }
    true
  }

  /// Stack slots, not counting a stack-allocated function self binding.
  pub fn stack_local_count(&self, scope: ScopeId) -> u32 {
    let s = self.scope(scope);
    let function_on_stack = s
      .decl
      .as_ref()
      .and_then(|d| d.function_var)
      .is_some_and(|f| self.variable(f).location.is_stack_local());
    s.num_stack_slots - if function_on_stack { 1 } else { 0 }
  }

  /// Context slots beyond the frame header, not counting a context-allocated
  /// function self binding.
  pub fn context_local_count(&self, scope: ScopeId) -> u32 {
    let s = self.scope(scope);
    if s.num_heap_slots == 0 {
      return 0;
    }
    let function_in_context = s
      .decl
      .as_ref()
      .and_then(|d| d.function_var)
      .is_some_and(|f| self.variable(f).location.is_context_slot());
    s.num_heap_slots - MIN_CONTEXT_SLOTS - if function_in_context { 1 } else { 0 }
  }

  /// Children of `scope`, most recently added first.
  pub fn inner_scopes(&self, scope: ScopeId) -> Vec<ScopeId> {
    let mut out = Vec::new();
    let mut child = self.scope(scope).inner;
    while let Some(c) = child {
      out.push(c);
      child = self.scope(c).sibling;
    }
    out
  }

  /// Validates that every non-hidden leaf scope carries source positions.
  pub fn check_scope_positions(&self, scope: ScopeId) {
    let s = self.scope(scope);
    if !s.is_hidden && s.inner.is_none() {
      assert!(
        s.start_position.is_some() && s.end_position.is_some(),
        "non-hidden leaf scopes must have source positions"
      );
    }
    let mut child = s.inner;
    while let Some(c) = child {
      self.check_scope_positions(c);
      child = self.scope(c).sibling;
    }
  }
}
