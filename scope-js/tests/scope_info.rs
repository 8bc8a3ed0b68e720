//! Scope-info round trips: serialize an analyzed scope, rebuild a mirror
//! chain from it, and resolve against the rebuilt scopes.

use scope_js::AnalyzeInfo;
use scope_js::ContextFrame;
use scope_js::DeserializationMode;
use scope_js::FunctionKind;
use scope_js::InitializationFlag;
use scope_js::MaybeAssignedFlag;
use scope_js::ScopeId;
use scope_js::ScopeInfo;
use scope_js::ScopeTree;
use scope_js::ScopeType;
use scope_js::VariableKind;
use scope_js::VariableLocation;
use scope_js::VariableMode;
use std::rc::Rc;

fn info(script: ScopeId) -> AnalyzeInfo {
  AnalyzeInfo {
    script_scope: script,
    native_script: false,
  }
}

/// Builds and analyzes `function fib() { let x; return () => { x = this; fib; }; }`
/// and returns the serialized picture of the function scope.
fn analyzed_function_info() -> Rc<ScopeInfo> {
  let mut tree = ScopeTree::new();
  let script = tree.new_script_scope();
  let f = tree.new_declaration_scope(script, ScopeType::Function, FunctionKind::NormalFunction);
  tree.declare_this(f);
  tree.declare_default_function_variables(f);
  let fib = tree.names_mut().intern("fib");
  tree.declare_function_var(f, fib);
  let x = tree.names_mut().intern("x");
  tree.declare_local(
    f,
    x,
    VariableMode::Let,
    InitializationFlag::NeedsInitialization,
    VariableKind::Normal,
    MaybeAssignedFlag::NotAssigned,
  );

  // The arrow function captures x (writing it), `this`, and the self binding.
  let arrow = tree.new_declaration_scope(f, ScopeType::Function, FunctionKind::ArrowFunction);
  let x_use = tree.new_proxy(x, None);
  tree.mark_proxy_assigned(x_use);
  tree.add_unresolved(arrow, x_use);
  let this = tree.names_mut().intern("this");
  let this_use = tree.new_proxy(this, None);
  tree.add_unresolved(arrow, this_use);
  let fib_use = tree.new_proxy(fib, None);
  tree.add_unresolved(arrow, fib_use);

  tree.analyze(script, &info(script));
  tree
    .scope(f)
    .scope_info
    .clone()
    .expect("function scopes serialize their layout")
}

#[test]
fn scope_info_records_the_context_layout() {
  let scope_info = analyzed_function_info();
  assert_eq!(scope_info.scope_type, ScopeType::Function);
  assert!(scope_info.is_declaration_scope);
  assert!(!scope_info.calls_eval);

  // Receiver and x in context slots, the function name in the last one.
  assert_eq!(scope_info.context_local_count(), 2);
  let (x_slot, x_local) = scope_info.context_slot_index("x").unwrap();
  assert_eq!(x_local.mode, VariableMode::Let);
  assert_eq!(
    x_local.initialization_flag,
    InitializationFlag::NeedsInitialization
  );
  assert_eq!(x_local.maybe_assigned, MaybeAssignedFlag::MaybeAssigned);
  let (this_slot, _) = scope_info.context_slot_index("this").unwrap();
  assert_eq!(scope_info.receiver_context_slot_index(), Some(this_slot));
  let function = scope_info.function_name.as_ref().unwrap();
  assert_eq!(function.name, "fib");
  assert_eq!(function.slot, scope_info.context_length - 1);
  assert_ne!(x_slot, this_slot);
}

#[test]
fn serde_round_trip_preserves_the_descriptor() {
  let scope_info = analyzed_function_info();
  let json = serde_json::to_string(&*scope_info).unwrap();
  let back: ScopeInfo = serde_json::from_str(&json).unwrap();
  assert_eq!(back, *scope_info);
}

#[test]
fn off_heap_deserialization_materializes_identical_variables() {
  let scope_info = analyzed_function_info();

  let mut tree = ScopeTree::new();
  let script = tree.new_script_scope();
  let innermost = tree.deserialize_scope_chain(
    &[ContextFrame::Function {
      scope_info: scope_info.clone(),
    }],
    script,
    DeserializationMode::OffHeap,
  );

  assert!(tree.scope(innermost).is_function_scope());
  assert!(tree.scope(innermost).already_resolved);
  // Materialization consumed the descriptor.
  assert!(tree.scope(innermost).scope_info.is_none());

  for (position, local) in scope_info.context_locals.iter().enumerate() {
    let name = tree.names().lookup(&local.name).expect("name interned");
    let var = tree
      .scope(innermost)
      .variables
      .lookup(name)
      .expect("context local materialized");
    let v = tree.variable(var);
    assert_eq!(v.mode, local.mode);
    assert_eq!(v.initialization_flag, local.initialization_flag);
    assert_eq!(v.maybe_assigned, local.maybe_assigned);
    let expected_kind = if scope_info.receiver_slot == Some(scope_js::MIN_CONTEXT_SLOTS + position as u32)
    {
      VariableKind::This
    } else {
      VariableKind::Normal
    };
    assert_eq!(v.kind, expected_kind);
    assert_eq!(
      v.location,
      VariableLocation::Context(scope_js::MIN_CONTEXT_SLOTS + position as u32)
    );
  }

  // The function self binding came back at its serialized slot.
  let function = scope_info.function_name.as_ref().unwrap();
  let function_var = tree.decl_data(innermost).unwrap().function_var.unwrap();
  assert_eq!(
    tree.variable(function_var).location,
    VariableLocation::Context(function.slot)
  );
  assert_eq!(tree.variable(function_var).mode, function.mode);
}

#[test]
fn lazy_resolution_materializes_context_locals_on_demand() {
  let scope_info = analyzed_function_info();

  let mut tree = ScopeTree::new();
  let script = tree.new_script_scope();
  let outer = tree.deserialize_scope_chain(
    &[ContextFrame::Function {
      scope_info: scope_info.clone(),
    }],
    script,
    DeserializationMode::ScopesOnly,
  );

  // Re-parse an inner function that refers to x from the outer activation.
  let g = tree.new_declaration_scope(outer, ScopeType::Function, FunctionKind::NormalFunction);
  tree.declare_this(g);
  tree.declare_default_function_variables(g);
  let x = tree.names_mut().intern("x");
  let use_x = tree.new_proxy(x, None);
  tree.add_unresolved(g, use_x);

  tree.analyze(g, &info(script));

  let var = tree.proxy(use_x).binding.unwrap();
  let (expected_slot, _) = scope_info.context_slot_index("x").unwrap();
  assert_eq!(tree.variable(var).location, VariableLocation::Context(expected_slot));
  assert_eq!(tree.variable(var).mode, VariableMode::Let);
  // The materialized variable lives in the deserialized scope's map now.
  assert_eq!(tree.scope(outer).variables.lookup(x), Some(var));
}

#[test]
fn debug_evaluate_frames_resolve_everything_dynamically() {
  let scope_info = analyzed_function_info();

  let mut tree = ScopeTree::new();
  let script = tree.new_script_scope();
  let innermost = tree.deserialize_scope_chain(
    &[
      ContextFrame::With {
        debug_evaluate: true,
      },
      ContextFrame::Function {
        scope_info: scope_info.clone(),
      },
    ],
    script,
    DeserializationMode::ScopesOnly,
  );
  assert!(tree.scope(innermost).is_with_scope());
  assert!(tree.scope(innermost).is_debug_evaluate_scope);

  let f = tree.new_declaration_scope(innermost, ScopeType::Function, FunctionKind::NormalFunction);
  tree.declare_this(f);
  tree.declare_default_function_variables(f);
  // `x` exists in the outer function's context, but debug-evaluate refuses to
  // resolve through it statically.
  let x = tree.names_mut().intern("x");
  let use_x = tree.new_proxy(x, None);
  tree.add_unresolved(f, use_x);

  tree.analyze(f, &info(script));

  let var = tree.proxy(use_x).binding.unwrap();
  assert_eq!(tree.variable(var).mode, VariableMode::Dynamic);
  assert_eq!(tree.variable(var).location, VariableLocation::Lookup);
}

#[test]
fn catch_frames_rebuild_the_catch_binding() {
  let mut tree = ScopeTree::new();
  let script = tree.new_script_scope();
  let innermost = tree.deserialize_scope_chain(
    &[ContextFrame::Catch {
      name: "err".to_string(),
    }],
    script,
    DeserializationMode::ScopesOnly,
  );
  assert!(tree.scope(innermost).is_catch_scope());

  let f = tree.new_declaration_scope(innermost, ScopeType::Function, FunctionKind::NormalFunction);
  tree.declare_this(f);
  tree.declare_default_function_variables(f);
  let err = tree.names_mut().intern("err");
  let use_err = tree.new_proxy(err, None);
  tree.add_unresolved(f, use_err);

  tree.analyze(f, &info(script));

  let var = tree.proxy(use_err).binding.unwrap();
  assert_eq!(
    tree.variable(var).location,
    VariableLocation::Context(scope_js::MIN_CONTEXT_SLOTS)
  );
  assert_eq!(tree.variable(var).mode, VariableMode::Var);
}

#[test]
fn debugger_analysis_describes_contextless_scopes_too() {
  let mut tree = ScopeTree::new();
  let script = tree.new_script_scope();
  let f = tree.new_declaration_scope(script, ScopeType::Function, FunctionKind::NormalFunction);
  tree.declare_this(f);
  tree.declare_default_function_variables(f);
  let block = tree.new_scope(f, ScopeType::Block);
  let x = tree.names_mut().intern("x");
  tree.declare_local(
    block,
    x,
    VariableMode::Let,
    InitializationFlag::NeedsInitialization,
    VariableKind::Normal,
    MaybeAssignedFlag::NotAssigned,
  );

  tree.analyze_for_debugger(script, &info(script));

  // The block ended up without a context, but the debugger still gets a
  // descriptor for it.
  assert!(!tree.scope(block).needs_context());
  let block_info = tree.scope(block).scope_info.clone().unwrap();
  assert_eq!(block_info.scope_type, ScopeType::Block);
  assert_eq!(block_info.context_local_count(), 0);
}

#[test]
fn empty_context_chains_fall_back_to_the_script_scope() {
  let mut tree = ScopeTree::new();
  let script = tree.new_script_scope();
  let innermost =
    tree.deserialize_scope_chain(&[], script, DeserializationMode::ScopesOnly);
  assert_eq!(innermost, script);
}
