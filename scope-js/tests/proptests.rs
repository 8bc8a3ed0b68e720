//! Allocator invariants over randomly shaped scopes.

use proptest::prelude::*;
use scope_js::AnalyzeInfo;
use scope_js::FunctionKind;
use scope_js::InitializationFlag;
use scope_js::MaybeAssignedFlag;
use scope_js::ScopeId;
use scope_js::ScopeTree;
use scope_js::ScopeType;
use scope_js::VariableKind;
use scope_js::VariableLocation;
use scope_js::VariableMode;
use scope_js::MIN_CONTEXT_SLOTS;

#[derive(Clone, Debug)]
struct VarSpec {
  mode: VariableMode,
  used: bool,
  captured: bool,
}

fn arb_var() -> impl Strategy<Value = VarSpec> {
  (
    prop::sample::select(vec![VariableMode::Var, VariableMode::Let, VariableMode::Const]),
    any::<bool>(),
    any::<bool>(),
  )
    .prop_map(|(mode, used, captured)| VarSpec {
      mode,
      used,
      captured,
    })
}

struct Built {
  tree: ScopeTree,
  function: ScopeId,
  inner: ScopeId,
  vars: Vec<scope_js::VariableId>,
  temporaries: Vec<scope_js::VariableId>,
}

fn build(specs: &[VarSpec], temporaries: usize, calls_eval: bool) -> Built {
  let mut tree = ScopeTree::new();
  let script = tree.new_script_scope();
  let function =
    tree.new_declaration_scope(script, ScopeType::Function, FunctionKind::NormalFunction);
  tree.declare_this(function);
  tree.declare_default_function_variables(function);
  let inner =
    tree.new_declaration_scope(function, ScopeType::Function, FunctionKind::NormalFunction);
  tree.declare_this(inner);
  tree.declare_default_function_variables(inner);

  let mut vars = Vec::new();
  for (i, spec) in specs.iter().enumerate() {
    let name = tree.names_mut().intern(format!("v{i}"));
    let init = if spec.mode == VariableMode::Var {
      InitializationFlag::CreatedInitialized
    } else {
      InitializationFlag::NeedsInitialization
    };
    let var = tree.declare_local(
      function,
      name,
      spec.mode,
      init,
      VariableKind::Normal,
      MaybeAssignedFlag::NotAssigned,
    );
    vars.push(var);
    if spec.used {
      let proxy = tree.new_proxy(name, None);
      tree.add_unresolved(function, proxy);
    }
    if spec.captured {
      let proxy = tree.new_proxy(name, None);
      tree.add_unresolved(inner, proxy);
    }
  }

  let mut temps = Vec::new();
  for _ in 0..temporaries {
    let temp = tree.new_temporary(function, scope_js::NameInterner::EMPTY);
    tree.variable_mut(temp).set_is_used();
    temps.push(temp);
  }

  if calls_eval {
    tree.record_eval_call(function);
  }

  tree.analyze(
    script,
    &AnalyzeInfo {
      script_scope: script,
      native_script: false,
    },
  );

  Built {
    tree,
    function,
    inner,
    vars,
    temporaries: temps,
  }
}

fn slot_indices(tree: &ScopeTree, scope: ScopeId) -> (Vec<u32>, Vec<u32>) {
  let mut seen = std::collections::HashSet::new();
  let mut stack = Vec::new();
  let mut context = Vec::new();
  let map_vars = tree.scope(scope).variables.iter().map(|(_, var)| var);
  let locals = tree.scope(scope).locals.iter().copied();
  let function_var = tree.decl_data(scope).and_then(|d| d.function_var);
  for var in map_vars.chain(locals).chain(function_var) {
    if !seen.insert(var) {
      continue;
    }
    match tree.variable(var).location {
      VariableLocation::Local(i) => stack.push(i),
      VariableLocation::Context(i) => context.push(i),
      _ => {}
    }
  }
  stack.sort_unstable();
  context.sort_unstable();
  (stack, context)
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(64))]

  #[test]
  fn slot_indices_are_dense(
    specs in prop::collection::vec(arb_var(), 0..12),
    temporaries in 0usize..3,
    calls_eval in any::<bool>(),
  ) {
    let built = build(&specs, temporaries, calls_eval);
    let tree = &built.tree;

    for scope in [built.function, built.inner] {
      let (stack, context) = slot_indices(tree, scope);
      let expected_stack: Vec<u32> = (0..tree.scope(scope).num_stack_slots).collect();
      prop_assert_eq!(&stack, &expected_stack);
      let expected_context: Vec<u32> =
        (MIN_CONTEXT_SLOTS..tree.scope(scope).num_heap_slots).collect();
      prop_assert_eq!(&context, &expected_context);
    }
  }

  #[test]
  fn named_variables_are_allocated_iff_observable(
    specs in prop::collection::vec(arb_var(), 0..12),
    calls_eval in any::<bool>(),
  ) {
    let built = build(&specs, 0, calls_eval);
    let tree = &built.tree;

    for (spec, &var) in specs.iter().zip(built.vars.iter()) {
      let v = tree.variable(var);
      if calls_eval {
        // A direct eval can observe and write every named binding.
        prop_assert!(v.is_used);
        prop_assert!(v.location.is_context_slot());
        prop_assert_eq!(v.maybe_assigned, MaybeAssignedFlag::MaybeAssigned);
      } else if spec.captured {
        prop_assert!(v.location.is_context_slot());
      } else if spec.used {
        prop_assert!(v.location.is_stack_local());
      } else {
        prop_assert!(v.location.is_unallocated());
        prop_assert!(!v.is_used);
      }
    }
  }

  #[test]
  fn temporaries_stay_off_the_context(
    specs in prop::collection::vec(arb_var(), 0..8),
    temporaries in 1usize..4,
    calls_eval in any::<bool>(),
  ) {
    let built = build(&specs, temporaries, calls_eval);
    let tree = &built.tree;

    for &temp in &built.temporaries {
      let v = tree.variable(temp);
      // Used temporaries get stack slots even when an eval is around; they
      // have no name an eval could reach.
      prop_assert!(v.location.is_stack_local());
    }
  }
}
