//! Lazy-parsing support: builder snapshots with re-parenting, free-variable
//! collection, and promotion of a pre-parse to a full parse.

use scope_js::AnalyzeInfo;
use scope_js::FunctionKind;
use scope_js::InitializationFlag;
use scope_js::LanguageMode;
use scope_js::MaybeAssignedFlag;
use scope_js::ScopeTree;
use scope_js::ScopeType;
use scope_js::VariableKind;
use scope_js::VariableMode;

#[test]
fn reparent_moves_post_snapshot_state_under_the_new_function() {
  let mut tree = ScopeTree::new();
  let script = tree.new_script_scope();
  let f = tree.new_declaration_scope(script, ScopeType::Function, FunctionKind::NormalFunction);
  tree.declare_this(f);
  tree.declare_default_function_variables(f);
  let locals_before = tree.scope(f).locals.len();

  let snapshot = tree.snapshot(f);

  // The parser speculatively parsed ahead inside f: a block, a use, a
  // temporary, and a var all arrived after the snapshot…
  let block = tree.new_scope(f, ScopeType::Block);
  let a = tree.names_mut().intern("a");
  let use_a = tree.new_proxy(a, None);
  tree.add_unresolved(f, use_a);
  let temp_name = tree.names_mut().intern(".result");
  let temp = tree.new_temporary(f, temp_name);
  let v = tree.names_mut().intern("v");
  let v_var = tree.declare_local(
    f,
    v,
    VariableMode::Var,
    InitializationFlag::CreatedInitialized,
    VariableKind::Normal,
    MaybeAssignedFlag::NotAssigned,
  );

  // …and then it discovered they all belong to an arrow function.
  let arrow = tree.new_declaration_scope(f, ScopeType::Function, FunctionKind::ArrowFunction);
  tree.reparent(&snapshot, arrow);

  // The arrow is now f's only child and owns the block.
  assert_eq!(tree.inner_scopes(f), vec![arrow]);
  assert_eq!(tree.inner_scopes(arrow), vec![block]);
  assert_eq!(tree.scope(block).outer, Some(arrow));

  // The unresolved use moved over.
  assert_eq!(tree.scope(f).unresolved, None);
  assert_eq!(tree.scope(arrow).unresolved, Some(use_a));

  // Post-snapshot locals migrated; the var also switched variable maps.
  assert_eq!(tree.scope(f).locals.len(), locals_before);
  assert_eq!(tree.variable(temp).scope, Some(arrow));
  assert_eq!(tree.variable(v_var).scope, Some(arrow));
  assert!(!tree.scope(f).variables.contains(v));
  assert_eq!(tree.scope(arrow).variables.lookup(v), Some(v_var));
  assert!(tree.scope(arrow).locals.contains(&temp));
  assert!(tree.scope(arrow).locals.contains(&v_var));
}

#[test]
fn collect_non_locals_reports_only_free_names() {
  let mut tree = ScopeTree::new();
  let script = tree.new_script_scope();
  let f = tree.new_declaration_scope(script, ScopeType::Function, FunctionKind::NormalFunction);
  tree.declare_this(f);
  tree.declare_default_function_variables(f);
  let x = tree.names_mut().intern("x");
  tree.declare_local(
    f,
    x,
    VariableMode::Var,
    InitializationFlag::CreatedInitialized,
    VariableKind::Normal,
    MaybeAssignedFlag::NotAssigned,
  );
  let y = tree.names_mut().intern("y");
  let inner = tree.new_declaration_scope(f, ScopeType::Function, FunctionKind::ArrowFunction);

  let use_x = tree.new_proxy(x, None);
  tree.add_unresolved(f, use_x);
  let use_y = tree.new_proxy(y, None);
  tree.add_unresolved(f, use_y);
  let use_y_inner = tree.new_proxy(y, None);
  tree.add_unresolved(inner, use_y_inner);

  let info = AnalyzeInfo {
    script_scope: script,
    native_script: false,
  };
  let non_locals = tree.collect_non_locals(f, Some(&info));

  assert!(non_locals.contains(&y));
  assert!(!non_locals.contains(&x));
  // x resolved within f and was bound on the way.
  assert_eq!(
    tree.proxy(use_x).binding,
    tree.scope(f).variables.lookup(x)
  );
  assert!(!tree.proxy(use_y).is_resolved());
  // The walked unresolved lists were consumed.
  assert_eq!(tree.scope(f).unresolved, None);
  assert_eq!(tree.scope(inner).unresolved, None);
}

#[test]
fn analyze_partially_migrates_free_proxies_and_flags() {
  // The pre-parse lives in its own arena…
  let mut preparse = ScopeTree::new();
  let script1 = preparse.new_script_scope();
  let f1 =
    preparse.new_declaration_scope(script1, ScopeType::Function, FunctionKind::NormalFunction);
  preparse.set_language_mode(f1, LanguageMode::Strict);
  preparse.set_position(f1, 10, 90);
  preparse.record_eval_call(f1);
  preparse.record_super_property_usage(f1);
  let x = preparse.names_mut().intern("x");
  preparse.declare_local(
    f1,
    x,
    VariableMode::Var,
    InitializationFlag::CreatedInitialized,
    VariableKind::Normal,
    MaybeAssignedFlag::NotAssigned,
  );
  let use_x = preparse.new_proxy(x, None);
  preparse.add_unresolved(f1, use_x);
  let y = preparse.names_mut().intern("y");
  let use_y = preparse.new_proxy(y, Some(42));
  preparse.add_unresolved(f1, use_y);
  preparse.mark_proxy_assigned(use_y);

  // …and the full parse re-creates the same function in a fresh one.
  let mut full = ScopeTree::new();
  let script2 = full.new_script_scope();
  let f2 = full.new_declaration_scope(script2, ScopeType::Function, FunctionKind::NormalFunction);

  preparse.analyze_partially(f1, &mut full, f2);

  // Only the genuinely free reference migrated, keeping its flags.
  let migrated = full.scope(f2).unresolved.expect("one migrated proxy");
  let proxy = full.proxy(migrated);
  assert_eq!(full.names().name(proxy.name), "y");
  assert_eq!(proxy.position, Some(42));
  assert!(proxy.is_assigned);
  assert_eq!(proxy.next_unresolved, None);

  // Usage flags and positions came along.
  assert!(full.scope(f2).calls_eval());
  assert!(full.decl_data(f2).unwrap().uses_super_property);
  assert_eq!(full.scope(f2).language_mode, LanguageMode::Strict);
  assert_eq!(full.scope(f2).start_position, Some(10));
  assert_eq!(full.scope(f2).end_position, Some(90));

  // The pre-parse scope is detached from its tree.
  assert_eq!(preparse.scope(f1).outer, None);
  assert!(preparse.inner_scopes(script1).is_empty());
}
