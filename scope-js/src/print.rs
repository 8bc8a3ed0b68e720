//! Human-readable scope tree dumps, for debugging and tests.

use crate::scope::ScopeId;
use crate::scope::ScopeTree;
use crate::variable::Variable;
use crate::variable::VariableLocation;
use crate::FunctionKind;
use std::fmt::Write;

fn header(tree: &ScopeTree, scope: ScopeId) -> &'static str {
  let s = tree.scope(scope);
  let function_kind = s
    .decl
    .as_ref()
    .map(|d| d.function_kind)
    .unwrap_or_default();
  match s.scope_type {
    crate::ScopeType::Script => "global",
    crate::ScopeType::Module => "module",
    crate::ScopeType::Eval => "eval",
    crate::ScopeType::Catch => "catch",
    crate::ScopeType::With => "with",
    crate::ScopeType::Block => {
      if s.is_declaration_scope() {
        "varblock"
      } else {
        "block"
      }
    }
    crate::ScopeType::Function => match function_kind {
      FunctionKind::ArrowFunction => "arrow",
      FunctionKind::GeneratorFunction => "function*",
      FunctionKind::AsyncFunction => "async function",
      _ => "function",
    },
  }
}

fn location(var: &Variable) -> String {
  match var.location {
    VariableLocation::Unallocated => String::new(),
    VariableLocation::Parameter(i) => format!("parameter[{i}]"),
    VariableLocation::Local(i) => format!("local[{i}]"),
    VariableLocation::Context(i) => format!("context[{i}]"),
    VariableLocation::Global(i) => format!("global[{i}]"),
    VariableLocation::Lookup => "lookup".to_string(),
    VariableLocation::Module(i) => format!("module[{i}]"),
  }
}

fn indent(out: &mut String, n: usize, text: &str) {
  let _ = write!(out, "{:indent$}{text}", "", indent = n);
}

impl ScopeTree {
  pub fn print_scope(&self, scope: ScopeId) -> String {
    let mut out = String::new();
    self.print_scope_at(&mut out, scope, 0);
    out
  }

  fn print_scope_at(&self, out: &mut String, scope: ScopeId, n: usize) {
    let s = self.scope(scope);
    let n1 = n + 2;

    indent(out, n, header(self, scope));
    if s.is_function_scope() {
      let decl = s.decl.as_ref().expect("function scopes are declaration scopes");
      let params: Vec<&str> = decl
        .params
        .iter()
        .map(|&p| self.names().name(self.variable(p).name))
        .collect();
      let _ = write!(out, " ({})", params.join(", "));
    }
    match (s.start_position, s.end_position) {
      (Some(start), Some(end)) => {
        let _ = writeln!(out, " {{ // ({start}, {end})");
      }
      _ => {
        let _ = writeln!(out, " {{");
      }
    }

    let function_var = s.decl.as_ref().and_then(|d| d.function_var);
    if let Some(f) = function_var {
      indent(out, n1, "// (local) function name: ");
      let _ = writeln!(out, "{}", self.names().name(self.variable(f).name));
    }

    if s.language_mode.is_strict() {
      indent(out, n1, "// strict mode scope\n");
    }
    if s.is_asm_module() {
      indent(out, n1, "// scope is an asm module\n");
    }
    if s.is_asm_function() {
      indent(out, n1, "// scope is an asm function\n");
    }
    if s.scope_calls_eval {
      indent(out, n1, "// scope calls 'eval'\n");
    }
    if s.decl.as_ref().is_some_and(|d| d.uses_super_property) {
      indent(out, n1, "// scope uses 'super' property\n");
    }
    if s.inner_scope_calls_eval {
      indent(out, n1, "// inner scope calls 'eval'\n");
    }
    if s.num_stack_slots > 0 {
      indent(out, n1, "");
      let _ = writeln!(out, "// {} stack slots", s.num_stack_slots);
    }
    if s.num_heap_slots > 0 {
      indent(out, n1, "");
      let _ = writeln!(out, "// {} heap slots", s.num_heap_slots);
    }

    if let Some(f) = function_var {
      indent(out, n1, "// function var:\n");
      self.print_var(out, n1, f);
    }

    if !s.variables.is_empty() {
      indent(out, n1, "// local vars:\n");
      for (_, var) in s.variables.iter() {
        if !self.variable(var).is_dynamic() {
          self.print_var(out, n1, var);
        }
      }
      indent(out, n1, "// dynamic vars:\n");
      for (_, var) in s.variables.iter() {
        if self.variable(var).is_dynamic() {
          self.print_var(out, n1, var);
        }
      }
    }

    let mut children = self.inner_scopes(scope);
    children.reverse();
    for child in children {
      let _ = writeln!(out);
      self.print_scope_at(out, child, n1);
    }

    indent(out, n, "}\n");
  }

  fn print_var(&self, out: &mut String, n: usize, var: crate::variable::VariableId) {
    let v = self.variable(var);
    if !v.is_used && v.location.is_unallocated() {
      return;
    }
    indent(out, n, v.mode.as_str());
    let name = self.names().name(v.name);
    if name.is_empty() {
      let _ = write!(out, " .temp{}", var.raw());
    } else {
      let _ = write!(out, " {name}");
    }
    let _ = write!(out, ";  // {}", location(v));
    let mut comma = !v.location.is_unallocated();
    if v.forced_context_allocation {
      if comma {
        let _ = write!(out, ", ");
      }
      let _ = write!(out, "forced context allocation");
      comma = true;
    }
    if v.maybe_assigned == crate::variable::MaybeAssignedFlag::MaybeAssigned {
      if comma {
        let _ = write!(out, ", ");
      }
      let _ = write!(out, "maybe assigned");
    }
    let _ = writeln!(out);
  }
}
