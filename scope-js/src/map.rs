//! Per-scope variable maps.
//!
//! A [`VariableMap`] maps interned names to the variable declared under that
//! name in one scope. Iteration order is insertion order, which keeps
//! printing and allocation deterministic. Removal only happens during scope
//! re-parenting, so it trades a linear shift for keeping the order intact.

use crate::intern::NameId;
use crate::variable::VariableId;
use ahash::HashMap;
use ahash::HashMapExt;

#[derive(Clone, Debug, Default)]
pub struct VariableMap {
  entries: Vec<(NameId, VariableId)>,
  index: HashMap<NameId, usize>,
}

impl VariableMap {
  pub fn new() -> Self {
    Self {
      entries: Vec::new(),
      index: HashMap::new(),
    }
  }

  pub fn lookup(&self, name: NameId) -> Option<VariableId> {
    self.index.get(&name).map(|&pos| self.entries[pos].1)
  }

  pub fn contains(&self, name: NameId) -> bool {
    self.index.contains_key(&name)
  }

  /// Inserts a binding; the name must not already be present.
  pub fn add(&mut self, name: NameId, var: VariableId) {
    debug_assert!(
      !self.index.contains_key(&name),
      "a name is declared at most once per map"
    );
    self.index.insert(name, self.entries.len());
    self.entries.push((name, var));
  }

  pub fn remove(&mut self, name: NameId) -> Option<VariableId> {
    let pos = self.index.remove(&name)?;
    let (_, var) = self.entries.remove(pos);
    for (_, shifted) in self.index.iter_mut() {
      if *shifted > pos {
        *shifted -= 1;
      }
    }
    Some(var)
  }

  pub fn iter(&self) -> impl Iterator<Item = (NameId, VariableId)> + '_ {
    self.entries.iter().copied()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::VariableMap;
  use crate::intern::NameId;
  use crate::variable::VariableId;

  fn name(raw: u32) -> NameId {
    NameId::from_raw(raw)
  }

  fn var(raw: u32) -> VariableId {
    VariableId::from_raw(raw)
  }

  #[test]
  fn lookup_finds_added_bindings() {
    let mut map = VariableMap::new();
    map.add(name(1), var(10));
    map.add(name(2), var(11));
    assert_eq!(map.lookup(name(1)), Some(var(10)));
    assert_eq!(map.lookup(name(2)), Some(var(11)));
    assert_eq!(map.lookup(name(3)), None);
  }

  #[test]
  fn iteration_preserves_insertion_order_across_removal() {
    let mut map = VariableMap::new();
    map.add(name(5), var(0));
    map.add(name(3), var(1));
    map.add(name(9), var(2));
    assert_eq!(map.remove(name(3)), Some(var(1)));
    assert_eq!(map.remove(name(3)), None);
    let order: Vec<_> = map.iter().collect();
    assert_eq!(order, vec![(name(5), var(0)), (name(9), var(2))]);
    assert_eq!(map.lookup(name(9)), Some(var(2)));
    assert_eq!(map.len(), 2);
  }
}
