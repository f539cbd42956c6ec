//! Local mirror of a dataset's dimension, variable, group and attribute
//! definitions.
//!
//! Lookups never fail: an absent entry is `None`. Nothing here talks to the
//! engine, so the mirror can go stale if the same file is modified through
//! another handle.

use crate::engine::{DimId, VarId};
use crate::types::{AttrValue, DimLen, NcType};

use indexmap::IndexMap;
use smallvec::SmallVec;

#[derive(Debug, Clone, PartialEq)]
pub struct DimensionEntry {
    /// Identifier assigned by the engine.
    pub id: DimId,
    pub len: DimLen,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableEntry {
    /// Identifier assigned by the engine.
    pub id: VarId,
    pub nc_type: NcType,
    pub dims: SmallVec<[String; 4]>,
    pub attrs: IndexMap<String, AttrValue>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupEntry {
    pub attrs: IndexMap<String, AttrValue>,
}

/// Where an attribute lives.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AttrScope<'a> {
    Global,
    Variable(&'a str),
    Group(&'a str),
}

#[derive(Debug, Clone, Default)]
pub struct MetadataCache {
    dims: IndexMap<String, DimensionEntry>,
    vars: IndexMap<String, VariableEntry>,
    groups: IndexMap<String, GroupEntry>,
    attrs: IndexMap<String, AttrValue>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dimension(&self, name: &str) -> Option<&DimensionEntry> {
        self.dims.get(name)
    }

    pub fn variable(&self, name: &str) -> Option<&VariableEntry> {
        self.vars.get(name)
    }

    pub fn group(&self, name: &str) -> Option<&GroupEntry> {
        self.groups.get(name)
    }

    pub fn attribute(&self, scope: AttrScope<'_>, name: &str) -> Option<&AttrValue> {
        self.attrs_of(scope).and_then(|attrs| attrs.get(name))
    }

    pub fn attribute_names(&self, scope: AttrScope<'_>) -> Option<Vec<String>> {
        self.attrs_of(scope).map(|attrs| attrs.keys().cloned().collect())
    }

    pub fn dimensions(&self) -> impl Iterator<Item = (&String, &DimensionEntry)> {
        self.dims.iter()
    }

    pub fn variables(&self) -> impl Iterator<Item = (&String, &VariableEntry)> {
        self.vars.iter()
    }

    pub fn group_names(&self) -> impl Iterator<Item = &String> {
        self.groups.keys()
    }

    /// Record a dimension. Returns `false`, leaving the existing entry intact,
    /// if the name is taken.
    pub fn insert_dimension(&mut self, name: &str, entry: DimensionEntry) -> bool {
        if self.dims.contains_key(name) {
            false
        } else {
            self.dims.insert(name.to_string(), entry);
            true
        }
    }

    pub fn insert_variable(&mut self, name: &str, entry: VariableEntry) -> bool {
        if self.vars.contains_key(name) {
            false
        } else {
            self.vars.insert(name.to_string(), entry);
            true
        }
    }

    pub fn insert_group(&mut self, name: &str) -> bool {
        if self.groups.contains_key(name) {
            false
        } else {
            self.groups.insert(name.to_string(), GroupEntry::default());
            true
        }
    }

    /// Set an attribute, replacing any existing value. Returns `false` if the
    /// scope does not exist.
    pub fn set_attribute(&mut self, scope: AttrScope<'_>, name: &str, value: AttrValue) -> bool {
        match self.attrs_of_mut(scope) {
            Some(attrs) => {
                attrs.insert(name.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// Map dimension names to engine identifiers. On failure returns the
    /// first name that has no entry.
    pub fn resolve_dimids<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<SmallVec<[DimId; 4]>, String> {
        names
            .iter()
            .map(|n| {
                self.dims
                    .get(n.as_ref())
                    .map(|d| d.id)
                    .ok_or_else(|| n.as_ref().to_string())
            })
            .collect()
    }

    /// Logical shape of a variable.
    pub fn shape(&self, var: &str) -> Option<Vec<DimLen>> {
        let entry = self.vars.get(var)?;
        entry
            .dims
            .iter()
            .map(|d| self.dims.get(d).map(|x| x.len))
            .collect()
    }

    /// Number of elements a read of `var` returns: the product of its
    /// dimension sizes, with unlimited dimensions counting as 0.
    pub fn element_count(&self, var: &str) -> Option<usize> {
        self.shape(var)
            .map(|shape| shape.iter().map(|d| d.readable_len()).product())
    }

    pub fn clear(&mut self) {
        self.dims.clear();
        self.vars.clear();
        self.groups.clear();
        self.attrs.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty() && self.vars.is_empty() && self.groups.is_empty() && self.attrs.is_empty()
    }

    fn attrs_of(&self, scope: AttrScope<'_>) -> Option<&IndexMap<String, AttrValue>> {
        match scope {
            AttrScope::Global => Some(&self.attrs),
            AttrScope::Variable(v) => self.vars.get(v).map(|x| &x.attrs),
            AttrScope::Group(g) => self.groups.get(g).map(|x| &x.attrs),
        }
    }

    fn attrs_of_mut(&mut self, scope: AttrScope<'_>) -> Option<&mut IndexMap<String, AttrValue>> {
        match scope {
            AttrScope::Global => Some(&mut self.attrs),
            AttrScope::Variable(v) => self.vars.get_mut(v).map(|x| &mut x.attrs),
            AttrScope::Group(g) => self.groups.get_mut(g).map(|x| &mut x.attrs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(id: VarId, dims: &[&str]) -> VariableEntry {
        VariableEntry {
            id,
            nc_type: NcType::Double,
            dims: dims.iter().map(|x| x.to_string()).collect(),
            attrs: IndexMap::new(),
        }
    }

    #[test]
    fn test_lookups_absent() {
        let cache = MetadataCache::new();
        assert!(cache.dimension("x").is_none());
        assert!(cache.variable("v").is_none());
        assert!(cache.attribute(AttrScope::Global, "a").is_none());
        assert!(cache.attribute(AttrScope::Variable("v"), "a").is_none());
        assert!(cache.attribute_names(AttrScope::Group("g")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_duplicate_dimension_keeps_first() {
        let mut cache = MetadataCache::new();
        assert!(cache.insert_dimension("lat", DimensionEntry { id: 0, len: DimLen::Fixed(3) }));
        assert!(!cache.insert_dimension("lat", DimensionEntry { id: 1, len: DimLen::Fixed(9) }));
        assert_eq!(cache.dimension("lat").unwrap().len, DimLen::Fixed(3));
        assert_eq!(cache.dimension("lat").unwrap().id, 0);
    }

    #[test]
    fn test_resolve_uses_engine_ids() {
        let mut cache = MetadataCache::new();
        cache.insert_dimension("x", DimensionEntry { id: 7, len: DimLen::Fixed(2) });
        cache.insert_dimension("y", DimensionEntry { id: 3, len: DimLen::Fixed(4) });
        let ids = cache.resolve_dimids(&["y", "x"]).unwrap();
        assert_eq!(ids.as_slice(), &[3, 7]);
        assert_eq!(cache.resolve_dimids(&["x", "z"]), Err("z".to_string()));
    }

    #[test]
    fn test_element_count() {
        let mut cache = MetadataCache::new();
        cache.insert_dimension("t", DimensionEntry { id: 0, len: DimLen::Unlimited });
        cache.insert_dimension("x", DimensionEntry { id: 1, len: DimLen::Fixed(5) });
        cache.insert_dimension("y", DimensionEntry { id: 2, len: DimLen::Fixed(2) });
        cache.insert_variable("a", var(0, &["x", "y"]));
        cache.insert_variable("b", var(1, &["t", "x"]));
        cache.insert_variable("s", var(2, &[]));
        assert_eq!(cache.element_count("a"), Some(10));
        assert_eq!(cache.element_count("b"), Some(0));
        assert_eq!(cache.element_count("s"), Some(1));
        assert_eq!(cache.element_count("nope"), None);
        assert_eq!(
            cache.shape("b"),
            Some(vec![DimLen::Unlimited, DimLen::Fixed(5)])
        );
    }

    #[test]
    fn test_attribute_scopes() {
        let mut cache = MetadataCache::new();
        assert!(cache.set_attribute(AttrScope::Global, "title", "t".into()));
        assert!(!cache.set_attribute(AttrScope::Variable("v"), "units", "K".into()));
        cache.insert_variable("v", var(0, &[]));
        assert!(cache.set_attribute(AttrScope::Variable("v"), "units", "K".into()));
        cache.insert_group("g");
        assert!(cache.set_attribute(AttrScope::Group("g"), "a", 1i32.into()));
        assert_eq!(
            cache.attribute(AttrScope::Variable("v"), "units"),
            Some(&AttrValue::Text("K".into()))
        );
        assert_eq!(
            cache.attribute_names(AttrScope::Global),
            Some(vec!["title".to_string()])
        );
        let entry = cache.variable("v").unwrap();
        assert_eq!(entry.dims, SmallVec::<[String; 4]>::new());
        cache.clear();
        assert!(cache.is_empty());
    }
}
