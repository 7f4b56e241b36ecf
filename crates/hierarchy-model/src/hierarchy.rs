use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

/// Class every other class descends from.
pub const ROOT_CLASS: &str = "WPObject";

/// Builtin classes, all direct children of the root.
const BUILTIN_CLASSES: &[&str] = &[
    "WPGroup",
    "WPDirectory",
    "WPFile",
    "WPSearchHandle",
    "WPSearchProgress",
    "WPAccount",
    "WPSlurmPartition",
    "WPSlurmJob",
    "WPLmodDependency",
    "WPLmodSoftware",
    "WPNocoTable",
    "WPNocoRecord",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("Class {class} cannot be its own ancestor")]
    Cycle { class: String },
    #[error("Class {0} is the hierarchy root and cannot have a parent")]
    RootReparented(String),
}

/// Static table from class tag to its ordered ancestor chain, nearest first.
///
/// Unknown tags have no ancestors. Matching against the table is a pure data
/// lookup, so the table is built once and shared read-only.
#[derive(Debug, Clone)]
pub struct ClassHierarchy {
    parents: BTreeMap<String, String>,
    chains: HashMap<String, Vec<String>>,
}

impl Default for ClassHierarchy {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ClassHierarchy {
    /// The classes every provider in this repository may emit.
    #[must_use]
    pub fn builtin() -> Self {
        let parents = BUILTIN_CLASSES
            .iter()
            .map(|class| ((*class).to_string(), ROOT_CLASS.to_string()))
            .collect();
        let chains = std::iter::once((ROOT_CLASS.to_string(), Vec::new()))
            .chain(
                BUILTIN_CLASSES
                    .iter()
                    .map(|class| ((*class).to_string(), vec![ROOT_CLASS.to_string()])),
            )
            .collect();
        Self { parents, chains }
    }

    /// Merge extra `class -> parent` edges into the table. Later edges replace
    /// earlier parents for the same class.
    ///
    /// # Errors
    /// Returns an error when the merged table would contain a cycle or give
    /// the root class a parent.
    pub fn with_classes<I, C, P>(mut self, edges: I) -> Result<Self, HierarchyError>
    where
        I: IntoIterator<Item = (C, P)>,
        C: Into<String>,
        P: Into<String>,
    {
        for (class, parent) in edges {
            let class = class.into();
            if class == ROOT_CLASS {
                return Err(HierarchyError::RootReparented(class));
            }
            self.parents.insert(class, parent.into());
        }
        self.rebuild()?;
        Ok(self)
    }

    fn rebuild(&mut self) -> Result<(), HierarchyError> {
        let mut chains = HashMap::with_capacity(self.parents.len() + 1);
        chains.insert(ROOT_CLASS.to_string(), Vec::new());
        for class in self.parents.keys() {
            let mut chain: Vec<String> = Vec::new();
            let mut cursor = self.parents.get(class);
            while let Some(parent) = cursor {
                if parent == class || chain.contains(parent) {
                    return Err(HierarchyError::Cycle {
                        class: class.clone(),
                    });
                }
                chain.push(parent.clone());
                cursor = self.parents.get(parent);
            }
            chains.insert(class.clone(), chain);
        }
        self.chains = chains;
        Ok(())
    }

    /// Ancestors of `class`, nearest first. Empty for the root and for
    /// unknown tags.
    #[must_use]
    pub fn ancestors(&self, class: &str) -> &[String] {
        self.chains.get(class).map_or(&[], Vec::as_slice)
    }

    /// `class` followed by its ancestors.
    pub fn lineage<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a str> {
        std::iter::once(class).chain(self.ancestors(class).iter().map(String::as_str))
    }

    #[must_use]
    pub fn is_a(&self, class: &str, ancestor: &str) -> bool {
        self.lineage(class).any(|c| c == ancestor)
    }

    #[must_use]
    pub fn contains(&self, class: &str) -> bool {
        self.chains.contains_key(class)
    }
}
