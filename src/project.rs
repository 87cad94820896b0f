//! The set of modules analysed together

use crate::engine::StructuralError;
use crate::scope::ExposedNames;
use crate::syntax::{Module, ModuleName};
use std::collections::BTreeMap;

/// Project modules by name, plus the exposed names of external dependencies
#[derive(Debug, Clone, Default)]
pub struct Project {
    modules: BTreeMap<ModuleName, Module>,
    dependencies: BTreeMap<ModuleName, ExposedNames>,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a project, failing on the first duplicate module name
    pub fn from_modules(
        modules: impl IntoIterator<Item = Module>,
    ) -> Result<Self, StructuralError> {
        let mut project = Self::new();
        for module in modules {
            project.add_module(module)?;
        }
        Ok(project)
    }

    pub fn add_module(&mut self, module: Module) -> Result<(), StructuralError> {
        let name = module.name().clone();
        if self.modules.contains_key(&name) {
            return Err(StructuralError::DuplicateModule(name));
        }
        self.modules.insert(name, module);
        Ok(())
    }

    /// Declare a module provided by an external package
    pub fn with_dependency(mut self, name: ModuleName, exposed: ExposedNames) -> Self {
        self.dependencies.insert(name, exposed);
        self
    }

    pub fn module(&self, name: &ModuleName) -> Option<&Module> {
        self.modules.get(name)
    }

    pub fn contains(&self, name: &ModuleName) -> bool {
        self.modules.contains_key(name)
    }

    /// Modules ordered by name
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn module_names(&self) -> impl Iterator<Item = &ModuleName> {
        self.modules.keys()
    }

    pub fn dependencies(&self) -> &BTreeMap<ModuleName, ExposedNames> {
        &self.dependencies
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
