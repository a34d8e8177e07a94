
use crate::inputs::Material;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum MaterialError {
    #[error("Material {0} not found")]
    NotFound(String),
    #[error("Failed to read material catalogue: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse material catalogue: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Lookup of materials by name
pub trait MaterialSource: Send + Sync {
    fn material(&self, name: &str) -> Result<Material, MaterialError>;
}

/// Materials read from a YAML map of name to properties
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct MaterialCatalog {
    materials: BTreeMap<String, BTreeMap<String, f64>>,
}

impl MaterialCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml(content: &str) -> Result<Self, MaterialError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, MaterialError> {
        let catalog = Self::from_yaml(&fs::read_to_string(path)?)?;
        info!(path = ?path, materials = catalog.materials.len(), "Loaded material catalogue");

        Ok(catalog)
    }

    pub fn insert(&mut self, material: Material) {
        self.materials.insert(material.name, material.properties);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.materials.keys().map(String::as_str)
    }
}

impl MaterialSource for MaterialCatalog {
    fn material(&self, name: &str) -> Result<Material, MaterialError> {
        self.materials
            .get(name)
            .map(|properties| Material {
                name: name.to_owned(),
                properties: properties.clone(),
            })
            .ok_or_else(|| MaterialError::NotFound(name.to_owned()))
    }
}

/// Source that knows every name and leaves the properties to the solver
#[derive(Clone, Copy, Debug, Default)]
pub struct NamedMaterials;

impl MaterialSource for NamedMaterials {
    fn material(&self, name: &str) -> Result<Material, MaterialError> {
        Ok(Material::named(name))
    }
}
