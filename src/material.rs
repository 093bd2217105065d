//! Material model
//!
//! Materials are immutable once loaded. The `MaterialDatabase` owns them and
//! hands out shared `Arc<Material>` handles that points and springs keep for
//! their whole lifetime.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use glam::Vec3;
use serde::Deserialize;

use crate::error::{GameError, Result};
use crate::vectors::{hex_to_rgb, rgb_to_vec3};

/// Kind of electrical element a material behaves as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElectricalElementType {
    Lamp,
    Cable,
    Generator,
}

impl FromStr for ElectricalElementType {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lamp" => Ok(Self::Lamp),
            "cable" => Ok(Self::Cable),
            "generator" => Ok(Self::Generator),
            _ => Err(GameError::UnknownElectricalElementType(s.to_string())),
        }
    }
}

/// Electrical properties of a material
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElectricalProperties {
    pub element_type: ElectricalElementType,
    pub is_self_powered: bool,
}

/// Family of sounds a material makes when stressed, broken or destroyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundElementType {
    Wood,
    Iron,
    Glass,
    Cable,
    Lamp,
    Cloth,
    Rubber,
    Plastic,
}

impl FromStr for SoundElementType {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "wood" => Ok(Self::Wood),
            "iron" => Ok(Self::Iron),
            "glass" => Ok(Self::Glass),
            "cable" => Ok(Self::Cable),
            "lamp" => Ok(Self::Lamp),
            "cloth" => Ok(Self::Cloth),
            "rubber" => Ok(Self::Rubber),
            "plastic" => Ok(Self::Plastic),
            _ => Err(GameError::UnknownSoundElementType(s.to_string())),
        }
    }
}

/// Sound properties of a material
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundProperties {
    pub element_type: SoundElementType,
}

/// An immutable material
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// nominal_mass × density
    pub mass: f32,
    pub strength: f32,
    pub stiffness: f32,
    pub structural_colour: [u8; 3],
    pub render_colour: Vec3,
    pub is_hull: bool,
    pub is_rope: bool,
    pub electrical_properties: Option<ElectricalProperties>,
    pub sound_properties: Option<SoundProperties>,
}

// Raw JSON shapes; enum strings and colours are validated when converting.

#[derive(Deserialize)]
struct MassJson {
    nominal_mass: f32,
    density: f32,
}

#[derive(Deserialize)]
struct ElectricalPropertiesJson {
    element_type: String,
    is_self_powered: bool,
}

#[derive(Deserialize)]
struct SoundPropertiesJson {
    element_type: String,
}

fn default_name() -> String {
    "Unspecified".to_string()
}

fn default_one() -> f32 {
    1.0
}

#[derive(Deserialize)]
struct MaterialJson {
    #[serde(default = "default_name")]
    name: String,
    mass: MassJson,
    #[serde(default = "default_one")]
    strength: f32,
    #[serde(default = "default_one")]
    stiffness: f32,
    structural_colour: String,
    render_colour: String,
    is_hull: bool,
    #[serde(default)]
    is_rope: bool,
    electrical_properties: Option<ElectricalPropertiesJson>,
    sound_properties: Option<SoundPropertiesJson>,
}

impl Material {
    /// Parse a single material description
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: MaterialJson = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: MaterialJson) -> Result<Self> {
        let mass = raw.mass.nominal_mass * raw.mass.density;
        if mass.is_nan() || mass <= 0.0 {
            return Err(GameError::InvalidMaterial {
                material: raw.name,
                message: format!("mass must be positive, got {mass}"),
            });
        }

        let electrical_properties = raw
            .electrical_properties
            .map(|e| -> Result<_> {
                Ok(ElectricalProperties {
                    element_type: e.element_type.parse()?,
                    is_self_powered: e.is_self_powered,
                })
            })
            .transpose()?;

        let sound_properties = raw
            .sound_properties
            .map(|s| -> Result<_> {
                Ok(SoundProperties {
                    element_type: s.element_type.parse()?,
                })
            })
            .transpose()?;

        Ok(Self {
            name: raw.name,
            mass,
            strength: raw.strength,
            stiffness: raw.stiffness,
            structural_colour: hex_to_rgb(&raw.structural_colour)?,
            render_colour: rgb_to_vec3(hex_to_rgb(&raw.render_colour)?),
            is_hull: raw.is_hull,
            is_rope: raw.is_rope,
            electrical_properties,
            sound_properties,
        })
    }
}

/// The shared, read-only material table
#[derive(Debug, Clone, Default)]
pub struct MaterialDatabase {
    materials: Vec<Arc<Material>>,
    by_name: HashMap<String, usize>,
    by_structural_colour: HashMap<[u8; 3], usize>,
}

impl MaterialDatabase {
    /// Parse a JSON array of material descriptions
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: Vec<MaterialJson> = serde_json::from_str(json)?;

        let mut database = Self::default();
        for raw_material in raw {
            database.insert(Material::from_raw(raw_material)?)?;
        }

        log::info!("Loaded {} materials", database.len());
        Ok(database)
    }

    /// Load the material table from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| GameError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Add a material; names and structural colours must be unique
    pub fn insert(&mut self, material: Material) -> Result<Arc<Material>> {
        if self.by_name.contains_key(&material.name)
            || self.by_structural_colour.contains_key(&material.structural_colour)
        {
            return Err(GameError::DuplicateMaterial(material.name));
        }

        let index = self.materials.len();
        self.by_name.insert(material.name.clone(), index);
        self.by_structural_colour
            .insert(material.structural_colour, index);
        let material = Arc::new(material);
        self.materials.push(Arc::clone(&material));
        Ok(material)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Material>> {
        self.by_name.get(name).map(|&i| &self.materials[i])
    }

    /// Look up the material a ship image pixel stands for
    pub fn by_structural_colour(&self, rgb: [u8; 3]) -> Option<&Arc<Material>> {
        self.by_structural_colour
            .get(&rgb)
            .map(|&i| &self.materials[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Material>> {
        self.materials.iter()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
