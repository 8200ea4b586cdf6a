//! # Project Structure
//!
//! The equipment classification tree of a project. Each character
//! position of an equipment code corresponds to one tree level:
//! system, family, type, model, variant. A main document may only be
//! filed under an equipment code whose full path is declared here.
//!
//! The tree is an owned value: each level exclusively owns its children
//! and mutation happens only through the explicit `add_*` operations.
//! There are no back references and no shared globals.

use crate::header::Header;
use crate::types::{EquipmentCode, ProjectCode, QapError, is_upper_or_digit};
use serde::{Deserialize, Serialize};

/// Validate a single structure level code character.
fn check_level_code(code: char) -> Result<u8, QapError> {
    if !code.is_ascii() || !is_upper_or_digit(code as u8) {
        return Err(QapError::BadEquipmentCode);
    }
    Ok(code as u8)
}

// =============================================================================
// TREE LEVELS
// =============================================================================

/// The overlying structure of a project: its code, descriptive metadata
/// and the declared equipment classification tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub code: ProjectCode,
    pub name: String,
    pub description: String,
    pub systems: Vec<System>,
}

/// First letter of an equipment code: the system the equipment belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct System {
    pub code: u8,
    pub name: String,
    pub description: String,
    pub families: Vec<Family>,
}

/// Second letter of an equipment code: the family within a system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    pub code: u8,
    pub name: String,
    pub description: String,
    pub types: Vec<TypeNode>,
}

/// Third letter of an equipment code: the type within a family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeNode {
    pub code: u8,
    pub name: String,
    pub description: String,
    pub models: Vec<Model>,
}

/// Fourth letter of an equipment code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub code: u8,
    pub name: String,
    pub description: String,
    pub variants: Vec<Variant>,
}

/// Fifth letter of an equipment code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub code: u8,
    pub name: String,
    pub description: String,
}

// =============================================================================
// MUTATION
// =============================================================================

impl Project {
    /// Create an empty project structure.
    #[must_use]
    pub fn new(code: ProjectCode, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
            description: description.into(),
            systems: Vec::new(),
        }
    }

    /// Declare a system under the project. Fails if the code character is
    /// invalid or already declared at this level.
    pub fn add_system(
        &mut self,
        code: char,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<&mut System, QapError> {
        let code = check_level_code(code)?;
        if self.systems.iter().any(|s| s.code == code) {
            return Err(QapError::DuplicateCode(code as char));
        }
        self.systems.push(System {
            code,
            name: name.into(),
            description: description.into(),
            families: Vec::new(),
        });
        let last = self.systems.len() - 1;
        Ok(&mut self.systems[last])
    }

    /// Declare every missing level along `equipment`, attaching `name` and
    /// `description` to the leaf level. Fails if the full path is already
    /// declared.
    pub fn add_equipment_path(
        &mut self,
        equipment: &EquipmentCode,
        name: &str,
        description: &str,
    ) -> Result<(), QapError> {
        if self.contains_equipment(equipment) {
            let last = equipment.as_str().chars().last().unwrap_or('?');
            return Err(QapError::DuplicateCode(last));
        }
        let chars: Vec<char> = equipment.as_str().chars().collect();
        let depth = chars.len();
        let leaf = |level: usize| level + 1 == depth;
        let pick = |level: usize, field: &str| -> String {
            if leaf(level) { field.to_string() } else { String::new() }
        };

        let system = match self.systems.iter_mut().position(|s| s.code == chars[0] as u8) {
            Some(i) => &mut self.systems[i],
            None => {
                let name = pick(0, name);
                let desc = pick(0, description);
                self.add_system(chars[0], name, desc)?
            }
        };
        if depth == 1 {
            return Ok(());
        }
        let family = match system.families.iter_mut().position(|f| f.code == chars[1] as u8) {
            Some(i) => &mut system.families[i],
            None => system.add_family(chars[1], pick(1, name), pick(1, description))?,
        };
        if depth == 2 {
            return Ok(());
        }
        let type_node = match family.types.iter_mut().position(|t| t.code == chars[2] as u8) {
            Some(i) => &mut family.types[i],
            None => family.add_type(chars[2], pick(2, name), pick(2, description))?,
        };
        if depth == 3 {
            return Ok(());
        }
        let model = match type_node.models.iter_mut().position(|m| m.code == chars[3] as u8) {
            Some(i) => &mut type_node.models[i],
            None => type_node.add_model(chars[3], pick(3, name), pick(3, description))?,
        };
        if depth == 4 {
            return Ok(());
        }
        model.add_variant(chars[4], pick(4, name), pick(4, description))?;
        Ok(())
    }

    /// True if the header's equipment code is declared level by level in
    /// this structure. Gates main document admission.
    #[must_use]
    pub fn contains_code(&self, header: &Header) -> bool {
        self.contains_equipment(header.equipment())
    }

    /// True if every character of `equipment` is declared along one path.
    #[must_use]
    pub fn contains_equipment(&self, equipment: &EquipmentCode) -> bool {
        let bytes = equipment.as_str().as_bytes();
        let Some(system) = self.systems.iter().find(|s| s.code == bytes[0]) else {
            return false;
        };
        let Some(&b) = bytes.get(1) else { return true };
        let Some(family) = system.families.iter().find(|f| f.code == b) else {
            return false;
        };
        let Some(&b) = bytes.get(2) else { return true };
        let Some(type_node) = family.types.iter().find(|t| t.code == b) else {
            return false;
        };
        let Some(&b) = bytes.get(3) else { return true };
        let Some(model) = type_node.models.iter().find(|m| m.code == b) else {
            return false;
        };
        let Some(&b) = bytes.get(4) else { return true };
        model.variants.iter().any(|v| v.code == b)
    }
}

impl System {
    /// Declare a family under this system.
    pub fn add_family(
        &mut self,
        code: char,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<&mut Family, QapError> {
        let code = check_level_code(code)?;
        if self.families.iter().any(|f| f.code == code) {
            return Err(QapError::DuplicateCode(code as char));
        }
        self.families.push(Family {
            code,
            name: name.into(),
            description: description.into(),
            types: Vec::new(),
        });
        let last = self.families.len() - 1;
        Ok(&mut self.families[last])
    }
}

impl Family {
    /// Declare a type under this family.
    pub fn add_type(
        &mut self,
        code: char,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<&mut TypeNode, QapError> {
        let code = check_level_code(code)?;
        if self.types.iter().any(|t| t.code == code) {
            return Err(QapError::DuplicateCode(code as char));
        }
        self.types.push(TypeNode {
            code,
            name: name.into(),
            description: description.into(),
            models: Vec::new(),
        });
        let last = self.types.len() - 1;
        Ok(&mut self.types[last])
    }
}

impl TypeNode {
    /// Declare a model under this type.
    pub fn add_model(
        &mut self,
        code: char,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<&mut Model, QapError> {
        let code = check_level_code(code)?;
        if self.models.iter().any(|m| m.code == code) {
            return Err(QapError::DuplicateCode(code as char));
        }
        self.models.push(Model {
            code,
            name: name.into(),
            description: description.into(),
            variants: Vec::new(),
        });
        let last = self.models.len() - 1;
        Ok(&mut self.models[last])
    }
}

impl Model {
    /// Declare a variant under this model.
    pub fn add_variant(
        &mut self,
        code: char,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<&mut Variant, QapError> {
        let code = check_level_code(code)?;
        if self.variants.iter().any(|v| v.code == code) {
            return Err(QapError::DuplicateCode(code as char));
        }
        self.variants.push(Variant {
            code,
            name: name.into(),
            description: description.into(),
        });
        let last = self.variants.len() - 1;
        Ok(&mut self.variants[last])
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn project() -> Project {
        Project::new(
            ProjectCode::parse("SPS").unwrap(),
            "Super Proton Synchrotron",
            "accelerator documentation",
        )
    }

    fn equipment(s: &str) -> EquipmentCode {
        EquipmentCode::parse(s).unwrap()
    }

    #[test]
    fn add_system_rejects_duplicates() {
        let mut p = project();
        p.add_system('P', "Power", "power systems").unwrap();
        assert!(matches!(
            p.add_system('P', "Power again", ""),
            Err(QapError::DuplicateCode('P'))
        ));
    }

    #[test]
    fn add_system_rejects_bad_code() {
        let mut p = project();
        assert!(matches!(
            p.add_system('p', "lower", ""),
            Err(QapError::BadEquipmentCode)
        ));
        assert!(matches!(
            p.add_system('-', "dash", ""),
            Err(QapError::BadEquipmentCode)
        ));
    }

    #[test]
    fn contains_equipment_walks_levels() {
        let mut p = project();
        let system = p.add_system('P', "Power", "").unwrap();
        let family = system.add_family('E', "Electrical", "").unwrap();
        family.add_type('C', "Converter", "").unwrap();

        assert!(p.contains_equipment(&equipment("P")));
        assert!(p.contains_equipment(&equipment("PE")));
        assert!(p.contains_equipment(&equipment("PEC")));
        assert!(!p.contains_equipment(&equipment("PEX")));
        assert!(!p.contains_equipment(&equipment("PECX")));
        assert!(!p.contains_equipment(&equipment("X")));
    }

    #[test]
    fn add_equipment_path_declares_missing_levels() {
        let mut p = project();
        p.add_equipment_path(&equipment("UPPE1"), "Upper extraction 1", "test stand")
            .unwrap();
        assert!(p.contains_equipment(&equipment("UPPE1")));
        assert!(p.contains_equipment(&equipment("UPP")));

        // Leaf carries the name; intermediate levels stay unnamed.
        let system = p.systems.iter().find(|s| s.code == b'U').unwrap();
        assert!(system.name.is_empty());

        // Declaring the same full path again fails.
        assert!(matches!(
            p.add_equipment_path(&equipment("UPPE1"), "again", ""),
            Err(QapError::DuplicateCode('1'))
        ));

        // A sibling sharing a prefix is fine.
        p.add_equipment_path(&equipment("UPPE2"), "Upper extraction 2", "")
            .unwrap();
        assert!(p.contains_equipment(&equipment("UPPE2")));
    }

    #[test]
    fn structure_survives_serialization() {
        let mut p = project();
        p.add_equipment_path(&equipment("PEC"), "Converter", "").unwrap();
        let bytes = postcard::to_allocvec(&p).unwrap();
        let back: Project = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(back, p);
    }
}
