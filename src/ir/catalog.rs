//! Ordered class catalogs: the name <-> index bijection for one dataset.
//!
//! A catalog is always passed explicitly to the readers and writers that need
//! it. Built-in catalogs cover the public remote-sensing datasets; custom
//! catalogs load from a YAML `names:` file or a one-name-per-line text file.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::ClassId;
use crate::error::RslabelError;

const DOTA_CLASSES: [&str; 18] = [
    "plane",
    "ship",
    "storage-tank",
    "baseball-diamond",
    "tennis-court",
    "basketball-court",
    "ground-track-field",
    "harbor",
    "bridge",
    "large-vehicle",
    "small-vehicle",
    "helicopter",
    "roundabout",
    "soccer-ball-field",
    "swimming-pool",
    "container-crane",
    "airport",
    "helipad",
];

const VISDRONE_CLASSES: [&str; 12] = [
    "ignored regions",
    "pedestrian",
    "people",
    "bicycle",
    "car",
    "van",
    "truck",
    "tricycle",
    "awning-tricycle",
    "bus",
    "motor",
    "others",
];

const VHR_CLASSES: [&str; 10] = [
    "airplane",
    "ship",
    "storage tank",
    "baseball diamond",
    "tennis court",
    "basketball court",
    "ground track field",
    "harbor",
    "bridge",
    "vehicle",
];

/// Names of the catalogs returned by [`ClassCatalog::builtin`].
pub const BUILTIN_CATALOGS: [&str; 3] = ["dota", "visdrone", "vhr"];

/// An ordered list of class names; a name's position is its [`ClassId`].
#[derive(Clone, Debug, PartialEq)]
pub struct ClassCatalog {
    names: Vec<String>,
    by_name: HashMap<String, ClassId>,
}

impl ClassCatalog {
    /// Builds a catalog from names in index order.
    ///
    /// Fails on duplicate or blank names, since either would break the
    /// name <-> id bijection.
    pub fn new<I, S>(names: I) -> Result<Self, RslabelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_names(
            names.into_iter().map(Into::into).collect(),
            Path::new("<memory>"),
        )
    }

    /// Catalog of the oriented-polygon aerial dataset (18 classes).
    pub fn dota() -> Self {
        Self::from_static(&DOTA_CLASSES)
    }

    /// Catalog of the frame-delta drone dataset. Index 0 is `ignored regions`,
    /// matching the dataset's numeric class codes.
    pub fn visdrone() -> Self {
        Self::from_static(&VISDRONE_CLASSES)
    }

    /// Catalog of the parenthesized-corner VHR dataset (10 classes).
    ///
    /// The dataset's class codes start at 1 while this catalog is indexed from
    /// 0; codes are looked up positionally as-is.
    pub fn vhr() -> Self {
        Self::from_static(&VHR_CLASSES)
    }

    /// Looks up a built-in catalog by name (case-insensitive).
    pub fn builtin(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "dota" => Some(Self::dota()),
            "visdrone" => Some(Self::visdrone()),
            "vhr" | "nwpu-vhr" => Some(Self::vhr()),
            _ => None,
        }
    }

    /// Resolves a catalog argument: a built-in name, or a path to a YAML file
    /// (`.yaml`/`.yml`) or a plain-text class list.
    pub fn load(arg: &str) -> Result<Self, RslabelError> {
        if let Some(catalog) = Self::builtin(arg) {
            return Ok(catalog);
        }

        let path = Path::new(arg);
        if !path.is_file() {
            return Err(RslabelError::ClassCatalogInvalid {
                path: path.to_path_buf(),
                message: format!(
                    "not a file and not a built-in catalog (built-ins: {})",
                    BUILTIN_CATALOGS.join(", ")
                ),
            });
        }

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);

        if is_yaml {
            Self::from_yaml_path(path)
        } else {
            Self::from_classes_txt(path)
        }
    }

    /// Reads the `names:` key of a YAML file, as a sequence or as an
    /// `index: name` mapping. Gaps in a mapping are an error.
    pub fn from_yaml_path(path: &Path) -> Result<Self, RslabelError> {
        let data = fs::read_to_string(path).map_err(|source| RslabelError::path_io(path, source))?;
        let parsed: NamesYaml =
            serde_yaml::from_str(&data).map_err(|source| RslabelError::ClassCatalogParse {
                path: path.to_path_buf(),
                source,
            })?;

        let names = match parsed.names {
            YamlNames::Sequence(names) => names,
            YamlNames::Mapping(mapping) => {
                let mut names = Vec::with_capacity(mapping.len());
                for (expected, (index, name)) in mapping.into_iter().enumerate() {
                    if index != expected {
                        return Err(RslabelError::ClassCatalogInvalid {
                            path: path.to_path_buf(),
                            message: format!("missing class index {expected} in names mapping"),
                        });
                    }
                    names.push(name);
                }
                names
            }
        };

        Self::from_names(names, path)
    }

    /// Reads one class name per line.
    pub fn from_classes_txt(path: &Path) -> Result<Self, RslabelError> {
        let data = fs::read_to_string(path).map_err(|source| RslabelError::path_io(path, source))?;
        let mut names = Vec::new();

        for (line_idx, line) in data.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return Err(RslabelError::ClassCatalogInvalid {
                    path: path.to_path_buf(),
                    message: format!("line {} is empty", line_idx + 1),
                });
            }
            names.push(trimmed.to_string());
        }

        Self::from_names(names, path)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn id_of(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, id: ClassId) -> Option<&str> {
        self.names.get(id.index()).map(String::as_str)
    }

    /// Resolves a numeric class code as stored in frame-delta and
    /// parenthesized-corner files.
    pub fn resolve_code(&self, raw: &str) -> Option<(ClassId, &str)> {
        let index = raw.trim().parse::<usize>().ok()?;
        let id = ClassId::new(index);
        self.name_of(id).map(|name| (id, name))
    }

    fn from_static(names: &[&str]) -> Self {
        let names: Vec<String> = names.iter().map(|name| name.to_string()).collect();
        let by_name = names
            .iter()
            .enumerate()
            .map(|(index, name)| (name.clone(), ClassId::new(index)))
            .collect();
        Self { names, by_name }
    }

    fn from_names(names: Vec<String>, source: &Path) -> Result<Self, RslabelError> {
        let mut by_name = HashMap::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(RslabelError::ClassCatalogInvalid {
                    path: source.to_path_buf(),
                    message: format!("class {index} has an empty name"),
                });
            }
            if by_name.insert(name.clone(), ClassId::new(index)).is_some() {
                return Err(RslabelError::ClassCatalogInvalid {
                    path: source.to_path_buf(),
                    message: format!("duplicate class name '{name}'"),
                });
            }
        }
        Ok(Self { names, by_name })
    }
}

#[derive(Debug, Deserialize)]
struct NamesYaml {
    names: YamlNames,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum YamlNames {
    Sequence(Vec<String>),
    Mapping(BTreeMap<usize, String>),
}
