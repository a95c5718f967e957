//! Shared parameter definition files
//!
//! The host imports shared parameters from a tab-separated definition file.
//! The foundry writes a temporary file in that format for each run; the
//! in-memory host parses it back.

use crate::error::ModelError;
use crate::value::DataType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use uuid::Uuid;

/// Default definition group name
pub const DEFAULT_GROUP: &str = "Foundry";

/// External definition of a shared parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedParamDefinition {
    pub name: String,
    pub guid: Uuid,
    pub data_type: DataType,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub user_modifiable: bool,
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

fn default_true() -> bool {
    true
}

impl SharedParamDefinition {
    /// Create definition with a fresh GUID
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self::with_guid(name, data_type, Uuid::new_v4())
    }

    /// Create definition with a known GUID
    #[must_use]
    pub fn with_guid(name: impl Into<String>, data_type: DataType, guid: Uuid) -> Self {
        Self {
            name: name.into(),
            guid,
            data_type,
            group: default_group(),
            description: String::new(),
            visible: true,
            user_modifiable: true,
        }
    }
}

/// In-memory view of a shared parameter file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedParameterFile {
    pub definitions: Vec<SharedParamDefinition>,
}

impl SharedParameterFile {
    /// Create file from definitions
    #[inline]
    #[must_use]
    pub fn new(definitions: Vec<SharedParamDefinition>) -> Self {
        Self { definitions }
    }

    /// Look up a definition by name
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&SharedParamDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    /// Render in the host's tab-separated format
    #[must_use]
    pub fn to_host_text(&self) -> String {
        let mut groups: BTreeMap<&str, usize> = BTreeMap::new();
        for def in &self.definitions {
            let next = groups.len() + 1;
            groups.entry(def.group.as_str()).or_insert(next);
        }

        let mut out = String::new();
        out.push_str("# This is a shared parameter file.\n");
        out.push_str("# Do not edit manually.\n");
        out.push_str("*META\tVERSION\tMINVERSION\n");
        out.push_str("META\t2\t1\n");
        out.push_str("*GROUP\tID\tNAME\n");
        let mut by_id: Vec<(&str, usize)> = groups.iter().map(|(n, id)| (*n, *id)).collect();
        by_id.sort_by_key(|(_, id)| *id);
        for (name, id) in by_id {
            let _ = writeln!(out, "GROUP\t{id}\t{name}");
        }
        out.push_str(
            "*PARAM\tGUID\tNAME\tDATATYPE\tDATACATEGORY\tGROUP\tVISIBLE\tDESCRIPTION\tUSERMODIFIABLE\n",
        );
        for def in &self.definitions {
            let _ = writeln!(
                out,
                "PARAM\t{}\t{}\t{}\t\t{}\t{}\t{}\t{}",
                def.guid,
                def.name,
                def.data_type.host_name(),
                groups[def.group.as_str()],
                u8::from(def.visible),
                def.description,
                u8::from(def.user_modifiable),
            );
        }
        out
    }

    /// Parse the host's tab-separated format
    ///
    /// # Errors
    /// Returns [`ModelError::SharedFile`] with the offending line
    pub fn parse(text: &str) -> Result<Self, ModelError> {
        let mut groups: BTreeMap<String, String> = BTreeMap::new();
        let mut definitions = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            if line.trim().is_empty() || line.starts_with('#') || line.starts_with('*') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let err = |reason: &str| ModelError::SharedFile {
                line: line_no,
                reason: reason.to_string(),
            };

            match fields[0] {
                "META" => {}
                "GROUP" => {
                    if fields.len() < 3 {
                        return Err(err("GROUP needs an id and a name"));
                    }
                    groups.insert(fields[1].to_string(), fields[2].to_string());
                }
                "PARAM" => {
                    if fields.len() < 6 {
                        return Err(err("PARAM needs at least six fields"));
                    }
                    let guid = Uuid::parse_str(fields[1]).map_err(|e| err(&e.to_string()))?;
                    let data_type =
                        DataType::from_name(fields[3]).map_err(|e| err(&e.to_string()))?;
                    let group = groups
                        .get(fields[5])
                        .cloned()
                        .ok_or_else(|| err("PARAM refers to an unknown group"))?;
                    definitions.push(SharedParamDefinition {
                        name: fields[2].to_string(),
                        guid,
                        data_type,
                        group,
                        description: fields.get(7).copied().unwrap_or_default().to_string(),
                        visible: fields.get(6).map_or(true, |v| *v != "0"),
                        user_modifiable: fields.get(8).map_or(true, |v| *v != "0"),
                    });
                }
                other => return Err(err(&format!("unknown record '{other}'"))),
            }
        }

        Ok(Self { definitions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn host_text_parses_back() {
        let mut door = SharedParamDefinition::new("Door Width", DataType::Length);
        door.group = "Doors".to_string();
        door.description = "clear width".to_string();
        let file = SharedParameterFile::new(vec![
            SharedParamDefinition::new("PE_Mark", DataType::Text),
            door,
        ]);

        let text = file.to_host_text();
        assert!(text.contains("GROUP\t1\tFoundry"));
        assert!(text.contains("GROUP\t2\tDoors"));

        let parsed = SharedParameterFile::parse(&text).unwrap();
        assert_eq!(parsed, file);
    }

    #[test]
    fn parse_rejects_unknown_group() {
        let text = "PARAM\t0b9a2f3e-1111-4e3c-9d9a-000000000001\tX\tTEXT\t\t7\t1\t\t1\n";
        let err = SharedParameterFile::parse(text).unwrap_err();
        assert!(matches!(err, ModelError::SharedFile { line: 1, .. }));
    }

    #[test]
    fn parse_rejects_bad_guid() {
        let text = "GROUP\t1\tFoundry\nPARAM\tnot-a-guid\tX\tTEXT\t\t1\t1\t\t1\n";
        let err = SharedParameterFile::parse(text).unwrap_err();
        assert!(matches!(err, ModelError::SharedFile { line: 2, .. }));
    }

    #[test]
    fn find_by_name() {
        let file = SharedParameterFile::new(vec![SharedParamDefinition::new(
            "PE_Mark",
            DataType::Text,
        )]);
        assert!(file.find("PE_Mark").is_some());
        assert!(file.find("Other").is_none());
    }
}
