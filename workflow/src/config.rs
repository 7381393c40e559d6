use anyhow::{Context, Result};
use serde_json::{Map, Value};
use serde_yaml::{Mapping, Value as Yaml};

use crate::{Error, StageKind};

/// Top-level keys with this prefix hold yaml anchors and are not stage sections.
const ALIAS_PREFIX: &str = "ALIAS";

/// Declarative pipeline definition, as loaded from a config file.
/// This is never modified after loading; builders produce separate
/// resolved structs instead.
#[derive(Debug, Default)]
pub struct PipelineConfig {
    /// blocks for each kind, indexed by `StageKind::index()`, in declaration order.
    sections: [Vec<StageBlock>; StageKind::ALL.len()],
}

impl PipelineConfig {
    /// Parse a pipeline config from yaml text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let root: Yaml = serde_yaml::from_str(text).context("while parsing pipeline yaml")?;
        let mut config = Self::default();
        let root = match root {
            Yaml::Null => return Ok(config),
            Yaml::Mapping(m) => m,
            _ => return Err(Error::NotAMapping("pipeline config".to_owned()).into()),
        };

        for (key, section) in root {
            let key = key
                .as_str()
                .ok_or_else(|| Error::NotAMapping("pipeline config".to_owned()))?;
            if key.starts_with(ALIAS_PREFIX) {
                log::debug!("skipping alias section {key}");
                continue;
            }
            let kind: StageKind = key.parse()?;
            config.sections[kind.index()] = Self::parse_section(kind, section)?;
        }
        Ok(config)
    }

    fn parse_section(kind: StageKind, section: Yaml) -> Result<Vec<StageBlock>> {
        let section = match section {
            Yaml::Null => return Ok(Vec::with_capacity(0)),
            Yaml::Mapping(m) => m,
            _ => return Err(Error::NotAMapping(kind.key().to_owned()).into()),
        };
        let mut blocks = Vec::with_capacity(section.len());
        for (label, fields) in section {
            let label = match label {
                Yaml::String(s) => s,
                Yaml::Number(n) => n.to_string(),
                _ => return Err(Error::NotAMapping(kind.key().to_owned()).into()),
            };
            blocks.push(StageBlock::new(kind, label, fields)?);
        }
        Ok(blocks)
    }

    /// Blocks defined for the given kind, in declaration order.
    pub fn blocks(&self, kind: StageKind) -> &[StageBlock] {
        &self.sections[kind.index()]
    }

    /// Total number of blocks across all kinds.
    pub fn len(&self) -> usize {
        self.sections.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One labelled block in a stage section, e.g. `LCFIT: { D_FIT: {...} }`.
#[derive(Debug, Clone)]
pub struct StageBlock {
    pub kind: StageKind,
    pub label: String,
    fields: Mapping,
}

impl StageBlock {
    /// Create a block; an empty (null) block is allowed.
    pub fn new(kind: StageKind, label: String, fields: Yaml) -> Result<Self, Error> {
        let fields = match fields {
            Yaml::Null => Mapping::new(),
            Yaml::Mapping(m) => m,
            _ => return Err(Error::NotAMapping(format!("{kind}.{label}"))),
        };
        Ok(Self {
            kind,
            label,
            fields,
        })
    }

    /// True if the field is present and not null.
    pub fn has(&self, field: &str) -> bool {
        !matches!(self.fields.get(field), None | Some(Yaml::Null))
    }

    /// Get a scalar field as a string. Numbers and bools are stringified.
    pub fn get_str(&self, field: &str) -> Result<Option<String>, Error> {
        match self.fields.get(field) {
            None | Some(Yaml::Null) => Ok(None),
            Some(Yaml::String(s)) => Ok(Some(s.clone())),
            Some(Yaml::Number(n)) => Ok(Some(n.to_string())),
            Some(Yaml::Bool(b)) => Ok(Some(b.to_string())),
            Some(_) => Err(self.invalid(field, "a string")),
        }
    }

    /// Get a string field that must be present.
    pub fn require_str(&self, field: &str) -> Result<String, Error> {
        self.get_str(field)?.ok_or_else(|| self.missing(field))
    }

    /// Get a field that may be either a single string or a list of strings.
    pub fn get_strs(&self, field: &str) -> Result<Vec<String>, Error> {
        match self.fields.get(field) {
            None | Some(Yaml::Null) => Ok(Vec::with_capacity(0)),
            Some(Yaml::Sequence(seq)) => seq
                .iter()
                .map(|v| match v {
                    Yaml::String(s) => Ok(s.clone()),
                    Yaml::Number(n) => Ok(n.to_string()),
                    _ => Err(self.invalid(field, "a list of strings")),
                })
                .collect(),
            Some(_) => Ok(self.get_str(field)?.into_iter().collect()),
        }
    }

    pub fn get_bool(&self, field: &str, default: bool) -> Result<bool, Error> {
        match self.fields.get(field) {
            None | Some(Yaml::Null) => Ok(default),
            Some(Yaml::Bool(b)) => Ok(*b),
            Some(_) => Err(self.invalid(field, "true or false")),
        }
    }

    pub fn get_usize(&self, field: &str, default: usize) -> Result<usize, Error> {
        match self.fields.get(field) {
            None | Some(Yaml::Null) => Ok(default),
            Some(Yaml::Number(n)) => n
                .as_u64()
                .map(|n| n as usize)
                .ok_or_else(|| self.invalid(field, "a positive integer")),
            Some(_) => Err(self.invalid(field, "a positive integer")),
        }
    }

    /// The block's `OPTS` mapping, converted to json values so it can be
    /// hashed and written to the task input file.
    pub fn opts(&self) -> Result<Map<String, Value>, Error> {
        self.get_map("OPTS")
    }

    /// Get a mapping field as json values. Absent fields give an empty map.
    pub fn get_map(&self, field: &str) -> Result<Map<String, Value>, Error> {
        match self.fields.get(field) {
            None | Some(Yaml::Null) => Ok(Map::new()),
            Some(yaml @ Yaml::Mapping(_)) => match serde_json::to_value(yaml) {
                Ok(Value::Object(map)) => Ok(map),
                _ => Err(self.invalid(field, "a mapping with string keys")),
            },
            Some(_) => Err(self.invalid(field, "a mapping")),
        }
    }

    /// Nested labelled blocks, e.g. each entry of a `MUOPTS` mapping.
    /// Sub-blocks keep this block's kind and their own label.
    pub fn sub_blocks(&self, field: &str) -> Result<Vec<StageBlock>, Error> {
        match self.fields.get(field) {
            None | Some(Yaml::Null) => Ok(Vec::with_capacity(0)),
            Some(Yaml::Mapping(m)) => {
                let mut blocks = Vec::with_capacity(m.len());
                for (label, fields) in m {
                    let label = label
                        .as_str()
                        .ok_or_else(|| self.invalid(field, "a mapping with string labels"))?;
                    blocks.push(StageBlock::new(self.kind, label.to_owned(), fields.clone())?);
                }
                Ok(blocks)
            }
            Some(_) => Err(self.invalid(field, "a mapping")),
        }
    }

    /// Error for a required field that was not given.
    pub fn missing(&self, field: &str) -> Error {
        Error::MissingField {
            kind: self.kind,
            label: self.label.clone(),
            field: field.to_owned(),
        }
    }

    /// Error for a field with the wrong type or an unusable value.
    pub fn invalid(&self, field: &str, expected: &str) -> Error {
        Error::InvalidField {
            kind: self.kind,
            label: self.label.clone(),
            field: field.to_owned(),
            expected: expected.to_owned(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const CONFIG: &str = "
SIM:
  SIM_B: {NUM_VERSIONS: 2}
  SIM_A:
LCFIT:
  FIT:
    MASK: SIM
    OPTS:
      BATCH_INFO: sbatch 10
      FITOPTS: [a, b]
ALIAS_OPTS: &opts
  X: 1
";

    #[test]
    fn test_declaration_order() -> Result<()> {
        let config = PipelineConfig::from_yaml(CONFIG)?;
        let labels: Vec<&str> = config
            .blocks(StageKind::Sim)
            .iter()
            .map(|b| b.label.as_str())
            .collect();
        assert_eq!(labels, vec!["SIM_B", "SIM_A"]);
        assert_eq!(config.len(), 3);
        assert!(config.blocks(StageKind::BiasCor).is_empty());
        Ok(())
    }

    #[test]
    fn test_unknown_section() {
        let err = PipelineConfig::from_yaml("PLOTS:\n  a: {}\n").unwrap_err();
        assert!(err.to_string().contains("PLOTS"), "{err}");
    }

    #[test]
    fn test_accessors() -> Result<()> {
        let config = PipelineConfig::from_yaml(CONFIG)?;
        let sim = &config.blocks(StageKind::Sim)[0];
        assert_eq!(sim.get_usize("NUM_VERSIONS", 1)?, 2);
        assert_eq!(config.blocks(StageKind::Sim)[1].get_usize("NUM_VERSIONS", 1)?, 1);

        let fit = &config.blocks(StageKind::LcFit)[0];
        assert_eq!(fit.get_strs("MASK")?, vec!["SIM"]);
        assert_eq!(fit.get_str("MASK")?.as_deref(), Some("SIM"));
        assert!(fit.get_strs("MISSING")?.is_empty());
        assert!(fit.get_bool("MASK", false).is_err());
        assert!(matches!(
            fit.require_str("MODE"),
            Err(Error::MissingField { .. })
        ));

        let opts = fit.opts()?;
        assert_eq!(opts["BATCH_INFO"], Value::from("sbatch 10"));
        assert_eq!(opts["FITOPTS"], serde_json::json!(["a", "b"]));
        Ok(())
    }

    #[test]
    fn test_sub_blocks() -> Result<()> {
        let yaml = "
BIASCOR:
  BCOR:
    DATA: D
    MUOPTS:
      ALT_SIM: {SIMFILE_BIASCOR: S2}
      NO_CLASS:
";
        let config = PipelineConfig::from_yaml(yaml)?;
        let muopts = config.blocks(StageKind::BiasCor)[0].sub_blocks("MUOPTS")?;
        assert_eq!(muopts.len(), 2);
        assert_eq!(muopts[0].label, "ALT_SIM");
        assert_eq!(muopts[0].get_strs("SIMFILE_BIASCOR")?, vec!["S2"]);
        assert!(!muopts[1].has("SIMFILE_BIASCOR"));
        Ok(())
    }
}
