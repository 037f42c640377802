use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{FlowError, Result};

/// Translation lookup. Pure: the same key always renders the same text.
pub trait Localizer: Send + Sync {
    /// Text for `key`, or the key itself when the catalog has no entry.
    fn t(&self, key: &str) -> String;

    /// Like [`Localizer::t`], replacing every `{{name}}` placeholder.
    fn t_with(&self, key: &str, args: &[(&str, String)]) -> String {
        let mut text = self.t(key);
        for (name, value) in args {
            text = text.replace(&format!("{{{{{name}}}}}"), value);
        }
        text
    }
}

/// Flat dotted-key catalog loaded from a nested YAML document.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: BTreeMap<String, String>,
}

impl Catalog {
    pub fn from_yaml(source: &str) -> Result<Self> {
        let root: Value =
            serde_yaml::from_str(source).map_err(|e| FlowError::Locale(e.to_string()))?;
        let mut entries = BTreeMap::new();
        flatten(&root, String::new(), &mut entries)?;
        Ok(Self { entries })
    }

    pub fn keys(&self) -> BTreeSet<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Localizer for Catalog {
    fn t(&self, key: &str) -> String {
        self.entries
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

fn flatten(value: &Value, prefix: String, out: &mut BTreeMap<String, String>) -> Result<()> {
    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let key = key
                    .as_str()
                    .ok_or_else(|| FlowError::Locale(format!("non-string key under '{prefix}'")))?;
                let path = if prefix.is_empty() {
                    key.to_string()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(child, path, out)?;
            }
            Ok(())
        }
        Value::String(text) => {
            out.insert(prefix, text.clone());
            Ok(())
        }
        Value::Number(number) => {
            out.insert(prefix, number.to_string());
            Ok(())
        }
        Value::Bool(flag) => {
            out.insert(prefix, flag.to_string());
            Ok(())
        }
        Value::Null => Ok(()),
        _ => Err(FlowError::Locale(format!(
            "unsupported value at '{prefix}'"
        ))),
    }
}
