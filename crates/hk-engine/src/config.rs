//! Sectioned configuration: section -> option -> value.

use std::collections::BTreeMap;
use std::path::Path;

use hk_core::Value;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::argument::yaml_to_value;
use crate::error::{CommandResult, Failure};

/// A configurable option with its default and help text.
#[derive(Clone, Debug, PartialEq)]
pub struct Setting {
    pub section: String,
    pub option: String,
    pub value: Value,
    pub help: String,
}

impl Setting {
    pub fn new(
        section: impl Into<String>,
        option: impl Into<String>,
        value: impl Into<Value>,
        help: impl Into<String>,
    ) -> Self {
        Self {
            section: section.into(),
            option: option.into(),
            value: value.into(),
            help: help.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config {
    sections: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings<'a>(settings: impl IntoIterator<Item = &'a Setting>) -> Self {
        let mut config = Self::new();
        for s in settings {
            config.set(&s.section, &s.option, s.value.clone());
        }
        config
    }

    pub fn get(&self, section: &str, option: &str) -> Option<&Value> {
        self.sections.get(section)?.get(option)
    }

    pub fn set(&mut self, section: &str, option: &str, value: Value) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(option.to_string(), value);
    }

    pub fn section(&self, section: &str) -> Option<&BTreeMap<String, Value>> {
        self.sections.get(section)
    }

    pub fn sections(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, Value>)> {
        self.sections.iter()
    }

    /// Options in `other` override ours.
    pub fn merge(&mut self, other: &Config) {
        for (section, options) in &other.sections {
            for (option, value) in options {
                self.set(section, option, value.clone());
            }
        }
    }

    pub fn from_yaml(text: &str) -> CommandResult<Self> {
        let mut config = Self::new();
        match yaml_to_value(serde_yaml::from_str(text)?) {
            Value::Null => {}
            Value::Map(sections) => {
                for (section, options) in sections {
                    match options {
                        Value::Map(options) => {
                            for (option, value) in options {
                                config.set(&section, &option, value);
                            }
                        }
                        Value::Null => {}
                        other => {
                            return Err(Failure::message(format!(
                                "config section '{section}' must be a mapping, got {}",
                                other.type_name()
                            )));
                        }
                    }
                }
            }
            other => {
                return Err(Failure::message(format!(
                    "config must be a mapping of sections, got {}",
                    other.type_name()
                )));
            }
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> CommandResult<Self> {
        debug!(path = %path.display(), "loading config");
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    /// YAML with a comment block per section listing each known option's
    /// help.
    pub fn to_yaml(&self, settings: &[Setting]) -> CommandResult<String> {
        let mut out = String::new();
        for (section, options) in &self.sections {
            out.push_str(&format!("# {section}\n"));
            for s in settings.iter().filter(|s| &s.section == section && !s.help.is_empty()) {
                out.push_str(&format!("#   {}: {}\n", s.option, s.help));
            }
            let mut single = BTreeMap::new();
            single.insert(section.clone(), options.clone());
            out.push_str(&serde_yaml::to_string(&single)?);
        }
        Ok(out)
    }

    pub fn save(&self, path: &Path, settings: &[Setting]) -> CommandResult<()> {
        std::fs::write(path, self.to_yaml(settings)?)?;
        debug!(path = %path.display(), "saved config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Vec<Setting> {
        vec![
            Setting::new("vclamp", "surface contact point algorithm", "wtk", "wtk or fmms"),
            Setting::new("polymer_fit", "temperature", 301.0, "Temperature (K)"),
        ]
    }

    #[test]
    fn saved_config_reloads_with_comments() {
        let config = Config::from_settings(&settings());
        let text = config.to_yaml(&settings()).unwrap();
        assert!(text.contains("# vclamp\n#   surface contact point algorithm: wtk or fmms\n"));
        let back = Config::from_yaml(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn merge_overrides() {
        let mut config = Config::from_settings(&settings());
        let user = Config::from_yaml("polymer_fit:\n  temperature: 295\n").unwrap();
        config.merge(&user);
        assert_eq!(config.get("polymer_fit", "temperature"), Some(&Value::Int(295)));
        assert_eq!(
            config.get("vclamp", "surface contact point algorithm"),
            Some(&Value::from("wtk"))
        );
    }
}
