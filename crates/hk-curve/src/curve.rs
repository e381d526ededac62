use std::path::PathBuf;

use hk_core::{Info, Value};
use tracing::debug;

use crate::command_stack::CommandStack;
use crate::data::Data;
use crate::driver::DriverRegistry;
use crate::error::{CurveError, CurveResult};

/// A force curve: a file on disk, metadata, and a command stack that
/// rebuilds derived columns after loading.
#[derive(Clone, Debug)]
pub struct Curve {
    pub name: String,
    pub path: PathBuf,
    pub driver: Option<String>,
    pub info: Info,
    pub command_stack: CommandStack,
    data: Option<Vec<Data>>,
    /// Built in memory; there is no file to reload it from.
    in_memory: bool,
}

impl Curve {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            path,
            driver: None,
            info: Info::new(),
            command_stack: CommandStack::new(),
            data: None,
            in_memory: false,
        }
    }

    /// In-memory curve, as built by tests and synthetic sources.
    pub fn with_data(name: impl Into<String>, data: Vec<Data>) -> Self {
        let name = name.into();
        let mut curve = Self::new(PathBuf::from(&name));
        curve.name = name;
        curve.data = Some(data);
        curve.in_memory = true;
        curve
    }

    pub fn note(&self) -> &str {
        self.info.get("note").and_then(Value::as_str).unwrap_or("")
    }

    pub fn set_note(&mut self, note: impl Into<String>) {
        self.info.insert("note".into(), Value::String(note.into()));
    }

    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    /// Read raw data through the first driver claiming the path.
    pub fn load(&mut self, drivers: &DriverRegistry) -> CurveResult<()> {
        let driver = drivers.find(&self.path)?;
        let (data, info) = driver.read(&self.path, &self.info)?;
        debug!(curve = %self.name, driver = driver.name(), blocks = data.len(), "curve loaded");
        self.driver = Some(driver.name().to_string());
        self.info = info;
        self.data = Some(data);
        Ok(())
    }

    /// Drop raw data. In-memory curves keep theirs.
    pub fn unload(&mut self) {
        if self.in_memory {
            return;
        }
        if self.data.take().is_some() {
            debug!(curve = %self.name, "curve unloaded");
        }
    }

    pub fn data(&self) -> CurveResult<&[Data]> {
        self.data.as_deref().ok_or_else(|| self.not_loaded())
    }

    pub fn data_mut(&mut self) -> CurveResult<&mut Vec<Data>> {
        let name = self.name.clone();
        self.data
            .as_mut()
            .ok_or(CurveError::NotLoaded { curve: name })
    }

    /// Block by name, or the first block for `None`.
    pub fn block(&self, name: Option<&str>) -> CurveResult<&Data> {
        let index = self.block_index(name)?;
        Ok(&self.data()?[index])
    }

    pub fn block_mut(&mut self, name: Option<&str>) -> CurveResult<&mut Data> {
        let index = self.block_index(name)?;
        Ok(&mut self.data_mut()?[index])
    }

    pub fn block_index(&self, name: Option<&str>) -> CurveResult<usize> {
        let data = self.data()?;
        match name {
            None if data.is_empty() => Err(CurveError::UnknownBlock {
                curve: self.name.clone(),
                name: "<first>".to_string(),
            }),
            None => Ok(0),
            Some(name) => data
                .iter()
                .position(|d| d.name == name)
                .ok_or_else(|| CurveError::UnknownBlock {
                    curve: self.name.clone(),
                    name: name.to_string(),
                }),
        }
    }

    fn not_loaded(&self) -> CurveError {
        CurveError::NotLoaded {
            curve: self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve() -> Curve {
        let a = Data::from_columns("approach", vec![("x (m)".into(), vec![1.0])]).unwrap();
        let r = Data::from_columns("retract", vec![("x (m)".into(), vec![2.0])]).unwrap();
        Curve::with_data("synthetic", vec![a, r])
    }

    #[test]
    fn blocks_default_to_first() {
        let c = curve();
        assert_eq!(c.block(None).unwrap().name, "approach");
        assert_eq!(c.block(Some("retract")).unwrap().name, "retract");
        assert!(c.block(Some("pause")).is_err());
    }

    #[test]
    fn file_curves_start_unloaded() {
        let mut c = Curve::new("/data/curve/one");
        assert_eq!(c.name, "one");
        c.set_note("good");
        assert!(!c.is_loaded());
        assert!(matches!(c.block(None), Err(CurveError::NotLoaded { .. })));
        assert_eq!(c.note(), "good");
    }

    #[test]
    fn in_memory_curves_survive_unload() {
        let mut c = curve();
        c.unload();
        assert!(c.is_loaded());
    }
}
