//! File-format drivers.
//!
//! A driver claims files with `is_me` and turns them into data blocks plus
//! curve-level info. `DriverRegistry` asks each driver in turn.

use std::fmt::Write as _;
use std::path::Path;

use hk_core::{Info, Real, Value};
use nalgebra::DMatrix;
use tracing::debug;

use crate::data::Data;
use crate::error::{CurveError, CurveResult};

pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    fn is_me(&self, path: &Path) -> bool;

    /// Read every block in `path`. `info` is the curve's existing info, which
    /// the driver may extend.
    fn read(&self, path: &Path, info: &Info) -> CurveResult<(Vec<Data>, Info)>;
}

pub struct DriverRegistry {
    drivers: Vec<Box<dyn Driver>>,
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self {
            drivers: vec![Box::new(TextDriver)],
        }
    }
}

impl DriverRegistry {
    pub fn empty() -> Self {
        Self {
            drivers: Vec::new(),
        }
    }

    pub fn register(&mut self, driver: Box<dyn Driver>) {
        self.drivers.push(driver);
    }

    pub fn names(&self) -> Vec<&str> {
        self.drivers.iter().map(|d| d.name()).collect()
    }

    pub fn find(&self, path: &Path) -> CurveResult<&dyn Driver> {
        self.drivers
            .iter()
            .find(|d| d.is_me(path))
            .map(|d| d.as_ref())
            .ok_or_else(|| CurveError::NoDriver {
                path: path.to_path_buf(),
            })
    }
}

pub const TEXT_MAGIC: &str = "# Hooke text curve";

/// Tab-delimited text. Layout:
///
/// ```text
/// # Hooke text curve
/// #@ spring constant (N/m)	0.05
/// ## approach
/// # z piezo (m)	deflection (m)
/// 0.0	1e-9
/// ```
///
/// The magic line and `## block` lines are optional, so a single block
/// written by `write_block` with a header reads back too.
pub struct TextDriver;

impl TextDriver {
    fn looks_like_text(path: &Path) -> bool {
        let Ok(text) = std::fs::read_to_string(path) else {
            return false;
        };
        let Some(first) = text.lines().find(|l| !l.trim().is_empty()) else {
            return false;
        };
        if first.starts_with(TEXT_MAGIC) {
            return true;
        }
        // a bare header line followed by numeric rows
        first.starts_with("# ")
            && text
                .lines()
                .skip(1)
                .find(|l| !l.trim().is_empty() && !l.starts_with('#'))
                .is_some_and(|row| row.split('\t').all(|c| c.trim().parse::<Real>().is_ok()))
    }
}

impl Driver for TextDriver {
    fn name(&self) -> &str {
        "text"
    }

    fn is_me(&self, path: &Path) -> bool {
        path.is_file() && Self::looks_like_text(path)
    }

    fn read(&self, path: &Path, info: &Info) -> CurveResult<(Vec<Data>, Info)> {
        let text = std::fs::read_to_string(path)?;
        let mut info = info.clone();
        let bad = |line: usize, what: String| CurveError::Format {
            path: path.to_path_buf(),
            what: format!("line {}: {what}", line + 1),
        };

        struct Pending {
            name: String,
            columns: Vec<String>,
            rows: Vec<Vec<Real>>,
        }
        let mut blocks: Vec<Pending> = Vec::new();
        for (n, line) in text.lines().enumerate() {
            if line.trim().is_empty() || line.starts_with(TEXT_MAGIC) {
                continue;
            }
            if let Some(entry) = line.strip_prefix("#@ ") {
                let (key, value) = entry
                    .split_once('\t')
                    .ok_or_else(|| bad(n, "info line needs a tab".to_string()))?;
                let value = value.trim();
                let value = serde_json::from_str::<Value>(value).unwrap_or_else(|_| Value::from(value));
                info.insert(key.to_string(), value);
            } else if let Some(name) = line.strip_prefix("## ") {
                blocks.push(Pending {
                    name: name.trim().to_string(),
                    columns: Vec::new(),
                    rows: Vec::new(),
                });
            } else if let Some(header) = line.strip_prefix("# ") {
                if blocks.last().is_none_or(|b| !b.columns.is_empty()) {
                    blocks.push(Pending {
                        name: format!("block {}", blocks.len()),
                        columns: Vec::new(),
                        rows: Vec::new(),
                    });
                }
                if let Some(block) = blocks.last_mut() {
                    block.columns = header.split('\t').map(|c| c.trim().to_string()).collect();
                }
            } else {
                let block = blocks
                    .last_mut()
                    .filter(|b| !b.columns.is_empty())
                    .ok_or_else(|| bad(n, "data row before a column header".to_string()))?;
                let row = line
                    .split('\t')
                    .map(|c| {
                        c.trim()
                            .parse::<Real>()
                            .map_err(|_| bad(n, format!("'{c}' is not a number")))
                    })
                    .collect::<CurveResult<Vec<_>>>()?;
                if row.len() != block.columns.len() {
                    return Err(bad(
                        n,
                        format!("{} fields for {} columns", row.len(), block.columns.len()),
                    ));
                }
                block.rows.push(row);
            }
        }

        let data = blocks
            .into_iter()
            .map(|b| {
                let values = DMatrix::from_fn(b.rows.len(), b.columns.len(), |i, j| b.rows[i][j]);
                Data::new(b.name, b.columns, values)
            })
            .collect::<CurveResult<Vec<_>>>()?;
        debug!(path = %path.display(), blocks = data.len(), "text curve read");
        Ok((data, info))
    }
}

fn push_rows(out: &mut String, block: &Data) {
    for i in 0..block.nrows() {
        let row: Vec<String> = block
            .values()
            .row(i)
            .iter()
            .map(|v| format!("{v:e}"))
            .collect();
        out.push_str(&row.join("\t"));
        out.push('\n');
    }
}

/// Tab-delimited dump of one block, optionally headed by `# col\tcol`.
pub fn write_block(path: &Path, block: &Data, header: bool) -> CurveResult<()> {
    let mut out = String::new();
    if header {
        let _ = writeln!(out, "# {}", block.columns().join("\t"));
    }
    push_rows(&mut out, block);
    std::fs::write(path, out)?;
    Ok(())
}

/// Full curve in the layout `TextDriver` reads.
pub fn write_curve(path: &Path, blocks: &[Data], info: &Info) -> CurveResult<()> {
    let mut out = format!("{TEXT_MAGIC}\n");
    for (key, value) in info {
        let value = serde_json::to_string(value).map_err(|e| CurveError::Format {
            path: path.to_path_buf(),
            what: format!("info '{key}': {e}"),
        })?;
        let _ = writeln!(out, "#@ {key}\t{value}");
    }
    for block in blocks {
        let _ = writeln!(out, "## {}", block.name);
        let _ = writeln!(out, "# {}", block.columns().join("\t"));
        push_rows(&mut out, block);
    }
    std::fs::write(path, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(name: &str) -> Data {
        Data::from_columns(
            name,
            vec![
                ("z piezo (m)".to_string(), vec![0.0, 1e-9, 2e-9]),
                ("deflection (m)".to_string(), vec![0.5e-9, 0.25e-9, -1.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn curve_round_trips_through_text_driver() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curve.txt");
        let mut info = Info::new();
        info.insert("spring constant (N/m)".into(), Value::Float(0.05));
        write_curve(&path, &[block("approach"), block("retract")], &info).unwrap();

        let registry = DriverRegistry::default();
        let driver = registry.find(&path).unwrap();
        assert_eq!(driver.name(), "text");
        let (data, read_info) = driver.read(&path, &Info::new()).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[1].name, "retract");
        assert_eq!(data[0], block("approach"));
        assert_eq!(read_info["spring constant (N/m)"].as_f64(), Some(0.05));
    }

    #[test]
    fn info_values_keep_their_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curve.txt");
        let mut info = Info::new();
        info.insert("peaks".into(), vec![3_i64, 9, 27].into());
        info.insert("serial".into(), Value::from("0042"));
        info.insert("note".into(), Value::from("tip\tchanged"));
        info.insert("filtered".into(), Value::Bool(true));
        info.insert("velocity (m/s)".into(), Value::Float(1.0));
        info.insert("cycles".into(), Value::Int(4));
        write_curve(&path, &[block("retract")], &info).unwrap();

        let (_, read_info) = TextDriver.read(&path, &Info::new()).unwrap();
        assert_eq!(read_info, info);
    }

    #[test]
    fn bare_info_text_reads_as_a_string() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curve.txt");
        std::fs::write(&path, format!("{TEXT_MAGIC}\n#@ operator\tsomebody\n# x (m)\n1e-9\n")).unwrap();
        let (_, info) = TextDriver.read(&path, &Info::new()).unwrap();
        assert_eq!(info["operator"], Value::from("somebody"));
    }

    #[test]
    fn exported_block_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curve.dat");
        write_block(&path, &block("approach"), true).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# z piezo (m)\tdeflection (m)\n"));

        let driver = TextDriver;
        assert!(driver.is_me(&path));
        let (data, _) = driver.read(&path, &Info::new()).unwrap();
        assert_eq!(data[0].column("deflection (m)").unwrap(), vec![0.5e-9, 0.25e-9, -1.0]);
    }

    #[test]
    fn unknown_files_have_no_driver() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "just some words\n").unwrap();
        assert!(matches!(
            DriverRegistry::default().find(&path),
            Err(CurveError::NoDriver { .. })
        ));
    }
}
