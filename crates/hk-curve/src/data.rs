//! Column-labelled float blocks.

use hk_core::{Info, Real};
use nalgebra::{DMatrix, DVector};

use crate::error::{CurveError, CurveResult};

/// One block of curve data: rows are samples, columns are labelled
/// `name (unit)` channels.
#[derive(Clone, Debug, PartialEq)]
pub struct Data {
    pub name: String,
    columns: Vec<String>,
    values: DMatrix<Real>,
    pub info: Info,
}

impl Data {
    pub fn new(
        name: impl Into<String>,
        columns: Vec<String>,
        values: DMatrix<Real>,
    ) -> CurveResult<Self> {
        let name = name.into();
        if values.ncols() != columns.len() {
            return Err(CurveError::ShapeMismatch {
                block: name,
                name: "<header>".to_string(),
                got: columns.len(),
                expected: values.ncols(),
            });
        }
        Ok(Self {
            name,
            columns,
            values,
            info: Info::new(),
        })
    }

    /// Build a block column by column.
    pub fn from_columns(
        name: impl Into<String>,
        columns: Vec<(String, Vec<Real>)>,
    ) -> CurveResult<Self> {
        let mut data = Self::new(name, Vec::new(), DMatrix::zeros(0, 0))?;
        for (label, values) in columns {
            data.set_column(&label, values)?;
        }
        Ok(data)
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &DMatrix<Real> {
        &self.values
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn column_index(&self, name: &str) -> CurveResult<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| CurveError::UnknownColumn {
                block: self.name.clone(),
                name: name.to_string(),
            })
    }

    pub fn column(&self, name: &str) -> CurveResult<Vec<Real>> {
        let j = self.column_index(name)?;
        Ok(self.values.column(j).iter().copied().collect())
    }

    pub fn row(&self, index: usize) -> CurveResult<Vec<Real>> {
        if index >= self.nrows() {
            return Err(CurveError::IndexOob {
                what: "block rows",
                index,
                len: self.nrows(),
            });
        }
        Ok(self.values.row(index).iter().copied().collect())
    }

    /// Overwrite the named column, appending it if missing.
    pub fn set_column(&mut self, name: &str, values: Vec<Real>) -> CurveResult<()> {
        if self.ncols() == 0 {
            self.values = DMatrix::zeros(values.len(), 0);
        }
        if values.len() != self.nrows() {
            return Err(CurveError::ShapeMismatch {
                block: self.name.clone(),
                name: name.to_string(),
                got: values.len(),
                expected: self.nrows(),
            });
        }
        let j = match self.columns.iter().position(|c| c == name) {
            Some(j) => j,
            None => {
                let j = self.ncols();
                let values = std::mem::replace(&mut self.values, DMatrix::zeros(0, 0));
                self.values = values.insert_column(j, 0.0);
                self.columns.push(name.to_string());
                j
            }
        };
        self.values
            .set_column(j, &DVector::from_column_slice(&values));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> Data {
        Data::from_columns(
            "approach",
            vec![
                ("z piezo (m)".to_string(), vec![0.0, 1.0, 2.0]),
                ("deflection (m)".to_string(), vec![5.0, 6.0, 7.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn columns_append_then_overwrite() {
        let mut d = block();
        assert_eq!(d.ncols(), 2);
        d.set_column("force (N)", vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(d.ncols(), 3);
        d.set_column("force (N)", vec![4.0, 5.0, 6.0]).unwrap();
        assert_eq!(d.ncols(), 3);
        assert_eq!(d.column("force (N)").unwrap(), vec![4.0, 5.0, 6.0]);
        assert_eq!(d.column("z piezo (m)").unwrap(), vec![0.0, 1.0, 2.0]);
        assert_eq!(d.row(1).unwrap(), vec![1.0, 6.0, 5.0]);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let mut d = block();
        let err = d.set_column("x (m)", vec![1.0]).unwrap_err();
        assert!(matches!(err, CurveError::ShapeMismatch { .. }));
    }

    #[test]
    fn unknown_column() {
        assert!(matches!(
            block().column("nope").unwrap_err(),
            CurveError::UnknownColumn { .. }
        ));
    }
}
