use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpeechError};
use crate::schema::Feature;

/// Column statistics frozen at training time: imputation medians plus
/// standardization mean and scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    pub feature_names: Vec<String>,
    pub medians: Vec<Option<f64>>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl Default for FeatureScaler {
    fn default() -> Self {
        Self {
            feature_names: Feature::ALL.iter().map(|f| f.name().to_string()).collect(),
            medians: vec![None; Feature::COUNT],
            mean: Vec::new(),
            scale: Vec::new(),
        }
    }
}

impl FeatureScaler {
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_fitted(&self) -> bool {
        self.mean.len() == self.n_features() && self.scale.len() == self.n_features()
    }

    /// Record the median of each column over the rows where it was observed.
    pub fn fit_medians(&mut self, rows: &[[Option<f64>; Feature::COUNT]]) {
        self.medians = (0..Feature::COUNT)
            .map(|col| median(rows.iter().filter_map(|row| row[col]).collect()))
            .collect();
    }

    pub fn median(&self, feature: Feature) -> Option<f64> {
        self.medians.get(feature.index()).copied().flatten()
    }

    /// Fit mean and population standard deviation per column; constant columns get scale 1.
    pub fn fit(&mut self, matrix: &Array2<f64>) -> Result<()> {
        self.check_columns(matrix.ncols())?;
        if matrix.nrows() == 0 {
            return Err(SpeechError::invalid_dataset(
                "cannot fit feature scaler on zero rows",
            ));
        }
        let mean = matrix
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(matrix.ncols()));
        let std = matrix.std_axis(Axis(0), 0.0);
        self.mean = mean.to_vec();
        self.scale = std
            .iter()
            .map(|s| if *s > f64::EPSILON { *s } else { 1.0 })
            .collect();
        Ok(())
    }

    pub fn transform(&self, matrix: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_columns(matrix.ncols())?;
        let mean = ArrayView1::from(&self.mean[..]);
        let scale = ArrayView1::from(&self.scale[..]);
        Ok((matrix - &mean) / &scale)
    }

    pub fn transform_row(&self, row: ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check_columns(row.len())?;
        let mean = ArrayView1::from(&self.mean[..]);
        let scale = ArrayView1::from(&self.scale[..]);
        Ok((&row - &mean) / &scale)
    }

    fn check_columns(&self, actual: usize) -> Result<()> {
        let expected = self.n_features();
        if actual != expected {
            return Err(SpeechError::DimensionMismatch { expected, actual });
        }
        Ok(())
    }
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}
