//! Persisted model artifact
//!
//! The artifact records the ordered feature names the model was fitted on so
//! that any consumer can check a feature row against the contract before
//! predicting. Retraining replaces the whole file.

use crate::error::{ForecastError, Result};
use crate::models::{MeanRegressor, RandomForest, Regressor};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// Artifact layout version; bump when the JSON shape changes
pub const FORMAT_VERSION: u32 = 1;

/// A fitted model of any supported kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum TrainedModel {
    RandomForest(RandomForest),
    Mean(MeanRegressor),
}

impl TrainedModel {
    fn inner(&self) -> &dyn Regressor {
        match self {
            TrainedModel::RandomForest(model) => model,
            TrainedModel::Mean(model) => model,
        }
    }

    /// Check the fitted parameters of a deserialised model
    pub fn validate(&self) -> Result<()> {
        match self {
            TrainedModel::RandomForest(forest) => forest.validate(),
            TrainedModel::Mean(_) => Ok(()),
        }
    }
}

impl From<RandomForest> for TrainedModel {
    fn from(model: RandomForest) -> Self {
        TrainedModel::RandomForest(model)
    }
}

impl From<MeanRegressor> for TrainedModel {
    fn from(model: MeanRegressor) -> Self {
        TrainedModel::Mean(model)
    }
}

impl Regressor for TrainedModel {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        self.inner().predict(features)
    }

    fn n_features(&self) -> usize {
        self.inner().n_features()
    }

    fn name(&self) -> &str {
        self.inner().name()
    }
}

/// A fitted model together with its input contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    format_version: u32,
    target: String,
    feature_names: Vec<String>,
    model: TrainedModel,
}

impl ModelArtifact {
    /// Wrap a fitted model; the feature names must match its width
    pub fn new(
        target: String,
        feature_names: Vec<String>,
        model: impl Into<TrainedModel>,
    ) -> Result<Self> {
        let model = model.into();
        if feature_names.len() != model.n_features() {
            return Err(ForecastError::TrainingError(format!(
                "Model expects {} features but {} names were given",
                model.n_features(),
                feature_names.len()
            )));
        }

        Ok(Self {
            format_version: FORMAT_VERSION,
            target,
            feature_names,
            model,
        })
    }

    /// Write the artifact as JSON, replacing any existing file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer(writer, self)?;
        info!(
            path = %path.as_ref().display(),
            model = self.model.name(),
            features = self.feature_names.len(),
            "saved model artifact"
        );
        Ok(())
    }

    /// Read an artifact, rejecting unknown format versions
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let artifact: Self = serde_json::from_reader(reader)?;

        if artifact.format_version != FORMAT_VERSION {
            return Err(ForecastError::DataError(format!(
                "Unsupported model artifact version {} (expected {})",
                artifact.format_version, FORMAT_VERSION
            )));
        }
        if artifact.feature_names.len() != artifact.model.n_features() {
            return Err(ForecastError::DataError(
                "Model artifact feature names do not match the model".to_string(),
            ));
        }
        artifact.model.validate()?;

        info!(path = %path.as_ref().display(), model = artifact.model.name(), "loaded model artifact");
        Ok(artifact)
    }

    /// Fail unless `feature_names` and `target` match the contract exactly
    pub fn check_schema(&self, target: &str, feature_names: &[String]) -> Result<()> {
        if target != self.target {
            return Err(ForecastError::InferenceError(format!(
                "Model predicts '{}' but the table targets '{}'",
                self.target, target
            )));
        }
        if feature_names != self.feature_names.as_slice() {
            return Err(ForecastError::InferenceError(format!(
                "Feature columns {:?} do not match the model's {:?}",
                feature_names, self.feature_names
            )));
        }
        Ok(())
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    /// Importances paired with feature names, highest first; `None` for models without them
    pub fn feature_importances(&self) -> Option<Vec<(String, f64)>> {
        match &self.model {
            TrainedModel::RandomForest(forest) => {
                let mut pairs: Vec<(String, f64)> = self
                    .feature_names
                    .iter()
                    .cloned()
                    .zip(forest.feature_importances().iter().copied())
                    .collect();
                pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
                Some(pairs)
            }
            TrainedModel::Mean(_) => None,
        }
    }
}

impl Regressor for ModelArtifact {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        self.model.predict(features)
    }

    fn n_features(&self) -> usize {
        self.model.n_features()
    }

    fn name(&self) -> &str {
        self.model.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MeanModel, RegressionModel};
    use tempfile::tempdir;

    fn artifact() -> ModelArtifact {
        let model = MeanModel
            .fit(&[vec![1.0, 2.0], vec![3.0, 4.0]], &[10.0, 20.0])
            .unwrap();
        ModelArtifact::new(
            "Gasoline_Demand".to_string(),
            vec!["a".to_string(), "b".to_string()],
            model,
        )
        .unwrap()
    }

    #[test]
    fn save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");

        let original = artifact();
        original.save(&path).unwrap();
        let loaded = ModelArtifact::load(&path).unwrap();

        assert_eq!(loaded, original);
        assert_eq!(loaded.predict(&[0.0, 0.0]).unwrap(), 15.0);
    }

    #[test]
    fn rejects_future_versions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");

        let mut value = serde_json::to_value(artifact()).unwrap();
        value["format_version"] = serde_json::json!(FORMAT_VERSION + 1);
        std::fs::write(&path, value.to_string()).unwrap();

        assert!(matches!(
            ModelArtifact::load(&path),
            Err(ForecastError::DataError(_))
        ));
    }

    #[test]
    fn schema_mismatch_is_an_inference_error() {
        let artifact = artifact();
        let names = vec!["a".to_string(), "c".to_string()];
        assert!(matches!(
            artifact.check_schema("Gasoline_Demand", &names),
            Err(ForecastError::InferenceError(_))
        ));
        assert!(artifact
            .check_schema("Diesel_Demand", artifact.feature_names())
            .is_err());
    }

    #[test]
    fn width_must_match_names() {
        let model = MeanModel.fit(&[vec![1.0]], &[1.0]).unwrap();
        assert!(ModelArtifact::new("t".to_string(), vec![], model).is_err());
    }

    fn forest_json(trees: &str) -> String {
        format!(
            r#"{{"format_version":1,"target":"Gasoline_Demand","feature_names":["x"],
            "model":{{"kind":"random_forest","params":{{"trees":{},"n_features":1,
            "feature_importances":[1.0]}}}}}}"#,
            trees
        )
    }

    fn load_json(json: &str) -> Result<ModelArtifact> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, json).unwrap();
        ModelArtifact::load(&path)
    }

    #[test]
    fn well_formed_forest_loads() {
        let artifact = load_json(&forest_json(
            r#"[{"nodes":[
                {"kind":"split","feature":0,"threshold":0.5,"left":1,"right":2},
                {"kind":"leaf","value":1.0},
                {"kind":"leaf","value":3.0}],"n_features":1}]"#,
        ))
        .unwrap();
        assert_eq!(artifact.predict(&[0.0]).unwrap(), 1.0);
        assert_eq!(artifact.predict(&[1.0]).unwrap(), 3.0);
    }

    #[test]
    fn malformed_trees_are_rejected_on_load() {
        let cases = [
            // No trees at all
            r#"[]"#,
            // Empty arena
            r#"[{"nodes":[],"n_features":1}]"#,
            // Split feature outside the model's width
            r#"[{"nodes":[
                {"kind":"split","feature":5,"threshold":0.5,"left":1,"right":2},
                {"kind":"leaf","value":1.0},
                {"kind":"leaf","value":3.0}],"n_features":1}]"#,
            // Child outside the arena
            r#"[{"nodes":[
                {"kind":"split","feature":0,"threshold":0.5,"left":1,"right":9},
                {"kind":"leaf","value":1.0}],"n_features":1}]"#,
            // Child pointing back at its parent
            r#"[{"nodes":[
                {"kind":"split","feature":0,"threshold":0.5,"left":0,"right":1},
                {"kind":"leaf","value":1.0}],"n_features":1}]"#,
            // Tree width disagrees with the forest
            r#"[{"nodes":[{"kind":"leaf","value":1.0}],"n_features":2}]"#,
        ];

        for trees in cases {
            assert!(
                matches!(load_json(&forest_json(trees)), Err(ForecastError::DataError(_))),
                "accepted {}",
                trees
            );
        }
    }
}
