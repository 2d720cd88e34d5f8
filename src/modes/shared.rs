use anyhow::Result;
use tracing::info;

use crate::classify::Classifier;
use crate::extract::Cascade;

/// Classifier for this run, with the active tables and cascade logged.
pub(super) fn load_classifier(tables_path: Option<&str>) -> Result<Classifier> {
    let classifier = Classifier::load(tables_path)?;
    info!("Classifier: {classifier}");
    info!("Extraction: {}", Cascade::standard());
    Ok(classifier)
}
