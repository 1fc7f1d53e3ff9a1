// Disease/symptom dataset loading for the retrieval index

use crate::types::{AppError, AppResult};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// One row of the disease/symptom/treatment table
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MedicalRecord {
    #[serde(rename = "Disease", default)]
    pub disease: String,
    #[serde(rename = "Symptoms", default)]
    pub symptoms: String,
    #[serde(rename = "Treatments", default)]
    pub treatments: String,
}

impl MedicalRecord {
    /// Text that gets embedded and returned by retrieval
    pub fn to_document(&self) -> String {
        format!(
            "Disease: {}\nSymptoms: {}\nTreatments: {}",
            self.disease.trim(),
            self.symptoms.trim(),
            self.treatments.trim()
        )
    }
}

pub struct DocumentProcessor;

impl DocumentProcessor {
    pub fn load_records(path: impl AsRef<Path>) -> AppResult<Vec<MedicalRecord>> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            AppError::Retrieval(format!("Cannot open dataset {}: {}", path.display(), e))
        })?;
        let records = Self::read_records(file)?;
        info!(path = %path.display(), count = records.len(), "Loaded dataset records");
        Ok(records)
    }

    /// Rows that fail to parse are skipped; rows without any content are dropped
    pub fn read_records<R: Read>(reader: R) -> AppResult<Vec<MedicalRecord>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        for (line, row) in csv_reader.deserialize::<MedicalRecord>().enumerate() {
            match row {
                Ok(record) => {
                    if record.disease.is_empty()
                        && record.symptoms.is_empty()
                        && record.treatments.is_empty()
                    {
                        continue;
                    }
                    records.push(record);
                }
                Err(e) => warn!(row = line + 1, error = %e, "Skipping malformed dataset row"),
            }
        }
        Ok(records)
    }

    pub fn documents(records: &[MedicalRecord]) -> Vec<String> {
        records.iter().map(MedicalRecord::to_document).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_format() {
        let record = MedicalRecord {
            disease: "Influenza".to_string(),
            symptoms: "fever, cough".to_string(),
            treatments: "rest, fluids".to_string(),
        };
        assert_eq!(
            record.to_document(),
            "Disease: Influenza\nSymptoms: fever, cough\nTreatments: rest, fluids"
        );
    }

    #[test]
    fn test_read_records_with_missing_columns() {
        let csv = "Disease,Symptoms\nAsthma,wheezing\n,\nMigraine,\"throbbing headache, nausea\"\n";
        let records = DocumentProcessor::read_records(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].treatments, "");
        assert_eq!(records[1].symptoms, "throbbing headache, nausea");

        let docs = DocumentProcessor::documents(&records);
        assert!(docs[0].ends_with("Treatments: "));
    }

    #[test]
    fn test_load_missing_file() {
        let err = DocumentProcessor::load_records("/nonexistent/dataset.csv").unwrap_err();
        assert!(matches!(err, AppError::Retrieval(_)));
    }
}
