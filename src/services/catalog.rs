use crate::core::types::DiseaseRecord;

/// Catalog id of the "Healthy Plant" entry, also used as the fallback record
pub const HEALTHY_PLANT_ID: u32 = 6;

/// Fixed reference list of known diseases, in display order.
///
/// Built once at startup and shared read-only between handlers.
#[derive(Debug, Clone)]
pub struct DiseaseCatalog {
    records: Vec<DiseaseRecord>,
    fallback: DiseaseRecord,
}

impl DiseaseCatalog {
    /// The catalog shipped with the service
    pub fn builtin() -> Self {
        let records = vec![
            record(
                1,
                "Late Blight",
                &["Potato", "Tomato"],
                "Late blight is a plant disease caused by the oomycete Phytophthora infestans. Symptoms include dark lesions on leaves and stems that spread quickly in cool, wet conditions.",
                "Apply fungicides with active ingredients such as chlorothalonil, mancozeb, or copper-based compounds. Remove and destroy infected plant parts.",
                "Use resistant varieties, ensure proper spacing for air circulation, avoid overhead irrigation, and practice crop rotation.",
            ),
            record(
                2,
                "Powdery Mildew",
                &["Wheat", "Barley", "Grape", "Cucumber"],
                "Powdery mildew is a fungal disease that causes a white powdery substance on leaf surfaces, stems, and sometimes fruit. It can reduce photosynthesis and yield.",
                "Apply sulfur-based fungicides or neem oil. Prune affected parts and ensure good air circulation.",
                "Plant resistant varieties, avoid overcrowding, and reduce humidity around plants.",
            ),
            record(
                3,
                "Apple Scab",
                &["Apple"],
                "Apple scab is a fungal disease causing dark, scabby lesions on leaves and fruit. Severe infections can lead to defoliation and unmarketable fruit.",
                "Apply fungicides like captan or myclobutanil. Remove fallen leaves and infected fruit.",
                "Plant resistant varieties, practice good orchard sanitation, and ensure proper pruning for airflow.",
            ),
            record(
                4,
                "Citrus Greening",
                &["Orange", "Lemon", "Lime", "Grapefruit"],
                "Citrus greening (Huanglongbing) is a bacterial disease spread by psyllids. It causes mottled leaves, misshapen fruit, and eventually tree death.",
                "No cure available. Remove infected trees to prevent spread.",
                "Control psyllid populations, use disease-free planting material, and monitor trees regularly.",
            ),
            record(
                5,
                "Corn Gray Leaf Spot",
                &["Corn", "Maize"],
                "Gray leaf spot is a fungal disease causing rectangular, gray-brown lesions on corn leaves. Severe cases lead to significant yield loss.",
                "Apply fungicides containing strobilurins or triazoles.",
                "Plant resistant hybrids, rotate crops, and practice conservation tillage.",
            ),
            healthy_plant(),
        ];

        Self::new(records)
    }

    pub fn new(records: Vec<DiseaseRecord>) -> Self {
        Self {
            records,
            fallback: healthy_plant(),
        }
    }

    pub fn lookup(&self, id: u32) -> Option<&DiseaseRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Look up `id`, substituting the Healthy Plant record when it is unknown.
    pub fn resolve(&self, id: u32) -> &DiseaseRecord {
        self.lookup(id).unwrap_or(&self.fallback)
    }

    pub fn all(&self) -> &[DiseaseRecord] {
        &self.records
    }

    /// Ids of actual diseases (everything except the healthy entry)
    pub fn disease_ids(&self) -> Vec<u32> {
        self.records
            .iter()
            .map(|r| r.id)
            .filter(|id| *id != HEALTHY_PLANT_ID)
            .collect()
    }

    pub fn healthy_id(&self) -> u32 {
        HEALTHY_PLANT_ID
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn healthy_plant() -> DiseaseRecord {
    record(
        HEALTHY_PLANT_ID,
        "Healthy Plant",
        &["Various"],
        "This plant appears healthy with no visible signs of disease or pest damage.",
        "No treatment needed. Continue with regular care practices.",
        "Maintain good cultural practices including proper watering, fertilization, and pest monitoring.",
    )
}

fn record(
    id: u32,
    name: &str,
    crops: &[&str],
    description: &str,
    treatment: &str,
    prevention: &str,
) -> DiseaseRecord {
    DiseaseRecord {
        id,
        name: name.to_string(),
        crops: crops.iter().map(|c| c.to_string()).collect(),
        description: description.to_string(),
        treatment: treatment.to_string(),
        prevention: prevention.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ids_resolve() {
        let catalog = DiseaseCatalog::builtin();
        assert_eq!(catalog.len(), 6);
        for id in 1..=6 {
            assert!(catalog.lookup(id).is_some(), "missing id {id}");
        }
        assert_eq!(catalog.lookup(1).unwrap().name, "Late Blight");
    }

    #[test]
    fn test_unknown_id_falls_back_to_healthy() {
        let catalog = DiseaseCatalog::builtin();
        assert!(catalog.lookup(9999).is_none());
        let resolved = catalog.resolve(9999);
        assert_eq!(resolved.id, HEALTHY_PLANT_ID);
        assert_eq!(resolved.name, "Healthy Plant");
    }

    #[test]
    fn test_fallback_survives_catalog_without_healthy_entry() {
        let catalog = DiseaseCatalog::new(Vec::new());
        assert!(catalog.is_empty());
        assert_eq!(catalog.resolve(1).name, "Healthy Plant");
    }

    #[test]
    fn test_disease_ids_exclude_healthy() {
        let catalog = DiseaseCatalog::builtin();
        assert_eq!(catalog.disease_ids(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_record_serializes_all_fields() {
        let catalog = DiseaseCatalog::builtin();
        let json = serde_json::to_value(catalog.lookup(4).unwrap()).unwrap();
        assert_eq!(json["name"], "Citrus Greening");
        assert_eq!(json["crops"].as_array().unwrap().len(), 4);
        assert!(json["treatment"].is_string());
        assert!(json["prevention"].is_string());
    }
}
