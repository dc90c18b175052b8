use std::collections::HashMap;

/// Family a type key falls back to when it matches no configured family.
pub const FALLBACK_FAMILY: &str = "job";

const FAMILIES: &[(&str, &[&str])] = &[
    (
        "job",
        &[
            "job_full_time",
            "job_part_time",
            "job_hourly_contract",
            "job_fixed_price",
        ],
    ),
    (
        "scholarship",
        &["scholarship_full", "scholarship_partial", "scholarship_merit"],
    ),
    ("grant", &["grant_research", "grant_project", "grant_business"]),
    (
        "training",
        &["training_course", "training_workshop", "training_certification"],
    ),
    (
        "internship",
        &["internship_paid", "internship_unpaid", "internship_academic"],
    ),
];

const LABELS: &[(&str, &str)] = &[
    ("job_full_time", "Full Time Job"),
    ("job_part_time", "Part Time Job"),
    ("job_hourly_contract", "Hourly Contract Job"),
    ("job_fixed_price", "Fixed Price Job"),
    ("scholarship_full", "Full Scholarship"),
    ("scholarship_partial", "Partial Scholarship"),
    ("scholarship_merit", "Merit Scholarship"),
    ("grant_research", "Research Grant"),
    ("grant_project", "Project Grant"),
    ("grant_business", "Business Grant"),
    ("training_course", "Training Course"),
    ("training_workshop", "Workshop"),
    ("training_certification", "Certification Program"),
    ("internship_paid", "Paid Internship"),
    ("internship_unpaid", "Unpaid Internship"),
    ("internship_academic", "Academic Internship"),
];

#[derive(Debug, Clone, Copy)]
pub struct Family {
    pub name: &'static str,
    pub types: &'static [&'static str],
}

/// The fixed opportunity taxonomy: five families, each owning a closed set of
/// type keys, plus a display label per key. Built once at startup and shared
/// through application state.
#[derive(Debug)]
pub struct FamilyTable {
    families: Vec<Family>,
    labels: HashMap<&'static str, &'static str>,
    family_by_type: HashMap<&'static str, &'static str>,
}

impl FamilyTable {
    pub fn standard() -> Self {
        let families: Vec<Family> = FAMILIES
            .iter()
            .map(|(name, types)| Family { name, types })
            .collect();

        let mut family_by_type = HashMap::new();
        for family in &families {
            for type_key in family.types {
                family_by_type.insert(*type_key, family.name);
            }
        }

        Self {
            families,
            labels: LABELS.iter().copied().collect(),
            family_by_type,
        }
    }

    pub fn families(&self) -> &[Family] {
        &self.families
    }

    /// Resolves a type key to its family. Unknown keys resolve to the job
    /// family; a warning is emitted so misconfigured rows surface in logs
    /// instead of vanishing from family-scoped listings.
    pub fn family_of(&self, type_key: &str) -> &'static str {
        match self.family_by_type.get(type_key) {
            Some(family) => family,
            None => {
                tracing::warn!(
                    type_key,
                    "unknown opportunity type, falling back to the job family"
                );
                FALLBACK_FAMILY
            }
        }
    }

    pub fn types_of(&self, family: &str) -> Option<&'static [&'static str]> {
        self.families
            .iter()
            .find(|f| f.name == family)
            .map(|f| f.types)
    }

    pub fn is_known_family(&self, family: &str) -> bool {
        self.families.iter().any(|f| f.name == family)
    }

    pub fn is_known_type(&self, type_key: &str) -> bool {
        self.family_by_type.contains_key(type_key)
    }

    /// Display label for a type key. Unlabelled keys render as themselves.
    pub fn label_of<'a>(&self, type_key: &'a str) -> &'a str {
        self.labels.get(type_key).copied().unwrap_or(type_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_belongs_to_exactly_one_family() {
        let table = FamilyTable::standard();
        for family in table.families() {
            for type_key in family.types {
                assert_eq!(table.family_of(type_key), family.name);
            }
        }
        let total: usize = table.families().iter().map(|f| f.types.len()).sum();
        assert_eq!(total, 16);
    }

    #[test]
    fn unknown_type_falls_back_to_job() {
        let table = FamilyTable::standard();
        assert_eq!(table.family_of("volunteer_remote"), "job");
        assert_eq!(table.family_of(""), "job");
    }

    #[test]
    fn labels_cover_every_type() {
        let table = FamilyTable::standard();
        for family in table.families() {
            for type_key in family.types {
                assert_ne!(table.label_of(type_key), *type_key);
            }
        }
        assert_eq!(table.label_of("job_full_time"), "Full Time Job");
        assert_eq!(table.label_of("made_up_key"), "made_up_key");
    }
}
