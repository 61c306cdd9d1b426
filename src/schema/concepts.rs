//! Concept-field classification and the lookup tables rules consult.

/// Columns that must hold standard concepts.
pub const STANDARD_CONCEPT_FIELDS: &[(&str, &str)] = &[
    ("person", "gender_concept_id"),
    ("person", "race_concept_id"),
    ("person", "ethnicity_concept_id"),
    ("observation_period", "period_type_concept_id"),
    ("visit_occurrence", "visit_concept_id"),
    ("visit_occurrence", "visit_type_concept_id"),
    ("visit_occurrence", "admitted_from_concept_id"),
    ("visit_occurrence", "discharged_to_concept_id"),
    ("visit_detail", "visit_detail_concept_id"),
    ("visit_detail", "visit_detail_type_concept_id"),
    ("visit_detail", "admitted_from_concept_id"),
    ("visit_detail", "discharged_to_concept_id"),
    ("condition_occurrence", "condition_concept_id"),
    ("condition_occurrence", "condition_type_concept_id"),
    ("condition_occurrence", "condition_status_concept_id"),
    ("drug_exposure", "drug_concept_id"),
    ("drug_exposure", "drug_type_concept_id"),
    ("drug_exposure", "route_concept_id"),
    ("procedure_occurrence", "procedure_concept_id"),
    ("procedure_occurrence", "procedure_type_concept_id"),
    ("procedure_occurrence", "modifier_concept_id"),
    ("device_exposure", "device_concept_id"),
    ("device_exposure", "device_type_concept_id"),
    ("measurement", "measurement_concept_id"),
    ("measurement", "measurement_type_concept_id"),
    ("measurement", "operator_concept_id"),
    ("measurement", "value_as_concept_id"),
    ("measurement", "unit_concept_id"),
    ("observation", "observation_concept_id"),
    ("observation", "observation_type_concept_id"),
    ("observation", "value_as_concept_id"),
    ("observation", "qualifier_concept_id"),
    ("observation", "unit_concept_id"),
    ("death", "death_type_concept_id"),
    ("death", "cause_concept_id"),
    ("note", "note_type_concept_id"),
    ("note", "note_class_concept_id"),
    ("note", "encoding_concept_id"),
    ("note", "language_concept_id"),
    ("note_nlp", "section_concept_id"),
    ("note_nlp", "note_nlp_concept_id"),
    ("specimen", "specimen_concept_id"),
    ("specimen", "specimen_type_concept_id"),
    ("specimen", "unit_concept_id"),
    ("specimen", "anatomic_site_concept_id"),
    ("specimen", "disease_status_concept_id"),
    ("payer_plan_period", "payer_concept_id"),
    ("payer_plan_period", "plan_concept_id"),
    ("payer_plan_period", "sponsor_concept_id"),
    ("payer_plan_period", "stop_reason_concept_id"),
    ("cost", "cost_type_concept_id"),
    ("cost", "currency_concept_id"),
    ("cost", "revenue_code_concept_id"),
    ("cost", "drg_concept_id"),
    ("drug_era", "drug_concept_id"),
    ("dose_era", "drug_concept_id"),
    ("dose_era", "unit_concept_id"),
    ("condition_era", "condition_concept_id"),
    ("episode", "episode_concept_id"),
    ("episode", "episode_object_concept_id"),
    ("episode", "episode_type_concept_id"),
    ("episode_event", "episode_event_field_concept_id")
];

/// Columns that preserve the originating source concept.
pub const SOURCE_CONCEPT_FIELDS: &[(&str, &str)] = &[
    ("person", "gender_source_concept_id"),
    ("person", "race_source_concept_id"),
    ("person", "ethnicity_source_concept_id"),
    ("visit_occurrence", "visit_source_concept_id"),
    ("visit_detail", "visit_detail_source_concept_id"),
    ("condition_occurrence", "condition_source_concept_id"),
    ("drug_exposure", "drug_source_concept_id"),
    ("procedure_occurrence", "procedure_source_concept_id"),
    ("device_exposure", "device_source_concept_id"),
    ("device_exposure", "unit_source_concept_id"),
    ("measurement", "measurement_source_concept_id"),
    ("measurement", "unit_source_concept_id"),
    ("observation", "observation_source_concept_id"),
    ("death", "cause_source_concept_id"),
    ("note_nlp", "note_nlp_source_concept_id"),
    ("provider", "specialty_source_concept_id"),
    ("provider", "gender_source_concept_id"),
    ("payer_plan_period", "payer_source_concept_id"),
    ("payer_plan_period", "plan_source_concept_id"),
    ("payer_plan_period", "sponsor_source_concept_id"),
    ("payer_plan_period", "stop_reason_source_concept_id"),
    ("episode", "episode_source_concept_id")
];

/// Vocabularies whose concepts are source-only.
pub const SOURCE_VOCABULARIES: &[&str] = &[
    "ICD10CM", "ICD9CM", "ICD10PCS", "CPT4", "HCPCS", "NDC", "READ", "READCODE", "OPCS4"
];

/// Concept columns where `concept_id = 0` marks an unmapped record.
pub const UNMAPPED_SENSITIVE_COLUMNS: &[(&str, &str)] = &[
    ("condition_occurrence", "condition_concept_id"),
    ("condition_occurrence", "condition_source_concept_id"),
    ("drug_exposure", "drug_concept_id"),
    ("drug_exposure", "drug_source_concept_id"),
    ("procedure_occurrence", "procedure_concept_id"),
    ("procedure_occurrence", "procedure_source_concept_id"),
    ("measurement", "measurement_concept_id"),
    ("measurement", "measurement_source_concept_id"),
    ("observation", "observation_concept_id"),
    ("observation", "observation_source_concept_id"),
    ("device_exposure", "device_concept_id"),
    ("device_exposure", "device_source_concept_id"),
    ("visit_occurrence", "visit_concept_id"),
    ("visit_occurrence", "visit_source_concept_id"),
    ("visit_detail", "visit_detail_concept_id"),
    ("visit_detail", "visit_detail_source_concept_id"),
    ("death", "cause_concept_id"),
    ("death", "cause_source_concept_id"),
    ("specimen", "specimen_concept_id"),
    ("episode", "episode_concept_id"),
    ("episode", "episode_source_concept_id"),
    ("person", "gender_concept_id"),
    ("person", "race_concept_id"),
    ("person", "ethnicity_concept_id")
];

/// Standard concept columns whose filters need ancestor expansion.
pub const HIERARCHICAL_COLUMNS: &[(&str, &str)] = &[
    ("drug_exposure", "drug_concept_id"),
    ("condition_occurrence", "condition_concept_id")
];

/// Domain a clinical concept column is restricted to.
pub const EXPECTED_DOMAINS: &[(&str, &str, &str)] = &[
    ("condition_occurrence", "condition_concept_id", "Condition"),
    ("drug_exposure", "drug_concept_id", "Drug"),
    ("procedure_occurrence", "procedure_concept_id", "Procedure"),
    ("measurement", "measurement_concept_id", "Measurement"),
    ("observation", "observation_concept_id", "Observation"),
    ("device_exposure", "device_concept_id", "Device"),
    ("visit_occurrence", "visit_concept_id", "Visit"),
    ("specimen", "specimen_concept_id", "Specimen"),
    ("death", "cause_concept_id", "Condition")
];

/// Clinical tables whose date columns need observation-period anchoring.
pub const TEMPORAL_TABLES: &[&str] = &[
    "condition_occurrence",
    "drug_exposure",
    "procedure_occurrence",
    "measurement",
    "observation",
    "visit_occurrence",
    "visit_detail",
    "device_exposure",
    "death",
    "specimen",
    "note",
    "episode"
];

/// Functions that compute over dates.
pub const DATE_FUNCTIONS: &[&str] = &[
    "dateadd",
    "date_add",
    "datediff",
    "date_diff",
    "timestampdiff",
    "date_sub",
    "date_trunc",
    "extract",
    "age",
    "interval",
    "months_between",
    "days",
    "add_months",
    "add_days"
];

/// Free-text identifying columns of vocabulary tables.
pub const VOCABULARY_TEXT_COLUMNS: &[(&str, &str)] = &[
    ("concept", "concept_name"),
    ("concept", "concept_code"),
    ("concept_synonym", "concept_synonym_name"),
    ("vocabulary", "vocabulary_name"),
    ("vocabulary", "vocabulary_reference"),
    ("vocabulary", "vocabulary_version"),
    ("domain", "domain_name"),
    ("concept_class", "concept_class_name"),
    ("relationship", "relationship_name"),
    ("source_to_concept_map", "source_code"),
    ("source_to_concept_map", "source_code_description")
];

/// Vocabulary tables that carry an `invalid_reason` column.
pub const VALIDITY_TRACKED_TABLES: &[&str] = &["concept", "concept_relationship"];

/// Vocabulary tables that inherit validity from the concepts they reference.
pub const VALIDITY_DERIVED_TABLES: &[&str] =
    &["concept_ancestor", "concept_synonym", "drug_strength", "source_to_concept_map"];

/// Vocabulary columns that map one concept id onto another. A column
/// referencing `concept.concept_id` may only be equated with another such
/// column through one of these, or through `concept.concept_id` itself.
pub const CONCEPT_BRIDGE_COLUMNS: &[(&str, &str)] = &[
    ("concept_ancestor", "ancestor_concept_id"),
    ("concept_ancestor", "descendant_concept_id"),
    ("concept_relationship", "concept_id_1"),
    ("concept_relationship", "concept_id_2"),
    ("concept_synonym", "concept_id"),
    ("drug_strength", "drug_concept_id"),
    ("drug_strength", "ingredient_concept_id"),
    ("source_to_concept_map", "source_concept_id"),
    ("source_to_concept_map", "target_concept_id")
];

/// Tables that make up the vocabulary subsystem.
pub const VOCABULARY_TABLES: &[&str] = &[
    "concept",
    "vocabulary",
    "domain",
    "concept_class",
    "concept_relationship",
    "relationship",
    "concept_synonym",
    "concept_ancestor",
    "source_to_concept_map",
    "drug_strength"
];
