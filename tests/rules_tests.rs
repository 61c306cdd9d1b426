use omop_sql_validator::{
    query::SqlDialect,
    rules::{Severity, Violation},
    validator::validate
};

fn check(sql: &str, rule_id: &str) -> Vec<Violation> {
    validate(sql, SqlDialect::PostgreSQL, None, Some(&[rule_id]))
        .unwrap()
        .violations
}

fn severities(violations: &[Violation]) -> Vec<Severity> {
    violations.iter().map(Violation::severity).collect()
}

const JOIN_PATH: &str = "semantic.join_path_validation";
const DOMAIN: &str = "semantic.domain_segregation";
const FUTURE_LEAKAGE: &str = "semantic.future_information_leakage";
const HIERARCHY: &str = "semantic.hierarchy_expansion_required";
const INVALID_REASON: &str = "semantic.invalid_reason_enforcement";
const MAPS_TO: &str = "semantic.maps_to_direction";
const MEASUREMENT_UNIT: &str = "semantic.measurement_unit_validation";
const OBSERVATION_PERIOD: &str = "semantic.observation_period_anchoring";
const STANDARD_CONCEPT: &str = "semantic.standard_concept_enforcement";
const UNMAPPED: &str = "semantic.unmapped_concept_handling";
const CONCEPT_CODE: &str = "vocabulary.concept_code_requires_vocabulary_id";
const CONCEPT_NAME: &str = "vocabulary.concept_name_lookup";
const LOOKUP_CONTEXT: &str = "vocabulary.concept_lookup_context";
const SOURCE_VALUE: &str = "vocabulary.no_string_identification";
const SCHEMA: &str = "vocabulary.schema_validation";

#[test]
fn test_join_on_wrong_key() {
    let violations = check(
        "SELECT p.person_id FROM person p JOIN condition_occurrence co ON p.person_id = co.condition_occurrence_id",
        JOIN_PATH
    );
    assert_eq!(severities(&violations), vec![Severity::Warning]);
    let expected = violations[0].details()["expected"].as_array().unwrap();
    assert!(
        expected
            .iter()
            .any(|e| e == "person.person_id = condition_occurrence.person_id")
    );
}

#[test]
fn test_join_on_foreign_key() {
    let violations = check(
        "SELECT p.person_id FROM person p JOIN condition_occurrence co ON p.person_id = co.person_id",
        JOIN_PATH
    );
    assert!(violations.is_empty());
}

#[test]
fn test_join_between_unrelated_tables() {
    let violations = check(
        "SELECT 1 FROM drug_exposure de JOIN care_site cs ON de.drug_exposure_id = cs.care_site_id",
        JOIN_PATH
    );
    assert_eq!(violations.len(), 1);
    assert!(violations[0].message().contains("does not follow a foreign-key path"));
}

#[test]
fn test_join_across_concept_columns() {
    for sql in [
        "SELECT co.person_id FROM condition_occurrence co \
         JOIN drug_exposure de ON co.condition_concept_id = de.drug_concept_id",
        "SELECT co.person_id FROM condition_occurrence co \
         JOIN person p ON co.condition_concept_id = p.gender_concept_id"
    ] {
        assert_eq!(check(sql, JOIN_PATH).len(), 1, "{}", sql);
    }
}

#[test]
fn test_join_through_concept_ancestor() {
    let violations = check(
        "SELECT co.person_id FROM condition_occurrence co \
         JOIN concept_ancestor ca ON co.condition_concept_id = ca.descendant_concept_id \
         JOIN concept c ON ca.ancestor_concept_id = c.concept_id",
        JOIN_PATH
    );
    assert!(violations.is_empty());
}

#[test]
fn test_join_to_cte_is_not_checked() {
    let violations = check(
        "WITH d AS (SELECT concept_id FROM concept) \
         SELECT co.person_id FROM condition_occurrence co JOIN d ON co.person_id = d.concept_id",
        JOIN_PATH
    );
    assert!(violations.is_empty());
}

#[test]
fn test_domain_filter_missing() {
    let violations = check(
        "SELECT co.person_id FROM condition_occurrence co JOIN concept c ON co.condition_concept_id = c.concept_id",
        DOMAIN
    );
    assert_eq!(severities(&violations), vec![Severity::Warning]);
    assert_eq!(violations[0].details()["expected_domain"], "Condition");
}

#[test]
fn test_domain_filter_wrong_value() {
    let violations = check(
        "SELECT co.person_id FROM condition_occurrence co \
         JOIN concept c ON co.condition_concept_id = c.concept_id WHERE c.domain_id = 'Drug'",
        DOMAIN
    );
    assert_eq!(severities(&violations), vec![Severity::Error]);
}

#[test]
fn test_domain_filter_present() {
    let violations = check(
        "SELECT co.person_id FROM condition_occurrence co \
         JOIN concept c ON co.condition_concept_id = c.concept_id AND c.domain_id = 'Condition'",
        DOMAIN
    );
    assert!(violations.is_empty());
}

#[test]
fn test_negated_domain_filter() {
    let violations = check(
        "SELECT co.person_id FROM condition_occurrence co \
         JOIN concept c ON co.condition_concept_id = c.concept_id WHERE NOT (c.domain_id = 'Condition')",
        DOMAIN
    );
    assert_eq!(violations.len(), 1);
}

#[test]
fn test_domain_filter_on_unjoined_alias() {
    let violations = check(
        "SELECT co.person_id FROM condition_occurrence co \
         JOIN concept c ON co.condition_concept_id = c.concept_id \
         JOIN concept other ON other.concept_id = co.condition_type_concept_id \
         WHERE other.domain_id = 'Condition'",
        DOMAIN
    );
    assert_eq!(severities(&violations), vec![Severity::Error]);
    assert!(violations[0].details().contains_key("misplaced_filter"));
}

#[test]
fn test_cross_table_dates_without_period_end() {
    let violations = check(
        "SELECT co.person_id FROM condition_occurrence co \
         JOIN drug_exposure de ON co.person_id = de.person_id \
         WHERE co.condition_start_date > de.drug_exposure_start_date",
        FUTURE_LEAKAGE
    );
    assert_eq!(severities(&violations), vec![Severity::Warning]);
    assert_eq!(violations[0].details()["later_event"], "condition_occurrence.condition_start_date");
    assert_eq!(violations[0].details()["index_event"], "drug_exposure.drug_exposure_start_date");
}

#[test]
fn test_cross_table_dates_less_than_swaps_events() {
    let violations = check(
        "SELECT co.person_id FROM condition_occurrence co \
         JOIN drug_exposure de ON co.person_id = de.person_id \
         WHERE de.drug_exposure_start_date <= co.condition_start_date",
        FUTURE_LEAKAGE
    );
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].details()["later_event"], "condition_occurrence.condition_start_date");
}

#[test]
fn test_cross_table_dates_bounded_by_period_end() {
    for bound in [
        "co.condition_start_date <= op.observation_period_end_date",
        "co.condition_start_date BETWEEN op.observation_period_start_date AND op.observation_period_end_date"
    ] {
        let sql = format!(
            "SELECT co.person_id FROM condition_occurrence co \
             JOIN drug_exposure de ON co.person_id = de.person_id \
             JOIN observation_period op ON co.person_id = op.person_id \
             WHERE co.condition_start_date > de.drug_exposure_start_date AND {}",
            bound
        );
        assert!(check(&sql, FUTURE_LEAKAGE).is_empty(), "{}", bound);
    }
}

#[test]
fn test_same_table_and_literal_dates_are_not_orderings() {
    assert!(
        check(
            "SELECT person_id FROM drug_exposure \
             WHERE drug_exposure_end_date > drug_exposure_start_date AND drug_exposure_start_date > '2020-01-01'",
            FUTURE_LEAKAGE
        )
        .is_empty()
    );
}

#[test]
fn test_hierarchy_missing() {
    let violations = check(
        "SELECT person_id FROM drug_exposure WHERE drug_concept_id = 1503297",
        HIERARCHY
    );
    assert_eq!(severities(&violations), vec![Severity::Error]);
    assert_eq!(violations[0].details()["concept_ids"][0], "1503297");
}

#[test]
fn test_hierarchy_expanded() {
    let violations = check(
        "SELECT de.person_id FROM drug_exposure de \
         JOIN concept_ancestor ca ON de.drug_concept_id = ca.descendant_concept_id \
         WHERE ca.ancestor_concept_id = 1503297",
        HIERARCHY
    );
    assert!(violations.is_empty());
}

#[test]
fn test_hierarchy_join_without_matching_ancestor_literal() {
    for ancestor in ["ca.ancestor_concept_id > 0", "ca.ancestor_concept_id = 4329847"] {
        let sql = format!(
            "SELECT co.person_id FROM condition_occurrence co \
             JOIN concept_ancestor ca ON co.condition_concept_id = ca.descendant_concept_id \
             WHERE co.condition_concept_id = 201826 AND {}",
            ancestor
        );
        assert_eq!(severities(&check(&sql, HIERARCHY)), vec![Severity::Error], "{}", ancestor);
    }
}

#[test]
fn test_hierarchy_join_with_matching_ancestor_literal() {
    let violations = check(
        "SELECT co.person_id FROM condition_occurrence co \
         JOIN concept_ancestor ca ON co.condition_concept_id = ca.descendant_concept_id \
         WHERE co.condition_concept_id IN (201826) AND ca.ancestor_concept_id IN (201826, 443238)",
        HIERARCHY
    );
    assert!(violations.is_empty());
}

#[test]
fn test_hierarchy_expanded_by_subquery() {
    let violations = check(
        "SELECT co.person_id FROM condition_occurrence co \
         WHERE co.condition_concept_id = 201826 \
         AND co.condition_concept_id IN (\
             SELECT ca.descendant_concept_id FROM concept_ancestor ca WHERE ca.ancestor_concept_id = 201826)",
        HIERARCHY
    );
    assert!(violations.is_empty());
}

#[test]
fn test_hierarchy_subquery_must_project_descendants() {
    let violations = check(
        "SELECT co.person_id FROM condition_occurrence co \
         WHERE co.condition_concept_id = 201826 \
         AND co.condition_concept_id IN (\
             SELECT ca.ancestor_concept_id FROM concept_ancestor ca WHERE ca.ancestor_concept_id = 201826)",
        HIERARCHY
    );
    assert_eq!(severities(&violations), vec![Severity::Error]);
}

#[test]
fn test_hierarchy_walked_upwards() {
    let violations = check(
        "SELECT de.person_id FROM drug_exposure de \
         JOIN concept_ancestor ca ON de.drug_concept_id = ca.ancestor_concept_id \
         WHERE de.drug_concept_id = 1503297",
        HIERARCHY
    );
    assert_eq!(severities(&violations), vec![Severity::Warning]);
}

#[test]
fn test_hierarchy_ignores_zero_and_non_hierarchical_columns() {
    assert!(check("SELECT person_id FROM drug_exposure WHERE drug_concept_id = 0", HIERARCHY).is_empty());
    assert!(
        check(
            "SELECT person_id FROM measurement WHERE measurement_concept_id = 3004410",
            HIERARCHY
        )
        .is_empty()
    );
}

#[test]
fn test_invalid_reason_missing() {
    let violations = check(
        "SELECT concept_id FROM concept WHERE concept_code = 'E11.9' AND vocabulary_id = 'ICD10CM'",
        INVALID_REASON
    );
    assert_eq!(severities(&violations), vec![Severity::Error]);
    assert_eq!(violations[0].details()["alias"], "concept");
}

#[test]
fn test_invalid_reason_present() {
    let violations = check(
        "SELECT concept_id FROM concept WHERE concept_code = 'E11.9' AND vocabulary_id = 'ICD10CM' AND invalid_reason IS NULL",
        INVALID_REASON
    );
    assert!(violations.is_empty());
}

#[test]
fn test_invalid_reason_per_alias() {
    let violations = check(
        "SELECT c2.concept_id FROM concept c1 \
         JOIN concept_relationship cr ON c1.concept_id = cr.concept_id_1 AND cr.invalid_reason IS NULL \
         JOIN concept c2 ON cr.concept_id_2 = c2.concept_id \
         WHERE c1.invalid_reason IS NULL",
        INVALID_REASON
    );
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].details()["alias"], "c2");
}

#[test]
fn test_invalid_reason_derived_table() {
    let violations = check(
        "SELECT descendant_concept_id FROM concept_ancestor WHERE ancestor_concept_id = 201826",
        INVALID_REASON
    );
    assert_eq!(severities(&violations), vec![Severity::Warning]);
}

#[test]
fn test_maps_to_wrong_direction() {
    let violations = check(
        "SELECT co.person_id FROM condition_occurrence co \
         JOIN concept_relationship cr ON co.condition_concept_id = cr.concept_id_1 \
         WHERE cr.relationship_id = 'Maps to'",
        MAPS_TO
    );
    assert_eq!(severities(&violations), vec![Severity::Warning]);
    assert_eq!(violations[0].details()["expected_column"], "concept_id_2");
}

#[test]
fn test_maps_to_right_direction() {
    let violations = check(
        "SELECT co.person_id FROM condition_occurrence co \
         JOIN concept_relationship cr ON co.condition_source_concept_id = cr.concept_id_1 \
         WHERE cr.relationship_id = 'Maps to'",
        MAPS_TO
    );
    assert!(violations.is_empty());
}

#[test]
fn test_maps_to_source_on_target_side() {
    let violations = check(
        "SELECT co.person_id FROM condition_occurrence co \
         JOIN concept_relationship cr ON cr.concept_id_2 = co.condition_source_concept_id \
         WHERE cr.relationship_id = 'Maps to'",
        MAPS_TO
    );
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].details()["expected_column"], "concept_id_1");
}

#[test]
fn test_measurement_without_unit() {
    let violations = check(
        "SELECT person_id FROM measurement WHERE measurement_concept_id = 3004410 AND value_as_number > 6.5",
        MEASUREMENT_UNIT
    );
    assert_eq!(severities(&violations), vec![Severity::Warning]);
}

#[test]
fn test_measurement_with_unit() {
    let violations = check(
        "SELECT person_id FROM measurement \
         WHERE value_as_number BETWEEN 6.5 AND 10 AND unit_concept_id = 8554",
        MEASUREMENT_UNIT
    );
    assert!(violations.is_empty());
}

#[test]
fn test_temporal_filter_without_observation_period() {
    let violations = check(
        "SELECT person_id FROM condition_occurrence WHERE condition_start_date >= '2020-01-01'",
        OBSERVATION_PERIOD
    );
    assert_eq!(severities(&violations), vec![Severity::Error]);
    assert_eq!(
        violations[0].details()["temporal_columns"][0],
        "condition_occurrence.condition_start_date"
    );
}

#[test]
fn test_temporal_filter_anchored() {
    let violations = check(
        "SELECT co.person_id FROM condition_occurrence co \
         JOIN observation_period op ON co.person_id = op.person_id \
         WHERE co.condition_start_date >= op.observation_period_start_date",
        OBSERVATION_PERIOD
    );
    assert!(violations.is_empty());
}

#[test]
fn test_observation_period_not_joined_on_person() {
    let violations = check(
        "SELECT co.person_id FROM condition_occurrence co, observation_period op \
         WHERE co.condition_start_date >= op.observation_period_start_date",
        OBSERVATION_PERIOD
    );
    assert_eq!(severities(&violations), vec![Severity::Warning]);
}

#[test]
fn test_no_temporal_filter() {
    assert!(
        check(
            "SELECT person_id FROM person WHERE year_of_birth > 1950",
            OBSERVATION_PERIOD
        )
        .is_empty()
    );
}

#[test]
fn test_standard_concept_not_enforced() {
    let violations = check(
        "SELECT person_id FROM drug_exposure WHERE drug_concept_id = 1503297",
        STANDARD_CONCEPT
    );
    assert_eq!(severities(&violations), vec![Severity::Error]);
}

#[test]
fn test_standard_concept_enforced() {
    let violations = check(
        "SELECT de.person_id FROM drug_exposure de JOIN concept c ON de.drug_concept_id = c.concept_id \
         WHERE c.standard_concept = 'S'",
        STANDARD_CONCEPT
    );
    assert!(violations.is_empty());
}

#[test]
fn test_negated_standard_concept_filter() {
    let violations = check(
        "SELECT de.person_id FROM drug_exposure de JOIN concept c ON de.drug_concept_id = c.concept_id \
         WHERE NOT (c.standard_concept = 'S')",
        STANDARD_CONCEPT
    );
    assert_eq!(severities(&violations), vec![Severity::Error]);
}

#[test]
fn test_optional_standard_concept_filter() {
    let violations = check(
        "SELECT de.person_id FROM drug_exposure de JOIN concept c ON de.drug_concept_id = c.concept_id \
         WHERE c.standard_concept = 'S' OR de.drug_type_concept_id = 38000177",
        STANDARD_CONCEPT
    );
    assert_eq!(violations.len(), 1);
}

#[test]
fn test_standard_concept_through_maps_to() {
    let violations = check(
        "SELECT co.person_id FROM condition_occurrence co \
         JOIN concept_relationship cr ON co.condition_concept_id = cr.concept_id_2 \
         WHERE cr.relationship_id = 'Maps to'",
        STANDARD_CONCEPT
    );
    assert!(violations.is_empty());
}

#[test]
fn test_unmapped_not_handled() {
    let violations = check(
        "SELECT person_id FROM condition_occurrence WHERE condition_concept_id = 201826",
        UNMAPPED
    );
    assert_eq!(severities(&violations), vec![Severity::Warning]);
    assert_eq!(violations[0].details()["column"], "condition_concept_id");
}

#[test]
fn test_unmapped_handled_explicitly() {
    for guard in [
        "AND condition_concept_id > 0",
        "AND condition_concept_id <> 0",
        "OR condition_concept_id = 0"
    ] {
        let sql = format!(
            "SELECT person_id FROM condition_occurrence WHERE condition_concept_id = 201826 {}",
            guard
        );
        assert!(check(&sql, UNMAPPED).is_empty(), "{}", guard);
    }
}

#[test]
fn test_unmapped_handled_by_coalesce() {
    let violations = check(
        "SELECT COALESCE(condition_concept_id, 0) FROM condition_occurrence WHERE condition_concept_id = 201826",
        UNMAPPED
    );
    assert!(violations.is_empty());
}

#[test]
fn test_concept_code_without_vocabulary() {
    let violations = check(
        "SELECT concept_id FROM concept WHERE concept_code = 'E11.9'",
        CONCEPT_CODE
    );
    assert_eq!(severities(&violations), vec![Severity::Error]);
}

#[test]
fn test_concept_code_with_vocabulary() {
    let violations = check(
        "SELECT concept_id FROM concept WHERE concept_code = 'E11.9' AND vocabulary_id = 'ICD10CM'",
        CONCEPT_CODE
    );
    assert!(violations.is_empty());
}

#[test]
fn test_concept_code_with_optional_vocabulary() {
    let violations = check(
        "SELECT concept_id FROM concept WHERE concept_code = 'E11.9' OR vocabulary_id = 'ICD10CM'",
        CONCEPT_CODE
    );
    assert_eq!(severities(&violations), vec![Severity::Error]);
}

#[test]
fn test_concept_code_vocabulary_on_other_alias() {
    let violations = check(
        "SELECT c1.concept_id FROM concept c1 \
         JOIN concept_relationship cr ON c1.concept_id = cr.concept_id_1 \
         JOIN concept c2 ON cr.concept_id_2 = c2.concept_id \
         WHERE c1.concept_code = 'E11.9' AND c2.vocabulary_id = 'SNOMED'",
        CONCEPT_CODE
    );
    assert_eq!(violations.len(), 1);
}

#[test]
fn test_concept_name_in_main_scope() {
    let violations = check(
        "SELECT co.person_id FROM condition_occurrence co \
         JOIN concept c ON co.condition_concept_id = c.concept_id \
         WHERE c.concept_name ILIKE '%diabetes%'",
        LOOKUP_CONTEXT
    );
    assert_eq!(severities(&violations), vec![Severity::Error]);
}

#[test]
fn test_concept_name_in_lookup_subquery() {
    let violations = check(
        "SELECT person_id FROM condition_occurrence WHERE condition_concept_id IN \
         (SELECT concept_id FROM concept WHERE concept_name ILIKE '%diabetes%')",
        LOOKUP_CONTEXT
    );
    assert!(violations.is_empty());
}

#[test]
fn test_concept_name_equality() {
    let violations = check(
        "SELECT concept_id FROM concept WHERE concept_name = 'Type 2 diabetes mellitus'",
        CONCEPT_NAME
    );
    assert_eq!(severities(&violations), vec![Severity::Warning]);
    assert_eq!(violations[0].details()["column"], "concept.concept_name");
    assert_eq!(violations[0].details()["concept_names"][0], "Type 2 diabetes mellitus");
}

#[test]
fn test_concept_name_pattern_inside_lookup_cte() {
    let sql = "WITH diabetes AS (SELECT concept_id FROM concept WHERE concept_name ILIKE '%diabetes%') \
               SELECT co.person_id FROM condition_occurrence co JOIN diabetes d ON co.condition_concept_id = d.concept_id";
    let violations = check(sql, CONCEPT_NAME);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].details()["pattern"], "'%diabetes%'");
    assert!(check(sql, LOOKUP_CONTEXT).is_empty());
}

#[test]
fn test_concept_name_in_select_list_is_fine() {
    assert!(
        check(
            "SELECT c.concept_name FROM concept c WHERE c.concept_code = 'E11.9' AND c.vocabulary_id = 'ICD10CM'",
            CONCEPT_NAME
        )
        .is_empty()
    );
}

#[test]
fn test_string_match_on_source_value() {
    let violations = check(
        "SELECT person_id FROM condition_occurrence WHERE condition_source_value LIKE 'E11%'",
        SOURCE_VALUE
    );
    assert_eq!(severities(&violations), vec![Severity::Error]);
    assert_eq!(violations[0].details()["column"], "condition_occurrence.condition_source_value");
}

#[test]
fn test_source_value_in_list() {
    let violations = check(
        "SELECT person_id FROM condition_occurrence WHERE condition_source_value IN ('E11.9', 'E11.65')",
        SOURCE_VALUE
    );
    assert_eq!(violations.len(), 1);
}

#[test]
fn test_source_concept_id_is_fine() {
    let violations = check(
        "SELECT person_id FROM condition_occurrence WHERE condition_source_concept_id = 45576876",
        SOURCE_VALUE
    );
    assert!(violations.is_empty());
}

#[test]
fn test_unknown_column() {
    let violations = check("SELECT p.person_id, p.birth_date FROM person p", SCHEMA);
    assert_eq!(severities(&violations), vec![Severity::Error]);
    assert_eq!(violations[0].details()["table"], "person");
    assert_eq!(violations[0].details()["column"], "birth_date");
}

#[test]
fn test_known_columns_and_unqualified_references() {
    assert!(check("SELECT p.person_id, p.year_of_birth FROM person p", SCHEMA).is_empty());
    assert!(check("SELECT birth_date FROM person", SCHEMA).is_empty());
}

#[test]
fn test_unknown_column_reported_once() {
    let violations = check(
        "SELECT p.birth_date FROM person p WHERE p.birth_date > '1950-01-01' ORDER BY p.birth_date",
        SCHEMA
    );
    assert_eq!(violations.len(), 1);
}
