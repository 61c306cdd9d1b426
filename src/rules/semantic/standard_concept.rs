use crate::{
    error::AppResult,
    rules::{
        Location, Rule, RuleCategory, RuleInfo, Severity, Violation,
        helpers::{asserted_atoms, atom_target, is_column, push_unique}
    },
    schema::{ConceptField, SchemaGraph},
    scope::ScopeTree
};

/// Queries on standard concept fields must restrict to standard concepts.
///
/// Accepted evidence, anywhere in the statement: a `standard_concept = 'S'`
/// filter on `concept`, or a `concept_relationship` lookup restricted to
/// `relationship_id = 'Maps to'`.
pub struct StandardConceptEnforcement;

impl Rule for StandardConceptEnforcement {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:       "semantic.standard_concept_enforcement",
            name:     "Standard Concept Enforcement",
            severity: Severity::Error,
            category: RuleCategory::Semantic
        }
    }

    fn evaluate(&self, tree: &ScopeTree, schema: &SchemaGraph) -> AppResult<Vec<Violation>> {
        let mut standard = Vec::new();
        let mut source = Vec::new();
        for scope in tree.scopes() {
            for usage in &scope.columns {
                let Some(table) = tree.table_of(schema, scope.id, &usage.column) else {
                    continue;
                };
                let field = format!("{}.{}", table, usage.column.name);
                match schema.classify(table, &usage.column.name) {
                    Some(ConceptField::Standard) => push_unique(&mut standard, field),
                    Some(ConceptField::Source) => push_unique(&mut source, field),
                    None => {}
                }
            }
        }
        if standard.is_empty() || enforces_standard(tree, schema) {
            return Ok(vec![]);
        }
        let info = self.info();
        let message = format!(
            "Query uses STANDARD concept field(s) {} without enforcing standard concepts. Non-standard concept ids silently match nothing in these columns.",
            standard.join(", ")
        );
        Ok(vec![
            Violation::new(
                info.id,
                info.severity,
                message,
                "JOIN concept c ON <field> = c.concept_id AND c.standard_concept = 'S', or map source codes through concept_relationship with relationship_id = 'Maps to'"
            )
            .at(Location::fragment(standard.join(", ")))
            .detail("standard_fields", standard)
            .detail("source_fields", source)
        ])
    }
}

fn enforces_standard(tree: &ScopeTree, schema: &SchemaGraph) -> bool {
    asserted_atoms(tree).any(|(scope, atom)| {
        let Some(target) = atom_target(tree, schema, scope, atom) else {
            return false;
        };
        let values = atom.text_values();
        (is_column(&target, "concept", "standard_concept") && values.contains(&"S"))
            || (is_column(&target, "concept_relationship", "relationship_id")
                && values.iter().any(|v| v.eq_ignore_ascii_case("maps to")))
    })
}
