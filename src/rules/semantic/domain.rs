use compact_str::CompactString;

use crate::{
    error::AppResult,
    rules::{
        Location, Rule, RuleCategory, RuleInfo, Severity, Violation,
        helpers::{ResolvedJoin, atom_target, is_column, push_unique, resolved_joins}
    },
    schema::{SchemaGraph, concepts::EXPECTED_DOMAINS},
    scope::{ScopeId, ScopeTree}
};

/// A clinical concept column joined to `concept` needs a matching
/// `domain_id` filter on that concept alias, in the same scope.
///
/// Each concept alias is judged on its own filters, so a self-join where
/// only one branch carries `domain_id` still reports the other branch.
/// - no filter on the alias: warning
/// - filter with the wrong domain: error
/// - filter present in the scope but attached to an unrelated alias or left
///   unqualified among several concept aliases: error
pub struct DomainSegregation;

/// `domain_id` literal filter and the concept alias it is attached to.
struct DomainFilter {
    owner:  Option<(ScopeId, CompactString)>,
    values: Vec<String>,
    text:   String
}

/// Clinical column joined to a concept alias.
struct ConceptJoin {
    scope:    ScopeId,
    owner:    (ScopeId, CompactString),
    table:    &'static str,
    column:   &'static str,
    expected: &'static str
}

impl Rule for DomainSegregation {
    fn info(&self) -> RuleInfo {
        RuleInfo {
            id:       "semantic.domain_segregation",
            name:     "Domain Segregation",
            severity: Severity::Warning,
            category: RuleCategory::Semantic
        }
    }

    fn evaluate(&self, tree: &ScopeTree, schema: &SchemaGraph) -> AppResult<Vec<Violation>> {
        let mut pairs: Vec<ConceptJoin> = Vec::new();
        for join in resolved_joins(tree, schema) {
            if let Some(pair) = concept_join(&join) {
                let seen = pairs.iter().any(|p| {
                    p.scope == pair.scope && p.owner == pair.owner && p.column == pair.column && p.table == pair.table
                });
                if !seen {
                    pairs.push(pair);
                }
            }
        }
        if pairs.is_empty() {
            return Ok(vec![]);
        }

        let info = self.info();
        let mut violations = Vec::new();
        for pair in &pairs {
            let filters = domain_filters(tree, schema, pair);
            let (alias_scope, alias) = &pair.owner;
            let own: Vec<&DomainFilter> = filters
                .iter()
                .filter(|f| f.owner.as_ref() == Some(&pair.owner))
                .collect();
            let location = Location::alias("concept", alias);
            if !own.is_empty() {
                let mut actual: Vec<&str> = Vec::new();
                for filter in &own {
                    for value in &filter.values {
                        push_unique(&mut actual, value.as_str());
                    }
                }
                if actual.iter().any(|v| v.eq_ignore_ascii_case(pair.expected)) {
                    continue;
                }
                let listed: Vec<String> = actual.iter().map(|v| format!("'{}'", v)).collect();
                violations.push(
                    Violation::new(
                        info.id,
                        Severity::Error,
                        format!(
                            "Domain mismatch: {}.{} requires domain_id = '{}', but alias '{}' is filtered on domain_id IN ({}).",
                            pair.table,
                            pair.column,
                            pair.expected,
                            alias,
                            listed.join(", ")
                        ),
                        format!(
                            "Change the domain_id filter to: {}.domain_id = '{}'",
                            alias, pair.expected
                        )
                    )
                    .at(location)
                    .detail("clinical_column", format!("{}.{}", pair.table, pair.column))
                    .detail("expected_domain", pair.expected)
                    .detail("actual_domains", actual)
                );
                continue;
            }

            let misplaced: Vec<&DomainFilter> = filters
                .iter()
                .filter(|f| match &f.owner {
                    None => true,
                    Some(owner) => !pairs.iter().any(|p| p.scope == pair.scope && &p.owner == owner)
                })
                .collect();
            if let Some(stray) = misplaced.first() {
                violations.push(
                    Violation::new(
                        info.id,
                        Severity::Error,
                        format!(
                            "{}.{} is joined to concept alias '{}', but the domain_id filter in this scope ({}) is not attached to that alias.",
                            pair.table, pair.column, alias, stray.text
                        ),
                        format!(
                            "Qualify the filter with the joined alias: {}.domain_id = '{}'",
                            alias, pair.expected
                        )
                    )
                    .at(location)
                    .detail("clinical_column", format!("{}.{}", pair.table, pair.column))
                    .detail("expected_domain", pair.expected)
                    .detail("misplaced_filter", stray.text.as_str())
                );
                continue;
            }

            let scope_kind = tree.scope(*alias_scope).kind;
            violations.push(
                Violation::new(
                    info.id,
                    info.severity,
                    format!(
                        "Query joins {}.{} to the concept table (alias '{}') without a domain_id filter on that alias. Consider adding: {}.domain_id = '{}'.",
                        pair.table, pair.column, alias, alias, pair.expected
                    ),
                    format!(
                        "Add to WHERE or JOIN ON: {}.domain_id = '{}'",
                        alias, pair.expected
                    )
                )
                .at(location)
                .detail("clinical_column", format!("{}.{}", pair.table, pair.column))
                .detail("expected_domain", pair.expected)
                .detail("scope", scope_kind.to_string())
            );
        }
        Ok(violations)
    }
}

fn concept_join(join: &ResolvedJoin<'_>) -> Option<ConceptJoin> {
    let (concept, clinical) = join.oriented("concept", "concept_id")?;
    let table = clinical.table()?;
    let &(table, column, expected) = EXPECTED_DOMAINS
        .iter()
        .find(|(t, c, _)| *t == table && *c == clinical.column.as_str())?;
    Some(ConceptJoin {
        scope: join.scope,
        owner: (concept.scope, concept.alias.clone()),
        table,
        column,
        expected
    })
}

/// Asserted `domain_id` literal filters visible to the join: its own scope
/// and the scope that binds the concept alias.
fn domain_filters(tree: &ScopeTree, schema: &SchemaGraph, pair: &ConceptJoin) -> Vec<DomainFilter> {
    let mut scopes = vec![pair.scope];
    push_unique(&mut scopes, pair.owner.0);
    let mut filters = Vec::new();
    for scope in scopes {
        for atom in tree.scope(scope).asserted_atoms() {
            let Some(target) = atom.target_column() else {
                continue;
            };
            if target.name != "domain_id" {
                continue;
            }
            let values: Vec<String> = atom.text_values().into_iter().map(String::from).collect();
            if values.is_empty() {
                continue;
            }
            // unresolvable means ambiguous; other tables are not our concern
            let owner = match atom_target(tree, schema, scope, atom) {
                Some(r) if is_column(&r, "concept", "domain_id") => Some((r.scope, r.alias)),
                Some(_) => continue,
                None => None
            };
            filters.push(DomainFilter {
                owner,
                values,
                text: atom.to_string()
            });
        }
    }
    filters
}
