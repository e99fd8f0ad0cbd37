//! Builder that resolves entity type declarations into a [`Schema`].

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, info};

use super::{EntityType, ResolvedType, Schema};
use crate::error::SchemaError;

/// Collects entity type declarations and resolves them in one step.
///
/// Declarations may arrive in any order: a type whose supertype is not yet
/// resolved is deferred until it is. Types that can never be resolved
/// (missing or cyclic supertypes) are reported, together with every other
/// problem, in a single [`SchemaError::Unresolved`].
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    declared: Vec<EntityType>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity type declaration.
    #[must_use]
    pub fn entity_type(mut self, entity_type: EntityType) -> Self {
        self.declared.push(entity_type);
        self
    }

    /// Adds several declarations.
    #[must_use]
    pub fn entity_types(mut self, types: impl IntoIterator<Item = EntityType>) -> Self {
        self.declared.extend(types);
        self
    }

    /// Resolves every declaration.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Unresolved`] listing every issue found.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut issues = Vec::new();
        let mut pending: Vec<EntityType> = Vec::new();
        let mut seen = HashSet::new();

        for entity_type in self.declared {
            if !seen.insert(entity_type.name.clone()) {
                issues.push(SchemaError::DuplicateType {
                    name: entity_type.name,
                });
                continue;
            }
            let mut members = HashSet::new();
            for member in entity_type.member_names() {
                if !members.insert(member.to_string()) {
                    issues.push(SchemaError::DuplicateMember {
                        entity_type: entity_type.name.clone(),
                        member: member.to_string(),
                    });
                }
            }
            pending.push(entity_type);
        }

        let declared_supertypes: BTreeMap<String, Option<String>> = pending
            .iter()
            .map(|t| (t.name.clone(), t.supertype.clone()))
            .collect();

        let mut resolved: BTreeMap<String, ResolvedType> = BTreeMap::new();
        loop {
            let before = pending.len();
            let mut deferred = Vec::new();
            for entity_type in pending {
                let parent = match entity_type.supertype.as_deref() {
                    None => None,
                    Some(sup) => match resolved.get(sup) {
                        Some(parent) => Some(parent),
                        None => {
                            deferred.push(entity_type);
                            continue;
                        }
                    },
                };
                let name = entity_type.name.clone();
                let resolved_type = ResolvedType::resolve(entity_type, parent);
                debug!(entity_type = %name, lineage = ?resolved_type.lineage(), "Resolved entity type");
                resolved.insert(name, resolved_type);
            }
            pending = deferred;
            if pending.is_empty() || pending.len() == before {
                break;
            }
        }

        for entity_type in &pending {
            issues.extend(unresolvable_issue(entity_type, &declared_supertypes));
        }

        for resolved_type in resolved.values() {
            for relation in &resolved_type.definition().relations {
                for target in &relation.targets {
                    if !declared_supertypes.contains_key(target) {
                        issues.push(SchemaError::UnknownRelationTarget {
                            entity_type: resolved_type.name().to_string(),
                            relation: relation.name.clone(),
                            target: target.clone(),
                        });
                    }
                }
                if let Some(inverse) = &relation.inverse {
                    let defined = relation
                        .targets
                        .iter()
                        .filter_map(|t| resolved.get(t))
                        .any(|t| t.relation(inverse).is_some());
                    if !defined {
                        issues.push(SchemaError::UnknownInverse {
                            entity_type: resolved_type.name().to_string(),
                            relation: relation.name.clone(),
                            inverse: inverse.clone(),
                        });
                    }
                }
            }
        }

        if !issues.is_empty() {
            return Err(SchemaError::Unresolved { issues });
        }
        info!(types = resolved.len(), "Schema resolved");
        Ok(Schema::from_resolved(resolved))
    }
}

/// Explains why a deferred type could never be resolved.
///
/// A cycle is reported once, by its lexicographically smallest member. A
/// type that only inherits the problem from an ancestor outside any cycle
/// gets its own [`SchemaError::UnresolvedSupertype`].
fn unresolvable_issue(
    entity_type: &EntityType,
    supertypes: &BTreeMap<String, Option<String>>,
) -> Option<SchemaError> {
    let name = &entity_type.name;
    let direct = entity_type.supertype.clone()?;
    let dependent = || SchemaError::UnresolvedSupertype {
        name: name.clone(),
        supertype: direct.clone(),
    };

    let mut path = vec![name.clone()];
    let mut visited = BTreeSet::from([name.clone()]);
    let mut current = name.clone();
    loop {
        let next = supertypes.get(&current).cloned().flatten()?;
        if !supertypes.contains_key(&next) {
            if current == *name {
                return Some(SchemaError::MissingSupertype {
                    name: current,
                    supertype: next,
                });
            }
            return Some(dependent());
        }
        if !visited.insert(next.clone()) {
            let start = path.iter().position(|p| *p == next).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].to_vec();
            if !cycle.contains(name) {
                return Some(dependent());
            }
            if cycle.iter().min() != Some(name) {
                return None;
            }
            cycle.push(next);
            return Some(SchemaError::CyclicSupertype {
                name: name.clone(),
                cycle,
            });
        }
        path.push(next.clone());
        current = next;
    }
}
