//! Model repository: the authoritative entity store.
//!
//! The [`ModelRepository`] owns every entity of one indexing session and
//! keeps the secondary indexes consistent with it:
//!
//! - id → entity (primary storage, ordered for deterministic iteration)
//! - FQN → id, name → ids, kind → ids, anchor file → ids
//! - entity ↔ source node
//! - referrers: id → `(holder, role)` for every stored reference
//! - association key → id, for edge dedup
//!
//! Opposite collections (sub-inheritances, incoming imports, received
//! invocations, child types, ...) are answered from the referrer index rather
//! than stored on entities.
//!
//! # Removal
//!
//! [`remove`](ModelRepository::remove) cascades. For each removed entity,
//! every holder that references it is asked to [`detach`](Entity::detach) the
//! reference; holders that cannot survive (associations losing a mandatory
//! endpoint, children of a removed container) are removed in turn. When
//! removal finishes no surviving entity references a removed one.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use tracing::{debug, error};

use crate::adapter::NodeId;
use crate::error::{ModelError, ModelResult};
use crate::model::{AssociationKey, Detach, Entity, EntityId, EntityKind, Role};

/// A syntax node in a specific file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceNode {
    pub file: String,
    pub node: NodeId,
}

impl SourceNode {
    pub fn new(file: impl Into<String>, node: NodeId) -> Self {
        SourceNode {
            file: file.into(),
            node,
        }
    }
}

/// Result of a [`ModelRepository::remove`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    /// Entities named in the request that existed.
    pub removed: Vec<EntityId>,
    /// Entities removed because they could not survive the request.
    pub cascaded: Vec<EntityId>,
    /// Anchor files of every removed entity, cascaded ones included.
    pub files: BTreeSet<String>,
}

impl RemovalReport {
    pub fn total(&self) -> usize {
        self.removed.len() + self.cascaded.len()
    }

    pub fn all(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.removed.iter().chain(self.cascaded.iter()).copied()
    }
}

/// A stored reference whose target no longer exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub holder: EntityId,
    pub role: Role,
    pub target: EntityId,
}

/// In-memory entity store with indexes.
#[derive(Debug, Default)]
pub struct ModelRepository {
    entities: BTreeMap<EntityId, Entity>,

    // Secondary indexes
    by_fqn: HashMap<String, EntityId>,
    by_name: HashMap<String, BTreeSet<EntityId>>,
    by_kind: HashMap<EntityKind, BTreeSet<EntityId>>,
    by_file: HashMap<String, BTreeSet<EntityId>>,
    associations: HashMap<AssociationKey, EntityId>,

    // Entity ↔ source node
    node_of: HashMap<EntityId, SourceNode>,
    entity_at: HashMap<SourceNode, EntityId>,

    /// target → (holder, role), for every reference stored on a holder.
    referrers: HashMap<EntityId, BTreeSet<(EntityId, Role)>>,

    next_id: u32,
    /// Entities added over the repository's lifetime, removals not deducted.
    inserted: usize,
}

impl ModelRepository {
    pub fn new() -> Self {
        ModelRepository::default()
    }

    // ========================================================================
    // ID Generation
    // ========================================================================

    /// Generate the next EntityId.
    pub fn next_entity_id(&mut self) -> EntityId {
        let id = EntityId::new(self.next_id);
        self.next_id += 1;
        id
    }

    // ========================================================================
    // Insert Operations
    // ========================================================================

    /// Add an entity.
    ///
    /// - A named entity whose FQN is already registered to a different entity
    ///   is rejected with [`ModelError::DuplicateFqn`]; the first entity is
    ///   kept untouched.
    /// - An association whose [`AssociationKey`] is already registered is not
    ///   added; the id of the existing association is returned instead.
    pub fn insert(&mut self, entity: Entity) -> ModelResult<EntityId> {
        if let Some(fqn) = entity.fqn() {
            if let Some(&existing) = self.by_fqn.get(fqn) {
                if existing != entity.id {
                    let err = ModelError::DuplicateFqn {
                        fqn: fqn.to_string(),
                        existing,
                        rejected: entity.kind(),
                    };
                    error!(%err, "rejected entity");
                    return Err(err);
                }
            }
        }
        let key = entity.association_key();
        if let Some(key) = &key {
            if let Some(&existing) = self.associations.get(key) {
                return Ok(existing);
            }
        }
        if self.entities.contains_key(&entity.id) {
            return Err(ModelError::structural(
                entity.file().unwrap_or_default(),
                0,
                format!("entity id {} is already in use", entity.id),
            ));
        }

        let id = entity.id;
        if let Some(core) = entity.named() {
            self.by_fqn.insert(core.fqn.clone(), id);
            self.by_name.entry(core.name.clone()).or_default().insert(id);
        }
        self.by_kind.entry(entity.kind()).or_default().insert(id);
        if let Some(file) = entity.file() {
            self.by_file.entry(file.to_string()).or_default().insert(id);
        }
        if let Some(key) = key {
            self.associations.insert(key, id);
        }
        self.index_references(&entity);
        debug!(id = %id, kind = %entity.kind(), fqn = entity.fqn().unwrap_or(""), "entity added");
        self.entities.insert(id, entity);
        self.inserted += 1;
        Ok(id)
    }

    /// Add an entity and record the syntax node it was created from.
    pub fn insert_with_source(&mut self, entity: Entity, source: SourceNode) -> ModelResult<EntityId> {
        let id = self.insert(entity)?;
        if !self.node_of.contains_key(&id) {
            self.entity_at.insert(source.clone(), id);
            self.node_of.insert(id, source);
        }
        Ok(id)
    }

    /// Mutate an entity in place, keeping the reference indexes current.
    ///
    /// Name and FQN must not change; a changed FQN is reverted and reported
    /// as a structural error.
    pub fn modify<F>(&mut self, id: EntityId, f: F) -> ModelResult<()>
    where
        F: FnOnce(&mut Entity),
    {
        let mut entity = self
            .entities
            .remove(&id)
            .ok_or(ModelError::UnknownEntity(id))?;
        self.unindex_references(&entity);
        let fqn = entity.fqn().map(str::to_string);
        f(&mut entity);
        let changed = entity.fqn().map(str::to_string) != fqn;
        if changed {
            if let (Some(core), Some(fqn)) = (entity.named_mut(), fqn.clone()) {
                core.fqn = fqn;
            }
        }
        self.index_references(&entity);
        let file = entity.file().unwrap_or_default().to_string();
        self.entities.insert(id, entity);
        if changed {
            return Err(ModelError::structural(
                file,
                0,
                format!("attempt to rename {} after registration", fqn.unwrap_or_default()),
            ));
        }
        Ok(())
    }

    fn index_references(&mut self, entity: &Entity) {
        for (target, role) in entity.references() {
            self.referrers
                .entry(target)
                .or_default()
                .insert((entity.id, role));
        }
    }

    fn unindex_references(&mut self, entity: &Entity) {
        for (target, role) in entity.references() {
            if let Some(set) = self.referrers.get_mut(&target) {
                set.remove(&(entity.id, role));
                if set.is_empty() {
                    self.referrers.remove(&target);
                }
            }
        }
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Remove entities, cascading to everything that cannot survive them.
    pub fn remove<I>(&mut self, ids: I) -> RemovalReport
    where
        I: IntoIterator<Item = EntityId>,
    {
        let mut report = RemovalReport::default();
        let mut queue: VecDeque<(EntityId, bool)> = ids.into_iter().map(|id| (id, true)).collect();

        while let Some((id, requested)) = queue.pop_front() {
            let Some(entity) = self.take(id) else { continue };
            if let Some(file) = entity.file() {
                report.files.insert(file.to_string());
            }
            if requested {
                report.removed.push(id);
            } else {
                report.cascaded.push(id);
            }

            let holders = self.referrers.remove(&id).unwrap_or_default();
            for (holder, _) in holders {
                let Some(holding) = self.entities.get_mut(&holder) else {
                    continue;
                };
                if holding.detach(id) == Detach::Drop {
                    queue.push_back((holder, false));
                }
            }
        }
        debug!(
            removed = report.removed.len(),
            cascaded = report.cascaded.len(),
            "entities removed"
        );
        report
    }

    /// Take an entity out of primary storage and every index.
    fn take(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        if let Some(core) = entity.named() {
            if self.by_fqn.get(&core.fqn) == Some(&id) {
                self.by_fqn.remove(&core.fqn);
            }
            remove_from(&mut self.by_name, &core.name, id);
        }
        remove_from(&mut self.by_kind, &entity.kind(), id);
        if let Some(file) = entity.file() {
            remove_from(&mut self.by_file, &file.to_string(), id);
        }
        if let Some(key) = entity.association_key() {
            if self.associations.get(&key) == Some(&id) {
                self.associations.remove(&key);
            }
        }
        if let Some(source) = self.node_of.remove(&id) {
            self.entity_at.remove(&source);
        }
        self.unindex_references(&entity);
        Some(entity)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn by_fqn(&self, fqn: &str) -> Option<&Entity> {
        self.by_fqn.get(fqn).and_then(|id| self.entities.get(id))
    }

    pub fn id_of(&self, fqn: &str) -> Option<EntityId> {
        self.by_fqn.get(fqn).copied()
    }

    /// Entities with the given simple name, in id order.
    pub fn by_name(&self, name: &str) -> Vec<&Entity> {
        self.collect(self.by_name.get(name))
    }

    /// Entities of one kind, in id order.
    pub fn by_kind(&self, kind: EntityKind) -> Vec<&Entity> {
        self.collect(self.by_kind.get(&kind))
    }

    /// Entities anchored in a file, in id order.
    pub fn in_file(&self, path: &str) -> Vec<EntityId> {
        self.by_file
            .get(path)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Files that anchor at least one entity.
    pub fn files(&self) -> Vec<String> {
        let mut files: Vec<String> = self.by_file.keys().cloned().collect();
        files.sort();
        files
    }

    pub fn source_node(&self, id: EntityId) -> Option<&SourceNode> {
        self.node_of.get(&id)
    }

    pub fn entity_at(&self, file: &str, node: NodeId) -> Option<EntityId> {
        self.entity_at.get(&SourceNode::new(file, node)).copied()
    }

    pub fn find_association(&self, key: &AssociationKey) -> Option<EntityId> {
        self.associations.get(key).copied()
    }

    /// All entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Number of entities ever added. Differences of this counter measure
    /// what a run created even when it also removed entities.
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entity counts per kind, omitting empty kinds.
    pub fn counts(&self) -> BTreeMap<EntityKind, usize> {
        self.by_kind
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(kind, ids)| (*kind, ids.len()))
            .collect()
    }

    /// Every FQN currently registered, sorted.
    pub fn fqns(&self) -> BTreeSet<String> {
        self.by_fqn.keys().cloned().collect()
    }

    fn collect(&self, ids: Option<&BTreeSet<EntityId>>) -> Vec<&Entity> {
        ids.map(|set| set.iter().filter_map(|id| self.entities.get(id)).collect())
            .unwrap_or_default()
    }

    // ========================================================================
    // Opposite Collections
    // ========================================================================

    /// Every `(holder, role)` pair referencing `id`.
    pub fn referrers_of(&self, id: EntityId) -> Vec<(EntityId, Role)> {
        self.referrers
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Holders referencing `id` in the given role, in id order.
    pub fn referrers_with(&self, id: EntityId, role: Role) -> Vec<EntityId> {
        self.referrers
            .get(&id)
            .map(|set| {
                set.iter()
                    .filter(|(_, r)| *r == role)
                    .map(|(holder, _)| *holder)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Direct structural children.
    pub fn children_of(&self, id: EntityId) -> Vec<EntityId> {
        self.referrers_with(id, Role::Parent)
    }

    fn children_where(&self, id: EntityId, pred: impl Fn(EntityKind) -> bool) -> Vec<EntityId> {
        self.children_of(id)
            .into_iter()
            .filter(|c| self.entities.get(c).is_some_and(|e| pred(e.kind())))
            .collect()
    }

    pub fn child_types(&self, id: EntityId) -> Vec<EntityId> {
        self.children_where(id, |k| {
            matches!(
                k,
                EntityKind::Class
                    | EntityKind::Interface
                    | EntityKind::Enum
                    | EntityKind::Alias
                    | EntityKind::Type
                    | EntityKind::ParameterType
            )
        })
    }

    pub fn child_functions(&self, id: EntityId) -> Vec<EntityId> {
        self.children_where(id, |k| k.is_behavioural())
    }

    pub fn child_variables(&self, id: EntityId) -> Vec<EntityId> {
        self.children_where(id, |k| {
            matches!(k, EntityKind::Variable | EntityKind::Property | EntityKind::EnumValue)
        })
    }

    pub fn child_modules(&self, id: EntityId) -> Vec<EntityId> {
        self.children_where(id, |k| k == EntityKind::Module)
    }

    pub fn parameters(&self, id: EntityId) -> Vec<EntityId> {
        self.children_where(id, |k| k == EntityKind::Parameter)
    }

    pub fn generic_parameters(&self, id: EntityId) -> Vec<EntityId> {
        self.children_where(id, |k| k == EntityKind::TypeParameter)
    }

    pub fn aliases(&self, id: EntityId) -> Vec<EntityId> {
        self.children_where(id, |k| k == EntityKind::Alias)
    }

    pub fn decorators(&self, id: EntityId) -> Vec<EntityId> {
        self.referrers_with(id, Role::Decorated)
    }

    pub fn comments(&self, id: EntityId) -> Vec<EntityId> {
        self.referrers_with(id, Role::CommentOwner)
    }

    /// Inheritances where `id` is the subclass.
    pub fn super_inheritances(&self, id: EntityId) -> Vec<EntityId> {
        self.referrers_with(id, Role::Subclass)
    }

    /// Inheritances where `id` is the superclass.
    pub fn sub_inheritances(&self, id: EntityId) -> Vec<EntityId> {
        self.referrers_with(id, Role::Superclass)
    }

    pub fn outgoing_imports(&self, id: EntityId) -> Vec<EntityId> {
        self.referrers_with(id, Role::Importer)
    }

    pub fn incoming_imports(&self, id: EntityId) -> Vec<EntityId> {
        self.referrers_with(id, Role::Imported)
    }

    /// Accesses performed by a container.
    pub fn accesses(&self, id: EntityId) -> Vec<EntityId> {
        self.referrers_with(id, Role::Accessor)
    }

    /// Accesses to a structural entity.
    pub fn incoming_accesses(&self, id: EntityId) -> Vec<EntityId> {
        self.referrers_with(id, Role::Variable)
    }

    pub fn outgoing_invocations(&self, id: EntityId) -> Vec<EntityId> {
        self.referrers_with(id, Role::Sender)
    }

    /// Invocations whose receiver is `id`.
    pub fn received_invocations(&self, id: EntityId) -> Vec<EntityId> {
        self.referrers_with(id, Role::Receiver)
    }

    /// Invocations listing `id` as a candidate callee.
    pub fn incoming_invocations(&self, id: EntityId) -> Vec<EntityId> {
        self.referrers_with(id, Role::Candidate)
    }

    pub fn outgoing_references(&self, id: EntityId) -> Vec<EntityId> {
        self.referrers_with(id, Role::ReferenceSource)
    }

    pub fn incoming_references(&self, id: EntityId) -> Vec<EntityId> {
        self.referrers_with(id, Role::ReferenceTarget)
    }

    /// Concretisations where `id` is the generic side.
    pub fn generic_concretisations(&self, id: EntityId) -> Vec<EntityId> {
        self.referrers_with(id, Role::Generic)
    }

    /// Concretisations where `id` is the concrete side.
    pub fn concrete_concretisations(&self, id: EntityId) -> Vec<EntityId> {
        self.referrers_with(id, Role::Concrete)
    }

    /// Parameter concretisations that include the given concretisation.
    pub fn parameter_concretisations(&self, concretisation: EntityId) -> Vec<EntityId> {
        self.referrers_with(concretisation, Role::Concretisation)
    }

    /// Entities whose declared type is `id`.
    pub fn typed_entities(&self, id: EntityId) -> Vec<EntityId> {
        self.referrers_with(id, Role::DeclaredType)
    }

    // ========================================================================
    // Integrity
    // ========================================================================

    /// Every stored reference whose target is not in the repository.
    pub fn check_integrity(&self) -> Vec<DanglingReference> {
        let mut dangling = Vec::new();
        for entity in self.entities.values() {
            for (target, role) in entity.references() {
                if !self.entities.contains_key(&target) {
                    dangling.push(DanglingReference {
                        holder: entity.id,
                        role,
                        target,
                    });
                }
            }
        }
        dangling
    }
}

fn remove_from<K>(index: &mut HashMap<K, BTreeSet<EntityId>>, key: &K, id: EntityId)
where
    K: std::hash::Hash + Eq,
{
    if let Some(set) = index.get_mut(key) {
        set.remove(&id);
        if set.is_empty() {
            index.remove(key);
        }
    }
}
