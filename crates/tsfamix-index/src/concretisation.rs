//! Generic concretisation.
//!
//! A use site that supplies type arguments to a generic declaration
//! (`extends Box<string>`, `new Box<string>()`, `make<string>()`,
//! `let b: Box<string>`) produces:
//!
//! - a concrete clone of the generic entity, registered under the concrete
//!   key (the generic FQN with its type-argument group replaced) and shared by
//!   every use site with the same arguments;
//! - one Concretisation linking generic and clone;
//! - one ParameterConcretisation per type parameter, pairing it with the
//!   interned argument. Pairings are shared: a second Concretisation with the
//!   same pairing is appended to the existing record.

use tracing::debug;

use tsfamix_core::adapter::NodeId;
use tsfamix_core::model::{
    AssociationKey, ConcretisationData, Entity, EntityBody, EntityId, EntityKind,
    ParameterConcretisationData,
};
use tsfamix_core::text::normalize_whitespace;

use crate::dictionary::EntityDictionary;
use crate::error::IndexResult;
use crate::interner::{self, concrete_key};

impl EntityDictionary<'_> {
    /// Instantiate `generic` with the type arguments written at `site`.
    ///
    /// Returns the Concretisation, or `None` when `generic` is not generic or
    /// the arguments merely repeat its own parameters.
    pub fn concretise(
        &mut self,
        generic: EntityId,
        arguments: &[String],
        site: NodeId,
    ) -> IndexResult<Option<EntityId>> {
        let Some(entity) = self.repository().get(generic).cloned() else {
            return Ok(None);
        };
        let Some(generic_fqn) = entity.fqn().map(str::to_string) else {
            return Ok(None);
        };
        if !entity.is_generic() || arguments.is_empty() {
            return Ok(None);
        }
        let parameters = self.repository().generic_parameters(generic);
        let parameter_names: Vec<String> = parameters
            .iter()
            .filter_map(|&p| self.repository().get(p)?.name().map(str::to_string))
            .collect();
        let arguments: Vec<String> = arguments.iter().map(|a| normalize_whitespace(a)).collect();
        if arguments == parameter_names {
            return Ok(None);
        }

        let key = concrete_key(&generic_fqn, &arguments);
        let concrete = match self.repository().id_of(&key) {
            Some(id) => {
                self.restore_arguments(id, &arguments, site)?;
                id
            }
            None => self.clone_concrete(&entity, key, &arguments, site)?,
        };

        let link = AssociationKey {
            kind: EntityKind::Concretisation,
            ends: vec![generic, concrete],
            site: None,
        };
        if let Some(existing) = self.repository().find_association(&link) {
            return Ok(Some(existing));
        }
        let concretisation = self.add_concretisation(site, generic, concrete)?;

        let concrete_parameters = self
            .repository()
            .get(concrete)
            .map(|e| e.concrete_parameters().to_vec())
            .unwrap_or_default();
        for (&parameter, &argument) in parameters.iter().zip(concrete_parameters.iter()) {
            self.pair_parameter(parameter, argument, concretisation)?;
        }
        Ok(Some(concretisation))
    }

    fn clone_concrete(
        &mut self,
        generic: &Entity,
        key: String,
        arguments: &[String],
        site: NodeId,
    ) -> IndexResult<EntityId> {
        let concrete_parameters = self.intern_arguments(arguments, site)?;

        let mut body = generic.body.clone();
        match &mut body {
            EntityBody::Class(d) | EntityBody::Interface(d) | EntityBody::Enum(d) => {
                d.core.fqn = key;
                d.is_generic = false;
                d.concrete_parameters = concrete_parameters;
            }
            EntityBody::Function(d)
            | EntityBody::ArrowFunction(d)
            | EntityBody::Method(d)
            | EntityBody::Accessor(d) => {
                d.core.fqn = key;
                d.is_generic = false;
                d.concrete_parameters = concrete_parameters;
            }
            _ => return Ok(generic.id),
        }
        let repo = self.repository_mut();
        let id = repo.next_entity_id();
        let id = repo.insert(Entity::new(id, generic.anchor.clone(), body))?;
        debug!(%id, generic = %generic.id, "concrete clone created");
        Ok(id)
    }

    /// Argument types interned in the container enclosing `site`.
    fn intern_arguments(&mut self, arguments: &[String], site: NodeId) -> IndexResult<Vec<EntityId>> {
        let container = self.enclosing_entity(site, |k| k.is_container() || k.is_behavioural());
        let scope = self.type_scope(container, site)?;
        let interned = arguments
            .iter()
            .map(|arg| interner::intern(self.repository_mut(), arg, &scope))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(interned)
    }

    /// A reused clone whose argument types were removed with the file that
    /// interned them gets them back from the current use site.
    fn restore_arguments(&mut self, concrete: EntityId, arguments: &[String], site: NodeId) -> IndexResult<()> {
        let held = self
            .repository()
            .get(concrete)
            .map(|e| e.concrete_parameters().len())
            .unwrap_or_default();
        if held == arguments.len() {
            return Ok(());
        }
        let restored = self.intern_arguments(arguments, site)?;
        self.repository_mut().modify(concrete, |e| match &mut e.body {
            EntityBody::Class(d) | EntityBody::Interface(d) | EntityBody::Enum(d) => {
                d.concrete_parameters = restored;
            }
            EntityBody::Function(d)
            | EntityBody::ArrowFunction(d)
            | EntityBody::Method(d)
            | EntityBody::Accessor(d) => {
                d.concrete_parameters = restored;
            }
            _ => {}
        })?;
        debug!(%concrete, arguments = arguments.len(), "concrete clone arguments restored");
        Ok(())
    }

    fn add_concretisation(&mut self, site: NodeId, generic: EntityId, concrete: EntityId) -> IndexResult<EntityId> {
        let anchor = self.file().anchor(site);
        let repo = self.repository_mut();
        let id = repo.next_entity_id();
        let body = EntityBody::Concretisation(ConcretisationData { generic, concrete });
        Ok(repo.insert(Entity::new(id, Some(anchor), body))?)
    }

    /// Record `concretisation` on the pairing of `parameter` with `argument`.
    fn pair_parameter(
        &mut self,
        parameter: EntityId,
        argument: EntityId,
        concretisation: EntityId,
    ) -> IndexResult<EntityId> {
        let key = AssociationKey {
            kind: EntityKind::ParameterConcretisation,
            ends: vec![parameter, argument],
            site: None,
        };
        let repo = self.repository_mut();
        if let Some(existing) = repo.find_association(&key) {
            repo.modify(existing, |e| {
                if let EntityBody::ParameterConcretisation(d) = &mut e.body {
                    if !d.concretisations.contains(&concretisation) {
                        d.concretisations.push(concretisation);
                    }
                }
            })?;
            return Ok(existing);
        }
        // Anchored with the parameter so the pairing lives as long as the
        // generic declaration does.
        let anchor = repo.get(parameter).and_then(|p| p.anchor.clone());
        let id = repo.next_entity_id();
        let body = EntityBody::ParameterConcretisation(ParameterConcretisationData {
            generic_parameter: parameter,
            concrete_parameter: argument,
            concretisations: vec![concretisation],
        });
        Ok(repo.insert(Entity::new(id, anchor, body))?)
    }
}
