//! Named-entity edits on the transport document.
//!
//! Edits only touch the document; the caller re-runs validation and
//! conversion before anything becomes active. Deleting an entity that a
//! routine still references is refused here so the error names the routine.

use thiserror::Error;

use std::collections::BTreeMap;

use crate::config::schema::{
    AerospikeClusterDto, BackupPolicyDto, BackupRoutineDto, ConfigDto, SecretAgentDto, StorageDto,
};
use crate::config::validation::EntityKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("{kind} name must not be empty")]
    EmptyName { kind: EntityKind },

    #[error("{kind} {name:?} already exists")]
    AlreadyExists { kind: EntityKind, name: String },

    #[error("{kind} {name:?} not found")]
    NotFound { kind: EntityKind, name: String },

    #[error("{kind} {name:?} is used by backup routine {routine:?}")]
    InUse {
        kind: EntityKind,
        name: String,
        routine: String,
    },

    #[error("{kind} entries cannot be edited by name")]
    NotEditable { kind: EntityKind },
}

/// One named entry of the document.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Cluster(AerospikeClusterDto),
    Storage(StorageDto),
    BackupPolicy(BackupPolicyDto),
    BackupRoutine(BackupRoutineDto),
    SecretAgent(SecretAgentDto),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Cluster(_) => EntityKind::Cluster,
            Entity::Storage(_) => EntityKind::Storage,
            Entity::BackupPolicy(_) => EntityKind::BackupPolicy,
            Entity::BackupRoutine(_) => EntityKind::BackupRoutine,
            Entity::SecretAgent(_) => EntityKind::SecretAgent,
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Add,
    Update,
}

fn put<T>(map: &mut BTreeMap<String, T>, kind: EntityKind, name: &str, value: T, mode: Mode) -> Result<(), EditError> {
    if name.trim().is_empty() {
        return Err(EditError::EmptyName { kind });
    }
    match (mode, map.contains_key(name)) {
        (Mode::Add, true) => Err(EditError::AlreadyExists {
            kind,
            name: name.to_string(),
        }),
        (Mode::Update, false) => Err(EditError::NotFound {
            kind,
            name: name.to_string(),
        }),
        _ => {
            map.insert(name.to_string(), value);
            Ok(())
        }
    }
}

fn upsert(document: &mut ConfigDto, name: &str, entity: Entity, mode: Mode) -> Result<(), EditError> {
    let kind = entity.kind();
    match entity {
        Entity::Cluster(c) => put(&mut document.aerospike_clusters, kind, name, c, mode),
        Entity::Storage(s) => put(&mut document.storage, kind, name, s, mode),
        Entity::BackupPolicy(p) => put(&mut document.backup_policies, kind, name, p, mode),
        Entity::BackupRoutine(r) => put(&mut document.backup_routines, kind, name, r, mode),
        Entity::SecretAgent(a) => put(&mut document.secret_agents, kind, name, a, mode),
    }
}

/// Add a new entry. Fails if the name is taken.
pub fn add(document: &mut ConfigDto, name: &str, entity: Entity) -> Result<(), EditError> {
    upsert(document, name, entity, Mode::Add)
}

/// Replace an existing entry. Fails if the name is unknown.
pub fn update(document: &mut ConfigDto, name: &str, entity: Entity) -> Result<(), EditError> {
    upsert(document, name, entity, Mode::Update)
}

/// First routine (by name) that references `name` as a `kind`.
fn referencing_routine<'a>(document: &'a ConfigDto, kind: EntityKind, name: &str) -> Option<&'a str> {
    document
        .backup_routines
        .iter()
        .find(|(_, routine)| match kind {
            EntityKind::Cluster => routine.source_cluster == name,
            EntityKind::Storage => routine.storage == name,
            EntityKind::BackupPolicy => routine.backup_policy == name,
            EntityKind::SecretAgent => routine.secret_agent.as_deref() == Some(name),
            _ => false,
        })
        .map(|(routine, _)| routine.as_str())
}

/// Remove an entry. Fails if it is unknown or still referenced by a routine.
pub fn delete(document: &mut ConfigDto, kind: EntityKind, name: &str) -> Result<(), EditError> {
    if let Some(routine) = referencing_routine(document, kind, name) {
        return Err(EditError::InUse {
            kind,
            name: name.to_string(),
            routine: routine.to_string(),
        });
    }

    let removed = match kind {
        EntityKind::Cluster => document.aerospike_clusters.remove(name).is_some(),
        EntityKind::Storage => document.storage.remove(name).is_some(),
        EntityKind::BackupPolicy => document.backup_policies.remove(name).is_some(),
        EntityKind::BackupRoutine => document.backup_routines.remove(name).is_some(),
        EntityKind::SecretAgent => document.secret_agents.remove(name).is_some(),
        EntityKind::Service | EntityKind::RestorePolicy => return Err(EditError::NotEditable { kind }),
    };

    if !removed {
        return Err(EditError::NotFound {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routine(cluster: &str, agent: Option<&str>) -> BackupRoutineDto {
        BackupRoutineDto {
            backup_policy: "policy".into(),
            source_cluster: cluster.into(),
            storage: "local".into(),
            secret_agent: agent.map(str::to_string),
            interval_cron: "@daily".into(),
            incr_interval_cron: None,
            namespaces: Vec::new(),
            set_list: Vec::new(),
            bin_list: Vec::new(),
            prefer_racks: Vec::new(),
            partition_list: Vec::new(),
        }
    }

    fn document() -> ConfigDto {
        let mut doc = ConfigDto::default();
        doc.aerospike_clusters.insert("main".into(), AerospikeClusterDto::default());
        doc.aerospike_clusters.insert("spare".into(), AerospikeClusterDto::default());
        doc.secret_agents.insert("vault".into(), SecretAgentDto::default());
        doc.backup_routines.insert("daily".into(), routine("main", Some("vault")));
        doc
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let mut doc = document();
        add(&mut doc, "new", Entity::Storage(StorageDto::default())).unwrap();
        assert!(doc.storage.contains_key("new"));

        let err = add(&mut doc, "main", Entity::Cluster(AerospikeClusterDto::default())).unwrap_err();
        assert_eq!(
            err,
            EditError::AlreadyExists {
                kind: EntityKind::Cluster,
                name: "main".into()
            }
        );

        let err = add(&mut doc, " ", Entity::Storage(StorageDto::default())).unwrap_err();
        assert!(matches!(err, EditError::EmptyName { .. }));
    }

    #[test]
    fn test_update_requires_existing() {
        let mut doc = document();
        update(&mut doc, "daily", Entity::BackupRoutine(routine("spare", None))).unwrap();
        assert_eq!(doc.backup_routines["daily"].source_cluster, "spare");

        let err = update(&mut doc, "weekly", Entity::BackupRoutine(routine("main", None))).unwrap_err();
        assert!(matches!(err, EditError::NotFound { .. }));
    }

    #[test]
    fn test_delete_guards_references() {
        let mut doc = document();

        let err = delete(&mut doc, EntityKind::Cluster, "main").unwrap_err();
        assert_eq!(
            err,
            EditError::InUse {
                kind: EntityKind::Cluster,
                name: "main".into(),
                routine: "daily".into()
            }
        );
        let err = delete(&mut doc, EntityKind::SecretAgent, "vault").unwrap_err();
        assert!(err.to_string().contains("daily"));

        delete(&mut doc, EntityKind::Cluster, "spare").unwrap();
        assert!(matches!(
            delete(&mut doc, EntityKind::Cluster, "spare"),
            Err(EditError::NotFound { .. })
        ));

        delete(&mut doc, EntityKind::BackupRoutine, "daily").unwrap();
        delete(&mut doc, EntityKind::Cluster, "main").unwrap();
        delete(&mut doc, EntityKind::SecretAgent, "vault").unwrap();

        assert!(matches!(
            delete(&mut doc, EntityKind::Service, "http"),
            Err(EditError::NotEditable { .. })
        ));
    }
}
