use uuid::Uuid;

use crate::materialize::{convert, Field, Materialize};

/// A point-in-time checkpoint of a virtual machine (`Get-VMSnapshot`).
///
/// Checkpoints form a parent chain through `parent_checkpoint_id`; the
/// chain is not loaded, only referenced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkpoint {
    id: Uuid,
    name: String,
    parent_checkpoint_id: Option<Uuid>,
    parent_checkpoint_name: String,
}

impl Checkpoint {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_checkpoint_id(&self) -> Option<Uuid> {
        self.parent_checkpoint_id
    }

    pub fn parent_checkpoint_name(&self) -> &str {
        &self.parent_checkpoint_name
    }
}

impl Materialize for Checkpoint {
    const FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "Id",
            apply: |cp, v| {
                cp.id = convert::guid(v)?;
                Ok(())
            },
        },
        Field {
            name: "Name",
            apply: |cp, v| {
                cp.name = convert::string(v)?;
                Ok(())
            },
        },
        Field {
            name: "ParentCheckpointId",
            apply: |cp, v| {
                cp.parent_checkpoint_id = convert::optional_guid(v)?;
                Ok(())
            },
        },
        Field {
            name: "ParentCheckpointName",
            apply: |cp, v| {
                cp.parent_checkpoint_name = convert::string(v)?;
                Ok(())
            },
        },
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materialize::materialize;
    use crate::record::{RawRecord, Value};

    #[test]
    fn test_checkpoint_from_record() {
        let id = Uuid::new_v4();
        let parent = Uuid::new_v4();
        let record = RawRecord::new()
            .with("Id", id.to_string())
            .with("Name", "TestCheckpoint")
            .with("ParentCheckpointId", parent.to_string())
            .with("ParentCheckpointName", "TestCheckpointParent");
        let cp: Checkpoint = materialize(&record).unwrap();
        assert_eq!(cp.id(), id);
        assert_eq!(cp.name(), "TestCheckpoint");
        assert_eq!(cp.parent_checkpoint_id(), Some(parent));
        assert_eq!(cp.parent_checkpoint_name(), "TestCheckpointParent");
    }

    #[test]
    fn test_root_checkpoint_has_no_parent() {
        let record = RawRecord::new()
            .with("Id", Uuid::new_v4())
            .with("ParentCheckpointId", Value::Null);
        let cp: Checkpoint = materialize(&record).unwrap();
        assert_eq!(cp.parent_checkpoint_id(), None);
        assert_eq!(cp.parent_checkpoint_name(), "");
    }
}
