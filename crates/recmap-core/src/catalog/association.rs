//! Association definitions between entity types.

/// How two entity types relate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationKind {
    /// The owner has many rows of `target` whose `foreign_key` holds the owner id.
    OwnsMany {
        /// Child entity type.
        target: String,
        /// Column on the child pointing back at the owner.
        foreign_key: String,
    },
    /// The owner holds the id of one `target` row in `foreign_key`.
    BelongsTo {
        /// Parent entity type.
        target: String,
        /// Column on the owner holding the parent id.
        foreign_key: String,
    },
    /// Far-side rows reached through a join entity.
    ManyThrough {
        /// Owns-many association on the owner reaching the join entity.
        through: String,
        /// Belongs-to association on the join entity reaching the far side.
        source: String,
    },
}

/// A named association declared on an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationDef {
    /// Association name (unique within the entity).
    pub name: String,
    /// Relation kind.
    pub kind: AssociationKind,
}

impl AssociationDef {
    /// Declare a one-to-many association.
    pub fn owns_many(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: AssociationKind::OwnsMany {
                target: target.into(),
                foreign_key: foreign_key.into(),
            },
        }
    }

    /// Declare a many-to-one association.
    pub fn belongs_to(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: AssociationKind::BelongsTo {
                target: target.into(),
                foreign_key: foreign_key.into(),
            },
        }
    }

    /// Declare a many-to-many association through a join entity.
    pub fn through(
        name: impl Into<String>,
        through: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: AssociationKind::ManyThrough {
                through: through.into(),
                source: source.into(),
            },
        }
    }

    /// Human-readable kind, used in errors.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            AssociationKind::OwnsMany { .. } => "owns-many",
            AssociationKind::BelongsTo { .. } => "belongs-to",
            AssociationKind::ManyThrough { .. } => "many-through",
        }
    }

    /// Check if resolving yields a sequence.
    pub fn is_collection(&self) -> bool {
        !matches!(self.kind, AssociationKind::BelongsTo { .. })
    }

    /// Foreign key column stored on the owner, if any.
    pub fn owner_foreign_key(&self) -> Option<&str> {
        match &self.kind {
            AssociationKind::BelongsTo { foreign_key, .. } => Some(foreign_key),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owns_many() {
        let interns = AssociationDef::owns_many("interns", "Intern", "doctor_id");

        assert_eq!(interns.kind_name(), "owns-many");
        assert!(interns.is_collection());
        assert_eq!(interns.owner_foreign_key(), None);
    }

    #[test]
    fn test_belongs_to() {
        let doctor = AssociationDef::belongs_to("doctor", "Doctor", "doctor_id");

        assert!(!doctor.is_collection());
        assert_eq!(doctor.owner_foreign_key(), Some("doctor_id"));
    }

    #[test]
    fn test_through() {
        let doctors = AssociationDef::through("doctors", "consultations", "doctor");

        assert_eq!(doctors.kind_name(), "many-through");
        if let AssociationKind::ManyThrough { through, source } = doctors.kind {
            assert_eq!(through, "consultations");
            assert_eq!(source, "doctor");
        } else {
            panic!("Expected ManyThrough");
        }
    }
}
