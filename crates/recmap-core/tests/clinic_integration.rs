//! Integration tests for the mapper, resolver and validations.

use std::collections::BTreeMap;

use recmap_core::{
    AssociationDef, ColumnDef, ConstraintError, Database, EntityDef, Entity, Error, Filter,
    OrderBy, Query, SaveOptions, SchemaChange, StorageConfig, ValidationRule, Value,
};

struct TestContext {
    db: Database,
    _dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = open_clinic(&dir);
        Self { db, _dir: dir }
    }
}

fn open_clinic(dir: &tempfile::TempDir) -> Database {
    let db = Database::open(StorageConfig::new(dir.path())).unwrap();
    setup_clinic_schema(&db);
    db
}

fn setup_clinic_schema(db: &Database) {
    let consultation = EntityDef::new("Consultation")
        .with_column(ColumnDef::reference("doctor_id", "Doctor"))
        .with_column(ColumnDef::reference("patient_id", "Patient"))
        .with_association(AssociationDef::belongs_to("doctor", "Doctor", "doctor_id"))
        .with_association(AssociationDef::belongs_to("patient", "Patient", "patient_id"));

    let doctor = EntityDef::new("Doctor")
        .with_column(ColumnDef::string("first_name"))
        .with_column(ColumnDef::string("last_name"))
        .with_association(AssociationDef::owns_many("interns", "Intern", "doctor_id"))
        .with_association(AssociationDef::owns_many(
            "consultations",
            "Consultation",
            "doctor_id",
        ))
        .with_association(AssociationDef::through("patients", "consultations", "patient"))
        .validates(ValidationRule::presence("last_name"))
        .validates(ValidationRule::uniqueness("last_name"));

    let intern = EntityDef::new("Intern")
        .with_column(ColumnDef::string("first_name"))
        .with_column(ColumnDef::string("last_name"))
        .with_column(ColumnDef::reference("doctor_id", "Doctor"))
        .with_association(AssociationDef::belongs_to("doctor", "Doctor", "doctor_id"));

    let patient = EntityDef::new("Patient")
        .with_column(ColumnDef::string("first_name"))
        .with_column(ColumnDef::string("last_name"))
        .with_association(AssociationDef::owns_many(
            "consultations",
            "Consultation",
            "patient_id",
        ))
        .with_association(AssociationDef::through("doctors", "consultations", "doctor"));

    let restaurant = EntityDef::new("Restaurant")
        .with_column(ColumnDef::string("name"))
        .with_column(ColumnDef::string("address"))
        .with_column(ColumnDef::integer("rating").with_default(0).not_null());

    for def in [consultation, doctor, intern, patient, restaurant] {
        db.register(def).unwrap();
    }
}

fn doctor(db: &Database, first_name: &str, last_name: &str) -> Entity {
    let doctor = db
        .mapper()
        .create(
            "Doctor",
            [("first_name", first_name), ("last_name", last_name)],
        )
        .unwrap();
    assert!(doctor.is_persisted());
    doctor
}

fn intern(db: &Database, last_name: &str, doctor: &Entity) -> Entity {
    db.mapper()
        .create(
            "Intern",
            [
                ("last_name", Value::from(last_name)),
                ("doctor_id", Value::from(doctor.id())),
            ],
        )
        .unwrap()
}

fn consultation(db: &Database, doctor: &Entity, patient: &Entity) -> Entity {
    db.mapper()
        .create(
            "Consultation",
            [
                ("doctor_id", Value::from(doctor.id())),
                ("patient_id", Value::from(patient.id())),
            ],
        )
        .unwrap()
}

fn ids(entities: &[Entity]) -> Vec<u64> {
    entities.iter().filter_map(Entity::id).collect()
}

// ============== Validations ==============

#[test]
fn test_blank_last_name_is_required() {
    let ctx = TestContext::new();
    let mapper = ctx.db.mapper();
    let mut nameless = mapper.build("Doctor", [("last_name", "")]).unwrap();

    assert!(!mapper.save(&mut nameless).unwrap());

    let expected: BTreeMap<String, Vec<String>> =
        BTreeMap::from([("last_name".to_string(), vec!["required".to_string()])]);
    assert_eq!(nameless.errors().as_map(), &expected);
    assert_eq!(nameless.errors().full_messages(), vec!["last_name required"]);
    assert_eq!(mapper.count("Doctor").unwrap(), 0);
}

#[test]
fn test_second_house_is_rejected() {
    let ctx = TestContext::new();
    let mapper = ctx.db.mapper();
    doctor(&ctx.db, "Gregory", "House");

    let mut impostor = mapper.build("Doctor", [("last_name", "House")]).unwrap();
    assert!(!mapper.save(&mut impostor).unwrap());
    assert_eq!(
        impostor.errors().get("last_name").unwrap(),
        &["has already been taken".to_string()]
    );

    match mapper.save_strict(&mut impostor) {
        Err(Error::ValidationFailed(violations)) => {
            assert_eq!(violations.get("last_name").unwrap().len(), 1);
        }
        other => panic!("expected a validation failure, got {:?}", other),
    }
    assert_eq!(mapper.count("Doctor").unwrap(), 1);
}

#[test]
fn test_failed_save_leaves_storage_unchanged() {
    let ctx = TestContext::new();
    let mapper = ctx.db.mapper();
    let mut house = doctor(&ctx.db, "Gregory", "House");
    let stored = mapper.load("Doctor", house.id().unwrap()).unwrap();

    house.set("last_name", "");
    assert!(!mapper.save(&mut house).unwrap());

    let after = mapper.load("Doctor", house.id().unwrap()).unwrap();
    assert_eq!(after, stored);
    assert_eq!(after.updated_at(), stored.updated_at());
}

#[test]
fn test_bypassed_validation_still_hits_unique_index() {
    let ctx = TestContext::new();
    let mapper = ctx.db.mapper();
    doctor(&ctx.db, "Gregory", "House");

    let mut impostor = mapper.build("Doctor", [("last_name", "House")]).unwrap();
    let result = mapper.save_with(&mut impostor, SaveOptions::skip_validation());
    assert!(matches!(
        result,
        Err(Error::ConstraintViolation(ConstraintError::Unique { .. }))
    ));
    assert!(!impostor.is_persisted());

    // Presence is skipped, persistence checks are not
    let mut blank = mapper.build("Doctor", [("last_name", "")]).unwrap();
    assert!(mapper
        .save_with(&mut blank, SaveOptions::skip_validation())
        .unwrap());
    assert_eq!(mapper.count("Doctor").unwrap(), 2);
}

// ============== Mapper ==============

#[test]
fn test_round_trip() {
    let ctx = TestContext::new();
    let mapper = ctx.db.mapper();
    let mut fox = mapper
        .build("Restaurant", [("name", "The fox"), ("address", "London")])
        .unwrap();
    assert!(mapper.save(&mut fox).unwrap());

    let loaded = mapper.load("Restaurant", fox.id().unwrap()).unwrap();
    assert_eq!(loaded, fox);
    assert_eq!(loaded.get("rating"), Some(&Value::Int(0)));
    assert_eq!(loaded.created_at(), fox.created_at());
    assert!(matches!(
        mapper.load("Restaurant", 42),
        Err(Error::NotFound { id: 42, .. })
    ));
}

#[test]
fn test_finders() {
    let ctx = TestContext::new();
    let mapper = ctx.db.mapper();
    for (name, address, rating) in [
        ("La Tour d'Argent", "Paris", 5),
        ("The fox", "London", 3),
        ("Dishoom", "London", 4),
        ("Tour de Cosenza", "Cosenza", 2),
    ] {
        mapper
            .create(
                "Restaurant",
                [
                    ("name", Value::from(name)),
                    ("address", Value::from(address)),
                    ("rating", Value::from(rating)),
                ],
            )
            .unwrap();
    }

    assert_eq!(mapper.count("Restaurant").unwrap(), 4);
    assert_eq!(ids(&mapper.load_all("Restaurant").unwrap()), vec![1, 2, 3, 4]);
    assert_eq!(mapper.first("Restaurant").unwrap().unwrap().id(), Some(1));
    assert_eq!(mapper.last("Restaurant").unwrap().unwrap().id(), Some(4));

    let london = mapper
        .query("Restaurant", &Query::matching(Filter::eq("address", "London")))
        .unwrap();
    assert_eq!(ids(&london), vec![2, 3]);

    let towers = mapper
        .query("Restaurant", &Query::matching(Filter::like("name", "%Tour%")))
        .unwrap();
    assert_eq!(ids(&towers), vec![1, 4]);

    let lowercase = mapper
        .query("Restaurant", &Query::matching(Filter::like("name", "%tour%")))
        .unwrap();
    assert_eq!(ids(&lowercase), vec![1, 4]);

    let by_name = mapper
        .query("Restaurant", &Query::all().order_by(OrderBy::desc("name")))
        .unwrap();
    assert_eq!(ids(&by_name), vec![4, 2, 1, 3]);

    let best = mapper
        .query(
            "Restaurant",
            &Query::all().order_by(OrderBy::desc("rating")).limit(2),
        )
        .unwrap();
    assert_eq!(ids(&best), vec![1, 3]);

    let fox = mapper
        .find_by("Restaurant", Filter::eq("name", "The fox"))
        .unwrap()
        .unwrap();
    assert_eq!(fox.get("address"), Some(&Value::from("London")));
    assert!(mapper
        .find_by("Restaurant", Filter::eq("name", "Noma"))
        .unwrap()
        .is_none());
}

#[test]
fn test_delete_restricted_while_referenced() {
    let ctx = TestContext::new();
    let mapper = ctx.db.mapper();
    let mut house = doctor(&ctx.db, "Gregory", "House");
    intern(&ctx.db, "Cameron", &house);
    intern(&ctx.db, "Chase", &house);

    assert!(matches!(
        mapper.delete(&mut house),
        Err(Error::ConstraintViolation(ConstraintError::Restrict { count: 2, .. }))
    ));

    assert_eq!(mapper.delete_all("Intern").unwrap(), 2);
    mapper.delete(&mut house).unwrap();
    assert!(!house.is_persisted());
    assert_eq!(mapper.count("Doctor").unwrap(), 0);
}

// ============== Associations ==============

#[test]
fn test_interns_are_exactly_the_doctors_children() {
    let ctx = TestContext::new();
    let resolver = ctx.db.resolver();
    let mut house = doctor(&ctx.db, "Gregory", "House");
    let mut wilson = doctor(&ctx.db, "James", "Wilson");

    let cameron = intern(&ctx.db, "Cameron", &house);
    let chase = intern(&ctx.db, "Chase", &house);
    let kutner = intern(&ctx.db, "Kutner", &wilson);

    let interns = resolver.many(&mut house, "interns").unwrap();
    assert_eq!(interns, &[cameron.clone(), chase.clone()]);

    let interns = resolver.many(&mut wilson, "interns").unwrap();
    assert_eq!(interns, &[kutner]);

    let mut cameron = cameron;
    assert_eq!(resolver.one(&mut cameron, "doctor").unwrap(), Some(&house));
}

#[test]
fn test_patient_sees_doctor_through_consultation() {
    let ctx = TestContext::new();
    let mapper = ctx.db.mapper();
    let resolver = ctx.db.resolver();

    let mut house = doctor(&ctx.db, "Gregory", "House");
    doctor(&ctx.db, "James", "Wilson");
    let mut patient = mapper
        .create("Patient", [("first_name", "John"), ("last_name", "Doe")])
        .unwrap();
    consultation(&ctx.db, &house, &patient);

    let doctors = resolver.many(&mut patient, "doctors").unwrap();
    assert_eq!(doctors, &[house.clone()]);

    let patients = resolver.many(&mut house, "patients").unwrap();
    assert_eq!(ids(patients), vec![patient.id().unwrap()]);
}

#[test]
fn test_through_lists_one_entry_per_join_row() {
    let ctx = TestContext::new();
    let mapper = ctx.db.mapper();
    let resolver = ctx.db.resolver();

    let house = doctor(&ctx.db, "Gregory", "House");
    let mut patient = mapper.create("Patient", [("last_name", "Doe")]).unwrap();
    consultation(&ctx.db, &house, &patient);
    consultation(&ctx.db, &house, &patient);

    assert_eq!(resolver.many(&mut patient, "doctors").unwrap().len(), 2);
}

#[test]
fn test_assign_parent_then_save() {
    let ctx = TestContext::new();
    let mapper = ctx.db.mapper();
    let resolver = ctx.db.resolver();

    let house = doctor(&ctx.db, "Gregory", "House");
    let mut foreman = mapper.build("Intern", [("last_name", "Foreman")]).unwrap();
    resolver.assign(&mut foreman, "doctor", &house).unwrap();
    assert!(mapper.save(&mut foreman).unwrap());

    let mut reloaded = mapper.reload(&foreman).unwrap();
    assert!(!reloaded.is_loaded("doctor"));
    assert_eq!(resolver.one(&mut reloaded, "doctor").unwrap(), Some(&house));
}

#[test]
fn test_changing_foreign_key_drops_cached_parent() {
    let ctx = TestContext::new();
    let resolver = ctx.db.resolver();

    let house = doctor(&ctx.db, "Gregory", "House");
    let wilson = doctor(&ctx.db, "James", "Wilson");
    let mut cameron = intern(&ctx.db, "Cameron", &house);

    assert_eq!(resolver.one(&mut cameron, "doctor").unwrap(), Some(&house));
    cameron.set("doctor_id", wilson.id());
    assert_eq!(resolver.one(&mut cameron, "doctor").unwrap(), Some(&wilson));
}

// ============== Schema changes and persistence ==============

#[test]
fn test_add_column_backfills_rows() {
    let ctx = TestContext::new();
    let mapper = ctx.db.mapper();
    let house = doctor(&ctx.db, "Gregory", "House");

    let rewritten = ctx
        .db
        .migrator()
        .apply(
            "Doctor",
            SchemaChange::AddColumn {
                column: ColumnDef::string("specialty").with_default("diagnostics"),
            },
        )
        .unwrap();
    assert_eq!(rewritten, 1);

    let reloaded = mapper.reload(&house).unwrap();
    assert_eq!(reloaded.get("specialty"), Some(&Value::from("diagnostics")));

    let wilson = mapper
        .create("Doctor", [("last_name", "Wilson"), ("specialty", "oncology")])
        .unwrap();
    assert!(wilson.is_persisted());
}

#[test]
fn test_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let house_id = {
        let db = open_clinic(&dir);
        let house = doctor(&db, "Gregory", "House");
        db.flush().unwrap();
        house.id().unwrap()
    };

    let db = open_clinic(&dir);
    let mapper = db.mapper();
    let house = mapper.load("Doctor", house_id).unwrap();
    assert_eq!(house.get("last_name"), Some(&Value::from("House")));

    // The unique index and the id sequence were persisted too
    let mut impostor = mapper.build("Doctor", [("last_name", "House")]).unwrap();
    assert!(!mapper.save(&mut impostor).unwrap());
    let wilson = doctor(&db, "James", "Wilson");
    assert_eq!(wilson.id(), Some(house_id + 1));
}
