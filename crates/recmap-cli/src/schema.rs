//! Built-in clinic schema and sample rows.

use recmap_core::{AssociationDef, ColumnDef, Database, Entity, EntityDef, ValidationRule, Value};
use regex::Regex;
use tracing::info;

use crate::error::CliError;

/// Register Restaurant, Consultation, Doctor, Intern and Patient.
///
/// Consultation goes first so the many-through associations of Doctor and
/// Patient can see their join entity.
pub fn register(db: &Database) -> Result<(), CliError> {
    db.register(
        EntityDef::new("Restaurant")
            .with_column(ColumnDef::string("name"))
            .with_column(ColumnDef::string("address"))
            .with_column(ColumnDef::integer("rating").with_default(0).not_null()),
    )?;

    db.register(
        EntityDef::new("Consultation")
            .with_column(ColumnDef::reference("doctor_id", "Doctor"))
            .with_column(ColumnDef::reference("patient_id", "Patient"))
            .with_association(AssociationDef::belongs_to("patient", "Patient", "patient_id"))
            .with_association(AssociationDef::belongs_to("doctor", "Doctor", "doctor_id")),
    )?;

    db.register(
        EntityDef::new("Doctor")
            .with_column(ColumnDef::string("first_name"))
            .with_column(ColumnDef::string("last_name"))
            .with_column(ColumnDef::string("email"))
            .with_association(AssociationDef::owns_many("interns", "Intern", "doctor_id"))
            .with_association(AssociationDef::owns_many(
                "consultations",
                "Consultation",
                "doctor_id",
            ))
            .with_association(AssociationDef::through("patients", "consultations", "patient"))
            .validates(ValidationRule::presence("last_name"))
            .validates(ValidationRule::uniqueness("last_name"))
            .validates(ValidationRule::min_length("last_name", 3))
            .validates(ValidationRule::uniqueness_scoped("first_name", "last_name"))
            .validates(ValidationRule::format("email", Regex::new(r"\A.*@.*\.com\z")?)),
    )?;

    db.register(
        EntityDef::new("Intern")
            .with_column(ColumnDef::string("first_name"))
            .with_column(ColumnDef::string("last_name"))
            .with_column(ColumnDef::reference("doctor_id", "Doctor"))
            .with_association(AssociationDef::belongs_to("doctor", "Doctor", "doctor_id")),
    )?;

    db.register(
        EntityDef::new("Patient")
            .with_column(ColumnDef::string("first_name"))
            .with_column(ColumnDef::string("last_name"))
            .with_association(AssociationDef::owns_many(
                "consultations",
                "Consultation",
                "patient_id",
            ))
            .with_association(AssociationDef::through("doctors", "consultations", "doctor")),
    )?;

    Ok(())
}

/// Insert the sample rows unless the store already has some.
///
/// Returns the number of rows written.
pub fn seed(db: &Database) -> Result<usize, CliError> {
    let mapper = db.mapper();
    let resolver = db.resolver();

    if mapper.count("Restaurant")? > 0 {
        info!("Store already seeded");
        return Ok(0);
    }

    let mut written = 0;
    for (name, address, rating) in [
        ("La Tour d'Argent", "15 Quai de la Tournelle, 75005 Paris", 5),
        ("The fox", "London", 3),
        ("Dishoom", "London", 4),
        ("Da Gennaro", "Cosenza", 4),
        ("The Bristol Lounge", "Bristol", 2),
    ] {
        let mut restaurant = mapper.build(
            "Restaurant",
            [
                ("name", Value::from(name)),
                ("address", Value::from(address)),
                ("rating", Value::from(rating)),
            ],
        )?;
        mapper.save_strict(&mut restaurant)?;
        written += 1;
    }

    let house = create(
        db,
        "Doctor",
        [
            ("first_name", "Gregory"),
            ("last_name", "House"),
            ("email", "house@ppth.com"),
        ],
    )?;
    let wilson = create(
        db,
        "Doctor",
        [
            ("first_name", "James"),
            ("last_name", "Wilson"),
            ("email", "wilson@ppth.com"),
        ],
    )?;
    written += 2;

    for (first_name, last_name, doctor) in [
        ("Allison", "Cameron", &house),
        ("Robert", "Chase", &house),
        ("Lawrence", "Kutner", &wilson),
    ] {
        let mut intern =
            mapper.build("Intern", [("first_name", first_name), ("last_name", last_name)])?;
        resolver.assign(&mut intern, "doctor", doctor)?;
        mapper.save_strict(&mut intern)?;
        written += 1;
    }

    let seb = create(db, "Patient", [("first_name", "Seb"), ("last_name", "Saunier")])?;
    written += 1;

    for doctor in [&house, &wilson] {
        let mut consultation = mapper.build("Consultation", Vec::<(String, Value)>::new())?;
        resolver.assign(&mut consultation, "patient", &seb)?;
        resolver.assign(&mut consultation, "doctor", doctor)?;
        mapper.save_strict(&mut consultation)?;
        written += 1;
    }

    info!(rows = written, "Seeded sample rows");
    Ok(written)
}

fn create<const N: usize>(
    db: &Database,
    entity_type: &str,
    attributes: [(&str, &str); N],
) -> Result<Entity, CliError> {
    let mapper = db.mapper();
    let mut entity = mapper.build(entity_type, attributes)?;
    mapper.save_strict(&mut entity)?;
    Ok(entity)
}
