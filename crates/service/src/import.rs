//! Bulk student import from CSV.
//!
//! Required columns: firstname, lastname, email. Every other column is a
//! custom field: its name is registered on the school and its per-row value
//! lands in the user's custom-values map. Row failures are collected, not
//! fatal, so one bad email does not sink the roster.

use std::collections::BTreeMap;

use argon2::{password_hash::{PasswordHasher, SaltString}, Argon2};
use rand::rngs::OsRng;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use models::user::{self, CustomValues, Role};

use crate::errors::ServiceError;

pub const REQUIRED_COLUMNS: [&str; 3] = ["firstname", "lastname", "email"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRow {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub custom_values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedRow {
    pub email: String,
    pub reason: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ImportOutcome {
    pub created: usize,
    pub updated: usize,
    pub failed: Vec<FailedRow>,
    pub custom_fields: Vec<String>,
}

/// Parse CSV bytes into student rows plus the custom column names, in header
/// order. Headers are lowercased; missing required columns fail the whole
/// import.
pub fn parse_rows(csv_bytes: &[u8]) -> Result<(Vec<StudentRow>, Vec<String>), ServiceError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(csv_bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ServiceError::Validation(format!("invalid csv: {e}")))?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();

    for required in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == required) {
            return Err(ServiceError::Validation(format!("add a {required} column")));
        }
    }
    let custom_headers: Vec<String> = headers
        .iter()
        .filter(|h| !REQUIRED_COLUMNS.contains(&h.as_str()))
        .cloned()
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ServiceError::Validation(format!("invalid csv: {e}")))?;
        let field = |name: &str| -> String {
            headers
                .iter()
                .position(|h| h == name)
                .and_then(|i| record.get(i))
                .unwrap_or_default()
                .to_string()
        };
        let mut custom_values = BTreeMap::new();
        for header in &custom_headers {
            let value = field(header);
            if !value.is_empty() {
                custom_values.insert(header.clone(), value);
            }
        }
        rows.push(StudentRow {
            first_name: field("firstname"),
            last_name: field("lastname"),
            email: user::normalize_email(&field("email")),
            custom_values,
        });
    }
    Ok((rows, custom_headers))
}

/// Initial password for imported students, changed on first login.
fn derived_password(first_name: &str, last_name: &str) -> String {
    let head = |s: &str| s.chars().take(3).collect::<String>();
    format!("{} {}", head(first_name), head(last_name))
}

/// Import a roster into a school. Existing users (matched by email) get their
/// custom values merged; new users are created as students of the school.
#[instrument(skip(db, csv_bytes), fields(school_id = %school_id))]
pub async fn import_students(
    db: &DatabaseConnection,
    school_id: Uuid,
    csv_bytes: &[u8],
) -> Result<ImportOutcome, ServiceError> {
    let (rows, custom_headers) = parse_rows(csv_bytes)?;

    let school = crate::school_service::register_custom_fields(db, school_id, &custom_headers)
        .await?;

    let mut outcome = ImportOutcome {
        custom_fields: school.custom_fields.unwrap_or_default().0,
        ..Default::default()
    };

    for row in rows {
        match import_row(db, school_id, &row).await {
            Ok(true) => outcome.created += 1,
            Ok(false) => outcome.updated += 1,
            Err(e) => {
                warn!(email = %row.email, error = %e, "student import row failed");
                outcome.failed.push(FailedRow { email: row.email, reason: e.to_string() });
            }
        }
    }
    info!(
        created = outcome.created,
        updated = outcome.updated,
        failed = outcome.failed.len(),
        "student import finished"
    );
    Ok(outcome)
}

/// Returns true when a new user was created, false on update.
async fn import_row(
    db: &DatabaseConnection,
    school_id: Uuid,
    row: &StudentRow,
) -> Result<bool, ServiceError> {
    user::validate_email(&row.email)?;

    if let Some(existing) = user::find_by_email(db, &row.email).await? {
        let mut merged = existing.custom_values.clone().unwrap_or_default().0;
        merged.extend(row.custom_values.clone());
        let mut am: user::ActiveModel = existing.into();
        am.custom_values = Set(Some(CustomValues(merged)));
        am.updated_at = Set(chrono::Utc::now().into());
        am.update(db).await.map_err(|e| ServiceError::Db(e.to_string()))?;
        return Ok(false);
    }

    let created = user::create(
        db,
        user::NewUser {
            first_name: &row.first_name,
            last_name: &row.last_name,
            email: &row.email,
            role: Role::Student,
            school_id: Some(school_id),
        },
    )
    .await?;

    if !row.custom_values.is_empty() {
        let mut am: user::ActiveModel = created.clone().into();
        am.custom_values = Set(Some(CustomValues(row.custom_values.clone())));
        am.update(db).await.map_err(|e| ServiceError::Db(e.to_string()))?;
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(derived_password(&row.first_name, &row.last_name).as_bytes(), &salt)
        .map_err(|e| ServiceError::Validation(e.to_string()))?
        .to_string();
    models::user_credentials::upsert_password(db, created.id, hash, "argon2").await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "Firstname,Lastname,Email,Gender,Class\n\
        Mubarak,Lawal,mubylaww@example.com,male,ss1\n\
        Habibllah,Ayodele,hayodele4@example.com,male,ss2\n";

    #[test]
    fn parse_rows_lowercases_headers_and_extracts_custom_fields() {
        let (rows, custom) = parse_rows(CSV.as_bytes()).unwrap();
        assert_eq!(custom, vec!["gender", "class"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].first_name, "Mubarak");
        assert_eq!(rows[0].email, "mubylaww@example.com");
        assert_eq!(rows[0].custom_values["gender"], "male");
        assert_eq!(rows[0].custom_values["class"], "ss1");
    }

    #[test]
    fn parse_rows_requires_each_mandatory_column() {
        let missing_email = "firstname,lastname,gender\nA,B,male\n";
        let err = parse_rows(missing_email.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("email"));

        let missing_first = "lastname,email\nB,a@b.com\n";
        let err = parse_rows(missing_first.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("firstname"));
    }

    #[test]
    fn parse_rows_normalizes_emails() {
        let csv = "firstname,lastname,email\nAda,Lovelace, Ada@Example.COM \n";
        let (rows, _) = parse_rows(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].email, "ada@example.com");
    }

    #[test]
    fn parse_rows_skips_empty_custom_values() {
        let csv = "firstname,lastname,email,class\nAda,Lovelace,a@b.com,\n";
        let (rows, _) = parse_rows(csv.as_bytes()).unwrap();
        assert!(rows[0].custom_values.is_empty());
    }

    #[test]
    fn derived_password_uses_name_prefixes() {
        assert_eq!(derived_password("Mubarak", "Lawal"), "Mub Law");
        assert_eq!(derived_password("Al", "Bo"), "Al Bo");
    }

    #[tokio::test]
    async fn import_creates_and_updates_students() -> Result<(), anyhow::Error> {
        if std::env::var("DATABASE_URL").is_err() { return Ok(()); }
        use migration::MigratorTrait;
        let db = models::db::connect().await?;
        migration::Migrator::up(&db, None).await?;

        let school =
            models::school::create(&db, &format!("import_{}", Uuid::new_v4()), None).await?;
        let email = format!("import_{}@example.com", Uuid::new_v4());
        let csv = format!(
            "firstname,lastname,email,gender\nAda,Lovelace,{email},female\n"
        );

        let first = import_students(&db, school.id, csv.as_bytes()).await?;
        assert_eq!(first.created, 1);
        assert!(first.custom_fields.contains(&"gender".to_string()));

        // re-importing the same roster updates instead of duplicating
        let second = import_students(&db, school.id, csv.as_bytes()).await?;
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 1);

        let student = models::user::find_by_email(&db, &email).await?.unwrap();
        assert_eq!(student.role, Role::Student);
        assert_eq!(student.custom_values.unwrap().0["gender"], "female");

        models::user::hard_delete(&db, student.id).await?;
        models::school::hard_delete(&db, school.id).await?;
        Ok(())
    }
}
