use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::Procedure;

pub fn insert_procedure(conn: &Connection, procedure: &Procedure) -> Result<(), DatabaseError> {
    if procedure.duration_minutes <= 0 {
        return Err(DatabaseError::ConstraintViolation(format!(
            "procedure duration must be positive, got {}",
            procedure.duration_minutes
        )));
    }

    conn.execute(
        "INSERT INTO procedures (id, name, description, price_cents, duration_minutes)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            procedure.id.to_string(),
            procedure.name,
            procedure.description,
            procedure.price_cents,
            procedure.duration_minutes,
        ],
    )?;
    Ok(())
}

pub fn get_procedure(conn: &Connection, id: Uuid) -> Result<Procedure, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, price_cents, duration_minutes
         FROM procedures WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id.to_string()], row_to_tuple);

    match result {
        Ok(tuple) => tuple_to_procedure(tuple),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(DatabaseError::NotFound {
            entity_type: "Procedure".into(),
            id: id.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Catalog listing, alphabetical.
pub fn list_procedures(conn: &Connection) -> Result<Vec<Procedure>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, price_cents, duration_minutes
         FROM procedures ORDER BY name ASC",
    )?;

    let rows = stmt.query_map([], row_to_tuple)?;

    let mut procedures = Vec::new();
    for row in rows {
        procedures.push(tuple_to_procedure(row?)?);
    }
    Ok(procedures)
}

type ProcedureRow = (String, String, String, i64, i64);

fn row_to_tuple(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProcedureRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn tuple_to_procedure(
    (id, name, description, price_cents, duration_minutes): ProcedureRow,
) -> Result<Procedure, DatabaseError> {
    Ok(Procedure {
        id: Uuid::parse_str(&id).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        name,
        description,
        price_cents,
        duration_minutes,
    })
}
