use rusqlite::{params, Row};

use crate::db::models::{NoteDraft, UpdateNoteDraftInput};
use crate::db::DbPool;
use crate::error::AppError;

fn row_to_draft(row: &Row) -> rusqlite::Result<NoteDraft> {
    Ok(NoteDraft {
        patient_id: row.get("patient_id")?,
        title: row.get("title")?,
        content: row.get("content")?,
        note_type: row.get("note_type")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Get the draft for a patient, if one exists.
pub fn get(pool: &DbPool, patient_id: i64) -> Result<Option<NoteDraft>, AppError> {
    let conn = pool.get()?;
    let result = conn.query_row(
        "SELECT * FROM note_drafts WHERE patient_id = ?1",
        params![patient_id],
        row_to_draft,
    );
    match result {
        Ok(draft) => Ok(Some(draft)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(AppError::Database(e)),
    }
}

/// All drafts, most recently edited first.
pub fn list(pool: &DbPool) -> Result<Vec<NoteDraft>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare("SELECT * FROM note_drafts ORDER BY updated_at DESC")?;
    let rows = stmt.query_map([], row_to_draft)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Create or replace the draft for a patient.
pub fn save(
    pool: &DbPool,
    patient_id: i64,
    title: &str,
    content: &str,
    note_type: &str,
) -> Result<NoteDraft, AppError> {
    let conn = pool.get()?;
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO note_drafts (patient_id, title, content, note_type, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(patient_id) DO UPDATE
         SET title = ?2, content = ?3, note_type = ?4, updated_at = ?5",
        params![patient_id, title, content, note_type, now],
    )?;
    drop(conn);
    get(pool, patient_id)?.ok_or_else(|| AppError::NotFound(format!("Note draft for patient {patient_id}")))
}

/// Change only the provided fields of an existing draft.
pub fn update(
    pool: &DbPool,
    patient_id: i64,
    input: &UpdateNoteDraftInput,
) -> Result<NoteDraft, AppError> {
    let now = chrono::Utc::now().to_rfc3339();

    let mut sets: Vec<String> = vec!["updated_at = ?1".into()];
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(now)];

    push_field!(input.title, "title", sets, params);
    push_field!(input.content, "content", sets, params);
    push_field!(input.note_type, "note_type", sets, params);

    params.push(Box::new(patient_id));
    let sql = format!(
        "UPDATE note_drafts SET {} WHERE patient_id = ?{}",
        sets.join(", "),
        params.len()
    );

    let params_ref: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let conn = pool.get()?;
    let rows = conn.execute(&sql, params_ref.as_slice())?;
    drop(conn);
    if rows == 0 {
        return Err(AppError::NotFound(format!("Note draft for patient {patient_id}")));
    }
    get(pool, patient_id)?.ok_or_else(|| AppError::NotFound(format!("Note draft for patient {patient_id}")))
}

/// Delete the draft for a patient. Returns true if one existed.
pub fn clear(pool: &DbPool, patient_id: i64) -> Result<bool, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute("DELETE FROM note_drafts WHERE patient_id = ?1", params![patient_id])?;
    Ok(rows > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;

    #[test]
    fn test_save_get_clear() {
        let pool = init_test_db().unwrap();
        assert!(get(&pool, 12).unwrap().is_none());

        let draft = save(&pool, 12, "Intake", "Sleeping poorly", "session").unwrap();
        assert_eq!(draft.patient_id, 12);
        assert_eq!(draft.content, "Sleeping poorly");

        // Saving again replaces the previous draft
        save(&pool, 12, "Intake", "Sleeping better", "follow_up").unwrap();
        let draft = get(&pool, 12).unwrap().unwrap();
        assert_eq!(draft.content, "Sleeping better");
        assert_eq!(draft.note_type, "follow_up");

        assert!(clear(&pool, 12).unwrap());
        assert!(!clear(&pool, 12).unwrap());
        assert!(get(&pool, 12).unwrap().is_none());
    }

    #[test]
    fn test_update_changes_only_given_fields() {
        let pool = init_test_db().unwrap();
        save(&pool, 3, "Title", "Body", "session").unwrap();

        let input = UpdateNoteDraftInput {
            content: Some("Edited body".into()),
            ..Default::default()
        };
        let draft = update(&pool, 3, &input).unwrap();
        assert_eq!(draft.title, "Title");
        assert_eq!(draft.content, "Edited body");
        assert_eq!(draft.note_type, "session");
    }

    #[test]
    fn test_update_missing_draft_is_not_found() {
        let pool = init_test_db().unwrap();
        let input = UpdateNoteDraftInput {
            title: Some("x".into()),
            ..Default::default()
        };
        assert!(matches!(update(&pool, 99, &input), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_list_returns_all_drafts() {
        let pool = init_test_db().unwrap();
        save(&pool, 1, "a", "a", "session").unwrap();
        save(&pool, 2, "b", "b", "session").unwrap();
        assert_eq!(list(&pool).unwrap().len(), 2);
    }

    #[test]
    fn test_list_surfaces_undecodable_rows() {
        let pool = init_test_db().unwrap();
        save(&pool, 1, "a", "a", "session").unwrap();
        pool.get()
            .unwrap()
            .execute(
                "INSERT INTO note_drafts (patient_id, title, updated_at) VALUES (2, X'00FF', '2026-01-01')",
                [],
            )
            .unwrap();
        assert!(matches!(list(&pool), Err(AppError::Database(_))));
    }
}
