use crate::cli::NoteAction;
use crate::db::models::{NoteDraft, UpdateNoteDraftInput};
use crate::db::repos::drafts as draft_repo;
use crate::db::DbPool;
use crate::error::AppError;
use crate::session::{Route, RouteDecision};
use crate::validation;
use crate::AppState;

const DEFAULT_NOTE_TYPE: &str = "session";

pub async fn run(state: &mut AppState, action: NoteAction) -> Result<(), AppError> {
    match action {
        NoteAction::Draft {
            patient_id,
            title,
            content,
            note_type,
        } => {
            let draft = save_draft(
                &state.db,
                patient_id,
                UpdateNoteDraftInput {
                    title,
                    content,
                    note_type,
                },
            )?;
            println!("Draft saved for patient #{}.", draft.patient_id);
            print!("{}", render_draft(&draft));
        }
        NoteAction::Show { patient_id: Some(id) } => match draft_repo::get(&state.db, id)? {
            Some(draft) => print!("{}", render_draft(&draft)),
            None => println!("No draft for patient #{id}."),
        },
        NoteAction::Show { patient_id: None } => {
            let drafts = draft_repo::list(&state.db)?;
            if drafts.is_empty() {
                println!("No drafts.");
            }
            for draft in &drafts {
                print!("{}", render_draft(draft));
            }
        }
        NoteAction::Clear { patient_id } => {
            if draft_repo::clear(&state.db, patient_id)? {
                println!("Draft for patient #{patient_id} discarded.");
            } else {
                println!("No draft for patient #{patient_id}.");
            }
        }
        NoteAction::Submit { patient_id } => submit(state, patient_id).await?,
    }
    Ok(())
}

/// Create the draft on first save; afterwards only touch the given fields.
pub(crate) fn save_draft(
    pool: &DbPool,
    patient_id: i64,
    input: UpdateNoteDraftInput,
) -> Result<NoteDraft, AppError> {
    validation::require_valid_id("patient_id", patient_id)?;
    match draft_repo::get(pool, patient_id)? {
        Some(_) => draft_repo::update(pool, patient_id, &input),
        None => draft_repo::save(
            pool,
            patient_id,
            input.title.as_deref().unwrap_or_default(),
            input.content.as_deref().unwrap_or_default(),
            input.note_type.as_deref().unwrap_or(DEFAULT_NOTE_TYPE),
        ),
    }
}

async fn submit(state: &mut AppState, patient_id: i64) -> Result<(), AppError> {
    let draft = draft_repo::get(&state.db, patient_id)?
        .ok_or_else(|| AppError::NotFound(format!("Note draft for patient {patient_id}")))?;
    validation::require_non_empty("title", &draft.title)?;
    validation::require_non_empty("content", &draft.content)?;

    state.session.restore().await?;
    match state.session.guard(&Route::DoctorPatient(patient_id)) {
        RouteDecision::Allow => {}
        RouteDecision::Redirect(Route::Login) | RouteDecision::Loading => {
            return Err(AppError::Auth("sign in as a doctor to submit notes".into()))
        }
        RouteDecision::Redirect(_) => {
            return Err(AppError::Forbidden("only doctors can submit notes".into()))
        }
    }

    let note_id = state
        .api
        .create_note(patient_id, &draft.title, &draft.content, &draft.note_type)
        .await?;
    draft_repo::clear(&state.db, patient_id)?;
    tracing::info!(patient_id, note_id, "Submitted note draft");
    println!("Note #{note_id} added to patient #{patient_id}.");
    Ok(())
}

fn render_draft(draft: &NoteDraft) -> String {
    format!(
        "Patient #{} [{}] edited {}\n  Title:   {}\n  Content: {}\n",
        draft.patient_id, draft.note_type, draft.updated_at, draft.title, draft.content
    )
}
