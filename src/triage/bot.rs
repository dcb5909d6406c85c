//! Triage conversation controller.
//!
//! `TriageBot` walks a patient through greeting → name → email → questions →
//! follow-up choices. Every handler takes `&mut self`, so one conversation
//! never has two requests in flight. Timed bot messages are played through
//! [`Script`] and stop as soon as the conversation's cancellation token fires.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::api::types::{
    AppointmentConfirmation, AppointmentRequest, AssessmentRequest, AssessmentResult,
    DoctorAssignment, TriageFlow,
};
use crate::error::AppError;
use crate::validation;

use super::script::{Pacing, Playback, Script};
use super::service::TriageService;
use super::ticket::{self, Ticket, TicketSink};
use super::types::{
    AnswerMap, Button, ButtonValue, ChatEvent, FinalChoice, Message, MessageLog, Step,
};

// ── Bot copy ───────────────────────────────────────────────────────

const GREETING: [&str; 3] = [
    "Hello there! I'm Dr. Sarah, your CareBridge AI assistant.",
    "I'm here to have a gentle conversation with you about how you've been feeling lately. Think of this as a safe space where you can share openly.",
    "Before we begin, I'd love to know what to call you. What's your name?",
];
const ASK_EMAIL: &str = "To make sure I can connect you with the right support if needed, could you share your email address with me?";
const INVALID_EMAIL: &str = "I'd love to help, but I need a valid email address to continue. Could you double-check that for me?";
const CHECK_IN_INTRO: &str = "Now, I'd like to have a gentle conversation about how you've been feeling. There are no right or wrong answers - just share what feels true for you.";
const READY_PROMPT: &str = "Ready to start our check-in together?";
const START_LABEL: &str = "Yes, let's start";
const START_VALUE: &str = "start";
const QUESTIONS_INTRO: &str = "Wonderful! I'm going to ask you some gentle questions about different aspects of your wellbeing. Take your time with each one.";
const FIRST_QUESTION: &str = "Here's our first question:";
const SAFETY_REASSURANCE: &str = "Thank you for sharing this. You're not alone. Let's continue with your assessment.";

const INCOMPLETE: &str = "Please complete all questions first.";
const ASSESS_FAILED: &str = "Assessment failed. Please try again.";
const ASSESS_INVALID: &str = "Assessment processing failed. Please try again.";
const ASSESS_UNREACHABLE: &str = "I'm sorry, there was a connection error. Please check if the backend server is running and try again.";
const ASSESS_DONE: &str = "Thank you for completing the assessment. What would you like to do?";

const NO_RESULTS: &str = "No assessment results available. Please complete the assessment first.";
const CONTACT_PROMPT: &str = "Would you like to contact a doctor now?";
const KEPT_PRIVATE: &str = "Your assessment will be kept private. Thank you for taking care of your mental health! 💙";
const AFTER_PRIVATE: &str = "Would you like to restart the assessment or contact a doctor?";
const NOT_NOW: &str = "No problem! You can contact us anytime. Take care! 💙";

const ASSIGN_NEEDS_ASSESSMENT: &str = "Please complete the assessment first to assign a doctor.";
const ASSIGN_FAILED: &str = "Failed to assign doctor. Please try again.";
const ASSIGN_UNREACHABLE: &str = "Connection error. Please try again.";
const CONFIRM_PROMPT: &str = "Would you like to confirm and download your e-ticket?";

const APPOINTMENT_CONFIRMED: &str = "✅ Appointment confirmed! Your e-ticket is ready for download.";
const TICKET_SAVED: &str = "📄 Your e-ticket has been downloaded! Check your downloads folder.";
const APPOINTMENT_FAILED: &str = "I'm sorry, there was an error confirming your appointment. Please try again.";

/// Simulated typing time before the bot answers.
const TYPING_MS: u64 = 1500;

fn contact_or_not_now() -> Vec<Button> {
    vec![
        Button::choice("Contact Doctor", FinalChoice::ContactDoctor),
        Button::choice("Not Now", FinalChoice::NotNow),
    ]
}

// ── Controller ─────────────────────────────────────────────────────

pub struct TriageBot {
    service: Arc<dyn TriageService>,
    tickets: Arc<dyn TicketSink>,
    pacing: Pacing,
    cancel: CancellationToken,
    log: MessageLog,
    step: Step,
    question: usize,
    answers: AnswerMap,
    flow: Option<TriageFlow>,
    patient_name: String,
    patient_email: String,
    assessment: Option<AssessmentResult>,
    assignment: Option<DoctorAssignment>,
    last_ticket: Option<PathBuf>,
}

impl TriageBot {
    pub fn new(
        service: Arc<dyn TriageService>,
        tickets: Arc<dyn TicketSink>,
        pacing: Pacing,
    ) -> Self {
        Self {
            service,
            tickets,
            pacing,
            cancel: CancellationToken::new(),
            log: MessageLog::new(),
            step: Step::Greeting,
            question: 0,
            answers: AnswerMap::default(),
            flow: None,
            patient_name: String::new(),
            patient_email: String::new(),
            assessment: None,
            assignment: None,
            last_ticket: None,
        }
    }

    /// Stream log changes to a renderer.
    pub fn with_events(mut self, events: UnboundedSender<ChatEvent>) -> Self {
        self.log = MessageLog::with_events(events);
        self
    }

    /// Token that stops any pending scripted messages, now and for the rest
    /// of this conversation.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    // ── Accessors ──────────────────────────────────────────────────

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn question_index(&self) -> usize {
        self.question
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    /// Buttons the user can press right now.
    pub fn buttons(&self) -> &[Button] {
        self.log.last_buttons()
    }

    pub fn flow(&self) -> Option<&TriageFlow> {
        self.flow.as_ref()
    }

    pub fn patient_name(&self) -> &str {
        &self.patient_name
    }

    pub fn patient_email(&self) -> &str {
        &self.patient_email
    }

    pub fn assessment(&self) -> Option<&AssessmentResult> {
        self.assessment.as_ref()
    }

    pub fn assignment(&self) -> Option<&DoctorAssignment> {
        self.assignment.as_ref()
    }

    pub fn last_ticket(&self) -> Option<&PathBuf> {
        self.last_ticket.as_ref()
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Start the conversation if it has not started yet.
    pub async fn open(&mut self) {
        if self.flow.is_none() {
            self.load_flow().await;
        }
        if self.log.is_empty() {
            self.greet().await;
        }
    }

    /// Fetch the question flow. Failure leaves the flow unset; the user then
    /// stalls at the start prompt instead of seeing an error.
    pub async fn load_flow(&mut self) -> bool {
        match self.service.fetch_flow().await {
            Ok(flow) => {
                tracing::debug!(questions = flow.len(), "Loaded triage flow");
                self.flow = Some(flow);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not load triage flow");
                false
            }
        }
    }

    async fn play(&mut self, script: Script) -> bool {
        script.play(self.pacing, &self.cancel, &mut self.log).await == Playback::Completed
    }

    fn say(&mut self, text: &str) {
        self.log.push(Message::bot(text));
    }

    async fn greet(&mut self) {
        let script = Script::new()
            .at(0, GREETING[0])
            .at(1500, GREETING[1])
            .at(3000, GREETING[2]);
        if self.play(script).await {
            self.step = Step::Name;
        }
    }

    /// Wipe the conversation and greet again. A loaded flow is kept; a flow
    /// that failed to load is fetched again.
    pub async fn restart(&mut self) {
        self.log.clear();
        self.step = Step::Greeting;
        self.question = 0;
        self.answers.clear();
        self.assessment = None;
        self.assignment = None;
        self.last_ticket = None;
        self.patient_name.clear();
        self.patient_email.clear();
        tracing::debug!("Conversation restarted");
        if self.flow.is_none() {
            self.load_flow().await;
        }
        self.greet().await;
    }

    // ── Free-text input ────────────────────────────────────────────

    /// Handle typed input. Blank input and input outside the name/email
    /// steps is ignored.
    pub async fn submit_text(&mut self, input: &str) {
        let input = input.trim();
        if input.is_empty() {
            return;
        }
        match self.step {
            Step::Name => self.submit_name(input).await,
            Step::Email => self.submit_email(input).await,
            step => tracing::debug!(?step, "Ignoring typed input"),
        }
    }

    async fn submit_name(&mut self, name: &str) {
        self.patient_name = name.to_string();
        self.log.push(Message::user(name));

        let script = Script::new()
            .at(TYPING_MS, format!("It's wonderful to meet you, {name}!"))
            .at(3000, ASK_EMAIL);
        if self.play(script).await {
            self.step = Step::Email;
        }
    }

    async fn submit_email(&mut self, email: &str) {
        if !validation::is_plausible_email(email) {
            self.say(INVALID_EMAIL);
            return;
        }
        self.patient_email = email.to_string();
        self.log.push(Message::user(email));

        let script = Script::new()
            .at(TYPING_MS, format!("Perfect, thank you {}!", self.patient_name))
            .at(3000, CHECK_IN_INTRO)
            .at_with(
                4500,
                READY_PROMPT,
                vec![Button {
                    text: START_LABEL.into(),
                    value: ButtonValue::Choice(START_VALUE.into()),
                }],
            );
        if self.play(script).await {
            self.step = Step::StartAssessment;
        }
    }

    // ── Buttons ────────────────────────────────────────────────────

    /// Handle a quick-reply press, routed by the current step.
    pub async fn press(&mut self, button: &Button) {
        match self.step {
            Step::StartAssessment => self.start_assessment().await,
            Step::Questions => match button.value.as_score() {
                Some(value) => self.answer(&button.text, value).await,
                None => tracing::warn!(value = ?button.value, "Non-numeric answer ignored"),
            },
            Step::Safety | Step::FinalChoices => {
                self.log.push(Message::user(button.text.as_str()));
                match button.value.as_choice().map(str::parse::<FinalChoice>) {
                    Some(Ok(choice)) => self.final_choice(choice).await,
                    Some(Err(e)) => tracing::warn!(error = %e, "Unknown final choice"),
                    None => tracing::warn!(value = ?button.value, "Unexpected button value"),
                }
            }
            step => tracing::warn!(?step, "Button pressed outside a button step"),
        }
    }

    async fn start_assessment(&mut self) {
        self.log.push(Message::user(START_LABEL));
        let script = Script::new()
            .at(TYPING_MS, QUESTIONS_INTRO)
            .at(3500, FIRST_QUESTION)
            .wait_until(4500);
        if self.play(script).await {
            self.show_question(0);
        }
    }

    /// Ask question `index`. No-op when the flow is missing or too short.
    pub fn show_question(&mut self, index: usize) -> bool {
        let Some(question) = self.flow.as_ref().and_then(|f| f.question(index)) else {
            tracing::debug!(index, "No question to show");
            return false;
        };
        let buttons = question
            .options
            .iter()
            .map(|opt| Button::score(&opt.label, opt.value))
            .collect();
        let message = Message::bot(question.bot_text.as_str()).with_buttons(buttons);

        self.log.push(message);
        self.step = Step::Questions;
        self.question = index;
        true
    }

    /// Record an answer to the current question and move on.
    pub async fn answer(&mut self, label: &str, value: i64) {
        let index = self.question;
        let Some((question_id, safety, is_last)) = self.flow.as_ref().and_then(|flow| {
            flow.question(index)
                .map(|q| (q.id.clone(), q.safety, flow.is_last(index)))
        }) else {
            return;
        };

        self.answers.record(&question_id, value);
        self.log.push(Message::user(label));

        if is_last {
            if self.play(Script::new().wait_until(TYPING_MS)).await {
                self.complete_assessment().await;
            }
            return;
        }

        let script = if safety && value > 0 {
            tracing::info!(question = %question_id, "Safety question answered positively");
            Script::new().at(TYPING_MS, SAFETY_REASSURANCE).wait_until(3000)
        } else {
            Script::new().wait_until(TYPING_MS)
        };
        if self.play(script).await {
            self.show_question(index + 1);
        }
    }

    // ── Completion ─────────────────────────────────────────────────

    /// Submit the collected answers. Failures keep step and answers as they
    /// are so the submission can be retried.
    pub async fn complete_assessment(&mut self) {
        if self.patient_name.is_empty() || self.patient_email.is_empty() || self.answers.is_empty()
        {
            self.say(INCOMPLETE);
            return;
        }

        let request = AssessmentRequest {
            patient_name: &self.patient_name,
            patient_email: &self.patient_email,
            answers: &self.answers,
        };
        let outcome = self.service.assess(&request).await;

        let result = match outcome {
            Ok(result) if result.assessment_id > 0 => result,
            Ok(result) => {
                tracing::warn!(assessment_id = result.assessment_id, "Assessment without usable id");
                self.say(ASSESS_INVALID);
                return;
            }
            Err(AppError::Http { status, body }) => {
                tracing::warn!(status, %body, "Assessment rejected");
                self.say(ASSESS_FAILED);
                return;
            }
            Err(AppError::InvalidResponse(e)) => {
                tracing::warn!(error = %e, "Assessment response unreadable");
                self.say(ASSESS_INVALID);
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "Assessment request failed");
                self.say(ASSESS_UNREACHABLE);
                return;
            }
        };

        tracing::info!(
            assessment_id = result.assessment_id,
            severity = result.severity().unwrap_or("unknown"),
            "Assessment completed"
        );
        self.assessment = Some(result);

        let script = Script::new().at_with(
            TYPING_MS,
            ASSESS_DONE,
            vec![
                Button::choice("Show Assessment", FinalChoice::ShowAssessment),
                Button::choice("Contact Doctor", FinalChoice::ContactDoctor),
            ],
        );
        if self.play(script).await {
            self.step = Step::FinalChoices;
        }
    }

    /// Re-submit after a failed completion. Returns false when there is
    /// nothing to retry.
    pub async fn retry_completion(&mut self) -> bool {
        let answered_all = self
            .flow
            .as_ref()
            .is_some_and(|f| !f.is_empty() && self.answers.len() >= f.len());
        if self.step != Step::Questions || self.assessment.is_some() || !answered_all {
            return false;
        }
        self.complete_assessment().await;
        true
    }

    // ── Follow-up choices ──────────────────────────────────────────

    async fn final_choice(&mut self, choice: FinalChoice) {
        tracing::debug!(%choice, "Final choice");
        match choice {
            FinalChoice::ContactDoctor | FinalChoice::Share => self.assign_doctor().await,
            FinalChoice::ShowAssessment => self.show_assessment().await,
            FinalChoice::Restart => self.restart().await,
            FinalChoice::Private => {
                self.say(KEPT_PRIVATE);
                let script = Script::new().at_with(
                    1000,
                    AFTER_PRIVATE,
                    vec![
                        Button::choice("Contact Doctor", FinalChoice::ContactDoctor),
                        Button::choice("Restart Assessment", FinalChoice::Restart),
                    ],
                );
                self.play(script).await;
            }
            FinalChoice::ConfirmAppointment => self.confirm_appointment().await,
            FinalChoice::NotNow => self.say(NOT_NOW),
        }
    }

    async fn show_assessment(&mut self) {
        let Some(result) = self.assessment.as_ref() else {
            self.say(NO_RESULTS);
            return;
        };

        let mut script = Script::new();
        if let Some(text) = result.summary_text.as_deref().filter(|t| !t.is_empty()) {
            script = script.at(0, text);
        }
        if let Some(text) = result.ai_insights.as_deref().filter(|t| !t.is_empty()) {
            script = script.at(2000, text);
        }
        script = script.at_with(3000, CONTACT_PROMPT, contact_or_not_now());
        self.play(script).await;
    }

    async fn assign_doctor(&mut self) {
        let Some(assessment_id) = self.assessment.as_ref().map(|a| a.assessment_id) else {
            self.say(ASSIGN_NEEDS_ASSESSMENT);
            return;
        };

        self.log.set_typing(true);
        let assignment = match self.service.assign_doctor(assessment_id).await {
            Ok(assignment) => assignment,
            Err(AppError::Http { status, body }) => {
                tracing::warn!(status, %body, "Doctor assignment rejected");
                self.say(ASSIGN_FAILED);
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "Doctor assignment failed");
                self.say(ASSIGN_UNREACHABLE);
                return;
            }
        };

        tracing::info!(
            assessment_id,
            doctor_id = ?assignment.doctor_id,
            "Doctor assigned"
        );
        let details = format!(
            "Specialization: {}\nHospital: {}\nAppointment: {}",
            assignment.specialization(),
            assignment.hospital_name(),
            ticket::format_appointment_time(assignment.appointment_time.as_deref()),
        );
        let script = Script::new()
            .at(TYPING_MS, format!("Doctor assigned: {}", assignment.doctor_name()))
            .at(2500, details)
            .at_with(
                3500,
                CONFIRM_PROMPT,
                vec![
                    Button::choice("Yes, Confirm & Download", FinalChoice::ConfirmAppointment),
                    Button::choice("Not Now", FinalChoice::NotNow),
                ],
            );
        self.assignment = Some(assignment);
        self.play(script).await;
    }

    async fn confirm_appointment(&mut self) {
        self.log.set_typing(true);
        let (assignment, confirmation) = match self.book_appointment().await {
            Ok(booked) => booked,
            Err(e) => {
                tracing::error!(error = %e, "Appointment confirmation failed");
                self.say(APPOINTMENT_FAILED);
                return;
            }
        };

        tracing::info!(
            appointment_id = ?confirmation.appointment_id,
            doctor_id = ?assignment.doctor_id,
            "Appointment confirmed"
        );
        let script = Script::new()
            .at(TYPING_MS, APPOINTMENT_CONFIRMED)
            .wait_until(2500);
        let completed = self.play(script).await;
        self.assignment = Some(assignment);
        if !completed {
            return;
        }

        match self.write_ticket(&confirmation) {
            Ok(path) => {
                self.last_ticket = Some(path);
                self.say(TICKET_SAVED);
            }
            Err(e) => {
                tracing::error!(error = %e, "Could not write appointment ticket");
                self.say(APPOINTMENT_FAILED);
            }
        }
    }

    /// Fetch a fresh assignment, then confirm it.
    async fn book_appointment(
        &self,
    ) -> Result<(DoctorAssignment, AppointmentConfirmation), AppError> {
        let assessment_id = self
            .assessment
            .as_ref()
            .map(|a| a.assessment_id)
            .ok_or_else(|| AppError::Validation("no completed assessment".into()))?;

        let assignment = self.service.assign_doctor(assessment_id).await?;
        let request = AppointmentRequest::for_assignment(&assignment);
        validation::require_valid_id("doctor_id", request.doctor_id)?;
        validation::require_valid_id("patient_id", request.patient_id)?;
        let confirmation = self.service.confirm_appointment(&request).await?;
        Ok((assignment, confirmation))
    }

    fn write_ticket(&self, confirmation: &AppointmentConfirmation) -> Result<PathBuf, AppError> {
        let assignment = self
            .assignment
            .as_ref()
            .ok_or_else(|| AppError::Internal("no doctor assignment to print".into()))?;
        let contents = ticket::render(&Ticket {
            patient_name: &self.patient_name,
            patient_email: &self.patient_email,
            assignment,
            confirmation,
            assessment: self.assessment.as_ref(),
        });
        let name = ticket::file_name(chrono::Utc::now().timestamp_millis());
        self.tickets.write(&name, &contents)
    }
}

impl Drop for TriageBot {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
