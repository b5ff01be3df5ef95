use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::api::{ApiError, ApiResult, LoginError, TeacherApi};
use crate::models::{DetailBreakdown, LoginResponse, TeacherSummary, Totals, User, WeeklyPoint};
use crate::session::{KeyValueStorage, SessionStore};
use crate::totals;

pub const MISSING_CREDENTIALS: &str = "Please enter both email and password.";
pub const INVALID_CREDENTIALS: &str = "Invalid email or password.";
pub const SIGN_IN_FAILED: &str = "Something went wrong while signing in.";
pub const SERVER_UNREACHABLE: &str = "Unable to reach the server. Please try again.";
pub const SESSION_EXPIRED: &str = "Your session has expired. Please sign in again.";
pub const SUMMARY_FAILED: &str = "Failed to load teacher summary.";
pub const TEACHER_FAILED: &str = "Failed to load teacher details.";

/// Shared flag set when the fetch that captured it has been superseded.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unauthenticated,
    SummaryLoading,
    SummaryReady,
    SummaryFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeacherPhase {
    Idle,
    Loading,
    Ready,
}

/// A summary request keyed by the token it was issued with.
#[derive(Debug)]
pub struct SummaryFetch {
    pub token: String,
    cancel: CancelFlag,
}

/// A weekly+details request keyed by token and selected teacher.
#[derive(Debug)]
pub struct TeacherFetch {
    pub token: String,
    pub teacher_id: String,
    cancel: CancelFlag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

pub struct Dashboard<S> {
    session: SessionStore<S>,
    token: Option<String>,
    user: Option<User>,
    phase: Phase,
    teacher_phase: TeacherPhase,
    teachers: Vec<TeacherSummary>,
    selected: Option<String>,
    weekly: Option<Vec<WeeklyPoint>>,
    details: Option<DetailBreakdown>,
    error: Option<String>,
    auth_error: Option<String>,
    auth_loading: bool,
    summary_cancel: Option<CancelFlag>,
    teacher_cancel: Option<CancelFlag>,
}

impl<S: KeyValueStorage> Dashboard<S> {
    pub fn new(session: SessionStore<S>) -> Self {
        Self {
            session,
            token: None,
            user: None,
            phase: Phase::Unauthenticated,
            teacher_phase: TeacherPhase::Idle,
            teachers: Vec::new(),
            selected: None,
            weekly: None,
            details: None,
            error: None,
            auth_error: None,
            auth_loading: false,
            summary_cancel: None,
            teacher_cancel: None,
        }
    }

    /// Picks up a previously persisted session, if any.
    pub fn restore(&mut self) {
        let stored = self.session.load();
        self.user = stored.user;
        if let Some(token) = stored.token {
            log::info!("restored stored session");
            self.enter_session(token);
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn teacher_phase(&self) -> TeacherPhase {
        self.teacher_phase
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn teachers(&self) -> &[TeacherSummary] {
        &self.teachers
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_teacher(&self) -> Option<&TeacherSummary> {
        totals::selected_teacher(&self.teachers, self.selected_id())
    }

    pub fn totals(&self) -> Totals {
        totals::current_totals(&self.teachers, self.selected_id())
    }

    pub fn weekly(&self) -> &[WeeklyPoint] {
        self.weekly.as_deref().unwrap_or(&[])
    }

    pub fn details(&self) -> Option<&DetailBreakdown> {
        self.details.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn auth_error(&self) -> Option<&str> {
        self.auth_error.as_deref()
    }

    pub fn auth_loading(&self) -> bool {
        self.auth_loading
    }

    pub fn summary_loading(&self) -> bool {
        self.phase == Phase::SummaryLoading
    }

    pub fn teacher_loading(&self) -> bool {
        self.teacher_phase == TeacherPhase::Loading && self.selected.is_some()
    }

    pub fn begin_summary(&mut self) -> Option<SummaryFetch> {
        let token = self.token.clone()?;
        if let Some(previous) = self.summary_cancel.take() {
            previous.cancel();
        }
        let cancel = CancelFlag::default();
        self.summary_cancel = Some(cancel.clone());
        self.phase = Phase::SummaryLoading;
        self.error = None;
        Some(SummaryFetch { token, cancel })
    }

    /// Applies a finished summary fetch. Returns false when the result was
    /// stale and discarded.
    pub fn apply_summary(
        &mut self,
        fetch: SummaryFetch,
        result: ApiResult<Vec<TeacherSummary>>,
    ) -> bool {
        if fetch.cancel.is_cancelled() {
            log::warn!("discarding superseded summary response");
            return false;
        }
        self.summary_cancel = None;

        match result {
            Ok(teachers) => {
                log::info!("summary loaded for {} teachers", teachers.len());
                self.teachers = teachers;
                self.phase = Phase::SummaryReady;
            }
            Err(ApiError::Unauthorized) => self.expire_session(),
            Err(err) => {
                log::warn!("summary fetch failed: {err}");
                self.error = Some(SUMMARY_FAILED.to_string());
                self.phase = Phase::SummaryFailed;
            }
        }
        true
    }

    /// Changes the selected teacher. Returns the fetch to issue, or `None`
    /// when the selection was cleared or there is no session.
    pub fn select_teacher(&mut self, teacher_id: Option<String>) -> Option<TeacherFetch> {
        let teacher_id = teacher_id.filter(|id| !id.is_empty());
        if let Some(previous) = self.teacher_cancel.take() {
            previous.cancel();
        }
        self.selected = teacher_id.clone();

        let Some(token) = self.token.clone() else {
            return None;
        };
        let Some(teacher_id) = teacher_id else {
            self.weekly = None;
            self.details = None;
            self.teacher_phase = TeacherPhase::Idle;
            return None;
        };

        let cancel = CancelFlag::default();
        self.teacher_cancel = Some(cancel.clone());
        self.teacher_phase = TeacherPhase::Loading;
        // The summary banner belongs to the summary cycle.
        if self.error.as_deref() == Some(TEACHER_FAILED) {
            self.error = None;
        }
        Some(TeacherFetch {
            token,
            teacher_id,
            cancel,
        })
    }

    pub fn apply_teacher(
        &mut self,
        fetch: TeacherFetch,
        result: ApiResult<(Vec<WeeklyPoint>, DetailBreakdown)>,
    ) -> bool {
        if fetch.cancel.is_cancelled() {
            log::warn!("discarding superseded data for teacher {}", fetch.teacher_id);
            return false;
        }
        self.teacher_cancel = None;

        match result {
            Ok((weekly, details)) => {
                log::info!(
                    "teacher {} loaded with {} weeks",
                    fetch.teacher_id,
                    weekly.len()
                );
                self.weekly = Some(weekly);
                self.details = Some(details);
                self.teacher_phase = TeacherPhase::Ready;
            }
            Err(ApiError::Unauthorized) => self.expire_session(),
            Err(err) => {
                log::warn!("teacher {} fetch failed: {err}", fetch.teacher_id);
                self.error = Some(TEACHER_FAILED.to_string());
                self.teacher_phase = TeacherPhase::Idle;
            }
        }
        true
    }

    /// Validates the sign-in form. On success the dashboard is marked as
    /// signing in and the trimmed credentials are returned.
    pub fn begin_login(&mut self, email: &str, password: &str) -> Option<Credentials> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            self.auth_error = Some(login_message(&LoginError::Validation).to_string());
            return None;
        }
        self.auth_loading = true;
        self.auth_error = None;
        Some(Credentials {
            email: email.to_string(),
            password: password.to_string(),
        })
    }

    pub fn apply_login(&mut self, result: Result<LoginResponse, LoginError>) -> bool {
        self.auth_loading = false;
        match result {
            Ok(body) => {
                self.session.save(&body.token, body.user.as_ref());
                self.user = body.user;
                self.selected = None;
                self.teachers.clear();
                self.weekly = None;
                self.details = None;
                self.error = None;
                self.enter_session(body.token);
                true
            }
            Err(err) => {
                log::warn!("sign-in failed: {err}");
                self.auth_error = Some(login_message(&err).to_string());
                false
            }
        }
    }

    pub fn sign_out(&mut self) {
        self.end_session();
        self.error = None;
        log::info!("signed out");
    }

    fn enter_session(&mut self, token: String) {
        self.cancel_in_flight();
        self.token = Some(token);
        self.teacher_phase = TeacherPhase::Idle;
        self.phase = Phase::SummaryLoading;
    }

    fn expire_session(&mut self) {
        log::info!("session rejected by server");
        self.end_session();
        self.error = Some(SESSION_EXPIRED.to_string());
    }

    fn end_session(&mut self) {
        self.cancel_in_flight();
        self.session.clear();
        self.token = None;
        self.user = None;
        self.phase = Phase::Unauthenticated;
        self.teacher_phase = TeacherPhase::Idle;
        self.teachers.clear();
        self.selected = None;
        self.weekly = None;
        self.details = None;
    }

    fn cancel_in_flight(&mut self) {
        for flag in [self.summary_cancel.take(), self.teacher_cancel.take()]
            .into_iter()
            .flatten()
        {
            flag.cancel();
        }
    }
}

pub fn login_message(err: &LoginError) -> &'static str {
    match err {
        LoginError::Validation => MISSING_CREDENTIALS,
        LoginError::InvalidCredentials => INVALID_CREDENTIALS,
        LoginError::Failed { .. } | LoginError::Decode(_) => SIGN_IN_FAILED,
        LoginError::Unreachable(_) => SERVER_UNREACHABLE,
    }
}

/// Runs the sign-in flow. No request is issued when the form is incomplete.
pub async fn login<S, A>(dashboard: &mut Dashboard<S>, api: &A, email: &str, password: &str) -> bool
where
    S: KeyValueStorage,
    A: TeacherApi,
{
    let Some(credentials) = dashboard.begin_login(email, password) else {
        return false;
    };
    let result = api.login(&credentials.email, &credentials.password).await;
    dashboard.apply_login(result)
}

pub async fn refresh_summary<S, A>(dashboard: &mut Dashboard<S>, api: &A) -> bool
where
    S: KeyValueStorage,
    A: TeacherApi,
{
    let Some(fetch) = dashboard.begin_summary() else {
        return false;
    };
    let result = api.teachers_summary(&fetch.token).await;
    dashboard.apply_summary(fetch, result)
}

/// Selects `teacher_id` and loads its weekly series and breakdown together.
pub async fn load_teacher<S, A>(
    dashboard: &mut Dashboard<S>,
    api: &A,
    teacher_id: Option<String>,
) -> bool
where
    S: KeyValueStorage,
    A: TeacherApi,
{
    let Some(fetch) = dashboard.select_teacher(teacher_id) else {
        return false;
    };
    let result = tokio::try_join!(
        api.teacher_weekly(&fetch.token, &fetch.teacher_id),
        api.teacher_details(&fetch.token, &fetch.teacher_id),
    );
    dashboard.apply_teacher(fetch, result)
}
