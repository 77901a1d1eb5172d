//! In-memory gateway double shared by the unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::action::{Action, MutationResult};
use crate::domain::{FieldValue, StudentRecord};
use crate::ports::{PortResult, StudentGateway};

/// Records every write and answers reads from a fixed roster result.
pub(crate) struct RecordingGateway {
    roster: Mutex<PortResult<Vec<StudentRecord>>>,
    fetches: AtomicUsize,
    actions: Mutex<Vec<Action>>,
    fail_name: Option<String>,
    rejections: Mutex<HashMap<&'static str, String>>,
    fields: Mutex<BTreeMap<String, FieldValue>>,
}

impl RecordingGateway {
    pub(crate) fn new() -> Self {
        Self::with_roster(Ok(Vec::new()))
    }

    pub(crate) fn with_roster(roster: PortResult<Vec<StudentRecord>>) -> Self {
        Self {
            roster: Mutex::new(roster),
            fetches: AtomicUsize::new(0),
            actions: Mutex::new(Vec::new()),
            fail_name: None,
            rejections: Mutex::new(HashMap::new()),
            fields: Mutex::new(BTreeMap::new()),
        }
    }

    /// Rejects student writes whose name equals `name`.
    pub(crate) fn failing_on(name: &str) -> Self {
        Self {
            fail_name: Some(name.to_string()),
            ..Self::new()
        }
    }

    /// Rejects every action with this tag.
    pub(crate) fn reject(&self, action: &'static str, message: &str) {
        self.rejections
            .lock()
            .unwrap()
            .insert(action, message.to_string());
    }

    /// Adds a text field to every successful write result.
    pub(crate) fn respond_with(&self, key: &str, value: &str) {
        self.fields
            .lock()
            .unwrap()
            .insert(key.to_string(), FieldValue::Text(value.to_string()));
    }

    pub(crate) fn set_roster(&self, roster: PortResult<Vec<StudentRecord>>) {
        *self.roster.lock().unwrap() = roster;
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    pub(crate) fn action_names(&self) -> Vec<&'static str> {
        self.actions().iter().map(Action::name).collect()
    }
}

#[async_trait]
impl StudentGateway for RecordingGateway {
    async fn fetch_all(&self) -> PortResult<Vec<StudentRecord>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.roster.lock().unwrap().clone()
    }

    async fn mutate(&self, action: Action) -> MutationResult {
        self.actions.lock().unwrap().push(action.clone());

        if let Some(message) = self.rejections.lock().unwrap().get(action.name()) {
            return MutationResult::failed(message.clone());
        }
        if let (Some(fail), Action::AddStudent(p) | Action::UpdateStudent(p)) =
            (&self.fail_name, &action)
        {
            if p.name.as_deref() == Some(fail.as_str()) {
                return MutationResult::failed("rejected");
            }
        }
        MutationResult {
            success: true,
            error: None,
            fields: self.fields.lock().unwrap().clone(),
        }
    }
}
