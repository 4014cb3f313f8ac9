use std::fmt;

use shared::domain::{Activity, ActivityId};
use tracing::debug;

use crate::{error::FormError, store::ActivityStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityField {
    Title,
    Description,
    Category,
    Date,
    City,
    Venue,
}

impl ActivityField {
    pub const REQUIRED: [ActivityField; 6] = [
        ActivityField::Title,
        ActivityField::Description,
        ActivityField::Category,
        ActivityField::Date,
        ActivityField::City,
        ActivityField::Venue,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ActivityField::Title => "title",
            ActivityField::Description => "description",
            ActivityField::Category => "category",
            ActivityField::Date => "date",
            ActivityField::City => "city",
            ActivityField::Venue => "venue",
        }
    }
}

impl fmt::Display for ActivityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitKind {
    Created,
    Edited,
}

/// Local draft of one activity. Nothing reaches the store until `submit`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityForm {
    draft: Activity,
}

impl ActivityForm {
    pub fn new(initial: Option<Activity>) -> Self {
        Self {
            draft: initial.unwrap_or_default(),
        }
    }

    pub fn draft(&self) -> &Activity {
        &self.draft
    }

    pub fn is_new(&self) -> bool {
        self.draft.id.is_empty()
    }

    pub fn get(&self, field: ActivityField) -> &str {
        match field {
            ActivityField::Title => &self.draft.title,
            ActivityField::Description => &self.draft.description,
            ActivityField::Category => &self.draft.category,
            ActivityField::Date => &self.draft.date,
            ActivityField::City => &self.draft.city,
            ActivityField::Venue => &self.draft.venue,
        }
    }

    pub fn set(&mut self, field: ActivityField, value: impl Into<String>) {
        let value = value.into();
        match field {
            ActivityField::Title => self.draft.title = value,
            ActivityField::Description => self.draft.description = value,
            ActivityField::Category => self.draft.category = value,
            ActivityField::Date => self.draft.date = value,
            ActivityField::City => self.draft.city = value,
            ActivityField::Venue => self.draft.venue = value,
        }
    }

    pub fn validate(&self) -> Result<(), FormError> {
        let missing: Vec<ActivityField> = ActivityField::REQUIRED
            .into_iter()
            .filter(|field| self.get(*field).trim().is_empty())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(FormError::Validation(missing))
        }
    }

    /// Creates the draft under a fresh id when it has none, otherwise edits
    /// the stored entry. Returns the id the store was asked to write.
    pub async fn submit(
        &self,
        store: &ActivityStore,
    ) -> Result<(ActivityId, SubmitKind), FormError> {
        self.validate()?;

        if self.is_new() {
            let activity = Activity {
                id: ActivityId::generate(),
                ..self.draft.clone()
            };
            let id = activity.id.clone();
            debug!(activity_id = %id, "form: submitting new activity");
            store.create(activity).await?;
            Ok((id, SubmitKind::Created))
        } else {
            let id = self.draft.id.clone();
            debug!(activity_id = %id, "form: submitting edited activity");
            store.edit(self.draft.clone()).await?;
            Ok((id, SubmitKind::Edited))
        }
    }

    pub fn cancel(&self, store: &ActivityStore) {
        store.cancel_form_open();
    }
}

#[cfg(test)]
#[path = "tests/form_tests.rs"]
mod tests;
