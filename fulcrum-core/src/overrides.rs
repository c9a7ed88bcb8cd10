// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Override store and value resolver
//!
//! Holds the baseline artifacts of the source run together with the user's
//! edits. Resolution order is override, then baseline, then an empty value
//! of the field's shape.
//!
//! The replay cursor is enforced here rather than left to the caller:
//! writes to a field whose stage is upstream of the cursor are rejected.
//! Moving the cursor forward can still leave earlier edits in the store;
//! those are kept (moving the cursor back revives them) but never leave
//! through [`OverrideStore::effective_overrides`].

use crate::artifacts::{ReplayOverrides, StageArtifacts, StageValue};
use crate::error::OverrideError;
use crate::stage::{ReplayCursor, StageField};
use tracing::debug;

/// A field's current value, tagged with whether the cursor allows editing it.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldAccess {
    Locked(StageValue),
    Editable(StageValue),
}

impl FieldAccess {
    pub fn is_locked(&self) -> bool {
        matches!(self, FieldAccess::Locked(_))
    }

    pub fn value(&self) -> &StageValue {
        match self {
            FieldAccess::Locked(v) | FieldAccess::Editable(v) => v,
        }
    }

    pub fn into_value(self) -> StageValue {
        match self {
            FieldAccess::Locked(v) | FieldAccess::Editable(v) => v,
        }
    }
}

/// Outcome of editing a structured field from raw JSON text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonEdit {
    Applied,
    /// Malformed or wrongly shaped JSON; the previous override is untouched.
    Rejected,
}

#[derive(Debug, Clone, Default)]
pub struct OverrideStore {
    baseline: StageArtifacts,
    overrides: ReplayOverrides,
    cursor: ReplayCursor,
}

impl OverrideStore {
    pub fn new(baseline: StageArtifacts) -> Self {
        Self {
            baseline,
            overrides: ReplayOverrides::default(),
            cursor: ReplayCursor::FIRST,
        }
    }

    pub fn baseline(&self) -> &StageArtifacts {
        &self.baseline
    }

    /// Replace the baseline. Existing edits are kept.
    pub fn set_baseline(&mut self, baseline: StageArtifacts) {
        self.baseline = baseline;
    }

    pub fn cursor(&self) -> ReplayCursor {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: ReplayCursor) {
        self.cursor = cursor;
    }

    pub fn is_locked(&self, field: StageField) -> bool {
        self.cursor.locks(field.stage())
    }

    /// Override if present, else baseline, else an empty value.
    pub fn current_value(&self, field: StageField) -> StageValue {
        self.overrides
            .get(field)
            .or_else(|| self.baseline.get(field))
            .unwrap_or_else(|| StageValue::empty(field.kind()))
    }

    pub fn access(&self, field: StageField) -> FieldAccess {
        let value = self.current_value(field);
        if self.is_locked(field) {
            FieldAccess::Locked(value)
        } else {
            FieldAccess::Editable(value)
        }
    }

    fn check_writable(&self, field: StageField) -> Result<(), OverrideError> {
        if !field.is_overridable() {
            return Err(OverrideError::NotOverridable(field));
        }
        if self.is_locked(field) {
            return Err(OverrideError::Locked {
                field,
                stage: field.stage(),
            });
        }
        Ok(())
    }

    pub fn set_override(&mut self, field: StageField, value: StageValue) -> Result<(), OverrideError> {
        self.check_writable(field)?;
        if value.kind() != field.kind() {
            return Err(OverrideError::ShapeMismatch(field));
        }
        self.overrides
            .insert(field, value)
            .map_err(|_| OverrideError::ShapeMismatch(field))
    }

    /// Parse `text` as JSON and store it as the override for a structured field.
    ///
    /// Locked and non-overridable fields are refused before the text is
    /// looked at. Malformed input is then dropped without touching the store.
    pub fn edit_json(&mut self, field: StageField, text: &str) -> Result<JsonEdit, OverrideError> {
        self.check_writable(field)?;

        let parsed = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                debug!(field = %field, error = %e, "Ignoring malformed JSON edit");
                return Ok(JsonEdit::Rejected);
            }
        };

        let Some(value) = StageValue::from_json(field.kind(), parsed) else {
            debug!(field = %field, "Ignoring JSON edit with wrong shape");
            return Ok(JsonEdit::Rejected);
        };

        self.set_override(field, value)?;
        Ok(JsonEdit::Applied)
    }

    pub fn clear_override(&mut self, field: StageField) {
        self.overrides.remove(field);
    }

    /// Drop every edit.
    pub fn reset(&mut self) {
        self.overrides = ReplayOverrides::default();
    }

    pub fn has_override(&self, field: StageField) -> bool {
        self.overrides.contains(field)
    }

    /// Everything held in the store, including edits upstream of the cursor.
    pub fn raw_overrides(&self) -> &ReplayOverrides {
        &self.overrides
    }

    /// Overrides to send with a replay: only fields at or after the cursor.
    pub fn effective_overrides(&self) -> ReplayOverrides {
        let mut effective = self.overrides.clone();
        for field in crate::stage::STAGE_FIELDS {
            if self.is_locked(field) {
                effective.remove(field);
            }
        }
        effective
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{FieldKind, STAGE_FIELDS};
    use proptest::prelude::*;
    use serde_json::json;

    fn baseline() -> StageArtifacts {
        serde_json::from_value(json!({
            "user_question": "What is Q3 forecast?",
            "retrieved_sources": [{"title": "Pipeline report", "score": 0.91}],
            "kpi_summary": {"pipeline_usd": 1200000},
            "prompt_packet": "SYSTEM: forecast\nUSER: What is Q3 forecast?",
            "llm_response": "Q3 looks strong."
        }))
        .unwrap()
    }

    fn cursor(i: u8) -> ReplayCursor {
        ReplayCursor::new(i).unwrap()
    }

    #[test]
    fn override_takes_precedence_over_baseline() {
        let mut store = OverrideStore::new(baseline());
        assert_eq!(
            store.current_value(StageField::UserQuestion),
            StageValue::Text("What is Q3 forecast?".into())
        );

        store
            .set_override(StageField::UserQuestion, "What is Q4 forecast?".into())
            .unwrap();
        assert_eq!(
            store.current_value(StageField::UserQuestion),
            StageValue::Text("What is Q4 forecast?".into())
        );
    }

    #[test]
    fn missing_fields_resolve_to_empty_values() {
        let store = OverrideStore::default();
        assert_eq!(
            store.current_value(StageField::PromptPacket),
            StageValue::Text(String::new())
        );
        assert_eq!(
            store.current_value(StageField::RetrievedSources),
            StageValue::List(vec![])
        );
        assert!(store.current_value(StageField::ParseError).is_empty());
    }

    #[test]
    fn writes_upstream_of_cursor_are_rejected() {
        let mut store = OverrideStore::new(baseline());
        store.set_cursor(cursor(3));

        let err = store
            .set_override(StageField::UserQuestion, "edited".into())
            .unwrap_err();
        assert!(matches!(err, OverrideError::Locked { field: StageField::UserQuestion, .. }));
        assert!(!store.has_override(StageField::UserQuestion));

        store
            .set_override(StageField::PromptPacket, "edited prompt".into())
            .unwrap();
        assert!(store.has_override(StageField::PromptPacket));
    }

    #[test]
    fn parsed_outputs_are_not_overridable() {
        let mut store = OverrideStore::new(baseline());
        let err = store
            .set_override(StageField::ParsedForecast, StageValue::List(vec![]))
            .unwrap_err();
        assert_eq!(err, OverrideError::NotOverridable(StageField::ParsedForecast));
    }

    #[test]
    fn stale_edits_are_kept_but_not_sent() {
        let mut store = OverrideStore::new(baseline());
        store
            .set_override(StageField::UserQuestion, "stale question".into())
            .unwrap();
        store.set_cursor(cursor(3));
        store
            .set_override(StageField::PromptPacket, "new prompt".into())
            .unwrap();

        assert!(store.raw_overrides().user_question.is_some());
        let sent = store.effective_overrides();
        assert_eq!(sent.user_question, None);
        assert_eq!(sent.prompt_packet.as_deref(), Some("new prompt"));

        store.set_cursor(ReplayCursor::FIRST);
        assert_eq!(
            store.effective_overrides().user_question.as_deref(),
            Some("stale question")
        );
    }

    #[test]
    fn malformed_json_leaves_override_unset() {
        let mut store = OverrideStore::new(baseline());
        let outcome = store
            .edit_json(StageField::RetrievedSources, "[{\"title\": ")
            .unwrap();
        assert_eq!(outcome, JsonEdit::Rejected);
        assert!(!store.has_override(StageField::RetrievedSources));

        let outcome = store
            .edit_json(StageField::KpiSummary, "[1, 2, 3]")
            .unwrap();
        assert_eq!(outcome, JsonEdit::Rejected);
        assert!(!store.has_override(StageField::KpiSummary));
    }

    #[test]
    fn malformed_json_keeps_previous_override() {
        let mut store = OverrideStore::new(baseline());
        store
            .edit_json(StageField::KpiSummary, r#"{"pipeline_usd": 900000}"#)
            .unwrap();
        store.edit_json(StageField::KpiSummary, "{oops").unwrap();
        assert_eq!(
            store.current_value(StageField::KpiSummary),
            StageValue::from_json(FieldKind::Object, json!({"pipeline_usd": 900000})).unwrap()
        );
    }

    #[test]
    fn locked_field_refuses_json_regardless_of_content() {
        let mut store = OverrideStore::new(baseline());
        store.set_cursor(cursor(3));

        for text in ["{oops", r#"{"pipeline_usd": 1}"#] {
            let err = store.edit_json(StageField::KpiSummary, text).unwrap_err();
            assert!(matches!(err, OverrideError::Locked { field: StageField::KpiSummary, .. }));
        }
        let err = store
            .edit_json(StageField::ParseError, "not json")
            .unwrap_err();
        assert_eq!(err, OverrideError::NotOverridable(StageField::ParseError));
    }

    #[test]
    fn access_reports_lock_state() {
        let mut store = OverrideStore::new(baseline());
        store.set_cursor(cursor(2));
        assert!(store.access(StageField::RetrievedSources).is_locked());
        let kpi = store.access(StageField::KpiSummary);
        assert!(!kpi.is_locked());
        assert_eq!(
            kpi.into_value(),
            StageValue::from_json(FieldKind::Object, json!({"pipeline_usd": 1200000})).unwrap()
        );
    }

    proptest! {
        #[test]
        fn resolver_prefers_override(index in 0usize..STAGE_FIELDS.len(), text in ".{0,24}") {
            let field = STAGE_FIELDS[index];
            prop_assume!(field.kind() == FieldKind::Text);

            let mut store = OverrideStore::new(baseline());
            store.set_override(field, StageValue::Text(text.clone())).unwrap();
            prop_assert_eq!(store.current_value(field), StageValue::Text(text));
        }

        #[test]
        fn lock_matches_cursor(c in 0u8..6, index in 0usize..STAGE_FIELDS.len()) {
            let field = STAGE_FIELDS[index];
            let mut store = OverrideStore::new(baseline());
            store.set_cursor(cursor(c));
            prop_assert_eq!(store.access(field).is_locked(), field.stage().index() < c as usize);
        }
    }
}
