use super::command::{BulkDeleteFields, EventFields, Intent, StructuredCommand};
use super::resolver::EventResolver;
use super::result::{ExecutionResult, Status};
use crate::components::google_calendar::time::describe_event;
use crate::components::google_calendar::{
    CalendarEvent, CalendarProvider, EventDateTime, EventPayload, EventQuery,
};
use crate::error::{AgentResult, Error};
use crate::utils::time::{format_for_display, parse_timestamp, shift_timestamp};
use chrono::{DateTime, Duration, FixedOffset};
use chrono_tz::Tz;
use serde_json::json;
use tracing::{debug, info, warn};

/// Upcoming events returned by a listing
pub const LIST_LIMIT: u32 = 10;
/// Upper bound of events removed by one bulk delete
pub const BULK_DELETE_LIMIT: u32 = 250;

/// Whether mutations are only previewed or actually performed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    DryRun,
    Execute,
}

impl ExecutionMode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run {
            ExecutionMode::DryRun
        } else {
            ExecutionMode::Execute
        }
    }
}

/// Lifecycle of one command inside one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    PendingValidation,
    ConfirmationRequired,
    Executing,
    Success,
    Failed,
}

impl ExecutionState {
    fn terminal_for(status: Status) -> Self {
        match status {
            Status::Success => ExecutionState::Success,
            Status::Error => ExecutionState::Failed,
            Status::ConfirmationRequired => ExecutionState::ConfirmationRequired,
        }
    }
}

fn enter(state: &mut ExecutionState, next: ExecutionState) {
    debug!("Execution state {:?} -> {:?}", state, next);
    *state = next;
}

/// Runs structured commands against a calendar session
pub struct CommandExecutor {
    resolver: EventResolver,
    tz: Tz,
    locale: String,
}

impl CommandExecutor {
    pub fn new(resolver: EventResolver, tz: Tz, locale: &str) -> Self {
        Self {
            resolver,
            tz,
            locale: locale.to_string(),
        }
    }

    /// Execute or preview a command. Never fails: errors become error results.
    pub async fn execute(
        &self,
        command: &StructuredCommand,
        provider: &dyn CalendarProvider,
        mode: ExecutionMode,
        now: &DateTime<FixedOffset>,
    ) -> ExecutionResult {
        let mut state = ExecutionState::PendingValidation;
        debug!("Executing {} ({:?})", command.intent, mode);

        let result = match self.run(command, provider, mode, now, &mut state).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Command {} failed: {}", command.intent, e);
                self.error_result(&e)
            }
        };

        enter(&mut state, ExecutionState::terminal_for(result.status));
        result.with_intent(command.intent.clone())
    }

    async fn run(
        &self,
        command: &StructuredCommand,
        provider: &dyn CalendarProvider,
        mode: ExecutionMode,
        now: &DateTime<FixedOffset>,
        state: &mut ExecutionState,
    ) -> AgentResult<ExecutionResult> {
        match &command.intent {
            Intent::Error | Intent::Unknown | Intent::Unsupported(_) => Ok(self.refusal(command)),
            Intent::CreateEvent => self.create(command, provider, mode, state).await,
            Intent::DeleteEvent => match command.bulk_delete() {
                Some(bulk) => self.delete_all(bulk, provider, mode, state).await,
                None => self.delete_one(command, provider, mode, now, state).await,
            },
            Intent::UpdateEvent => self.update(command, provider, mode, now, state).await,
            Intent::ListEvents => self.list(command, provider, now, state).await,
        }
    }

    /// Result for a command that cannot touch the calendar at all
    pub fn refuse(&self, command: &StructuredCommand) -> ExecutionResult {
        self.refusal(command).with_intent(command.intent.clone())
    }

    fn refusal(&self, command: &StructuredCommand) -> ExecutionResult {
        let locale = self.locale.as_str();
        match &command.intent {
            Intent::Unsupported(name) => {
                ExecutionResult::error(t!("not_implemented", locale = locale, intent = name))
            }
            Intent::Error => ExecutionResult::error(
                command
                    .message
                    .clone()
                    .unwrap_or_else(|| t!("not_understood", locale = locale).to_string()),
            ),
            _ => ExecutionResult::error(t!("not_understood", locale = locale)),
        }
    }

    /// Map an error that escaped a provider or ranker call to a result
    pub fn error_result(&self, err: &Error) -> ExecutionResult {
        let locale = self.locale.as_str();
        match err {
            Error::InvalidCredential(_) => ExecutionResult::error(t!("reauth", locale = locale)),
            Error::LanguageModel(_) => ExecutionResult::error(t!(
                "interpretation_error",
                locale = locale,
                error = err.to_string()
            )),
            _ => ExecutionResult::error(t!("calendar_error", locale = locale, error = err.to_string())),
        }
    }

    /// Prefix simulated outcomes so they are never mistaken for real changes
    fn label(&self, provider: &dyn CalendarProvider, message: String) -> String {
        if provider.is_simulated() {
            format!("{} {}", t!("simulation_label", locale = self.locale.as_str()), message)
        } else {
            message
        }
    }

    fn display(&self, value: Option<&str>) -> String {
        value
            .map(|v| format_for_display(v, &self.tz))
            .unwrap_or_default()
    }

    fn describe(&self, event: &CalendarEvent) -> String {
        describe_event(event, &self.tz)
    }

    async fn create(
        &self,
        command: &StructuredCommand,
        provider: &dyn CalendarProvider,
        mode: ExecutionMode,
        state: &mut ExecutionState,
    ) -> AgentResult<ExecutionResult> {
        let locale = self.locale.as_str();
        let Some(payload) = command.event_fields().and_then(EventFields::to_new_event) else {
            return Ok(ExecutionResult::error(t!("missing_fields", locale = locale)));
        };

        let summary = payload.summary.clone().unwrap_or_default();
        let start = self.display(payload.start.as_ref().and_then(|s| s.instant()));
        let end = self.display(payload.end.as_ref().and_then(|e| e.instant()));

        if mode == ExecutionMode::DryRun {
            enter(state, ExecutionState::ConfirmationRequired);
            return Ok(ExecutionResult::confirmation(t!(
                "confirm_create",
                locale = locale,
                summary = summary,
                start = start,
                end = end
            ))
            .with_data(serde_json::to_value(&payload)?));
        }

        enter(state, ExecutionState::Executing);
        let event = provider.insert(&payload).await?;
        info!("Created event {}", event.id);

        let message = match &event.html_link {
            Some(link) => t!("created_link", locale = locale, event = self.describe(&event), link = link),
            None => t!("created", locale = locale, event = self.describe(&event)),
        };
        Ok(ExecutionResult::success(self.label(provider, message.to_string()))
            .with_data(serde_json::to_value(&event)?))
    }

    async fn delete_all(
        &self,
        bulk: &BulkDeleteFields,
        provider: &dyn CalendarProvider,
        mode: ExecutionMode,
        state: &mut ExecutionState,
    ) -> AgentResult<ExecutionResult> {
        let locale = self.locale.as_str();
        // Always read the window fresh, a preview may be stale by now
        let query = EventQuery::window(&bulk.time_min, &bulk.time_max, BULK_DELETE_LIMIT);
        let events = provider.list(&query).await?;
        info!(
            "Found {} events between {} and {}",
            events.len(),
            bulk.time_min,
            bulk.time_max
        );

        if events.is_empty() {
            return Ok(ExecutionResult::error(t!(
                "nothing_to_delete",
                locale = locale,
                from = bulk.time_min.as_str(),
                to = bulk.time_max.as_str()
            )));
        }

        if mode == ExecutionMode::DryRun {
            enter(state, ExecutionState::ConfirmationRequired);
            return Ok(ExecutionResult::confirmation(t!(
                "confirm_delete_all",
                locale = locale,
                count = events.len(),
                from = bulk.time_min.as_str(),
                to = bulk.time_max.as_str()
            ))
            .with_count(events.len())
            .with_data(serde_json::to_value(&events)?));
        }

        enter(state, ExecutionState::Executing);
        let mut deleted = 0;
        for event in &events {
            match provider.delete(&event.id).await {
                Ok(()) => deleted += 1,
                Err(e) => warn!("Failed to delete event {}: {}", event.id, e),
            }
        }
        info!("Deleted {} of {} events", deleted, events.len());

        let message = t!("deleted_all", locale = locale, count = deleted);
        Ok(ExecutionResult::success(self.label(provider, message.to_string())).with_count(deleted))
    }

    async fn delete_one(
        &self,
        command: &StructuredCommand,
        provider: &dyn CalendarProvider,
        mode: ExecutionMode,
        now: &DateTime<FixedOffset>,
        state: &mut ExecutionState,
    ) -> AgentResult<ExecutionResult> {
        let locale = self.locale.as_str();
        let target = self
            .resolver
            .resolve(provider, command.summary(), command.target.time_min.as_deref(), now)
            .await?;
        let Some(event) = target else {
            return Ok(ExecutionResult::error(t!("not_found", locale = locale)));
        };

        if mode == ExecutionMode::DryRun {
            enter(state, ExecutionState::ConfirmationRequired);
            return Ok(ExecutionResult::confirmation(t!(
                "confirm_delete",
                locale = locale,
                event = self.describe(&event)
            ))
            .with_data(serde_json::to_value(&event)?));
        }

        enter(state, ExecutionState::Executing);
        provider.delete(&event.id).await?;
        info!("Deleted event {}", event.id);

        let message = t!("deleted", locale = locale, event = self.describe(&event));
        Ok(ExecutionResult::success(self.label(provider, message.to_string()))
            .with_data(serde_json::to_value(&event)?))
    }

    async fn update(
        &self,
        command: &StructuredCommand,
        provider: &dyn CalendarProvider,
        mode: ExecutionMode,
        now: &DateTime<FixedOffset>,
        state: &mut ExecutionState,
    ) -> AgentResult<ExecutionResult> {
        let locale = self.locale.as_str();
        let Some(changes) = command.event_fields().filter(|f| !f.is_empty()) else {
            return Ok(ExecutionResult::error(t!("nothing_to_update", locale = locale)));
        };

        let target = self
            .resolver
            .resolve(
                provider,
                command.target.summary.as_deref(),
                command.target.time_min.as_deref(),
                now,
            )
            .await?;
        let Some(existing) = target else {
            return Ok(ExecutionResult::error(t!("not_found", locale = locale)));
        };

        let patch = merge_update(&existing, changes, &self.tz);

        if mode == ExecutionMode::DryRun {
            enter(state, ExecutionState::ConfirmationRequired);
            return Ok(ExecutionResult::confirmation(t!(
                "confirm_update",
                locale = locale,
                event = self.describe(&existing)
            ))
            .with_data(json!({ "target": existing, "changes": patch })));
        }

        enter(state, ExecutionState::Executing);
        let updated = provider.patch(&existing.id, &patch).await?;
        info!("Updated event {}", updated.id);

        let message = t!("updated", locale = locale, event = self.describe(&updated));
        Ok(ExecutionResult::success(self.label(provider, message.to_string()))
            .with_data(serde_json::to_value(&updated)?))
    }

    async fn list(
        &self,
        command: &StructuredCommand,
        provider: &dyn CalendarProvider,
        now: &DateTime<FixedOffset>,
        state: &mut ExecutionState,
    ) -> AgentResult<ExecutionResult> {
        enter(state, ExecutionState::Executing);
        let time_min = command
            .target
            .time_min
            .clone()
            .unwrap_or_else(|| now.to_rfc3339());
        let events = provider.list(&EventQuery::upcoming(time_min, LIST_LIMIT)).await?;

        let message = t!("listed", locale = self.locale.as_str(), count = events.len());
        Ok(ExecutionResult::success(message)
            .with_count(events.len())
            .with_data(serde_json::to_value(&events)?))
    }
}

/// Patch for an update: the existing event with every new field laid over it.
///
/// A new start without a new end keeps the event's length.
pub fn merge_update(existing: &CalendarEvent, changes: &EventFields, tz: &Tz) -> EventPayload {
    let has_time = |value: &EventDateTime| value.instant().is_some();
    let moved_end = match (&changes.start, &changes.end) {
        (Some(start), None) => keep_duration(existing, start, tz),
        _ => None,
    };
    EventPayload {
        summary: changes.summary.clone().or_else(|| existing.summary.clone()),
        description: changes
            .description
            .clone()
            .or_else(|| existing.description.clone()),
        location: changes.location.clone().or_else(|| existing.location.clone()),
        start: changes
            .start
            .clone()
            .or_else(|| Some(existing.start.clone()).filter(has_time)),
        end: changes
            .end
            .clone()
            .or(moved_end)
            .or_else(|| Some(existing.end.clone()).filter(has_time)),
    }
}

/// End for `start` that keeps the length of `existing`, one hour if it has none
fn keep_duration(existing: &CalendarEvent, start: &EventDateTime, tz: &Tz) -> Option<EventDateTime> {
    let parse = |value: &EventDateTime| value.date_time.as_deref().and_then(|v| parse_timestamp(v, tz));
    let length = match (parse(&existing.start), parse(&existing.end)) {
        (Some(from), Some(to)) if to > from => to - from,
        _ => Duration::hours(1),
    };
    let end = shift_timestamp(start.date_time.as_deref()?, length)?;
    Some(EventDateTime::at(end, start.time_zone.clone()))
}
