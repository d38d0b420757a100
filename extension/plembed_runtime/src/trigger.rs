//! Trigger events and the handler naming scheme.

use std::sync::Arc;

use getset::{CopyGetters, Getters};
use log::debug;
use plembed_diagnostic::{ErrorRecord, SqlState};
use strum_macros::EnumIter;

use crate::{
    cache::{CallCache, Resolved},
    datum::{Datum, Row},
    descriptor::TypeDescriptor,
    exception::ExceptionKind,
    host::Host,
    interpreter::Interpreter,
    live::{Anchor, LiveObject},
    runtime::Runtime,
};

/// When a trigger fires relative to its event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[allow(missing_docs)]
pub enum Timing {
    Before,
    After,
}

/// What a trigger fires for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[allow(missing_docs)]
pub enum Level {
    Row,
    Statement,
}

/// The data manipulation that fired a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[allow(missing_docs)]
pub enum Manipulation {
    Insert,
    Update,
    Delete,
    Truncate,
}

/// A fully classified trigger event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_new::new)]
#[allow(missing_docs)]
pub struct TriggerEvent {
    pub timing: Timing,
    pub level: Level,
    pub manipulation: Manipulation,
}

impl TriggerEvent {
    /// The module attribute that handles this event, one of sixteen.
    #[must_use]
    pub const fn handler_name(self) -> &'static str {
        use Level::{Row, Statement};
        use Manipulation::{Delete, Insert, Truncate, Update};
        use Timing::{After, Before};

        match (self.timing, self.manipulation, self.level) {
            (Before, Insert, Row) => "before_insert",
            (Before, Update, Row) => "before_update",
            (Before, Delete, Row) => "before_delete",
            (Before, Truncate, Row) => "before_truncate",
            (After, Insert, Row) => "after_insert",
            (After, Update, Row) => "after_update",
            (After, Delete, Row) => "after_delete",
            (After, Truncate, Row) => "after_truncate",
            (Before, Insert, Statement) => "before_insert_statement",
            (Before, Update, Statement) => "before_update_statement",
            (Before, Delete, Statement) => "before_delete_statement",
            (Before, Truncate, Statement) => "before_truncate_statement",
            (After, Insert, Statement) => "after_insert_statement",
            (After, Update, Statement) => "after_update_statement",
            (After, Delete, Statement) => "after_delete_statement",
            (After, Truncate, Statement) => "after_truncate_statement",
        }
    }
}

/// What the host passes to a trigger procedure.
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct TriggerData {
    /// Name of the trigger.
    #[get = "pub"]
    name: String,

    /// The row type of the table the trigger is defined on.
    #[get = "pub"]
    relation: Arc<TypeDescriptor>,

    /// The firing event.
    #[get_copy = "pub"]
    event: TriggerEvent,

    /// The row before the change, for updates and deletes.
    #[get = "pub"]
    old_row: Option<Row>,

    /// The row after the change, for inserts and updates.
    #[get = "pub"]
    new_row: Option<Row>,

    /// Arguments from the trigger definition.
    #[get = "pub"]
    arguments: Vec<String>,
}

impl TriggerData {
    /// Creates trigger data without rows or arguments.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        relation: Arc<TypeDescriptor>,
        event: TriggerEvent,
    ) -> Self {
        Self {
            name: name.into(),
            relation,
            event,
            old_row: None,
            new_row: None,
            arguments: Vec::new(),
        }
    }

    /// Sets the row before the change.
    #[must_use]
    pub fn with_old(mut self, row: Row) -> Self {
        self.old_row = Some(row);
        self
    }

    /// Sets the row after the change.
    #[must_use]
    pub fn with_new(mut self, row: Row) -> Self {
        self.new_row = Some(row);
        self
    }

    /// Returns the trigger definition without the event's rows.
    #[must_use]
    pub fn definition(&self) -> Self {
        Self { old_row: None, new_row: None, ..self.clone() }
    }

    /// Sets the definition arguments.
    #[must_use]
    pub fn with_arguments(mut self, arguments: Vec<String>) -> Self {
        self.arguments = arguments;
        self
    }
}

/// What the host should do after a trigger procedure returned.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    /// Continue with this row.
    Row(Row),

    /// Cancel the event for this row.
    Skip,

    /// Nothing to apply; returned by statement-level triggers.
    Statement,
}

/// A row wrapped for interpreted code, with the host row it came from.
struct Wrapped<O> {
    row: Row,
    object: O,
}

impl<H: Host, I: Interpreter> Runtime<H, I> {
    /// Runs the handler of the trigger event and interprets its result.
    pub(crate) fn fire(
        &self,
        resolved: &Resolved<I::Object>,
        cache: &mut Option<CallCache<I::Object>>,
        trigger: &TriggerData,
    ) -> Result<TriggerOutcome, ErrorRecord> {
        let event = trigger.event();
        self.describe("pulling trigger");

        let handler = self
            .interpreter()
            .attribute(&resolved.module, event.handler_name())
            .map_err(|exception| {
                self.exception_to_host_error(
                    exception,
                    SqlState::INTERPRETER_ERROR,
                    "could not get trigger handler",
                )
            })?
            .ok_or_else(|| {
                ErrorRecord::error(
                    SqlState::TRIGGERED_ACTION_EXCEPTION,
                    "trigger function does not support event",
                )
                .with_detail(format!(
                    "The module has no \"{}\" handler.",
                    event.handler_name()
                ))
            })?;

        self.anchor_relation(cache, trigger);
        let data = self.anchor_trigger_data(cache, trigger)?;

        match event.level {
            Level::Row => self.fire_row(&handler, data, trigger),
            Level::Statement => self.fire_statement(&handler, data, event),
        }
    }

    /// Keeps the relation's descriptor alive as the cache's internal state.
    fn anchor_relation(
        &self,
        cache: &mut Option<CallCache<I::Object>>,
        trigger: &TriggerData,
    ) {
        let Some(cache) = cache.as_mut() else { return };

        let mut live = self.context().live.lock();
        let relation = trigger.relation();
        let anchored = cache.internal().as_ref().is_some_and(|anchor| {
            matches!(
                live.resolve(anchor),
                Some(LiveObject::Descriptor(descriptor))
                    if descriptor == *relation
            )
        });

        if !anchored {
            let key = live.register(LiveObject::Descriptor(relation.clone()));
            cache.set_internal(Some(Anchor::Live(key)));
        }
    }

    /// Returns the trigger-data wrapper of the cache, building and anchoring
    /// a new one when the cache has none for this trigger definition.
    fn anchor_trigger_data(
        &self,
        cache: &mut Option<CallCache<I::Object>>,
        trigger: &TriggerData,
    ) -> Result<I::Object, ErrorRecord> {
        let definition = trigger.definition();

        if let Some((anchored, key)) =
            cache.as_ref().and_then(|cache| cache.trigger_data().as_ref())
        {
            if *anchored == definition {
                if let Some(LiveObject::TriggerData(data)) =
                    self.context().live.lock().get(*key)
                {
                    return Ok(data.clone());
                }
            }
        }

        let data = self
            .interpreter()
            .trigger_data(self, &definition)
            .map_err(|exception| {
                self.exception_to_host_error(
                    exception,
                    SqlState::INTERPRETER_ERROR,
                    "could not create trigger data",
                )
            })?;

        let key = self
            .context()
            .live
            .lock()
            .register(LiveObject::TriggerData(data.clone()));

        if let Some(cache) = cache.as_mut() {
            cache.set_trigger_data(Some((definition, key)));
        }

        Ok(data)
    }

    fn wrap(
        &self,
        row: Option<&Row>,
        relation: &TypeDescriptor,
    ) -> Result<Option<Wrapped<I::Object>>, ErrorRecord> {
        let Some(row) = row else { return Ok(None) };

        let object = self
            .interpreter()
            .to_object(self, &Datum::Row(row.clone()), relation)
            .map_err(|exception| {
                self.exception_to_host_error(
                    exception,
                    SqlState::INTERPRETER_ERROR,
                    "could not create row object",
                )
            })?;

        Ok(Some(Wrapped { row: row.clone(), object }))
    }

    fn fire_row(
        &self,
        handler: &I::Object,
        data: I::Object,
        trigger: &TriggerData,
    ) -> Result<TriggerOutcome, ErrorRecord> {
        let event = trigger.event();
        let old = self.wrap(trigger.old_row().as_ref(), trigger.relation())?;
        let new = self.wrap(trigger.new_row().as_ref(), trigger.relation())?;

        let mut arguments = vec![data];
        arguments.extend(old.iter().map(|wrapped| wrapped.object.clone()));
        arguments.extend(new.iter().map(|wrapped| wrapped.object.clone()));

        let returned = match self.interpreter().call(self, handler, arguments) {
            Ok(returned) => returned,
            Err(exception) if exception.is(&ExceptionKind::StopEvent) => {
                return match event.timing {
                    Timing::Before => {
                        debug!(
                            "trigger {} cancelled the event",
                            trigger.name()
                        );
                        Ok(TriggerOutcome::Skip)
                    }
                    Timing::After => Err(ErrorRecord::error(
                        SqlState::PROTOCOL_VIOLATION,
                        "cannot stop events that have already occurred",
                    )),
                };
            }
            Err(exception) => {
                return Err(self.exception_to_host_error(
                    exception,
                    SqlState::INTERPRETER_EXCEPTION,
                    "trigger handler raised an exception",
                ))
            }
        };

        let is = |wrapped: &Option<Wrapped<I::Object>>| {
            wrapped.as_ref().is_some_and(|wrapped| {
                self.interpreter().is_same(&returned, &wrapped.object)
            })
        };

        if self.interpreter().is_none(&returned) || is(&new) {
            return Ok(new
                .or(old)
                .map_or(TriggerOutcome::Skip, |wrapped| {
                    TriggerOutcome::Row(wrapped.row)
                }));
        }

        if is(&old) {
            return Ok(match (event.manipulation, old) {
                (Manipulation::Update, _) | (_, None) => TriggerOutcome::Skip,
                (_, Some(wrapped)) => TriggerOutcome::Row(wrapped.row),
            });
        }

        match event.timing {
            Timing::After => Err(ErrorRecord::error(
                SqlState::PROTOCOL_VIOLATION,
                "non-None value returned by trigger fired after",
            )),
            Timing::Before => {
                let tuple = trigger.relation().tuple().ok_or_else(|| {
                    ErrorRecord::error(
                        SqlState::DATATYPE_MISMATCH,
                        "trigger relation is not a row type",
                    )
                })?;

                self.form_row(
                    tuple,
                    &returned,
                    "could not normalize replacement row",
                )
                .map(TriggerOutcome::Row)
            }
        }
    }

    fn fire_statement(
        &self,
        handler: &I::Object,
        data: I::Object,
        event: TriggerEvent,
    ) -> Result<TriggerOutcome, ErrorRecord> {
        let placeholders = match (event.timing, event.manipulation) {
            (Timing::Before, _) => 0,
            (Timing::After, Manipulation::Update) => 2,
            (Timing::After, _) => 1,
        };

        let mut arguments = vec![data];
        arguments.extend((0..placeholders).map(|_| self.interpreter().none()));

        let returned = self
            .interpreter()
            .call(self, handler, arguments)
            .map_err(|exception| {
                self.exception_to_host_error(
                    exception,
                    SqlState::INTERPRETER_EXCEPTION,
                    "trigger handler raised an exception",
                )
            })?;

        if self.interpreter().is_none(&returned) {
            Ok(TriggerOutcome::Statement)
        } else {
            Err(ErrorRecord::error(
                SqlState::TRIGGER_PROTOCOL_VIOLATED,
                "statement trigger did not return None",
            ))
        }
    }
}

#[cfg(test)]
mod tests;
