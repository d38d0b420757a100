//! Inline code blocks and procedure validation.

use std::sync::Arc;

use log::debug;
use plembed_diagnostic::{ErrorRecord, SqlState};

use crate::{
    cache::CallCache,
    call::{CallInfo, CallKind},
    datum::Datum,
    descriptor::{
        Attribute, PseudoType, TupleDescriptor, TypeDescriptor, TypeId,
    },
    epoch::Epoch,
    host::Host,
    interpreter::Interpreter,
    live::{Anchor, LiveObject},
    procedure::{Procedure, ProcedureId},
    runtime::Runtime,
};

/// Type of the inline executor's single `source` parameter.
pub const CSTRING: TypeId = TypeId(2275);

/// Result type of the inline executor.
pub const VOID: TypeId = TypeId(2278);

impl<H: Host, I: Interpreter> Runtime<H, I> {
    /// Runs an anonymous code block.
    ///
    /// # Errors
    ///
    /// Whatever the block raises, as a host error.
    pub fn execute_inline(&self, source: &str) -> Result<(), ErrorRecord> {
        self.initialize()?;

        let cached = self.context().inline.lock().take();
        let cache = match cached {
            Some(cache) => cache,
            None => self.inline_cache()?,
        };

        let mut call = CallInfo::new(ProcedureId::INLINE, CallKind::Plain)
            .with_arguments(vec![(Datum::Text(source.to_owned()), CSTRING)]);
        call.cache = Some(cache);

        let result = self.handle(&mut call);

        if let Some(cache) = call.cache.take() {
            *self.context().inline.lock() = Some(cache);
        }

        result.map(|_| ())
    }

    /// Builds the call cache of the inline executor. It never goes stale and
    /// owns its objects.
    fn inline_cache(&self) -> Result<CallCache<I::Object>, ErrorRecord> {
        let module =
            self.interpreter().inline_executor(self).map_err(|exception| {
                self.exception_to_host_error(
                    exception,
                    SqlState::INTERPRETER_ERROR,
                    "could not create inline executor",
                )
            })?;

        let cstring = Arc::new(TypeDescriptor::pseudo(
            CSTRING,
            "cstring",
            PseudoType::Cstring,
        ));
        let input = Arc::new(TupleDescriptor::new(vec![Attribute::new(
            "source".to_owned(),
            cstring,
        )]));
        let output =
            Arc::new(TypeDescriptor::pseudo(VOID, "void", PseudoType::Void));

        let procedure = Procedure::builder()
            .id(ProcedureId::INLINE)
            .name(self.config().inline_filename.clone())
            .namespace(String::new())
            .source(String::new())
            .input(input.clone())
            .output(output.clone())
            .build();

        debug!("created inline executor");

        Ok(CallCache::new(
            Epoch::NEVER_STALE,
            Anchor::Pinned(LiveObject::Procedure(Arc::new(procedure))),
            Anchor::Pinned(LiveObject::Module(module)),
            input,
            output,
        ))
    }

    /// Compiles a procedure's body without running it and drops any loaded
    /// module, so the next call picks up the new definition.
    ///
    /// # Errors
    ///
    /// The procedure does not exist or does not compile.
    pub fn validate(&self, id: ProcedureId) -> Result<(), ErrorRecord> {
        self.initialize()?;

        let procedure = self
            .host()
            .load_procedure(id)?
            .ok_or_else(|| self.undefined_procedure(id))?;

        self.interpreter().compile(self, &procedure).map_err(|exception| {
            let message =
                format!("cannot compile {} function", self.config().language);
            self.exception_to_host_error(
                exception,
                SqlState::INTERPRETER_ERROR,
                &message,
            )
        })?;

        self.context().registry.lock().remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests;
