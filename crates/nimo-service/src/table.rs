//! The handler table: built once at startup, frozen before the acceptor
//! begins accepting, then read without any lock for the rest of the
//! process's life (the concurrency model's publication-safety
//! requirement — see the workspace design notes).

use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::Handler;

/// A mutable builder; call [`HandlerTableBuilder::build`] to freeze it
/// into an immutable [`HandlerTable`].
#[derive(Default)]
pub struct HandlerTableBuilder {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under its own [`Handler::command_name`].
    /// Panics on a duplicate registration — that is a programming error
    /// caught at startup, not a runtime condition.
    pub fn register(mut self, handler: Arc<dyn Handler>) -> Self {
        let name = handler.command_name().to_string();
        if self.handlers.insert(name.clone(), handler).is_some() {
            panic!("duplicate handler registration for command '{name}'");
        }
        self
    }

    pub fn build(self) -> HandlerTable {
        HandlerTable {
            handlers: Arc::new(self.handlers),
        }
    }
}

/// An immutable name → handler table, cheap to clone (an `Arc` bump) so
/// every session can hold its own handle without contention.
#[derive(Clone)]
pub struct HandlerTable {
    handlers: Arc<HashMap<String, Arc<dyn Handler>>>,
}

impl HandlerTable {
    pub fn lookup(&self, command_name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(command_name).cloned()
    }

    pub fn command_names(&self) -> Vec<&str> {
        self.handlers.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::ResponseWriter;
    use nimo_value::Shared;
    use std::future::Future;
    use std::pin::Pin;

    struct Noop(&'static str);
    impl Handler for Noop {
        fn command_name(&self) -> &str {
            self.0
        }
        fn handle<'a>(
            &'a self,
            _writer: ResponseWriter<'a>,
            _args: Vec<Shared>,
        ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
            Box::pin(async { true })
        }
    }

    #[test]
    fn lookup_finds_registered_handler() {
        let table = HandlerTableBuilder::new()
            .register(Arc::new(Noop("stop!")))
            .build();
        assert!(table.lookup("stop!").is_some());
        assert!(table.lookup("missing!").is_none());
    }

    #[test]
    #[should_panic(expected = "duplicate handler registration")]
    fn duplicate_registration_panics() {
        HandlerTableBuilder::new()
            .register(Arc::new(Noop("stop!")))
            .register(Arc::new(Noop("stop!")))
            .build();
    }
}
