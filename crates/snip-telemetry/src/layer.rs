use crate::handler::AsyncHandler;
use crate::record::{Attr, LogRecord};
use jiff::Timestamp;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::span;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Feeds `tracing` events into an [`AsyncHandler`].
///
/// Each enclosing span becomes a group named after the span, and the span's
/// fields are bound as attributes inside that group. The event's `message`
/// field becomes the record message.
#[derive(Debug, Clone)]
pub struct AsyncLayer {
    handler: AsyncHandler,
}

impl AsyncLayer {
    pub fn new(handler: AsyncHandler) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &AsyncHandler {
        &self.handler
    }
}

/// Fields recorded on a span so far, stored in its extensions.
struct SpanFields(Vec<Attr>);

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Vec<Attr>,
}

impl FieldVisitor {
    fn push(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            // Metadata fields added by the `log` bridge.
            name if name.starts_with("log.") => {}
            name => self.fields.push(Attr::new(name, value)),
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format!("{value:?}"));
    }
}

impl<S> Layer<S> for AsyncLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        span.extensions_mut().insert(SpanFields(visitor.fields));
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = FieldVisitor::default();
        values.record(&mut visitor);

        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(fields) => fields.0.extend(visitor.fields),
            None => extensions.insert(SpanFields(visitor.fields)),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut handler = self.handler.clone();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                handler = handler.with_group(span.name());
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    handler = handler.with_attrs(fields.0.iter().cloned());
                }
            }
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        handler.handle(LogRecord {
            time: Timestamp::now(),
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
        });
    }
}
