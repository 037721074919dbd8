//! Sink trait - Dispatcher output interface
//!
//! Backends implement [`Sink`] (the `Send` variant generated by
//! `trait_variant`). The dispatcher stores heterogeneous backends as
//! [`BoxedSink`]; every `Sink` gets [`DynSink`] for free.

use std::future::Future;
use std::pin::Pin;

use crate::{ContractError, Message};

/// Message output trait
#[trait_variant::make(Sink: Send)]
pub trait LocalSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one message
    ///
    /// # Errors
    /// Returns write error (should include the sink name)
    async fn write(&mut self, msg: &Message) -> Result<(), ContractError>;

    /// Flush buffered output (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Release resources. Called exactly once, by the dispatcher.
    async fn close(&mut self);
}

/// Boxed future returned by [`DynSink`]
pub type SinkFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe view of [`Sink`]
pub trait DynSink: Send {
    fn name(&self) -> &str;

    fn write<'a>(&'a mut self, msg: &'a Message) -> SinkFuture<'a, Result<(), ContractError>>;

    fn flush(&mut self) -> SinkFuture<'_, Result<(), ContractError>>;

    fn close(&mut self) -> SinkFuture<'_, ()>;
}

impl<S: Sink> DynSink for S {
    fn name(&self) -> &str {
        Sink::name(self)
    }

    fn write<'a>(&'a mut self, msg: &'a Message) -> SinkFuture<'a, Result<(), ContractError>> {
        Box::pin(Sink::write(self, msg))
    }

    fn flush(&mut self) -> SinkFuture<'_, Result<(), ContractError>> {
        Box::pin(Sink::flush(self))
    }

    fn close(&mut self) -> SinkFuture<'_, ()> {
        Box::pin(Sink::close(self))
    }
}

/// Type-erased sink as stored by the dispatcher
pub type BoxedSink = Box<dyn DynSink>;
