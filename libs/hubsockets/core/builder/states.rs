/// Type-state markers for the builder pattern
///
/// These types track which required fields have been set in the builder at
/// compile time, so `build()` only exists once both are present.
use std::marker::PhantomData;

/// Marker trait for endpoint state
pub trait EndpointState {}

/// Endpoint has not been set
pub struct NoEndpoint;
impl EndpointState for NoEndpoint {}

/// Endpoint has been set
pub struct HasEndpoint;
impl EndpointState for HasEndpoint {}

/// Marker trait for dispatcher state
pub trait DispatcherState {}

/// Dispatcher has not been set
pub struct NoDispatcher;
impl DispatcherState for NoDispatcher {}

/// Dispatcher has been set
pub struct HasDispatcher;
impl DispatcherState for HasDispatcher {}

/// Phantom marker to prevent direct construction
#[derive(Debug, Clone, Copy)]
pub struct TypeState<E, D> {
    _endpoint: PhantomData<E>,
    _dispatcher: PhantomData<D>,
}

impl<E, D> TypeState<E, D> {
    pub(crate) fn new() -> Self {
        Self {
            _endpoint: PhantomData,
            _dispatcher: PhantomData,
        }
    }
}

impl<E, D> Default for TypeState<E, D> {
    fn default() -> Self {
        Self::new()
    }
}
