//! # Router Module
//!
//! The route registry: every [`RouteDescriptor`](crate::spec::RouteDescriptor)
//! the application declares, frozen at startup and resolved per request.
//!
//! ## Overview
//!
//! - [`RegistryBuilder::register`] adds routes and rejects duplicate
//!   method + template pairs (placeholder names do not count).
//! - [`RegistryBuilder::build`] checks security scheme references and
//!   component schema names, precompiles body validators and builds the
//!   segment tree.
//! - [`RouteRegistry::resolve`] maps a method and path to a [`MatchedRoute`]
//!   with typed path parameters, or [`RouteNotFound`].
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut builder = RouteRegistry::builder();
//! builder.register(events_route()?)?;
//! let registry = builder.build()?;
//!
//! let matched = registry.resolve(&Method::GET, "/event/54")?;
//! assert_eq!(matched.get_path_param("event"), Some(&TypedValue::Int(54)));
//! ```

mod core;
mod radix;
#[cfg(test)]
mod tests;

pub use core::{MatchedRoute, RegistryBuilder, RegistryError, RouteNotFound, RouteRegistry};
