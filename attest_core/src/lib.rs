//! # Attest Core
//!
//! `attest_core` records which network principals were launched from which
//! images, which capabilities each image is vouched for, and which
//! capabilities unlock each protected object. It answers two questions
//! about the instance that sent a request, identified only by its
//! `ip:port`:
//!
//! 1. **Property check**: does its image carry property `P`?
//!
//! 2. **Access check**: may it access object `O`?
//!
//! Callers are resolved to the most specific principal whose registered
//! port range contains the source port (see [`resolver`]). Transports hand
//! the [`Broker`] a [`Verb`] plus positional arguments and get an
//! [`Outcome`] back; wire formats live outside this crate.

pub mod authz;
pub mod broker;
pub mod command;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod id;
pub mod pile;
pub mod registry;
pub mod resolver;

// Re-export key types for convenience
pub use authz::Authorizer;
pub use broker::{Broker, ACCESS_TOKEN, PROPERTY_TOKEN};
pub use command::{Command, Outcome, Status, Verb};
pub use config::BrokerConfig;
pub use endpoint::{Endpoint, EndpointRange, PortRange};
pub use error::{BrokerError, Result};
pub use id::{ImageId, ObjectId, PrincipalId};
pub use pile::Pile;
pub use registry::{Image, NewPrincipal, Object, Principal, Registry, RegistrySnapshot};
pub use resolver::{RangeResolver, ResolutionPolicy};
