//! Command handlers.
//!
//! The broker owns the registry and maps each typed command onto registry,
//! resolver and authorizer calls. It does no decision making of its own.

use tracing::{debug, info, warn};

use crate::authz::Authorizer;
use crate::command::{Command, Outcome, Verb};
use crate::config::BrokerConfig;
use crate::error::{BrokerError, Result};
use crate::id::PrincipalId;
use crate::registry::{NewPrincipal, Registry, RegistrySnapshot};
use crate::resolver::{RangeResolver, ResolutionPolicy};

/// Success token returned by a passing property check.
pub const PROPERTY_TOKEN: &str = "{ 'void':programHasProperty('','') }";

/// Success token returned by a passing access check.
pub const ACCESS_TOKEN: &str = "{ 'void':approveAccess('','') }";

/// The attestation broker: registry plus decision engine.
#[derive(Debug, Default)]
pub struct Broker {
    registry: Registry,
    authorizer: Authorizer,
}

impl Broker {
    pub fn new(policy: ResolutionPolicy) -> Self {
        Self {
            registry: Registry::new(),
            authorizer: Authorizer::new(RangeResolver::new(policy)),
        }
    }

    pub fn from_config(config: &BrokerConfig) -> Self {
        Self::new(config.resolution)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn authorizer(&self) -> &Authorizer {
        &self.authorizer
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.registry.snapshot()
    }

    /// Parse positional arguments for `verb` and execute the result.
    ///
    /// Insert-principal reports a taken id before looking at the endpoint
    /// range, so a duplicate with a bad range is a conflict.
    pub fn dispatch<S: AsRef<str>>(&self, verb: Verb, args: &[S]) -> Outcome {
        if let Err(err) = self.precheck(verb, args) {
            info!(%verb, error = %err, "rejected request");
            return Outcome::from(err);
        }

        match Command::parse(verb, args) {
            Ok(command) => self.execute(command),
            Err(err) => {
                warn!(%verb, error = %err, "rejected request");
                Outcome::from(err)
            }
        }
    }

    fn precheck<S: AsRef<str>>(&self, verb: Verb, args: &[S]) -> Result<()> {
        if verb != Verb::InsertPrincipal || args.len() != verb.arity() {
            return Ok(());
        }
        let id = PrincipalId::from(args[0].as_ref());
        if self.registry.contains_principal(&id) {
            return Err(BrokerError::Conflict(format!(
                "principal {} already exists",
                id
            )));
        }
        Ok(())
    }

    /// Execute a validated command.
    pub fn execute(&self, command: Command) -> Outcome {
        let verb = command.verb();
        let outcome = Outcome::from(self.run(command));

        if outcome.status.is_ok() {
            debug!(%verb, status = %outcome.status, "handled request");
        } else {
            info!(%verb, status = %outcome.status, message = outcome.message(), "request failed");
        }
        outcome
    }

    fn run(&self, command: Command) -> Result<Outcome> {
        let outcome = match command {
            Command::InsertPrincipal {
                id,
                image,
                endpoint,
                config,
            } => {
                let principal = self.registry.insert_principal(NewPrincipal {
                    id,
                    image_id: image,
                    endpoint,
                    config,
                })?;
                Outcome::ok_with(format!("['{}']", principal.id))
            }
            Command::RemovePrincipal { id } => {
                self.registry.remove_principal(&id);
                Outcome::ok()
            }
            Command::UpdateSubjectSet { id } => {
                if !self.registry.contains_principal(&id) {
                    return Err(BrokerError::NotFound(format!(
                        "principal {} not found",
                        id
                    )));
                }
                Outcome::ok()
            }
            Command::InsertImage { id } => {
                self.registry.insert_image(id)?;
                Outcome::ok()
            }
            Command::SetImageProperty { image, property } => {
                self.registry.set_image_property(&image, &property)?;
                Outcome::ok()
            }
            Command::AppendObjectAcl { object, capability } => {
                self.registry.append_object_acl(object, &capability);
                Outcome::ok()
            }
            Command::CheckHasProperty { endpoint, property } => {
                self.authorizer
                    .has_property(&self.registry, &endpoint, &property)?;
                Outcome::ok_with(PROPERTY_TOKEN)
            }
            Command::CheckCanAccess { endpoint, object } => {
                self.authorizer
                    .can_access(&self.registry, &endpoint, &object)?;
                Outcome::ok_with(ACCESS_TOKEN)
            }
        };
        Ok(outcome)
    }
}
