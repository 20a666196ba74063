//! Authorization decisions.
//!
//! Both predicates start by resolving the calling endpoint to a principal
//! and then look at the capabilities vouched for that principal's image.

use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::error::{BrokerError, Result};
use crate::id::ObjectId;
use crate::registry::{Image, Principal, Registry};
use crate::resolver::RangeResolver;

/// Authorization engine.
///
/// Checks whether the instance behind an endpoint holds a property, or
/// may access a protected object.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authorizer {
    resolver: RangeResolver,
}

impl Authorizer {
    pub fn new(resolver: RangeResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &RangeResolver {
        &self.resolver
    }

    fn image_of(registry: &Registry, principal: &Principal) -> Result<Image> {
        registry
            .image(&principal.image_id)
            .ok_or_else(|| BrokerError::not_found("image not found"))
    }

    /// Check if the principal behind `endpoint` has `property` on its image.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the property is present.
    /// * `Err(NotFound)` - If no principal, image or property matches.
    /// * `Err(MalformedInput)` - If the endpoint does not parse.
    pub fn has_property(&self, registry: &Registry, endpoint: &Endpoint, property: &str) -> Result<()> {
        let principal = self.resolver.resolve(registry, endpoint)?;
        let image = Self::image_of(registry, &principal)?;

        if !image.has_property(property) {
            info!(
                principal = %principal.id,
                image = %image.id,
                property,
                "property not held"
            );
            return Err(BrokerError::not_found("property not found"));
        }

        debug!(principal = %principal.id, property, "property check passed");
        Ok(())
    }

    /// Check if the principal behind `endpoint` may access `object`.
    ///
    /// The object's ACL is walked in order and the first capability present
    /// on the principal's image grants access. The object is looked up
    /// before the image, so an unknown object is reported even when the
    /// principal's image is missing too.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If some ACL entry is held by the image.
    /// * `Err(Forbidden)` - If none is.
    /// * `Err(NotFound)` - If no principal, object or image matches.
    /// * `Err(MalformedInput)` - If the endpoint does not parse.
    pub fn can_access(&self, registry: &Registry, endpoint: &Endpoint, object: &ObjectId) -> Result<()> {
        let principal = self.resolver.resolve(registry, endpoint)?;
        let object = registry
            .object(object)
            .ok_or_else(|| BrokerError::not_found("object not found"))?;
        let image = Self::image_of(registry, &principal)?;

        match object.acl.iter().find(|wanted| image.has_property(wanted)) {
            Some(granted_by) => {
                debug!(
                    principal = %principal.id,
                    object = %object.id,
                    capability = %granted_by,
                    "access approved"
                );
                Ok(())
            }
            None => {
                info!(principal = %principal.id, object = %object.id, "access denied");
                Err(BrokerError::Forbidden("access denied".to_string()))
            }
        }
    }
}
