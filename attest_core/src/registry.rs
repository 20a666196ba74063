//! The registry of principals, images and protected objects.
//!
//! Each mapping sits behind its own lock, so a write to the image table
//! never blocks a principal lookup. All state is in memory.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::endpoint::EndpointRange;
use crate::error::{BrokerError, Result};
use crate::id::{ImageId, ObjectId, PrincipalId};
use crate::pile::Pile;

/// Principal property key holding the launch configuration string.
pub const CONFIG_PROPERTY: &str = "config";

/// Value stored for every image property; only presence matters.
pub const PROPERTY_SENTINEL: &str = "set";

/// A running instance, identified by the address range it speaks from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    /// May name an image that does not exist (yet).
    pub image_id: ImageId,
    pub properties: BTreeMap<String, String>,
    pub endpoint: EndpointRange,
    pub registered_at: DateTime<Utc>,
}

impl Principal {
    /// The launch configuration recorded at registration.
    pub fn config(&self) -> Option<&str> {
        self.properties.get(CONFIG_PROPERTY).map(String::as_str)
    }
}

/// Fields for a principal that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPrincipal {
    pub id: PrincipalId,
    pub image_id: ImageId,
    pub endpoint: EndpointRange,
    pub config: String,
}

/// A deployable artifact and the capabilities vouched for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,
    pub properties: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Image {
    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }
}

/// A protected resource and the capabilities that unlock it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    pub id: ObjectId,
    /// Ordered, duplicates kept.
    pub acl: Vec<String>,
}

/// A point-in-time copy of every mapping, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub principals: Vec<Principal>,
    pub images: Vec<Image>,
    pub objects: Vec<Object>,
}

/// Owner of the principal, image and object mappings.
#[derive(Debug, Default)]
pub struct Registry {
    principals: Pile<PrincipalId, Principal>,
    images: Pile<ImageId, Image>,
    objects: Pile<ObjectId, Object>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a principal.
    ///
    /// Fails with `Conflict` if the id is taken; the existing entry is left
    /// as it was.
    pub fn insert_principal(&self, new: NewPrincipal) -> Result<Principal> {
        let mut properties = BTreeMap::new();
        properties.insert(CONFIG_PROPERTY.to_string(), new.config);

        let principal = Principal {
            id: new.id,
            image_id: new.image_id,
            properties,
            endpoint: new.endpoint,
            registered_at: Utc::now(),
        };

        if !self
            .principals
            .insert_new(principal.id.clone(), principal.clone())
        {
            debug!(principal = %principal.id, "principal already registered");
            return Err(BrokerError::Conflict(format!(
                "principal {} already exists",
                principal.id
            )));
        }

        info!(
            principal = %principal.id,
            image = %principal.image_id,
            endpoint = %principal.endpoint,
            "registered principal"
        );
        Ok(principal)
    }

    /// Remove a principal. Returns whether anything was removed; removing
    /// an unknown id is not an error.
    pub fn remove_principal(&self, id: &PrincipalId) -> bool {
        let removed = self.principals.remove(id).is_some();
        if removed {
            info!(principal = %id, "removed principal");
        } else {
            debug!(principal = %id, "remove of unknown principal ignored");
        }
        removed
    }

    pub fn contains_principal(&self, id: &PrincipalId) -> bool {
        self.principals.contains(id)
    }

    pub fn principal(&self, id: &PrincipalId) -> Option<Principal> {
        self.principals.get(id)
    }

    /// Principals matching the predicate, in registration order.
    pub fn principals_where(&self, predicate: impl Fn(&Principal) -> bool) -> Vec<Principal> {
        self.principals.filter(predicate)
    }

    /// Create an image with no properties.
    pub fn insert_image(&self, id: ImageId) -> Result<Image> {
        let image = Image {
            id: id.clone(),
            properties: BTreeMap::new(),
            created_at: Utc::now(),
        };

        if !self.images.insert_new(id.clone(), image.clone()) {
            return Err(BrokerError::Conflict(format!("image {} already exists", id)));
        }

        info!(image = %id, "created image");
        Ok(image)
    }

    pub fn image(&self, id: &ImageId) -> Option<Image> {
        self.images.get(id)
    }

    /// Vouch that an image carries the given property.
    ///
    /// Setting a property twice is a no-op.
    pub fn set_image_property(&self, id: &ImageId, key: &str) -> Result<()> {
        self.images
            .update(id, |image| {
                image
                    .properties
                    .insert(key.to_string(), PROPERTY_SENTINEL.to_string());
            })
            .ok_or_else(|| BrokerError::not_found(format!("image {} not found", id)))?;

        info!(image = %id, property = key, "set image property");
        Ok(())
    }

    /// Append a required capability to an object's ACL, creating the object
    /// on first use.
    pub fn append_object_acl(&self, id: ObjectId, capability: &str) -> Object {
        let (object, created) = self.objects.upsert_with(
            id.clone(),
            || Object {
                id: id.clone(),
                acl: vec![capability.to_string()],
            },
            |object| object.acl.push(capability.to_string()),
        );

        info!(object = %id, capability, created, "appended object acl entry");
        object
    }

    pub fn object(&self, id: &ObjectId) -> Option<Object> {
        self.objects.get(id)
    }

    /// Copy every mapping for diagnostics.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            principals: self.principals.get_ordered(),
            images: self.images.get_ordered(),
            objects: self.objects.get_ordered(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_principal(id: &str, image: &str, range: &str) -> NewPrincipal {
        NewPrincipal {
            id: id.into(),
            image_id: image.into(),
            endpoint: range.parse().unwrap(),
            config: "cfg".to_string(),
        }
    }

    #[test]
    fn test_insert_principal_stores_config() {
        let registry = Registry::new();
        let principal = registry
            .insert_principal(new_principal("p1", "img1", "10.0.0.1:1-10"))
            .unwrap();

        assert_eq!(principal.config(), Some("cfg"));
        assert_eq!(registry.principal(&"p1".into()), Some(principal));
    }

    #[test]
    fn test_insert_principal_conflict_keeps_original() {
        let registry = Registry::new();
        registry
            .insert_principal(new_principal("p1", "img1", "10.0.0.1:1-10"))
            .unwrap();

        let err = registry
            .insert_principal(new_principal("p1", "img2", "10.0.0.2:1-10"))
            .unwrap_err();
        assert!(matches!(err, BrokerError::Conflict(_)));

        let stored = registry.principal(&"p1".into()).unwrap();
        assert_eq!(stored.image_id, ImageId::from("img1"));
        assert_eq!(stored.endpoint.to_string(), "10.0.0.1:1-10");
    }

    #[test]
    fn test_principal_may_reference_missing_image() {
        let registry = Registry::new();
        assert!(registry
            .insert_principal(new_principal("p1", "later", "10.0.0.1:1-10"))
            .is_ok());
        assert!(registry.image(&"later".into()).is_none());
    }

    #[test]
    fn test_remove_principal_is_idempotent() {
        let registry = Registry::new();
        registry
            .insert_principal(new_principal("p1", "img1", "10.0.0.1:1-10"))
            .unwrap();

        assert!(!registry.remove_principal(&"ghost".into()));
        assert_eq!(registry.snapshot().principals.len(), 1);

        assert!(registry.remove_principal(&"p1".into()));
        assert!(!registry.remove_principal(&"p1".into()));
        assert!(!registry.contains_principal(&"p1".into()));
    }

    #[test]
    fn test_insert_image_conflict() {
        let registry = Registry::new();
        registry.insert_image("img1".into()).unwrap();
        registry.set_image_property(&"img1".into(), "cap-x").unwrap();

        let err = registry.insert_image("img1".into()).unwrap_err();
        assert!(matches!(err, BrokerError::Conflict(_)));
        // Existing properties survive the rejected re-create
        assert!(registry.image(&"img1".into()).unwrap().has_property("cap-x"));
    }

    #[test]
    fn test_set_property_on_missing_image() {
        let registry = Registry::new();
        let err = registry
            .set_image_property(&"nope".into(), "cap-x")
            .unwrap_err();
        assert!(matches!(err, BrokerError::NotFound(_)));
    }

    #[test]
    fn test_set_property_uses_sentinel() {
        let registry = Registry::new();
        registry.insert_image("img1".into()).unwrap();
        registry.set_image_property(&"img1".into(), "cap-x").unwrap();
        registry.set_image_property(&"img1".into(), "cap-x").unwrap();

        let image = registry.image(&"img1".into()).unwrap();
        assert_eq!(image.properties.len(), 1);
        assert_eq!(image.properties["cap-x"], PROPERTY_SENTINEL);
    }

    #[test]
    fn test_append_object_acl_keeps_order_and_duplicates() {
        let registry = Registry::new();
        registry.append_object_acl("obj1".into(), "cap-a");
        registry.append_object_acl("obj1".into(), "cap-b");
        let object = registry.append_object_acl("obj1".into(), "cap-a");

        assert_eq!(object.acl, vec!["cap-a", "cap-b", "cap-a"]);
        assert_eq!(registry.object(&"obj1".into()), Some(object));
    }

    #[test]
    fn test_snapshot_is_insertion_ordered() {
        let registry = Registry::new();
        registry
            .insert_principal(new_principal("zeta", "img", "10.0.0.1:1-10"))
            .unwrap();
        registry
            .insert_principal(new_principal("alpha", "img", "10.0.0.1:11-20"))
            .unwrap();
        registry.insert_image("img".into()).unwrap();
        registry.append_object_acl("obj".into(), "cap");

        let snapshot = registry.snapshot();
        let ids: Vec<_> = snapshot.principals.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["zeta", "alpha"]);
        assert_eq!(snapshot.images.len(), 1);
        assert_eq!(snapshot.objects.len(), 1);
    }
}
