//! Domain object abstraction.

use std::any::Any;
use std::sync::Arc;

/// A converted domain object from the remote object graph.
///
/// The cache never inspects object contents; it only tracks the type name
/// (for the by-type lookup index) and the application id. Conversion code
/// downcasts through [`GraphObject::as_any`] to reach concrete types.
pub trait GraphObject: Send + Sync {
    /// Returns the domain type name of this object.
    fn type_name(&self) -> &str;

    /// Returns the application id, if the object carries one.
    fn application_id(&self) -> Option<&str>;

    /// Returns the object as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a graph object.
pub type SharedObject = Arc<dyn GraphObject>;

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Minimal graph object used by cache unit tests.
    pub struct StubObject {
        pub type_name: String,
        pub application_id: Option<String>,
    }

    impl StubObject {
        pub fn new(type_name: &str, application_id: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                type_name: type_name.to_string(),
                application_id: application_id.map(str::to_string),
            })
        }
    }

    impl GraphObject for StubObject {
        fn type_name(&self) -> &str {
            &self.type_name
        }

        fn application_id(&self) -> Option<&str> {
            self.application_id.as_deref()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }
}
