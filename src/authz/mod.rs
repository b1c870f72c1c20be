pub mod domain;
pub mod engine;
pub mod policy;

pub use domain::{Action, Domain, DomainKind, Resource, Role};
pub use engine::AuthzEngine;
pub use policy::PolicyTable;
