//! Data model for expectations and requests.
//!
//! These are plain serde types. Matching behaviour lives in
//! [`crate::matchers`], which compiles them into runtime matchers.

mod body;
mod definition;
mod expectation;
mod multimap;
mod nottable;
mod request;

pub use body::{Body, BodyKind, BodyType, MatchType};
pub use definition::{OpenApiDefinition, RequestDefinition};
pub use expectation::{Expectation, TimeToLive, TimeUnit, Times};
pub use multimap::{KeyMatchStyle, KeyToMultiValue, KeysToMultiValues};
pub use nottable::NottableString;
pub use request::{HttpRequest, SocketAddress};
