//! Runtime object model
//!
//! Values and memory spaces are the runtime counterpart of symbols and
//! scopes. Host objects enter the runtime through the
//! [`RuntimeObjectTranslator`]; aggregate host objects are exposed through an
//! [`EncapsulatedObject`] memory space that reads and writes the live object.

pub mod encapsulated;
pub mod environment;
pub mod host;
pub mod memory_space;
pub mod translator;
pub mod value;

pub use encapsulated::EncapsulatedObject;
pub use environment::{DiagnosticSink, RuntimeEnvironment};
pub use host::{FieldAccessor, HostClass, HostClassBuilder, HostObject, Payload, PropertyAccessor};
pub use memory_space::{Memory, MemorySpace, MemorySpaceRef, THIS_NAME};
pub use translator::{ObjectToValueTranslator, RuntimeObjectTranslator};
pub use value::{Value, WeakValue};
