//! pgcrud Core - Schema Model and Shared Types
//!
//! Pure data structures and pure functions with no I/O: identifier quoting,
//! the portable type model, the introspected schema model with its drift
//! digest, capability claims, gateway configuration, and the domain error
//! taxonomy. Both the query builder and the API layer depend on this crate.

// Core modules
mod claims;
mod config;
mod error;
mod ident;
mod model;
mod portable;

// Re-export identifier helpers
pub use ident::{
    breaks_route_mapping, parse_qualified, parse_route_segment, qualify, quote_ident,
    route_segment, DEFAULT_NAMESPACE, ROUTE_SEPARATOR,
};

// Re-export the portable type model
pub use portable::{is_textual_tag, map_type_tag, PortableType, StringFormat, TEXTUAL_TAGS};

// Re-export the schema model
pub use model::{
    Column, Entity, ForeignKey, SchemaModel, DELETED_AT_COLUMN, UPDATED_AT_COLUMN,
};

// Re-export claims
pub use claims::{AccessMode, ClaimSet, Grant, TokenClaims, WILDCARD_NAMESPACE};

// Re-export configuration
pub use config::{strip_jdbc_prefix, CorsOrigins, GatewayConfig};

// Re-export error types
pub use error::{ConfigError, IntrospectError, QueryBuildError, TokenError};
