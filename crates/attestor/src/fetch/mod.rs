//! Off-chain evidence retrieval from content-addressed storage gateways.

mod client;
mod envelope;
mod gateway;

pub use client::{
    FetchError, GatewayTransport, HttpTransport, IpfsFetcher, TransportResponse,
};
pub use envelope::{
    parse_envelope, parse_reserve_metadata, AttestationFields, EnvelopeRequest, MetadataEnvelope,
    ReserveMetadata, SchemaError, RESERVE_SCHEMA,
};
pub use gateway::{gateway_url, resolve_gateways};
