pub mod tiering_service;

pub use tiering_service::{
    GatewayError, GatewayResult, GetRequest, GetResponse, PutRequest, PutResponse, TieringConfig,
    TieringService,
};
