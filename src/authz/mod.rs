pub mod codec;
pub mod errors;
pub mod loader;
pub mod schema;
pub mod service;
pub mod tree;
pub mod types;

pub use codec::{decode, encode, read_stored, CodecWarning, Encoded};
pub use errors::AuthzError;
pub use schema::SchemaModel;
pub use service::QueryOutcome;
pub use tree::{Node, NodeExpression, Schema};
pub use types::{
    QueryMode, RelationBatch, RelationCheck, RelationQuery, RelationQueryRequest, RelationTuple,
};
