use nutype::nutype;

pub mod dto;
pub mod telemetry;

/// Name of an invoked serverless function, as addressed on the compute
/// node's gateway.
#[nutype(
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Display,
        AsRef,
        Serialize,
        Deserialize
    ),
    validate(not_empty)
)]
pub struct FunctionName(String);

/// Identifier of a configured compute node.
#[nutype(
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Display,
        AsRef,
        Serialize,
        Deserialize
    ),
    validate(not_empty)
)]
pub struct NodeName(String);
