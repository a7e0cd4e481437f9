use miette::Diagnostic;
use thiserror::Error;

/// Input rejected before anything is sent to the backend.
#[derive(Debug, Error, Diagnostic)]
pub enum AuthzError {
    #[error("Failed to read schema file `{path}`")]
    #[diagnostic(
        code(keyward::authz::schema_load),
        help("Check that the file exists and contains a JSON schema with a `namespaces` array")
    )]
    SchemaLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read relation file `{path}`")]
    #[diagnostic(
        code(keyward::authz::relation_file_load),
        help("Check that the file exists and is readable")
    )]
    RelationFileLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid schema: {0}")]
    #[diagnostic(
        code(keyward::authz::invalid_schema),
        help("Node shape: {{ \"nType\": \"child\", \"expression\": {{ \"neType\": \"self\", ... }} }} or {{ \"nType\": \"union\", \"children\": [...] }}")
    )]
    InvalidSchema(String),

    #[error("Invalid relation file: {0}")]
    #[diagnostic(
        code(keyward::authz::invalid_relation_file),
        help("Expected {{ \"relations\": [ {{ \"resource\", \"relationDefinition\", \"namespace\", \"target\" }} ] }}")
    )]
    InvalidRelationFile(String),

    #[error("Relation batch must contain at least one relation")]
    #[diagnostic(code(keyward::authz::empty_batch))]
    EmptyRelationBatch,

    #[error("Cannot combine a relation file with individual relation fields")]
    #[diagnostic(
        code(keyward::authz::conflicting_input),
        help("Pass either --file or --resource/--relation/--namespace/--target, not both")
    )]
    ConflictingRelationInput,

    #[error("Either a relation file or all of resource, relation, namespace and target are required")]
    #[diagnostic(code(keyward::authz::incomplete_input))]
    IncompleteRelationInput,

    #[error("{mode} query requires `{field}`")]
    #[diagnostic(
        code(keyward::authz::missing_query_field),
        help("who-can-access needs resource, relation and namespace; resource-relations needs resource; target-access needs target")
    )]
    MissingQueryField {
        mode: &'static str,
        field: &'static str,
    },

    #[error("Unknown query mode `{0}`")]
    #[diagnostic(
        code(keyward::authz::unknown_query_mode),
        help("Valid modes: who-can-access, resource-relations, target-access")
    )]
    UnknownQueryMode(String),

    #[error("JSON error: {0}")]
    #[diagnostic(code(keyward::authz::json))]
    Json(#[from] serde_json::Error),
}
