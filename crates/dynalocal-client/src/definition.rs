//! ---
//! dl_section: "02-database-client"
//! dl_subsection: "module"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "Translation of declared table definitions into CreateTable requests."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
//! Table definitions are declared with the DynamoDB `CreateTable` field names
//! (`KeySchema`, `AttributeDefinitions`, ...). They are parsed into mirror
//! structs here and then fed to the SDK builders.
use aws_sdk_dynamodb::error::BuildError;
use aws_sdk_dynamodb::operation::create_table::builders::CreateTableFluentBuilder;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType,
    LocalSecondaryIndex, Projection, ProjectionType, ProvisionedThroughput, ScalarAttributeType,
    SseSpecification, SseType, StreamSpecification, StreamViewType, TableClass, Tag,
};
use dynalocal_common::TableDefinition;
use serde::Deserialize;

use crate::error::ClientError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct CreateTableParameters {
    #[serde(default)]
    key_schema: Vec<KeySchemaSpec>,
    #[serde(default)]
    attribute_definitions: Vec<AttributeSpec>,
    billing_mode: Option<String>,
    provisioned_throughput: Option<ThroughputSpec>,
    #[serde(default)]
    global_secondary_indexes: Vec<GlobalIndexSpec>,
    #[serde(default)]
    local_secondary_indexes: Vec<LocalIndexSpec>,
    stream_specification: Option<StreamSpec>,
    #[serde(rename = "SSESpecification")]
    sse_specification: Option<SseSpec>,
    #[serde(default)]
    tags: Vec<TagSpec>,
    table_class: Option<String>,
    deletion_protection_enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct KeySchemaSpec {
    attribute_name: String,
    key_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct AttributeSpec {
    attribute_name: String,
    attribute_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct ThroughputSpec {
    read_capacity_units: i64,
    write_capacity_units: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct ProjectionSpec {
    projection_type: Option<String>,
    #[serde(default)]
    non_key_attributes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct GlobalIndexSpec {
    index_name: String,
    key_schema: Vec<KeySchemaSpec>,
    projection: ProjectionSpec,
    provisioned_throughput: Option<ThroughputSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct LocalIndexSpec {
    index_name: String,
    key_schema: Vec<KeySchemaSpec>,
    projection: ProjectionSpec,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct StreamSpec {
    stream_enabled: bool,
    stream_view_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SseSpec {
    #[serde(rename = "Enabled")]
    enabled: Option<bool>,
    #[serde(rename = "SSEType")]
    sse_type: Option<String>,
    #[serde(rename = "KMSMasterKeyId")]
    kms_master_key_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct TagSpec {
    key: String,
    value: String,
}

fn key_schema(specs: Vec<KeySchemaSpec>) -> Result<Vec<KeySchemaElement>, BuildError> {
    specs
        .into_iter()
        .map(|spec| {
            KeySchemaElement::builder()
                .attribute_name(spec.attribute_name)
                .key_type(KeyType::from(spec.key_type.as_str()))
                .build()
        })
        .collect()
}

fn throughput(spec: ThroughputSpec) -> Result<ProvisionedThroughput, BuildError> {
    ProvisionedThroughput::builder()
        .read_capacity_units(spec.read_capacity_units)
        .write_capacity_units(spec.write_capacity_units)
        .build()
}

fn projection(spec: ProjectionSpec) -> Projection {
    Projection::builder()
        .set_projection_type(spec.projection_type.as_deref().map(ProjectionType::from))
        .set_non_key_attributes((!spec.non_key_attributes.is_empty()).then_some(spec.non_key_attributes))
        .build()
}

fn global_index(spec: GlobalIndexSpec) -> Result<GlobalSecondaryIndex, BuildError> {
    GlobalSecondaryIndex::builder()
        .index_name(spec.index_name)
        .set_key_schema(Some(key_schema(spec.key_schema)?))
        .projection(projection(spec.projection))
        .set_provisioned_throughput(spec.provisioned_throughput.map(throughput).transpose()?)
        .build()
}

fn local_index(spec: LocalIndexSpec) -> Result<LocalSecondaryIndex, BuildError> {
    LocalSecondaryIndex::builder()
        .index_name(spec.index_name)
        .set_key_schema(Some(key_schema(spec.key_schema)?))
        .projection(projection(spec.projection))
        .build()
}

impl CreateTableParameters {
    fn parse(definition: &TableDefinition) -> Result<Self, String> {
        let value = serde_json::to_value(&definition.parameters).map_err(|err| err.to_string())?;
        serde_json::from_value(value).map_err(|err| err.to_string())
    }

    fn apply(self, request: CreateTableFluentBuilder) -> Result<CreateTableFluentBuilder, BuildError> {
        let mut request = request
            .set_key_schema(Some(key_schema(self.key_schema)?))
            .set_billing_mode(self.billing_mode.as_deref().map(BillingMode::from))
            .set_provisioned_throughput(self.provisioned_throughput.map(throughput).transpose()?)
            .set_table_class(self.table_class.as_deref().map(TableClass::from))
            .set_deletion_protection_enabled(self.deletion_protection_enabled);

        for attribute in self.attribute_definitions {
            request = request.attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(attribute.attribute_name)
                    .attribute_type(ScalarAttributeType::from(attribute.attribute_type.as_str()))
                    .build()?,
            );
        }
        for index in self.global_secondary_indexes {
            request = request.global_secondary_indexes(global_index(index)?);
        }
        for index in self.local_secondary_indexes {
            request = request.local_secondary_indexes(local_index(index)?);
        }
        if let Some(stream) = self.stream_specification {
            request = request.stream_specification(
                StreamSpecification::builder()
                    .stream_enabled(stream.stream_enabled)
                    .set_stream_view_type(stream.stream_view_type.as_deref().map(StreamViewType::from))
                    .build()?,
            );
        }
        if let Some(sse) = self.sse_specification {
            request = request.sse_specification(
                SseSpecification::builder()
                    .set_enabled(sse.enabled)
                    .set_sse_type(sse.sse_type.as_deref().map(SseType::from))
                    .set_kms_master_key_id(sse.kms_master_key_id)
                    .build(),
            );
        }
        for tag in self.tags {
            request = request.tags(Tag::builder().key(tag.key).value(tag.value).build()?);
        }
        Ok(request)
    }
}

/// Fill `request` from a declared definition.
pub(crate) fn create_table_request(
    request: CreateTableFluentBuilder,
    definition: &TableDefinition,
) -> Result<CreateTableFluentBuilder, ClientError> {
    let invalid = |reason: String| ClientError::InvalidDefinition {
        table: definition.table_name.clone(),
        reason,
    };
    let parameters = CreateTableParameters::parse(definition).map_err(invalid)?;
    parameters
        .apply(request.table_name(&definition.table_name))
        .map_err(|err| invalid(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClientSettings, DynamoClient};
    use serde_json::json;

    fn request() -> CreateTableFluentBuilder {
        DynamoClient::new(ClientSettings::local("127.0.0.1", 8000).unwrap())
            .unwrap()
            .sdk()
            .create_table()
    }

    #[tokio::test]
    async fn hash_key_definition_maps_onto_the_request() {
        let definition = TableDefinition::new("Users").with_hash_key("id");

        let built = create_table_request(request(), &definition).unwrap();
        let input = built.as_input();

        assert_eq!(input.get_table_name().as_deref(), Some("Users"));
        assert_eq!(input.get_billing_mode(), &Some(BillingMode::PayPerRequest));
        let keys = input.get_key_schema().as_ref().unwrap();
        assert_eq!(keys[0].attribute_name(), "id");
        assert_eq!(keys[0].key_type(), &KeyType::Hash);
        let attributes = input.get_attribute_definitions().as_ref().unwrap();
        assert_eq!(attributes[0].attribute_type(), &ScalarAttributeType::S);
    }

    #[tokio::test]
    async fn indexes_and_tags_are_carried() {
        let definition = TableDefinition::new("Orders")
            .with_hash_key("pk")
            .with_parameter(
                "GlobalSecondaryIndexes",
                json!([{
                    "IndexName": "byCustomer",
                    "KeySchema": [{ "AttributeName": "customer", "KeyType": "HASH" }],
                    "Projection": { "ProjectionType": "ALL" }
                }]),
            )
            .with_parameter("Tags", json!([{ "Key": "suite", "Value": "unit" }]));

        let built = create_table_request(request(), &definition).unwrap();
        let input = built.as_input();

        let indexes = input.get_global_secondary_indexes().as_ref().unwrap();
        assert_eq!(indexes[0].index_name(), "byCustomer");
        assert_eq!(input.get_tags().as_ref().unwrap()[0].value(), "unit");
    }

    #[tokio::test]
    async fn unknown_parameter_is_rejected() {
        let definition = TableDefinition::new("Users").with_parameter("KeySchemaa", json!([]));

        let err = create_table_request(request(), &definition).unwrap_err();

        match err {
            ClientError::InvalidDefinition { table, reason } => {
                assert_eq!(table, "Users");
                assert!(reason.contains("KeySchemaa"), "{reason}");
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[tokio::test]
    async fn incomplete_key_schema_is_rejected() {
        let definition = TableDefinition::new("Users")
            .with_parameter("KeySchema", json!([{ "AttributeName": "id" }]));

        let err = create_table_request(request(), &definition).unwrap_err();

        assert!(matches!(err, ClientError::InvalidDefinition { .. }), "unexpected {err}");
    }
}
