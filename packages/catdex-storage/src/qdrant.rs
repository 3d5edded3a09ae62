use std::collections::HashMap;

use qdrant_client::{
	Qdrant,
	client::Payload,
	qdrant::{
		Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, Distance,
		FieldType, Filter, PointStruct, Query, QueryPointsBuilder, Range, ScoredPoint,
		UpsertPointsBuilder, Value, Vector, VectorParamsBuilder, VectorsConfigBuilder,
		value::Kind,
	},
};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::{
	Error, Result,
	models::{Direction, IndexMatch, IndexQuery, IndexedVector, MetadataFilter, VectorMetadata},
};

pub const DENSE_VECTOR_NAME: &str = "dense";

/// Payload fields that filters run against.
const PAYLOAD_INDEXES: [(&str, FieldType); 3] = [
	("Created", FieldType::Integer),
	("Updated", FieldType::Integer),
	("Type", FieldType::Keyword),
];

pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &catdex_config::Qdrant) -> Result<Self> {
		let mut builder = Qdrant::from_url(&cfg.url);

		if let Some(api_key) = cfg.api_key.as_ref() {
			builder = builder.api_key(api_key.clone());
		}

		let client = builder.build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Creates the collection and its payload indexes when they are missing.
	pub async fn ensure_collection(&self) -> Result<()> {
		if !self.client.collection_exists(self.collection.clone()).await? {
			let mut vectors_config = VectorsConfigBuilder::default();

			vectors_config.add_named_vector_params(
				DENSE_VECTOR_NAME,
				VectorParamsBuilder::new(self.vector_dim.into(), Distance::Cosine),
			);

			self.client
				.create_collection(
					CreateCollectionBuilder::new(self.collection.clone())
						.vectors_config(vectors_config),
				)
				.await?;
		}

		for (field, field_type) in PAYLOAD_INDEXES {
			self.client
				.create_field_index(
					CreateFieldIndexCollectionBuilder::new(
						self.collection.clone(),
						field,
						field_type,
					)
					.wait(true),
				)
				.await?;
		}

		Ok(())
	}

	pub async fn upsert_vectors(&self, vectors: &[IndexedVector]) -> Result<()> {
		if vectors.is_empty() {
			return Ok(());
		}

		let mut points = Vec::with_capacity(vectors.len());

		for vector in vectors {
			if vector.values.len() != self.vector_dim as usize {
				return Err(Error::InvalidArgument(format!(
					"Vector {} has dimension {} but the collection expects {}.",
					vector.id,
					vector.values.len(),
					self.vector_dim
				)));
			}

			points.push(to_point(vector));
		}

		self.client
			.upsert_points(UpsertPointsBuilder::new(self.collection.clone(), points).wait(true))
			.await?;

		Ok(())
	}

	pub async fn query_vectors(&self, query: &IndexQuery) -> Result<Vec<IndexMatch>> {
		let mut search = QueryPointsBuilder::new(self.collection.clone())
			.limit(u64::from(query.top_k))
			.with_payload(true);

		// A zero vector cannot be scored under cosine distance, so it becomes a filter-only scan.
		if !query.is_unranked() {
			search =
				search.query(Query::new_nearest(query.vector.clone())).using(DENSE_VECTOR_NAME);
		}
		if let Some(filter) = query.filter.as_ref() {
			search = search.filter(to_filter(filter));
		}

		let response = self.client.query(search).await?;

		response.result.into_iter().map(from_scored_point).collect()
	}

	/// Drops every point by recreating the collection.
	pub async fn delete_all_vectors(&self) -> Result<()> {
		if self.client.collection_exists(self.collection.clone()).await? {
			self.client.delete_collection(self.collection.clone()).await?;
		}

		self.ensure_collection().await
	}
}

/// Point ids must be UUIDs or integers, so catalog identifiers map to a stable UUIDv5.
pub fn point_id_for(full_ident: &str) -> Uuid {
	Uuid::new_v5(&Uuid::NAMESPACE_OID, full_ident.as_bytes())
}

pub fn metadata_fields(metadata: &VectorMetadata) -> Vec<(&'static str, JsonValue)> {
	vec![
		("Title", JsonValue::String(metadata.title.clone())),
		("FullIdent", JsonValue::String(metadata.full_ident.clone())),
		("Tags", JsonValue::from(metadata.tags.clone())),
		("Summary", metadata.summary.clone().map(JsonValue::String).unwrap_or(JsonValue::Null)),
		("Type", JsonValue::String(metadata.type_name.clone())),
		("Thumb", JsonValue::String(metadata.thumb.clone())),
		("Created", JsonValue::from(metadata.created)),
		("Updated", JsonValue::from(metadata.updated)),
	]
}

pub fn decode_payload(payload: HashMap<String, Value>) -> Result<VectorMetadata> {
	let fields: Map<String, JsonValue> =
		payload.into_iter().map(|(key, value)| (key, to_json(value))).collect();

	serde_json::from_value(JsonValue::Object(fields))
		.map_err(|err| Error::MalformedPayload(err.to_string()))
}

fn to_point(vector: &IndexedVector) -> PointStruct {
	let mut payload = Payload::new();

	for (key, value) in metadata_fields(&vector.metadata) {
		payload.insert(key, value);
	}

	let mut vectors = HashMap::new();

	vectors.insert(DENSE_VECTOR_NAME.to_string(), Vector::from(vector.values.clone()));

	PointStruct::new(point_id_for(&vector.id).to_string(), vectors, payload)
}

fn to_filter(filter: &MetadataFilter) -> Filter {
	match filter {
		MetadataFilter::TimestampAtLeast { direction, since } =>
			Filter::must([timestamp_at_least(*direction, *since)]),
		MetadataFilter::TypeIn(types) =>
			Filter::must([Condition::matches("Type", types.clone())]),
	}
}

fn timestamp_at_least(direction: Direction, since: i64) -> Condition {
	Condition::range(
		direction.metadata_key(),
		Range { gte: Some(since as f64), ..Default::default() },
	)
}

fn from_scored_point(point: ScoredPoint) -> Result<IndexMatch> {
	let score = point.score;
	let metadata = decode_payload(point.payload)?;

	Ok(IndexMatch { id: metadata.full_ident.clone(), score, metadata })
}

fn to_json(value: Value) -> JsonValue {
	match value.kind {
		None | Some(Kind::NullValue(_)) => JsonValue::Null,
		Some(Kind::BoolValue(flag)) => JsonValue::Bool(flag),
		Some(Kind::IntegerValue(number)) => JsonValue::from(number),
		Some(Kind::DoubleValue(number)) => JsonValue::from(number),
		Some(Kind::StringValue(text)) => JsonValue::String(text),
		Some(Kind::ListValue(list)) =>
			JsonValue::Array(list.values.into_iter().map(to_json).collect()),
		Some(Kind::StructValue(object)) => JsonValue::Object(
			object.fields.into_iter().map(|(key, value)| (key, to_json(value))).collect(),
		),
	}
}
