use super::*;
use qdrant_client::qdrant::condition::ConditionOneOf;
use qdrant_client::qdrant::r#match::MatchValue;

fn sample_payload() -> PagePayload {
    PagePayload {
        page_number: 7,
        page_text: "Revenue was $5M in 2023".to_string(),
        page_table: "year,revenue\n2023,5M".to_string(),
        tenant_id: "acme".to_string(),
    }
}

fn field_match(condition: &Condition) -> (&str, &MatchValue) {
    match condition.condition_one_of.as_ref() {
        Some(ConditionOneOf::Field(field)) => {
            let value = field
                .r#match
                .as_ref()
                .and_then(|m| m.match_value.as_ref())
                .expect("field condition should carry a match");
            (field.key.as_str(), value)
        }
        other => panic!("expected a field condition, got {:?}", other),
    }
}

#[test]
fn tenant_filter_uses_exact_keyword_match() {
    let filter = to_qdrant_filter(&PointFilter::tenant("acme"));

    assert_eq!(filter.must.len(), 1);
    let (key, value) = field_match(&filter.must[0]);
    assert_eq!(key, payload_fields::TENANT_ID);
    assert_eq!(value, &MatchValue::Keyword("acme".to_string()));
}

#[test]
fn page_filter_adds_integer_any_match() {
    let filter = to_qdrant_filter(&PointFilter::tenant("acme").with_pages([1, 2, 3]));

    assert_eq!(filter.must.len(), 2);
    let (key, value) = field_match(&filter.must[1]);
    assert_eq!(key, payload_fields::PAGE_NUMBER);
    match value {
        MatchValue::Integers(integers) => assert_eq!(integers.integers, vec![1, 2, 3]),
        other => panic!("expected integer match, got {:?}", other),
    }
}

#[test]
fn payload_survives_conversion() {
    let payload = sample_payload();
    let converted: HashMap<String, Value> = to_payload(&payload)
        .expect("payload should convert")
        .into();

    let restored = from_payload(&converted).expect("payload should parse back");
    assert_eq!(restored, payload);
}

#[test]
fn missing_payload_field_is_reported() {
    let mut converted: HashMap<String, Value> = to_payload(&sample_payload())
        .expect("payload should convert")
        .into();
    converted.remove(payload_fields::TENANT_ID);

    let err = from_payload(&converted).expect_err("missing tenant should fail");
    assert!(err.to_string().contains(payload_fields::TENANT_ID));
}

#[test]
fn uuid_point_ids_render_as_strings() {
    let id = PointId::from("c5a4f1de-4a62-5c64-9d1b-1f7c6f2e4b1a".to_string());
    assert_eq!(
        point_id_string(Some(&id)),
        "c5a4f1de-4a62-5c64-9d1b-1f7c6f2e4b1a"
    );

    let numeric = PointId::from(42_u64);
    assert_eq!(point_id_string(Some(&numeric)), "42");
    assert_eq!(point_id_string(None), "");
}

#[test]
fn error_classification() {
    assert!(matches!(
        classify_error("search", "status: Unavailable, message: \"tcp connect error\""),
        RetrieverError::Connection(_)
    ));
    assert!(matches!(
        classify_error("search", "Wrong input: Not existing vector name error: manhattan"),
        RetrieverError::CollectionState(_)
    ));
    assert!(matches!(
        classify_error("upsert", "Bad request: payload too large"),
        RetrieverError::Database(_)
    ));
}

#[test]
fn distance_mapping() {
    assert_eq!(qdrant_distance(DistanceMetric::Cosine), Distance::Cosine);
    assert_eq!(qdrant_distance(DistanceMetric::Euclidean), Distance::Euclid);
    assert_eq!(qdrant_distance(DistanceMetric::Manhattan), Distance::Manhattan);
}

#[test]
fn client_builds_without_connecting() {
    let config = QdrantConfig::default();
    let store = QdrantStore::new(&config).expect("client should build lazily");
    assert_eq!(store.url(), config.url);
}
