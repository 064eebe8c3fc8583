//! Tests for fieldlink-model types.

use fieldlink_model::{
    Classification, FieldDescriptor, FieldMapping, FormSchema, MappingSet, MatchMethod,
};

#[test]
fn descriptor_defaults_when_deserializing() {
    let json = r#"{"field_id": "pt1_name", "display_label": "Family Name"}"#;
    let field: FieldDescriptor = serde_json::from_str(json).expect("deserialize descriptor");
    assert_eq!(field.classification, Classification::Mappable);
    assert!(field.section.is_empty());
    assert!(!field.required);
}

#[test]
fn exempt_fields_are_not_mappable() {
    let schema = FormSchema::new(
        "G-28",
        "Notice of Entry of Appearance",
        vec![
            FieldDescriptor::new("client_name", "Family Name"),
            FieldDescriptor::new("attorney_name", "Attorney Name").exempt(),
        ],
    )
    .expect("valid schema");
    let ids: Vec<_> = schema.mappable_fields().map(|f| f.field_id.as_str()).collect();
    assert_eq!(ids, vec!["client_name"]);
}

#[test]
fn mapping_serialized_shape_is_stable() {
    let mapping = FieldMapping {
        target_field: "LastName".to_string(),
        method: MatchMethod::Synonym,
        confidence: 0.95,
        ..FieldMapping::unmapped("I-589", "pt1_family_name", "Contact")
    };
    insta::assert_json_snapshot!(mapping, @r#"
    {
      "form_id": "I-589",
      "field_id": "pt1_family_name",
      "target_object": "Contact",
      "target_field": "LastName",
      "method": "synonym",
      "confidence": 0.95,
      "approved": false,
      "approved_by": "",
      "approved_at": null
    }
    "#);
}

#[test]
fn mapping_set_reads_documents_without_optional_keys() {
    let json = r#"{
        "form_id": "I-765",
        "mappings": [{
            "form_id": "I-765",
            "field_id": "dob",
            "target_object": "Contact",
            "target_field": "Birthdate",
            "method": "exact",
            "confidence": 1.0,
            "approved": true
        }]
    }"#;
    let set: MappingSet = serde_json::from_str(json).expect("deserialize set");
    assert_eq!(set.version, 1);
    assert!(set.last_auto_mapped.is_none());
    assert_eq!(set.approved().count(), 1);
}
