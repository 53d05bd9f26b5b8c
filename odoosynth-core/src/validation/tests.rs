use super::*;
use crate::error::OdooSynthError;

fn schema() -> FieldSchema {
    let mut schema = FieldSchema::new();
    schema.insert("sale.order", ["name", "date_order", "amount_total", "user_id"]);
    schema.insert("res.users", ["name", "login"]);
    schema
}

#[test]
fn test_validators_compile() {
    assert!(initialize_response_validators().is_ok());
}

#[test]
fn test_parse_model_selection() {
    let selection =
        parse_model_selection(r#"{"relevant_models": ["sale.order", "res.users"]}"#).unwrap();
    assert_eq!(selection.relevant_models, vec!["sale.order", "res.users"]);
}

#[test]
fn test_parse_model_selection_empty_list_is_valid() {
    let selection = parse_model_selection(r#"{"relevant_models": []}"#).unwrap();
    assert!(selection.relevant_models.is_empty());
}

#[test]
fn test_parse_model_selection_strips_code_fence() {
    let raw = "```json\n{\"relevant_models\": [\"sale.order\"]}\n```";
    let selection = parse_model_selection(raw).unwrap();
    assert_eq!(selection.relevant_models, vec!["sale.order"]);
}

#[test]
fn test_parse_model_selection_wrong_shape() {
    let raw = r#"{"models": ["sale.order"]}"#;
    match parse_model_selection(raw).unwrap_err() {
        OdooSynthError::PlanResponseMalformed { raw_response, .. } => {
            assert_eq!(raw_response, raw);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(parse_model_selection(r#"{"relevant_models": "sale.order"}"#).is_err());
    assert!(parse_model_selection(r#"{"relevant_models": [1, 2]}"#).is_err());
}

#[test]
fn test_parse_model_selection_not_json() {
    let raw = "Sure! The relevant models are sale.order and res.users.";
    match parse_model_selection(raw).unwrap_err() {
        OdooSynthError::PlanResponseMalformed {
            reason,
            raw_response,
        } => {
            assert!(reason.contains("JSON parsing failed"));
            assert_eq!(raw_response, raw);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_parse_procedure_synthesis() {
    let raw = r#"{
        "models_and_fields": {"sale.order": ["name", "amount_total"]},
        "transform_sql": "CREATE VIEW transform_data AS SELECT name FROM sale_order"
    }"#;

    let synthesis = parse_procedure_synthesis(raw).unwrap();
    assert_eq!(
        synthesis.plan.fields("sale.order"),
        Some(&["name".to_string(), "amount_total".to_string()][..])
    );
    assert!(synthesis.procedure.source().starts_with("CREATE VIEW"));
}

#[test]
fn test_parse_procedure_synthesis_accepts_python_code_alias() {
    let raw = r#"{
        "models_and_fields": {"res.users": ["login"]},
        "python_code": "CREATE VIEW transform_data AS SELECT login FROM res_users"
    }"#;

    let synthesis = parse_procedure_synthesis(raw).unwrap();
    assert!(synthesis.procedure.source().contains("res_users"));
}

#[test]
fn test_parse_procedure_synthesis_prefers_transform_sql() {
    let raw = r#"{
        "models_and_fields": {"res.users": ["login"]},
        "transform_sql": "CREATE VIEW transform_data AS SELECT 1 AS a",
        "python_code": "def transform_data(tables): pass"
    }"#;

    let synthesis = parse_procedure_synthesis(raw).unwrap();
    assert_eq!(
        synthesis.procedure.source(),
        "CREATE VIEW transform_data AS SELECT 1 AS a"
    );
}

#[test]
fn test_parse_procedure_synthesis_missing_procedure() {
    let raw = r#"{"models_and_fields": {"sale.order": ["name"]}}"#;
    assert!(matches!(
        parse_procedure_synthesis(raw),
        Err(OdooSynthError::PlanResponseMalformed { .. })
    ));
}

#[test]
fn test_parse_procedure_synthesis_bad_field_list() {
    let raw = r#"{
        "models_and_fields": {"sale.order": "name"},
        "transform_sql": "CREATE VIEW transform_data AS SELECT 1"
    }"#;
    assert!(matches!(
        parse_procedure_synthesis(raw),
        Err(OdooSynthError::PlanResponseMalformed { .. })
    ));

    let raw = r#"{"models_and_fields": {}, "transform_sql": "CREATE VIEW transform_data AS SELECT 1"}"#;
    assert!(parse_procedure_synthesis(raw).is_err());
}

#[test]
fn test_validate_plan_accepts_known_fields() {
    let plan = ExtractionPlan::new()
        .with_model("sale.order", ["date_order", "amount_total", "user_id"])
        .with_model("res.users", ["name"]);
    assert!(validate_plan(&plan, &schema()).is_ok());
}

#[test]
fn test_validate_plan_unknown_model() {
    let plan = ExtractionPlan::new().with_model("account.move", ["name"]);
    match validate_plan(&plan, &schema()).unwrap_err() {
        OdooSynthError::PlanRejected { model, .. } => assert_eq!(model, "account.move"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_validate_plan_unknown_field() {
    let plan = ExtractionPlan::new().with_model("sale.order", ["name", "margin"]);
    match validate_plan(&plan, &schema()).unwrap_err() {
        OdooSynthError::PlanRejected { model, reason } => {
            assert_eq!(model, "sale.order");
            assert!(reason.contains("margin"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_validate_plan_duplicate_field() {
    let plan = ExtractionPlan::new().with_model("sale.order", ["name", "name"]);
    assert!(matches!(
        validate_plan(&plan, &schema()),
        Err(OdooSynthError::PlanRejected { .. })
    ));
}

#[test]
fn test_validate_plan_empty() {
    assert!(validate_plan(&ExtractionPlan::new(), &schema()).is_err());

    let plan = ExtractionPlan::new().with_model("sale.order", Vec::<String>::new());
    assert!(validate_plan(&plan, &schema()).is_err());
}
