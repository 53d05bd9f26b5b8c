//! Prompt text for both synthesis stages.

use crate::models::{ENTRY_POINT, FieldSchema, ModelCatalog};
use crate::reasoning::ChatRequest;
use std::fmt::Write as _;

const MODEL_SELECTION_SYSTEM: &str = "You are an Odoo expert. Given the user's goal and the \
complete list of Odoo models, answer ONLY with a JSON object holding a single key \
\"relevant_models\" whose value is the list of model names needed to reach the goal. \
Use model names exactly as they appear in the list.";

/// Rules every generated transformation must follow, in order.
pub const TRANSFORMATION_RULES: [&str; 6] = [
    "Define exactly one relation named `transform_data` with `CREATE VIEW transform_data AS ...`. \
     It reads only the extracted tables and yields exactly one result table. Helper views created \
     beforehand are allowed. Address a table by its quoted model name (\"sale.order\") or by its \
     underscore alias (sale_order).",
    "Every column whose name contains 'date' is already a UTC timestamp with invalid values set to \
     NULL. If you need to parse a date again, use TRY_CAST so invalid values become NULL.",
    "Numeric columns (ids, amounts, prices, quantities, totals, balances, costs, taxes, discounts, \
     weights, volumes) are already numeric with invalid values set to NULL. Any further conversion \
     must use TRY_CAST.",
    "Never reference a field or a model that is not in the provided schema. To use a field of a \
     related record, request that model and field in models_and_fields and join explicitly, for \
     example ON account_move_line.move_id = account_move.id.",
    "All date and time literals are UTC, for example TIMESTAMP '2024-01-01T00:00:00Z'. Only \
     compare timestamps with timestamps of the same kind.",
    "After a join, compute derived columns on the joined relation. Never align a column from one \
     table onto another table of different cardinality.",
];

/// Reference fields arrive as bare ids; `id` must be requested to join on it.
const TABLE_SHAPE_NOTE: &str = "Each requested model becomes one table with exactly the requested \
fields as columns. Many2one fields hold the referenced record id; one2many and many2many fields \
hold a JSON text list of ids. Request `id` explicitly when a join needs it.";

/// The goal and optional document, shared by both stages.
fn goal_section(goal: &str, document_text: Option<&str>) -> String {
    format!(
        "User goal: {}\n\nProvided document content:\n{}",
        goal.trim(),
        document_text
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .unwrap_or("None")
    )
}

/// Stage 1: choose relevant models from the full catalog.
pub fn model_selection_request(
    goal: &str,
    document_text: Option<&str>,
    catalog: &ModelCatalog,
) -> ChatRequest {
    let models: Vec<&str> = catalog.iter().collect();
    let user = format!(
        "{}\n\nAvailable models: {}",
        goal_section(goal, document_text),
        models.join(", ")
    );
    ChatRequest::new(MODEL_SELECTION_SYSTEM, user)
}

/// The fixed stage 2 system prompt.
pub fn procedure_synthesis_system() -> String {
    let mut system = String::from(
        "You are an Odoo and SQL expert. Produce an extraction plan and a SQL transformation. \
         Answer ONLY with a JSON object holding two keys: \"models_and_fields\", an object mapping \
         each model name to the list of fields to extract, and \"transform_sql\", a string with \
         the SQL statements of the transformation.\n\n",
    );
    system.push_str(TABLE_SHAPE_NOTE);
    system.push_str("\n\nRules:\n");
    for (index, rule) in TRANSFORMATION_RULES.iter().enumerate() {
        let _ = writeln!(system, "{}. {}", index + 1, rule);
    }
    let _ = write!(
        system,
        "\nThe result is read from `{}`; a transformation that does not define it is rejected.",
        ENTRY_POINT
    );
    system
}

/// Stage 2: choose fields and write the transformation over the targeted schema.
///
/// The schema is rendered as pretty JSON (model to sorted field list).
pub fn procedure_synthesis_request(
    goal: &str,
    document_text: Option<&str>,
    schema: &FieldSchema,
) -> crate::Result<ChatRequest> {
    let rendered = serde_json::to_string_pretty(schema)
        .map_err(|e| crate::OdooSynthError::serialization("Failed to render field schema", e))?;

    let user = format!(
        "{}\n\nSchema of the relevant models:\n{}",
        goal_section(goal, document_text),
        rendered
    );
    Ok(ChatRequest::new(procedure_synthesis_system(), user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_selection_request_lists_catalog() {
        let catalog = ModelCatalog::new(["sale.order", "res.users"]);
        let request = model_selection_request("Monthly revenue", None, &catalog);

        let user = request.user_text().unwrap();
        assert!(user.contains("User goal: Monthly revenue"));
        assert!(user.contains("res.users, sale.order"));
        assert!(user.contains("content:\nNone"));
    }

    #[test]
    fn test_document_text_included() {
        let catalog = ModelCatalog::new(["sale.order"]);
        let request =
            model_selection_request("Revenue", Some("Quarterly targets: 10k"), &catalog);
        assert!(request.user_text().unwrap().contains("Quarterly targets: 10k"));
    }

    #[test]
    fn test_system_prompt_has_every_rule() {
        let system = procedure_synthesis_system();
        for index in 1..=TRANSFORMATION_RULES.len() {
            assert!(system.contains(&format!("\n{}. ", index)));
        }
        assert!(system.contains("transform_sql"));
        assert!(system.contains("TRY_CAST"));
    }

    #[test]
    fn test_procedure_request_renders_sorted_schema() {
        let mut schema = FieldSchema::new();
        schema.insert("sale.order", ["user_id", "amount_total", "date_order"]);

        let request = procedure_synthesis_request("Revenue", None, &schema).unwrap();
        let user = request.user_text().unwrap();
        let amount = user.find("amount_total").unwrap();
        let user_id = user.find("user_id").unwrap();
        assert!(amount < user_id);
        assert!(user.contains("\"sale.order\""));
    }
}
