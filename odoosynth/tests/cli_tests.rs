//! Argument parsing and settings resolution for the odoosynth CLI.

#![allow(clippy::unwrap_used)]

use clap::Parser;
use odoosynth::output::{load_plan, save_plan};
use odoosynth::{Cli, Command, read_document, resolve_connection, resolve_reasoning};
use odoosynth_core::{
    ExtractionPlan, FieldSchema, OdooSynthError, SynthesizedPlan, TransformationProcedure,
};
use std::io::Write;

const ENV_VARS: &[&str] = &[
    "ODOO_URL",
    "ODOO_DB",
    "ODOO_LOGIN",
    "ODOO_API_KEY",
    "OPENAI_API_KEY",
    "OPENAI_BASE_URL",
    "OPENAI_MODEL",
    "ODOOSYNTH_MASTER_KEY",
];

/// Runs `f` with every variable the CLI reads cleared, then `set` applied.
fn with_env<R>(set: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
    let vars: Vec<(&str, Option<&str>)> = ENV_VARS
        .iter()
        .map(|name| {
            let value = set.iter().find(|(key, _)| key == name).map(|(_, v)| *v);
            (*name, value)
        })
        .collect();
    temp_env::with_vars(vars, f)
}

/// Single-page PDF showing `text` in Helvetica.
fn single_page_pdf(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
         /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (index, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", index + 1, body).as_bytes());
    }

    let xref_offset = pdf.len();
    let mut tail = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        tail.push_str(&format!("{:010} 00000 n \n", offset));
    }
    tail.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));
    pdf.extend_from_slice(tail.as_bytes());
    pdf
}

#[test]
fn test_parse_plan_command() {
    let cli = with_env(&[], || {
        Cli::try_parse_from([
            "odoosynth",
            "-vv",
            "plan",
            "--goal",
            "Monthly revenue by salesperson",
            "--document",
            "brief.txt",
        ])
        .unwrap()
    });

    assert_eq!(cli.global.verbose, 2);
    match cli.command {
        Command::Plan(args) => {
            assert_eq!(args.goal.goal, "Monthly revenue by salesperson");
            assert_eq!(args.goal.document.unwrap().to_str(), Some("brief.txt"));
            assert_eq!(args.output.to_str(), Some("plan.json"));
        }
        _ => panic!("expected plan command"),
    }
}

#[test]
fn test_goal_is_required() {
    let result = with_env(&[], || Cli::try_parse_from(["odoosynth", "run"]));
    assert!(result.is_err());
}

#[test]
fn test_connection_from_environment() {
    let connection = with_env(
        &[
            ("ODOO_URL", "https://erp.example.com"),
            ("ODOO_DB", "prod"),
            ("ODOO_LOGIN", "admin"),
            ("ODOO_API_KEY", "key-from-env"),
        ],
        || {
            let cli = Cli::try_parse_from(["odoosynth", "models"]).unwrap();
            resolve_connection(&cli.connection).unwrap()
        },
    );

    assert_eq!(connection.database(), "prod");
    assert_eq!(connection.login(), "admin");
    assert_eq!(connection.credential().expose(), "key-from-env");
}

#[test]
fn test_flags_override_environment() {
    let connection = with_env(&[("ODOO_DB", "prod"), ("ODOO_API_KEY", "k")], || {
        let cli = Cli::try_parse_from([
            "odoosynth",
            "--odoo-url",
            "http://localhost:8069",
            "--odoo-db",
            "staging",
            "--odoo-login",
            "admin",
            "models",
        ])
        .unwrap();
        resolve_connection(&cli.connection).unwrap()
    });

    assert_eq!(connection.database(), "staging");
    assert_eq!(connection.jsonrpc_url(), "http://localhost:8069/jsonrpc");
}

#[test]
fn test_credential_from_key_file() {
    let mut key_file = tempfile::NamedTempFile::new().unwrap();
    writeln!(key_file, "  key-from-file  ").unwrap();
    let path = key_file.path().to_str().unwrap().to_string();

    let connection = with_env(
        &[
            ("ODOO_URL", "https://erp.example.com"),
            ("ODOO_DB", "prod"),
            ("ODOO_LOGIN", "admin"),
        ],
        || {
            let cli = Cli::try_parse_from(["odoosynth", "models", "--api-key-file", &path]).unwrap();
            resolve_connection(&cli.connection).unwrap()
        },
    );

    assert_eq!(connection.credential().expose(), "key-from-file");
}

#[test]
fn test_credential_missing_key() {
    let error = with_env(
        &[
            ("ODOO_URL", "https://erp.example.com"),
            ("ODOO_DB", "prod"),
            ("ODOO_LOGIN", "admin"),
        ],
        || {
            let cli = Cli::try_parse_from(["odoosynth", "models"]).unwrap();
            resolve_connection(&cli.connection).unwrap_err()
        },
    );

    assert!(matches!(error, OdooSynthError::Configuration { .. }));
    assert!(error.to_string().contains("ODOO_API_KEY"));
}

#[test]
fn test_credential_empty_key_file_rejected() {
    let key_file = tempfile::NamedTempFile::new().unwrap();
    let path = key_file.path().to_str().unwrap().to_string();

    let error = with_env(
        &[
            ("ODOO_URL", "https://erp.example.com"),
            ("ODOO_DB", "prod"),
            ("ODOO_LOGIN", "admin"),
        ],
        || {
            let cli = Cli::try_parse_from(["odoosynth", "models", "--api-key-file", &path]).unwrap();
            resolve_connection(&cli.connection).unwrap_err()
        },
    );

    assert!(matches!(error, OdooSynthError::Credential { .. }));
}

#[test]
fn test_missing_url_named_in_error() {
    let error = with_env(&[("ODOO_DB", "prod")], || {
        let cli = Cli::try_parse_from(["odoosynth", "models"]).unwrap();
        resolve_connection(&cli.connection).unwrap_err()
    });

    assert!(error.to_string().contains("ODOO_URL"));
}

#[test]
fn test_reasoning_settings() {
    let (config, key) = with_env(
        &[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:11434/v1"),
            ("OPENAI_MODEL", "llama3.1"),
        ],
        || {
            let cli = Cli::try_parse_from(["odoosynth", "run", "--goal", "x"]).unwrap();
            resolve_reasoning(&cli.connection).unwrap()
        },
    );

    assert_eq!(config.model, "llama3.1");
    assert_eq!(config.completions_url(), "http://localhost:11434/v1/chat/completions");
    assert_eq!(key.expose(), "sk-test");
}

#[test]
fn test_reasoning_key_required() {
    let result = with_env(&[], || {
        let cli = Cli::try_parse_from(["odoosynth", "run", "--goal", "x"]).unwrap();
        resolve_reasoning(&cli.connection)
    });

    assert!(result.is_err());
}

#[test]
fn test_credential_not_in_help() {
    let help = with_env(&[("ODOO_API_KEY", "very-secret-key")], || {
        use clap::CommandFactory;
        Cli::command().render_long_help().to_string()
    });

    assert!(!help.contains("very-secret-key"));
}

#[test]
fn test_read_text_document() {
    let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    write!(file, "Quarterly targets: 10k per rep").unwrap();

    let text = read_document(Some(file.path())).unwrap().unwrap();
    assert_eq!(text, "Quarterly targets: 10k per rep");
    assert!(read_document(None).unwrap().is_none());
}

#[test]
fn test_read_pdf_document() {
    let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
    file.write_all(&single_page_pdf("Quarterly targets per rep")).unwrap();

    let text = read_document(Some(file.path())).unwrap().unwrap();
    assert!(text.contains("Quarterly targets per rep"));
}

#[test]
fn test_read_broken_pdf_document() {
    let mut file = tempfile::Builder::new().suffix(".PDF").tempfile().unwrap();
    write!(file, "not really a pdf").unwrap();

    let error = read_document(Some(file.path())).unwrap_err();
    assert!(matches!(error, OdooSynthError::Configuration { .. }));
}

#[test]
fn test_read_binary_document_rejected() {
    let mut file = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
    file.write_all(&[0xff, 0xfe, 0x00, 0x81]).unwrap();

    let error = read_document(Some(file.path())).unwrap_err();
    assert!(error.to_string().contains("neither a PDF nor UTF-8"));
}

#[tokio::test]
async fn test_plan_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plan.json");

    let mut schema = FieldSchema::new();
    schema.insert("sale.order", ["amount_total", "date_order"]);
    let plan = SynthesizedPlan {
        plan_id: uuid::Uuid::nil(),
        created_at: chrono::Utc::now(),
        goal: "Revenue".to_string(),
        relevant_models: vec!["sale.order".to_string()],
        extraction_plan: ExtractionPlan::new().with_model("sale.order", ["amount_total"]),
        procedure: TransformationProcedure::new(
            "CREATE VIEW transform_data AS SELECT SUM(amount_total) AS revenue FROM sale_order",
        ),
        field_schema: schema,
        raw_response: "{}".to_string(),
    };

    save_plan(&plan, &path).await.unwrap();
    let loaded = load_plan(&path).await.unwrap();

    assert_eq!(loaded.goal, plan.goal);
    assert_eq!(loaded.extraction_plan, plan.extraction_plan);
    assert_eq!(loaded.procedure, plan.procedure);
    assert_eq!(loaded.field_schema, plan.field_schema);
}

#[tokio::test]
async fn test_load_plan_rejects_garbage() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{\"goal\": 3}}").unwrap();

    let error = load_plan(file.path()).await.unwrap_err();
    assert!(matches!(error, OdooSynthError::Serialization { .. }));
}
