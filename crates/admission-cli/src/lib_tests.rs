//! Tests for the admission-cli library module.

use super::*;
use serial_test::serial;
use std::io::Write;

const CONFIG: &str = r#"
webhooks:
  - name: normalize
    kind: mutating
    failurePolicy: Ignore
    timeout: 2s
    rules:
      - resources: ["clusters"]
        operations: ["update"]
        versions: ["v2"]
    clientConfig:
      url: http://127.0.0.1:9443/mutate
  - name: policy
    kind: validating
    timeout: 500ms
    rules:
      - resources: ["applications/clusters"]
        operations: ["create"]
        versions: ["v2"]
      - resources: ["clusters"]
        operations: ["update"]
        versions: ["v2"]
    clientConfig:
      url: http://127.0.0.1:9443/validate
"#;

fn registry() -> WebhookRegistry {
    WebhookRegistry::from_config(&AdmissionConfig::from_yaml_str(CONFIG).unwrap()).unwrap()
}

#[test]
fn test_cli_parsing() {
    let cli = Cli::try_parse_from([
        "admission-gate",
        "--config",
        "admission.yaml",
        "review",
        "--request",
        "request.json",
        "--stage",
        "validate",
        "--timeout",
        "1500ms",
    ])
    .unwrap();

    assert_eq!(cli.config, Some(PathBuf::from("admission.yaml")));
    match cli.command {
        Commands::Review {
            request,
            stage,
            timeout,
        } => {
            assert_eq!(request, PathBuf::from("request.json"));
            assert_eq!(stage, Stage::Validate);
            assert_eq!(timeout, Some(Duration::from_millis(1500)));
        }
        _ => panic!("Expected Review command"),
    }
}

#[test]
fn test_cli_rejects_bad_timeout() {
    let cli = Cli::try_parse_from([
        "admission-gate",
        "review",
        "--request",
        "request.json",
        "--timeout",
        "soon",
    ]);
    assert!(cli.is_err());
}

#[test]
fn test_check_defaults_to_text() {
    let cli = Cli::try_parse_from(["admission-gate", "check"]).unwrap();
    match cli.command {
        Commands::Check { format } => assert_eq!(format, OutputFormat::Text),
        _ => panic!("Expected Check command"),
    }
}

#[test]
fn test_exit_codes() {
    let config = CliError::Configuration(ConfigError::SourceUnavailable("x".to_string()));
    assert_eq!(config.exit_code(), 1);

    let invalid = CliError::InvalidArgument {
        arg: "request".to_string(),
        message: "bad".to_string(),
    };
    assert_eq!(invalid.exit_code(), 4);
}

#[test]
fn test_summarize_lists_mutating_first() {
    let summaries = summarize(&registry());

    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].name, "normalize");
    assert_eq!(summaries[0].kind, "mutating");
    assert_eq!(summaries[0].failure_policy, "Ignore");
    assert_eq!(summaries[0].timeout, "2s");
    assert_eq!(summaries[1].name, "policy");
    assert_eq!(summaries[1].failure_policy, "Fail");
    assert_eq!(summaries[1].timeout, "500ms");
    assert_eq!(summaries[1].rules, 2);
}

#[test]
fn test_render_check_formats() {
    let summaries = summarize(&registry());

    let text = render_check(&summaries, &OutputFormat::Text).unwrap();
    assert!(text.starts_with("Configuration OK: 2 webhook(s)"));
    assert!(text.contains("policy [validating] policy=Fail timeout=500ms rules=2"));

    let json = render_check(&summaries, &OutputFormat::Json).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed[1]["failurePolicy"], "Fail");
    assert_eq!(parsed[0]["url"], "http://127.0.0.1:9443/mutate");
}

#[test]
fn test_read_request() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(
        br#"{"operation":"update","resource":"clusters","name":"1","version":"v2","object":{"description":"yyy"}}"#,
    )
    .unwrap();

    let request = read_request(file.path()).unwrap();
    assert_eq!(request.resource, "clusters");
    assert_eq!(request.object["description"], "yyy");
}

#[test]
fn test_read_request_rejects_garbage() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(b"[1, 2, 3]").unwrap();

    assert!(matches!(
        read_request(file.path()),
        Err(CliError::InvalidArgument { .. })
    ));
}

mod settings_tests {
    use super::*;

    #[test]
    #[serial]
    fn test_settings_defaults() {
        let settings = load_settings(None).unwrap();

        assert_eq!(settings, CliSettings::default());
        let transport = settings.transport_config().unwrap();
        assert_eq!(transport.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    #[serial]
    fn test_settings_file_and_env_override() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(b"user_agent: from-file\nconnect_timeout: 3s\n")
            .unwrap();

        std::env::set_var("ADMISSION__CONNECT_TIMEOUT", "750ms");
        let settings = load_settings(Some(file.path()));
        std::env::remove_var("ADMISSION__CONNECT_TIMEOUT");

        let settings = settings.unwrap();
        assert_eq!(settings.user_agent, "from-file");
        assert_eq!(settings.connect_timeout, "750ms");
        assert_eq!(
            settings.transport_config().unwrap().connect_timeout,
            Duration::from_millis(750)
        );
    }

    #[test]
    #[serial]
    fn test_settings_invalid_duration() {
        let settings = CliSettings {
            connect_timeout: "whenever".to_string(),
            ..CliSettings::default()
        };

        assert!(matches!(
            settings.transport_config(),
            Err(CliError::InvalidArgument { .. })
        ));
    }
}
