use std::fs;

use actito_sdk::{ActitoClient, ActitoConfig, ActitoError};

fn load_live_config() -> Result<ActitoConfig, String> {
    if let Ok(config) = ActitoConfig::from_env() {
        return Ok(config);
    }

    let content = fs::read_to_string("ActitoServices.json").map_err(|_| {
        "ACTITO_APPLICATION_KEY/ACTITO_APPLICATION_SECRET env or ActitoServices.json is required"
            .to_owned()
    })?;
    ActitoConfig::from_json_str(&content)
        .map_err(|err| format!("ActitoServices.json could not be used: {err}"))
}

#[tokio::test]
async fn live_application_info_and_missing_pass() {
    let config = match load_live_config() {
        Ok(config) => config,
        Err(_) => {
            eprintln!("skipping live test: credentials not found in env or ActitoServices.json");
            return;
        }
    };

    let client = ActitoClient::new(config).expect("services URL must be valid");

    let application = client
        .fetch_application()
        .await
        .expect("application info must load");
    assert!(!application.id.is_empty());
    assert!(!application.name.is_empty());

    let err = client
        .fetch_pass("definitely-not-a-real-serial-0000")
        .await
        .expect_err("unknown serial must fail");
    match err {
        ActitoError::Network(inner) => {
            assert!(!inner.is_retryable(), "client errors are final: {inner}")
        }
        other => panic!("expected network error, got {other:?}"),
    }
}
