// End-to-end tests for the hepctl binary surface.

use assert_cmd::Command;
use httpmock::prelude::*;
use serde_json::json;

fn hepctl() -> Command {
    let mut cmd = Command::cargo_bin("hepctl").unwrap();
    // Isolate each invocation from the developer's real config and env.
    cmd.env_remove("HEPCTL_HOST")
        .env_remove("HEPCTL_TOKEN")
        .env_remove("HEPCTL_FORMAT");
    cmd
}

#[test]
fn help_lists_resource_subcommands() {
    hepctl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("call"))
        .stdout(predicates::str::contains("export"))
        .stdout(predicates::str::contains("recording"))
        .stdout(predicates::str::contains("interception"))
        .stdout(predicates::str::contains("user"));
}

#[test]
fn call_search_documents_filters() {
    hepctl()
        .args(["call", "search", "--help"])
        .assert()
        .success()
        .stdout(predicates::str::contains("--from"))
        .stdout(predicates::str::contains("--caller"))
        .stdout(predicates::str::contains("--call-id"));
}

#[test]
fn version_without_remote_needs_no_config() {
    let dir = tempfile::tempdir().unwrap();
    hepctl()
        .env("HEPCTL_CONFIG_DIR", dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicates::str::contains("hepctl"))
        .stdout(predicates::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_config_fails_with_json_error() {
    let dir = tempfile::tempdir().unwrap();
    hepctl()
        .env("HEPCTL_CONFIG_DIR", dir.path())
        .args(["user", "list"])
        .assert()
        .failure()
        .stderr(predicates::str::contains(r#"{"error":"#))
        .stderr(predicates::str::contains("host is not configured"));
}

#[test]
fn user_list_renders_table_from_live_response() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/api/v3/users")
            .header("Auth-Token", "secret");
        then.status(200).json_body(json!([
            {"uuid": "u-1", "username": "alice"},
            {"uuid": "u-2", "username": "bob"}
        ]));
    });

    let dir = tempfile::tempdir().unwrap();
    hepctl()
        .env("HEPCTL_CONFIG_DIR", dir.path())
        .args([
            "user",
            "list",
            "--host",
            &server.base_url(),
            "--token",
            "secret",
            "-f",
            "table",
        ])
        .assert()
        .success()
        .stdout(predicates::str::contains("username"))
        .stdout(predicates::str::contains("alice"))
        .stdout(predicates::str::contains("---"));
}

#[test]
fn api_error_reaches_stderr_as_single_line() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v3/users");
        then.status(401).json_body(json!({
            "statuscode": 401,
            "error": "Unauthorized",
            "message": "invalid token"
        }));
    });

    let dir = tempfile::tempdir().unwrap();
    hepctl()
        .env("HEPCTL_CONFIG_DIR", dir.path())
        .args([
            "user",
            "list",
            "--host",
            &server.base_url(),
            "--token",
            "bad",
        ])
        .assert()
        .failure()
        .stdout(predicates::str::is_empty())
        .stderr(predicates::str::contains("HTTP 401: Unauthorized"));
}

#[test]
fn unknown_format_falls_back_to_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = hepctl()
        .env("HEPCTL_CONFIG_DIR", dir.path())
        .args(["version", "-f", "xml"])
        .assert()
        .success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    serde_json::from_str::<serde_json::Value>(&stdout).expect("fallback output should be JSON");
}

#[test]
fn interception_list_hits_collection_endpoint() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v3/interceptions")
            .header("Auth-Token", "secret");
        then.status(200).json_body(json!([
            {"uuid": "i-1", "search_caller": "+4912345", "status": true}
        ]));
    });

    let dir = tempfile::tempdir().unwrap();
    hepctl()
        .env("HEPCTL_CONFIG_DIR", dir.path())
        .args([
            "interception",
            "list",
            "--host",
            &server.base_url(),
            "--token",
            "secret",
        ])
        .assert()
        .success()
        .stdout(predicates::str::contains("+4912345"));
    mock.assert();
}

#[test]
fn interception_create_sends_only_set_fields() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v3/interceptions")
            .json_body(json!({"search_caller": "+4912345", "status": true}));
        then.status(200).json_body(json!({"uuid": "i-9"}));
    });

    let dir = tempfile::tempdir().unwrap();
    hepctl()
        .env("HEPCTL_CONFIG_DIR", dir.path())
        .args([
            "interception",
            "create",
            "--caller",
            "+4912345",
            "--status",
            "true",
            "--host",
            &server.base_url(),
            "--token",
            "secret",
        ])
        .assert()
        .success()
        .stdout(predicates::str::contains("i-9"));
    mock.assert();
}

#[test]
fn interception_delete_cancels_without_confirmation() {
    let dir = tempfile::tempdir().unwrap();
    hepctl()
        .env("HEPCTL_CONFIG_DIR", dir.path())
        .env("HEPCTL_HOST", "https://hepic.example.com")
        .env("HEPCTL_TOKEN", "t")
        .args(["interception", "delete", "i-1"])
        .write_stdin("n\n")
        .assert()
        .success()
        .stderr(predicates::str::contains("Deletion cancelled."));
}

#[test]
fn format_env_applies_to_local_commands() {
    let dir = tempfile::tempdir().unwrap();
    hepctl()
        .env("HEPCTL_CONFIG_DIR", dir.path())
        .env("HEPCTL_FORMAT", "yaml")
        .arg("version")
        .assert()
        .success()
        .stdout(predicates::str::contains("name: hepctl"));
}

#[test]
fn recording_download_rejects_unknown_type() {
    let dir = tempfile::tempdir().unwrap();
    hepctl()
        .env("HEPCTL_CONFIG_DIR", dir.path())
        .env("HEPCTL_HOST", "https://hepic.example.com")
        .env("HEPCTL_TOKEN", "t")
        .args([
            "recording",
            "download",
            "abc-123",
            "--type",
            "video",
            "-o",
            dir.path().join("out.bin").to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicates::str::contains("must be 'audio' or 'pcap'"));
}
