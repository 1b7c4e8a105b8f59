use std::io::Write;

use pva_server::AccessAttrs;
use pva_server::DefinitionError;
use pva_server::Error;
use tempfile::NamedTempFile;

use crate::common::start_local_server;

fn definitions_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

const IOC_DEFINITIONS: &str = r#"
[[records]]
name = "$(P)temperature"
value = 21

[[records]]
name = "$(P)setpoint"
value = ${DEFAULT_SP}
access_level = 1
access_group = "operators"
"#;

#[test]
fn test_initialize_from_file_serves_defined_records() {
    let (runtime, server) = start_local_server();
    let file = definitions_file(IOC_DEFINITIONS);

    let published = server
        .initialize_from_file(file.path(), Some("P=LAB:,DEFAULT_SP=40"))
        .unwrap();
    server.start().unwrap();

    assert_eq!(published, 2);
    assert!(server.is_definitions_active());
    assert_eq!(runtime.client_get("LAB:temperature").unwrap(), 21);
    assert_eq!(runtime.client_get("LAB:setpoint").unwrap(), 40);
    assert_eq!(
        server.record("LAB:setpoint").unwrap().access_attrs(),
        Some(&AccessAttrs::new(1, "operators"))
    );
    server.stop();
}

#[test]
fn test_initialize_with_missing_macro_publishes_nothing() {
    let (runtime, server) = start_local_server();
    let file = definitions_file(IOC_DEFINITIONS);

    let result = server.initialize_from_file(file.path(), Some("P=LAB:"));

    assert!(matches!(
        result,
        Err(Error::Definition(DefinitionError::UnresolvedMacro { ref name })) if name == "DEFAULT_SP"
    ));
    assert!(!server.is_definitions_active());
    assert!(runtime.attached_channels().is_empty());
}

#[test]
fn test_initialize_conflicting_with_existing_record_rolls_back() {
    let (runtime, server) = start_local_server();
    server.add_record("LAB:setpoint", 7, None).unwrap();
    let file = definitions_file(IOC_DEFINITIONS);

    let err = server
        .initialize_from_file(file.path(), Some("P=LAB:,DEFAULT_SP=40"))
        .unwrap_err();

    assert!(err.is_already_exists());
    assert_eq!(server.record_names(), vec!["LAB:setpoint".to_string()]);
    assert_eq!(runtime.attached_channels(), vec!["LAB:setpoint".to_string()]);
    assert_eq!(server.record("LAB:setpoint").unwrap().value(), 7);
}
