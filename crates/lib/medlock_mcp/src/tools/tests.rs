use serde_json::Value;

use crate::server::MedlockMcpServer;
use crate::tools::vitals::{self, ScanDevice, VitalsScanRequest};

#[test]
fn server_exposes_two_tools() {
    let tools = MedlockMcpServer::list_tools();
    let mut names: Vec<&str> = tools.iter().map(|t| t.name.as_ref()).collect();
    names.sort_unstable();
    // Session info is a resource, not a tool.
    assert_eq!(names, vec!["solid_fetch_vitals", "vitals_scan"]);
}

#[test]
fn vitals_scan_schema_requires_device() {
    let tools = MedlockMcpServer::list_tools();
    let scan = tools
        .iter()
        .find(|t| t.name == "vitals_scan")
        .expect("vitals_scan registered");
    let schema = serde_json::to_value(scan.input_schema.as_ref()).unwrap();
    let required = schema["required"].as_array().expect("required list");
    assert!(required.contains(&Value::String("device".into())));
}

#[test]
fn device_accepts_only_front_and_rear() {
    let front: VitalsScanRequest = serde_json::from_str(r#"{"device":"front"}"#).unwrap();
    assert_eq!(front.device, ScanDevice::Front);
    let rear: VitalsScanRequest = serde_json::from_str(r#"{"device":"rear"}"#).unwrap();
    assert_eq!(rear.device, ScanDevice::Rear);
    assert!(serde_json::from_str::<VitalsScanRequest>(r#"{"device":"side"}"#).is_err());
    assert!(serde_json::from_str::<VitalsScanRequest>("{}").is_err());
}

#[test]
fn latest_vitals_shape() {
    let v = serde_json::to_value(vitals::latest_vitals()).unwrap();
    assert_eq!(v["heart_rate"]["unit"], "bpm");
    assert_eq!(v["blood_pressure"]["diastolic"], 80);
    assert_eq!(v["blood_pressure"]["unit"], "mmHg");
}

#[test]
fn scan_url_trims_trailing_slash() {
    let s = vitals::scan_instructions("http://localhost:8787/", ScanDevice::Front);
    assert_eq!(s.scan_url, "http://localhost:8787/scan/front");
}
