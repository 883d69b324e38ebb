//! Vitals tools: parameter types and response payloads.
//!
//! Readings are fixed sample data until a pod-backed source is wired in.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Camera used for a vitals scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScanDevice {
    Front,
    Rear,
}

impl ScanDevice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanDevice::Front => "front",
            ScanDevice::Rear => "rear",
        }
    }
}

/// Parameters for the `vitals_scan` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct VitalsScanRequest {
    /// Which camera to scan with.
    pub device: ScanDevice,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub value: u32,
    pub unit: &'static str,
    pub timestamp: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BloodPressure {
    pub systolic: u32,
    pub diastolic: u32,
    pub unit: &'static str,
    pub timestamp: &'static str,
}

/// Latest vitals returned by `solid_fetch_vitals`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vitals {
    pub heart_rate: Reading,
    pub blood_pressure: BloodPressure,
}

const SAMPLE_TIMESTAMP: &str = "2024-01-21T10:00:00Z";

pub fn latest_vitals() -> Vitals {
    Vitals {
        heart_rate: Reading {
            value: 72,
            unit: "bpm",
            timestamp: SAMPLE_TIMESTAMP,
        },
        blood_pressure: BloodPressure {
            systolic: 120,
            diastolic: 80,
            unit: "mmHg",
            timestamp: SAMPLE_TIMESTAMP,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub heart_rate: u32,
    pub confidence: f64,
}

/// Response of `vitals_scan`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanInstructions {
    pub status: &'static str,
    pub instructions: &'static str,
    pub scan_url: String,
    pub mock_result: ScanResult,
}

pub fn scan_instructions(base_url: &str, device: ScanDevice) -> ScanInstructions {
    ScanInstructions {
        status: "ready",
        instructions: "Please position your finger on the camera lens",
        scan_url: format!("{}/scan/{}", base_url.trim_end_matches('/'), device.as_str()),
        mock_result: ScanResult {
            heart_rate: 72,
            confidence: 0.95,
        },
    }
}

/// Body of the `session-info` resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub user_id: String,
    pub username: String,
    /// Epoch milliseconds.
    pub last_access_time: i64,
    pub tool_execution_count: u64,
}
