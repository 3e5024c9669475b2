use rust_decimal::Decimal;
use serde::Serialize;
use soundchain_core::config::{AppConfig, LoadOptions};
use soundchain_core::domain::terms::{NegotiationRequest, Territory, UsageRight};
use soundchain_core::licensing::{DeterministicLicensingRuntime, LicensingRuntime};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(options: LoadOptions, json_output: bool) -> String {
    let report = build_report(options);

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_backend_credentials(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "backend_credentials",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }
    checks.push(check_pricing_engine());

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_backend_credentials(config: &AppConfig) -> DoctorCheck {
    let configured = config.configured_backends();
    if configured.is_empty() {
        return DoctorCheck {
            name: "backend_credentials",
            status: CheckStatus::Fail,
            details: "no text-generation backend has an API key".to_string(),
        };
    }

    DoctorCheck {
        name: "backend_credentials",
        status: CheckStatus::Pass,
        details: format!("configured: {}", configured.join(", ")),
    }
}

/// 100 with YOUTUBE + COMMERCIAL worldwide must price at exactly 255.
fn check_pricing_engine() -> DoctorCheck {
    let request = NegotiationRequest {
        usage_rights: vec![
            UsageRight::new(UsageRight::YOUTUBE),
            UsageRight::new(UsageRight::COMMERCIAL),
        ],
        exclusivity: false,
        territory: Territory::Worldwide,
        duration_months: None,
    };
    let breakdown =
        DeterministicLicensingRuntime::default().calculate_price(Decimal::new(100, 0), &request);
    let expected = Decimal::new(255, 0);

    if breakdown.final_price == expected {
        DoctorCheck {
            name: "pricing_engine",
            status: CheckStatus::Pass,
            details: format!("reference quote priced at {}", breakdown.final_price),
        }
    } else {
        DoctorCheck {
            name: "pricing_engine",
            status: CheckStatus::Fail,
            details: format!(
                "reference quote priced at {}, expected {expected}",
                breakdown.final_price
            ),
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
