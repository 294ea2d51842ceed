use std::sync::Arc;

use eve_client::HttpConnector;
use eve_core::EveCore;
use eve_domain::config::ConfigSeverity;

use super::LoadedConfig;

/// Run the diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes.
pub async fn run(loaded: &LoadedConfig) -> anyhow::Result<bool> {
    println!("eveng-mcp check");
    println!("===============\n");

    let mut all_passed = true;

    let exists = std::path::Path::new(&loaded.path).exists();
    print_check(
        "Config file",
        true,
        if exists {
            loaded.path.clone()
        } else {
            format!("{} not found (using defaults)", loaded.path)
        },
    );

    let issues = super::config::issues(loaded);
    let errors = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    print_check(
        "Config validation",
        errors == 0,
        format!("{} issue(s) ({errors} error(s))", issues.len()),
    );
    for issue in &issues {
        println!("      {issue}");
    }
    if errors > 0 {
        all_passed = false;
    }

    let core = EveCore::new(&loaded.config, Arc::new(HttpConnector));
    let endpoint = core.snapshot().endpoint;
    match core.server_status().await {
        Ok(info) => {
            let version = info.version.unwrap_or_else(|| "unknown".into());
            print_check("EVE-NG reachable", true, format!("{endpoint} (version {version})"));
        }
        Err(e) => {
            print_check("EVE-NG reachable", false, format!("{endpoint}: {e}"));
            all_passed = false;
        }
    }
    if let Err(e) = core.disconnect().await {
        tracing::warn!(error = %e, "logout after check failed");
    }

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }
    Ok(all_passed)
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
