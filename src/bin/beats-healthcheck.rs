/// Beats Health Check Client
///
/// Queries the running beats service's /api/health endpoint. A
/// lightweight CLI probe suitable for systemd watchdogs, Kubernetes
/// liveness probes, and operator scripts.
///
/// Usage:
///   beats-healthcheck                       # default: http://127.0.0.1:8080
///   beats-healthcheck http://10.0.0.1:8080  # custom service address
///   BEATS_API_URL=http://10.0.0.1:8080 beats-healthcheck
use std::process;

#[tokio::main]
async fn main() {
    let default_url = "http://127.0.0.1:8080".to_string();
    let base_url = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("BEATS_API_URL").ok())
        .unwrap_or(default_url);

    let health_url = format!("{}/api/health", base_url);

    let client = match reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to create HTTP client: {}", e);
            process::exit(1);
        }
    };

    match client.get(&health_url).send().await {
        Ok(resp) if resp.status().is_success() => {
            match resp.json::<serde_json::Value>().await {
                Ok(health) => {
                    println!("Liveness: ALIVE ({})", health_url);
                    if let Some(signer) = health.get("anchor_signer").and_then(|v| v.as_str()) {
                        println!("  anchor signer: {}", signer);
                    }
                    match health.get("anchor").filter(|a| !a.is_null()) {
                        Some(anchor) => {
                            if let Some(index) = anchor.get("beat_index") {
                                println!("  anchor tip: beat {}", index);
                            }
                            if let Some(utc) = anchor.get("utc").and_then(|v| v.as_i64()) {
                                let age = chrono::Utc::now().timestamp_millis() - utc;
                                println!("  tip age: {}s", age / 1000);
                            }
                        }
                        None => println!("  anchor tip: none yet (cold start)"),
                    }
                    if let Some(ops) = health.get("operations") {
                        println!("  operations: {}", ops);
                    }
                    println!("Service is healthy");
                }
                Err(e) => {
                    eprintln!("Health response parse error: {}", e);
                    process::exit(1);
                }
            }
        }
        Ok(resp) => {
            eprintln!("DEGRADED (HTTP {})", resp.status());
            process::exit(1);
        }
        Err(e) => {
            eprintln!("UNREACHABLE: {}", e);
            eprintln!("Is beats running? Check with: ps aux | grep beats");
            process::exit(1);
        }
    }
}
