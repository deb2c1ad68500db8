//! Example demonstrating recognition tracing instrumentation.
//!
//! Run with: cargo run -p brickscan-core --example recognize_tracing -- brick.jpg

use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};
use brickscan_core::{RecognitionClient, RecognitionConfig};

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::new("brickscan_core=debug,info"))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    println!("=== Brickognize Tracing Demo ===\n");

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("Usage: recognize_tracing <IMAGE>");
        return;
    };

    let image = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to read {}: {}", path, e);
            return;
        }
    };

    let config = RecognitionConfig {
        request_timeout: Duration::from_secs(15),
        ..RecognitionConfig::from_env()
    };

    println!("Config: {:?}\n", config);

    let client = match RecognitionClient::with_http(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create client: {}", e);
            return;
        }
    };

    println!("\nUploading {} bytes...\n", image.len());

    match client.recognize(&image).await {
        Ok(result) => {
            println!("\n✅ Success!");
            println!("   Name:       {}", result.name);
            println!("   Identifier: {}", result.identifier.as_deref().unwrap_or("-"));
            println!(
                "   Confidence: {}",
                result.confidence_percent().as_deref().unwrap_or("-")
            );
        }
        Err(e) => {
            println!("\n❌ Failed ({}): {}", e.kind(), e.user_message());
        }
    }
}
