//! Navigator: conversational retrieval and tool invocation server.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use navigator_chat::LLMConfig;
use navigator_core::NavigatorConfig;
use navigator_server::{build_router, AppState};

fn resolve_data_dir() -> PathBuf {
    std::env::var("NAVIGATOR_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real env vars still apply.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if let Some(command) = args.get(1) {
        match command.as_str() {
            "--help" | "-h" | "help" => {
                println!("Navigator: retrieval chat and tool invocation server");
                println!();
                println!("Usage: navigator [help]");
                println!();
                println!("Environment:");
                println!("  NAVIGATOR_DATA_DIR       Data directory (llm-config.json, documents.json)");
                println!("  PORT                     Listen port (default 3000)");
                println!("  OPENAI_API_KEY, ANTHROPIC_API_KEY, GROQ_API_KEY, GOOGLE_API_KEY");
                println!("  SUPABASE_URL, SUPABASE_PRIVATE_KEY");
                return Ok(());
            }
            other => {
                eprintln!("Unknown command: {}. Use 'navigator help' for usage.", other);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = NavigatorConfig::from_env(&data_dir)?;
    let llm_config = LLMConfig::load(&config.data_paths.llm_config_file);
    let port = config.port;

    let state = Arc::new(AppState::from_config(&config, &llm_config).await);
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Navigator server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
