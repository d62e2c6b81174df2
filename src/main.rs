mod cli;

use std::env;
use std::fs;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use timebridge::clients::gemini::GeminiClient;
use timebridge::clients::google_calendar::{CredentialBundle, GoogleCalendarClient};
use timebridge::config::AppConfig;
use timebridge::context::RequestContext;
use timebridge::handlers::HandlerRegistry;
use timebridge::service::assistant::CalendarAssistant;
use timebridge::service::gateway::AssistantGateway;
use timebridge::service::retry::RetryPolicy;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Cli::parse();
    let config = args
        .config
        .clone()
        .or_else(|| env::var("CONFIG_FILE").ok())
        .map(|path| AppConfig::from_file(&path).unwrap_or_default())
        .unwrap_or_default();

    let get_prop = |key: &str| -> Option<String> { config.get(key).or_else(|| env::var(key).ok()) };

    match args.command {
        Commands::Chat { message, timezone } => {
            let api_key = get_prop("GEMINI_API_KEY").expect("GEMINI_API_KEY must be set");
            let credentials_path = get_prop("GOOGLE_CREDENTIALS_FILE")
                .expect("GOOGLE_CREDENTIALS_FILE must be set");
            let credentials: CredentialBundle = fs::read_to_string(&credentials_path)
                .ok()
                .and_then(|raw| serde_json::from_str(&raw).ok())
                .expect("GOOGLE_CREDENTIALS_FILE must hold a valid credential bundle");

            let default_tz = config.default_timezone();
            let gateway =
                AssistantGateway::new(Arc::new(GeminiClient::new(api_key)), default_tz);
            let registry = HandlerRegistry::with_calendar(
                Arc::new(GoogleCalendarClient::new(credentials)),
                RetryPolicy::default(),
                config.conflict_policy(),
                default_tz,
            );
            let assistant = CalendarAssistant::new(gateway, registry);

            let mut ctx = RequestContext::new();
            if let Some(tz) = timezone.and_then(|name| name.parse().ok()) {
                ctx = ctx.with_timezone(tz);
            }

            let response = assistant.handle_message(&message, &ctx).await;
            match serde_json::to_string_pretty(&response) {
                Ok(rendered) => println!("{rendered}"),
                Err(_) => println!("{}", response.message),
            }
        }
    }
}
