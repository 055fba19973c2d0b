use std::{
    io::{self, Write},
    process::ExitCode,
};

use chat_backend_streams::{
    config::ChatConfig,
    context::{ConversationContext, PriorTurn},
    models::ChatEvent,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONVERSATION_ID: &str = "cli";

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chat_backend_streams=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if prompt.trim().is_empty() {
        eprintln!("usage: chat-backend-streams <prompt>");
        return Ok(ExitCode::from(2));
    }

    let service = chat_backend_streams::build_service(ChatConfig::from_env()?)?;
    let context = ConversationContext::new(None, vec![PriorTurn::user(prompt)]);
    let mut exchange = service.send(CONVERSATION_ID, &context).await;
    let cancel = exchange.cancellation_token();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling exchange");
            cancel.cancel();
        }
    });

    let mut stdout = io::stdout();
    while let Some(event) = exchange.next_event().await {
        match event {
            ChatEvent::Chunk(text) => {
                stdout.write_all(text.as_bytes())?;
                stdout.flush()?;
            }
            ChatEvent::Error(message) => {
                writeln!(stdout)?;
                eprintln!("error: {message}");
                return Ok(ExitCode::FAILURE);
            }
            ChatEvent::Done => {
                writeln!(stdout)?;
                return Ok(ExitCode::SUCCESS);
            }
        }
    }

    info!(exchange_id = %exchange.id(), "exchange cancelled");
    Ok(ExitCode::from(130))
}
