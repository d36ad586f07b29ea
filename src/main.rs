use manta::api::{self, app_state::AppState};
use manta::config::loader::ConfigLoader;
use manta::generation::create_generation_model;
use manta::index::create_embedding_model;
use manta::observability::{
    AppMetrics, ObservabilityState, create_observability_router, init_tracing,
};
use manta::services::{
    chat::ChatService, conversation::ConversationMemory, document::DocumentStore,
    prompt::PromptAssembler, repair::ResponseRepairer, retrieval::ContextRetriever,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load()?;
    ConfigLoader::validate(&config)?;
    init_tracing("manta", &config.logging);

    info!("Starting Manta...");
    info!("Configuration loaded successfully");

    let embedding_model: Arc<dyn manta::index::EmbeddingModel> =
        Arc::from(create_embedding_model(&config.embedding)?);
    info!(
        "Embedding model initialized: {} (backend: {})",
        config.embedding.model_name, config.embedding.backend
    );

    let generation_model: Arc<dyn manta::generation::GenerationModel> =
        Arc::from(create_generation_model(&config.generation)?);
    info!(
        "Generation model initialized: {} (backend: {})",
        config.generation.model_name, config.generation.backend
    );

    let memory = Arc::new(ConversationMemory::new(Arc::clone(&embedding_model)));
    info!("Conversation memory initialized");

    let retriever = Arc::new(ContextRetriever::new(
        Arc::clone(&memory),
        Arc::clone(&embedding_model),
        config.retrieval.clone(),
    ));
    info!("Context retriever initialized");

    let assembler = Arc::new(PromptAssembler::new(&config.generation.system_policy));

    let repairer = Arc::new(ResponseRepairer::new(
        Arc::clone(&generation_model),
        config.generation.repair_max_tokens,
    ));

    let chat_service = ChatService::new(
        Arc::clone(&memory),
        retriever,
        Arc::clone(&assembler),
        Arc::clone(&generation_model),
        repairer,
        config.generation.max_tokens,
    );
    info!("Chat service initialized");

    let documents = DocumentStore::new(
        Arc::clone(&embedding_model),
        Arc::clone(&generation_model),
        assembler,
        config.document.clone(),
        config.generation.max_tokens,
    );
    info!("Document store initialized");

    let metrics = Arc::new(AppMetrics::new());
    let app_state = AppState::new(chat_service, memory, documents, Arc::clone(&metrics));
    info!("Application state created");

    // 创建可观测性状态并集成路由
    let observability_state = Arc::new(ObservabilityState::new(
        metrics,
        env!("CARGO_PKG_VERSION").to_string(),
    ));
    let api_router = api::create_router(app_state);
    let router = create_observability_router(observability_state).merge(api_router);
    info!("API router created with observability endpoints");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
