use clap::{Parser, Subcommand};
use painel::api::{ApiClient, HttpBackend};
use painel::auth::{AuthService, CredentialStore, LoginCredentials};
use painel::browser::ConversationBrowser;
use painel::config::Config;
use painel::conversations::{ConversationService, PageSource};
use painel::metrics::MetricsService;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "painel")]
#[command(about = "Painel CLI", long_about = None)]
struct Cli {
    /// Config file path (default: PAINEL_CONFIG_PATH or ~/.painel/config.json)
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init,

    /// Obtain a backend token and store it for later commands.
    Login {
        #[arg(long, short)]
        username: String,

        /// Password (default: PAINEL_PASSWORD)
        #[arg(long, short)]
        password: Option<String>,
    },

    /// Forget the stored token.
    Logout,

    /// Show the signed-in user.
    Whoami,

    /// List one page of conversations. Works around backends that ignore the page parameter.
    Conversations {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 10)]
        per_page: u32,

        /// Only show conversations whose user contact contains this text.
        #[arg(long, value_name = "EMAIL")]
        user: Option<String>,
    },

    /// Show one conversation with all its messages.
    Conversation { id: i64 },

    /// Engagement summary, messages per day, and edital citations.
    Metrics {
        /// Print the full collections summary as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config_path = cli.config;

    let res = match cli.command {
        Some(Commands::Version) => {
            println!("painel {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Commands::Init) => run_init(config_path),
        Some(Commands::Login { username, password }) => {
            run_login(config_path, username, password).await
        }
        Some(Commands::Logout) => run_logout(config_path).await,
        Some(Commands::Whoami) => run_whoami(config_path).await,
        Some(Commands::Conversations {
            page,
            per_page,
            user,
        }) => run_conversations(config_path, page, per_page, user).await,
        Some(Commands::Conversation { id }) => run_conversation(config_path, id).await,
        Some(Commands::Metrics { json }) => run_metrics(config_path, json).await,
        None => {
            println!("Run with --help for usage");
            Ok(())
        }
    };

    if let Err(e) = res {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(painel::config::default_config_path);
    let dir = painel::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

/// Config, backend, and credential store shared by the commands that talk to the backend.
struct Context {
    config: Config,
    backend: Arc<HttpBackend>,
    store: CredentialStore,
}

/// Load config and build the backend. The token comes from env or config, otherwise from the
/// stored login.
async fn connect(config_path: Option<PathBuf>) -> anyhow::Result<Context> {
    let (config, path) = painel::config::load_config(config_path)?;
    let store = CredentialStore::new(painel::config::resolve_credentials_path(&config, &path));
    let client = ApiClient::from_config(&config)?;
    if client.token().await.is_none() {
        if let Some(session) = store.load().await? {
            client.set_token(Some(session.tokens.access)).await;
        } else {
            log::debug!("no token configured and nobody signed in");
        }
    }
    log::info!("using backend at {}", client.base_url());
    Ok(Context {
        config,
        backend: Arc::new(HttpBackend::new(client)),
        store,
    })
}

async fn run_login(
    config_path: Option<PathBuf>,
    username: String,
    password: Option<String>,
) -> anyhow::Result<()> {
    let password = password
        .or_else(|| std::env::var("PAINEL_PASSWORD").ok())
        .ok_or_else(|| anyhow::anyhow!("no password given (use --password or PAINEL_PASSWORD)"))?;
    let ctx = connect(config_path).await?;
    let auth = AuthService::new(ctx.backend, ctx.store);
    let session = auth
        .login(&LoginCredentials { username, password })
        .await?;
    println!("signed in as {}", session.user.name);
    Ok(())
}

async fn run_logout(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let ctx = connect(config_path).await?;
    AuthService::new(ctx.backend, ctx.store).logout().await?;
    println!("signed out");
    Ok(())
}

async fn run_whoami(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let ctx = connect(config_path).await?;
    let user = AuthService::new(ctx.backend, ctx.store).current_user().await?;
    println!("{} (id {})", user.name, user.id);
    Ok(())
}

async fn run_conversations(
    config_path: Option<PathBuf>,
    page: u32,
    per_page: u32,
    user: Option<String>,
) -> anyhow::Result<()> {
    let ctx = connect(config_path).await?;
    let svc = ConversationService::from_config(ctx.backend, &ctx.config);
    let browser = ConversationBrowser::new(Arc::new(svc), per_page);
    browser.load_page(page, true).await;
    let state = browser.snapshot().await;
    if let Some(e) = &state.error {
        anyhow::bail!("{}", e);
    }

    let shown = match user.as_deref() {
        Some(email) => state.filter_by_user(email),
        None => state.conversations.iter().collect(),
    };
    for s in shown {
        println!(
            "{:>6}  {:<32}  {}  {}  {:>4} msgs",
            s.id, s.user_email, s.start_time, s.end_time, s.message_count
        );
    }
    let source = match state.source {
        PageSource::Backend => "backend",
        PageSource::LocalSlice => "local slice",
    };
    println!(
        "page {}/{} ({} total, {})",
        state.current_page,
        state.total_pages(),
        state.total,
        source
    );
    if !state.completeness.is_complete() {
        log::warn!("conversation list is partial: {:?}", state.completeness);
    }
    Ok(())
}

async fn run_conversation(config_path: Option<PathBuf>, id: i64) -> anyhow::Result<()> {
    let ctx = connect(config_path).await?;
    let svc = ConversationService::from_config(ctx.backend, &ctx.config);
    let detail = svc.conversation_detail(id).await?;
    let s = &detail.session;
    println!("conversation {} with {}", s.id, s.user_email);
    println!("started {}  ended {}", s.start_time, s.end_time);
    for m in s.messages.iter().flatten() {
        println!("[{}] {}: {}", m.timestamp, m.role, m.content);
    }
    if !detail.messages_completeness.is_complete() {
        log::warn!("messages are partial: {:?}", detail.messages_completeness);
    }
    Ok(())
}

async fn run_metrics(config_path: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let ctx = connect(config_path).await?;
    let svc = MetricsService::from_config(ctx.backend, &ctx.config);
    let data = svc.all_data().await;
    let summary = data.summary();
    let per_day = data.messages_per_day();
    let editals = data.edital_distribution();

    if json {
        let out = serde_json::json!({
            "summary": summary,
            "messagesPerDay": per_day,
            "editalDistribution": editals,
            "completeness": {
                "messages": data.messages.completeness,
                "conversations": data.conversations.completeness,
                "editals": data.editals.completeness,
            },
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("messages:      {} ({} user, {} bot)", summary.total_messages, summary.user_messages, summary.bot_messages);
    println!("conversations: {}", summary.total_conversations);
    println!("users:         {}", summary.total_users);
    println!("editals:       {}", summary.total_editals);
    println!();
    for p in &per_day {
        println!("{}  {}", p.date, p.count);
    }
    if !editals.is_empty() {
        println!();
        for e in &editals {
            println!(
                "{:<40} {:>5} msgs {:>4} convs {:>4} users",
                e.edital_name, e.message_count, e.conversation_count, e.unique_users
            );
        }
    }
    for (name, c) in [
        ("messages", &data.messages.completeness),
        ("conversations", &data.conversations.completeness),
        ("editals", &data.editals.completeness),
    ] {
        if !c.is_complete() {
            log::warn!("{} collection is partial: {:?}", name, c);
        }
    }
    Ok(())
}
