use std::path::PathBuf;

use civic_client::config::ConfigError;
use civic_client::net::types::{IdentityPatch, NewPoll, NewPost, RegisterRequest};
use civic_client::net::upload::{UploadTarget, guess_mime};
use civic_client::{CivicClient, ClientConfig, ClientError};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("not logged in; run `civic login` first")]
    NotLoggedIn,
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Client(#[from] ClientError),
    #[error("failed to read {path}: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "civic", about = "Civic platform command-line client")]
struct Cli {
    #[arg(long, env = "CIVIC_API_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "CIVIC_STORAGE_DIR", help = "Directory holding the persisted session")]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CIVIC_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    Whoami {
        #[arg(long, default_value_t = false, help = "Re-fetch the identity from the backend")]
        refresh: bool,
    },
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        location: String,
    },
    ForgotPassword {
        email: String,
    },
    ResetPassword {
        token: String,
        #[arg(long)]
        password: String,
    },
    Verify {
        token: String,
    },
    Profile(ProfileCommand),
    Posts(PostsCommand),
    Polls(PollsCommand),
    Campaigns(CampaignsCommand),
    Ads(AdsCommand),
    Groups(GroupsCommand),
    Wallet(WalletCommand),
    Upload {
        path: PathBuf,
        #[arg(long, default_value_t = false, help = "Store in object storage instead of backend disk")]
        s3: bool,
    },
}

#[derive(Args, Debug)]
struct ProfileCommand {
    #[command(subcommand)]
    command: ProfileSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProfileSubcommand {
    Set {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
    },
    Password {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
    },
}

#[derive(Args, Debug)]
struct PostsCommand {
    #[command(subcommand)]
    command: PostsSubcommand,
}

#[derive(Subcommand, Debug)]
enum PostsSubcommand {
    List,
    Like { post_id: String },
    Share { post_id: String },
    Comment { post_id: String, text: String },
    Create {
        content: String,
        #[arg(long)]
        image: Option<String>,
        #[arg(long)]
        group: Option<String>,
    },
}

#[derive(Args, Debug)]
struct PollsCommand {
    #[command(subcommand)]
    command: PollsSubcommand,
}

#[derive(Subcommand, Debug)]
enum PollsSubcommand {
    List,
    Vote { poll_id: String, option: usize },
    Create {
        question: String,
        #[arg(long = "option", required = true)]
        options: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct CampaignsCommand {
    #[command(subcommand)]
    command: CampaignsSubcommand,
}

#[derive(Subcommand, Debug)]
enum CampaignsSubcommand {
    List,
    Support { campaign_id: String },
}

#[derive(Args, Debug)]
struct AdsCommand {
    #[command(subcommand)]
    command: AdsSubcommand,
}

#[derive(Subcommand, Debug)]
enum AdsSubcommand {
    List,
    Click { ad_id: String },
}

#[derive(Args, Debug)]
struct GroupsCommand {
    #[command(subcommand)]
    command: GroupsSubcommand,
}

#[derive(Subcommand, Debug)]
enum GroupsSubcommand {
    List,
    Join { group_id: String },
    Leave { group_id: String },
}

#[derive(Args, Debug)]
struct WalletCommand {
    #[command(subcommand)]
    command: WalletSubcommand,
}

#[derive(Subcommand, Debug)]
enum WalletSubcommand {
    Balance,
    Topup { amount: f64 },
    Upgrade,
    History,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url)?;
    }
    if let Some(dir) = cli.storage_dir {
        config = config.with_storage_dir(dir);
    }

    tracing::debug!(base_url = %config.base_url, storage_dir = %config.storage_dir.display(), "client configured");
    let client = CivicClient::from_config(config)?;
    client.session().restore();

    match cli.command {
        Command::Login { email, password } => {
            let identity = client.session().login(&email, &password).await?;
            print_json(&identity)
        }
        Command::Logout => {
            client.session().logout()?;
            println!("logged out");
            Ok(())
        }
        Command::Whoami { refresh } => run_whoami(&client, refresh).await,
        Command::Register { name, email, password, location } => {
            let payload = RegisterRequest { name, email, password, location };
            print_json(&client.session().register(&payload).await?)
        }
        Command::ForgotPassword { email } => print_json(&client.session().forgot_password(&email).await?),
        Command::ResetPassword { token, password } => {
            print_json(&client.session().reset_password(&token, &password).await?)
        }
        Command::Verify { token } => print_json(&client.session().verify_email(&token).await?),
        Command::Profile(profile) => run_profile(&client, profile).await,
        Command::Posts(posts) => run_posts(&client, posts).await,
        Command::Polls(polls) => run_polls(&client, polls).await,
        Command::Campaigns(campaigns) => run_campaigns(&client, campaigns).await,
        Command::Ads(ads) => run_ads(&client, ads).await,
        Command::Groups(groups) => run_groups(&client, groups).await,
        Command::Wallet(wallet) => run_wallet(&client, wallet).await,
        Command::Upload { path, s3 } => run_upload(&client, path, s3).await,
    }
}

fn require_login(client: &CivicClient) -> Result<(), CliError> {
    if client.session().is_authenticated() { Ok(()) } else { Err(CliError::NotLoggedIn) }
}

async fn run_whoami(client: &CivicClient, refresh: bool) -> Result<(), CliError> {
    require_login(client)?;
    if refresh {
        return print_json(&client.session().refresh_identity().await?);
    }
    match client.session().identity() {
        Some(identity) => print_json(&identity),
        None => Err(CliError::NotLoggedIn),
    }
}

async fn run_profile(client: &CivicClient, profile: ProfileCommand) -> Result<(), CliError> {
    require_login(client)?;
    match profile.command {
        ProfileSubcommand::Set { name, location, avatar } => {
            let patch = IdentityPatch { name, location, avatar, ..IdentityPatch::default() };
            print_json(&client.session().update_profile(&patch).await?)
        }
        ProfileSubcommand::Password { current, new } => {
            print_json(&client.session().change_password(&current, &new).await?)
        }
    }
}

async fn run_posts(client: &CivicClient, posts: PostsCommand) -> Result<(), CliError> {
    let feed = client.feed();
    match posts.command {
        PostsSubcommand::List => print_json(&feed.load_posts().await?),
        PostsSubcommand::Like { post_id } => {
            feed.load_posts().await?;
            feed.toggle_like(&post_id).await?;
            print_json(&feed.snapshot().posts.iter().find(|p| p.id == post_id))
        }
        PostsSubcommand::Share { post_id } => {
            feed.load_posts().await?;
            feed.share(&post_id).await?;
            print_json(&feed.snapshot().posts.iter().find(|p| p.id == post_id))
        }
        PostsSubcommand::Comment { post_id, text } => {
            require_login(client)?;
            print_json(&feed.comment_on_post(&post_id, &text).await?)
        }
        PostsSubcommand::Create { content, image, group } => {
            require_login(client)?;
            print_json(&feed.create_post(&NewPost { content, image, group }).await?)
        }
    }
}

async fn run_polls(client: &CivicClient, polls: PollsCommand) -> Result<(), CliError> {
    let feed = client.feed();
    match polls.command {
        PollsSubcommand::List => print_json(&feed.load_polls().await?),
        PollsSubcommand::Vote { poll_id, option } => {
            feed.load_polls().await?;
            feed.vote(&poll_id, option).await?;
            print_json(&feed.snapshot().polls.iter().find(|p| p.id == poll_id))
        }
        PollsSubcommand::Create { question, options } => {
            require_login(client)?;
            print_json(&feed.create_poll(&NewPoll { question, options }).await?)
        }
    }
}

async fn run_campaigns(client: &CivicClient, campaigns: CampaignsCommand) -> Result<(), CliError> {
    let feed = client.feed();
    match campaigns.command {
        CampaignsSubcommand::List => print_json(&feed.load_campaigns().await?),
        CampaignsSubcommand::Support { campaign_id } => {
            feed.load_campaigns().await?;
            feed.toggle_support(&campaign_id).await?;
            print_json(&feed.snapshot().campaigns.iter().find(|c| c.id == campaign_id))
        }
    }
}

async fn run_ads(client: &CivicClient, ads: AdsCommand) -> Result<(), CliError> {
    let feed = client.feed();
    match ads.command {
        AdsSubcommand::List => print_json(&feed.load_ads().await?),
        AdsSubcommand::Click { ad_id } => {
            feed.load_ads().await?;
            feed.click_ad(&ad_id).await?;
            print_json(&feed.snapshot().ads.iter().find(|a| a.id == ad_id))
        }
    }
}

async fn run_groups(client: &CivicClient, groups: GroupsCommand) -> Result<(), CliError> {
    let feed = client.feed();
    match groups.command {
        GroupsSubcommand::List => print_json(&feed.load_groups().await?),
        GroupsSubcommand::Join { group_id } => {
            feed.join_group(&group_id).await?;
            print_json(&json!({ "joined": group_id }))
        }
        GroupsSubcommand::Leave { group_id } => {
            feed.leave_group(&group_id).await?;
            print_json(&json!({ "left": group_id }))
        }
    }
}

async fn run_wallet(client: &CivicClient, wallet: WalletCommand) -> Result<(), CliError> {
    require_login(client)?;
    match wallet.command {
        WalletSubcommand::Balance => print_json(&client.balance().await?),
        WalletSubcommand::Topup { amount } => print_json(&client.top_up(amount).await?),
        WalletSubcommand::Upgrade => print_json(&client.upgrade().await?),
        WalletSubcommand::History => print_json(&client.history().await?),
    }
}

async fn run_upload(client: &CivicClient, path: PathBuf, s3: bool) -> Result<(), CliError> {
    require_login(client)?;
    let bytes = std::fs::read(&path).map_err(|source| CliError::ReadFile { path: path.clone(), source })?;
    let file_name = path
        .file_name()
        .map_or_else(|| "upload".to_owned(), |name| name.to_string_lossy().into_owned());
    let target = if s3 { UploadTarget::S3 } else { UploadTarget::Local };
    let url = client
        .upload(target, &file_name, bytes, &guess_mime(&file_name))
        .await?;
    print_json(&json!({ "url": url }))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
