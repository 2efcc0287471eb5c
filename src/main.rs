use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use fb_carousel::config::{self, Config};
use fb_carousel::graph::{GraphClient, GraphService};
use fb_carousel::model::{Account, CallToAction, CloudinarySettings, CreativeValues, PublishMode};
use fb_carousel::publish::{self, LogObserver, PublishRequest, TokioPacer};
use fb_carousel::store::{self, JsonFileStore, KeyValueStore};
use fb_carousel::upload::MediaUploader;
use fb_carousel::{resolver, thumbnail};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage linked Facebook profiles
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// Store Cloudinary upload settings
    Cloudinary {
        #[arg(long)]
        cloud_name: Option<String>,
        #[arg(long)]
        preset: Option<String>,
    },
    /// List the pages an account can publish to
    Pages {
        #[arg(long)]
        account: String,
    },
    /// List and remember the account's ad accounts
    AdAccounts {
        #[arg(long)]
        account: String,
    },
    /// Browse the ad account's video library
    Videos {
        #[arg(long)]
        account: String,
        #[arg(long)]
        ad_account: String,
        #[arg(long)]
        after: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Resolve a Facebook permalink or direct file URL to a video source
    Resolve {
        #[arg(long)]
        account: String,
        #[arg(long)]
        url: String,
    },
    /// Upload a local file to the media host
    Upload {
        #[arg(long)]
        file: PathBuf,
        /// Keep the uploaded file as a selectable thumbnail
        #[arg(long)]
        as_image: bool,
    },
    /// List thumbnails for an ad video, including uploaded images
    Thumbnails {
        #[arg(long)]
        account: String,
        #[arg(long)]
        video_id: String,
    },
    /// List the call-to-action buttons accepted by `publish --cta`
    Ctas,
    /// Publish a video carousel to one or more pages
    Publish(PublishArgs),
}

#[derive(Debug, Subcommand)]
enum AccountAction {
    /// Link a profile by its access token
    Add {
        #[arg(long)]
        token: String,
    },
    List,
    Remove {
        #[arg(long)]
        id: String,
    },
}

#[derive(Debug, clap::Args)]
struct PublishArgs {
    #[arg(long)]
    account: String,
    #[arg(long)]
    ad_account: String,
    /// Existing ad video id
    #[arg(long, conflicts_with_all = ["video_url", "video_file"])]
    video_id: Option<String>,
    /// Facebook permalink or direct video URL to import
    #[arg(long, conflicts_with = "video_file")]
    video_url: Option<String>,
    /// Local video file to upload and import
    #[arg(long)]
    video_file: Option<PathBuf>,
    /// Primary thumbnail URI; defaults to the preferred thumbnail
    #[arg(long)]
    thumbnail: Option<String>,
    /// Picture for the right-hand card; defaults to the primary thumbnail
    #[arg(long)]
    right_image: Option<String>,
    /// Page ids to publish to, in order
    #[arg(long, value_delimiter = ',')]
    pages: Vec<String>,
    /// Publish to every page of the account
    #[arg(long, conflicts_with = "pages")]
    all_pages: bool,
    #[arg(long, default_value = "")]
    message: String,
    #[arg(long, default_value = "LIKE_PAGE")]
    cta: CallToAction,
    #[arg(long, default_value = "")]
    link: String,
    #[arg(long, default_value = "Like Page 🙏")]
    cta_title: String,
    /// RFC 3339 time to schedule the post instead of publishing now
    #[arg(long)]
    schedule: Option<DateTime<Utc>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    cfg.ensure_dirs()?;

    let kv = JsonFileStore::new(&cfg.app.data_file);
    info!(data_file = %kv.path().display(), "using data file");
    let graph = GraphClient::from_config(&cfg)?;

    match args.command {
        Command::Account { action } => run_account(&graph, &kv, action).await,
        Command::Cloudinary { cloud_name, preset } => {
            if cloud_name.is_none() && preset.is_none() {
                bail!("pass --cloud-name and/or --preset");
            }
            if let Some(name) = cloud_name.as_deref() {
                store::set_cloud_name(&kv, name)?;
            }
            if let Some(preset) = preset.as_deref() {
                store::set_preset(&kv, preset)?;
            }
            println!("Saved Cloudinary settings.");
            Ok(())
        }
        Command::Pages { account } => {
            let account = find_account(&kv, &account)?;
            for page in graph.pages(&account.id, &account.access_token).await? {
                println!("{}\t{}", page.id, page.name);
            }
            Ok(())
        }
        Command::AdAccounts { account } => {
            let account = find_account(&kv, &account)?;
            let ad_accounts = graph.ad_accounts(&account.id, &account.access_token).await?;
            for ad in &ad_accounts {
                println!("{}\t{}", ad.id, ad.account_id);
            }
            store::set_ad_accounts(&kv, ad_accounts)?;
            Ok(())
        }
        Command::Videos {
            account,
            ad_account,
            after,
            limit,
        } => {
            let account = find_account(&kv, &account)?;
            let page = graph
                .ad_videos(&ad_account, &account.access_token, after.as_deref(), limit)
                .await?;
            for video in &page.videos {
                println!(
                    "{}\t{}\t{}",
                    video.id,
                    video.source.as_deref().unwrap_or("-"),
                    video.picture.as_deref().unwrap_or("-")
                );
            }
            if let (true, Some(after)) = (page.has_more, page.after.as_deref()) {
                println!("more: --after {}", after);
            }
            Ok(())
        }
        Command::Resolve { account, url } => {
            let account = find_account(&kv, &account)?;
            let video = resolver::resolve_required(&graph, &url, &account.access_token).await?;
            println!("{}", serde_json::to_string_pretty(&video)?);
            Ok(())
        }
        Command::Upload { file, as_image } => {
            let uploader = uploader(&cfg, &kv)?;
            let media = uploader.upload_file(&file).await?;
            println!("{}", media.secure_url);
            if as_image {
                let image = media.into_thumbnail(uuid::Uuid::new_v4().to_string());
                store::add_image(&kv, image)?;
            }
            Ok(())
        }
        Command::Thumbnails { account, video_id } => {
            let account = find_account(&kv, &account)?;
            let images = store::load(&kv)?.images;
            let thumbs =
                thumbnail::list_thumbnails(&graph, &images, &video_id, &account.access_token).await?;
            for thumb in thumbs {
                let marker = if thumb.is_preferred { "*" } else { " " };
                println!("{} {}\t{}x{}\t{}", marker, thumb.id, thumb.width, thumb.height, thumb.uri);
            }
            Ok(())
        }
        Command::Ctas => {
            for cta in CallToAction::ALL {
                println!("{}\t{}", cta.as_str(), cta.label());
            }
            Ok(())
        }
        Command::Publish(publish_args) => run_publish(&cfg, &graph, &kv, publish_args).await,
    }
}

async fn run_account(graph: &GraphClient, kv: &dyn KeyValueStore, action: AccountAction) -> Result<()> {
    match action {
        AccountAction::Add { token } => {
            let account = graph.me(token.trim()).await.context("access token rejected")?;
            if store::add_account(kv, account.clone())? {
                println!("Linked {} ({})", account.name, account.id);
            } else {
                println!("{} ({}) is already linked", account.name, account.id);
            }
        }
        AccountAction::List => {
            for account in store::load(kv)?.accounts {
                println!("{}\t{}", account.id, account.name);
            }
        }
        AccountAction::Remove { id } => {
            if !store::remove_account(kv, &id)? {
                bail!("no linked account {}", id);
            }
            println!("Removed {}", id);
        }
    }
    Ok(())
}

async fn run_publish(
    cfg: &Config,
    graph: &GraphClient,
    kv: &dyn KeyValueStore,
    args: PublishArgs,
) -> Result<()> {
    let account = find_account(kv, &args.account)?;
    let token = account.access_token.as_str();
    let pacer = TokioPacer;

    let video_id = match (&args.video_id, &args.video_url, &args.video_file) {
        (Some(id), _, _) => id.clone(),
        (None, Some(url), _) => {
            let video = resolver::resolve_required(graph, url, token).await?;
            info!(source = %video.source_url, "importing video into ad account");
            graph.create_ad_video(&args.ad_account, &video.source_url, token).await?
        }
        (None, None, Some(file)) => {
            let media = uploader(cfg, kv)?.upload_file(file).await?;
            graph.create_ad_video(&args.ad_account, &media.secure_url, token).await?
        }
        (None, None, None) => bail!("pass one of --video-id, --video-url or --video-file"),
    };

    let thumbs = if args.video_id.is_some() {
        graph.thumbnails(&video_id, token).await?
    } else {
        thumbnail::wait_until_ready(
            graph,
            &pacer,
            &video_id,
            token,
            cfg.thumbnail_poll(),
            cfg.publish.thumbnail_poll_attempts,
        )
        .await?
    };
    let thumbnail_uri = match args.thumbnail {
        Some(uri) => uri,
        None => thumbnail::preferred(&thumbs)
            .map(|t| t.uri.clone())
            .ok_or_else(|| anyhow!("video {} has no thumbnails; pass --thumbnail", video_id))?,
    };
    let pe_image_uri = args.right_image.unwrap_or_else(|| thumbnail_uri.clone());

    let mut pages = graph.pages(&account.id, token).await?;
    for page in pages.iter_mut() {
        page.selected = args.all_pages || args.pages.iter().any(|id| id == &page.id);
    }
    if !args.all_pages {
        for id in &args.pages {
            if !pages.iter().any(|p| &p.id == id) {
                warn!(page_id = %id, "page not available to this account");
            }
        }
        // publish in the order the pages were named
        pages.sort_by_key(|p| args.pages.iter().position(|id| id == &p.id).unwrap_or(usize::MAX));
    }

    let values = CreativeValues {
        message: args.message,
        cta: args.cta,
        link: args.link,
        cta_link_title: args.cta_title,
        mode: args.schedule.map_or(PublishMode::Now, PublishMode::Scheduled),
    };
    let request = PublishRequest {
        ad_account_id: &args.ad_account,
        account_access_token: token,
        video_id: &video_id,
        thumbnail_uri: &thumbnail_uri,
        pe_image_uri: &pe_image_uri,
        values: &values,
        creative_name: None,
        pacing: cfg.pacing(),
    };

    let summary = publish::publish(graph, &pacer, &LogObserver, &request, &mut pages).await?;
    for page in pages.iter().filter(|p| p.selected) {
        match (&page.published_url, &page.error_message) {
            (Some(url), _) => println!("{}\t{}\t{}", page.name, page.status, url),
            (None, Some(err)) => println!("{}\t{}\t{}", page.name, page.status, err),
            _ => println!("{}\t{}", page.name, page.status),
        }
    }
    if summary.failed > 0 {
        bail!("{} of {} pages failed", summary.failed, summary.failed + summary.completed);
    }
    Ok(())
}

fn find_account(kv: &dyn KeyValueStore, id: &str) -> Result<Account> {
    store::load(kv)?
        .account(id)
        .cloned()
        .ok_or_else(|| anyhow!("no linked account {}; run `account add` first", id))
}

fn uploader(cfg: &Config, kv: &dyn KeyValueStore) -> Result<MediaUploader> {
    let stored: CloudinarySettings = store::load(kv)?.cloudinary;
    let settings = cfg.cloudinary_settings(&stored);
    Ok(MediaUploader::new(
        &cfg.cloudinary.api_base,
        &settings,
        std::time::Duration::from_secs(cfg.graph.request_timeout_secs.max(300)),
    )?)
}
