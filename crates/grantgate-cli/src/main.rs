//! Grantgate CLI: request upload and download grants from the upstream authority.
//!
//! Configuration comes from GRANTGATE_* environment variables (a `.env` file is honoured).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use grantgate_cli::{init_tracing, upload_request_for_path};
use grantgate_client::{GrantAuthority, HttpAuthority};
use grantgate_core::{
    allowed_content_types, constraints_for, AssetCategory, CorrelationId, GrantGateConfig,
};
use grantgate_services::GrantService;
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "grantgate", about = "Upload and download grants CLI")]
struct Cli {
    /// Correlation id sent as Request-ID (generated when omitted)
    #[arg(long, global = true)]
    request_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request upload grants for local files, optionally uploading them
    Upload {
        /// Asset category: image, video, document, bulk-action
        #[arg(long)]
        category: AssetCategory,
        /// Files to upload; the file name is used as identifier
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Content type for every file instead of inferring it from the extension
        #[arg(long)]
        content_type: Option<String>,
        /// Mark the objects public
        #[arg(long)]
        public: bool,
        /// PUT the file bytes to the granted URLs
        #[arg(long)]
        put: bool,
    },
    /// Verify a bound token and print the object id it carries
    Verify {
        token: String,
    },
    /// Request download grants for bound tokens
    Download {
        #[arg(required = true)]
        tokens: Vec<String>,
        /// Wait up to this many seconds for pending uploads
        #[arg(long)]
        wait: Option<u64>,
    },
    /// Show upload status for upload tokens (object ids)
    Status {
        #[arg(required = true)]
        tokens: Vec<String>,
    },
    /// Print the constraint template and allowed content types of a category
    Constraints {
        #[arg(long)]
        category: AssetCategory,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if let Commands::Constraints { category } = &cli.command {
        return print_json(&json!({
            "category": category,
            "metadata": constraints_for(*category).metadata(),
            "allowedContentTypes": allowed_content_types(*category),
        }));
    }

    let config = GrantGateConfig::from_env().context(
        "Failed to load configuration. Set GRANTGATE_AUTHORITY_URL and related variables",
    )?;
    let correlation_id = match cli.request_id.as_deref() {
        Some(id) => CorrelationId::new(id),
        None => CorrelationId::generate(),
    };
    tracing::debug!(
        correlation_id = %correlation_id,
        authority = %config.authority_url,
        "Starting"
    );

    let authority = Arc::new(HttpAuthority::from_config(&config)?);

    match cli.command {
        Commands::Status { tokens } => {
            let statuses = authority
                .check_upload_status(&correlation_id, &tokens)
                .await?;
            print_json(&statuses)?;
        }
        Commands::Constraints { .. } => {}
        command => {
            let service = GrantService::connect(&config, authority)
                .await
                .context("Failed to initialise grant service")?;
            run(&service, &correlation_id, command).await?;
        }
    }

    Ok(())
}

async fn run(
    service: &GrantService,
    correlation_id: &CorrelationId,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Upload {
            category,
            files,
            content_type,
            public,
            put,
        } => {
            let pairs = files
                .iter()
                .map(|f| -> anyhow::Result<_> {
                    Ok((upload_request_for_path(f, content_type.as_deref(), public)?, f))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            let requests: Vec<_> = pairs.iter().map(|(r, _)| r.clone()).collect();
            let result = service
                .issue_upload_grants(correlation_id, category, &requests)
                .await?;

            if put {
                for issued in &result.issued {
                    let Some((request, path)) =
                        pairs.iter().find(|(r, _)| r.identifier == issued.identifier)
                    else {
                        continue;
                    };
                    let body = tokio::fs::read(path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    service
                        .upload_object(
                            correlation_id,
                            &issued.grant,
                            &request.content_type,
                            Bytes::from(body),
                        )
                        .await?;
                }
            }

            let issued: Vec<_> = result
                .issued
                .iter()
                .map(|i| {
                    json!({
                        "identifier": i.identifier,
                        "objectId": i.object_id,
                        "signedUrl": i.grant.signed_url,
                        "boundToken": i.grant.bound_token,
                        "expiry": i.grant.expiry,
                    })
                })
                .collect();
            let failures: Vec<_> = result
                .failures
                .iter()
                .map(|f| {
                    json!({
                        "contentType": f.content_type,
                        "identifiers": f.identifiers,
                        "error": f.error.to_string(),
                    })
                })
                .collect();
            print_json(&json!({ "issued": issued, "failures": failures, "uploaded": put }))?;
        }
        Commands::Verify { token } => {
            let object_id = service.verify_token(&token).await?;
            print_json(&json!({ "objectId": object_id }))?;
        }
        Commands::Download { tokens, wait } => {
            let downloads = match wait {
                Some(secs) => {
                    let cancel = CancellationToken::new();
                    let trigger = cancel.clone();
                    tokio::spawn(async move {
                        if tokio::signal::ctrl_c().await.is_ok() {
                            trigger.cancel();
                        }
                    });
                    service
                        .issue_download_grant_with_wait(
                            correlation_id,
                            &tokens,
                            Duration::from_secs(secs),
                            &cancel,
                        )
                        .await?
                }
                None => service.issue_download_grant(correlation_id, &tokens).await?,
            };
            print_json(&downloads)?;
        }
        Commands::Status { .. } | Commands::Constraints { .. } => {}
    }
    Ok(())
}
