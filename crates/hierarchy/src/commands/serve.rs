use std::path::Path;
use std::sync::Arc;

use hierarchy_fs::FsResolver;
use hierarchy_model::ObjectResolver;
use hierarchy_provider::{ProviderContext, ProviderOptions, Server};
use hierarchy_static::StaticResolver;
use log::info;
use tokio_util::sync::CancellationToken;

use crate::cli::{BackendKind, ServeArgs};
use crate::error::AppError;
use crate::settings::AppSettings;

fn resolver(args: &ServeArgs) -> Result<Arc<dyn ObjectResolver>, AppError> {
    let resolver: Arc<dyn ObjectResolver> = match args.backend {
        BackendKind::Static => {
            let icon_base = args.resources.as_deref().unwrap_or_else(|| Path::new("."));
            Arc::new(StaticResolver::open(&args.root, icon_base)?)
        }
        BackendKind::Fs => {
            let resolver = FsResolver::open(&args.root)?;
            match &args.resources {
                Some(dir) => Arc::new(resolver.with_resources(dir)),
                None => Arc::new(resolver),
            }
        }
    };
    Ok(resolver)
}

/// Build the provider context for `args`.
///
/// # Errors
/// Backend roots that cannot be opened and invalid parts directories.
pub fn context(args: &ServeArgs, settings: &AppSettings) -> Result<ProviderContext, AppError> {
    let options = ProviderOptions {
        root_name: args.name.clone().unwrap_or_default(),
        resources_dir: args.resources.clone(),
        parts_dir: args.parts.clone(),
        search: settings.search_config(),
    };
    let context = ProviderContext::new(options, resolver(args)?)?;
    info!(
        "Serving {} with {} part(s) and {} icon(s)",
        context.root_name(),
        context.parts.len(),
        context.icons().len()
    );
    Ok(context)
}

pub async fn execute(args: ServeArgs, settings: &AppSettings) -> Result<(), AppError> {
    let context = Arc::new(context(&args, settings)?);
    let server = Server::bind(settings.address(args.host, args.port), context).await?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutting down"),
            Err(err) => log::error!("Cannot listen for Ctrl-C: {err}"),
        }
        signal_token.cancel();
    });

    server.run(shutdown).await;
    Ok(())
}
